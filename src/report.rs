//! Administrative views over the whole catalogue

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::authorizer::Authorizer;
use crate::error::Result;
use crate::model::Group;
use crate::reference::split_pipe;
use crate::store::EntityStore;

/// Permissions × groups of one guard, both sorted by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionMatrix {
    pub guard: String,
    pub groups: Vec<String>,
    /// One row per permission: its name and, per group column, whether the group grants it
    pub rows: Vec<(String, Vec<bool>)>,
}

impl PermissionMatrix {
    pub fn grants(&self, permission: &str, group: &str) -> bool {
        let Some(col) = self.groups.iter().position(|g| g == group) else {
            return false;
        };
        self.rows.iter().any(|(p, flags)| p == permission && flags.get(col).copied().unwrap_or(false))
    }
}

impl fmt::Display for PermissionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let first = self.rows.iter().map(|(p, _)| p.chars().count()).max().unwrap_or(0);
        write!(f, "{:first$}", "")?;
        for g in &self.groups {
            write!(f, " | {}", g)?;
        }
        writeln!(f)?;
        for (permission, flags) in &self.rows {
            write!(f, "{:first$}", permission)?;
            for (g, granted) in self.groups.iter().zip(flags) {
                let mark = if *granted { "✔" } else { "·" };
                write!(f, " | {:width$}", mark, width = g.chars().count())?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl<S: EntityStore> Authorizer<S> {
    /// Groups of a guard with the names of the permissions each grants, by group name
    pub fn list_groups_with_permissions(&self, guard: &str) -> Result<Vec<(String, BTreeSet<String>)>> {
        let snap = self.snapshot()?;
        let Some(slice) = snap.guard(guard) else {
            return Ok(Vec::new());
        };
        let by_name: BTreeMap<String, BTreeSet<String>> = slice
            .groups
            .values()
            .map(|g| (g.name.clone(), snap.permissions_of_group(g.id).map(|p| p.name.clone()).collect()))
            .collect();
        Ok(by_name.into_iter().collect())
    }

    pub fn permission_matrix(&self, guard: &str) -> Result<PermissionMatrix> {
        let groups = self.list_groups_with_permissions(guard)?;
        let snap = self.snapshot()?;
        let permissions: BTreeSet<String> = snap
            .guard(guard)
            .map(|s| s.permissions.values().map(|p| p.name.clone()).collect())
            .unwrap_or_default();
        let rows = permissions
            .into_iter()
            .map(|p| {
                let flags = groups.iter().map(|(_, granted)| granted.contains(&p)).collect();
                (p, flags)
            })
            .collect();
        Ok(PermissionMatrix {
            guard: guard.to_string(),
            groups: groups.into_iter().map(|(g, _)| g).collect(),
            rows,
        })
    }

    /// Guards owning at least one group or permission, sorted
    pub fn guards_in_use(&self) -> Result<Vec<String>> {
        Ok(self.snapshot()?.guard_names().map(str::to_string).collect())
    }

    /// Find or create a group, then find or create each pipe-separated
    /// permission in the same guard and give it to the group
    pub fn provision_group(&self, name: &str, guard: Option<&str>, permissions: Option<&str>) -> Result<Group> {
        let group = self.find_or_create_group(name, guard)?;
        let mut granted = Vec::new();
        for p in permissions.map(split_pipe).unwrap_or_default() {
            granted.push(self.find_or_create_permission(&p, Some(&group.guard_name))?);
        }
        if !granted.is_empty() {
            self.give_permission_to_group(&group, granted)?;
        }
        tracing::info!(group = %group.name, guard = %group.guard_name, "group provisioned");
        Ok(group)
    }
}
