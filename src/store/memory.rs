//! In-process entity store
//!
//! Everything lives in one `RwLock`-guarded table set. Useful for tests and for
//! embedding where the rows are rebuilt at startup.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::model::{Group, Permission, PrincipalKey};
use crate::store::{Associations, EntityStore};

#[derive(Debug, Default)]
struct Tables {
    next_id: u64,
    permissions: BTreeMap<u64, Permission>,
    groups: BTreeMap<u64, Group>,
    group_permissions: BTreeSet<(u64, u64)>,
    principal_groups: BTreeMap<PrincipalKey, BTreeSet<u64>>,
    principal_permissions: BTreeMap<PrincipalKey, BTreeSet<u64>>,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sync_set(set: &mut BTreeSet<u64>, ids: &[u64], detach_others: bool) {
    if detach_others {
        set.clear();
    }
    set.extend(ids.iter().copied());
}

impl EntityStore for MemoryStore {
    fn find_permission(&self, name: &str, guard: &str) -> Result<Option<Permission>> {
        let t = self.tables.read();
        Ok(t.permissions.values().find(|p| p.name == name && p.guard_name == guard).cloned())
    }

    fn find_permission_by_id(&self, id: u64, guard: &str) -> Result<Option<Permission>> {
        let t = self.tables.read();
        Ok(t.permissions.get(&id).filter(|p| p.guard_name == guard).cloned())
    }

    fn create_permission(&self, name: &str, guard: &str) -> Result<Permission> {
        let mut t = self.tables.write();
        if t.permissions.values().any(|p| p.name == name && p.guard_name == guard) {
            return Err(Error::PermissionAlreadyExists { name: name.into(), guard: guard.into() });
        }
        let id = t.next_id();
        let p = Permission { id, name: name.into(), guard_name: guard.into() };
        t.permissions.insert(id, p.clone());
        Ok(p)
    }

    fn rename_permission(&self, id: u64, new_name: &str) -> Result<Permission> {
        let mut t = self.tables.write();
        let guard = match t.permissions.get(&id) {
            Some(p) => p.guard_name.clone(),
            None => return Err(Error::Storage(format!("permission {} does not exist", id))),
        };
        if t.permissions.values().any(|p| p.id != id && p.name == new_name && p.guard_name == guard) {
            return Err(Error::PermissionAlreadyExists { name: new_name.into(), guard });
        }
        let p = t.permissions.get_mut(&id).ok_or_else(|| Error::Storage(format!("permission {} vanished", id)))?;
        p.name = new_name.to_string();
        Ok(p.clone())
    }

    fn find_group(&self, name: &str, guard: &str) -> Result<Option<Group>> {
        let t = self.tables.read();
        Ok(t.groups.values().find(|g| g.name == name && g.guard_name == guard).cloned())
    }

    fn find_group_by_id(&self, id: u64, guard: &str) -> Result<Option<Group>> {
        let t = self.tables.read();
        Ok(t.groups.get(&id).filter(|g| g.guard_name == guard).cloned())
    }

    fn create_group(&self, name: &str, guard: &str) -> Result<Group> {
        let mut t = self.tables.write();
        if t.groups.values().any(|g| g.name == name && g.guard_name == guard) {
            return Err(Error::GroupAlreadyExists { name: name.into(), guard: guard.into() });
        }
        let id = t.next_id();
        let g = Group { id, name: name.into(), guard_name: guard.into() };
        t.groups.insert(id, g.clone());
        Ok(g)
    }

    fn rename_group(&self, id: u64, new_name: &str) -> Result<Group> {
        let mut t = self.tables.write();
        let guard = match t.groups.get(&id) {
            Some(g) => g.guard_name.clone(),
            None => return Err(Error::Storage(format!("group {} does not exist", id))),
        };
        if t.groups.values().any(|g| g.id != id && g.name == new_name && g.guard_name == guard) {
            return Err(Error::GroupAlreadyExists { name: new_name.into(), guard });
        }
        let g = t.groups.get_mut(&id).ok_or_else(|| Error::Storage(format!("group {} vanished", id)))?;
        g.name = new_name.to_string();
        Ok(g.clone())
    }

    fn all_permissions(&self) -> Result<Vec<Permission>> {
        Ok(self.tables.read().permissions.values().cloned().collect())
    }

    fn all_groups(&self) -> Result<Vec<Group>> {
        Ok(self.tables.read().groups.values().cloned().collect())
    }

    fn all_group_permissions(&self) -> Result<Vec<(u64, u64)>> {
        Ok(self.tables.read().group_permissions.iter().copied().collect())
    }

    fn list_associations(&self, principal: &PrincipalKey) -> Result<Associations> {
        let t = self.tables.read();
        Ok(Associations {
            group_ids: t.principal_groups.get(principal).map(|s| s.iter().copied().collect()).unwrap_or_default(),
            permission_ids: t.principal_permissions.get(principal).map(|s| s.iter().copied().collect()).unwrap_or_default(),
        })
    }

    fn sync_principal_groups(&self, principal: &PrincipalKey, group_ids: &[u64], detach_others: bool) -> Result<()> {
        let mut t = self.tables.write();
        sync_set(t.principal_groups.entry(principal.clone()).or_default(), group_ids, detach_others);
        Ok(())
    }

    fn detach_principal_groups(&self, principal: &PrincipalKey, group_ids: &[u64]) -> Result<()> {
        let mut t = self.tables.write();
        if let Some(set) = t.principal_groups.get_mut(principal) {
            set.retain(|id| !group_ids.contains(id));
        }
        Ok(())
    }

    fn sync_principal_permissions(&self, principal: &PrincipalKey, permission_ids: &[u64], detach_others: bool) -> Result<()> {
        let mut t = self.tables.write();
        sync_set(t.principal_permissions.entry(principal.clone()).or_default(), permission_ids, detach_others);
        Ok(())
    }

    fn detach_principal_permissions(&self, principal: &PrincipalKey, permission_ids: &[u64]) -> Result<()> {
        let mut t = self.tables.write();
        if let Some(set) = t.principal_permissions.get_mut(principal) {
            set.retain(|id| !permission_ids.contains(id));
        }
        Ok(())
    }

    fn sync_group_permissions(&self, group_id: u64, permission_ids: &[u64], detach_others: bool) -> Result<()> {
        let mut t = self.tables.write();
        if detach_others {
            t.group_permissions.retain(|(g, _)| *g != group_id);
        }
        t.group_permissions.extend(permission_ids.iter().map(|p| (group_id, *p)));
        Ok(())
    }

    fn detach_group_permissions(&self, group_id: u64, permission_ids: &[u64]) -> Result<()> {
        let mut t = self.tables.write();
        t.group_permissions.retain(|(g, p)| *g != group_id || !permission_ids.contains(p));
        Ok(())
    }

    fn principals_with_groups(&self, principal_type: &str, group_ids: &[u64]) -> Result<Vec<u64>> {
        let t = self.tables.read();
        Ok(t.principal_groups
            .iter()
            .filter(|(k, set)| k.principal_type == principal_type && set.iter().any(|g| group_ids.contains(g)))
            .map(|(k, _)| k.id)
            .collect())
    }

    fn on_principal_hard_delete(&self, principal: &PrincipalKey) -> Result<()> {
        let mut t = self.tables.write();
        t.principal_groups.remove(principal);
        t.principal_permissions.remove(principal);
        Ok(())
    }
}
