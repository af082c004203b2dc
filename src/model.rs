//! Rows and in-memory handles

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A named capability, unique per `(name, guard_name)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Permission {
    pub id: u64,
    pub name: String,
    pub guard_name: String,
}

/// A named bundle of permissions, unique per `(name, guard_name)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Group {
    pub id: u64,
    pub name: String,
    pub guard_name: String,
}

/// Polymorphic association key: one pivot table serves every principal type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrincipalKey {
    pub principal_type: String,
    pub id: u64,
}

impl PrincipalKey {
    pub fn new(principal_type: impl Into<String>, id: u64) -> Self {
        PrincipalKey { principal_type: principal_type.into(), id }
    }
}

impl std::fmt::Display for PrincipalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.principal_type, self.id)
    }
}

/// How the caller is deleting a principal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    /// Row is only flagged; associations stay for a later restore
    Soft,
    /// Row is gone; associations are detached
    Force,
}

/// Writes queued on a handle whose principal has no id yet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PendingWrites {
    pub(crate) groups: BTreeSet<u64>,
    pub(crate) permissions: BTreeSet<u64>,
}

impl PendingWrites {
    pub(crate) fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.permissions.is_empty()
    }
}

/// In-memory view of one principal and its loaded associations.
///
/// Every handle owns its own pending buffer, so two unsaved principals never
/// see each other's queued groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalHandle {
    pub(crate) principal_type: String,
    pub(crate) id: Option<u64>,
    pub(crate) groups: Vec<Group>,
    pub(crate) permissions: Vec<Permission>,
    pub(crate) pending: PendingWrites,
    pub(crate) trashed: bool,
}

impl PrincipalHandle {
    /// A principal that has not been persisted yet
    pub fn new(principal_type: impl Into<String>) -> Self {
        PrincipalHandle {
            principal_type: principal_type.into(),
            id: None,
            groups: Vec::new(),
            permissions: Vec::new(),
            pending: PendingWrites::default(),
            trashed: false,
        }
    }

    pub fn principal_type(&self) -> &str {
        &self.principal_type
    }

    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn key(&self) -> Option<PrincipalKey> {
        self.id.map(|id| PrincipalKey::new(self.principal_type.clone(), id))
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    pub fn is_trashed(&self) -> bool {
        self.trashed
    }

    /// Groups held, in assignment order
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Directly assigned permissions
    pub fn permissions(&self) -> &[Permission] {
        &self.permissions
    }

    pub fn has_pending_writes(&self) -> bool {
        !self.pending.is_empty()
    }

    pub(crate) fn merge_groups(&mut self, groups: impl IntoIterator<Item = Group>) {
        for g in groups {
            if !self.groups.iter().any(|h| h.id == g.id) {
                self.groups.push(g);
            }
        }
    }

    pub(crate) fn merge_permissions(&mut self, permissions: impl IntoIterator<Item = Permission>) {
        for p in permissions {
            if !self.permissions.iter().any(|h| h.id == p.id) {
                self.permissions.push(p);
            }
        }
    }
}
