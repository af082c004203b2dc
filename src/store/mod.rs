//! Entity store boundary.
//!
//! The engine never owns rows: everything it knows about groups, permissions
//! and their associations comes through [`EntityStore`]. Two implementations
//! ship with the crate, [`MemoryStore`] and [`LmdbStore`].

pub mod lmdb;
pub mod memory;

pub use lmdb::LmdbStore;
pub use memory::MemoryStore;

use crate::error::Result;
use crate::model::{Group, Permission, PrincipalKey};

/// Group and permission ids attached to one principal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Associations {
    pub group_ids: Vec<u64>,
    pub permission_ids: Vec<u64>,
}

pub trait EntityStore: Send + Sync {
    // Permissions
    fn find_permission(&self, name: &str, guard: &str) -> Result<Option<Permission>>;
    fn find_permission_by_id(&self, id: u64, guard: &str) -> Result<Option<Permission>>;
    /// Fails with `PermissionAlreadyExists` on a duplicate `(name, guard)`
    fn create_permission(&self, name: &str, guard: &str) -> Result<Permission>;
    /// Fails with `PermissionAlreadyExists` when the new name is taken in the same guard
    fn rename_permission(&self, id: u64, new_name: &str) -> Result<Permission>;

    // Groups
    fn find_group(&self, name: &str, guard: &str) -> Result<Option<Group>>;
    fn find_group_by_id(&self, id: u64, guard: &str) -> Result<Option<Group>>;
    fn create_group(&self, name: &str, guard: &str) -> Result<Group>;
    fn rename_group(&self, id: u64, new_name: &str) -> Result<Group>;

    // Bulk reads for the permission cache
    fn all_permissions(&self) -> Result<Vec<Permission>>;
    fn all_groups(&self) -> Result<Vec<Group>>;
    /// Every `(group_id, permission_id)` pivot
    fn all_group_permissions(&self) -> Result<Vec<(u64, u64)>>;

    // Principal associations
    fn list_associations(&self, principal: &PrincipalKey) -> Result<Associations>;
    fn sync_principal_groups(&self, principal: &PrincipalKey, group_ids: &[u64], detach_others: bool) -> Result<()>;
    fn detach_principal_groups(&self, principal: &PrincipalKey, group_ids: &[u64]) -> Result<()>;
    fn sync_principal_permissions(&self, principal: &PrincipalKey, permission_ids: &[u64], detach_others: bool) -> Result<()>;
    fn detach_principal_permissions(&self, principal: &PrincipalKey, permission_ids: &[u64]) -> Result<()>;

    // Group associations
    fn sync_group_permissions(&self, group_id: u64, permission_ids: &[u64], detach_others: bool) -> Result<()>;
    fn detach_group_permissions(&self, group_id: u64, permission_ids: &[u64]) -> Result<()>;

    /// Ids of principals of `principal_type` holding any of `group_ids`, ascending
    fn principals_with_groups(&self, principal_type: &str, group_ids: &[u64]) -> Result<Vec<u64>>;

    /// Drop every association of a principal whose row is gone for good
    fn on_principal_hard_delete(&self, principal: &PrincipalKey) -> Result<()>;
}
