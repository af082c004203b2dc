//! Group and permission rows: create, find, rename

use crate::authorizer::Authorizer;
use crate::error::{Error, Result};
use crate::model::{Group, Permission};
use crate::store::EntityStore;

impl<S: EntityStore> Authorizer<S> {
    /// Create a group; `guard` defaults to the configured default guard
    pub fn create_group(&self, name: &str, guard: Option<&str>) -> Result<Group> {
        let guard = self.guards.resolve_or_default(guard)?;
        let group = self.store.create_group(name, &guard)?;
        self.cache.invalidate();
        tracing::debug!(id = group.id, name, guard = %guard, "group created");
        Ok(group)
    }

    pub fn find_group(&self, name: &str, guard: Option<&str>) -> Result<Group> {
        let guard = self.guards.resolve_or_default(guard)?;
        self.store
            .find_group(name, &guard)?
            .ok_or(Error::GroupNamed { name: name.to_string(), guard })
    }

    pub fn find_group_by_id(&self, id: u64, guard: Option<&str>) -> Result<Group> {
        let guard = self.guards.resolve_or_default(guard)?;
        self.store.find_group_by_id(id, &guard)?.ok_or(Error::GroupWithId { id, guard })
    }

    pub fn find_or_create_group(&self, name: &str, guard: Option<&str>) -> Result<Group> {
        let guard = self.guards.resolve_or_default(guard)?;
        match self.store.find_group(name, &guard)? {
            Some(g) => Ok(g),
            None => self.create_group(name, Some(&guard)),
        }
    }

    /// Rename keeps the id, so every association follows the group
    pub fn rename_group(&self, group: &Group, new_name: &str) -> Result<Group> {
        let renamed = self.store.rename_group(group.id, new_name)?;
        self.cache.invalidate();
        tracing::debug!(id = group.id, from = %group.name, to = new_name, "group renamed");
        Ok(renamed)
    }

    pub fn create_permission(&self, name: &str, guard: Option<&str>) -> Result<Permission> {
        let guard = self.guards.resolve_or_default(guard)?;
        let permission = self.store.create_permission(name, &guard)?;
        self.cache.invalidate();
        tracing::debug!(id = permission.id, name, guard = %guard, "permission created");
        Ok(permission)
    }

    pub fn find_permission(&self, name: &str, guard: Option<&str>) -> Result<Permission> {
        let guard = self.guards.resolve_or_default(guard)?;
        self.store
            .find_permission(name, &guard)?
            .ok_or(Error::PermissionNamed { name: name.to_string(), guard })
    }

    pub fn find_permission_by_id(&self, id: u64, guard: Option<&str>) -> Result<Permission> {
        let guard = self.guards.resolve_or_default(guard)?;
        self.store.find_permission_by_id(id, &guard)?.ok_or(Error::PermissionWithId { id, guard })
    }

    pub fn find_or_create_permission(&self, name: &str, guard: Option<&str>) -> Result<Permission> {
        let guard = self.guards.resolve_or_default(guard)?;
        match self.store.find_permission(name, &guard)? {
            Some(p) => Ok(p),
            None => self.create_permission(name, Some(&guard)),
        }
    }

    pub fn rename_permission(&self, permission: &Permission, new_name: &str) -> Result<Permission> {
        let renamed = self.store.rename_permission(permission.id, new_name)?;
        self.cache.invalidate();
        tracing::debug!(id = permission.id, from = %permission.name, to = new_name, "permission renamed");
        Ok(renamed)
    }
}
