//! Association writes: groups and direct permissions on principals,
//! permissions on groups.
//!
//! Every reference is resolved and guard-checked before the first store call,
//! so a failed call leaves the stored associations untouched. A handle without
//! an id buffers the ids until [`Authorizer::principal_saved`].

use crate::authorizer::Authorizer;
use crate::error::{Error, Result};
use crate::model::{Group, Permission, PrincipalHandle};
use crate::reference::{GroupRef, PermissionRef, RefList};
use crate::store::EntityStore;

fn ids_of<'a, I: IntoIterator<Item = &'a u64>>(ids: I) -> Vec<u64> {
    ids.into_iter().copied().collect()
}

impl<S: EntityStore> Authorizer<S> {
    // ========================================================================
    // Groups on principals
    // ========================================================================

    /// Add groups to a principal. Already-held groups are left alone.
    pub fn assign_group(&self, principal: &mut PrincipalHandle, groups: impl Into<RefList<Group>>) -> Result<()> {
        let groups = self.collect_groups(principal, groups.into())?;
        let ids = ids_of(groups.iter().map(|g| &g.id));
        match principal.key() {
            Some(key) => {
                self.store.sync_principal_groups(&key, &ids, false)?;
                tracing::debug!(principal = %key, ?ids, "groups assigned");
                principal.merge_groups(groups);
            }
            None => {
                principal.pending.groups.extend(ids.iter().copied());
                tracing::debug!(principal_type = %principal.principal_type, ?ids, "groups queued");
            }
        }
        self.cache.invalidate();
        Ok(())
    }

    /// Detach one group. A group that cannot be resolved or is not held is a no-op.
    pub fn remove_group(&self, principal: &mut PrincipalHandle, group: impl Into<GroupRef>) -> Result<()> {
        let guard = self.guards.default_for(&principal.principal_type);
        let group = match self.resolve_group(&group.into(), &guard) {
            Ok(g) => g,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };
        match principal.key() {
            Some(key) => {
                self.store.detach_principal_groups(&key, &[group.id])?;
                tracing::debug!(principal = %key, group = group.id, "group removed");
            }
            None => {
                principal.pending.groups.remove(&group.id);
            }
        }
        principal.groups.retain(|g| g.id != group.id);
        self.cache.invalidate();
        Ok(())
    }

    /// Replace the held groups with exactly `groups`; an empty list removes all.
    pub fn sync_groups(&self, principal: &mut PrincipalHandle, groups: impl Into<RefList<Group>>) -> Result<()> {
        let groups = self.collect_groups(principal, groups.into())?;
        let ids = ids_of(groups.iter().map(|g| &g.id));
        match principal.key() {
            Some(key) => {
                self.store.sync_principal_groups(&key, &ids, true)?;
                tracing::debug!(principal = %key, ?ids, "groups synced");
                principal.groups = groups;
            }
            None => {
                principal.pending.groups = ids.into_iter().collect();
            }
        }
        self.cache.invalidate();
        Ok(())
    }

    // ========================================================================
    // Direct permissions on principals
    // ========================================================================

    pub fn give_permission_to(
        &self,
        principal: &mut PrincipalHandle,
        permissions: impl Into<RefList<Permission>>,
    ) -> Result<()> {
        let permissions = self.collect_permissions(principal, permissions.into())?;
        let ids = ids_of(permissions.iter().map(|p| &p.id));
        match principal.key() {
            Some(key) => {
                self.store.sync_principal_permissions(&key, &ids, false)?;
                tracing::debug!(principal = %key, ?ids, "permissions given");
                principal.merge_permissions(permissions);
            }
            None => {
                principal.pending.permissions.extend(ids.iter().copied());
                tracing::debug!(principal_type = %principal.principal_type, ?ids, "permissions queued");
            }
        }
        self.cache.invalidate();
        Ok(())
    }

    /// Detach one direct permission. Unknown or unheld permissions are a no-op.
    pub fn revoke_permission_to(
        &self,
        principal: &mut PrincipalHandle,
        permission: impl Into<PermissionRef>,
    ) -> Result<()> {
        let guard = self.guards.default_for(&principal.principal_type);
        let permission = match self.resolve_permission(&permission.into(), &guard) {
            Ok(p) => p,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };
        match principal.key() {
            Some(key) => {
                self.store.detach_principal_permissions(&key, &[permission.id])?;
                tracing::debug!(principal = %key, permission = permission.id, "permission revoked");
            }
            None => {
                principal.pending.permissions.remove(&permission.id);
            }
        }
        principal.permissions.retain(|p| p.id != permission.id);
        self.cache.invalidate();
        Ok(())
    }

    pub fn sync_permissions(
        &self,
        principal: &mut PrincipalHandle,
        permissions: impl Into<RefList<Permission>>,
    ) -> Result<()> {
        let permissions = self.collect_permissions(principal, permissions.into())?;
        let ids = ids_of(permissions.iter().map(|p| &p.id));
        match principal.key() {
            Some(key) => {
                self.store.sync_principal_permissions(&key, &ids, true)?;
                tracing::debug!(principal = %key, ?ids, "permissions synced");
                principal.permissions = permissions;
            }
            None => {
                principal.pending.permissions = ids.into_iter().collect();
            }
        }
        self.cache.invalidate();
        Ok(())
    }

    // ========================================================================
    // Permissions on groups
    // ========================================================================

    fn collect_group_permissions(&self, group: &Group, refs: RefList<Permission>) -> Result<Vec<u64>> {
        let mut ids = Vec::new();
        for r in refs.iter().filter(|r| !r.is_blank()) {
            let p = self.resolve_permission(r, &group.guard_name)?;
            if p.guard_name != group.guard_name {
                tracing::warn!(group = group.id, guard = %p.guard_name, "permission from another guard rejected");
                return Err(Error::GuardMismatch {
                    given: p.guard_name,
                    expected: vec![group.guard_name.clone()],
                });
            }
            if !ids.contains(&p.id) {
                ids.push(p.id);
            }
        }
        Ok(ids)
    }

    pub fn give_permission_to_group(&self, group: &Group, permissions: impl Into<RefList<Permission>>) -> Result<()> {
        let ids = self.collect_group_permissions(group, permissions.into())?;
        self.store.sync_group_permissions(group.id, &ids, false)?;
        self.cache.invalidate();
        tracing::debug!(group = group.id, ?ids, "permissions given to group");
        Ok(())
    }

    pub fn revoke_permission_from_group(&self, group: &Group, permission: impl Into<PermissionRef>) -> Result<()> {
        let permission = match self.resolve_permission(&permission.into(), &group.guard_name) {
            Ok(p) => p,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };
        self.store.detach_group_permissions(group.id, &[permission.id])?;
        self.cache.invalidate();
        tracing::debug!(group = group.id, permission = permission.id, "permission revoked from group");
        Ok(())
    }

    pub fn sync_group_permissions(&self, group: &Group, permissions: impl Into<RefList<Permission>>) -> Result<()> {
        let ids = self.collect_group_permissions(group, permissions.into())?;
        self.store.sync_group_permissions(group.id, &ids, true)?;
        self.cache.invalidate();
        tracing::debug!(group = group.id, ?ids, "group permissions synced");
        Ok(())
    }
}
