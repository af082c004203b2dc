//! The relationship engine.
//!
//! [`Authorizer`] ties the guard resolver, the entity store and the permission
//! cache together. Its operations are split by concern:
//! - `entity.rs`: creating, finding and renaming groups/permissions
//! - `write.rs`: assigning, removing and syncing associations
//! - `read.rs`: membership and permission checks

use std::sync::Arc;

use crate::cache::{PermissionCache, PermissionSnapshot};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::guard::GuardResolver;
use crate::model::{DeleteMode, Group, Permission, PrincipalHandle, PrincipalKey};
use crate::reference::{GroupRef, PermissionRef, RefList, Reference};
use crate::store::EntityStore;

pub struct Authorizer<S> {
    pub(crate) store: S,
    pub(crate) config: Arc<Config>,
    pub(crate) guards: GuardResolver,
    pub(crate) cache: PermissionCache,
}

impl<S: EntityStore> Authorizer<S> {
    pub fn new(store: S, config: Config) -> Result<Self> {
        config.validate()?;
        let cache = PermissionCache::new(config.cache_expiry());
        let config = Arc::new(config);
        Ok(Authorizer {
            store,
            guards: GuardResolver::new(Arc::clone(&config)),
            config,
            cache,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn guards(&self) -> &GuardResolver {
        &self.guards
    }

    pub fn cache(&self) -> &PermissionCache {
        &self.cache
    }

    /// Current cache snapshot, rebuilt if stale
    pub fn snapshot(&self) -> Result<Arc<PermissionSnapshot>> {
        self.cache.snapshot(&self.store)
    }

    // ========================================================================
    // Reference resolution
    // ========================================================================

    pub(crate) fn resolve_group(&self, r: &GroupRef, guard: &str) -> Result<Group> {
        match r {
            Reference::Name(name) => self.store.find_group(name, guard)?.ok_or_else(|| Error::GroupNamed {
                name: name.clone(),
                guard: guard.to_string(),
            }),
            Reference::Id(id) => self.store.find_group_by_id(*id, guard)?.ok_or_else(|| Error::GroupWithId {
                id: *id,
                guard: guard.to_string(),
            }),
            Reference::Value(g) => Ok(g.clone()),
        }
    }

    pub(crate) fn resolve_permission(&self, r: &PermissionRef, guard: &str) -> Result<Permission> {
        match r {
            Reference::Name(name) => self.store.find_permission(name, guard)?.ok_or_else(|| Error::PermissionNamed {
                name: name.clone(),
                guard: guard.to_string(),
            }),
            Reference::Id(id) => self.store.find_permission_by_id(*id, guard)?.ok_or_else(|| Error::PermissionWithId {
                id: *id,
                guard: guard.to_string(),
            }),
            Reference::Value(p) => Ok(p.clone()),
        }
    }

    /// Reject a row whose guard the principal type does not act under
    pub(crate) fn ensure_principal_guard(&self, principal_type: &str, row_guard: &str) -> Result<()> {
        let expected = self.guards.guard_names(principal_type);
        if expected.iter().any(|g| g == row_guard) {
            return Ok(());
        }
        tracing::warn!(principal_type, guard = row_guard, ?expected, "cross-guard association rejected");
        Err(Error::GuardMismatch { given: row_guard.to_string(), expected })
    }

    /// Resolve, guard-check and dedupe group refs for a principal. Blank names are skipped.
    pub(crate) fn collect_groups(&self, principal: &PrincipalHandle, refs: RefList<Group>) -> Result<Vec<Group>> {
        let guard = self.guards.default_for(&principal.principal_type);
        let mut out: Vec<Group> = Vec::new();
        for r in refs.iter().filter(|r| !r.is_blank()) {
            let g = self.resolve_group(r, &guard)?;
            self.ensure_principal_guard(&principal.principal_type, &g.guard_name)?;
            if !out.iter().any(|o| o.id == g.id) {
                out.push(g);
            }
        }
        Ok(out)
    }

    pub(crate) fn collect_permissions(&self, principal: &PrincipalHandle, refs: RefList<Permission>) -> Result<Vec<Permission>> {
        let guard = self.guards.default_for(&principal.principal_type);
        let mut out: Vec<Permission> = Vec::new();
        for r in refs.iter().filter(|r| !r.is_blank()) {
            let p = self.resolve_permission(r, &guard)?;
            self.ensure_principal_guard(&principal.principal_type, &p.guard_name)?;
            if !out.iter().any(|o| o.id == p.id) {
                out.push(p);
            }
        }
        Ok(out)
    }

    // ========================================================================
    // Principal lifecycle hooks
    // ========================================================================

    /// Load a persisted principal with its groups and direct permissions
    pub fn load_principal(&self, principal_type: &str, id: u64) -> Result<PrincipalHandle> {
        let mut handle = PrincipalHandle::new(principal_type);
        handle.id = Some(id);
        self.refresh_principal(&mut handle)?;
        Ok(handle)
    }

    /// Re-read a principal's associations from the store
    pub fn refresh_principal(&self, principal: &mut PrincipalHandle) -> Result<()> {
        let Some(key) = principal.key() else {
            return Ok(());
        };
        let assoc = self.store.list_associations(&key)?;
        let mut snap = self.snapshot()?;
        let known = |snap: &PermissionSnapshot| {
            assoc.group_ids.iter().all(|id| snap.group(*id).is_some())
                && assoc.permission_ids.iter().all(|id| snap.permission(*id).is_some())
        };
        // rows written behind the cache's back
        if !known(&snap) {
            snap = self.cache.refresh(&self.store)?;
            if !known(&snap) {
                tracing::warn!(principal = %key, "associations reference missing rows");
            }
        }
        principal.groups = assoc.group_ids.iter().filter_map(|id| snap.group(*id).cloned()).collect();
        principal.permissions = assoc.permission_ids.iter().filter_map(|id| snap.permission(*id).cloned()).collect();
        Ok(())
    }

    /// Called once the caller has persisted a new principal: flushes writes
    /// queued on this handle while it had no id.
    pub fn principal_saved(&self, principal: &mut PrincipalHandle, id: u64) -> Result<()> {
        principal.id = Some(id);
        let key = PrincipalKey::new(principal.principal_type.clone(), id);
        if !principal.pending.is_empty() {
            let groups: Vec<u64> = principal.pending.groups.iter().copied().collect();
            let permissions: Vec<u64> = principal.pending.permissions.iter().copied().collect();
            self.store.sync_principal_groups(&key, &groups, false)?;
            self.store.sync_principal_permissions(&key, &permissions, false)?;
            principal.pending = Default::default();
            self.cache.invalidate();
            tracing::debug!(principal = %key, groups = groups.len(), permissions = permissions.len(), "flushed pending associations");
        }
        self.refresh_principal(principal)
    }

    /// Called before the caller deletes a principal's row.
    ///
    /// Soft deletion keeps every association so a restore brings them back;
    /// forced deletion detaches them all.
    pub fn principal_deleting(&self, principal: &mut PrincipalHandle, mode: DeleteMode) -> Result<()> {
        match mode {
            DeleteMode::Soft => {
                principal.trashed = true;
            }
            DeleteMode::Force => {
                if let Some(key) = principal.key() {
                    self.store.on_principal_hard_delete(&key)?;
                    tracing::debug!(principal = %key, "detached all associations");
                }
                principal.groups.clear();
                principal.permissions.clear();
                principal.pending = Default::default();
                self.cache.invalidate();
            }
        }
        Ok(())
    }

    /// Undo a soft delete
    pub fn principal_restored(&self, principal: &mut PrincipalHandle) -> Result<()> {
        principal.trashed = false;
        self.refresh_principal(principal)
    }
}
