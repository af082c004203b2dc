//! Membership and permission checks.
//!
//! Group predicates only look at what the handle has loaded, so they live on
//! [`PrincipalHandle`]. Permission checks also need the group→permission
//! pivots and go through the cache snapshot.

use std::collections::{BTreeMap, BTreeSet};

use crate::authorizer::Authorizer;
use crate::cache::PermissionSnapshot;
use crate::constants::PIPE;
use crate::error::{Error, Result};
use crate::model::{Group, Permission, PrincipalHandle};
use crate::reference::{split_pipe, PermissionRef, RefList, Reference};
use crate::store::EntityStore;
use crate::wildcard;

/// Expand names that are themselves pipe lists
fn flatten<T>(refs: RefList<T>) -> Vec<Reference<T>> {
    let mut out = Vec::with_capacity(refs.len());
    for r in refs {
        match r {
            Reference::Name(n) if n.contains(PIPE) => out.extend(split_pipe(&n).into_iter().map(Reference::Name)),
            other => out.push(other),
        }
    }
    out
}

impl PrincipalHandle {
    fn groups_in<'a>(&'a self, guard: Option<&'a str>) -> impl Iterator<Item = &'a Group> + 'a {
        self.groups.iter().filter(move |g| guard.map_or(true, |gd| g.guard_name == gd))
    }

    /// True when any referenced group is held (restricted to `guard` when given).
    /// A `Group` value matches by id regardless of guard.
    pub fn has_group(&self, groups: impl Into<RefList<Group>>, guard: Option<&str>) -> bool {
        flatten(groups.into()).iter().any(|r| match r {
            Reference::Name(n) => self.groups_in(guard).any(|g| &g.name == n),
            Reference::Id(id) => self.groups_in(guard).any(|g| g.id == *id),
            Reference::Value(v) => self.groups.iter().any(|g| g.id == v.id),
        })
    }

    pub fn has_any_group(&self, groups: impl Into<RefList<Group>>) -> bool {
        self.has_group(groups, None)
    }

    /// Every requested group is held. An empty request holds trivially.
    pub fn has_all_groups(&self, groups: impl Into<RefList<Group>>, guard: Option<&str>) -> bool {
        let refs = groups.into();
        if let [Reference::Value(v)] = refs.0.as_slice() {
            return self.groups.iter().any(|g| g.id == v.id);
        }

        let held: BTreeSet<&str> = self.groups_in(guard).map(|g| g.name.as_str()).collect();
        let mut requested: BTreeSet<&str> = BTreeSet::new();
        for r in refs.iter() {
            let name = match r {
                Reference::Name(n) => n.as_str(),
                Reference::Value(v) => v.name.as_str(),
                Reference::Id(id) => match self.groups_in(guard).find(|g| g.id == *id) {
                    Some(g) => g.name.as_str(),
                    None => return false,
                },
            };
            requested.insert(name);
        }
        requested.intersection(&held).count() == requested.len()
    }

    /// Held group names, in assignment order
    pub fn group_names(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.name.as_str()).collect()
    }
}

impl<S: EntityStore> Authorizer<S> {
    fn effective(&self, principal: &PrincipalHandle, snap: &PermissionSnapshot) -> BTreeMap<u64, Permission> {
        let mut out: BTreeMap<u64, Permission> = principal
            .permissions
            .iter()
            .map(|p| (p.id, snap.permission(p.id).unwrap_or(p).clone()))
            .collect();
        for g in &principal.groups {
            for p in snap.permissions_of_group(g.id) {
                out.entry(p.id).or_insert_with(|| p.clone());
            }
        }
        out
    }

    /// Ids of principals of `principal_type` holding any of the referenced groups
    pub fn scope_group(
        &self,
        principal_type: &str,
        groups: impl Into<RefList<Group>>,
        guard: Option<&str>,
    ) -> Result<Vec<u64>> {
        let guard = self.guards.resolve(guard, principal_type)?;
        let mut ids = Vec::new();
        for r in flatten(groups.into()) {
            let g = self.resolve_group(&r, &guard)?;
            if let Reference::Value(_) = r {
                self.ensure_principal_guard(principal_type, &g.guard_name)?;
            }
            ids.push(g.id);
        }
        self.store.principals_with_groups(principal_type, &ids)
    }

    /// Direct grant or grant through any held group.
    ///
    /// With wildcard permissions enabled the requested name is matched against
    /// every held pattern of the guard instead, and a permission row need not exist.
    pub fn has_permission_to(
        &self,
        principal: &PrincipalHandle,
        permission: impl Into<PermissionRef>,
        guard: Option<&str>,
    ) -> Result<bool> {
        let guard = self.guards.resolve(guard, &principal.principal_type)?;
        let permission = permission.into();

        if self.config.enable_wildcard_permission {
            let (requested, guard) = match permission {
                Reference::Name(n) => (n, guard),
                Reference::Value(p) => {
                    self.ensure_principal_guard(&principal.principal_type, &p.guard_name)?;
                    (p.name, p.guard_name)
                }
                id @ Reference::Id(_) => (self.resolve_permission(&id, &guard)?.name, guard),
            };
            let snap = self.snapshot()?;
            let held = self.effective(principal, &snap);
            let granted = wildcard::matches(held.values(), &requested, &guard);
            tracing::trace!(principal_type = %principal.principal_type, %requested, %guard, granted, "wildcard check");
            return Ok(granted);
        }

        let permission = self.resolve_permission(&permission, &guard)?;
        self.ensure_principal_guard(&principal.principal_type, &permission.guard_name)?;
        let granted = principal.permissions.iter().any(|p| p.id == permission.id) || {
            let snap = self.snapshot()?;
            principal.groups.iter().any(|g| snap.group_grants(g.id, permission.id))
        };
        tracing::trace!(principal_type = %principal.principal_type, permission = %permission.name, granted, "permission check");
        Ok(granted)
    }

    /// Does the group itself grant the permission?
    pub fn group_has_permission_to(&self, group: &Group, permission: impl Into<PermissionRef>) -> Result<bool> {
        let permission = permission.into();
        let snap = self.snapshot()?;

        if self.config.enable_wildcard_permission {
            let requested = match permission {
                Reference::Name(n) => n,
                Reference::Value(p) if p.guard_name != group.guard_name => {
                    return Err(Error::GuardMismatch {
                        given: p.guard_name,
                        expected: vec![group.guard_name.clone()],
                    });
                }
                Reference::Value(p) => p.name,
                id @ Reference::Id(_) => self.resolve_permission(&id, &group.guard_name)?.name,
            };
            return Ok(wildcard::matches(snap.permissions_of_group(group.id), &requested, &group.guard_name));
        }

        let permission = self.resolve_permission(&permission, &group.guard_name)?;
        if permission.guard_name != group.guard_name {
            return Err(Error::GuardMismatch {
                given: permission.guard_name,
                expected: vec![group.guard_name.clone()],
            });
        }
        Ok(snap.group_grants(group.id, permission.id))
    }

    /// Directly assigned, ignoring groups
    pub fn has_direct_permission(&self, principal: &PrincipalHandle, permission: impl Into<PermissionRef>) -> Result<bool> {
        let guard = self.guards.default_for(&principal.principal_type);
        let permission = self.resolve_permission(&permission.into(), &guard)?;
        Ok(principal.permissions.iter().any(|p| p.id == permission.id))
    }

    /// [`has_permission_to`](Self::has_permission_to), with an unknown permission reading as `false`
    pub fn check_permission_to(
        &self,
        principal: &PrincipalHandle,
        permission: impl Into<PermissionRef>,
        guard: Option<&str>,
    ) -> Result<bool> {
        match self.has_permission_to(principal, permission, guard) {
            Err(e) if e.is_not_found() => Ok(false),
            other => other,
        }
    }

    pub fn has_any_permission(&self, principal: &PrincipalHandle, permissions: impl Into<RefList<Permission>>) -> Result<bool> {
        for p in flatten(permissions.into()) {
            if self.check_permission_to(principal, p, None)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn has_all_permissions(&self, principal: &PrincipalHandle, permissions: impl Into<RefList<Permission>>) -> Result<bool> {
        for p in flatten(permissions.into()) {
            if !self.check_permission_to(principal, p, None)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    // ========================================================================
    // Listings (deduplicated, ordered by id)
    // ========================================================================

    pub fn direct_permissions(&self, principal: &PrincipalHandle) -> Vec<Permission> {
        let mut out = principal.permissions.clone();
        out.sort_by_key(|p| p.id);
        out
    }

    pub fn permissions_via_groups(&self, principal: &PrincipalHandle) -> Result<Vec<Permission>> {
        let snap = self.snapshot()?;
        let mut out: BTreeMap<u64, Permission> = BTreeMap::new();
        for g in &principal.groups {
            for p in snap.permissions_of_group(g.id) {
                out.entry(p.id).or_insert_with(|| p.clone());
            }
        }
        Ok(out.into_values().collect())
    }

    /// Direct and inherited permissions together
    pub fn all_permissions(&self, principal: &PrincipalHandle) -> Result<Vec<Permission>> {
        let snap = self.snapshot()?;
        Ok(self.effective(principal, &snap).into_values().collect())
    }
}
