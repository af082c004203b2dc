//! Process-wide permission cache.
//!
//! Holds an immutable [`PermissionSnapshot`] of every permission, group and
//! group→permission pivot. Rebuilds swap a whole new snapshot in, so a reader
//! holding an `Arc` keeps a consistent view while a rebuild runs. The snapshot
//! is derived data: dropping it loses nothing, the store is the source of truth.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;

use crate::error::Result;
use crate::model::{Group, Permission};
use crate::store::EntityStore;

/// Rows belonging to one guard
#[derive(Debug, Clone, Default)]
pub struct GuardSlice {
    pub permissions: BTreeMap<u64, Permission>,
    pub groups: BTreeMap<u64, Group>,
}

#[derive(Debug)]
pub struct PermissionSnapshot {
    generation: u64,
    built_at: Instant,
    guards: BTreeMap<String, GuardSlice>,
    permissions: BTreeMap<u64, Permission>,
    groups: BTreeMap<u64, Group>,
    group_permissions: BTreeMap<u64, BTreeSet<u64>>,
}

impl PermissionSnapshot {
    fn load(store: &dyn EntityStore, generation: u64) -> Result<Self> {
        let mut guards: BTreeMap<String, GuardSlice> = BTreeMap::new();
        let mut permissions = BTreeMap::new();
        let mut groups = BTreeMap::new();
        let mut group_permissions: BTreeMap<u64, BTreeSet<u64>> = BTreeMap::new();

        for p in store.all_permissions()? {
            guards.entry(p.guard_name.clone()).or_default().permissions.insert(p.id, p.clone());
            permissions.insert(p.id, p);
        }
        for g in store.all_groups()? {
            guards.entry(g.guard_name.clone()).or_default().groups.insert(g.id, g.clone());
            groups.insert(g.id, g);
        }
        for (g, p) in store.all_group_permissions()? {
            group_permissions.entry(g).or_default().insert(p);
        }

        Ok(PermissionSnapshot {
            generation,
            built_at: Instant::now(),
            guards,
            permissions,
            groups,
            group_permissions,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn age(&self) -> Duration {
        self.built_at.elapsed()
    }

    pub fn guard(&self, guard: &str) -> Option<&GuardSlice> {
        self.guards.get(guard)
    }

    /// Guards that own at least one permission or group, sorted
    pub fn guard_names(&self) -> impl Iterator<Item = &str> {
        self.guards.keys().map(String::as_str)
    }

    pub fn permission(&self, id: u64) -> Option<&Permission> {
        self.permissions.get(&id)
    }

    pub fn group(&self, id: u64) -> Option<&Group> {
        self.groups.get(&id)
    }

    pub fn permission_count(&self) -> usize {
        self.permissions.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Permissions granted by one group, by id
    pub fn permissions_of_group(&self, group_id: u64) -> impl Iterator<Item = &Permission> {
        self.group_permissions
            .get(&group_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.permissions.get(id))
    }

    pub fn group_grants(&self, group_id: u64, permission_id: u64) -> bool {
        self.group_permissions.get(&group_id).is_some_and(|s| s.contains(&permission_id))
    }
}

/// Observable cache state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Empty,
    Fresh,
    Stale,
}

#[derive(Debug)]
pub struct PermissionCache {
    current: ArcSwapOption<PermissionSnapshot>,
    stale: AtomicBool,
    generation: AtomicU64,
    expiry: Option<Duration>,
}

impl PermissionCache {
    pub fn new(expiry: Option<Duration>) -> Self {
        PermissionCache {
            current: ArcSwapOption::empty(),
            stale: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            expiry,
        }
    }

    /// Current snapshot, rebuilding first when missing, invalidated or expired
    pub fn snapshot(&self, store: &dyn EntityStore) -> Result<Arc<PermissionSnapshot>> {
        if let Some(snap) = self.current.load_full() {
            if !self.stale.load(Ordering::Acquire) && !self.expired(&snap) {
                return Ok(snap);
            }
        }
        self.refresh(store)
    }

    /// Rebuild from the store and swap the new snapshot in
    pub fn refresh(&self, store: &dyn EntityStore) -> Result<Arc<PermissionSnapshot>> {
        // Cleared before the read so an invalidation racing the rebuild marks it stale again.
        self.stale.store(false, Ordering::Release);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let snap = match PermissionSnapshot::load(store, generation) {
            Ok(s) => Arc::new(s),
            Err(e) => {
                self.stale.store(true, Ordering::Release);
                return Err(e);
            }
        };
        // A slower rebuild must not replace a newer generation.
        self.current.rcu(|cur| match cur {
            Some(c) if c.generation > generation => Some(Arc::clone(c)),
            _ => Some(Arc::clone(&snap)),
        });
        tracing::info!(
            generation,
            permissions = snap.permission_count(),
            groups = snap.group_count(),
            "permission cache rebuilt"
        );
        Ok(snap)
    }

    /// Mark stale; the next [`snapshot`](Self::snapshot) rebuilds
    pub fn invalidate(&self) {
        self.stale.store(true, Ordering::Release);
        tracing::trace!("permission cache invalidated");
    }

    /// Drop the snapshot entirely
    pub fn forget(&self) {
        self.current.store(None);
        self.stale.store(false, Ordering::Release);
    }

    pub fn state(&self) -> CacheState {
        match self.current.load_full() {
            None => CacheState::Empty,
            Some(s) if self.stale.load(Ordering::Acquire) || self.expired(&s) => CacheState::Stale,
            Some(_) => CacheState::Fresh,
        }
    }

    /// Generation of the last built snapshot (0 before the first build)
    pub fn generation(&self) -> u64 {
        self.current.load_full().map_or(0, |s| s.generation)
    }

    fn expired(&self, snap: &PermissionSnapshot) -> bool {
        self.expiry.is_some_and(|ttl| snap.age() >= ttl)
    }
}
