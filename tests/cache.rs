//! Snapshot cache: rebuilds, invalidation and concurrent readers

mod common;

use std::sync::Arc;
use std::thread;

use common::{config, fixture, fixture_with_config};
use groupwarden::{Authorizer, CacheState, EntityStore, MemoryStore, PermissionCache, PrincipalKey};

#[test]
fn first_read_builds_a_snapshot() {
    let cache = PermissionCache::new(None);
    let store = MemoryStore::new();
    assert_eq!(cache.state(), CacheState::Empty);
    assert_eq!(cache.generation(), 0);

    let snap = cache.snapshot(&store).unwrap();
    assert_eq!(snap.generation(), 1);
    assert_eq!(cache.state(), CacheState::Fresh);
}

#[test]
fn reads_reuse_the_snapshot_until_invalidated() {
    let f = fixture();
    let a = f.authz.snapshot().unwrap();
    let b = f.authz.snapshot().unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    f.authz.cache().invalidate();
    assert_eq!(f.authz.cache().state(), CacheState::Stale);
    let c = f.authz.snapshot().unwrap();
    assert!(c.generation() > a.generation());
    assert_eq!(f.authz.cache().state(), CacheState::Fresh);
}

#[test]
fn every_write_invalidates() {
    let mut f = fixture();
    let _ = f.authz.snapshot().unwrap();

    f.authz.create_permission("publish", None).unwrap();
    assert_eq!(f.authz.cache().state(), CacheState::Stale);
    let _ = f.authz.snapshot().unwrap();

    f.authz.give_permission_to_group(&f.test_group2, "publish").unwrap();
    assert_eq!(f.authz.cache().state(), CacheState::Stale);
    let _ = f.authz.snapshot().unwrap();

    f.authz.assign_group(&mut f.user, "testGroup2").unwrap();
    assert_eq!(f.authz.cache().state(), CacheState::Stale);
    assert!(f.authz.has_permission_to(&f.user, "publish", None).unwrap());
    assert_eq!(f.authz.cache().state(), CacheState::Fresh);
}

/// A reader holding a snapshot keeps its view while the catalogue changes
/// Rows written straight to the store show up on the next load
#[test]
fn load_sees_rows_written_past_the_cache() {
    let f = fixture();
    let _ = f.authz.snapshot().unwrap();

    let late = f.authz.store().create_group("late", "web").unwrap();
    let key = PrincipalKey::new("user", 1);
    f.authz.store().sync_principal_groups(&key, &[late.id], false).unwrap();
    assert_eq!(f.authz.cache().state(), CacheState::Fresh);

    let user = f.authz.load_principal("user", 1).unwrap();
    assert_eq!(user.group_names(), vec!["late"]);
    assert!(user.has_group("late", None));
}

#[test]
fn held_snapshot_is_immutable() {
    let f = fixture();
    let before = f.authz.snapshot().unwrap();
    let count = before.permission_count();

    f.authz.create_permission("later", None).unwrap();
    let after = f.authz.snapshot().unwrap();

    assert_eq!(before.permission_count(), count);
    assert_eq!(after.permission_count(), count + 1);
}

#[test]
fn forget_drops_the_snapshot() {
    let f = fixture();
    let _ = f.authz.snapshot().unwrap();
    f.authz.cache().forget();
    assert_eq!(f.authz.cache().state(), CacheState::Empty);
    assert!(f.authz.snapshot().unwrap().permission_count() > 0);
}

#[test]
fn zero_expiry_never_expires() {
    let f = fixture_with_config(config().with_cache_expiry(0));
    assert_eq!(f.authz.config().cache_expiry(), None);
    let a = f.authz.snapshot().unwrap();
    let b = f.authz.snapshot().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn snapshot_groups_rows_by_guard() {
    let f = fixture();
    let snap = f.authz.snapshot().unwrap();
    assert_eq!(snap.guard_names().collect::<Vec<_>>(), vec!["admin", "web"]);
    assert_eq!(snap.guard("web").unwrap().groups.len(), 2);
    assert_eq!(snap.guard("admin").unwrap().permissions.len(), 1);
    assert!(snap.group_grants(f.test_group.id, f.edit_articles.id));
    assert!(!snap.group_grants(f.test_group2.id, f.edit_articles.id));
}

/// Readers on many threads see a consistent answer while a writer keeps invalidating
#[test]
fn concurrent_readers_and_writer() {
    let mut f = fixture();
    f.authz.assign_group(&mut f.user, "testGroup").unwrap();
    let authz: Arc<Authorizer<MemoryStore>> = Arc::new(f.authz);
    let user = Arc::new(f.user);

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let authz = Arc::clone(&authz);
            let user = Arc::clone(&user);
            thread::spawn(move || {
                for _ in 0..200 {
                    assert!(authz.has_permission_to(&user, "edit-articles", None).unwrap());
                }
            })
        })
        .collect();

    for i in 0..50 {
        authz.create_permission(&format!("extra-{i}"), None).unwrap();
    }
    for r in readers {
        r.join().unwrap();
    }
    assert_eq!(authz.snapshot().unwrap().guard("web").unwrap().permissions.len(), 53);
}
