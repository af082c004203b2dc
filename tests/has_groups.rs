//! Group membership: assignment, removal, sync and the membership predicates

mod common;

use std::collections::BTreeSet;

use common::fixture;
use groupwarden::{DeleteMode, ErrorKind, PrincipalHandle};
use proptest::prelude::*;

// ============================================================================
// Assignment
// ============================================================================

#[test]
fn assign_by_name_id_and_value() {
    let mut f = fixture();

    f.authz.assign_group(&mut f.user, "testGroup").unwrap();
    assert!(f.user.has_group("testGroup", None));

    let g2_id = f.test_group2.id;
    f.authz.assign_group(&mut f.user, g2_id).unwrap();
    assert!(f.user.has_group(g2_id, None));

    let mut other = f.authz.load_principal("user", 2).unwrap();
    f.authz.assign_group(&mut other, &f.test_group).unwrap();
    assert!(other.has_group(&f.test_group, None));
}

#[test]
fn assign_list_and_pipe_string() {
    let mut f = fixture();
    f.authz.assign_group(&mut f.user, "testGroup|testGroup2").unwrap();
    assert_eq!(f.user.group_names(), vec!["testGroup", "testGroup2"]);

    let mut other = f.authz.load_principal("user", 2).unwrap();
    f.authz.assign_group(&mut other, ["testGroup2", "testGroup"]).unwrap();
    assert_eq!(other.group_names(), vec!["testGroup2", "testGroup"]);
}

/// Assigning the same group twice keeps one association
#[test]
fn assignment_is_idempotent() {
    let mut f = fixture();
    f.authz.assign_group(&mut f.user, "testGroup").unwrap();
    f.authz.assign_group(&mut f.user, "testGroup").unwrap();
    f.authz.assign_group(&mut f.user, ["testGroup", "testGroup"]).unwrap();

    assert_eq!(f.user.groups().len(), 1);
    let reloaded = f.authz.load_principal("user", 1).unwrap();
    assert_eq!(reloaded.group_names(), vec!["testGroup"]);
}

#[test]
fn blank_names_are_ignored() {
    let mut f = fixture();
    f.authz.assign_group(&mut f.user, ["", "testGroup", " "]).unwrap();
    assert_eq!(f.user.group_names(), vec!["testGroup"]);
}

#[test]
fn assigning_unknown_group_fails() {
    let mut f = fixture();
    let e = f.authz.assign_group(&mut f.user, "evil-emperor").unwrap_err();
    assert_eq!(e.kind(), ErrorKind::NotFound);
}

/// A group name from another guard does not resolve under the principal's guard
#[test]
fn assigning_other_guard_group_by_name_is_not_found() {
    let mut f = fixture();
    let e = f.authz.assign_group(&mut f.user, "testAdminGroup").unwrap_err();
    assert_eq!(e.kind(), ErrorKind::NotFound);
}

#[test]
fn assigning_other_guard_group_value_is_a_guard_mismatch() {
    let mut f = fixture();
    let e = f.authz.assign_group(&mut f.user, &f.test_admin_group).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::GuardMismatch);
    assert!(f.user.groups().is_empty());
    assert!(f.authz.load_principal("user", 1).unwrap().groups().is_empty());
}

/// One bad reference in a list means nothing is written
#[test]
fn failed_assignment_writes_nothing() {
    let mut f = fixture();
    let e = f.authz.assign_group(&mut f.user, ["testGroup", "nope"]).unwrap_err();
    assert!(e.is_not_found());
    assert!(f.user.groups().is_empty());
    assert!(f.authz.load_principal("user", 1).unwrap().groups().is_empty());
}

#[test]
fn admin_principal_takes_admin_groups() {
    let mut f = fixture();
    f.authz.assign_group(&mut f.admin, "testAdminGroup").unwrap();
    assert!(f.admin.has_group("testAdminGroup", None));

    let e = f.authz.assign_group(&mut f.admin, &f.test_group).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::GuardMismatch);
}

// ============================================================================
// Removal and sync
// ============================================================================

#[test]
fn remove_group_detaches() {
    let mut f = fixture();
    f.authz.assign_group(&mut f.user, "testGroup|testGroup2").unwrap();
    f.authz.remove_group(&mut f.user, "testGroup").unwrap();

    assert!(!f.user.has_group("testGroup", None));
    assert!(f.user.has_group("testGroup2", None));
    let reloaded = f.authz.load_principal("user", 1).unwrap();
    assert_eq!(reloaded.group_names(), vec!["testGroup2"]);
}

#[test]
fn removing_unknown_or_unheld_group_is_a_noop() {
    let mut f = fixture();
    f.authz.remove_group(&mut f.user, "does-not-exist").unwrap();
    f.authz.remove_group(&mut f.user, "testGroup").unwrap();
    assert!(f.user.groups().is_empty());
}

#[test]
fn sync_replaces_held_groups() {
    let mut f = fixture();
    f.authz.assign_group(&mut f.user, "testGroup").unwrap();
    f.authz.sync_groups(&mut f.user, "testGroup2").unwrap();

    assert_eq!(f.user.group_names(), vec!["testGroup2"]);
    assert_eq!(f.authz.load_principal("user", 1).unwrap().group_names(), vec!["testGroup2"]);
}

#[test]
fn sync_with_empty_list_removes_everything() {
    let mut f = fixture();
    f.authz.assign_group(&mut f.user, "testGroup|testGroup2").unwrap();
    f.authz.sync_groups(&mut f.user, Vec::<&str>::new()).unwrap();

    assert!(f.user.groups().is_empty());
    assert!(f.authz.load_principal("user", 1).unwrap().groups().is_empty());
}

#[test]
fn failed_sync_keeps_previous_groups() {
    let mut f = fixture();
    f.authz.assign_group(&mut f.user, "testGroup").unwrap();

    let admin_group = f.test_admin_group.clone();
    let e = f.authz.sync_groups(&mut f.user, vec![groupwarden::GroupRef::from("testGroup2"), admin_group.into()]).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::GuardMismatch);

    assert_eq!(f.user.group_names(), vec!["testGroup"]);
    assert_eq!(f.authz.load_principal("user", 1).unwrap().group_names(), vec!["testGroup"]);
}

// ============================================================================
// Predicates
// ============================================================================

#[test]
fn has_group_respects_guard() {
    let mut f = fixture();
    f.authz.assign_group(&mut f.user, "testGroup").unwrap();

    assert!(f.user.has_group("testGroup", Some("web")));
    assert!(!f.user.has_group("testGroup", Some("fakeGuard")));
    assert!(!f.user.has_group(f.test_group.id, Some("admin")));
    assert!(!f.user.has_group("testGroup2", None));
}

#[test]
fn has_group_with_lists_is_any() {
    let mut f = fixture();
    f.authz.assign_group(&mut f.user, "testGroup").unwrap();

    assert!(f.user.has_group(["nope", "testGroup"], None));
    assert!(f.user.has_group(["nope", "other|testGroup"], None));
    assert!(f.user.has_group("testGroup2|testGroup", None));
    assert!(!f.user.has_group(["nope", "testGroup2"], None));
    assert!(!f.user.has_group(Vec::<&str>::new(), None));
}

#[test]
fn has_any_group_ignores_guard() {
    let mut f = fixture();
    f.authz.assign_group(&mut f.user, "testGroup").unwrap();
    assert!(f.user.has_any_group("testGroup2|testGroup"));
    assert!(f.user.has_any_group(vec![f.test_group.id]));
    assert!(!f.user.has_any_group("testGroup2"));
}

#[test]
fn has_all_groups_needs_every_group() {
    let mut f = fixture();
    f.authz.assign_group(&mut f.user, "testGroup").unwrap();

    assert!(f.user.has_all_groups("testGroup", None));
    assert!(!f.user.has_all_groups(["testGroup", "testGroup2"], None));
    assert!(!f.user.has_all_groups("testGroup|testGroup2", None));

    f.authz.assign_group(&mut f.user, "testGroup2").unwrap();
    assert!(f.user.has_all_groups(["testGroup", "testGroup2"], None));
    assert!(f.user.has_all_groups("testGroup|testGroup2", None));
    assert!(f.user.has_all_groups(vec![f.test_group.id, f.test_group2.id], None));
    assert!(f.user.has_all_groups(vec![f.test_group.clone(), f.test_group2.clone()], None));
    assert!(f.user.has_all_groups(["testGroup", "testGroup2"], Some("web")));
    assert!(!f.user.has_all_groups(["testGroup", "testGroup2"], Some("fakeGuard")));
    assert!(!f.user.has_all_groups(vec![f.test_group.id, f.test_admin_group.id], None));
}

#[test]
fn has_all_groups_with_empty_request_holds() {
    let f = fixture();
    assert!(f.user.has_all_groups(Vec::<&str>::new(), None));
}

#[test]
fn group_names_keep_assignment_order() {
    let mut f = fixture();
    f.authz.assign_group(&mut f.user, "testGroup2").unwrap();
    f.authz.assign_group(&mut f.user, "testGroup").unwrap();
    assert_eq!(f.user.group_names(), vec!["testGroup2", "testGroup"]);
}

// ============================================================================
// Scoping
// ============================================================================

#[test]
fn scope_group_finds_holders() {
    let mut f = fixture();
    let mut second = f.authz.load_principal("user", 2).unwrap();
    let _third = f.authz.load_principal("user", 3).unwrap();
    f.authz.assign_group(&mut f.user, "testGroup").unwrap();
    f.authz.assign_group(&mut second, "testGroup2").unwrap();
    f.authz.assign_group(&mut f.admin, "testAdminGroup").unwrap();

    assert_eq!(f.authz.scope_group("user", "testGroup", None).unwrap(), vec![1]);
    assert_eq!(f.authz.scope_group("user", "testGroup|testGroup2", None).unwrap(), vec![1, 2]);
    assert_eq!(f.authz.scope_group("user", &f.test_group2, None).unwrap(), vec![2]);
    assert_eq!(f.authz.scope_group("admin", "testAdminGroup", None).unwrap(), vec![1]);
}

#[test]
fn scope_group_errors() {
    let f = fixture();
    assert!(f.authz.scope_group("user", "nope", None).unwrap_err().is_not_found());
    assert_eq!(
        f.authz.scope_group("user", &f.test_admin_group, None).unwrap_err().kind(),
        ErrorKind::GuardMismatch
    );
    assert_eq!(
        f.authz.scope_group("user", "testGroup", Some("fakeGuard")).unwrap_err().kind(),
        ErrorKind::UnknownGuard
    );
}

// ============================================================================
// Unsaved principals
// ============================================================================

/// Writes on two unsaved handles never leak into each other
#[test]
fn pending_writes_are_per_handle() {
    let f = fixture();
    let mut a = PrincipalHandle::new("user");
    let mut b = PrincipalHandle::new("user");

    f.authz.assign_group(&mut a, "testGroup").unwrap();
    f.authz.assign_group(&mut b, "testGroup2").unwrap();
    assert!(a.has_pending_writes());
    assert!(!a.has_group("testGroup", None));

    f.authz.principal_saved(&mut a, 10).unwrap();
    f.authz.principal_saved(&mut b, 11).unwrap();

    assert!(!a.has_pending_writes());
    assert_eq!(a.group_names(), vec!["testGroup"]);
    assert_eq!(b.group_names(), vec!["testGroup2"]);
    assert_eq!(f.authz.load_principal("user", 10).unwrap().group_names(), vec!["testGroup"]);
    assert_eq!(f.authz.load_principal("user", 11).unwrap().group_names(), vec!["testGroup2"]);
}

#[test]
fn pending_sync_replaces_pending_assignments() {
    let f = fixture();
    let mut p = PrincipalHandle::new("user");
    f.authz.assign_group(&mut p, "testGroup").unwrap();
    f.authz.sync_groups(&mut p, "testGroup2").unwrap();
    f.authz.remove_group(&mut p, "testGroup2").unwrap();
    f.authz.assign_group(&mut p, "testGroup").unwrap();
    f.authz.principal_saved(&mut p, 5).unwrap();
    assert_eq!(p.group_names(), vec!["testGroup"]);
}

#[test]
fn pending_assignment_is_still_guard_checked() {
    let f = fixture();
    let mut p = PrincipalHandle::new("user");
    let e = f.authz.assign_group(&mut p, &f.test_admin_group).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::GuardMismatch);
    assert!(!p.has_pending_writes());
}

// ============================================================================
// Deletion
// ============================================================================

#[test]
fn soft_delete_keeps_groups() {
    let mut f = fixture();
    f.authz.assign_group(&mut f.user, "testGroup").unwrap();
    f.authz.principal_deleting(&mut f.user, DeleteMode::Soft).unwrap();
    assert!(f.user.is_trashed());

    assert!(f.authz.load_principal("user", 1).unwrap().has_group("testGroup", None));
    f.authz.principal_restored(&mut f.user).unwrap();
    assert!(!f.user.is_trashed());
    assert!(f.user.has_group("testGroup", None));
}

#[test]
fn force_delete_detaches_groups() {
    let mut f = fixture();
    f.authz.assign_group(&mut f.user, "testGroup").unwrap();
    f.authz.give_permission_to(&mut f.user, "edit-news").unwrap();
    f.authz.principal_deleting(&mut f.user, DeleteMode::Force).unwrap();

    assert!(!f.user.has_group("testGroup", None));
    let reloaded = f.authz.load_principal("user", 1).unwrap();
    assert!(reloaded.groups().is_empty());
    assert!(reloaded.permissions().is_empty());
    assert!(f.authz.scope_group("user", "testGroup", None).unwrap().is_empty());
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Any sequence of assignments ends with exactly the distinct groups named
    #[test]
    fn assignment_sequence_yields_distinct_set(picks in prop::collection::vec(0usize..2, 0..12)) {
        let mut f = fixture();
        let names = ["testGroup", "testGroup2"];
        for i in &picks {
            f.authz.assign_group(&mut f.user, names[*i]).unwrap();
        }
        let expected: BTreeSet<&str> = picks.iter().map(|i| names[*i]).collect();
        let held: BTreeSet<&str> = f.user.group_names().into_iter().collect();
        prop_assert_eq!(&held, &expected);

        let reloaded = f.authz.load_principal("user", 1).unwrap();
        prop_assert_eq!(reloaded.groups().len(), expected.len());
    }
}
