//! Configuration loading and guard resolution

use std::sync::Arc;

use groupwarden::{Authorizer, Config, ErrorKind, GuardResolver, MemoryStore};

#[test]
fn defaults() {
    let c = Config::default();
    assert!(!c.enable_wildcard_permission);
    assert_eq!(c.default_guard, "web");
    assert_eq!(c.cache_expiry_seconds, 24 * 60 * 60);
    assert!(c.validate().is_ok());
}

#[test]
fn from_json() {
    let c = Config::from_json_str(
        r#"{
            "enable_wildcard_permission": true,
            "guards": { "web": ["user"], "api": ["client", "user"] },
            "default_guard_per_principal_type": { "client": "api" },
            "cache_expiry_seconds": 0,
            "display_permission_in_exception": true
        }"#,
    )
    .unwrap();

    assert!(c.enable_wildcard_permission);
    assert_eq!(c.default_guard, "web");
    assert_eq!(c.cache_expiry(), None);
    assert!(c.display_permission_in_exception);
    assert!(!c.display_group_in_exception);
    assert!(c.is_known_guard("api"));
    assert!(!c.is_known_guard("fakeGuard"));
}

#[test]
fn invalid_configs_are_rejected() {
    let e = Config::from_json_str(r#"{ "default_guard_per_principal_type": { "user": "nowhere" } }"#).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Config);

    let e = Config::from_json_str(r#"{ "default_guard": "" }"#).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Config);

    let e = Config::from_json_str("not json").unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Config);

    let mut c = Config::default();
    c.default_guard_per_principal_type.insert("user".into(), "nowhere".into());
    assert!(Authorizer::new(MemoryStore::new(), c).is_err());
}

#[test]
fn from_path_reads_a_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("groupwarden.json");
    std::fs::write(&path, r#"{ "default_guard": "admin", "guards": { "admin": ["admin"] } }"#).unwrap();
    let c = Config::from_path(&path).unwrap();
    assert_eq!(c.default_guard, "admin");

    let e = Config::from_path(dir.path().join("missing.json")).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Config);
}

// ============================================================================
// Guard resolution
// ============================================================================

fn resolver() -> GuardResolver {
    let config = Config::default()
        .with_guard("web", ["user"])
        .with_guard("api", ["user", "client"])
        .with_default_guard_for("client", "api");
    GuardResolver::new(Arc::new(config))
}

#[test]
fn default_guard_per_principal_type() {
    let r = resolver();
    assert_eq!(r.default_for("client"), "api");
    assert_eq!(r.default_for("user"), "api");
    assert_eq!(r.default_for("robot"), "web");
}

#[test]
fn guard_names_put_the_default_first() {
    let r = resolver();
    assert_eq!(r.guard_names("client"), vec!["api"]);
    assert_eq!(r.guard_names("user"), vec!["api", "web"]);
    assert_eq!(r.guard_names("robot"), vec!["web"]);
}

#[test]
fn explicit_guards_must_be_configured() {
    let r = resolver();
    assert_eq!(r.resolve(Some("web"), "client").unwrap(), "web");
    assert_eq!(r.resolve(None, "client").unwrap(), "api");
    assert_eq!(r.resolve(Some("fakeGuard"), "user").unwrap_err().kind(), ErrorKind::UnknownGuard);
    assert_eq!(r.resolve_or_default(None).unwrap(), "web");
    assert_eq!(r.default_guard(), "web");
}

/// A principal type served by two guards may hold rows of either
#[test]
fn multi_guard_principal_accepts_both_guards() {
    let config = Config::default().with_guard("web", ["user"]).with_guard("api", ["user"]);
    let authz = Authorizer::new(MemoryStore::new(), config).unwrap();
    let web = authz.create_group("member", Some("web")).unwrap();
    let api = authz.create_group("member", Some("api")).unwrap();

    let mut user = authz.load_principal("user", 1).unwrap();
    authz.assign_group(&mut user, vec![web.clone(), api.clone()]).unwrap();
    assert!(user.has_group("member", Some("web")));
    assert!(user.has_group("member", Some("api")));
    assert_eq!(user.groups().len(), 2);
}
