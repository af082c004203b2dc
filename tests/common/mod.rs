//! Shared fixtures: two guards, three groups, four permissions, one principal per guard

#![allow(dead_code)]

use groupwarden::{Authorizer, Config, EntityStore, Group, MemoryStore, Permission, PrincipalHandle};

pub fn config() -> Config {
    Config::default().with_guard("web", ["user"]).with_guard("admin", ["admin"])
}

pub struct Fixture<S: EntityStore = MemoryStore> {
    pub authz: Authorizer<S>,
    pub test_group: Group,
    pub test_group2: Group,
    pub test_admin_group: Group,
    pub edit_articles: Permission,
    pub edit_news: Permission,
    pub edit_blog: Permission,
    pub admin_permission: Permission,
    pub user: PrincipalHandle,
    pub admin: PrincipalHandle,
}

pub fn fixture() -> Fixture {
    fixture_with(MemoryStore::new(), config())
}

pub fn fixture_with_config(config: Config) -> Fixture {
    fixture_with(MemoryStore::new(), config)
}

pub fn fixture_with<S: EntityStore>(store: S, config: Config) -> Fixture<S> {
    let authz = Authorizer::new(store, config).unwrap();

    let edit_articles = authz.create_permission("edit-articles", Some("web")).unwrap();
    let edit_news = authz.create_permission("edit-news", Some("web")).unwrap();
    let edit_blog = authz.create_permission("edit-blog", Some("web")).unwrap();
    let admin_permission = authz.create_permission("admin-permission", Some("admin")).unwrap();

    let test_group = authz.create_group("testGroup", Some("web")).unwrap();
    let test_group2 = authz.create_group("testGroup2", Some("web")).unwrap();
    let test_admin_group = authz.create_group("testAdminGroup", Some("admin")).unwrap();

    authz.give_permission_to_group(&test_group, "edit-articles").unwrap();
    authz.give_permission_to_group(&test_admin_group, "admin-permission").unwrap();

    let user = authz.load_principal("user", 1).unwrap();
    let admin = authz.load_principal("admin", 1).unwrap();

    Fixture {
        authz,
        test_group,
        test_group2,
        test_admin_group,
        edit_articles,
        edit_news,
        edit_blog,
        admin_permission,
        user,
        admin,
    }
}
