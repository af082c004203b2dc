//! Groupwarden - guard-scoped groups and permissions
//!
//! Principals (users, API clients, anything with a type and an id) hold groups
//! and direct permissions; groups hold permissions. Every group and permission
//! belongs to one guard, and checks only ever compare rows of the same guard.
//!
//! ```ignore
//! let authz = Authorizer::new(MemoryStore::new(), Config::default().with_guard("web", ["user"]))?;
//! let writer = authz.create_group("writer", None)?;
//! authz.give_permission_to_group(&writer, "edit-articles")?;
//!
//! let mut alice = authz.load_principal("user", 1)?;
//! authz.assign_group(&mut alice, "writer")?;
//! assert!(authz.has_permission_to(&alice, "edit-articles", None)?);
//! ```

pub mod authorizer;
pub mod cache;
pub mod config;
pub mod constants;
pub mod entity;
pub mod error;
pub mod gate;
pub mod guard;
pub mod keys;
pub mod model;
pub mod read;
pub mod reference;
pub mod report;
pub mod store;
pub mod wildcard;
pub mod write;

pub use authorizer::Authorizer;
pub use cache::{CacheState, PermissionCache, PermissionSnapshot};
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use gate::{GateError, Unauthorized, UnauthorizedKind};
pub use guard::GuardResolver;
pub use model::{DeleteMode, Group, Permission, PrincipalHandle, PrincipalKey};
pub use reference::{GroupRef, PermissionRef, RefList, Reference};
pub use report::PermissionMatrix;
pub use store::{Associations, EntityStore, LmdbStore, MemoryStore};
