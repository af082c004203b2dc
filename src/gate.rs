//! Request-facing checks: middleware guards and template directives.
//!
//! The caller resolves "who is logged in under this guard" and hands over the
//! principal, or `None` for a guest.

use crate::authorizer::Authorizer;
use crate::error::Error;
use crate::model::{Group, Permission, PrincipalHandle};
use crate::reference::{split_pipe, RefList, Reference};
use crate::store::EntityStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnauthorizedKind {
    NotAuthenticated,
    MissingGroups(Vec<String>),
    MissingPermissions(Vec<String>),
    MissingPermissionsOrGroups(Vec<String>),
}

/// A denied request. The message lists what was required only when the
/// configuration allows it; [`kind`](Self::kind) always carries the list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct Unauthorized {
    kind: UnauthorizedKind,
    message: String,
}

impl Unauthorized {
    pub fn not_logged_in() -> Self {
        Unauthorized {
            kind: UnauthorizedKind::NotAuthenticated,
            message: "User is not logged in.".into(),
        }
    }

    pub fn for_groups(groups: Vec<String>, show: bool) -> Self {
        let mut message = String::from("User does not have the right groups.");
        if show {
            message.push_str(&format!(" Necessary groups are {}", groups.join(", ")));
        }
        Unauthorized { kind: UnauthorizedKind::MissingGroups(groups), message }
    }

    pub fn for_permissions(permissions: Vec<String>, show: bool) -> Self {
        let mut message = String::from("User does not have the right permissions.");
        if show {
            message.push_str(&format!(" Necessary permissions are {}", permissions.join(", ")));
        }
        Unauthorized { kind: UnauthorizedKind::MissingPermissions(permissions), message }
    }

    pub fn for_groups_or_permissions(names: Vec<String>, show: bool) -> Self {
        let message = if show {
            format!("User does not have the right permissions. Necessary permissions are {}", names.join(", "))
        } else {
            "User does not have any of the necessary access rights.".into()
        };
        Unauthorized { kind: UnauthorizedKind::MissingPermissionsOrGroups(names), message }
    }

    pub fn kind(&self) -> &UnauthorizedKind {
        &self.kind
    }

    /// Required group names, empty unless this is a group denial
    pub fn required_groups(&self) -> &[String] {
        match &self.kind {
            UnauthorizedKind::MissingGroups(g) => g,
            _ => &[],
        }
    }

    /// Required permission names; the combined denial reports its names here too
    pub fn required_permissions(&self) -> &[String] {
        match &self.kind {
            UnauthorizedKind::MissingPermissions(p) | UnauthorizedKind::MissingPermissionsOrGroups(p) => p,
            _ => &[],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error(transparent)]
    Unauthorized(#[from] Unauthorized),
    #[error(transparent)]
    Engine(#[from] Error),
}

pub type GateResult = std::result::Result<(), GateError>;

fn authenticated(principal: Option<&PrincipalHandle>) -> Result<&PrincipalHandle, Unauthorized> {
    principal.ok_or_else(|| {
        tracing::debug!("guest rejected");
        Unauthorized::not_logged_in()
    })
}

impl<S: EntityStore> Authorizer<S> {
    /// Pass when the principal holds any of `groups`
    pub fn require_any_group(
        &self,
        principal: Option<&PrincipalHandle>,
        groups: impl Into<RefList<Group>>,
        guard: Option<&str>,
    ) -> GateResult {
        let principal = authenticated(principal)?;
        let groups = groups.into();
        if principal.has_group(groups.clone(), guard) {
            return Ok(());
        }
        tracing::debug!(principal_type = %principal.principal_type, "missing groups");
        Err(Unauthorized::for_groups(groups.labels(), self.config.display_permission_in_exception).into())
    }

    /// Pass when the principal holds any of `permissions`, directly or through a group
    pub fn require_any_permission(
        &self,
        principal: Option<&PrincipalHandle>,
        permissions: impl Into<RefList<Permission>>,
        guard: Option<&str>,
    ) -> GateResult {
        let principal = authenticated(principal)?;
        let permissions = permissions.into();
        for p in permissions.iter() {
            if self.check_permission_to(principal, p.clone(), guard)? {
                return Ok(());
            }
        }
        tracing::debug!(principal_type = %principal.principal_type, "missing permissions");
        Err(Unauthorized::for_permissions(permissions.labels(), self.config.display_permission_in_exception).into())
    }

    /// Pass when any pipe-separated name is a held group or a granted permission
    pub fn require_any_group_or_permission(
        &self,
        principal: Option<&PrincipalHandle>,
        groups_or_permissions: &str,
    ) -> GateResult {
        let principal = authenticated(principal)?;
        let names = split_pipe(groups_or_permissions);
        let groups: RefList<Group> = names.iter().map(Reference::from).collect();
        let permissions: RefList<Permission> = names.iter().map(Reference::from).collect();
        if principal.has_any_group(groups) || self.has_any_permission(principal, permissions)? {
            return Ok(());
        }
        let show = self.config.display_permission_in_exception && self.config.display_group_in_exception;
        Err(Unauthorized::for_groups_or_permissions(names, show).into())
    }
}

// ============================================================================
// Template directives
// ============================================================================

pub fn if_group(principal: Option<&PrincipalHandle>, groups: impl Into<RefList<Group>>, guard: Option<&str>) -> bool {
    principal.is_some_and(|p| p.has_group(groups, guard))
}

pub fn if_any_group(principal: Option<&PrincipalHandle>, groups: impl Into<RefList<Group>>) -> bool {
    principal.is_some_and(|p| p.has_any_group(groups))
}

pub fn if_all_groups(principal: Option<&PrincipalHandle>, groups: impl Into<RefList<Group>>, guard: Option<&str>) -> bool {
    principal.is_some_and(|p| p.has_all_groups(groups, guard))
}

/// Guests pass
pub fn unless_group(principal: Option<&PrincipalHandle>, groups: impl Into<RefList<Group>>, guard: Option<&str>) -> bool {
    !if_group(principal, groups, guard)
}
