//! Guard resolution
//!
//! A guard is the named authentication context a principal type belongs to.
//! Groups and permissions carry the guard they were created for, and are only
//! ever compared against principals of that guard.

use std::sync::Arc;

use crate::config::Config;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct GuardResolver {
    config: Arc<Config>,
}

impl GuardResolver {
    pub fn new(config: Arc<Config>) -> Self {
        GuardResolver { config }
    }

    /// Pick the guard for a check or write.
    ///
    /// An explicit guard must be configured; otherwise the principal type's default applies.
    pub fn resolve(&self, explicit: Option<&str>, principal_type: &str) -> Result<String> {
        match explicit {
            Some(guard) => self.validate(guard),
            None => Ok(self.default_for(principal_type)),
        }
    }

    pub fn validate(&self, guard: &str) -> Result<String> {
        if self.config.is_known_guard(guard) {
            Ok(guard.to_string())
        } else {
            Err(Error::UnknownGuard(guard.to_string()))
        }
    }

    /// Default guard of a principal type: explicit mapping, then the first guard
    /// serving the type, then the global default.
    pub fn default_for(&self, principal_type: &str) -> String {
        if let Some(g) = self.config.default_guard_per_principal_type.get(principal_type) {
            return g.clone();
        }
        self.config
            .guards
            .iter()
            .find(|(_, types)| types.iter().any(|t| t == principal_type))
            .map(|(g, _)| g.clone())
            .unwrap_or_else(|| self.config.default_guard.clone())
    }

    /// Every guard a principal type may act under, default first
    pub fn guard_names(&self, principal_type: &str) -> Vec<String> {
        let mut names = vec![self.default_for(principal_type)];
        for (guard, types) in &self.config.guards {
            if types.iter().any(|t| t == principal_type) && !names.contains(guard) {
                names.push(guard.clone());
            }
        }
        names
    }

    /// Guard for rows created outside any principal context
    pub fn default_guard(&self) -> &str {
        &self.config.default_guard
    }

    /// Resolve an optional explicit guard against the global default
    pub fn resolve_or_default(&self, explicit: Option<&str>) -> Result<String> {
        match explicit {
            Some(guard) => self.validate(guard),
            None => Ok(self.config.default_guard.clone()),
        }
    }
}
