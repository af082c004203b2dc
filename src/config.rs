//! Process configuration
//!
//! Loaded once at startup (JSON) or assembled with the builder-style setters.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CACHE_EXPIRY_SECS, DEFAULT_GUARD};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Match permission names as dot-separated wildcard patterns
    pub enable_wildcard_permission: bool,
    /// Guard used for groups/permissions created without an explicit guard
    pub default_guard: String,
    /// Every known guard, with the principal types it authenticates
    pub guards: BTreeMap<String, Vec<String>>,
    /// Principal type -> its default guard
    pub default_guard_per_principal_type: BTreeMap<String, String>,
    /// Snapshot lifetime; 0 keeps a snapshot until it is invalidated
    pub cache_expiry_seconds: u64,
    pub display_permission_in_exception: bool,
    pub display_group_in_exception: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            enable_wildcard_permission: false,
            default_guard: DEFAULT_GUARD.to_string(),
            guards: BTreeMap::from([(DEFAULT_GUARD.to_string(), Vec::new())]),
            default_guard_per_principal_type: BTreeMap::new(),
            cache_expiry_seconds: DEFAULT_CACHE_EXPIRY_SECS,
            display_permission_in_exception: false,
            display_group_in_exception: false,
        }
    }
}

impl Config {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_json_str(&raw)
    }

    /// Register a guard serving the given principal types
    pub fn with_guard<I, S>(mut self, guard: &str, principal_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.guards.entry(guard.to_string()).or_default();
        for t in principal_types {
            let t = t.into();
            if !entry.contains(&t) {
                entry.push(t);
            }
        }
        self
    }

    /// Map a principal type to its default guard (registering the guard if needed)
    pub fn with_default_guard_for(mut self, principal_type: &str, guard: &str) -> Self {
        self = self.with_guard(guard, [principal_type]);
        self.default_guard_per_principal_type
            .insert(principal_type.to_string(), guard.to_string());
        self
    }

    pub fn with_default_guard(mut self, guard: &str) -> Self {
        self.guards.entry(guard.to_string()).or_default();
        self.default_guard = guard.to_string();
        self
    }

    pub fn with_wildcard_permission(mut self, enabled: bool) -> Self {
        self.enable_wildcard_permission = enabled;
        self
    }

    pub fn with_cache_expiry(mut self, seconds: u64) -> Self {
        self.cache_expiry_seconds = seconds;
        self
    }

    pub fn with_exception_details(mut self, permissions: bool, groups: bool) -> Self {
        self.display_permission_in_exception = permissions;
        self.display_group_in_exception = groups;
        self
    }

    pub fn cache_expiry(&self) -> Option<Duration> {
        (self.cache_expiry_seconds > 0).then(|| Duration::from_secs(self.cache_expiry_seconds))
    }

    pub fn is_known_guard(&self, guard: &str) -> bool {
        guard == self.default_guard
            || self.guards.contains_key(guard)
            || self.default_guard_per_principal_type.values().any(|g| g == guard)
    }

    /// Every default guard must point at a declared guard
    pub fn validate(&self) -> Result<()> {
        if self.default_guard.is_empty() {
            return Err(Error::Config("default_guard must not be empty".into()));
        }
        for (principal_type, guard) in &self.default_guard_per_principal_type {
            if guard != &self.default_guard && !self.guards.contains_key(guard) {
                return Err(Error::Config(format!(
                    "principal type `{}` defaults to undeclared guard `{}`",
                    principal_type, guard
                )));
            }
        }
        Ok(())
    }
}
