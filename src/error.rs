//! Error types for groupwarden

use thiserror::Error;

/// Broad classification of an [`Error`], for callers that only branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    GuardMismatch,
    UnknownGuard,
    Storage,
    Config,
}

/// The main error type for groupwarden operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("there is no group named `{name}` for guard `{guard}`")]
    GroupNamed { name: String, guard: String },

    #[error("there is no group with id `{id}` for guard `{guard}`")]
    GroupWithId { id: u64, guard: String },

    #[error("there is no permission named `{name}` for guard `{guard}`")]
    PermissionNamed { name: String, guard: String },

    #[error("there is no permission with id `{id}` for guard `{guard}`")]
    PermissionWithId { id: u64, guard: String },

    #[error("a group `{name}` already exists for guard `{guard}`")]
    GroupAlreadyExists { name: String, guard: String },

    #[error("a permission `{name}` already exists for guard `{guard}`")]
    PermissionAlreadyExists { name: String, guard: String },

    #[error("the given guard `{given}` does not match any of [{}]", expected.join(", "))]
    GuardMismatch { given: String, expected: Vec<String> },

    #[error("guard `{0}` is not configured")]
    UnknownGuard(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::GroupNamed { .. }
            | Self::GroupWithId { .. }
            | Self::PermissionNamed { .. }
            | Self::PermissionWithId { .. } => ErrorKind::NotFound,
            Self::GroupAlreadyExists { .. } | Self::PermissionAlreadyExists { .. } => {
                ErrorKind::AlreadyExists
            }
            Self::GuardMismatch { .. } => ErrorKind::GuardMismatch,
            Self::UnknownGuard(_) => ErrorKind::UnknownGuard,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    #[inline]
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Result type alias for groupwarden operations
pub type Result<T> = std::result::Result<T, Error>;

/// Convert any storage-layer error into [`Error::Storage`]
pub fn err<E: std::error::Error>(e: E) -> Error {
    Error::Storage(e.to_string())
}
