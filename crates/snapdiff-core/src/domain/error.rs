//! Engine-level error taxonomy.
//!
//! Four caller-visible kinds plus pass-through wrappers. The HTTP layer maps
//! them to status codes (404 / 400 / 409 / 503); partial merge failure is not
//! an error kind; it travels inside the merge result.

use snapdiff_store::StoreError;

/// snapdiff engine errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Project, section, screen, test or report missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed timestamp, unknown kind, bad threshold, bad request shape.
    #[error("invalid: {0}")]
    Invalid(String),

    /// Concurrent merge attempt on the same project.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Filesystem or subprocess failure worth retrying.
    #[error("transient: {0}")]
    Transient(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// Collapse the store taxonomy into the engine one: missing entities are
    /// `NotFound`, bad names are `Invalid`, IO is `Transient`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::Invalid(_) => ErrorKind::Invalid,
            EngineError::Conflict(_) => ErrorKind::Conflict,
            EngineError::Transient(_) => ErrorKind::Transient,
            EngineError::Store(err) => match err {
                StoreError::ProjectNotFound(_)
                | StoreError::SectionNotFound { .. }
                | StoreError::ResultNotFound(_)
                | StoreError::ReportNotFound(_) => ErrorKind::NotFound,
                StoreError::InvalidProjectName(_) | StoreError::InvalidSectionTimestamp(_) => {
                    ErrorKind::Invalid
                }
                StoreError::Io(_) => ErrorKind::Transient,
                StoreError::Serialization(_) => ErrorKind::Internal,
            },
            EngineError::Serialization(_) => ErrorKind::Internal,
        }
    }
}

/// Flattened error kind for transport mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Invalid,
    Conflict,
    Transient,
    Internal,
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
