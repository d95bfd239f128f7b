//! Error types for the snapdiff storage layer.

use thiserror::Error;

/// Errors raised by the project-tree storage gateway.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Project name contains characters outside `[A-Za-z0-9 _-]`.
    #[error("invalid project name: {0:?}")]
    InvalidProjectName(String),

    /// Section timestamp does not match `YYYY-MM-DDTHH-MM-SS-sssZ[_replay]`.
    #[error("invalid section timestamp: {0:?}")]
    InvalidSectionTimestamp(String),

    /// Project directory missing.
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    /// Section directory missing.
    #[error("section not found: {project}/{section}")]
    SectionNotFound { project: String, section: String },

    /// Test result id missing from the per-project index.
    #[error("test result not found: {0}")]
    ResultNotFound(String),

    /// Report id missing from the per-project index.
    #[error("report not found: {0}")]
    ReportNotFound(String),

    /// Filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error on a write path. Read-path corruption is
    /// absorbed by the family readers and never surfaces as this variant.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
