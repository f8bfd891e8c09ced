//! Error types and load result structures for the definition loader.

use std::path::PathBuf;

/// Errors that can occur while reading a definition document.
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parse/deserialization error.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parse/deserialization error.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The document parsed but has the wrong shape.
    #[error("Invalid definition document: {0}")]
    Invalid(String),
}

/// Result alias for definition loading.
pub type Result<T> = std::result::Result<T, DefinitionError>;

/// Outcome of loading one section of a definitions document.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadResult {
    /// Document the section was read from. None when no document was configured.
    pub path: Option<PathBuf>,
    /// `patterns`, `rules` or `plans`.
    pub section: &'static str,
    pub status: LoadStatus,
}

/// Status of a single section load attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadStatus {
    /// Section read from the document.
    Loaded { count: usize },
    /// Section absent; built-in defaults used.
    Skipped { reason: String },
    /// Section unreadable; built-in defaults used.
    Failed { error: String },
}

impl LoadResult {
    pub fn used_defaults(&self) -> bool {
        !matches!(self.status, LoadStatus::Loaded { .. })
    }
}
