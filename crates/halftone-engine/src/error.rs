use halftone_types::ConfigError;
use thiserror::Error;

/// Domain failure taxonomy. A failing operation leaves the aggregate
/// untouched and emits nothing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    /// Ill-formed input: nil ids, empty required names, invalid config,
    /// unknown ports.
    #[error("validation: {0}")]
    Validation(String),
    /// Node, port, or connection missing.
    #[error("not found: {0}")]
    NotFound(String),
    /// Duplicate id, already-connected input, duplicate connection,
    /// would-be cycle, or illegal state transition.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl GraphError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        GraphError::Validation(message.into())
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        GraphError::NotFound(message.into())
    }

    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        GraphError::Conflict(message.into())
    }
}

impl From<ConfigError> for GraphError {
    fn from(error: ConfigError) -> Self {
        GraphError::Validation(error.to_string())
    }
}
