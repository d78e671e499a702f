//! Vector index error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during vector operations.
#[derive(Debug, Error)]
pub enum VectorError {
    /// Vector length differs from the index dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// NaN or infinite component
    #[error("Vector component {index} is not a finite number")]
    NonFiniteComponent { index: usize },

    /// Identifier is empty
    #[error("External identifier must not be empty")]
    EmptyIdentifier,

    /// Position/mapping desync
    #[error("Consistency error: {0}")]
    Consistency(String),

    /// Persisted state cannot be decoded or disagrees with configuration
    #[error("Corrupt index state: {0}")]
    CorruptState(String),

    /// No persisted state at the given path
    #[error("Index file not found: {0}")]
    NotFound(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VectorError {
    /// Whether the error was caused by caller input rather than index state.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            VectorError::DimensionMismatch { .. }
                | VectorError::NonFiniteComponent { .. }
                | VectorError::EmptyIdentifier
        )
    }
}
