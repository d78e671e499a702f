//! Retrieval error taxonomy and its mapping onto gRPC status codes.

use thiserror::Error;
use tonic::metadata::MetadataValue;
use tonic::{Code, Status};

use retrievo_storage::StorageError;
use retrievo_vector::VectorError;

/// Metadata key carrying the stable error kind tag on failed RPCs.
pub const ERROR_KIND_METADATA_KEY: &str = "x-retrievo-error-kind";

/// Errors returned by [`crate::RetrievalService`].
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Caller input rejected before any mutation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Positions and bindings disagree
    #[error("Consistency error: {0}")]
    Consistency(String),

    /// Flush failed after retries; the in-memory append was rolled back
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Persisted index cannot be loaded
    #[error("Corrupt state: {0}")]
    CorruptState(String),

    /// Document store failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl RetrievalError {
    /// Stable, machine-readable tag for this error class.
    pub fn kind(&self) -> &'static str {
        match self {
            RetrievalError::Validation(_) => "validation_error",
            RetrievalError::Consistency(_) => "consistency_error",
            RetrievalError::Persistence(_) => "persistence_error",
            RetrievalError::CorruptState(_) => "corrupt_state_error",
            RetrievalError::Storage(_) => "storage_error",
        }
    }

    fn code(&self) -> Code {
        match self {
            RetrievalError::Validation(_) => Code::InvalidArgument,
            RetrievalError::Consistency(_) => Code::Internal,
            RetrievalError::Persistence(_) => Code::Unavailable,
            RetrievalError::CorruptState(_) => Code::DataLoss,
            RetrievalError::Storage(_) => Code::Internal,
        }
    }
}

impl From<VectorError> for RetrievalError {
    fn from(err: VectorError) -> Self {
        match err {
            e @ (VectorError::DimensionMismatch { .. }
            | VectorError::NonFiniteComponent { .. }
            | VectorError::EmptyIdentifier) => RetrievalError::Validation(e.to_string()),
            VectorError::Consistency(msg) => RetrievalError::Consistency(msg),
            VectorError::CorruptState(msg) => RetrievalError::CorruptState(msg),
            e @ (VectorError::NotFound(_) | VectorError::Io(_)) => {
                RetrievalError::Persistence(e.to_string())
            }
        }
    }
}

impl From<RetrievalError> for Status {
    fn from(err: RetrievalError) -> Self {
        let mut status = Status::new(err.code(), err.to_string());
        status.metadata_mut().insert(
            ERROR_KIND_METADATA_KEY,
            MetadataValue::from_static(err.kind()),
        );
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_errors_map_to_kinds() {
        let mismatch: RetrievalError = VectorError::DimensionMismatch {
            expected: 3,
            actual: 2,
        }
        .into();
        assert_eq!(mismatch.kind(), "validation_error");

        let desync: RetrievalError = VectorError::Consistency("3 vs 2".into()).into();
        assert_eq!(desync.kind(), "consistency_error");

        let corrupt: RetrievalError = VectorError::CorruptState("bad magic".into()).into();
        assert_eq!(corrupt.kind(), "corrupt_state_error");

        let io: RetrievalError =
            VectorError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")).into();
        assert_eq!(io.kind(), "persistence_error");
    }

    #[test]
    fn test_status_carries_code_and_kind() {
        let status: Status = RetrievalError::Validation("wrong length".into()).into();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(
            status
                .metadata()
                .get(ERROR_KIND_METADATA_KEY)
                .and_then(|v| v.to_str().ok()),
            Some("validation_error")
        );

        let status: Status = RetrievalError::Persistence("rename failed".into()).into();
        assert_eq!(status.code(), Code::Unavailable);

        let status: Status = RetrievalError::CorruptState("truncated".into()).into();
        assert_eq!(status.code(), Code::DataLoss);
    }
}
