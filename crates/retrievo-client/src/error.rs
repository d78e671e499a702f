//! Error types for the retrievo client.

use thiserror::Error;

/// Errors that can occur when using the retrievo client.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Failed to connect to the daemon
    #[error("Connection failed: {0}")]
    Connection(#[from] tonic::transport::Error),

    /// RPC call failed
    #[error("RPC failed: {0}")]
    Rpc(#[from] tonic::Status),

    /// Response carried data the client cannot represent
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// Error kind tag attached by the server, if any.
    pub fn kind(&self) -> Option<&str> {
        match self {
            ClientError::Rpc(status) => status
                .metadata()
                .get(retrievo_service::ERROR_KIND_METADATA_KEY)
                .and_then(|v| v.to_str().ok()),
            _ => None,
        }
    }
}
