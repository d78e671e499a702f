//! Retrieval service and gRPC surface for retrievo.
//!
//! Provides:
//! - [`RetrievalService`]: durable adds and exact k-NN search joined with documents
//! - AddVector / Search / PutDocument / GetDocument / GetIndexStatus RPCs
//! - Health check endpoint
//! - Reflection endpoint for debugging

pub mod error;
pub mod grpc;
pub mod retrieval;
pub mod server;

pub mod pb {
    tonic::include_proto!("retrievo");

    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("retrievo_descriptor");
}

pub use error::{RetrievalError, ERROR_KIND_METADATA_KEY};
pub use grpc::RetrievoServiceImpl;
pub use retrieval::{
    AddOutcome, AddVector, IndexStatus, RetrievalConfig, RetrievalService, RetrievedDocument,
    SearchQuery,
};
pub use server::{run_server, run_server_with_shutdown};
