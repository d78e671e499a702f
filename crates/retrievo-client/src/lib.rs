//! Client library for the retrievo daemon.
//!
//! # Example
//!
//! ```rust,no_run
//! use retrievo_client::RetrievoClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = RetrievoClient::connect("http://127.0.0.1:50061").await?;
//!
//!     client.put_document(Some("doc-1"), "Ownership rules", Default::default()).await?;
//!     client.add_vector("doc-1", vec![0.1, 0.2, 0.3]).await?;
//!
//!     for hit in client.search(vec![0.1, 0.2, 0.3], Some(3)).await? {
//!         println!("{} {:.4} {}", hit.id, hit.distance, hit.text);
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;

pub use client::{RetrievoClient, DEFAULT_ENDPOINT};
pub use error::ClientError;

pub use retrievo_service::pb::{IndexStatus, SearchResult};
pub use retrievo_types::{Document, DocumentSource};
