//! # retrievo-types
//!
//! Shared domain types for the retrievo retrieval service.
//!
//! - Documents: records held by the metadata store and joined into search results
//! - Settings: layered configuration for the daemon and service
//! - Errors: configuration and validation failures shared across crates
//!
//! ## Usage
//!
//! ```rust
//! use retrievo_types::{Document, DocumentSource};
//!
//! let doc = Document::new("doc-1", "Rust is a systems language.", DocumentSource::Paste);
//! assert_eq!(doc.id, "doc-1");
//! ```

pub mod config;
pub mod document;
pub mod error;

pub use config::Settings;
pub use document::{Document, DocumentSource};
pub use error::RetrievoError;
