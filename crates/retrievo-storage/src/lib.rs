//! Document store for retrievo.
//!
//! Provides RocksDB-backed storage for the documents that search hits are
//! joined with:
//! - Column family isolation for documents
//! - Idempotent document writes keyed by external identifier
//! - A [`DocumentLookup`] seam so the retrieval service can be wired to any
//!   record store

pub mod column_families;
pub mod db;
pub mod error;
pub mod keys;
pub mod lookup;

pub use db::{Storage, StorageStats};
pub use error::StorageError;
pub use keys::DocumentKey;
pub use lookup::{DocumentLookup, InMemoryDocuments};
