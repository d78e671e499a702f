//! Key encoding and decoding for the storage layer.
//!
//! Key format: `doc:{id}`. The prefix leaves room for other record kinds in
//! the same column family and makes raw dumps readable.

use crate::error::StorageError;

const DOC_PREFIX: &str = "doc:";

/// Key for document storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentKey {
    /// External document identifier
    pub id: String,
}

impl DocumentKey {
    /// Create a key for a document identifier
    pub fn new(id: &str) -> Result<Self, StorageError> {
        if id.is_empty() {
            return Err(StorageError::Key("document id must not be empty".to_string()));
        }
        Ok(Self { id: id.to_string() })
    }

    /// Encode key to bytes for storage
    pub fn to_bytes(&self) -> Vec<u8> {
        format!("{}{}", DOC_PREFIX, self.id).into_bytes()
    }

    /// Decode key from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let s = std::str::from_utf8(bytes)
            .map_err(|e| StorageError::Key(format!("Invalid UTF-8: {}", e)))?;
        let id = s
            .strip_prefix(DOC_PREFIX)
            .ok_or_else(|| StorageError::Key(format!("Invalid document key format: {}", s)))?;
        Self::new(id)
    }
}
