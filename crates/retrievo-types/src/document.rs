//! Document type for the metadata store.
//!
//! Documents are the records that search hits resolve to. The vector index
//! only knows a document's identifier; text and provenance live here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RetrievoError;

/// Where a document's text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSource {
    /// Uploaded file contents
    File,
    /// Text pasted directly by the user
    #[default]
    Paste,
}

impl DocumentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentSource::File => "file",
            DocumentSource::Paste => "paste",
        }
    }
}

impl std::fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentSource {
    type Err = RetrievoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(DocumentSource::File),
            "paste" => Ok(DocumentSource::Paste),
            other => Err(RetrievoError::InvalidInput(format!(
                "source must be 'file' or 'paste', got '{}'",
                other
            ))),
        }
    }
}

/// A stored document.
///
/// The `id` is the external identifier that vector positions are bound to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// External identifier (opaque; ULID when generated by the service)
    pub id: String,

    /// Full document text
    pub text: String,

    /// Provenance of the text
    #[serde(default)]
    pub source: DocumentSource,

    /// When the document was stored
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Create a document stamped with the current time.
    pub fn new(id: impl Into<String>, text: impl Into<String>, source: DocumentSource) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source,
            created_at: Utc::now(),
        }
    }

    /// Create a document with a freshly generated ULID identifier.
    pub fn with_generated_id(text: impl Into<String>, source: DocumentSource) -> Self {
        Self::new(ulid::Ulid::new().to_string(), text, source)
    }

    /// Override the creation timestamp
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Get creation time as milliseconds since Unix epoch
    pub fn created_at_ms(&self) -> i64 {
        self.created_at.timestamp_millis()
    }

    /// Serialize document to JSON bytes for storage
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize document from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
