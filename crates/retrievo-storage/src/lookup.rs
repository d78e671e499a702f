//! Document lookup seam used to join search hits with their records.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::error;

use retrievo_types::Document;

use crate::db::Storage;
use crate::error::StorageError;

/// Resolves an external identifier to its stored document.
///
/// A missing record is `Ok(None)`, not an error.
pub trait DocumentLookup: Send + Sync {
    fn lookup(&self, id: &str) -> Result<Option<Document>, StorageError>;
}

impl DocumentLookup for Storage {
    fn lookup(&self, id: &str) -> Result<Option<Document>, StorageError> {
        self.get_document(id)
    }
}

/// In-memory document table, mostly for tests and offline tooling.
#[derive(Debug, Default)]
pub struct InMemoryDocuments {
    docs: RwLock<HashMap<String, Document>>,
}

impl InMemoryDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document.
    pub fn insert(&self, document: Document) -> Result<(), StorageError> {
        let mut docs = self.docs.write().map_err(|_| {
            error!(id = %document.id, "Document table lock poisoned, insert rejected");
            StorageError::LockPoisoned("in-memory document table".to_string())
        })?;
        docs.insert(document.id.clone(), document);
        Ok(())
    }

    pub fn remove(&self, id: &str) -> Option<Document> {
        self.docs.write().ok().and_then(|mut docs| docs.remove(id))
    }

    pub fn len(&self) -> usize {
        self.docs.read().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<Document> for InMemoryDocuments {
    fn from_iter<I: IntoIterator<Item = Document>>(iter: I) -> Self {
        let docs = iter.into_iter().map(|d| (d.id.clone(), d)).collect();
        Self {
            docs: RwLock::new(docs),
        }
    }
}

impl DocumentLookup for InMemoryDocuments {
    fn lookup(&self, id: &str) -> Result<Option<Document>, StorageError> {
        let docs = self
            .docs
            .read()
            .map_err(|_| StorageError::LockPoisoned("in-memory document table".to_string()))?;
        Ok(docs.get(id).cloned())
    }
}
