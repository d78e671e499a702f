//! RocksDB wrapper for retrievo document storage.
//!
//! Provides:
//! - Database open with column family setup
//! - Idempotent document writes
//! - Single-key reads and statistics

use rocksdb::{ColumnFamily, IteratorMode, Options, DB};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use retrievo_types::Document;

use crate::column_families::{build_cf_descriptors, ALL_CF_NAMES, CF_DOCUMENTS};
use crate::error::StorageError;
use crate::keys::DocumentKey;

/// Main storage interface for retrievo documents
pub struct Storage {
    db: DB,
    /// Serializes the exists-check and write in `put_document`
    put_lock: Mutex<()>,
}

impl Storage {
    /// Open storage at the given path, creating if necessary
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        info!("Opening document storage at {:?}", path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_background_jobs(2);

        let db = DB::open_cf_descriptors(&db_opts, path, build_cf_descriptors())?;
        Ok(Self {
            db,
            put_lock: Mutex::new(()),
        })
    }

    fn documents_cf(&self) -> Result<&ColumnFamily, StorageError> {
        self.db
            .cf_handle(CF_DOCUMENTS)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(CF_DOCUMENTS.to_string()))
    }

    /// Store a document.
    ///
    /// Returns `false` without overwriting if a document with the same id
    /// already exists.
    pub fn put_document(&self, document: &Document) -> Result<bool, StorageError> {
        let cf = self.documents_cf()?;
        let key = DocumentKey::new(&document.id)?;
        let bytes = document.to_bytes()?;

        let _guard = self
            .put_lock
            .lock()
            .map_err(|_| StorageError::LockPoisoned("document put lock".to_string()))?;
        if self.db.get_cf(cf, key.to_bytes())?.is_some() {
            debug!(id = %document.id, "Document already exists, skipping");
            return Ok(false);
        }

        self.db.put_cf(cf, key.to_bytes(), bytes)?;
        debug!(id = %document.id, source = %document.source, "Stored document");
        Ok(true)
    }

    /// Get a document by its identifier
    pub fn get_document(&self, id: &str) -> Result<Option<Document>, StorageError> {
        let cf = self.documents_cf()?;
        let key = DocumentKey::new(id)?;
        match self.db.get_cf(cf, key.to_bytes())? {
            Some(bytes) => Ok(Some(Document::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Flush all column families to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        for cf_name in ALL_CF_NAMES {
            if let Some(cf) = self.db.cf_handle(cf_name) {
                self.db.flush_cf(cf)?;
            }
        }
        Ok(())
    }

    /// Get database statistics.
    pub fn get_stats(&self) -> Result<StorageStats, StorageError> {
        let cf = self.documents_cf()?;
        let mut document_count = 0u64;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            item?;
            document_count += 1;
        }

        Ok(StorageStats {
            document_count,
            disk_usage_bytes: self.get_disk_usage(),
        })
    }

    fn get_disk_usage(&self) -> u64 {
        std::fs::read_dir(self.db.path())
            .map(|entries| {
                entries
                    .flatten()
                    .filter_map(|e| e.metadata().ok())
                    .map(|m| m.len())
                    .sum()
            })
            .unwrap_or(0)
    }
}

/// Statistics about the storage.
#[derive(Debug, Default)]
pub struct StorageStats {
    /// Number of documents stored
    pub document_count: u64,
    /// Total disk usage in bytes
    pub disk_usage_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrievo_types::DocumentSource;
    use tempfile::TempDir;

    fn create_test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::open(temp_dir.path()).unwrap();
        (storage, temp_dir)
    }

    #[test]
    fn test_open_creates_column_families() {
        let (storage, _temp) = create_test_storage();
        for cf_name in ALL_CF_NAMES {
            assert!(
                storage.db.cf_handle(cf_name).is_some(),
                "CF {} should exist",
                cf_name
            );
        }
    }

    #[test]
    fn test_put_and_get_document() {
        let (storage, _temp) = create_test_storage();
        let doc = Document::new("doc-1", "The borrow checker", DocumentSource::File);

        assert!(storage.put_document(&doc).unwrap());

        let retrieved = storage.get_document("doc-1").unwrap().unwrap();
        assert_eq!(retrieved.text, "The borrow checker");
        assert_eq!(retrieved.source, DocumentSource::File);
        assert_eq!(retrieved.created_at_ms(), doc.created_at_ms());
    }

    #[test]
    fn test_idempotent_put_keeps_first_copy() {
        let (storage, _temp) = create_test_storage();

        let first = Document::new("doc-1", "first", DocumentSource::Paste);
        let second = Document::new("doc-1", "second", DocumentSource::Paste);

        assert!(storage.put_document(&first).unwrap());
        assert!(!storage.put_document(&second).unwrap());
        assert_eq!(storage.get_document("doc-1").unwrap().unwrap().text, "first");
    }

    #[test]
    fn test_concurrent_puts_of_same_id_create_once() {
        let (storage, _temp) = create_test_storage();
        let storage = std::sync::Arc::new(storage);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let storage = storage.clone();
                std::thread::spawn(move || {
                    let text = format!("copy {}", i);
                    let doc = Document::new("shared", text.clone(), DocumentSource::Paste);
                    (storage.put_document(&doc).unwrap(), text)
                })
            })
            .collect();

        let results: Vec<(bool, String)> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners: Vec<&String> = results
            .iter()
            .filter(|(created, _)| *created)
            .map(|(_, text)| text)
            .collect();

        assert_eq!(winners.len(), 1);
        let stored = storage.get_document("shared").unwrap().unwrap();
        assert_eq!(&stored.text, winners[0]);
    }

    #[test]
    fn test_get_missing_document() {
        let (storage, _temp) = create_test_storage();
        assert!(storage.get_document("nope").unwrap().is_none());
    }

    #[test]
    fn test_empty_id_rejected() {
        let (storage, _temp) = create_test_storage();
        let doc = Document::new("", "orphan", DocumentSource::Paste);
        assert!(matches!(storage.put_document(&doc), Err(StorageError::Key(_))));
    }

    #[test]
    fn test_stats_count_documents() {
        let (storage, _temp) = create_test_storage();
        for i in 0..4 {
            let doc = Document::new(format!("doc-{}", i), "text", DocumentSource::Paste);
            storage.put_document(&doc).unwrap();
        }
        storage.flush().unwrap();

        let stats = storage.get_stats().unwrap();
        assert_eq!(stats.document_count, 4);
        assert!(stats.disk_usage_bytes > 0);
    }

    #[test]
    fn test_documents_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let storage = Storage::open(temp_dir.path()).unwrap();
            let doc = Document::new("persisted", "still here", DocumentSource::Paste);
            storage.put_document(&doc).unwrap();
        }
        let storage = Storage::open(temp_dir.path()).unwrap();
        assert!(storage.get_document("persisted").unwrap().is_some());
    }
}
