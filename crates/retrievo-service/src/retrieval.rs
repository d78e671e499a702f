//! Retrieval service: add vectors durably, search them, join hits with documents.
//!
//! A single `RwLock<IndexState>` guards the paired store and identifier map.
//! `add` holds the write lock from append through flush, so readers never
//! observe an unflushed vector. `search` and `status` take the read lock.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use backoff::{backoff::Backoff, ExponentialBackoff};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use retrievo_storage::DocumentLookup;
use retrievo_types::Settings;
use retrievo_vector::{persist, IndexFile, IndexState, Position, VectorError};

use crate::error::RetrievalError;

/// Runtime parameters of the retrieval service.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Dimension every vector must have
    pub dimension: usize,
    /// Directory holding the index file
    pub index_dir: PathBuf,
    /// k used when a query does not specify one
    pub default_top_k: u32,
    /// Flush attempts per add, including the first
    pub flush_max_retries: u32,
    pub flush_retry_initial: Duration,
    pub flush_retry_max: Duration,
}

impl RetrievalConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            dimension: settings.dimension,
            index_dir: settings.expanded_index_path(),
            default_top_k: settings.default_top_k,
            flush_max_retries: settings.flush_max_retries,
            flush_retry_initial: Duration::from_millis(settings.flush_retry_initial_ms),
            flush_retry_max: Duration::from_millis(settings.flush_retry_max_ms),
        }
    }

    /// Defaults for an index of `dimension` stored under `index_dir`.
    pub fn new(dimension: usize, index_dir: impl Into<PathBuf>) -> Self {
        Self {
            dimension,
            index_dir: index_dir.into(),
            default_top_k: 5,
            flush_max_retries: 3,
            flush_retry_initial: Duration::from_millis(10),
            flush_retry_max: Duration::from_millis(200),
        }
    }
}

/// Add request.
#[derive(Debug, Clone)]
pub struct AddVector {
    pub external_id: String,
    pub embedding: Vec<f32>,
}

/// Result of a durable add.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOutcome {
    /// Position assigned to the new vector
    pub position: Position,
    /// Vector count after the add
    pub count: usize,
}

/// Search request.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub query_embedding: Vec<f32>,
    /// Falls back to the configured default when `None`
    pub top_k: Option<u32>,
}

/// A search hit joined with its document.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedDocument {
    pub id: String,
    pub text: String,
    pub distance: f32,
}

/// Snapshot of the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStatus {
    pub count: usize,
    pub dimension: usize,
    pub index_path: PathBuf,
    pub size_bytes: u64,
}

/// Exact k-NN retrieval over a persisted flat index.
pub struct RetrievalService {
    config: RetrievalConfig,
    state: RwLock<IndexState>,
    file: IndexFile,
    documents: Arc<dyn DocumentLookup>,
}

impl RetrievalService {
    /// Load the persisted index, or start empty if none has been written.
    pub fn open(
        config: RetrievalConfig,
        documents: Arc<dyn DocumentLookup>,
    ) -> Result<Self, RetrievalError> {
        let file = IndexFile::new(&config.index_dir);
        let state = match file.load(config.dimension) {
            Ok(state) => state,
            Err(VectorError::NotFound(path)) => {
                info!(path = ?path, "No persisted index, starting empty");
                IndexState::new(config.dimension)
            }
            Err(e) => {
                error!(error = %e, path = ?file.path(), "Failed to load vector index");
                return Err(e.into());
            }
        };
        Ok(Self::with_state(config, state, documents))
    }

    /// Wrap an existing state. Nothing is read from disk.
    pub fn with_state(
        config: RetrievalConfig,
        state: IndexState,
        documents: Arc<dyn DocumentLookup>,
    ) -> Self {
        let file = IndexFile::new(&config.index_dir);
        Self {
            config,
            state: RwLock::new(state),
            file,
            documents,
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Append a vector bound to `external_id` and persist before returning.
    ///
    /// On a final flush failure the append is rolled back and
    /// [`RetrievalError::Persistence`] is returned.
    pub async fn add(&self, request: AddVector) -> Result<AddOutcome, RetrievalError> {
        let mut state = self.state.write().await;
        let previous = state.count();

        let position = state
            .append_bound(&request.embedding, &request.external_id)
            .map_err(|e| {
                if let VectorError::Consistency(_) = e {
                    error!(error = %e, "Index state out of sync");
                } else {
                    debug!(error = %e, id = %request.external_id, "Rejected add");
                }
                RetrievalError::from(e)
            })?;

        let bytes: Arc<[u8]> = persist::encode(&state).into();
        if let Err(e) = self.flush_with_retry(bytes).await {
            state.rollback_to(previous);
            error!(
                error = %e,
                id = %request.external_id,
                count = previous,
                "Flush failed, rolled back add"
            );
            return Err(e);
        }

        let count = state.count();
        info!(id = %request.external_id, position, count, "Added vector");
        Ok(AddOutcome { position, count })
    }

    async fn flush_with_retry(&self, bytes: Arc<[u8]>) -> Result<(), RetrievalError> {
        let mut backoff = ExponentialBackoff {
            current_interval: self.config.flush_retry_initial,
            initial_interval: self.config.flush_retry_initial,
            max_interval: self.config.flush_retry_max,
            max_elapsed_time: None,
            ..Default::default()
        };

        let mut attempts = 0;

        loop {
            attempts += 1;

            let file = self.file.clone();
            let payload = Arc::clone(&bytes);
            let result = tokio::task::spawn_blocking(move || file.write_bytes(&payload))
                .await
                .map_err(|e| RetrievalError::Persistence(format!("Flush task failed: {}", e)))?;

            let e = match result {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };

            if attempts >= self.config.flush_max_retries {
                error!(error = %e, attempts, "Max flush retries exceeded");
                return Err(RetrievalError::Persistence(e.to_string()));
            }

            match backoff.next_backoff() {
                Some(duration) => {
                    warn!(
                        error = %e,
                        attempt = attempts,
                        retry_in_ms = duration.as_millis(),
                        "Index flush failed, retrying"
                    );
                    tokio::time::sleep(duration).await;
                }
                None => return Err(RetrievalError::Persistence(e.to_string())),
            }
        }
    }

    /// k nearest documents to the query, ascending by distance.
    ///
    /// Hits whose position has no binding or whose document cannot be found
    /// are dropped, so fewer than k results may come back.
    pub async fn search(
        &self,
        query: SearchQuery,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        let k = query.top_k.unwrap_or(self.config.default_top_k) as usize;

        let resolved: Vec<(Option<String>, f32)> = {
            let state = self.state.read().await;
            let hits = state.search(&query.query_embedding, k)?;
            hits.into_iter()
                .map(|hit| {
                    let id = state.resolve(hit.position).map(str::to_string);
                    if id.is_none() {
                        warn!(position = hit.position, "Search hit has no identifier binding");
                    }
                    (id, hit.distance)
                })
                .collect()
        };

        // Lookups may hit RocksDB, so the whole batch runs off the async workers
        let documents = self.documents.clone();
        let results = tokio::task::spawn_blocking(move || join_documents(&*documents, resolved))
            .await
            .map_err(|e| RetrievalError::Persistence(format!("Document lookup task failed: {}", e)))?;

        debug!(k, returned = results.len(), "Search complete");
        Ok(results)
    }

    pub async fn status(&self) -> IndexStatus {
        let state = self.state.read().await;
        IndexStatus {
            count: state.count(),
            dimension: state.dimension(),
            index_path: self.file.path(),
            size_bytes: self.file.size_bytes(),
        }
    }
}

fn join_documents(
    documents: &dyn DocumentLookup,
    resolved: Vec<(Option<String>, f32)>,
) -> Vec<RetrievedDocument> {
    let mut results = Vec::with_capacity(resolved.len());
    for (id, distance) in resolved {
        let Some(id) = id else { continue };
        match documents.lookup(&id) {
            Ok(Some(doc)) => results.push(RetrievedDocument {
                id,
                text: doc.text,
                distance,
            }),
            Ok(None) => debug!(id = %id, "No document for search hit, dropping"),
            Err(e) => warn!(id = %id, error = %e, "Document lookup failed, dropping hit"),
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use rand::Rng;
    use retrievo_storage::InMemoryDocuments;
    use retrievo_types::{Document, DocumentSource};
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn documents(ids: &[&str]) -> Arc<InMemoryDocuments> {
        Arc::new(
            ids.iter()
                .map(|id| Document::new(*id, format!("text of {}", id), DocumentSource::Paste))
                .collect(),
        )
    }

    fn open_service(
        dir: &TempDir,
        dimension: usize,
        docs: Arc<InMemoryDocuments>,
    ) -> RetrievalService {
        RetrievalService::open(RetrievalConfig::new(dimension, dir.path()), docs).unwrap()
    }

    fn add(id: &str, embedding: &[f32]) -> AddVector {
        AddVector {
            external_id: id.to_string(),
            embedding: embedding.to_vec(),
        }
    }

    fn query(embedding: &[f32], top_k: Option<u32>) -> SearchQuery {
        SearchQuery {
            query_embedding: embedding.to_vec(),
            top_k,
        }
    }

    #[tokio::test]
    async fn test_three_dimensional_example() {
        let dir = TempDir::new().unwrap();
        let service = open_service(&dir, 3, documents(&["a", "b"]));

        let first = service.add(add("a", &[1.0, 0.0, 0.0])).await.unwrap();
        assert_eq!(first, AddOutcome { position: 0, count: 1 });
        let second = service.add(add("b", &[0.0, 1.0, 0.0])).await.unwrap();
        assert_eq!(second.count, 2);

        let results = service.search(query(&[1.0, 0.0, 0.0], Some(2))).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
        assert_eq!(results[0].text, "text of a");
        assert_eq!(results[0].distance, 0.0);
        assert_eq!(results[1].id, "b");
        assert_eq!(results[1].distance, 2.0);
    }

    #[tokio::test]
    async fn test_search_empty_index() {
        let dir = TempDir::new().unwrap();
        let service = open_service(&dir, 4, documents(&[]));

        let results = service.search(query(&[0.0; 4], None)).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_top_k_zero_and_default() {
        let dir = TempDir::new().unwrap();
        let ids: Vec<String> = (0..8).map(|i| format!("doc-{}", i)).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let service = open_service(&dir, 1, documents(&id_refs));
        for (i, id) in ids.iter().enumerate() {
            service.add(add(id, &[i as f32])).await.unwrap();
        }

        assert!(service.search(query(&[0.0], Some(0))).await.unwrap().is_empty());

        let results = service.search(query(&[0.0], None)).await.unwrap();
        assert_eq!(results.len(), 5);
        let returned: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(returned, vec!["doc-0", "doc-1", "doc-2", "doc-3", "doc-4"]);

        let all = service.search(query(&[0.0], Some(100))).await.unwrap();
        assert_eq!(all.len(), 8);
        assert!(all.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_leaves_count_unchanged() {
        let dir = TempDir::new().unwrap();
        let service = open_service(&dir, 3, documents(&["a"]));
        service.add(add("a", &[1.0, 2.0, 3.0])).await.unwrap();

        let err = service.add(add("b", &[1.0, 2.0])).await.unwrap_err();
        assert_eq!(err.kind(), "validation_error");

        let err = service.add(add("", &[1.0, 2.0, 3.0])).await.unwrap_err();
        assert_eq!(err.kind(), "validation_error");

        let err = service.search(query(&[1.0], None)).await.unwrap_err();
        assert_eq!(err.kind(), "validation_error");

        assert_eq!(service.status().await.count, 1);
    }

    #[tokio::test]
    async fn test_self_match_at_zero_distance() {
        let dir = TempDir::new().unwrap();
        let mut rng = rand::rng();
        let ids: Vec<String> = (0..20).map(|i| format!("v{}", i)).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let service = open_service(&dir, 8, documents(&id_refs));

        let mut vectors = Vec::new();
        for id in &ids {
            let v: Vec<f32> = (0..8).map(|_| rng.random::<f32>()).collect();
            service.add(add(id, &v)).await.unwrap();
            vectors.push(v);
        }

        for (id, v) in ids.iter().zip(&vectors) {
            let results = service.search(query(v, Some(1))).await.unwrap();
            assert_eq!(results[0].distance, 0.0);
            assert_eq!(&results[0].id, id);
        }
    }

    #[tokio::test]
    async fn test_missing_document_is_dropped() {
        let dir = TempDir::new().unwrap();
        let service = open_service(&dir, 2, documents(&["kept"]));
        service.add(add("kept", &[0.0, 0.0])).await.unwrap();
        service.add(add("orphan", &[0.1, 0.0])).await.unwrap();

        let results = service.search(query(&[0.0, 0.0], Some(5))).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "kept");
    }

    /// Lookup that drives its own future to completion, which panics if it is
    /// called on an async worker thread.
    struct BlockingLookup(InMemoryDocuments);

    impl DocumentLookup for BlockingLookup {
        fn lookup(
            &self,
            id: &str,
        ) -> Result<Option<Document>, retrievo_storage::StorageError> {
            tokio::runtime::Handle::current().block_on(async { self.0.lookup(id) })
        }
    }

    #[tokio::test]
    async fn test_document_lookups_run_off_async_workers() {
        let dir = TempDir::new().unwrap();
        let docs = BlockingLookup(
            [Document::new("a", "alpha", DocumentSource::File)]
                .into_iter()
                .collect(),
        );
        let service =
            RetrievalService::open(RetrievalConfig::new(2, dir.path()), Arc::new(docs)).unwrap();
        service.add(add("a", &[1.0, 1.0])).await.unwrap();

        let results = service.search(query(&[1.0, 1.0], None)).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "alpha");
    }

    #[tokio::test]
    async fn test_persisted_state_survives_restart() {
        let dir = TempDir::new().unwrap();
        let docs = documents(&["a", "b"]);
        {
            let service = open_service(&dir, 2, docs.clone());
            service.add(add("a", &[0.25, -1.5])).await.unwrap();
            service.add(add("b", &[3.0, 4.0])).await.unwrap();
        }

        let reopened = open_service(&dir, 2, docs);
        let status = reopened.status().await;
        assert_eq!(status.count, 2);
        assert_eq!(status.dimension, 2);
        assert!(status.size_bytes > 0);

        let results = reopened.search(query(&[3.0, 4.0], Some(1))).await.unwrap();
        assert_eq!(results[0].id, "b");
        assert_eq!(results[0].distance, 0.0);
    }

    #[tokio::test]
    async fn test_open_rejects_dimension_change() {
        let dir = TempDir::new().unwrap();
        {
            let service = open_service(&dir, 2, documents(&[]));
            service.add(add("a", &[1.0, 1.0])).await.unwrap();
        }

        let result = RetrievalService::open(RetrievalConfig::new(3, dir.path()), documents(&[]));
        match result {
            Err(e) => assert_eq!(e.kind(), "corrupt_state_error"),
            Ok(_) => panic!("dimension change should be rejected"),
        }
    }

    #[tokio::test]
    async fn test_flush_failure_rolls_back() {
        let dir = TempDir::new().unwrap();
        // A regular file where the index directory should be.
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, b"not a directory").unwrap();

        let mut config = RetrievalConfig::new(2, &blocked);
        config.flush_retry_initial = Duration::from_millis(1);
        config.flush_retry_max = Duration::from_millis(2);
        let service = RetrievalService::with_state(config, IndexState::new(2), documents(&["a"]));

        let err = service.add(add("a", &[1.0, 1.0])).await.unwrap_err();
        assert_eq!(err.kind(), "persistence_error");
        assert_eq!(service.status().await.count, 0);

        let results = service.search(query(&[1.0, 1.0], None)).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_adds_get_unique_positions() {
        let dir = TempDir::new().unwrap();
        let service = Arc::new(open_service(&dir, 4, documents(&[])));

        let tasks = (0..32).map(|i| {
            let service = Arc::clone(&service);
            async move {
                service
                    .add(add(&format!("doc-{}", i), &[i as f32, 0.0, 0.0, 1.0]))
                    .await
                    .unwrap()
            }
        });
        let outcomes = join_all(tasks).await;

        let positions: HashSet<Position> = outcomes.iter().map(|o| o.position).collect();
        assert_eq!(positions.len(), 32);
        assert_eq!(positions, (0..32).collect());
        assert_eq!(service.status().await.count, 32);

        let reopened = open_service(&dir, 4, documents(&[]));
        assert_eq!(reopened.status().await.count, 32);
    }
}
