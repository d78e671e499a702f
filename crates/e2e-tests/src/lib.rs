//! End-to-end test infrastructure for retrievo.
//!
//! Provides a shared TestHarness and helper functions for E2E tests
//! covering the add -> persist -> search -> join pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use rand::Rng;

use retrievo_service::{RetrievalConfig, RetrievalService};
use retrievo_storage::Storage;
use retrievo_types::{Document, DocumentSource};

/// Shared test harness for E2E tests.
///
/// Owns a temp directory holding both the document store and the index
/// directory, so services can be opened, dropped and reopened against the
/// same on-disk state.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Shared storage instance
    pub storage: Arc<Storage>,
    /// Path for vector index files
    pub index_path: PathBuf,
}

impl TestHarness {
    /// Create a new test harness with temp directory and storage.
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let storage = Arc::new(
            Storage::open(&temp_dir.path().join("db")).expect("Failed to open test storage"),
        );
        let index_path = temp_dir.path().join("vector-index");

        Self {
            _temp_dir: temp_dir,
            storage,
            index_path,
        }
    }

    /// Retrieval config for this harness' index directory.
    pub fn config(&self, dimension: usize) -> RetrievalConfig {
        RetrievalConfig::new(dimension, &self.index_path)
    }

    /// Open (or reopen) the retrieval service over the harness storage.
    pub fn open_service(&self, dimension: usize) -> Arc<RetrievalService> {
        Arc::new(
            RetrievalService::open(self.config(dimension), self.storage.clone())
                .expect("Failed to open retrieval service"),
        )
    }

    /// Store one document per `(id, text)` pair.
    pub fn seed_documents(&self, docs: &[(&str, &str)]) {
        for (id, text) in docs {
            self.storage
                .put_document(&Document::new(*id, *text, DocumentSource::Paste))
                .expect("Failed to put document");
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Vector of `dimension` components drawn uniformly from [-1, 1).
pub fn random_vector<R: Rng>(rng: &mut R, dimension: usize) -> Vec<f32> {
    (0..dimension)
        .map(|_| rng.random::<f32>() * 2.0 - 1.0)
        .collect()
}

/// Standard basis vector `e_axis`.
pub fn basis_vector(dimension: usize, axis: usize) -> Vec<f32> {
    let mut v = vec![0.0; dimension];
    v[axis] = 1.0;
    v
}
