//! Vector index trait and types.
//!
//! Defines the interface for exact vector similarity search.

use crate::error::VectorError;

/// Zero-based insertion index of a stored vector.
pub type Position = usize;

/// Result of a vector search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    /// Position of the stored vector
    pub position: Position,
    /// Squared Euclidean distance to the query (lower = more similar)
    pub distance: f32,
}

impl SearchHit {
    pub fn new(position: Position, distance: f32) -> Self {
        Self { position, distance }
    }
}

/// Index statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Number of vectors in the index
    pub vector_count: usize,
    /// Embedding dimension
    pub dimension: usize,
    /// Index file size in bytes (0 if never flushed)
    pub size_bytes: u64,
}

/// Trait for vector indexes.
///
/// Positions are assigned densely in insertion order and never reused.
pub trait VectorIndex: Send + Sync {
    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the number of vectors in the index
    fn len(&self) -> usize;

    /// Check if the index is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a vector, returning its position.
    fn append(&mut self, vector: &[f32]) -> Result<Position, VectorError>;

    /// Search for the k nearest neighbours.
    /// Returns hits sorted by ascending distance, ties by lower position.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, VectorError>;
}
