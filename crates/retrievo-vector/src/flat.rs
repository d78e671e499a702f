//! Flat (exact) vector index.
//!
//! Vectors live in one row-major `Vec<f32>`, so appends reuse `Vec`'s
//! geometric growth and a search is a single linear scan. A bounded
//! max-heap keeps the k best hits seen so far.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::debug;

use crate::error::VectorError;
use crate::index::{Position, SearchHit, VectorIndex};

/// Squared Euclidean distance, accumulated in f32.
///
/// Both slices must have the same length; extra components are ignored.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Heap entry ordered by (distance, position) so the heap's top is the
/// current worst hit.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance: f32,
    position: Position,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.position.cmp(&other.position))
    }
}

/// In-memory flat array of fixed-dimension vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Create an empty index for vectors of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    /// Create an empty index with room for `capacity` vectors.
    pub fn with_capacity(dimension: usize, capacity: usize) -> Self {
        Self {
            dimension,
            data: Vec::with_capacity(dimension.saturating_mul(capacity)),
        }
    }

    /// Rebuild an index from a row-major matrix.
    pub(crate) fn from_raw(dimension: usize, data: Vec<f32>) -> Result<Self, VectorError> {
        if dimension == 0 || data.len() % dimension != 0 {
            return Err(VectorError::CorruptState(format!(
                "matrix of {} values is not a multiple of dimension {}",
                data.len(),
                dimension
            )));
        }
        Ok(Self { dimension, data })
    }

    /// Number of stored vectors (N).
    pub fn count(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    /// Borrow the vector stored at `position`.
    pub fn vector(&self, position: Position) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        let end = start.checked_add(self.dimension)?;
        self.data.get(start..end)
    }

    /// Iterate stored vectors in position order.
    pub fn iter(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dimension.max(1))
    }

    /// Row-major view of the whole matrix.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Drop every vector at or after `len`.
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len.saturating_mul(self.dimension));
    }

    /// Check a vector's shape and values without storing it.
    pub fn validate(&self, vector: &[f32]) -> Result<(), VectorError> {
        if vector.len() != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if let Some(index) = vector.iter().position(|v| !v.is_finite()) {
            return Err(VectorError::NonFiniteComponent { index });
        }
        Ok(())
    }
}

impl VectorIndex for FlatIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.count()
    }

    fn append(&mut self, vector: &[f32]) -> Result<Position, VectorError> {
        self.validate(vector)?;
        let position = self.count();
        self.data.extend_from_slice(vector);
        Ok(position)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, VectorError> {
        self.validate(query)?;

        let k = k.min(self.count());
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(k + 1);
        for (position, stored) in self.iter().enumerate() {
            let candidate = Candidate {
                distance: squared_l2(query, stored),
                position,
            };
            if heap.len() < k {
                heap.push(candidate);
            } else if let Some(worst) = heap.peek() {
                if candidate < *worst {
                    heap.pop();
                    heap.push(candidate);
                }
            }
        }

        let hits: Vec<SearchHit> = heap
            .into_sorted_vec()
            .into_iter()
            .map(|c| SearchHit::new(c.position, c.distance))
            .collect();

        debug!(k = k, scanned = self.count(), "Flat search complete");
        Ok(hits)
    }
}
