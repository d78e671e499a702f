//! Paired vector store and identifier map.
//!
//! `IndexState` is the unit that gets locked, persisted and restored. Its
//! invariant: `store.count() == ids.len()` at every observable point.

use tracing::debug;

use crate::error::VectorError;
use crate::flat::FlatIndex;
use crate::id_map::IdentifierMap;
use crate::index::{IndexStats, Position, SearchHit, VectorIndex};

/// Flat index plus its position -> identifier bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexState {
    store: FlatIndex,
    ids: IdentifierMap,
}

impl IndexState {
    /// Create an empty state for the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            store: FlatIndex::new(dimension),
            ids: IdentifierMap::new(),
        }
    }

    /// Assemble a state from parts, checking that they agree.
    pub fn from_parts(store: FlatIndex, ids: IdentifierMap) -> Result<Self, VectorError> {
        let state = Self { store, ids };
        state.check_consistency()?;
        Ok(state)
    }

    pub fn dimension(&self) -> usize {
        self.store.dimension()
    }

    /// Number of vectors (and bindings).
    pub fn count(&self) -> usize {
        self.store.count()
    }

    pub fn store(&self) -> &FlatIndex {
        &self.store
    }

    pub fn ids(&self) -> &IdentifierMap {
        &self.ids
    }

    /// Append `vector` and bind it to `external_id` in one step.
    ///
    /// Both inputs are validated before anything is mutated, so an error
    /// leaves the state exactly as it was.
    pub fn append_bound(
        &mut self,
        vector: &[f32],
        external_id: &str,
    ) -> Result<Position, VectorError> {
        self.store.validate(vector)?;
        if external_id.is_empty() {
            return Err(VectorError::EmptyIdentifier);
        }
        self.check_consistency()?;

        let position = self.store.append(vector)?;
        if let Err(e) = self.ids.bind(position, external_id) {
            self.store.truncate(position);
            return Err(e);
        }

        debug!(position = position, id = %external_id, "Appended bound vector");
        Ok(position)
    }

    /// Search the store. Identifiers are resolved by the caller.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, VectorError> {
        self.store.search(query, k)
    }

    /// Identifier bound to `position`.
    pub fn resolve(&self, position: Position) -> Option<&str> {
        self.ids.resolve(position)
    }

    /// Undo appends back to `count` vectors.
    pub fn rollback_to(&mut self, count: usize) {
        self.store.truncate(count);
        self.ids.truncate(count);
        debug!(count = count, "Rolled back index state");
    }

    /// Fail if the store and the map disagree on N.
    pub fn check_consistency(&self) -> Result<(), VectorError> {
        if self.store.count() != self.ids.len() {
            return Err(VectorError::Consistency(format!(
                "store holds {} vectors but {} positions are bound",
                self.store.count(),
                self.ids.len()
            )));
        }
        Ok(())
    }

    /// Stats without file information.
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            vector_count: self.count(),
            dimension: self.dimension(),
            size_bytes: 0,
        }
    }
}
