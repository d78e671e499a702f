//! Position to document identifier mapping.
//!
//! Maps dense vector positions (0..N) to external document identifiers.
//! Append-only: `bind` must be called exactly once per position, in order.
//! One identifier may own many positions (one per embedded chunk).

use std::collections::HashMap;

use crate::error::VectorError;
use crate::index::Position;

/// Bidirectional position <-> identifier map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierMap {
    ids: Vec<String>,
    positions: HashMap<String, Vec<Position>>,
}

impl IdentifierMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bound positions
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Bind `position` to `external_id`.
    ///
    /// `position` must equal the current number of bindings.
    pub fn bind(&mut self, position: Position, external_id: &str) -> Result<(), VectorError> {
        if position != self.ids.len() {
            return Err(VectorError::Consistency(format!(
                "bind out of sequence: expected position {}, got {}",
                self.ids.len(),
                position
            )));
        }
        if external_id.is_empty() {
            return Err(VectorError::EmptyIdentifier);
        }

        self.ids.push(external_id.to_string());
        self.positions
            .entry(external_id.to_string())
            .or_default()
            .push(position);
        Ok(())
    }

    /// Identifier bound to `position`, if any.
    pub fn resolve(&self, position: Position) -> Option<&str> {
        self.ids.get(position).map(String::as_str)
    }

    /// Every position bound to `external_id`, ascending.
    pub fn positions_of(&self, external_id: &str) -> &[Position] {
        self.positions
            .get(external_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of distinct identifiers
    pub fn distinct_ids(&self) -> usize {
        self.positions.len()
    }

    /// Iterate identifiers in position order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Drop every binding at or after `len`.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.ids.len() {
            return;
        }
        for (position, id) in self.ids.drain(len..).enumerate() {
            let position = position + len;
            if let Some(bound) = self.positions.get_mut(&id) {
                bound.retain(|p| *p != position);
                if bound.is_empty() {
                    self.positions.remove(&id);
                }
            }
        }
    }
}

impl FromIterator<String> for IdentifierMap {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut map = IdentifierMap::new();
        for id in iter {
            map.positions
                .entry(id.clone())
                .or_default()
                .push(map.ids.len());
            map.ids.push(id);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_and_resolve() {
        let mut map = IdentifierMap::new();
        map.bind(0, "doc-a").unwrap();
        map.bind(1, "doc-b").unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map.resolve(0), Some("doc-a"));
        assert_eq!(map.resolve(1), Some("doc-b"));
        assert_eq!(map.resolve(2), None);
    }

    #[test]
    fn test_bind_out_of_sequence() {
        let mut map = IdentifierMap::new();
        map.bind(0, "doc-a").unwrap();

        let skip = map.bind(2, "doc-c");
        assert!(matches!(skip, Err(VectorError::Consistency(_))));

        let repeat = map.bind(0, "doc-z");
        assert!(matches!(repeat, Err(VectorError::Consistency(_))));

        assert_eq!(map.len(), 1);
        assert_eq!(map.resolve(0), Some("doc-a"));
    }

    #[test]
    fn test_empty_identifier_rejected() {
        let mut map = IdentifierMap::new();
        assert!(matches!(map.bind(0, ""), Err(VectorError::EmptyIdentifier)));
        assert!(map.is_empty());
    }

    #[test]
    fn test_reverse_lookup_with_chunks() {
        let mut map = IdentifierMap::new();
        map.bind(0, "doc-a").unwrap();
        map.bind(1, "doc-b").unwrap();
        map.bind(2, "doc-a").unwrap();

        assert_eq!(map.positions_of("doc-a"), &[0, 2]);
        assert_eq!(map.positions_of("doc-b"), &[1]);
        assert!(map.positions_of("missing").is_empty());
        assert_eq!(map.distinct_ids(), 2);
    }

    #[test]
    fn test_truncate_updates_reverse_index() {
        let mut map = IdentifierMap::new();
        map.bind(0, "doc-a").unwrap();
        map.bind(1, "doc-b").unwrap();
        map.bind(2, "doc-a").unwrap();

        map.truncate(1);
        assert_eq!(map.len(), 1);
        assert_eq!(map.positions_of("doc-a"), &[0]);
        assert!(map.positions_of("doc-b").is_empty());

        map.bind(1, "doc-c").unwrap();
        assert_eq!(map.resolve(1), Some("doc-c"));
    }

    #[test]
    fn test_from_iter_matches_binds() {
        let collected: IdentifierMap = ["x", "y", "x"].iter().map(|s| s.to_string()).collect();

        let mut bound = IdentifierMap::new();
        for (p, id) in ["x", "y", "x"].iter().enumerate() {
            bound.bind(p, id).unwrap();
        }
        assert_eq!(collected, bound);
    }
}
