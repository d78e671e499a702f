//! # retrievo-vector
//!
//! Exact nearest-neighbour index for retrievo.
//!
//! Vectors are stored in a flat, row-major array and searched by brute
//! force with squared Euclidean distance. Each vector's position is bound to
//! an external document identifier, and the pair is persisted to a single
//! binary file that is replaced atomically on every flush.
//!
//! ## Features
//! - Flat (exact) k-NN search, ties broken by insertion order
//! - Append-only position -> identifier map with reverse lookup
//! - Lockstep append + bind through [`IndexState`]
//! - Crash-safe persistence via temp file + rename

pub mod error;
pub mod flat;
pub mod id_map;
pub mod index;
pub mod persist;
pub mod state;

pub use error::VectorError;
pub use flat::{squared_l2, FlatIndex};
pub use id_map::IdentifierMap;
pub use index::{IndexStats, Position, SearchHit, VectorIndex};
pub use persist::{IndexFile, INDEX_FILE_NAME};
pub use state::IndexState;
