//! Index persistence.
//!
//! The whole [`IndexState`] is written to one file, `index.rvx`, on every
//! flush. Layout (little-endian):
//!
//! ```text
//! magic      8 bytes   "RTRVIDX\0"
//! version    u32
//! dimension  u32
//! count      u64       N
//! matrix     N*D f32   row-major
//! id_count   u64       must equal N
//! ids        N x (u32 length, UTF-8 bytes)
//! ```
//!
//! Flush order: write `index.rvx.tmp` -> fsync -> rename over `index.rvx`
//! -> fsync directory. A crash at any step leaves the previous file intact.
//! The rename is the commit point: once it succeeds the flush reports
//! success, and a failed directory fsync is only logged.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::VectorError;
use crate::flat::FlatIndex;
use crate::id_map::IdentifierMap;
use crate::state::IndexState;

/// Name of the persisted index inside the index directory
pub const INDEX_FILE_NAME: &str = "index.rvx";

const TEMP_SUFFIX: &str = "tmp";
const MAGIC: &[u8; 8] = b"RTRVIDX\0";
const VERSION: u32 = 1;
const HEADER_LEN: usize = 8 + 4 + 4 + 8;

/// Handle to the on-disk index file.
#[derive(Debug, Clone)]
pub struct IndexFile {
    dir: PathBuf,
}

impl IndexFile {
    /// Index stored under `dir`. The directory is created on first flush.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the index file
    pub fn path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE_NAME)
    }

    fn temp_path(&self) -> PathBuf {
        self.path().with_extension(format!("rvx.{}", TEMP_SUFFIX))
    }

    pub fn exists(&self) -> bool {
        self.path().exists()
    }

    /// Size of the persisted file, 0 if it does not exist.
    pub fn size_bytes(&self) -> u64 {
        fs::metadata(self.path()).map(|m| m.len()).unwrap_or(0)
    }

    /// Load the persisted state.
    ///
    /// Returns [`VectorError::NotFound`] when nothing has been flushed yet.
    pub fn load(&self, expected_dimension: usize) -> Result<IndexState, VectorError> {
        let path = self.path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(VectorError::NotFound(path));
            }
            Err(e) => return Err(e.into()),
        };

        let state = decode(&bytes, expected_dimension)?;
        info!(
            path = ?path,
            vectors = state.count(),
            dim = state.dimension(),
            "Loaded vector index"
        );
        Ok(state)
    }

    /// Atomically replace the persisted state with `state`.
    pub fn flush(&self, state: &IndexState) -> Result<(), VectorError> {
        state.check_consistency()?;
        self.write_bytes(&encode(state))
    }

    /// Atomically replace the persisted state with pre-encoded bytes.
    pub fn write_bytes(&self, bytes: &[u8]) -> Result<(), VectorError> {
        fs::create_dir_all(&self.dir)?;

        let temp = self.temp_path();
        let result = write_synced(&temp, bytes).and_then(|_| fs::rename(&temp, self.path()));
        if let Err(e) = result {
            // Best effort; a stale temp file is overwritten by the next flush.
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }
        sync_committed_dir(&self.dir);

        debug!(path = ?self.path(), bytes = bytes.len(), "Flushed vector index");
        Ok(())
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Fsync the directory after the rename has committed the new file.
///
/// Returns whether the sync succeeded.
fn sync_committed_dir(dir: &Path) -> bool {
    match sync_dir(dir) {
        Ok(()) => true,
        Err(e) => {
            warn!(dir = ?dir, error = %e, "Index file replaced but directory fsync failed");
            false
        }
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

/// Encode a state into the on-disk layout.
pub fn encode(state: &IndexState) -> Vec<u8> {
    let ids = state.ids();
    let id_bytes: usize = ids.iter().map(|id| 4 + id.len()).sum();
    let mut out = Vec::with_capacity(HEADER_LEN + state.store().as_slice().len() * 4 + 8 + id_bytes);

    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&(state.dimension() as u32).to_le_bytes());
    out.extend_from_slice(&(state.count() as u64).to_le_bytes());

    for value in state.store().as_slice() {
        out.extend_from_slice(&value.to_le_bytes());
    }

    out.extend_from_slice(&(ids.len() as u64).to_le_bytes());
    for id in ids.iter() {
        out.extend_from_slice(&(id.len() as u32).to_le_bytes());
        out.extend_from_slice(id.as_bytes());
    }
    out
}

/// Decode the on-disk layout, checking it against the configured dimension.
pub fn decode(bytes: &[u8], expected_dimension: usize) -> Result<IndexState, VectorError> {
    let mut reader = Reader::new(bytes);

    if reader.take(MAGIC.len(), "magic")? != MAGIC {
        return Err(VectorError::CorruptState("bad magic number".to_string()));
    }
    let version = reader.u32("version")?;
    if version != VERSION {
        return Err(VectorError::CorruptState(format!(
            "unsupported format version {}",
            version
        )));
    }

    let dimension = reader.u32("dimension")? as usize;
    if dimension != expected_dimension {
        return Err(VectorError::CorruptState(format!(
            "stored dimension {} does not match configured dimension {}",
            dimension, expected_dimension
        )));
    }

    let count = usize::try_from(reader.u64("count")?)
        .map_err(|_| VectorError::CorruptState("vector count overflows usize".to_string()))?;
    let values = count
        .checked_mul(dimension)
        .filter(|v| v.checked_mul(4).is_some_and(|b| b <= reader.remaining()))
        .ok_or_else(|| {
            VectorError::CorruptState(format!(
                "{} vectors of dimension {} exceed file size",
                count, dimension
            ))
        })?;

    let matrix = reader.take(values * 4, "matrix")?;
    let data: Vec<f32> = matrix
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    let id_count = reader.u64("id_count")?;
    if id_count != count as u64 {
        return Err(VectorError::CorruptState(format!(
            "{} vectors but {} identifier bindings",
            count, id_count
        )));
    }

    let mut ids = Vec::with_capacity(count);
    for position in 0..count {
        let len = reader.u32("identifier length")? as usize;
        let raw = reader.take(len, "identifier")?;
        let id = std::str::from_utf8(raw).map_err(|e| {
            VectorError::CorruptState(format!("identifier at position {}: {}", position, e))
        })?;
        if id.is_empty() {
            return Err(VectorError::CorruptState(format!(
                "empty identifier at position {}",
                position
            )));
        }
        ids.push(id.to_string());
    }

    if reader.remaining() != 0 {
        return Err(VectorError::CorruptState(format!(
            "{} trailing bytes after identifiers",
            reader.remaining()
        )));
    }

    let store = FlatIndex::from_raw(dimension, data)?;
    IndexState::from_parts(store, ids.into_iter().collect::<IdentifierMap>())
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8], VectorError> {
        if len > self.remaining() {
            return Err(VectorError::CorruptState(format!(
                "truncated file while reading {} at offset {}",
                what, self.offset
            )));
        }
        let slice = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn u32(&mut self, what: &str) -> Result<u32, VectorError> {
        let b = self.take(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self, what: &str) -> Result<u64, VectorError> {
        let b = self.take(8, what)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_le_bytes(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use tempfile::TempDir;

    fn populated_state(dim: usize, n: usize) -> IndexState {
        let mut rng = rand::rng();
        let mut state = IndexState::new(dim);
        for i in 0..n {
            let v: Vec<f32> = (0..dim).map(|_| rng.random::<f32>() * 2.0 - 1.0).collect();
            state.append_bound(&v, &format!("doc-{}", i % 7)).unwrap();
        }
        state
    }

    #[test]
    fn test_load_missing_file_is_not_found() {
        let temp = TempDir::new().unwrap();
        let file = IndexFile::new(temp.path().join("never-flushed"));
        assert!(matches!(file.load(3), Err(VectorError::NotFound(_))));
        assert_eq!(file.size_bytes(), 0);
    }

    #[test]
    fn test_flush_and_load_is_bit_exact() {
        let temp = TempDir::new().unwrap();
        let file = IndexFile::new(temp.path());
        let mut state = populated_state(16, 40);
        // Values that do not survive a decimal round trip
        let mut awkward = vec![0.0f32; 16];
        awkward[..7].copy_from_slice(&[
            f32::MIN_POSITIVE,
            -0.0,
            1.0e-38,
            f32::MAX,
            0.1,
            1.0 / 3.0,
            -7.25,
        ]);
        state.append_bound(&awkward, "édition-ü").unwrap();

        file.flush(&state).unwrap();
        let loaded = file.load(16).unwrap();

        assert_eq!(loaded.count(), state.count());
        let original_bits: Vec<u32> = state.store().as_slice().iter().map(|v| v.to_bits()).collect();
        let loaded_bits: Vec<u32> = loaded.store().as_slice().iter().map(|v| v.to_bits()).collect();
        assert_eq!(original_bits, loaded_bits);
        assert_eq!(loaded.ids(), state.ids());
        assert_eq!(loaded.ids().positions_of("doc-3"), state.ids().positions_of("doc-3"));
    }

    #[test]
    fn test_empty_state_round_trips() {
        let temp = TempDir::new().unwrap();
        let file = IndexFile::new(temp.path());
        file.flush(&IndexState::new(8)).unwrap();

        let loaded = file.load(8).unwrap();
        assert_eq!(loaded.count(), 0);
        assert_eq!(loaded.dimension(), 8);
    }

    #[test]
    fn test_dimension_mismatch_on_load() {
        let temp = TempDir::new().unwrap();
        let file = IndexFile::new(temp.path());
        file.flush(&populated_state(4, 3)).unwrap();

        let result = file.load(8);
        assert!(matches!(result, Err(VectorError::CorruptState(msg)) if msg.contains("dimension")));
    }

    #[test]
    fn test_count_mismatch_detected() {
        let mut bytes = encode(&populated_state(2, 3));
        // id_count sits right after the 3x2 matrix
        let id_count_offset = HEADER_LEN + 3 * 2 * 4;
        bytes[id_count_offset..id_count_offset + 8].copy_from_slice(&2u64.to_le_bytes());

        let result = decode(&bytes, 2);
        assert!(matches!(result, Err(VectorError::CorruptState(msg)) if msg.contains("bindings")));
    }

    #[test]
    fn test_truncated_file_detected() {
        let bytes = encode(&populated_state(4, 5));
        for cut in [0, 7, HEADER_LEN, HEADER_LEN + 10, bytes.len() - 1] {
            assert!(
                matches!(decode(&bytes[..cut], 4), Err(VectorError::CorruptState(_))),
                "cut at {} should be rejected",
                cut
            );
        }
    }

    #[test]
    fn test_trailing_bytes_detected() {
        let mut bytes = encode(&populated_state(4, 2));
        bytes.push(0);
        assert!(matches!(decode(&bytes, 4), Err(VectorError::CorruptState(_))));
    }

    #[test]
    fn test_huge_count_does_not_allocate() {
        let mut bytes = encode(&IndexState::new(4));
        bytes[16..24].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(matches!(decode(&bytes, 4), Err(VectorError::CorruptState(_))));
    }

    #[test]
    fn test_flush_replaces_previous_state() {
        let temp = TempDir::new().unwrap();
        let file = IndexFile::new(temp.path());

        let mut state = IndexState::new(2);
        state.append_bound(&[1.0, 2.0], "a").unwrap();
        file.flush(&state).unwrap();
        state.append_bound(&[3.0, 4.0], "b").unwrap();
        file.flush(&state).unwrap();

        assert_eq!(file.load(2).unwrap().count(), 2);
        assert!(!file.temp_path().exists());
    }

    #[test]
    fn test_failed_flush_keeps_previous_file() {
        let temp = TempDir::new().unwrap();
        let file = IndexFile::new(temp.path());
        let mut state = IndexState::new(2);
        state.append_bound(&[1.0, 2.0], "a").unwrap();
        file.flush(&state).unwrap();

        // A directory squatting on the temp path makes the write fail
        fs::create_dir(file.temp_path()).unwrap();
        state.append_bound(&[3.0, 4.0], "b").unwrap();
        assert!(file.flush(&state).is_err());

        let loaded = file.load(2).unwrap();
        assert_eq!(loaded.count(), 1);
        assert_eq!(loaded.ids().resolve(0), Some("a"));
    }

    #[test]
    fn test_directory_sync_failure_after_commit_is_not_an_error() {
        let temp = TempDir::new().unwrap();
        assert!(sync_committed_dir(temp.path()));

        // Once the rename has happened the flush outcome no longer depends
        // on the directory sync
        #[cfg(unix)]
        assert!(!sync_committed_dir(&temp.path().join("gone")));
    }
}
