//! Column family definitions for RocksDB.
//!
//! - documents: document records keyed by external identifier

use rocksdb::{ColumnFamilyDescriptor, Options};

/// Column family name for stored documents
pub const CF_DOCUMENTS: &str = "documents";

/// All column family names
pub const ALL_CF_NAMES: &[&str] = &[CF_DOCUMENTS];

/// Documents are write-once and text-heavy
fn documents_options() -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
    opts
}

/// Build all column family descriptors
pub fn build_cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    vec![ColumnFamilyDescriptor::new(CF_DOCUMENTS, documents_options())]
}
