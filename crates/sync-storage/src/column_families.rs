//! Column family definitions for RocksDB.
//!
//! - indexed: tracking records, one per (index, item)
//! - deleted: pending-deletion log, one entry per (index, item)

use rocksdb::{ColumnFamilyDescriptor, Options};

/// Column family name for tracking records
pub const CF_INDEXED: &str = "indexed";

/// Column family name for the pending-deletion log
pub const CF_DELETED: &str = "deleted";

/// All column family names
pub const ALL_CF_NAMES: &[&str] = &[CF_INDEXED, CF_DELETED];

/// Deletion log is written and drained in bursts; keep it small on disk.
fn deleted_options() -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
    opts
}

/// Build all column family descriptors
pub fn build_cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    vec![
        ColumnFamilyDescriptor::new(CF_INDEXED, Options::default()),
        ColumnFamilyDescriptor::new(CF_DELETED, deleted_options()),
    ]
}
