//! RocksDB wrapper for the tracking store.
//!
//! Provides:
//! - Database open with column family setup
//! - Tracking record reads and writes per (index, item)
//! - Pending-deletion log append, read and scoped removal
//! - Atomic write batches where two writes must land together
//!
//! Nothing is cached in memory: every read reflects what is persisted.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::thread;
use std::time::Duration;

use backoff::{backoff::Backoff, ExponentialBackoff};
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, Direction, IteratorMode, Options, WriteBatch, DB};
use serde::Serialize;
use tracing::{debug, info, warn};

use sync_types::{DeletionEntry, ItemId, SyncKind, TrackingRecord};

use crate::column_families::{build_cf_descriptors, ALL_CF_NAMES, CF_DELETED, CF_INDEXED};
use crate::error::StorageError;
use crate::keys::TrackingKey;

/// Counters for one index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub tracked: usize,
    pub synced: usize,
    pub stale: usize,
    pub pending_deletions: usize,
}

/// Counters for the whole store, keyed by index name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StorageStats {
    pub indexes: BTreeMap<String, IndexStats>,
}

/// Persistent tracking store
pub struct Storage {
    db: DB,
}

impl Storage {
    /// Open storage at the given path, creating if necessary
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        info!("Opening tracking store at {:?}", path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_background_jobs(2);

        let db = DB::open_cf_descriptors(&db_opts, path, build_cf_descriptors())
            .map_err(StorageError::from_open)?;
        Ok(Self { db })
    }

    /// Open storage, waiting up to `max_wait` while another process holds it.
    ///
    /// Only lock contention is retried; any other failure returns at once.
    pub fn open_with_retry(path: &Path, max_wait: Duration) -> Result<Self, StorageError> {
        let mut backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(50),
            current_interval: Duration::from_millis(50),
            max_interval: Duration::from_secs(2),
            max_elapsed_time: Some(max_wait),
            ..ExponentialBackoff::default()
        };
        backoff.reset();

        loop {
            match Self::open(path) {
                Err(err) if err.is_locked() => match backoff.next_backoff() {
                    Some(delay) => {
                        warn!(
                            "Tracking store busy, retrying in {}ms: {}",
                            delay.as_millis(),
                            err
                        );
                        thread::sleep(delay);
                    }
                    None => return Err(err),
                },
                result => return result,
            }
        }
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, StorageError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(name.to_string()))
    }

    /// Collect all (key, value) pairs under an index prefix.
    fn scan_index(
        &self,
        cf_name: &str,
        index_name: &str,
    ) -> Result<Vec<(TrackingKey, Vec<u8>)>, StorageError> {
        let cf = self.cf(cf_name)?;
        let prefix = TrackingKey::index_prefix(index_name);
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));

        let mut results = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            results.push((TrackingKey::from_bytes(&key)?, value.to_vec()));
        }
        Ok(results)
    }

    // ==================== Tracking Records ====================

    /// Get the tracking record for an item, if one exists.
    pub fn get_tracking(
        &self,
        index_name: &str,
        item_id: ItemId,
    ) -> Result<Option<TrackingRecord>, StorageError> {
        let cf = self.cf(CF_INDEXED)?;
        let key = TrackingKey::new(index_name, item_id);
        match self.db.get_cf(cf, key.to_bytes())? {
            Some(bytes) => Ok(Some(TrackingRecord::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Write a tracking record, replacing any existing one.
    pub fn insert_tracking(
        &self,
        index_name: &str,
        item_id: ItemId,
        synced: bool,
    ) -> Result<(), StorageError> {
        let cf = self.cf(CF_INDEXED)?;
        let record = TrackingRecord::new(index_name, item_id, synced);
        let key = TrackingKey::new(index_name, item_id);
        self.db.put_cf(cf, key.to_bytes(), record.to_bytes()?)?;
        debug!(index = %index_name, item_id, synced, "Inserted tracking record");
        Ok(())
    }

    /// Update an existing tracking record.
    ///
    /// No-op when the record is absent; returns whether a record was updated.
    pub fn update_tracking(
        &self,
        index_name: &str,
        item_id: ItemId,
        synced: bool,
    ) -> Result<bool, StorageError> {
        if self.get_tracking(index_name, item_id)?.is_none() {
            debug!(index = %index_name, item_id, "No tracking record to update");
            return Ok(false);
        }
        self.insert_tracking(index_name, item_id, synced)?;
        Ok(true)
    }

    /// Update the record if present, insert it otherwise.
    pub fn insert_or_update_tracking(
        &self,
        index_name: &str,
        item_id: ItemId,
        synced: bool,
    ) -> Result<(), StorageError> {
        if !self.update_tracking(index_name, item_id, synced)? {
            self.insert_tracking(index_name, item_id, synced)?;
        }
        Ok(())
    }

    /// Delete a tracking record. Deleting an absent record is not an error.
    pub fn delete_tracking(&self, index_name: &str, item_id: ItemId) -> Result<(), StorageError> {
        let cf = self.cf(CF_INDEXED)?;
        let key = TrackingKey::new(index_name, item_id);
        self.db.delete_cf(cf, key.to_bytes())?;
        Ok(())
    }

    /// Sync state of every tracked item of an index.
    pub fn tracking_states(&self, index_name: &str) -> Result<HashMap<ItemId, bool>, StorageError> {
        let mut states = HashMap::new();
        for (key, value) in self.scan_index(CF_INDEXED, index_name)? {
            let record = TrackingRecord::from_bytes(&value)?;
            states.insert(key.item_id, record.synced);
        }
        Ok(states)
    }

    /// Mark a dispatched batch as synced in one atomic write.
    ///
    /// `planned_at` is when the pass read its tracking states. An item is
    /// skipped, and left for the next pass, when any of these hold:
    /// its deletion is pending, its record was written after `planned_at`,
    /// or it was `Stale` and its record no longer exists.
    /// Returns the number of records written.
    pub fn mark_synced(
        &self,
        index_name: &str,
        items: &[(ItemId, SyncKind)],
        planned_at: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        let cf = self.cf(CF_INDEXED)?;
        let deleted_cf = self.cf(CF_DELETED)?;
        let mut batch = WriteBatch::default();
        let mut written = 0;

        for (item_id, kind) in items {
            let key = TrackingKey::new(index_name, *item_id);
            if self.db.get_cf(deleted_cf, key.to_bytes())?.is_some() {
                debug!(index = %index_name, item_id, "Deletion pending, not marking");
                continue;
            }
            match self.db.get_cf(cf, key.to_bytes())? {
                Some(bytes) => {
                    let current = TrackingRecord::from_bytes(&bytes)?;
                    if current.updated_at > planned_at {
                        debug!(index = %index_name, item_id, "Record changed during pass, not marking");
                        continue;
                    }
                }
                None if *kind == SyncKind::Stale => {
                    debug!(index = %index_name, item_id, "Record vanished during pass, not marking");
                    continue;
                }
                None => {}
            }
            let record = TrackingRecord::new(index_name, *item_id, true);
            batch.put_cf(cf, key.to_bytes(), record.to_bytes()?);
            written += 1;
        }

        if written > 0 {
            self.db.write(batch)?;
        }
        debug!(index = %index_name, written, "Marked items synced");
        Ok(written)
    }

    // ==================== Deletion Log ====================

    /// Log an item for remote deletion and drop its tracking record.
    ///
    /// Both writes land atomically.
    pub fn record_deletion(&self, index_name: &str, item_id: ItemId) -> Result<(), StorageError> {
        let indexed_cf = self.cf(CF_INDEXED)?;
        let deleted_cf = self.cf(CF_DELETED)?;

        let key = TrackingKey::new(index_name, item_id).to_bytes();
        let entry = DeletionEntry::new(index_name, item_id);

        let mut batch = WriteBatch::default();
        batch.put_cf(deleted_cf, &key, entry.to_bytes()?);
        batch.delete_cf(indexed_cf, &key);
        self.db.write(batch)?;

        debug!(index = %index_name, item_id, "Recorded deletion");
        Ok(())
    }

    /// Ids waiting for remote deletion, in id order.
    pub fn pending_deletions(&self, index_name: &str) -> Result<Vec<ItemId>, StorageError> {
        Ok(self
            .scan_index(CF_DELETED, index_name)?
            .into_iter()
            .map(|(key, _)| key.item_id)
            .collect())
    }

    /// Remove exactly the given ids from the deletion log.
    ///
    /// Entries logged after the caller read the log are left alone.
    pub fn remove_deletions(
        &self,
        index_name: &str,
        item_ids: &[ItemId],
    ) -> Result<usize, StorageError> {
        if item_ids.is_empty() {
            return Ok(0);
        }
        let cf = self.cf(CF_DELETED)?;
        let mut batch = WriteBatch::default();
        for item_id in item_ids {
            batch.delete_cf(cf, TrackingKey::new(index_name, *item_id).to_bytes());
        }
        self.db.write(batch)?;
        debug!(index = %index_name, count = item_ids.len(), "Removed deletion entries");
        Ok(item_ids.len())
    }

    // ==================== Maintenance ====================

    /// Per-index counters across both column families.
    pub fn stats(&self) -> Result<StorageStats, StorageError> {
        let mut stats = StorageStats::default();

        let indexed_cf = self.cf(CF_INDEXED)?;
        for item in self.db.iterator_cf(indexed_cf, IteratorMode::Start) {
            let (key, value) = item?;
            let key = TrackingKey::from_bytes(&key)?;
            let record = TrackingRecord::from_bytes(&value)?;
            let entry = stats.indexes.entry(key.index_name).or_default();
            entry.tracked += 1;
            if record.synced {
                entry.synced += 1;
            } else {
                entry.stale += 1;
            }
        }

        let deleted_cf = self.cf(CF_DELETED)?;
        for item in self.db.iterator_cf(deleted_cf, IteratorMode::Start) {
            let (key, _) = item?;
            let key = TrackingKey::from_bytes(&key)?;
            stats.indexes.entry(key.index_name).or_default().pending_deletions += 1;
        }

        Ok(stats)
    }

    /// Flush all column families to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        for cf_name in ALL_CF_NAMES {
            if let Some(cf) = self.db.cf_handle(cf_name) {
                self.db.flush_cf(cf)?;
            }
        }
        Ok(())
    }
}
