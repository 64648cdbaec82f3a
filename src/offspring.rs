//! Live-offspring counter: for each seed, how many of its descendants
//! (including itself) are currently somewhere in the frontier — queued,
//! claimed, or otherwise not yet removed — per `SPEC_FULL.md` §4.3.
//!
//! Backed by the `seed_count` store so it survives a restart; mirrored in
//! memory so `get` never touches rocksdb on the hot path. Every mutator
//! writes through to storage before updating the cache, so a crash between
//! the two leaves the persisted value authoritative on the next rebuild.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::StorageError;
use crate::storage::Storage;
use crate::url_record::SeedDocid;

#[derive(Default)]
pub struct OffspringCounter {
    cache: Mutex<HashMap<SeedDocid, i64>>,
}

impl OffspringCounter {
    pub fn new() -> Self {
        OffspringCounter::default()
    }

    /// Rebuild the in-memory cache from storage. Called once at startup.
    pub fn load_from(storage: &Storage) -> Result<Self, StorageError> {
        let mut cache = HashMap::new();
        for (seed, count) in storage.all_seed_counts()? {
            cache.insert(seed, count);
        }
        Ok(OffspringCounter {
            cache: Mutex::new(cache),
        })
    }

    pub fn get(&self, seed: SeedDocid) -> i64 {
        *self.cache.lock().unwrap().get(&seed).unwrap_or(&0)
    }

    pub fn increment(&self, storage: &Storage, seed: SeedDocid) -> Result<i64, StorageError> {
        let mut cache = self.cache.lock().unwrap();
        let next = cache.get(&seed).copied().unwrap_or(0) + 1;
        storage.put_seed_count(seed, next)?;
        cache.insert(seed, next);
        Ok(next)
    }

    pub fn decrement(&self, storage: &Storage, seed: SeedDocid) -> Result<i64, StorageError> {
        self.decrement_by(storage, seed, 1)
    }

    pub fn decrement_by(&self, storage: &Storage, seed: SeedDocid, n: i64) -> Result<i64, StorageError> {
        let mut cache = self.cache.lock().unwrap();
        let next = cache.get(&seed).copied().unwrap_or(0) - n;
        if next <= 0 {
            storage.delete_seed_count(seed)?;
            cache.remove(&seed);
        } else {
            storage.put_seed_count(seed, next)?;
            cache.insert(seed, next);
        }
        Ok(next)
    }

    /// Force the counter for `seed` to `expected_count`, e.g. when a seed is
    /// (re)submitted with a known fan-out. Zero removes the entry.
    pub fn reset(&self, storage: &Storage, seed: SeedDocid, expected_count: i64) -> Result<(), StorageError> {
        let mut cache = self.cache.lock().unwrap();
        if expected_count <= 0 {
            storage.delete_seed_count(seed)?;
            cache.remove(&seed);
        } else {
            storage.put_seed_count(seed, expected_count)?;
            cache.insert(seed, expected_count);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_tmp() -> (Storage, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path(), true).unwrap();
        (storage, dir)
    }

    #[test]
    fn increment_and_decrement_round_trip_through_storage() {
        let (storage, _dir) = open_tmp();
        let counter = OffspringCounter::new();

        assert_eq!(counter.increment(&storage, 7).unwrap(), 1);
        assert_eq!(counter.increment(&storage, 7).unwrap(), 2);
        assert_eq!(storage.get_seed_count(7).unwrap(), 2);

        assert_eq!(counter.decrement(&storage, 7).unwrap(), 1);
        assert_eq!(counter.decrement(&storage, 7).unwrap(), 0);
        assert_eq!(storage.get_seed_count(7).unwrap(), 0);
        assert_eq!(counter.get(7), 0);
    }

    #[test]
    fn load_from_rebuilds_cache_from_persisted_counts() {
        let (storage, _dir) = open_tmp();
        storage.put_seed_count(3, 5).unwrap();

        let counter = OffspringCounter::load_from(&storage).unwrap();
        assert_eq!(counter.get(3), 5);
    }

    #[test]
    fn decrement_by_clears_the_entry_at_zero_rather_than_leaving_a_stale_row() {
        let (storage, _dir) = open_tmp();
        let counter = OffspringCounter::new();
        counter.reset(&storage, 1, 3).unwrap();

        counter.decrement_by(&storage, 1, 3).unwrap();
        assert_eq!(counter.get(1), 0);
        assert_eq!(storage.get_seed_count(1).unwrap(), 0);
        assert!(storage.all_seed_counts().unwrap().is_empty());
    }
}
