//! The embedded ordered stores backing the frontier: `urls` (composite key
//! → URL record) and `seed_count` (seed docid → offspring count), per
//! `SPEC_FULL.md` §4.1/§6.
//!
//! Both live as column families of a single `rocksdb::TransactionDB`. In
//! resumable mode every mutating call opens a transaction and commits it
//! before returning; off resumable mode, writes go straight to the default
//! column family handles with the write-ahead log disabled — best-effort
//! durability, no transactions, no locking, matching §6's persistence
//! layout.

use std::path::Path;

use rocksdb::{ColumnFamilyDescriptor, Options, TransactionDB, TransactionDBOptions, WriteOptions};

use crate::error::StorageError;
use crate::key::{CompositeKey, KEY_LEN};
use crate::url_record::{SeedDocid, UrlRecord};

const CF_URLS: &str = "urls";
const CF_SEED_COUNT: &str = "seed_count";

pub struct Storage {
    db: TransactionDB,
    resumable: bool,
}

impl Storage {
    pub fn open(folder: &Path, resumable: bool) -> Result<Self, StorageError> {
        std::fs::create_dir_all(folder).map_err(|e| {
            StorageError::Backend(rocksdb::Error::new(format!(
                "failed to create storage folder {}: {e}",
                folder.display()
            )))
        })?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cfs = vec![
            ColumnFamilyDescriptor::new(CF_URLS, Options::default()),
            ColumnFamilyDescriptor::new(CF_SEED_COUNT, Options::default()),
        ];

        let tx_opts = TransactionDBOptions::default();
        let db = TransactionDB::open_cf_descriptors(&db_opts, &tx_opts, folder, cfs)?;

        Ok(Storage { db, resumable })
    }

    fn cf_urls(&self) -> Result<&rocksdb::ColumnFamily, StorageError> {
        self.db
            .cf_handle(CF_URLS)
            .ok_or(StorageError::MissingColumnFamily(CF_URLS))
    }

    fn cf_seed_count(&self) -> Result<&rocksdb::ColumnFamily, StorageError> {
        self.db
            .cf_handle(CF_SEED_COUNT)
            .ok_or(StorageError::MissingColumnFamily(CF_SEED_COUNT))
    }

    fn best_effort_write_opts(&self) -> WriteOptions {
        let mut wo = WriteOptions::default();
        wo.disable_wal(!self.resumable);
        wo
    }

    // --- urls store -----------------------------------------------------

    /// Insert `record` under `key`. Returns `false` if the key already
    /// exists (duplicate docid triple) without modifying anything.
    pub fn put_url(&self, key: &CompositeKey, record: &UrlRecord) -> Result<bool, StorageError> {
        let bytes = bincode::serialize(record)?;
        let wo = self.best_effort_write_opts();

        if self.resumable {
            let txn = self.db.transaction();
            if txn.get_cf(self.cf_urls()?, key.as_bytes())?.is_some() {
                return Ok(false);
            }
            txn.put_cf(self.cf_urls()?, key.as_bytes(), &bytes)?;
            txn.commit()?;
        } else {
            if self.db.get_cf(self.cf_urls()?, key.as_bytes())?.is_some() {
                return Ok(false);
            }
            self.db
                .put_cf_opt(self.cf_urls()?, key.as_bytes(), &bytes, &wo)?;
        }
        Ok(true)
    }

    pub fn delete_url(&self, key: &CompositeKey) -> Result<(), StorageError> {
        let wo = self.best_effort_write_opts();
        if self.resumable {
            let txn = self.db.transaction();
            txn.delete_cf(self.cf_urls()?, key.as_bytes())?;
            txn.commit()?;
        } else {
            self.db.delete_cf_opt(self.cf_urls()?, key.as_bytes(), &wo)?;
        }
        Ok(())
    }

    pub fn get_url(&self, key: &CompositeKey) -> Result<Option<UrlRecord>, StorageError> {
        match self.db.get_cf(self.cf_urls()?, key.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// The smallest-keyed entry in the whole store (every host combined).
    pub fn first(&self) -> Result<Option<(CompositeKey, UrlRecord)>, StorageError> {
        let mut iter = self
            .db
            .iterator_cf(self.cf_urls()?, rocksdb::IteratorMode::Start);
        match iter.next() {
            Some(Ok((k, v))) => Ok(Some((decode_key(&k), bincode::deserialize(&v)?))),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// The entry immediately after `key`, or `None` at the end.
    pub fn next(&self, key: &CompositeKey) -> Result<Option<(CompositeKey, UrlRecord)>, StorageError> {
        let mut iter = self.db.iterator_cf(
            self.cf_urls()?,
            rocksdb::IteratorMode::From(key.as_bytes(), rocksdb::Direction::Forward),
        );
        for item in iter.by_ref() {
            let (k, v) = item?;
            let decoded = decode_key(&k);
            if decoded > *key {
                return Ok(Some((decoded, bincode::deserialize(&v)?)));
            }
        }
        Ok(None)
    }

    /// Every entry currently in the store, in key order. Used to rebuild
    /// in-memory per-host queues and the ready set on startup.
    pub fn iter_all(&self) -> Result<Vec<(CompositeKey, UrlRecord)>, StorageError> {
        let mut out = Vec::new();
        for item in self.db.iterator_cf(self.cf_urls()?, rocksdb::IteratorMode::Start) {
            let (k, v) = item?;
            out.push((decode_key(&k), bincode::deserialize(&v)?));
        }
        Ok(out)
    }

    pub fn count(&self) -> Result<u64, StorageError> {
        Ok(self.iter_all()?.len() as u64)
    }

    /// Delete every record for which `pred` returns true. Returns the
    /// deleted records. Used by `removeOffspring`.
    pub fn delete_where(
        &self,
        pred: impl Fn(&UrlRecord) -> bool,
    ) -> Result<Vec<(CompositeKey, UrlRecord)>, StorageError> {
        let all = self.iter_all()?;
        let doomed: Vec<(CompositeKey, UrlRecord)> =
            all.into_iter().filter(|(_, r)| pred(r)).collect();

        if doomed.is_empty() {
            return Ok(doomed);
        }

        if self.resumable {
            let txn = self.db.transaction();
            for (key, _) in &doomed {
                txn.delete_cf(self.cf_urls()?, key.as_bytes())?;
            }
            txn.commit()?;
        } else {
            let wo = self.best_effort_write_opts();
            for (key, _) in &doomed {
                self.db.delete_cf_opt(self.cf_urls()?, key.as_bytes(), &wo)?;
            }
        }

        Ok(doomed)
    }

    // --- seed_count store -------------------------------------------------

    pub fn get_seed_count(&self, seed: SeedDocid) -> Result<i64, StorageError> {
        match self.db.get_cf(self.cf_seed_count()?, seed.to_be_bytes())? {
            Some(bytes) => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(&bytes[..4]);
                Ok(i32::from_be_bytes(buf) as i64)
            }
            None => Ok(0),
        }
    }

    pub fn put_seed_count(&self, seed: SeedDocid, count: i64) -> Result<(), StorageError> {
        let wo = self.best_effort_write_opts();
        let bytes = (count as i32).to_be_bytes();
        if self.resumable {
            let txn = self.db.transaction();
            txn.put_cf(self.cf_seed_count()?, seed.to_be_bytes(), bytes)?;
            txn.commit()?;
        } else {
            self.db
                .put_cf_opt(self.cf_seed_count()?, seed.to_be_bytes(), bytes, &wo)?;
        }
        Ok(())
    }

    pub fn delete_seed_count(&self, seed: SeedDocid) -> Result<(), StorageError> {
        let wo = self.best_effort_write_opts();
        if self.resumable {
            let txn = self.db.transaction();
            txn.delete_cf(self.cf_seed_count()?, seed.to_be_bytes())?;
            txn.commit()?;
        } else {
            self.db
                .delete_cf_opt(self.cf_seed_count()?, seed.to_be_bytes(), &wo)?;
        }
        Ok(())
    }

    pub fn all_seed_counts(&self) -> Result<Vec<(SeedDocid, i64)>, StorageError> {
        let mut out = Vec::new();
        for item in self
            .db
            .iterator_cf(self.cf_seed_count()?, rocksdb::IteratorMode::Start)
        {
            let (k, v) = item?;
            let mut seed_buf = [0u8; 8];
            seed_buf.copy_from_slice(&k[..8]);
            let mut count_buf = [0u8; 4];
            count_buf.copy_from_slice(&v[..4]);
            out.push((
                SeedDocid::from_be_bytes(seed_buf),
                i32::from_be_bytes(count_buf) as i64,
            ));
        }
        Ok(out)
    }
}

fn decode_key(bytes: &[u8]) -> CompositeKey {
    let mut buf = [0u8; KEY_LEN];
    buf.copy_from_slice(&bytes[..KEY_LEN]);
    CompositeKey::from_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url_record::UrlRecord;

    fn open_tmp(resumable: bool) -> (Storage, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path(), resumable).unwrap();
        (storage, dir)
    }

    #[test]
    fn put_is_idempotent_on_duplicate_key() {
        let (storage, _dir) = open_tmp(true);
        let record = UrlRecord::seed(1, 0, "https://a.test/", "a.test");
        let key = CompositeKey::for_record(&record);

        assert!(storage.put_url(&key, &record).unwrap());
        assert!(!storage.put_url(&key, &record).unwrap());
        assert_eq!(storage.count().unwrap(), 1);
    }

    #[test]
    fn delete_where_removes_matching_records_only() {
        let (storage, _dir) = open_tmp(true);
        let keep = UrlRecord::seed(1, 0, "https://a.test/", "a.test");
        let gone = UrlRecord::child(2, 1, 1, 0, 1, "https://a.test/x", "a.test");
        storage.put_url(&CompositeKey::for_record(&keep), &keep).unwrap();
        storage.put_url(&CompositeKey::for_record(&gone), &gone).unwrap();

        let removed = storage.delete_where(|r| r.docid == 2).unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(storage.count().unwrap(), 1);
    }

    #[test]
    fn non_resumable_mode_skips_transactions_but_still_persists_in_process() {
        let (storage, _dir) = open_tmp(false);
        let record = UrlRecord::seed(1, 0, "https://a.test/", "a.test");
        let key = CompositeKey::for_record(&record);
        assert!(storage.put_url(&key, &record).unwrap());
        assert_eq!(storage.get_url(&key).unwrap().unwrap().docid, 1);
    }

    #[test]
    fn seed_count_defaults_to_zero_and_round_trips() {
        let (storage, _dir) = open_tmp(true);
        assert_eq!(storage.get_seed_count(42).unwrap(), 0);
        storage.put_seed_count(42, 7).unwrap();
        assert_eq!(storage.get_seed_count(42).unwrap(), 7);
        storage.delete_seed_count(42).unwrap();
        assert_eq!(storage.get_seed_count(42).unwrap(), 0);
    }
}
