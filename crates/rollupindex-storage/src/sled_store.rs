//! Sled-backed durable store.
//!
//! One `sled::Db` holds every keyspace; partitioning between services is by
//! key prefix, not trees, so a single atomic batch can span all of them.

use std::path::Path;

use crate::error::StoreError;
use crate::kv::{KvEntry, PersistStore, WriteBatch};

/// Durable `PersistStore` over a sled database.
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path.as_ref())?;
        tracing::info!(path = %path.as_ref().display(), recovered = db.was_recovered(), "opened database");
        Ok(Self { db })
    }

    /// Open a throwaway database backed by a temporary file.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }
}

impl PersistStore for SledStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.db.get(key)?.map(|v| v.to_vec()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.db.insert(key, value)?;
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.db.remove(key)?;
        Ok(())
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut sled_batch = sled::Batch::default();
        for (key, value) in batch.iter() {
            match value {
                Some(v) => sled_batch.insert(key.as_slice(), v.as_slice()),
                None => sled_batch.remove(key.as_slice()),
            }
        }
        self.db.apply_batch(sled_batch)?;
        Ok(())
    }

    fn prefix_iter<'a>(&'a self, prefix: &[u8]) -> Box<dyn Iterator<Item = KvEntry> + 'a> {
        Box::new(self.db.scan_prefix(prefix).map(|item| {
            let (k, v) = item?;
            Ok((k.to_vec(), v.to_vec()))
        }))
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_and_absence() {
        let store = SledStore::temporary().unwrap();
        assert_eq!(store.get(b"missing").unwrap(), None);
        store.put(b"k", b"v").unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));
        store.delete(b"k").unwrap();
        assert_eq!(store.get(b"k").unwrap(), None);
    }

    #[test]
    fn batch_is_visible_after_apply() {
        let store = SledStore::temporary().unwrap();
        let mut batch = WriteBatch::new();
        batch.put(vec![1, 0], b"a".to_vec());
        batch.put(vec![1, 1], b"b".to_vec());
        store.write_batch(batch).unwrap();
        let got: Vec<_> = store.prefix_iter(&[1]).map(|e| e.unwrap()).collect();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].0, vec![1, 0]);
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SledStore::open(dir.path()).unwrap();
            store.put(b"height", b"42").unwrap();
            store.flush().unwrap();
        }
        let store = SledStore::open(dir.path()).unwrap();
        assert_eq!(store.get(b"height").unwrap(), Some(b"42".to_vec()));
    }
}
