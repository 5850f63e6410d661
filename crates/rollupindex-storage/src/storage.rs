//! The storage facade.
//!
//! `Storage` owns the durable backend and hands out read-only views plus
//! per-window writers. A `StorageWriter` is one overlay with the domain
//! stores, cursors, and checkpoint records layered on top; nothing it does
//! is visible to readers until `commit`.

use std::sync::Arc;

use rollupindex_merkle::Hash32;

use crate::codec::Record;
use crate::error::StoreError;
use crate::kv::{KvEntry, KvStore, PersistStore};
use crate::overlay::{OverlayStore, ReadOnlyStore};
use crate::schema::{self, CheckpointInfo};
use crate::stores::witness::WitnessLayer;
use crate::stores::{
    AddressManagerStore, InputChainStore, RelayerCursorStore, StateChainStore, TokenBridgeStore,
    WitnessStore,
};

// Cursor accessors shared by the writer and the read-only snapshot.

fn get_u64_cursor<K: KvStore>(store: &K, key: &[u8]) -> Result<u64, StoreError> {
    crate::stores::get_u64(store, key)
}

fn get_opt_u64_cursor<K: KvStore>(store: &K, key: &[u8]) -> Result<Option<u64>, StoreError> {
    match store.get(key)? {
        None => Ok(None),
        Some(_) => Ok(Some(crate::stores::get_u64(store, key)?)),
    }
}

fn get_hash_cursor<K: KvStore>(store: &K, key: &[u8]) -> Result<Option<Hash32>, StoreError> {
    match store.get(key)? {
        None => Ok(None),
        Some(raw) => {
            let bytes: [u8; 32] = raw.as_slice().try_into().map_err(|_| {
                StoreError::codec("hash cursor", format!("expected 32 bytes, got {}", raw.len()))
            })?;
            Ok(Some(Hash32(bytes)))
        }
    }
}

fn get_checkpoint<K: KvStore>(store: &K, key: &[u8]) -> Result<Option<CheckpointInfo>, StoreError> {
    match store.get(key)? {
        None => Ok(None),
        Some(raw) => Ok(Some(CheckpointInfo::from_bytes(&raw)?)),
    }
}

/// Owner of the durable backend.
pub struct Storage {
    backing: Arc<dyn PersistStore>,
}

impl Storage {
    pub fn new(backing: Arc<dyn PersistStore>) -> Self {
        Self { backing }
    }

    /// A fresh overlay writer for one sync window.
    pub fn writer(&self) -> StorageWriter {
        StorageWriter {
            overlay: OverlayStore::new(self.backing.clone()),
        }
    }

    /// Read-only view of committed state.
    pub fn reader(&self) -> ReadOnlyStore {
        ReadOnlyStore::new(self.backing.clone())
    }

    pub fn last_synced_l1_height(&self) -> Result<u64, StoreError> {
        get_u64_cursor(&self.reader(), schema::LAST_SYNCED_L1_HEIGHT_KEY)
    }

    pub fn last_synced_l2_height(&self) -> Result<u64, StoreError> {
        get_u64_cursor(&self.reader(), schema::LAST_SYNCED_L2_HEIGHT_KEY)
    }

    pub fn last_synced_l1_hash(&self) -> Result<Option<Hash32>, StoreError> {
        get_hash_cursor(&self.reader(), schema::LAST_SYNCED_L1_HASH_KEY)
    }

    pub fn db_version(&self) -> Result<u64, StoreError> {
        get_u64_cursor(&self.reader(), schema::DB_VERSION_KEY)
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.backing.flush()
    }
}

/// One sync window's write surface.
pub struct StorageWriter {
    overlay: OverlayStore,
}

impl StorageWriter {
    // ─── Domain stores ───────────────────────────────────────────────────

    pub fn input_chain(&mut self) -> InputChainStore<'_, OverlayStore> {
        InputChainStore::new(&mut self.overlay)
    }

    pub fn state_chain(&mut self) -> StateChainStore<'_, OverlayStore> {
        StateChainStore::new(&mut self.overlay)
    }

    pub fn witness(&mut self, layer: WitnessLayer) -> WitnessStore<'_, OverlayStore> {
        WitnessStore::new(&mut self.overlay, layer)
    }

    pub fn token_bridge(&mut self) -> TokenBridgeStore<'_, OverlayStore> {
        TokenBridgeStore::new(&mut self.overlay)
    }

    pub fn address_manager(&mut self) -> AddressManagerStore<'_, OverlayStore> {
        AddressManagerStore::new(&mut self.overlay)
    }

    pub fn relayer(&mut self) -> RelayerCursorStore<'_, OverlayStore> {
        RelayerCursorStore::new(&mut self.overlay)
    }

    // ─── Cursors ─────────────────────────────────────────────────────────

    pub fn last_synced_l1_height(&self) -> Result<u64, StoreError> {
        get_u64_cursor(&self.overlay, schema::LAST_SYNCED_L1_HEIGHT_KEY)
    }

    pub fn set_last_synced_l1_height(&mut self, height: u64) -> Result<(), StoreError> {
        crate::stores::put_u64(&mut self.overlay, schema::LAST_SYNCED_L1_HEIGHT_KEY, height)
    }

    pub fn last_synced_l1_timestamp(&self) -> Result<Option<u64>, StoreError> {
        get_opt_u64_cursor(&self.overlay, schema::LAST_SYNCED_L1_TIMESTAMP_KEY)
    }

    pub fn set_last_synced_l1_timestamp(&mut self, ts: u64) -> Result<(), StoreError> {
        crate::stores::put_u64(&mut self.overlay, schema::LAST_SYNCED_L1_TIMESTAMP_KEY, ts)
    }

    pub fn last_synced_l1_hash(&self) -> Result<Option<Hash32>, StoreError> {
        get_hash_cursor(&self.overlay, schema::LAST_SYNCED_L1_HASH_KEY)
    }

    pub fn set_last_synced_l1_hash(&mut self, hash: Hash32) -> Result<(), StoreError> {
        self.overlay
            .put(schema::LAST_SYNCED_L1_HASH_KEY.to_vec(), hash.0.to_vec())
    }

    pub fn last_synced_l2_height(&self) -> Result<u64, StoreError> {
        get_u64_cursor(&self.overlay, schema::LAST_SYNCED_L2_HEIGHT_KEY)
    }

    pub fn set_last_synced_l2_height(&mut self, height: u64) -> Result<(), StoreError> {
        crate::stores::put_u64(&mut self.overlay, schema::LAST_SYNCED_L2_HEIGHT_KEY, height)
    }

    /// Version counter bumped on every rollback, so long-lived readers can
    /// notice their view went stale.
    pub fn db_version(&self) -> Result<u64, StoreError> {
        get_u64_cursor(&self.overlay, schema::DB_VERSION_KEY)
    }

    pub fn set_db_version(&mut self, version: u64) -> Result<(), StoreError> {
        crate::stores::put_u64(&mut self.overlay, schema::DB_VERSION_KEY, version)
    }

    // ─── Checkpoints ─────────────────────────────────────────────────────

    pub fn pending_checkpoint(&self) -> Result<Option<CheckpointInfo>, StoreError> {
        get_checkpoint(&self.overlay, schema::PENDING_CHECKPOINT_KEY)
    }

    pub fn set_pending_checkpoint(&mut self, cp: &CheckpointInfo) -> Result<(), StoreError> {
        self.overlay
            .put(schema::PENDING_CHECKPOINT_KEY.to_vec(), cp.to_bytes())
    }

    pub fn highest_checkpoint(&self) -> Result<Option<CheckpointInfo>, StoreError> {
        get_checkpoint(&self.overlay, schema::HIGHEST_CHECKPOINT_KEY)
    }

    pub fn set_highest_checkpoint(&mut self, cp: &CheckpointInfo) -> Result<(), StoreError> {
        self.overlay
            .put(schema::HIGHEST_CHECKPOINT_KEY.to_vec(), cp.to_bytes())
    }

    // ─── Overlay plumbing ────────────────────────────────────────────────

    /// Restore a checkpointed pre-image. An empty value means the key did
    /// not exist before the span and is deleted.
    pub fn cover(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StoreError> {
        if value.is_empty() {
            self.overlay.delete(key)
        } else {
            self.overlay.put(key, value)
        }
    }

    /// Pre-images of the window's writes so far, for checkpoint capture.
    /// Call before `commit`.
    pub fn dirty(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        self.overlay.dirty()
    }

    pub fn prefix_iter<'a>(&'a self, prefix: &[u8]) -> Box<dyn Iterator<Item = KvEntry> + 'a> {
        self.overlay.prefix_iter(prefix)
    }

    pub fn commit(&mut self) -> Result<(), StoreError> {
        self.overlay.commit()
    }

    pub fn reset(&mut self) {
        self.overlay.reset()
    }
}

impl KvStore for StorageWriter {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.overlay.get(key)
    }

    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StoreError> {
        self.overlay.put(key, value)
    }

    fn delete(&mut self, key: Vec<u8>) -> Result<(), StoreError> {
        self.overlay.delete(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventProvenance, TransactionEnqueuedEvent};
    use crate::mem::MemStore;
    use crate::schema::Address;

    fn storage() -> Storage {
        Storage::new(Arc::new(MemStore::new()))
    }

    #[test]
    fn writer_is_invisible_until_commit() {
        let storage = storage();
        let mut writer = storage.writer();
        writer.set_last_synced_l1_height(42).unwrap();
        assert_eq!(storage.last_synced_l1_height().unwrap(), 0);
        writer.commit().unwrap();
        assert_eq!(storage.last_synced_l1_height().unwrap(), 42);
    }

    #[test]
    fn cursors_roundtrip() {
        let storage = storage();
        let mut writer = storage.writer();
        assert_eq!(writer.last_synced_l1_timestamp().unwrap(), None);
        assert_eq!(writer.last_synced_l1_hash().unwrap(), None);

        writer.set_last_synced_l1_timestamp(1_700_000_000).unwrap();
        writer.set_last_synced_l1_hash(Hash32([5; 32])).unwrap();
        writer.set_last_synced_l2_height(9).unwrap();
        writer.set_db_version(3).unwrap();
        writer.commit().unwrap();

        assert_eq!(storage.last_synced_l1_hash().unwrap(), Some(Hash32([5; 32])));
        assert_eq!(storage.last_synced_l2_height().unwrap(), 9);
        assert_eq!(storage.db_version().unwrap(), 3);
    }

    #[test]
    fn checkpoints_roundtrip() {
        let storage = storage();
        let mut writer = storage.writer();
        assert!(writer.pending_checkpoint().unwrap().is_none());

        let cp = CheckpointInfo {
            start: 1,
            end: 33,
            dirty: vec![(vec![1], vec![2])],
        };
        writer.set_pending_checkpoint(&cp).unwrap();
        writer.set_highest_checkpoint(&cp).unwrap();
        writer.commit().unwrap();

        let writer = storage.writer();
        assert_eq!(writer.pending_checkpoint().unwrap(), Some(cp.clone()));
        assert_eq!(writer.highest_checkpoint().unwrap(), Some(cp));
    }

    #[test]
    fn cover_restores_and_deletes() {
        let storage = storage();
        let mut writer = storage.writer();
        writer.put(b"a".to_vec(), b"new".to_vec()).unwrap();
        writer.put(b"b".to_vec(), b"kept".to_vec()).unwrap();
        writer.commit().unwrap();

        let mut writer = storage.writer();
        writer.cover(b"a".to_vec(), b"old".to_vec()).unwrap();
        writer.cover(b"b".to_vec(), Vec::new()).unwrap();
        writer.commit().unwrap();

        let reader = storage.reader();
        assert_eq!(reader.get(b"a").unwrap(), Some(b"old".to_vec()));
        assert_eq!(reader.get(b"b").unwrap(), None);
    }

    #[test]
    fn domain_stores_share_one_overlay() {
        let storage = storage();
        let mut writer = storage.writer();
        writer
            .input_chain()
            .store_enqueued_transactions(&[TransactionEnqueuedEvent {
                queue_index: 0,
                from: Address([1; 20]),
                to: Address([2; 20]),
                rlp_tx: vec![1],
                timestamp: 1,
                raw: EventProvenance::default(),
            }])
            .unwrap();
        // The write is in this writer's overlay, part of the same delta.
        assert!(!writer.dirty().unwrap().is_empty());
        writer.commit().unwrap();

        let mut writer = storage.writer();
        assert_eq!(writer.input_chain().info().unwrap().queue_size, 1);
    }
}
