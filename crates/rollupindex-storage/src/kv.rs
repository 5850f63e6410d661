//! Key-value abstractions.
//!
//! `PersistStore` is the durable collaborator boundary (sled in production,
//! `MemStore` in tests); `KvStore` is the narrower face the domain stores
//! write through, implemented by the overlay and its read-only guard.

use crate::error::StoreError;

/// A sorted key/value iterator item.
pub type KvEntry = Result<(Vec<u8>, Vec<u8>), StoreError>;

/// One atomic set of puts and deletes, applied in insertion order.
#[derive(Debug, Default)]
pub struct WriteBatch {
    ops: Vec<(Vec<u8>, Option<Vec<u8>>)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push((key, Some(value)));
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.push((key, None));
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Vec<u8>, Option<Vec<u8>>)> {
        self.ops.iter()
    }
}

/// The durable key-value engine.
///
/// Absence is a distinguished `Ok(None)`, not an error; `write_batch` is
/// assumed atomic by the backing engine.
pub trait PersistStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    fn delete(&self, key: &[u8]) -> Result<(), StoreError>;

    /// Apply `batch` atomically: either every op lands or none do.
    fn write_batch(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// Sorted iteration over all keys starting with `prefix`.
    fn prefix_iter<'a>(&'a self, prefix: &[u8]) -> Box<dyn Iterator<Item = KvEntry> + 'a>;

    /// Flush buffered writes to durable media.
    fn flush(&self) -> Result<(), StoreError>;
}

/// The face domain stores read and write through.
///
/// Writes are fallible so the read-only snapshot can reject them with a
/// typed error instead of panicking.
pub trait KvStore {
    /// Tri-state read: found / `Ok(None)` / genuine error.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StoreError>;

    fn delete(&mut self, key: Vec<u8>) -> Result<(), StoreError>;
}
