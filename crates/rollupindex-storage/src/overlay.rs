//! The overlay write-set: a transactional layer over the durable store.
//!
//! All writes issued while syncing one window land in the in-memory
//! write-set. They shadow reads, merge into prefix iteration, and become
//! durable only through a single atomic batch in `commit`; until then the
//! backing store never observes them.

use std::collections::BTreeMap;
use std::iter::Peekable;
use std::sync::Arc;

use crate::error::StoreError;
use crate::kv::{KvEntry, KvStore, PersistStore, WriteBatch};

/// In-memory write-set over a durable backing store.
///
/// A `None` value is a tombstone: the key reads as absent and commits as a
/// delete.
pub struct OverlayStore {
    backing: Arc<dyn PersistStore>,
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl OverlayStore {
    pub fn new(backing: Arc<dyn PersistStore>) -> Self {
        Self {
            backing,
            writes: BTreeMap::new(),
        }
    }

    /// Discard all uncommitted writes.
    pub fn reset(&mut self) {
        self.writes.clear();
    }

    /// Number of uncommitted write-set entries.
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    /// Pre-images of every key this write-set touches, in key order.
    ///
    /// Must be called before `commit`: the backing store still holds the
    /// values the keys had when the window began. A key with no prior
    /// value is recorded with an empty pre-image, which rollback turns
    /// back into a delete.
    pub fn dirty(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let mut out = Vec::with_capacity(self.writes.len());
        for key in self.writes.keys() {
            let prior = self.backing.get(key)?.unwrap_or_default();
            out.push((key.clone(), prior));
        }
        Ok(out)
    }

    /// Merge-sorted view over write-set and backing entries under `prefix`.
    ///
    /// Write-set entries shadow backing entries with equal key; tombstones
    /// suppress backing entries entirely.
    pub fn prefix_iter<'a>(&'a self, prefix: &[u8]) -> Box<dyn Iterator<Item = KvEntry> + 'a> {
        let overlay: Vec<_> = self
            .writes
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Box::new(MergeIter {
            overlay: overlay.into_iter().peekable(),
            backing: self.backing.prefix_iter(prefix).peekable(),
        })
    }

    /// Commit the write-set as one atomic batch, then clear it.
    ///
    /// On failure nothing was durably written, so the caller may safely
    /// retry the whole window.
    pub fn commit(&mut self) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        for (key, value) in &self.writes {
            match value {
                Some(v) => batch.put(key.clone(), v.clone()),
                None => batch.delete(key.clone()),
            }
        }
        let entries = batch.len();
        self.backing.write_batch(batch)?;
        self.writes.clear();
        tracing::debug!(entries, "overlay committed");
        Ok(())
    }
}

impl KvStore for OverlayStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(entry) = self.writes.get(key) {
            return Ok(entry.clone());
        }
        self.backing.get(key)
    }

    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StoreError> {
        self.writes.insert(key, Some(value));
        Ok(())
    }

    fn delete(&mut self, key: Vec<u8>) -> Result<(), StoreError> {
        self.writes.insert(key, None);
        Ok(())
    }
}

struct MergeIter<'a, O>
where
    O: Iterator<Item = (Vec<u8>, Option<Vec<u8>>)>,
{
    overlay: Peekable<O>,
    backing: Peekable<Box<dyn Iterator<Item = KvEntry> + 'a>>,
}

impl<O> Iterator for MergeIter<'_, O>
where
    O: Iterator<Item = (Vec<u8>, Option<Vec<u8>>)>,
{
    type Item = KvEntry;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let take_overlay = match (self.overlay.peek(), self.backing.peek()) {
                (None, None) => return None,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (Some(_), Some(Err(_))) => false,
                (Some((ok, _)), Some(Ok((bk, _)))) => {
                    if ok == bk {
                        // Shadowed: drop the backing entry.
                        self.backing.next();
                        true
                    } else {
                        ok < bk
                    }
                }
            };
            if take_overlay {
                match self.overlay.next() {
                    Some((key, Some(v))) => return Some(Ok((key, v))),
                    Some((_, None)) => continue, // tombstone
                    None => return None,
                }
            } else {
                return self.backing.next();
            }
        }
    }
}

/// Read-only view of the committed state.
///
/// Guards the canonical snapshot used to bootstrap accumulator state at
/// startup: reads behave exactly like the overlay's, writes are rejected
/// with [`StoreError::ReadOnly`].
pub struct ReadOnlyStore {
    backing: Arc<dyn PersistStore>,
}

impl ReadOnlyStore {
    pub fn new(backing: Arc<dyn PersistStore>) -> Self {
        Self { backing }
    }

    pub fn prefix_iter<'a>(&'a self, prefix: &[u8]) -> Box<dyn Iterator<Item = KvEntry> + 'a> {
        self.backing.prefix_iter(prefix)
    }
}

impl KvStore for ReadOnlyStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.backing.get(key)
    }

    fn put(&mut self, _key: Vec<u8>, _value: Vec<u8>) -> Result<(), StoreError> {
        Err(StoreError::ReadOnly)
    }

    fn delete(&mut self, _key: Vec<u8>) -> Result<(), StoreError> {
        Err(StoreError::ReadOnly)
    }
}
