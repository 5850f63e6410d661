//! Append-only, position-addressed hash persistence.
//!
//! Nodes are stored in the order the accumulator produces them: each leaf,
//! followed immediately by every internal node completed by that leaf. For a
//! forest over `n` leaves this is a post-order layout totalling
//! `2n - popcount(n)` slots, each a fixed 32 bytes at offset `pos × 32`.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::error::MerkleError;
use crate::hasher::Hash32;

/// Number of node slots occupied by a forest over `tree_size` leaves.
pub fn stored_node_count(tree_size: u64) -> u64 {
    2 * tree_size - tree_size.count_ones() as u64
}

/// Persistence for accumulator nodes.
///
/// Writes are append-only under normal operation; `rewind` exists solely so
/// a rollback can reposition the write cursor below an orphaned suffix, which
/// subsequent appends then overwrite.
pub trait HashStore {
    /// Append `hashes` at the current write cursor.
    fn append(&mut self, hashes: &[Hash32]) -> Result<(), MerkleError>;

    /// Read the node at 0-based position `pos`.
    ///
    /// A missing or short slot is an error, never a defaulted hash.
    fn hash_at(&self, pos: u64) -> Result<Hash32, MerkleError>;

    /// Move the write cursor to `node_count` slots from the start.
    fn rewind(&mut self, node_count: u64) -> Result<(), MerkleError>;

    /// Flush buffered writes to the backing medium.
    fn flush(&mut self) -> Result<(), MerkleError>;
}

// ─── MemHashStore ─────────────────────────────────────────────────────────────

/// In-memory hash store for tests and ephemeral trees.
#[derive(Default)]
pub struct MemHashStore {
    hashes: Vec<Hash32>,
}

impl MemHashStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> u64 {
        self.hashes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

impl HashStore for MemHashStore {
    fn append(&mut self, hashes: &[Hash32]) -> Result<(), MerkleError> {
        self.hashes.extend_from_slice(hashes);
        Ok(())
    }

    fn hash_at(&self, pos: u64) -> Result<Hash32, MerkleError> {
        self.hashes.get(pos as usize).copied().ok_or_else(|| {
            MerkleError::Truncated {
                have: self.hashes.len() as u64,
                want: pos + 1,
            }
        })
    }

    fn rewind(&mut self, node_count: u64) -> Result<(), MerkleError> {
        self.hashes.truncate(node_count as usize);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), MerkleError> {
        Ok(())
    }
}

// ─── FileHashStore ────────────────────────────────────────────────────────────

/// File-backed hash store: one 32-byte slot per node at offset `pos × 32`.
#[derive(Debug)]
pub struct FileHashStore {
    file: Mutex<File>,
    /// Write cursor in slots. Reads may address any slot below it.
    node_count: u64,
}

impl FileHashStore {
    /// Open (or create) the store and verify it is consistent with a tree of
    /// `tree_size` leaves: the file must already hold at least
    /// `stored_node_count(tree_size)` slots. The write cursor resumes there,
    /// so any orphaned suffix left by a rollback is overwritten on append.
    pub fn open(path: impl AsRef<Path>, tree_size: u64) -> Result<Self, MerkleError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let want = stored_node_count(tree_size);
        let have = file.metadata()?.len() / 32;
        if have < want {
            return Err(MerkleError::Truncated { have, want });
        }
        Ok(Self {
            file: Mutex::new(file),
            node_count: want,
        })
    }
}

impl HashStore for FileHashStore {
    fn append(&mut self, hashes: &[Hash32]) -> Result<(), MerkleError> {
        let mut buf = Vec::with_capacity(hashes.len() * 32);
        for h in hashes {
            buf.extend_from_slice(h.as_bytes());
        }
        let mut file = self.file.lock().expect("hash store lock poisoned");
        file.seek(SeekFrom::Start(self.node_count * 32))?;
        file.write_all(&buf)?;
        self.node_count += hashes.len() as u64;
        Ok(())
    }

    fn hash_at(&self, pos: u64) -> Result<Hash32, MerkleError> {
        let mut out = [0u8; 32];
        let mut file = self.file.lock().expect("hash store lock poisoned");
        file.seek(SeekFrom::Start(pos * 32))?;
        file.read_exact(&mut out)?;
        Ok(Hash32(out))
    }

    fn rewind(&mut self, node_count: u64) -> Result<(), MerkleError> {
        self.node_count = node_count;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), MerkleError> {
        let file = self.file.lock().expect("hash store lock poisoned");
        file.sync_data()?;
        Ok(())
    }
}
