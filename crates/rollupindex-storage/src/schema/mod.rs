//! Keyspace layout and content hashing.
//!
//! Every record key is a one-byte tag followed by a fixed-width
//! discriminator (8-byte big-endian index, 32-byte hash, or the keccak of a
//! name), so per-family prefix scans and numeric key ordering fall out of
//! the byte order. Cursor records live under single-byte keys.

pub mod records;

pub use records::{
    AppendedBatch, CheckpointInfo, CrossLayerSentMessage, EnqueuedTransaction, InputChainInfo,
    StateBatchInfo, StateChainInfo, TokenBridgeEvent,
};

use std::fmt;

use rollupindex_merkle::{keccak256, Hash32};

use crate::error::StoreError;

// ─── Indexed-record key tags ─────────────────────────────────────────────

pub const STATE_BATCH_PREFIX: u8 = 0x00;
pub const INPUT_BATCH_PREFIX: u8 = 0x01;
pub const ENQUEUED_TX_PREFIX: u8 = 0x02;
pub const INPUT_BATCH_DATA_PREFIX: u8 = 0x03;

pub const L1_DEPOSIT_PREFIX: u8 = 0x04;
pub const L1_WITHDRAWAL_PREFIX: u8 = 0x05;
pub const L2_WITHDRAWAL_PREFIX: u8 = 0x08;
pub const L2_DEPOSIT_FINALIZED_PREFIX: u8 = 0x09;
pub const L2_DEPOSIT_FAILED_PREFIX: u8 = 0x0A;

pub const L1_SENT_MESSAGE_PREFIX: u8 = 0x0C;
pub const L2_SENT_MESSAGE_PREFIX: u8 = 0x0D;

pub const ADDRESS_NAME_PREFIX: u8 = 0x20;

// ─── Cursor keys ─────────────────────────────────────────────────────────

pub const LAST_SYNCED_L1_HEIGHT_KEY: &[u8] = &[0x10];
pub const LAST_SYNCED_L1_TIMESTAMP_KEY: &[u8] = &[0x11];
pub const INPUT_CHAIN_INFO_KEY: &[u8] = &[0x12];
pub const STATE_CHAIN_INFO_KEY: &[u8] = &[0x14];
pub const ADDRESS_MANAGER_HEIGHT_KEY: &[u8] = &[0x15];
pub const L1_COMPACT_TREE_KEY: &[u8] = &[0x16];
pub const L2_COMPACT_TREE_KEY: &[u8] = &[0x17];
pub const LAST_SYNCED_L2_HEIGHT_KEY: &[u8] = &[0x18];
pub const LAST_SYNCED_L1_HASH_KEY: &[u8] = &[0x19];
pub const HIGHEST_CHECKPOINT_KEY: &[u8] = &[0x1A];
pub const PENDING_CHECKPOINT_KEY: &[u8] = &[0x1B];
pub const DB_VERSION_KEY: &[u8] = &[0x1C];
pub const L1_TOTAL_MESSAGES_KEY: &[u8] = &[0x1D];
pub const L2_TOTAL_MESSAGES_KEY: &[u8] = &[0x1E];

pub const L1_RELAYER_PENDING_INDEX_KEY: &[u8] = &[0x30];
pub const L2_RELAYER_PENDING_INDEX_KEY: &[u8] = &[0x31];

// ─── Key builders ────────────────────────────────────────────────────────

/// `{tag}{8-byte BE index}`.
pub fn indexed_key(prefix: u8, index: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(prefix);
    key.extend_from_slice(&index.to_be_bytes());
    key
}

/// `{tag}{32-byte hash}`. Keyed by originating transaction hash so a
/// replayed block after a reorg lands on the same key.
pub fn hash_key(prefix: u8, hash: &Hash32) -> Vec<u8> {
    let mut key = Vec::with_capacity(33);
    key.push(prefix);
    key.extend_from_slice(&hash.0);
    key
}

/// `{tag}{keccak256(name)}` for the address book.
pub fn name_key(name: &str) -> Vec<u8> {
    hash_key(ADDRESS_NAME_PREFIX, &keccak256(name.as_bytes()))
}

// ─── Address ─────────────────────────────────────────────────────────────

/// A 20-byte account address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    /// Parse from hex, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, StoreError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let raw = hex::decode(s)
            .map_err(|e| StoreError::codec("address", e.to_string()))?;
        if raw.len() != 20 {
            return Err(StoreError::codec(
                "address",
                format!("expected 20 bytes, got {}", raw.len()),
            ));
        }
        let mut out = [0u8; 20];
        out.copy_from_slice(&raw);
        Ok(Address(out))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl From<[u8; 20]> for Address {
    fn from(raw: [u8; 20]) -> Self {
        Address(raw)
    }
}

// ─── Content hashing ─────────────────────────────────────────────────────

/// The canonical cross-layer message hash: the accumulator leaf and the
/// identity proven to the counterpart chain.
///
/// Layout: `target ‖ sender ‖ 24 zero bytes ‖ index as u64 BE ‖ message`,
/// which left-pads the index to a 32-byte word.
pub fn message_hash(target: &Address, sender: &Address, message_index: u64, message: &[u8]) -> Hash32 {
    let mut buf = Vec::with_capacity(20 + 20 + 32 + message.len());
    buf.extend_from_slice(&target.0);
    buf.extend_from_slice(&sender.0);
    buf.extend_from_slice(&[0u8; 24]);
    buf.extend_from_slice(&message_index.to_be_bytes());
    buf.extend_from_slice(message);
    keccak256(&buf)
}

/// Commitment over a run of enqueued transactions, matched against the
/// batch header when the sequencer consumes the queue.
///
/// `keccak256` of the concatenation of `keccak256(rlp_tx) ‖ timestamp BE`
/// per transaction.
pub fn queue_hash(queue: &[EnqueuedTransaction]) -> Hash32 {
    let mut buf = Vec::with_capacity(queue.len() * 40);
    for tx in queue {
        buf.extend_from_slice(&keccak256(&tx.rlp_tx).0);
        buf.extend_from_slice(&tx.timestamp.to_be_bytes());
    }
    keccak256(&buf)
}
