//! Chain events as fetched from the layers' logs.
//!
//! These are the inputs to the domain stores: already decoded, still
//! carrying their on-chain provenance so stores can order and de-duplicate
//! them.

use rollupindex_merkle::Hash32;

use crate::schema::Address;

/// Where an event was emitted: enough to order events within a window and
/// key reorg-safe records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventProvenance {
    pub block_number: u64,
    pub tx_hash: Hash32,
    pub log_index: u64,
}

/// A name in the on-chain address book was set or replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressSetEvent {
    pub name: String,
    pub new_address: Address,
    pub raw: EventProvenance,
}

/// A transaction entered the enqueue lane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionEnqueuedEvent {
    pub queue_index: u64,
    pub from: Address,
    pub to: Address,
    pub rlp_tx: Vec<u8>,
    pub timestamp: u64,
    pub raw: EventProvenance,
}

/// The sequencer appended an input batch consuming part of the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBatchAppendedEvent {
    pub proposer: Address,
    pub index: u64,
    pub start_queue_index: u64,
    pub queue_num: u64,
    pub input_hash: Hash32,
    /// Raw batch calldata, stored alongside the header.
    pub batch_data: Vec<u8>,
    pub raw: EventProvenance,
}

/// A proposer committed a run of state roots starting at `start_index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateBatchAppendedEvent {
    pub start_index: u64,
    pub proposer: Address,
    pub timestamp: u64,
    pub block_hashes: Vec<Hash32>,
    pub raw: EventProvenance,
}

/// A cross-layer message was sent, to be folded into the witness
/// accumulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSentEvent {
    pub message_index: u64,
    pub target: Address,
    pub sender: Address,
    pub mmr_root: Hash32,
    pub message: Vec<u8>,
    pub raw: EventProvenance,
}

/// Which bridge lane a token event belongs to. Deposits initiate on the
/// base layer; withdrawals initiate on the rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeEventKind {
    DepositInitiated,
    WithdrawalFinalized,
    WithdrawalInitiated,
    DepositFinalized,
    DepositFailed,
}

/// A token transfer crossing the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBridgeChainEvent {
    pub kind: BridgeEventKind,
    pub l1_token: Address,
    pub l2_token: Address,
    pub from: Address,
    pub to: Address,
    pub amount: [u8; 32],
    pub data: Vec<u8>,
    pub raw: EventProvenance,
}
