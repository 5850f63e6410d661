//! Chain client traits.
//!
//! The engine never talks RPC directly; it asks a client for block headers
//! and for the decoded events of a height range. Tests drive the engine
//! with scripted in-memory clients.

use async_trait::async_trait;
use rollupindex_merkle::Hash32;
use rollupindex_storage::events::{
    AddressSetEvent, InputBatchAppendedEvent, MessageSentEvent, StateBatchAppendedEvent,
    TokenBridgeChainEvent, TransactionEnqueuedEvent,
};

use crate::error::SyncError;

/// Header fields the engine needs: identity and time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub number: u64,
    pub hash: Hash32,
    pub timestamp: u64,
}

/// Everything the base layer emitted over one height range, already
/// decoded and in emission order per family.
#[derive(Debug, Clone, Default)]
pub struct L1Events {
    pub address_updates: Vec<AddressSetEvent>,
    pub enqueued: Vec<TransactionEnqueuedEvent>,
    pub input_batches: Vec<InputBatchAppendedEvent>,
    pub state_batches: Vec<StateBatchAppendedEvent>,
    pub sent_messages: Vec<MessageSentEvent>,
    pub bridge_events: Vec<TokenBridgeChainEvent>,
}

/// Rollup-layer events over one height range.
#[derive(Debug, Clone, Default)]
pub struct L2Events {
    pub sent_messages: Vec<MessageSentEvent>,
    pub bridge_events: Vec<TokenBridgeChainEvent>,
}

#[async_trait]
pub trait L1Client: Send + Sync {
    /// Current head height.
    async fn block_number(&self) -> Result<u64, SyncError>;

    /// Header at `number`, or `None` past the head.
    async fn header_by_number(&self, number: u64) -> Result<Option<BlockHeader>, SyncError>;

    /// All indexed events in `[start, end]`.
    async fn events(&self, start: u64, end: u64) -> Result<L1Events, SyncError>;
}

#[async_trait]
pub trait L2Client: Send + Sync {
    /// Highest rollup block safe to index.
    async fn checked_block_number(&self) -> Result<u64, SyncError>;

    /// All indexed events in `[start, end]`.
    async fn events(&self, start: u64, end: u64) -> Result<L2Events, SyncError>;
}
