//! Durable record types and their binary layouts.

use rollupindex_merkle::Hash32;

use crate::codec::{Record, Sink, Source};
use crate::error::StoreError;
use crate::schema::Address;

/// A transaction pushed into the enqueue lane, waiting to be sequenced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnqueuedTransaction {
    pub queue_index: u64,
    pub from: Address,
    pub to: Address,
    pub rlp_tx: Vec<u8>,
    pub timestamp: u64,
}

impl Record for EnqueuedTransaction {
    fn encode(&self, sink: &mut Sink) {
        sink.write_u64(self.queue_index)
            .write_address(&self.from)
            .write_address(&self.to)
            .write_var_bytes(&self.rlp_tx)
            .write_u64(self.timestamp);
    }

    fn decode(source: &mut Source<'_>) -> Result<Self, StoreError> {
        Ok(Self {
            queue_index: source.read_u64("queue_index")?,
            from: source.read_address("from")?,
            to: source.read_address("to")?,
            rlp_tx: source.read_var_bytes("rlp_tx")?,
            timestamp: source.read_u64("timestamp")?,
        })
    }
}

/// Header of one sequenced input batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendedBatch {
    pub proposer: Address,
    pub index: u64,
    pub start_queue_index: u64,
    pub queue_num: u64,
    pub input_hash: Hash32,
}

impl Record for AppendedBatch {
    fn encode(&self, sink: &mut Sink) {
        sink.write_address(&self.proposer)
            .write_u64(self.index)
            .write_u64(self.start_queue_index)
            .write_u64(self.queue_num)
            .write_hash(&self.input_hash);
    }

    fn decode(source: &mut Source<'_>) -> Result<Self, StoreError> {
        Ok(Self {
            proposer: source.read_address("proposer")?,
            index: source.read_u64("index")?,
            start_queue_index: source.read_u64("start_queue_index")?,
            queue_num: source.read_u64("queue_num")?,
            input_hash: source.read_hash("input_hash")?,
        })
    }
}

/// One committed state-root batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateBatchInfo {
    pub index: u64,
    pub proposer: Address,
    pub timestamp: u64,
    pub block_hash: Hash32,
}

impl Record for StateBatchInfo {
    fn encode(&self, sink: &mut Sink) {
        sink.write_u64(self.index)
            .write_address(&self.proposer)
            .write_u64(self.timestamp)
            .write_hash(&self.block_hash);
    }

    fn decode(source: &mut Source<'_>) -> Result<Self, StoreError> {
        Ok(Self {
            index: source.read_u64("index")?,
            proposer: source.read_address("proposer")?,
            timestamp: source.read_u64("timestamp")?,
            block_hash: source.read_hash("block_hash")?,
        })
    }
}

/// Input-chain cursor: how much of the queue and batch lanes is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputChainInfo {
    pub pending_queue_index: u64,
    pub total_batches: u64,
    pub queue_size: u64,
}

impl Record for InputChainInfo {
    fn encode(&self, sink: &mut Sink) {
        sink.write_u64(self.pending_queue_index)
            .write_u64(self.total_batches)
            .write_u64(self.queue_size);
    }

    fn decode(source: &mut Source<'_>) -> Result<Self, StoreError> {
        Ok(Self {
            pending_queue_index: source.read_u64("pending_queue_index")?,
            total_batches: source.read_u64("total_batches")?,
            queue_size: source.read_u64("queue_size")?,
        })
    }
}

/// State-chain cursor: size plus the provenance of the newest entry, used
/// to reject stale or replayed events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateChainInfo {
    pub total_size: u64,
    pub last_event_block: u64,
    pub last_event_index: u64,
}

impl Record for StateChainInfo {
    fn encode(&self, sink: &mut Sink) {
        sink.write_u64(self.total_size)
            .write_u64(self.last_event_block)
            .write_u64(self.last_event_index);
    }

    fn decode(source: &mut Source<'_>) -> Result<Self, StoreError> {
        Ok(Self {
            total_size: source.read_u64("total_size")?,
            last_event_block: source.read_u64("last_event_block")?,
            last_event_index: source.read_u64("last_event_index")?,
        })
    }
}

/// A cross-layer message as witnessed on its source chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossLayerSentMessage {
    pub block_number: u64,
    pub message_index: u64,
    pub target: Address,
    pub sender: Address,
    pub mmr_root: Hash32,
    pub message: Vec<u8>,
}

impl Record for CrossLayerSentMessage {
    fn encode(&self, sink: &mut Sink) {
        sink.write_u64(self.block_number)
            .write_u64(self.message_index)
            .write_address(&self.target)
            .write_address(&self.sender)
            .write_hash(&self.mmr_root)
            .write_var_bytes(&self.message);
    }

    fn decode(source: &mut Source<'_>) -> Result<Self, StoreError> {
        Ok(Self {
            block_number: source.read_u64("block_number")?,
            message_index: source.read_u64("message_index")?,
            target: source.read_address("target")?,
            sender: source.read_address("sender")?,
            mmr_root: source.read_hash("mmr_root")?,
            message: source.read_var_bytes("message")?,
        })
    }
}

/// A token transfer crossing the bridge, in either direction. `amount` is a
/// 256-bit big-endian word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBridgeEvent {
    pub l1_token: Address,
    pub l2_token: Address,
    pub from: Address,
    pub to: Address,
    pub amount: [u8; 32],
    pub data: Vec<u8>,
}

impl Record for TokenBridgeEvent {
    fn encode(&self, sink: &mut Sink) {
        sink.write_address(&self.l1_token)
            .write_address(&self.l2_token)
            .write_address(&self.from)
            .write_address(&self.to)
            .write_raw(&self.amount)
            .write_var_bytes(&self.data);
    }

    fn decode(source: &mut Source<'_>) -> Result<Self, StoreError> {
        let l1_token = source.read_address("l1_token")?;
        let l2_token = source.read_address("l2_token")?;
        let from = source.read_address("from")?;
        let to = source.read_address("to")?;
        let mut amount = [0u8; 32];
        amount.copy_from_slice(source.read_bytes(32, "amount")?);
        Ok(Self {
            l1_token,
            l2_token,
            from,
            to,
            amount,
            data: source.read_var_bytes("data")?,
        })
    }
}

/// One rollback unit: the block range `[start, end)` it covers and the
/// pre-images of every key the range dirtied.
///
/// An empty value in `dirty` means the key did not exist before the range
/// and rollback deletes it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CheckpointInfo {
    pub start: u64,
    pub end: u64,
    pub dirty: Vec<(Vec<u8>, Vec<u8>)>,
}

/// Spans this long graduate from pending to the rollback target.
pub const CHECKPOINT_PROMOTION_SPAN: u64 = 32;

impl CheckpointInfo {
    /// Whether the span is old enough to become the rollback target.
    pub fn promotable(&self) -> bool {
        self.end >= self.start + CHECKPOINT_PROMOTION_SPAN
    }
}

impl Record for CheckpointInfo {
    fn encode(&self, sink: &mut Sink) {
        sink.write_u64(self.start)
            .write_u64(self.end)
            .write_u32(self.dirty.len() as u32);
        for (key, value) in &self.dirty {
            sink.write_var_bytes(key).write_var_bytes(value);
        }
    }

    fn decode(source: &mut Source<'_>) -> Result<Self, StoreError> {
        let start = source.read_u64("checkpoint_start")?;
        let end = source.read_u64("checkpoint_end")?;
        let count = source.read_u32("dirty_count")? as usize;
        let mut dirty = Vec::with_capacity(count.min(1 << 16));
        for _ in 0..count {
            let key = source.read_var_bytes("dirty_key")?;
            let value = source.read_var_bytes("dirty_value")?;
            dirty.push((key, value));
        }
        Ok(Self { start, end, dirty })
    }
}

// ─── Compact accumulator form ────────────────────────────────────────────

/// `tree_size ‖ peaks`, largest peak first.
pub fn serialize_compact_tree(tree_size: u64, peaks: &[Hash32]) -> Vec<u8> {
    let mut sink = Sink::with_capacity(8 + peaks.len() * 32);
    sink.write_u64(tree_size);
    for peak in peaks {
        sink.write_hash(peak);
    }
    sink.into_bytes()
}

pub fn deserialize_compact_tree(data: &[u8]) -> Result<(u64, Vec<Hash32>), StoreError> {
    let mut source = Source::new(data);
    let tree_size = source.read_u64("tree_size")?;
    if source.remaining() % 32 != 0 {
        return Err(StoreError::codec(
            "compact_tree",
            format!("trailing {} bytes after peaks", source.remaining() % 32),
        ));
    }
    let mut peaks = Vec::with_capacity(source.remaining() / 32);
    while !source.is_empty() {
        peaks.push(source.read_hash("peak")?);
    }
    Ok((tree_size, peaks))
}
