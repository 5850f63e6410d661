//! State-chain store: committed state roots, one record per root.
//!
//! Event ordering is enforced by provenance, not index alone: a state
//! event must come from a strictly later (block, log index) position than
//! the last one recorded, which filters replays after shallow reorgs.

use crate::error::StoreError;
use crate::events::StateBatchAppendedEvent;
use crate::kv::KvStore;
use crate::schema::{self, StateBatchInfo, StateChainInfo, STATE_BATCH_PREFIX};
use crate::stores::{get_record, put_record};

pub struct StateChainStore<'a, K: KvStore> {
    store: &'a mut K,
}

impl<'a, K: KvStore> StateChainStore<'a, K> {
    pub fn new(store: &'a mut K) -> Self {
        Self { store }
    }

    pub fn info(&self) -> Result<StateChainInfo, StoreError> {
        Ok(get_record(self.store, schema::STATE_CHAIN_INFO_KEY)?.unwrap_or_default())
    }

    fn put_info(&mut self, info: &StateChainInfo) -> Result<(), StoreError> {
        put_record(self.store, schema::STATE_CHAIN_INFO_KEY.to_vec(), info)
    }

    /// Record state-root runs in emission order.
    ///
    /// A run starting past `total_size` is a gap (a mid-run block vanished
    /// in a reorg); a run starting below it overwrites, which is the replay
    /// path after rollback.
    pub fn store_batches(&mut self, events: &[StateBatchAppendedEvent]) -> Result<(), StoreError> {
        let mut info = self.info()?;
        for ev in events {
            let newer = info.last_event_block < ev.raw.block_number
                || (info.last_event_block == ev.raw.block_number
                    && info.last_event_index < ev.raw.log_index);
            if !newer && info.total_size > 0 {
                return Err(StoreError::Inconsistent(format!(
                    "stale state event at block {} log {}, last seen block {} log {}",
                    ev.raw.block_number,
                    ev.raw.log_index,
                    info.last_event_block,
                    info.last_event_index
                )));
            }
            if info.total_size < ev.start_index {
                return Err(StoreError::Inconsistent(format!(
                    "state gap: chain has {} roots, run starts at {}",
                    info.total_size, ev.start_index
                )));
            }
            for (i, block_hash) in ev.block_hashes.iter().enumerate() {
                let index = ev.start_index + i as u64;
                put_record(
                    self.store,
                    schema::indexed_key(STATE_BATCH_PREFIX, index),
                    &StateBatchInfo {
                        index,
                        proposer: ev.proposer,
                        timestamp: ev.timestamp,
                        block_hash: *block_hash,
                    },
                )?;
            }
            info.total_size = ev.start_index + ev.block_hashes.len() as u64;
            info.last_event_block = ev.raw.block_number;
            info.last_event_index = ev.raw.log_index;
        }
        self.put_info(&info)
    }

    pub fn state(&self, index: u64) -> Result<Option<StateBatchInfo>, StoreError> {
        get_record(self.store, &schema::indexed_key(STATE_BATCH_PREFIX, index))
    }
}
