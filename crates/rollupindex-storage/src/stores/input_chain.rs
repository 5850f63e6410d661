//! Input-chain store: the enqueue lane and the sequenced batch lane.
//!
//! Both lanes are append-only and cursor-guarded. A replayed event with an
//! index below the cursor is tolerated only if it is byte-identical to what
//! is already recorded; any divergence means the upstream chain reorganized
//! under us and the window must abort so rollback can run.

use crate::error::StoreError;
use crate::events::{InputBatchAppendedEvent, TransactionEnqueuedEvent};
use crate::kv::KvStore;
use crate::schema::{
    self, AppendedBatch, EnqueuedTransaction, InputChainInfo, ENQUEUED_TX_PREFIX,
    INPUT_BATCH_DATA_PREFIX, INPUT_BATCH_PREFIX,
};
use crate::stores::{get_record, put_record};

pub struct InputChainStore<'a, K: KvStore> {
    store: &'a mut K,
}

impl<'a, K: KvStore> InputChainStore<'a, K> {
    pub fn new(store: &'a mut K) -> Self {
        Self { store }
    }

    /// Current cursor, zeroed when the store is empty.
    pub fn info(&self) -> Result<InputChainInfo, StoreError> {
        Ok(get_record(self.store, schema::INPUT_CHAIN_INFO_KEY)?.unwrap_or_default())
    }

    fn put_info(&mut self, info: &InputChainInfo) -> Result<(), StoreError> {
        put_record(self.store, schema::INPUT_CHAIN_INFO_KEY.to_vec(), info)
    }

    /// Record enqueued transactions in queue order.
    ///
    /// `queue_index` must equal the current queue size; an index above it is
    /// a gap, an index below it must match the recorded transaction exactly.
    pub fn store_enqueued_transactions(
        &mut self,
        events: &[TransactionEnqueuedEvent],
    ) -> Result<(), StoreError> {
        let mut info = self.info()?;
        for ev in events {
            if ev.queue_index > info.queue_size {
                return Err(StoreError::Inconsistent(format!(
                    "enqueue gap: expected queue index {}, got {}",
                    info.queue_size, ev.queue_index
                )));
            }
            let record = EnqueuedTransaction {
                queue_index: ev.queue_index,
                from: ev.from,
                to: ev.to,
                rlp_tx: ev.rlp_tx.clone(),
                timestamp: ev.timestamp,
            };
            if ev.queue_index < info.queue_size {
                // Replay of an already-recorded index.
                let old = self.enqueued_transaction(ev.queue_index)?.ok_or_else(|| {
                    StoreError::Inconsistent(format!(
                        "queue index {} below cursor but not recorded",
                        ev.queue_index
                    ))
                })?;
                if old == record {
                    continue;
                }
                return Err(StoreError::Inconsistent(format!(
                    "enqueued transaction {} diverged from recorded copy",
                    ev.queue_index
                )));
            }
            put_record(
                self.store,
                schema::indexed_key(ENQUEUED_TX_PREFIX, ev.queue_index),
                &record,
            )?;
            info.queue_size += 1;
        }
        self.put_info(&info)
    }

    pub fn enqueued_transaction(
        &self,
        queue_index: u64,
    ) -> Result<Option<EnqueuedTransaction>, StoreError> {
        get_record(self.store, &schema::indexed_key(ENQUEUED_TX_PREFIX, queue_index))
    }

    /// The `num` transactions starting at `start`. All of them must exist:
    /// callers only ask for runs the cursor already covers.
    pub fn enqueued_range(
        &self,
        start: u64,
        num: u64,
    ) -> Result<Vec<EnqueuedTransaction>, StoreError> {
        let mut out = Vec::with_capacity(num as usize);
        for i in 0..num {
            let tx = self.enqueued_transaction(start + i)?.ok_or_else(|| {
                StoreError::Inconsistent(format!("enqueued transaction {} missing", start + i))
            })?;
            out.push(tx);
        }
        Ok(out)
    }

    /// Record sequenced batches in batch order.
    ///
    /// Each batch must extend the batch lane contiguously and consume the
    /// queue exactly from the pending cursor, without reaching past the
    /// locally known queue size.
    pub fn store_batches(&mut self, events: &[InputBatchAppendedEvent]) -> Result<(), StoreError> {
        let mut info = self.info()?;
        for ev in events {
            if ev.index > info.total_batches {
                return Err(StoreError::Inconsistent(format!(
                    "batch gap: expected index {}, got {}",
                    info.total_batches, ev.index
                )));
            }
            if ev.start_queue_index > info.pending_queue_index {
                return Err(StoreError::Inconsistent(format!(
                    "batch {} starts at queue {} past pending cursor {}",
                    ev.index, ev.start_queue_index, info.pending_queue_index
                )));
            }
            if ev.start_queue_index + ev.queue_num > info.queue_size {
                return Err(StoreError::Inconsistent(format!(
                    "batch {} consumes queue up to {} but only {} recorded",
                    ev.index,
                    ev.start_queue_index + ev.queue_num,
                    info.queue_size
                )));
            }
            if ev.index == info.total_batches && ev.start_queue_index != info.pending_queue_index {
                return Err(StoreError::Inconsistent(format!(
                    "batch {} starts at queue {}, pending cursor is {}",
                    ev.index, ev.start_queue_index, info.pending_queue_index
                )));
            }
            let record = AppendedBatch {
                proposer: ev.proposer,
                index: ev.index,
                start_queue_index: ev.start_queue_index,
                queue_num: ev.queue_num,
                input_hash: ev.input_hash,
            };
            if ev.index < info.total_batches {
                let old = self.batch(ev.index)?.ok_or_else(|| {
                    StoreError::Inconsistent(format!(
                        "batch {} below cursor but not recorded",
                        ev.index
                    ))
                })?;
                if old == record {
                    continue;
                }
                return Err(StoreError::Inconsistent(format!(
                    "input batch {} diverged from recorded copy",
                    ev.index
                )));
            }
            put_record(
                self.store,
                schema::indexed_key(INPUT_BATCH_PREFIX, ev.index),
                &record,
            )?;
            self.store.put(
                schema::indexed_key(INPUT_BATCH_DATA_PREFIX, ev.index),
                ev.batch_data.clone(),
            )?;
            info.total_batches = ev.index + 1;
            info.pending_queue_index += ev.queue_num;
        }
        self.put_info(&info)
    }

    pub fn batch(&self, index: u64) -> Result<Option<AppendedBatch>, StoreError> {
        get_record(self.store, &schema::indexed_key(INPUT_BATCH_PREFIX, index))
    }

    /// Raw calldata of a sequenced batch.
    pub fn batch_data(&self, index: u64) -> Result<Option<Vec<u8>>, StoreError> {
        self.store
            .get(&schema::indexed_key(INPUT_BATCH_DATA_PREFIX, index))
    }

    /// Enqueued transactions not yet consumed by any batch.
    pub fn pending_queue_elements(&self) -> Result<u64, StoreError> {
        let info = self.info()?;
        Ok(info.queue_size - info.pending_queue_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventProvenance;
    use crate::mem::MemStore;
    use crate::overlay::OverlayStore;
    use crate::schema::Address;
    use rollupindex_merkle::Hash32;
    use std::sync::Arc;

    fn overlay() -> OverlayStore {
        OverlayStore::new(Arc::new(MemStore::new()))
    }

    fn enqueue_event(queue_index: u64) -> TransactionEnqueuedEvent {
        TransactionEnqueuedEvent {
            queue_index,
            from: Address([1; 20]),
            to: Address([2; 20]),
            rlp_tx: vec![queue_index as u8; 4],
            timestamp: 1000 + queue_index,
            raw: EventProvenance::default(),
        }
    }

    fn batch_event(index: u64, start_queue_index: u64, queue_num: u64) -> InputBatchAppendedEvent {
        InputBatchAppendedEvent {
            proposer: Address([3; 20]),
            index,
            start_queue_index,
            queue_num,
            input_hash: Hash32([index as u8; 32]),
            batch_data: vec![0xFE, index as u8],
            raw: EventProvenance::default(),
        }
    }

    #[test]
    fn enqueue_advances_queue_size() {
        let mut ov = overlay();
        let mut chain = InputChainStore::new(&mut ov);
        chain
            .store_enqueued_transactions(&[enqueue_event(0), enqueue_event(1)])
            .unwrap();
        let info = chain.info().unwrap();
        assert_eq!(info.queue_size, 2);
        assert_eq!(
            chain.enqueued_transaction(1).unwrap().unwrap().timestamp,
            1001
        );
        assert_eq!(chain.enqueued_transaction(2).unwrap(), None);
    }

    #[test]
    fn enqueue_gap_rejected() {
        let mut ov = overlay();
        let mut chain = InputChainStore::new(&mut ov);
        let err = chain
            .store_enqueued_transactions(&[enqueue_event(5)])
            .unwrap_err();
        assert!(matches!(err, StoreError::Inconsistent(_)));
    }

    #[test]
    fn identical_replay_tolerated_divergent_rejected() {
        let mut ov = overlay();
        let mut chain = InputChainStore::new(&mut ov);
        chain
            .store_enqueued_transactions(&[enqueue_event(0)])
            .unwrap();
        // Byte-identical replay after a shallow reorg: fine.
        chain
            .store_enqueued_transactions(&[enqueue_event(0), enqueue_event(1)])
            .unwrap();
        assert_eq!(chain.info().unwrap().queue_size, 2);

        // Same index, different payload: state divergence.
        let mut divergent = enqueue_event(0);
        divergent.rlp_tx = vec![0xDE, 0xAD];
        let err = chain
            .store_enqueued_transactions(&[divergent])
            .unwrap_err();
        assert!(matches!(err, StoreError::Inconsistent(_)));
    }

    #[test]
    fn batches_consume_queue_contiguously() {
        let mut ov = overlay();
        let mut chain = InputChainStore::new(&mut ov);
        chain
            .store_enqueued_transactions(&[enqueue_event(0), enqueue_event(1), enqueue_event(2)])
            .unwrap();
        chain
            .store_batches(&[batch_event(0, 0, 2), batch_event(1, 2, 1)])
            .unwrap();
        let info = chain.info().unwrap();
        assert_eq!(info.total_batches, 2);
        assert_eq!(info.pending_queue_index, 3);
        assert_eq!(chain.pending_queue_elements().unwrap(), 0);
        assert_eq!(chain.batch_data(1).unwrap(), Some(vec![0xFE, 1]));
    }

    #[test]
    fn batch_reaching_past_known_queue_rejected() {
        let mut ov = overlay();
        let mut chain = InputChainStore::new(&mut ov);
        chain
            .store_enqueued_transactions(&[enqueue_event(0)])
            .unwrap();
        let err = chain.store_batches(&[batch_event(0, 0, 5)]).unwrap_err();
        assert!(matches!(err, StoreError::Inconsistent(_)));
    }

    #[test]
    fn batch_start_must_match_pending_cursor() {
        let mut ov = overlay();
        let mut chain = InputChainStore::new(&mut ov);
        chain
            .store_enqueued_transactions(&[enqueue_event(0), enqueue_event(1)])
            .unwrap();
        chain.store_batches(&[batch_event(0, 0, 1)]).unwrap();
        // New batch index but a start below the pending cursor.
        let err = chain.store_batches(&[batch_event(1, 0, 1)]).unwrap_err();
        assert!(matches!(err, StoreError::Inconsistent(_)));
    }

    #[test]
    fn enqueued_range_requires_full_run() {
        let mut ov = overlay();
        let mut chain = InputChainStore::new(&mut ov);
        chain
            .store_enqueued_transactions(&[enqueue_event(0), enqueue_event(1)])
            .unwrap();
        assert_eq!(chain.enqueued_range(0, 2).unwrap().len(), 2);
        assert!(chain.enqueued_range(1, 2).is_err());
    }
}
