//! Witness store: cross-layer messages and their accumulator.
//!
//! Every accepted message appends exactly one leaf, so the message cursor
//! and the accumulator size move in lock-step. The caller owns the
//! accumulator; this store folds messages into it and persists the compact
//! form next to the records, all inside the same overlay.

use rollupindex_merkle::{Hash32, HashStore, MerkleAccumulator};

use crate::error::StoreError;
use crate::events::MessageSentEvent;
use crate::kv::KvStore;
use crate::schema::records::{deserialize_compact_tree, serialize_compact_tree};
use crate::schema::{self, message_hash, CrossLayerSentMessage};
use crate::stores::{get_record, get_u64, put_record, put_u64};

/// Which chain's messages this store tracks. The two layers keep disjoint
/// keyspaces and independent accumulators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WitnessLayer {
    L1,
    L2,
}

impl WitnessLayer {
    fn message_prefix(self) -> u8 {
        match self {
            WitnessLayer::L1 => schema::L1_SENT_MESSAGE_PREFIX,
            WitnessLayer::L2 => schema::L2_SENT_MESSAGE_PREFIX,
        }
    }

    fn total_key(self) -> &'static [u8] {
        match self {
            WitnessLayer::L1 => schema::L1_TOTAL_MESSAGES_KEY,
            WitnessLayer::L2 => schema::L2_TOTAL_MESSAGES_KEY,
        }
    }

    pub fn tree_key(self) -> &'static [u8] {
        match self {
            WitnessLayer::L1 => schema::L1_COMPACT_TREE_KEY,
            WitnessLayer::L2 => schema::L2_COMPACT_TREE_KEY,
        }
    }
}

pub struct WitnessStore<'a, K: KvStore> {
    store: &'a mut K,
    layer: WitnessLayer,
}

impl<'a, K: KvStore> WitnessStore<'a, K> {
    pub fn new(store: &'a mut K, layer: WitnessLayer) -> Self {
        Self { store, layer }
    }

    pub fn total_messages(&self) -> Result<u64, StoreError> {
        get_u64(self.store, self.layer.total_key())
    }

    /// Fold sent messages into `tree` and record them.
    ///
    /// A message index above the cursor is a gap; one below it is a
    /// duplicate and is skipped without touching the accumulator.
    pub fn store_sent_messages<S: HashStore>(
        &mut self,
        tree: &mut MerkleAccumulator<S>,
        msgs: &[MessageSentEvent],
    ) -> Result<(), StoreError> {
        let mut num = self.total_messages()?;
        for msg in msgs {
            if msg.message_index > num {
                return Err(StoreError::Inconsistent(format!(
                    "message gap: expected index {}, got {}",
                    num, msg.message_index
                )));
            }
            if msg.message_index < num {
                continue;
            }
            let leaf = message_hash(&msg.target, &msg.sender, msg.message_index, &msg.message);
            tree.append(leaf)?;
            put_record(
                self.store,
                schema::indexed_key(self.layer.message_prefix(), msg.message_index),
                &CrossLayerSentMessage {
                    block_number: msg.raw.block_number,
                    message_index: msg.message_index,
                    target: msg.target,
                    sender: msg.sender,
                    mmr_root: msg.mmr_root,
                    message: msg.message.clone(),
                },
            )?;
            num += 1;
        }
        self.store_compact_tree(tree.tree_size(), tree.peaks())?;
        put_u64(self.store, self.layer.total_key(), num)
    }

    pub fn sent_message(&self, index: u64) -> Result<Option<CrossLayerSentMessage>, StoreError> {
        get_record(
            self.store,
            &schema::indexed_key(self.layer.message_prefix(), index),
        )
    }

    /// Persisted compact accumulator form, empty when never written.
    pub fn compact_tree(&self) -> Result<(u64, Vec<Hash32>), StoreError> {
        match self.store.get(self.layer.tree_key())? {
            None => Ok((0, Vec::new())),
            Some(raw) => deserialize_compact_tree(&raw),
        }
    }

    pub fn store_compact_tree(&mut self, tree_size: u64, peaks: &[Hash32]) -> Result<(), StoreError> {
        self.store.put(
            self.layer.tree_key().to_vec(),
            serialize_compact_tree(tree_size, peaks),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventProvenance;
    use crate::mem::MemStore;
    use crate::overlay::OverlayStore;
    use crate::schema::Address;
    use rollupindex_merkle::{verify_inclusion, MemHashStore};
    use std::sync::Arc;

    fn msg_event(message_index: u64) -> MessageSentEvent {
        MessageSentEvent {
            message_index,
            target: Address([0x11; 20]),
            sender: Address([0x22; 20]),
            mmr_root: Hash32::ZERO,
            message: vec![message_index as u8; 8],
            raw: EventProvenance {
                block_number: 100 + message_index,
                tx_hash: Hash32::ZERO,
                log_index: 0,
            },
        }
    }

    #[test]
    fn messages_and_accumulator_move_in_lock_step() {
        let mut ov = OverlayStore::new(Arc::new(MemStore::new()));
        let mut tree = MerkleAccumulator::new(MemHashStore::new());
        let mut witness = WitnessStore::new(&mut ov, WitnessLayer::L1);

        witness
            .store_sent_messages(&mut tree, &[msg_event(0), msg_event(1), msg_event(2)])
            .unwrap();
        assert_eq!(witness.total_messages().unwrap(), 3);
        assert_eq!(tree.tree_size(), 3);

        let (size, peaks) = witness.compact_tree().unwrap();
        assert_eq!(size, 3);
        assert_eq!(peaks, tree.peaks());
    }

    #[test]
    fn duplicate_skipped_without_new_leaf() {
        let mut ov = OverlayStore::new(Arc::new(MemStore::new()));
        let mut tree = MerkleAccumulator::new(MemHashStore::new());
        let mut witness = WitnessStore::new(&mut ov, WitnessLayer::L2);

        witness
            .store_sent_messages(&mut tree, &[msg_event(0), msg_event(1)])
            .unwrap();
        witness
            .store_sent_messages(&mut tree, &[msg_event(1), msg_event(2)])
            .unwrap();
        assert_eq!(witness.total_messages().unwrap(), 3);
        assert_eq!(tree.tree_size(), 3);
    }

    #[test]
    fn gap_rejected() {
        let mut ov = OverlayStore::new(Arc::new(MemStore::new()));
        let mut tree = MerkleAccumulator::new(MemHashStore::new());
        let mut witness = WitnessStore::new(&mut ov, WitnessLayer::L1);
        let err = witness
            .store_sent_messages(&mut tree, &[msg_event(4)])
            .unwrap_err();
        assert!(matches!(err, StoreError::Inconsistent(_)));
        assert_eq!(tree.tree_size(), 0);
    }

    #[test]
    fn recorded_message_proves_against_root() {
        let mut ov = OverlayStore::new(Arc::new(MemStore::new()));
        let mut tree = MerkleAccumulator::new(MemHashStore::new());
        let mut witness = WitnessStore::new(&mut ov, WitnessLayer::L1);
        let msgs: Vec<_> = (0..9).map(msg_event).collect();
        witness.store_sent_messages(&mut tree, &msgs).unwrap();

        let stored = witness.sent_message(5).unwrap().unwrap();
        let leaf = message_hash(
            &stored.target,
            &stored.sender,
            stored.message_index,
            &stored.message,
        );
        let proof = tree.inclusion_proof(5, tree.tree_size()).unwrap();
        verify_inclusion(leaf, 5, &proof, tree.root(), tree.tree_size()).unwrap();
    }

    #[test]
    fn layers_do_not_collide() {
        let mut ov = OverlayStore::new(Arc::new(MemStore::new()));
        let mut l1_tree = MerkleAccumulator::new(MemHashStore::new());
        {
            let mut l1 = WitnessStore::new(&mut ov, WitnessLayer::L1);
            l1.store_sent_messages(&mut l1_tree, &[msg_event(0)]).unwrap();
        }
        let l2 = WitnessStore::new(&mut ov, WitnessLayer::L2);
        assert_eq!(l2.total_messages().unwrap(), 0);
        assert_eq!(l2.sent_message(0).unwrap(), None);
    }
}
