//! Relayer delivery cursors.
//!
//! Relay consumers track which cross-layer message they will deliver next;
//! the cursor lives in the same database so a rollback rewinds delivery
//! state together with everything else.

use crate::error::StoreError;
use crate::kv::KvStore;
use crate::schema;
use crate::stores::witness::WitnessLayer;
use crate::stores::{get_u64, put_u64};

pub struct RelayerCursorStore<'a, K: KvStore> {
    store: &'a mut K,
}

impl<'a, K: KvStore> RelayerCursorStore<'a, K> {
    pub fn new(store: &'a mut K) -> Self {
        Self { store }
    }

    fn key(layer: WitnessLayer) -> &'static [u8] {
        match layer {
            WitnessLayer::L1 => schema::L1_RELAYER_PENDING_INDEX_KEY,
            WitnessLayer::L2 => schema::L2_RELAYER_PENDING_INDEX_KEY,
        }
    }

    /// Index of the next message awaiting delivery from `layer`.
    pub fn pending_index(&self, layer: WitnessLayer) -> Result<u64, StoreError> {
        get_u64(self.store, Self::key(layer))
    }

    pub fn store_pending_index(
        &mut self,
        layer: WitnessLayer,
        index: u64,
    ) -> Result<(), StoreError> {
        put_u64(self.store, Self::key(layer), index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::MemStore;
    use crate::overlay::OverlayStore;
    use std::sync::Arc;

    #[test]
    fn per_layer_cursors_are_independent() {
        let mut ov = OverlayStore::new(Arc::new(MemStore::new()));
        let mut relayer = RelayerCursorStore::new(&mut ov);
        relayer.store_pending_index(WitnessLayer::L1, 10).unwrap();
        assert_eq!(relayer.pending_index(WitnessLayer::L1).unwrap(), 10);
        assert_eq!(relayer.pending_index(WitnessLayer::L2).unwrap(), 0);
    }
}
