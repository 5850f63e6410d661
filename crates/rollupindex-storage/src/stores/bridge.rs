//! Token-bridge store.
//!
//! Bridge records are keyed by originating transaction hash rather than by
//! any counter, so replaying a reorged block rewrites the same keys and no
//! cursor needs rolling back.

use rollupindex_merkle::Hash32;

use crate::error::StoreError;
use crate::events::{BridgeEventKind, TokenBridgeChainEvent};
use crate::kv::KvStore;
use crate::schema::{self, TokenBridgeEvent};
use crate::stores::{get_record, put_record};

fn kind_prefix(kind: BridgeEventKind) -> u8 {
    match kind {
        BridgeEventKind::DepositInitiated => schema::L1_DEPOSIT_PREFIX,
        BridgeEventKind::WithdrawalFinalized => schema::L1_WITHDRAWAL_PREFIX,
        BridgeEventKind::WithdrawalInitiated => schema::L2_WITHDRAWAL_PREFIX,
        BridgeEventKind::DepositFinalized => schema::L2_DEPOSIT_FINALIZED_PREFIX,
        BridgeEventKind::DepositFailed => schema::L2_DEPOSIT_FAILED_PREFIX,
    }
}

pub struct TokenBridgeStore<'a, K: KvStore> {
    store: &'a mut K,
}

impl<'a, K: KvStore> TokenBridgeStore<'a, K> {
    pub fn new(store: &'a mut K) -> Self {
        Self { store }
    }

    pub fn store_events(&mut self, events: &[TokenBridgeChainEvent]) -> Result<(), StoreError> {
        for ev in events {
            put_record(
                self.store,
                schema::hash_key(kind_prefix(ev.kind), &ev.raw.tx_hash),
                &TokenBridgeEvent {
                    l1_token: ev.l1_token,
                    l2_token: ev.l2_token,
                    from: ev.from,
                    to: ev.to,
                    amount: ev.amount,
                    data: ev.data.clone(),
                },
            )?;
        }
        Ok(())
    }

    pub fn event(
        &self,
        kind: BridgeEventKind,
        tx_hash: &Hash32,
    ) -> Result<Option<TokenBridgeEvent>, StoreError> {
        get_record(self.store, &schema::hash_key(kind_prefix(kind), tx_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventProvenance;
    use crate::mem::MemStore;
    use crate::overlay::OverlayStore;
    use crate::schema::Address;
    use std::sync::Arc;

    fn bridge_event(kind: BridgeEventKind, tx_hash: Hash32) -> TokenBridgeChainEvent {
        let mut amount = [0u8; 32];
        amount[31] = 42;
        TokenBridgeChainEvent {
            kind,
            l1_token: Address([1; 20]),
            l2_token: Address([2; 20]),
            from: Address([3; 20]),
            to: Address([4; 20]),
            amount,
            data: vec![9, 9],
            raw: EventProvenance {
                block_number: 7,
                tx_hash,
                log_index: 0,
            },
        }
    }

    #[test]
    fn records_keyed_by_kind_and_tx_hash() {
        let mut ov = OverlayStore::new(Arc::new(MemStore::new()));
        let mut bridge = TokenBridgeStore::new(&mut ov);
        let tx = Hash32([0xAB; 32]);
        bridge
            .store_events(&[
                bridge_event(BridgeEventKind::DepositInitiated, tx),
                bridge_event(BridgeEventKind::WithdrawalInitiated, tx),
            ])
            .unwrap();

        let deposit = bridge
            .event(BridgeEventKind::DepositInitiated, &tx)
            .unwrap()
            .unwrap();
        assert_eq!(deposit.amount[31], 42);
        // Same tx hash under a different kind is a distinct record.
        assert!(bridge
            .event(BridgeEventKind::WithdrawalInitiated, &tx)
            .unwrap()
            .is_some());
        assert!(bridge
            .event(BridgeEventKind::DepositFailed, &tx)
            .unwrap()
            .is_none());
    }

    #[test]
    fn replay_overwrites_in_place() {
        let mut ov = OverlayStore::new(Arc::new(MemStore::new()));
        let mut bridge = TokenBridgeStore::new(&mut ov);
        let tx = Hash32([0xCD; 32]);
        let mut ev = bridge_event(BridgeEventKind::DepositFinalized, tx);
        bridge.store_events(std::slice::from_ref(&ev)).unwrap();
        ev.data = vec![1];
        bridge.store_events(std::slice::from_ref(&ev)).unwrap();
        let stored = bridge
            .event(BridgeEventKind::DepositFinalized, &tx)
            .unwrap()
            .unwrap();
        assert_eq!(stored.data, vec![1]);
    }
}
