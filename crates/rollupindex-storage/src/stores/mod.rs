//! Schema-aware domain stores.
//!
//! Each store is a short-lived view over one [`KvStore`] (in practice the
//! window's overlay), owning the key layout and cursor invariants for its
//! record family. None of them commit anything; durability is the
//! overlay's job.

pub mod address_manager;
pub mod bridge;
pub mod input_chain;
pub mod relayer;
pub mod state_chain;
pub mod witness;

pub use address_manager::AddressManagerStore;
pub use bridge::TokenBridgeStore;
pub use input_chain::InputChainStore;
pub use relayer::RelayerCursorStore;
pub use state_chain::StateChainStore;
pub use witness::{WitnessLayer, WitnessStore};

use crate::codec::Record;
use crate::error::StoreError;
use crate::kv::KvStore;

/// Decode the record at `key`, or `Ok(None)` if absent.
pub(crate) fn get_record<T: Record, K: KvStore>(
    store: &K,
    key: &[u8],
) -> Result<Option<T>, StoreError> {
    match store.get(key)? {
        Some(raw) => Ok(Some(T::from_bytes(&raw)?)),
        None => Ok(None),
    }
}

pub(crate) fn put_record<T: Record, K: KvStore>(
    store: &mut K,
    key: Vec<u8>,
    record: &T,
) -> Result<(), StoreError> {
    store.put(key, record.to_bytes())
}

/// Read a u64 cursor, defaulting to 0 when unset.
pub(crate) fn get_u64<K: KvStore>(store: &K, key: &[u8]) -> Result<u64, StoreError> {
    match store.get(key)? {
        None => Ok(0),
        Some(raw) => {
            let bytes: [u8; 8] = raw.as_slice().try_into().map_err(|_| {
                StoreError::codec("u64 cursor", format!("expected 8 bytes, got {}", raw.len()))
            })?;
            Ok(u64::from_be_bytes(bytes))
        }
    }
}

pub(crate) fn put_u64<K: KvStore>(store: &mut K, key: &[u8], v: u64) -> Result<(), StoreError> {
    store.put(key.to_vec(), v.to_be_bytes().to_vec())
}
