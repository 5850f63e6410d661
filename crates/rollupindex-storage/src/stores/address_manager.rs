//! On-chain address book.
//!
//! Names resolve through `keccak256(name)` keys; the height cursor records
//! how far the book has been synced so later contracts can be resolved
//! before their first event arrives.

use crate::error::StoreError;
use crate::events::AddressSetEvent;
use crate::kv::KvStore;
use crate::schema::{self, Address};
use crate::stores::{get_u64, put_u64};

pub struct AddressManagerStore<'a, K: KvStore> {
    store: &'a mut K,
}

impl<'a, K: KvStore> AddressManagerStore<'a, K> {
    pub fn new(store: &'a mut K) -> Self {
        Self { store }
    }

    /// Apply name updates in order; the last write for a name wins.
    pub fn store_updates(&mut self, events: &[AddressSetEvent]) -> Result<(), StoreError> {
        for ev in events {
            self.store
                .put(schema::name_key(&ev.name), ev.new_address.0.to_vec())?;
        }
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<Option<Address>, StoreError> {
        match self.store.get(&schema::name_key(name))? {
            None => Ok(None),
            Some(raw) => {
                let bytes: [u8; 20] = raw.as_slice().try_into().map_err(|_| {
                    StoreError::codec("address book", format!("expected 20 bytes, got {}", raw.len()))
                })?;
                Ok(Some(Address(bytes)))
            }
        }
    }

    pub fn synced_height(&self) -> Result<u64, StoreError> {
        get_u64(self.store, schema::ADDRESS_MANAGER_HEIGHT_KEY)
    }

    pub fn store_synced_height(&mut self, height: u64) -> Result<(), StoreError> {
        put_u64(self.store, schema::ADDRESS_MANAGER_HEIGHT_KEY, height)
    }
}
