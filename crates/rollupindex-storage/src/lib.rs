//! rollupindex-storage — the transactional store under the sync engine.
//!
//! # Architecture
//!
//! ```text
//! Storage (facade, read-only snapshot)
//!    └── StorageWriter (one per sync window)
//!           └── OverlayStore   (in-memory write-set, atomic commit)
//!                  └── PersistStore backend (sled / memory)
//! Domain stores (InputChain, StateChain, WitnessStore, TokenBridge,
//! AddressManager, RelayerCursor) are schema-aware codecs over one overlay.
//! ```
//!
//! Reads are tri-state: `Ok(Some(v))`, `Ok(None)` ("nothing at this index
//! yet" — expected, recoverable), or `Err` (a genuine backend/decode error,
//! never silently defaulted).

pub mod codec;
pub mod error;
pub mod events;
pub mod kv;
pub mod mem;
pub mod overlay;
pub mod schema;
pub mod sled_store;
pub mod storage;
pub mod stores;

pub use error::StoreError;
pub use kv::{KvStore, PersistStore, WriteBatch};
pub use mem::MemStore;
pub use overlay::{OverlayStore, ReadOnlyStore};
pub use sled_store::SledStore;
pub use storage::{Storage, StorageWriter};
