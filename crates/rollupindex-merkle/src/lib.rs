//! rollupindex-merkle — append-only authenticated accumulator.
//!
//! # Architecture
//!
//! ```text
//! MerkleAccumulator (compact MMR: tree_size + peak list)
//!          ├── HashStore        (position-addressed node persistence)
//!          │      ├── MemHashStore  (Vec-backed, tests / ephemeral)
//!          │      └── FileHashStore (fixed 32-byte slots at pos × 32)
//!          └── verify_inclusion (stateless proof check, shared combine rule)
//! ```
//!
//! The accumulator keeps only `tree_size` and one peak hash per set bit of
//! `tree_size`; every node ever produced lives in the `HashStore` at a
//! position derived arithmetically from the append order. No node is ever
//! mutated, so proofs taken at a historical size stay valid forever.

pub mod error;
pub mod hash_store;
pub mod hasher;
pub mod proof;
pub mod tree;

pub use error::MerkleError;
pub use hash_store::{FileHashStore, HashStore, MemHashStore};
pub use hasher::{combine, empty_root, keccak256, Hash32};
pub use proof::verify_inclusion;
pub use tree::MerkleAccumulator;
