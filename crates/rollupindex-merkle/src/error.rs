//! Error types for the accumulator.

use thiserror::Error;

/// Errors that can occur while appending to or proving against the MMR.
#[derive(Debug, Error)]
pub enum MerkleError {
    #[error("leaf index {index} out of range for size {size}")]
    IndexOutOfRange { index: u64, size: u64 },

    #[error("requested size {requested} beyond tree size {tree_size}")]
    SizeOutOfRange { requested: u64, tree_size: u64 },

    #[error("hash store: {0}")]
    Store(#[from] std::io::Error),

    #[error("stored hashes are less than expected: have {have}, want {want}")]
    Truncated { have: u64, want: u64 },

    #[error("peak count does not match tree size")]
    PeakMismatch,

    #[error("proof length mismatch: {0}")]
    ProofLength(&'static str),

    #[error("constructed root differs from the expected root")]
    RootMismatch,
}
