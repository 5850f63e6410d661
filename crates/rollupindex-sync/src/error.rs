//! Error types for the sync engine.

use rollupindex_merkle::MerkleError;
use rollupindex_storage::StoreError;
use thiserror::Error;

/// Errors surfacing out of a sync window.
///
/// Transient errors (RPC hiccups, the head lagging the cursor) make the
/// engine retry the same window after its poll interval; fatal ones abort
/// the run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("rpc: {0}")]
    Rpc(String),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("accumulator: {0}")]
    Merkle(#[from] MerkleError),

    #[error("chain head {largest} below window start {start}")]
    HeadBehind { start: u64, largest: u64 },

    #[error("checkpoint chain broken: pending ends at {pending_end}, window starts at {window_start}")]
    CheckpointChain { pending_end: u64, window_start: u64 },

    #[error("no checkpoint to roll back to")]
    NoCheckpoint,

    #[error("config: {0}")]
    Config(String),
}

impl SyncError {
    /// Whether the engine may retry the current window indefinitely.
    ///
    /// Consistency violations are not retryable here: the engine grants
    /// them one extra round so the reorg probe can run, and surfaces them
    /// as fatal when no reorg explains the divergence.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Rpc(_) | Self::HeadBehind { .. } => true,
            Self::Store(e) => !e.is_fatal(),
            Self::Merkle(_) => false,
            Self::CheckpointChain { .. } | Self::NoCheckpoint | Self::Config(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consistency_violations_are_fatal_not_retryable() {
        let err = SyncError::Store(StoreError::Inconsistent("queue index gap".into()));
        assert!(!err.is_retryable());
    }

    #[test]
    fn transient_errors_are_retryable() {
        assert!(SyncError::Rpc("timeout".into()).is_retryable());
        assert!(SyncError::HeadBehind { start: 5, largest: 3 }.is_retryable());
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk busy");
        assert!(SyncError::Store(StoreError::Io(io)).is_retryable());
        assert!(!SyncError::NoCheckpoint.is_retryable());
    }
}
