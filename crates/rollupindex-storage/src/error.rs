//! Error types for the storage layer.

use rollupindex_merkle::MerkleError;
use thiserror::Error;

/// Errors that can occur in the KV, overlay, and domain-store layers.
///
/// `Inconsistent` marks a cursor/ordering violation that cannot be explained
/// by anything but a missed reorg or corrupted state; callers must treat it
/// as fatal rather than retry.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend: {0}")]
    Backend(#[from] sled::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("accumulator: {0}")]
    Merkle(#[from] MerkleError),

    #[error("decode {context}: {reason}")]
    Codec {
        context: &'static str,
        reason: String,
    },

    #[error("store is read-only")]
    ReadOnly,

    #[error("consistency violation: {0}")]
    Inconsistent(String),
}

impl StoreError {
    pub(crate) fn codec(context: &'static str, reason: impl Into<String>) -> Self {
        Self::Codec {
            context,
            reason: reason.into(),
        }
    }

    /// Returns `true` if the error signals state divergence that retrying
    /// cannot fix.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Inconsistent(_) | Self::Codec { .. } | Self::ReadOnly)
    }
}
