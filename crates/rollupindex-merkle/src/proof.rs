//! Stateless inclusion-proof verification.
//!
//! Mirrors the audit-path walk used by the on-chain verifier: the candidate
//! root is recomputed with the same `combine` rule the accumulator uses, and
//! the check is all-or-nothing.

use crate::error::MerkleError;
use crate::hasher::{combine, Hash32};

/// Verify that `leaf_hash` sits at `leaf_index` in the tree of `size` leaves
/// whose root is `root`.
///
/// Walks the proof bottom-up: at each level the running hash is combined with
/// the next path element on the side dictated by the leaf's position, skipping
/// levels where the node has no right sibling. Both a too-short and a
/// too-long path are rejected.
pub fn verify_inclusion(
    leaf_hash: Hash32,
    leaf_index: u64,
    proof: &[Hash32],
    root: Hash32,
    size: u64,
) -> Result<(), MerkleError> {
    if leaf_index >= size {
        return Err(MerkleError::IndexOutOfRange {
            index: leaf_index,
            size,
        });
    }

    let mut hash = leaf_hash;
    let mut index = leaf_index;
    let mut last = size - 1;
    let mut pos = 0usize;
    while last > 0 {
        if index % 2 == 1 {
            let sibling = *proof.get(pos).ok_or(MerkleError::ProofLength("path too short"))?;
            hash = combine(sibling, hash);
            pos += 1;
        } else if index < last {
            let sibling = *proof.get(pos).ok_or(MerkleError::ProofLength("path too short"))?;
            hash = combine(hash, sibling);
            pos += 1;
        }
        index /= 2;
        last /= 2;
    }
    if pos != proof.len() {
        return Err(MerkleError::ProofLength("path too long"));
    }
    if hash != root {
        return Err(MerkleError::RootMismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::keccak256;

    #[test]
    fn singleton_tree_has_empty_path() {
        let leaf = keccak256(b"only");
        assert!(verify_inclusion(leaf, 0, &[], leaf, 1).is_ok());
        assert!(verify_inclusion(leaf, 0, &[], keccak256(b"other"), 1).is_err());
    }

    #[test]
    fn index_beyond_size_is_rejected() {
        let leaf = keccak256(b"leaf");
        let err = verify_inclusion(leaf, 3, &[], leaf, 2).unwrap_err();
        assert!(matches!(err, MerkleError::IndexOutOfRange { index: 3, size: 2 }));
    }

    #[test]
    fn two_leaf_tree() {
        let a = keccak256(b"a");
        let b = keccak256(b"b");
        let root = combine(a, b);
        assert!(verify_inclusion(a, 0, &[b], root, 2).is_ok());
        assert!(verify_inclusion(b, 1, &[a], root, 2).is_ok());
        assert!(verify_inclusion(b, 0, &[a], root, 2).is_err());
    }
}
