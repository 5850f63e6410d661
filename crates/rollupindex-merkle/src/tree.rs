//! The compact Merkle Mountain Range.
//!
//! The accumulator is an arena, not a pointer tree: live state is just
//! `tree_size` plus one peak hash per set bit of `tree_size` (largest subtree
//! first), and every parent/sibling/peak relationship is derived from bit
//! arithmetic over node positions in the [`HashStore`].

use crate::error::MerkleError;
use crate::hash_store::{stored_node_count, HashStore};
use crate::hasher::{combine, empty_root, Hash32};

/// 1-based index of the highest set bit; 0 for `num == 0`.
fn high_bit(num: u64) -> u32 {
    64 - num.leading_zeros()
}

/// Leaf counts of the complete subtrees in a forest over `n` leaves,
/// largest first (one per set bit of `n`).
fn subtree_leaf_counts(n: u64) -> Vec<u64> {
    let mut counts = Vec::with_capacity(n.count_ones() as usize);
    for bit in (0..high_bit(n)).rev() {
        if n & (1 << bit) != 0 {
            counts.push(1 << bit);
        }
    }
    counts
}

/// 1-based post-order positions of each subtree root in a forest over `n`
/// leaves, largest subtree first.
fn subtree_root_positions(n: u64) -> Vec<u64> {
    let mut positions = subtree_leaf_counts(n);
    let mut accum = 0u64;
    for p in positions.iter_mut() {
        accum += 2 * *p - 1;
        *p = accum;
    }
    positions
}

/// Fold a peak list into a single root, smallest subtree upward.
///
/// `acc` starts at the last (smallest) peak and is repeatedly absorbed from
/// the left: `acc = combine(peak, acc)`. Verifiers replicate this exact
/// order.
fn hash_fold(peaks: &[Hash32]) -> Hash32 {
    let mut iter = peaks.iter().rev();
    let mut acc = match iter.next() {
        Some(peak) => *peak,
        None => return empty_root(),
    };
    for peak in iter {
        acc = combine(*peak, acc);
    }
    acc
}

/// A Merkle Mountain Range over an append-only leaf sequence.
///
/// Single appender; proof reads against an already-closed size are safe while
/// appends proceed because no stored node is ever mutated.
pub struct MerkleAccumulator<S> {
    tree_size: u64,
    /// Peak hashes, largest subtree first.
    peaks: Vec<Hash32>,
    store: S,
}

impl<S: HashStore> MerkleAccumulator<S> {
    /// An empty accumulator over `store`.
    pub fn new(store: S) -> Self {
        Self {
            tree_size: 0,
            peaks: Vec::new(),
            store,
        }
    }

    /// Rebuild from a persisted compact form.
    pub fn from_parts(tree_size: u64, peaks: Vec<Hash32>, store: S) -> Result<Self, MerkleError> {
        let mut tree = Self::new(store);
        tree.reset(tree_size, peaks)?;
        Ok(tree)
    }

    /// Reload the compact form, repositioning the store's write cursor.
    ///
    /// Used at startup and after a rollback: an orphaned node suffix beyond
    /// the restored size is left in place and overwritten by later appends.
    pub fn reset(&mut self, tree_size: u64, peaks: Vec<Hash32>) -> Result<(), MerkleError> {
        if peaks.len() != tree_size.count_ones() as usize {
            return Err(MerkleError::PeakMismatch);
        }
        self.store.rewind(stored_node_count(tree_size))?;
        self.tree_size = tree_size;
        self.peaks = peaks;
        Ok(())
    }

    /// Total number of leaves appended.
    pub fn tree_size(&self) -> u64 {
        self.tree_size
    }

    /// Current peak hashes, largest subtree first.
    pub fn peaks(&self) -> &[Hash32] {
        &self.peaks
    }

    /// Current root: peaks folded smallest subtree upward; `keccak256("")`
    /// for the empty forest.
    pub fn root(&self) -> Hash32 {
        if self.peaks.is_empty() {
            empty_root()
        } else {
            hash_fold(&self.peaks)
        }
    }

    /// Append one leaf hash.
    ///
    /// Merges the leaf with existing peaks following the binary-counter carry
    /// pattern of `tree_size + 1`, and persists the leaf plus every new
    /// internal node bottom-up. Amortized O(1), worst case O(log n).
    pub fn append(&mut self, leaf: Hash32) -> Result<(), MerkleError> {
        let mut to_store = vec![leaf];
        let mut node = leaf;
        let mut live = self.peaks.len();
        let mut s = self.tree_size;
        while s % 2 == 1 {
            node = combine(self.peaks[live - 1], node);
            to_store.push(node);
            live -= 1;
            s >>= 1;
        }
        self.store.append(&to_store)?;
        self.tree_size += 1;
        self.peaks.truncate(live);
        self.peaks.push(node);
        Ok(())
    }

    /// Flush the underlying hash store.
    pub fn flush(&mut self) -> Result<(), MerkleError> {
        self.store.flush()
    }

    /// Inclusion proof for `leaf_index` against the historical root at
    /// `at_size` leaves (`leaf_index < at_size <= tree_size()`).
    ///
    /// The path runs from the leaf's sibling up to the peak covering it, then
    /// carries the folded remainder needed to reach the historical root.
    /// Because stored nodes are immutable, the result is byte-stable across
    /// later appends.
    pub fn inclusion_proof(&self, leaf_index: u64, at_size: u64) -> Result<Vec<Hash32>, MerkleError> {
        if at_size == 0 || leaf_index >= at_size {
            return Err(MerkleError::IndexOutOfRange {
                index: leaf_index,
                size: at_size,
            });
        }
        if at_size > self.tree_size {
            return Err(MerkleError::SizeOutOfRange {
                requested: at_size,
                tree_size: self.tree_size,
            });
        }

        let mut m = leaf_index;
        let mut n = at_size;
        // Node offset (in slots) of the region covering the current [0, n).
        let mut offset = 0u64;
        let mut path = Vec::new();
        while n != 1 {
            // Largest power of two strictly below n: the left complete subtree.
            let k = 1u64 << (high_bit(n - 1) - 1);
            if m < k {
                // Sibling is the folded root of the right-hand forest, which
                // starts right after the left subtree's 2k-1 nodes.
                let mut sub = Vec::new();
                for pos in subtree_root_positions(n - k) {
                    sub.push(self.store.hash_at(offset + 2 * k - 1 + pos - 1)?);
                }
                path.push(hash_fold(&sub));
                n = k;
            } else {
                // Sibling is the left complete subtree's root, the last node
                // of its post-order block.
                path.push(self.store.hash_at(offset + 2 * k - 2)?);
                offset += 2 * k - 1;
                m -= k;
                n -= k;
            }
        }
        path.reverse();
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash_store::MemHashStore;
    use crate::hasher::keccak256;
    use crate::proof::verify_inclusion;

    fn leaves(n: u64) -> Vec<Hash32> {
        (0..n).map(|i| keccak256(&i.to_be_bytes())).collect()
    }

    fn build(n: u64) -> MerkleAccumulator<MemHashStore> {
        let mut tree = MerkleAccumulator::new(MemHashStore::new());
        for leaf in leaves(n) {
            tree.append(leaf).unwrap();
        }
        tree
    }

    #[test]
    fn empty_and_singleton_roots() {
        let tree = build(0);
        assert_eq!(tree.root(), empty_root());
        let tree = build(1);
        assert_eq!(tree.root(), leaves(1)[0]);
    }

    #[test]
    fn peak_count_tracks_set_bits() {
        for n in 1..=64u64 {
            let tree = build(n);
            assert_eq!(tree.peaks().len(), n.count_ones() as usize);
            assert_eq!(tree.tree_size(), n);
        }
    }

    #[test]
    fn proof_roundtrip_all_indices_and_sizes() {
        let n = 33u64;
        let tree = build(n);
        let ls = leaves(n);
        for s in 1..=n {
            let root_at_s = build(s).root();
            for i in 0..s {
                let proof = tree.inclusion_proof(i, s).unwrap();
                verify_inclusion(ls[i as usize], i, &proof, root_at_s, s)
                    .unwrap_or_else(|e| panic!("i={i} s={s}: {e}"));
            }
        }
    }

    #[test]
    fn tampered_proof_fails() {
        let n = 13u64;
        let tree = build(n);
        let ls = leaves(n);
        let proof = tree.inclusion_proof(5, n).unwrap();
        let root = tree.root();

        // Wrong leaf.
        assert!(verify_inclusion(keccak256(b"bogus"), 5, &proof, root, n).is_err());
        // Wrong index.
        assert!(verify_inclusion(ls[5], 6, &proof, root, n).is_err());
        // Flipped bit in every proof element.
        for pos in 0..proof.len() {
            let mut bad = proof.clone();
            bad[pos].0[0] ^= 1;
            assert!(verify_inclusion(ls[5], 5, &bad, root, n).is_err());
        }
        // Truncated and extended paths.
        assert!(verify_inclusion(ls[5], 5, &proof[..proof.len() - 1], root, n).is_err());
        let mut long = proof.clone();
        long.push(Hash32::ZERO);
        assert!(verify_inclusion(ls[5], 5, &long, root, n).is_err());
    }

    #[test]
    fn historical_proofs_are_stable() {
        let mut tree = build(10);
        let before = tree.inclusion_proof(3, 7).unwrap();
        for leaf in leaves(40).into_iter().skip(10) {
            tree.append(leaf).unwrap();
        }
        let after = tree.inclusion_proof(3, 7).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn reconstruction_matches_uninterrupted_tree() {
        let n = 29u64;
        let ls = leaves(n);
        let full = build(n);

        // Build to 17 leaves, capture the compact form, then "restart" over
        // the same store and replay the remaining leaves.
        let snapshot = build(17);
        let (size, peaks) = (snapshot.tree_size(), snapshot.peaks().to_vec());
        let mut replayed = MerkleAccumulator::from_parts(size, peaks, snapshot.store).unwrap();
        for leaf in &ls[17..] {
            replayed.append(*leaf).unwrap();
        }
        assert_eq!(replayed.root(), full.root());
        assert_eq!(replayed.peaks(), full.peaks());
    }

    #[test]
    fn proof_bounds_are_enforced() {
        let tree = build(8);
        assert!(tree.inclusion_proof(8, 8).is_err());
        assert!(tree.inclusion_proof(0, 9).is_err());
        assert!(tree.inclusion_proof(0, 0).is_err());
    }

    #[test]
    fn reset_rejects_mismatched_peaks() {
        let mut tree = build(4);
        assert!(tree.reset(3, vec![Hash32::ZERO]).is_err());
    }
}
