//! Keccak256 hashing primitives shared by the accumulator and its verifier.

use tiny_keccak::{Hasher, Keccak};

/// A 32-byte hash value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash32(pub [u8; 32]);

impl Hash32 {
    pub const ZERO: Hash32 = Hash32([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl From<[u8; 32]> for Hash32 {
    fn from(bytes: [u8; 32]) -> Self {
        Hash32(bytes)
    }
}

impl AsRef<[u8]> for Hash32 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Display for Hash32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Compute the keccak256 hash of `data`.
pub fn keccak256(data: &[u8]) -> Hash32 {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    Hash32(output)
}

/// The fixed parent rule: `keccak256(left ∥ right)`.
///
/// The on-chain verifier replicates exactly this combine order, so it must
/// never change.
pub fn combine(left: Hash32, right: Hash32) -> Hash32 {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(&left.0);
    hasher.update(&right.0);
    hasher.finalize(&mut output);
    Hash32(output)
}

/// Root of the empty forest: `keccak256("")`.
pub fn empty_root() -> Hash32 {
    keccak256(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keccak256_empty_input() {
        // Well-known keccak256 of the empty string.
        assert_eq!(
            empty_root().to_string(),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn combine_is_order_sensitive() {
        let a = keccak256(b"a");
        let b = keccak256(b"b");
        assert_ne!(combine(a, b), combine(b, a));
    }
}
