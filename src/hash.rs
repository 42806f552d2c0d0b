//! The keyed fixed-output hash used everywhere a digest is needed: Merkle
//! node/leaf hashing, channel mixing, and proof-of-work. §4.C, §6.
//!
//! Blake2s is the hash the wider pack standardizes on for this kind of
//! verifier (see e.g. the `stwo-verifier-no-std` manifest's `blake2`
//! dependency); the teacher's own `Channel`/`Commitment` types are built
//! over `sha2::Sha256` and are the template for the mix/draw *shape* below,
//! generalized to a `MerkleHasher` trait so the channel, VCS, and FRI code
//! are not nailed to one concrete hash.

use blake2::{Blake2s256, Digest};
use serde::{Deserialize, Serialize};

/// A 32-byte digest, used as both a Merkle node hash and a channel state.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex_encode(&self.0))
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

const fn padded_tag(tag: &[u8]) -> [u8; 64] {
    let mut out = [0u8; 64];
    let mut i = 0;
    while i < tag.len() {
        out[i] = tag[i];
        i += 1;
    }
    out
}

const LEAF_TAG: [u8; 64] = padded_tag(b"leaf");
const NODE_TAG: [u8; 64] = padded_tag(b"node");

/// Capability a concrete hash function must expose to back the VCS, FRI,
/// and channel. Domain-separates leaf hashing (zero-padded 64-byte prefix)
/// from internal-node hashing (the two 32-byte children), per §4.C.
pub trait MerkleHasher: Clone {
    /// Hash a leaf: a tag distinguishing it from an internal node, plus the
    /// little-endian 4-byte limbs of every column value at that row.
    fn hash_leaf(column_values_le_bytes: &[u8]) -> Hash;

    /// Hash an internal node from its two children.
    fn hash_node(left: Hash, right: Hash) -> Hash;

    /// A fixed-output hash of an arbitrary byte string, used by the channel
    /// to mix raw data and by proof-of-work grinding.
    fn hash_bytes(bytes: &[u8]) -> Hash;
}

/// The concrete hasher this crate ships: Blake2s-256 with the leaf/node
/// domain separation tags spec'd in §4.C.
#[derive(Clone, Copy, Debug, Default)]
pub struct Blake2sMerkleHasher;

impl Blake2sMerkleHasher {
    /// Optimized path for exactly two 64-byte blocks — the common case of
    /// hashing a node's 64-byte leaf/node tag prefix plus its 64 bytes of
    /// children, in a single call. Not algorithmically different from the
    /// general path, just named per §6's external-interface note.
    pub fn hash_fixed_128(first: &[u8; 64], second: &[u8; 64]) -> Hash {
        let mut hasher = Blake2s256::new();
        hasher.update(first);
        hasher.update(second);
        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        Hash(out)
    }
}

impl MerkleHasher for Blake2sMerkleHasher {
    fn hash_leaf(column_values_le_bytes: &[u8]) -> Hash {
        let mut hasher = Blake2s256::new();
        hasher.update(LEAF_TAG);
        hasher.update(column_values_le_bytes);
        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        Hash(out)
    }

    fn hash_node(left: Hash, right: Hash) -> Hash {
        let mut hasher = Blake2s256::new();
        hasher.update(NODE_TAG);
        hasher.update(left.0);
        hasher.update(right.0);
        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        Hash(out)
    }

    fn hash_bytes(bytes: &[u8]) -> Hash {
        let mut hasher = Blake2s256::new();
        hasher.update(bytes);
        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        Hash(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_and_node_tags_differ() {
        let zero = Hash([0u8; 32]);
        let ff = Hash([0xffu8; 32]);
        let leaf_hash = Blake2sMerkleHasher::hash_leaf(&[1, 2, 3]);
        let node_hash = Blake2sMerkleHasher::hash_node(zero, ff);
        // hash_node([0s, 0xffs], [1,2,3]) has nothing to do with a leaf of
        // [1,2,3]; they must never collide given the tag prefix.
        assert_ne!(leaf_hash, node_hash);
        let _ = (zero, ff);
    }
}
