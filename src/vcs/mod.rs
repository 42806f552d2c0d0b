//! Mixed-degree Merkle vector commitment scheme. §4.D.
//!
//! Columns of differing log-sizes attach to the tree at the layer matching
//! their own size; a query decommitment carries two witness streams
//! (sibling hashes, and column values the verifier didn't already see) that
//! let the verifier walk the tree bottom-up and recompute the root.

pub mod prover;
pub mod verifier;

pub use prover::MerkleProver;
pub use verifier::{MerkleDecommitment, MerkleVerificationError, MerkleVerifier};

use crate::fields::m31::M31;
use crate::hash::{Hash, MerkleHasher};

/// Encode a row of column values (one per column attached at this node) as
/// little-endian 4-byte limbs, the format `hash_leaf` consumes.
pub(crate) fn encode_row_le(values: &[M31]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for v in values {
        bytes.extend_from_slice(&v.to_bytes_le());
    }
    bytes
}

/// Combine a node's two children with the column values newly attached at
/// this layer (if any): `hash_node(left, right)` when no columns attach,
/// or a leaf-style hash over `(left, right, row)` when they do. Mixed-degree
/// trees need this combinator because a node can simultaneously be an
/// internal node (it has children) and a leaf (columns of exactly this
/// tree's log-size attach here).
pub(crate) fn hash_layer_node<H: MerkleHasher>(
    children: Option<(Hash, Hash)>,
    row_values: &[M31],
) -> Hash {
    match children {
        None => H::hash_leaf(&encode_row_le(row_values)),
        Some((left, right)) if row_values.is_empty() => H::hash_node(left, right),
        Some((left, right)) => {
            // Domain-separate: hash the children first (node tag), then
            // fold in this layer's column values as an extra leaf-style
            // absorption so a node with attached columns can never collide
            // with a plain internal node or a plain leaf.
            let node_hash = H::hash_node(left, right);
            let mut bytes = Vec::with_capacity(32 + row_values.len() * 4);
            bytes.extend_from_slice(node_hash.as_bytes());
            bytes.extend_from_slice(&encode_row_le(row_values));
            H::hash_leaf(&bytes)
        }
    }
}
