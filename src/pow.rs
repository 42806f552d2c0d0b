//! Proof-of-work grinding gate: the verifier checks that a prover-supplied
//! nonce hashes, together with the channel's state, to a digest with
//! enough leading zero bits. §4.C.

use crate::error::ProofOfWorkError;
use crate::hash::{Hash, MerkleHasher};

pub struct ProofOfWork;

impl ProofOfWork {
    fn digest<H: MerkleHasher>(challenge: Hash, nonce: u64) -> Hash {
        let mut bytes = Vec::with_capacity(40);
        bytes.extend_from_slice(&challenge.0);
        bytes.extend_from_slice(&nonce.to_le_bytes());
        H::hash_bytes(&bytes)
    }

    fn leading_zero_bits(hash: &Hash) -> u32 {
        let mut bits = 0;
        for byte in hash.0.iter() {
            if *byte == 0 {
                bits += 8;
            } else {
                bits += byte.leading_zeros();
                break;
            }
        }
        bits
    }

    /// Verify that `H(challenge || nonce_le_u64)` has at least `difficulty`
    /// leading zero bits.
    pub fn verify<H: MerkleHasher>(
        challenge: Hash,
        nonce: u64,
        difficulty: u32,
    ) -> Result<(), ProofOfWorkError> {
        let found = Self::leading_zero_bits(&Self::digest::<H>(challenge, nonce));
        if found >= difficulty {
            Ok(())
        } else {
            Err(ProofOfWorkError {
                found,
                required: difficulty,
            })
        }
    }

    /// Trial-and-error search for a nonce satisfying `difficulty`. Returns
    /// `None` only if `u64` is exhausted, which does not happen in practice
    /// for any difficulty this crate validates (`PcsConfig::pow_bits` is a
    /// `u32`, far below 64).
    pub fn solve<H: MerkleHasher>(challenge: Hash, difficulty: u32) -> Option<u64> {
        (0..u64::MAX).find(|&nonce| Self::verify::<H>(challenge, nonce, difficulty).is_ok())
    }
}
