//! The Fiat-Shamir transcript. §4.C.
//!
//! Holds a 32-byte digest plus a draw counter; mixing updates the digest,
//! drawing only advances the counter (so repeated draws without an
//! intervening mix are independent, deterministic derivations of `(digest,
//! counter)`).

use std::marker::PhantomData;

use crate::fields::m31::M31;
use crate::fields::qm31::QM31;
use crate::hash::{Hash, MerkleHasher};

/// Capability a channel must expose to the VCS: absorbing a Merkle root.
/// Kept as its own trait (rather than folding into `Channel` directly) so
/// the VCS/FRI/PCS code is generic over which channel mixes a root however
/// it likes (§9's "generic hasher / channel" note).
pub trait MerkleChannel {
    fn mix_root(&mut self, root: Hash);
}

/// A channel parameterized by the hasher it mixes with. `H` is typically
/// the same hasher backing the Merkle tree being committed to, so a single
/// concrete pair (e.g. `Blake2sMerkleHasher` + `Channel<Blake2sMerkleHasher>`)
/// is instantiated at the top level.
#[derive(Clone, Debug)]
pub struct Channel<H> {
    digest: Hash,
    draw_counter: u64,
    _hasher: PhantomData<H>,
}

impl<H: MerkleHasher> Default for Channel<H> {
    fn default() -> Self {
        Self::new(Hash::default())
    }
}

impl<H: MerkleHasher> Channel<H> {
    pub fn new(digest: Hash) -> Self {
        Self {
            digest,
            draw_counter: 0,
            _hasher: PhantomData,
        }
    }

    pub fn digest(&self) -> Hash {
        self.digest
    }

    pub fn draw_counter(&self) -> u64 {
        self.draw_counter
    }

    fn mix_bytes(&mut self, bytes: &[u8]) {
        let mut buf = Vec::with_capacity(32 + bytes.len());
        buf.extend_from_slice(&self.digest.0);
        buf.extend_from_slice(bytes);
        self.digest = H::hash_bytes(&buf);
        self.draw_counter = 0;
    }

    pub fn mix_root(&mut self, root: Hash) {
        self.mix_bytes(&root.0);
    }

    pub fn mix_felts(&mut self, felts: &[QM31]) {
        let mut bytes = Vec::with_capacity(felts.len() * 16);
        for felt in felts {
            for limb in felt.to_m31_array() {
                bytes.extend_from_slice(&limb.to_bytes_le());
            }
        }
        self.mix_bytes(&bytes);
    }

    pub fn mix_u32s(&mut self, words: &[u32]) {
        let mut bytes = Vec::with_capacity(words.len() * 4);
        for word in words {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        self.mix_bytes(&bytes);
    }

    pub fn mix_u64(&mut self, value: u64) {
        self.mix_bytes(&value.to_le_bytes());
    }

    /// Derive 8 fresh u32 words from `(digest, draw_counter)` without
    /// touching `digest`.
    pub fn draw_u32s(&mut self) -> [u32; 8] {
        let mut buf = Vec::with_capacity(40);
        buf.extend_from_slice(&self.digest.0);
        buf.extend_from_slice(&self.draw_counter.to_le_bytes());
        let digest = H::hash_bytes(&buf);
        self.draw_counter += 1;

        let mut words = [0u32; 8];
        for (i, word) in words.iter_mut().enumerate() {
            let mut b = [0u8; 4];
            b.copy_from_slice(&digest.0[i * 4..i * 4 + 4]);
            *word = u32::from_le_bytes(b);
        }
        words
    }

    /// Draw one secure-field (`QM31`) challenge: 4 words, each reduced
    /// into `M31`.
    pub fn draw_secure_felt(&mut self) -> QM31 {
        let words = self.draw_u32s();
        QM31::from_m31_array([
            M31::from_u64(words[0] as u64),
            M31::from_u64(words[1] as u64),
            M31::from_u64(words[2] as u64),
            M31::from_u64(words[3] as u64),
        ])
    }

    pub fn draw_secure_felts(&mut self, n: usize) -> Vec<QM31> {
        (0..n).map(|_| self.draw_secure_felt()).collect()
    }

    /// Draw `n` raw query words by concatenating successive `draw_u32s()`
    /// calls, as used by `crate::queries::draw`.
    pub(crate) fn draw_query_words(&mut self, n: usize) -> Vec<u32> {
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            out.extend_from_slice(&self.draw_u32s());
        }
        out.truncate(n);
        out
    }
}

impl<H: MerkleHasher> MerkleChannel for Channel<H> {
    fn mix_root(&mut self, root: Hash) {
        Channel::mix_root(self, root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Blake2sMerkleHasher;

    type TestChannel = Channel<Blake2sMerkleHasher>;

    #[test]
    fn deterministic_across_two_instances() {
        let mut a = TestChannel::default();
        let mut b = TestChannel::default();
        a.mix_u64(42);
        b.mix_u64(42);
        assert_eq!(a.draw_secure_felt(), b.draw_secure_felt());
        assert_eq!(a.draw_u32s(), b.draw_u32s());
    }

    #[test]
    fn draw_does_not_mutate_digest() {
        let mut c = TestChannel::default();
        c.mix_u64(7);
        let digest_before = c.digest();
        let _ = c.draw_u32s();
        assert_eq!(c.digest(), digest_before);
        assert_eq!(c.draw_counter(), 1);
    }

    #[test]
    fn mixing_resets_draw_counter() {
        let mut c = TestChannel::default();
        c.mix_u64(1);
        let _ = c.draw_u32s();
        let _ = c.draw_u32s();
        assert_eq!(c.draw_counter(), 2);
        c.mix_u64(2);
        assert_eq!(c.draw_counter(), 0);
    }
}
