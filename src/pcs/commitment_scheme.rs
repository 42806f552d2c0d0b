//! The verifier's view of every committed tree, and the orchestration that
//! turns sampled values plus a `CommitmentSchemeProof` into a pass/fail
//! verdict: Merkle decommitment, per-row quotient construction, and the
//! FRI low-degree check. §4.G, §4.H step 8.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::air::{ColumnVec, TreeVec};
use crate::channel::Channel;
use crate::circle::{CirclePointQM31, Coset};
use crate::error::VerificationError;
use crate::fields::m31::M31;
use crate::fields::qm31::QM31;
use crate::fri::{FriConfig, FriProof, FriVerifier};
use crate::hash::{Hash, MerkleHasher};
use crate::pcs::quotients::{fri_answers, ColumnSampleBatch};
use crate::pcs::PcsConfig;
use crate::poly::circle::CircleDomain;
use crate::pow::ProofOfWork;
use crate::vcs::verifier::{MerkleDecommitment, MerkleVerifier};

/// Everything the prover sends beyond the roots already mixed by
/// [`CommitmentSchemeVerifier::commit`]: the PCS/FRI half of `StarkProof`.
/// §6.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommitmentSchemeProof {
    pub commitments: TreeVec<Hash>,
    pub config: PcsConfig,
    pub sampled_values: TreeVec<ColumnVec<Vec<QM31>>>,
    pub decommitments: TreeVec<MerkleDecommitment>,
    pub queried_values: TreeVec<ColumnVec<Vec<M31>>>,
    pub proof_of_work: u64,
    pub fri_proof: FriProof,
}

/// An ordered list of committed trees (preprocessed, main, composition, in
/// commit order), plus the orchestration to check sampled values against
/// them. §4.G.
pub struct CommitmentSchemeVerifier<H> {
    pub trees: Vec<MerkleVerifier<H>>,
}

impl<H: MerkleHasher> CommitmentSchemeVerifier<H> {
    pub fn new() -> Self {
        Self { trees: Vec::new() }
    }

    /// Mix `root` into the channel and instantiate a verifier for it with
    /// the declared column log-sizes.
    #[instrument(skip_all)]
    pub fn commit(&mut self, root: Hash, column_log_sizes: Vec<u32>, channel: &mut Channel<H>) {
        channel.mix_root(root);
        self.trees.push(MerkleVerifier::new(root, column_log_sizes));
    }

    fn max_column_log_size(&self) -> u32 {
        self.trees
            .iter()
            .map(MerkleVerifier::max_log_size)
            .max()
            .expect("at least one committed tree")
    }

    /// Verify every sampled value against the committed trees: Merkle
    /// decommitment per tree, the PCS quotient construction combining every
    /// tree's queried rows, and finally the FRI low-degree check on the
    /// resulting quotient sequence.
    #[instrument(skip_all)]
    pub fn verify_values(
        &self,
        sample_points: &TreeVec<ColumnVec<Vec<CirclePointQM31>>>,
        random_coeff: QM31,
        proof: &CommitmentSchemeProof,
        channel: &mut Channel<H>,
    ) -> Result<(), VerificationError> {
        channel.mix_felts(&proof.sampled_values.iter().flatten().flatten().copied().collect::<Vec<_>>());

        // Every committed tree's columns are already evaluations over their
        // own (blown-up) domain, so the widest tree's leaf count already
        // equals the first FRI layer's domain size. `FriVerifier::commit`
        // wants the *unblown* degree bound, so strip the blowup back off
        // before handing it over.
        let first_layer_log_size = self.max_column_log_size();
        let column_bound = first_layer_log_size - proof.config.fri_config.log_blowup_factor;
        let mut fri_verifier =
            FriVerifier::<H>::commit(channel, proof.config.fri_config, &proof.fri_proof, column_bound)?;

        let pow_challenge = channel.digest();
        ProofOfWork::verify::<H>(pow_challenge, proof.proof_of_work, proof.config.pow_bits)?;
        channel.mix_u64(proof.proof_of_work);

        let queries = fri_verifier.sample_query_positions(channel);
        let eval_domain = CircleDomain::new(Coset::half_odds(first_layer_log_size - 1));

        // Per tree: the query positions folded down to that tree's own
        // log-size, and a lookup from a folded position back to its index
        // in that folded (sorted, deduped) list.
        let mut tree_queries = Vec::with_capacity(self.trees.len());
        let mut tree_position_index = Vec::with_capacity(self.trees.len());
        for tree in &self.trees {
            let diff = first_layer_log_size - tree.max_log_size();
            let folded = queries.fold(diff);
            let index: BTreeMap<usize, usize> = folded
                .positions
                .iter()
                .enumerate()
                .map(|(i, &p)| (p, i))
                .collect();
            tree_queries.push(folded);
            tree_position_index.push(index);
        }

        for (i, tree) in self.trees.iter().enumerate() {
            tree.verify(
                &tree_queries[i].positions,
                &proof.queried_values[i],
                &proof.decommitments[i],
            )?;
        }

        // Flatten every tree's (point, value) samples into one global
        // column-indexed list, keeping a side table back to the owning
        // tree/column so row quotients can read the right queried value.
        let mut samples: Vec<(CirclePointQM31, usize, QM31)> = Vec::new();
        let mut owners: Vec<(usize, usize)> = Vec::new();
        for (tree_idx, (tree_points, tree_values)) in
            sample_points.iter().zip(proof.sampled_values.iter()).enumerate()
        {
            for (col_idx, (col_points, col_values)) in
                tree_points.iter().zip(tree_values.iter()).enumerate()
            {
                let global_idx = owners.len();
                owners.push((tree_idx, col_idx));
                for (&point, &value) in col_points.iter().zip(col_values.iter()) {
                    samples.push((point, global_idx, value));
                }
            }
        }
        let batches = ColumnSampleBatch::group_by_point(&samples);

        let domain_points: Vec<_> = queries.positions.iter().map(|&p| eval_domain.at(p)).collect();
        let total_samples: usize = batches.iter().map(|b| b.columns.len()).sum();
        let alpha_powers: Vec<QM31> = {
            let mut powers = Vec::with_capacity(total_samples);
            let mut power = random_coeff;
            for _ in 0..total_samples {
                powers.push(power);
                power = power * random_coeff;
            }
            powers
        };

        let answers = fri_answers(&batches, &domain_points, &alpha_powers, |row, global_idx| {
            let (tree_idx, col_idx) = owners[global_idx];
            let large_position = queries.positions[row];
            let diff = first_layer_log_size - self.trees[tree_idx].max_log_size();
            let folded_position = large_position >> diff;
            let local_row = tree_position_index[tree_idx][&folded_position];
            proof.queried_values[tree_idx][col_idx][local_row]
        })?;

        fri_verifier.decommit(&proof.fri_proof, &answers)?;
        Ok(())
    }
}

impl<H: MerkleHasher> Default for CommitmentSchemeVerifier<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Blake2sMerkleHasher;
    use crate::vcs::prover::MerkleProver;

    type TestChannel = Channel<Blake2sMerkleHasher>;

    fn col(log_size: u32, seed: u32) -> Vec<M31> {
        (0..1u32 << log_size)
            .map(|i| M31::from_u64((seed.wrapping_mul(7919).wrapping_add(i)) as u64))
            .collect()
    }

    #[test]
    fn commit_mixes_the_root_and_remembers_the_tree_shape() {
        let prover = MerkleProver::<Blake2sMerkleHasher>::commit(vec![col(3, 1), col(2, 2)]);
        let mut channel = TestChannel::default();
        let digest_before = channel.digest();

        let mut scheme = CommitmentSchemeVerifier::<Blake2sMerkleHasher>::new();
        scheme.commit(prover.root(), prover.column_log_sizes().to_vec(), &mut channel);

        assert_eq!(scheme.trees.len(), 1);
        assert_eq!(scheme.trees[0].root(), prover.root());
        assert_eq!(scheme.trees[0].column_log_sizes(), prover.column_log_sizes());
        assert_ne!(channel.digest(), digest_before);
    }

    #[test]
    fn max_column_log_size_is_the_largest_across_every_committed_tree() {
        let small = MerkleProver::<Blake2sMerkleHasher>::commit(vec![col(2, 1)]);
        let large = MerkleProver::<Blake2sMerkleHasher>::commit(vec![col(5, 2), col(4, 3)]);
        let mut channel = TestChannel::default();

        let mut scheme = CommitmentSchemeVerifier::<Blake2sMerkleHasher>::new();
        scheme.commit(small.root(), small.column_log_sizes().to_vec(), &mut channel);
        scheme.commit(large.root(), large.column_log_sizes().to_vec(), &mut channel);

        assert_eq!(scheme.max_column_log_size(), 5);
    }

    #[test]
    fn committing_two_trees_mixes_two_distinct_roots() {
        let a = MerkleProver::<Blake2sMerkleHasher>::commit(vec![col(3, 10)]);
        let b = MerkleProver::<Blake2sMerkleHasher>::commit(vec![col(3, 20)]);
        let mut channel_both = TestChannel::default();
        let mut channel_a_only = TestChannel::default();

        let mut scheme = CommitmentSchemeVerifier::<Blake2sMerkleHasher>::new();
        scheme.commit(a.root(), a.column_log_sizes().to_vec(), &mut channel_both);
        scheme.commit(b.root(), b.column_log_sizes().to_vec(), &mut channel_both);
        channel_a_only.mix_root(a.root());

        assert_ne!(channel_both.digest(), channel_a_only.digest());
    }
}

