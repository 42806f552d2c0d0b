//! FRI (Fast Reed-Solomon IOP of Proximity): layered folding of a circle
//! evaluation down to a line-domain polynomial, with Merkle-committed
//! intermediate layers so the verifier can spot-check low-degreeness.
//! §4.F.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::channel::Channel;
use crate::circle::Coset;
use crate::fields::m31::M31;
use crate::fields::qm31::QM31;
use crate::fields::{FieldExpOps, Zero};
use crate::hash::{Hash, MerkleHasher};
use crate::poly::circle::CircleDomain;
use crate::poly::line::{LineDomain, LinePoly};
use crate::queries::Queries;
use crate::vcs::verifier::{MerkleDecommitment, MerkleVerificationError, MerkleVerifier};

/// One fold step halves a line domain.
pub const FOLD_STEP: u32 = 1;
/// The first fold, from a circle domain down onto a line domain.
pub const CIRCLE_TO_LINE_FOLD_STEP: u32 = 1;

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum FriConfigError {
    #[error("log_last_layer_degree_bound must be in [0, 10]")]
    InvalidLastLayerDegreeBound,
    #[error("log_blowup_factor must be in [1, 16]")]
    InvalidBlowupFactor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriConfig {
    pub log_blowup_factor: u32,
    pub log_last_layer_degree_bound: u32,
    pub n_queries: usize,
}

impl FriConfig {
    pub fn new(
        log_last_layer_degree_bound: u32,
        log_blowup_factor: u32,
        n_queries: usize,
    ) -> Result<Self, FriConfigError> {
        if log_last_layer_degree_bound > 10 {
            return Err(FriConfigError::InvalidLastLayerDegreeBound);
        }
        if log_blowup_factor < 1 || log_blowup_factor > 16 {
            return Err(FriConfigError::InvalidBlowupFactor);
        }
        Ok(Self {
            log_blowup_factor,
            log_last_layer_degree_bound,
            n_queries,
        })
    }

    pub fn security_bits(&self) -> usize {
        self.log_blowup_factor as usize * self.n_queries
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FriVerificationError {
    #[error("invalid number of FRI layers")]
    InvalidNumFriLayers,
    #[error("first layer evaluations do not match their commitment")]
    FirstLayerEvaluationsInvalid,
    #[error("first layer commitment is invalid")]
    FirstLayerCommitmentInvalid,
    #[error("inner layer evaluations do not match their commitment")]
    InnerLayerEvaluationsInvalid,
    #[error("inner layer commitment is invalid")]
    InnerLayerCommitmentInvalid,
    #[error("last layer polynomial exceeds its degree bound")]
    LastLayerDegreeInvalid,
    #[error("last layer evaluations do not match the folded queries")]
    LastLayerEvaluationsInvalid,
}

/// The first FRI layer: a witness of secure-field values (the non-queried
/// half of every sampled circle-fold subset), its Merkle decommitment, and
/// the root of the tree committing to it (as four base-field columns, one
/// per `QM31` coordinate lane).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FriFirstLayerProof {
    pub fri_witness: Vec<QM31>,
    pub decommitment: MerkleDecommitment,
    pub commitment: Hash,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FriLayerProof {
    pub fri_witness: Vec<QM31>,
    pub decommitment: MerkleDecommitment,
    pub commitment: Hash,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FriProof {
    pub first_layer: FriFirstLayerProof,
    pub inner_layers: Vec<FriLayerProof>,
    pub last_layer_poly: LinePoly,
}

/// Standard inverse-FFT butterfly: `(v0 + v1, (v0 - v1) * itwid)`.
pub(crate) fn ibutterfly(v0: QM31, v1: QM31, itwid: QM31) -> (QM31, QM31) {
    (v0 + v1, (v0 - v1) * itwid)
}

/// Reverse the lowest `bits` bits of `x`.
pub(crate) fn bit_reverse(x: usize, bits: u32) -> usize {
    let mut x = x;
    let mut r = 0usize;
    for _ in 0..bits {
        r = (r << 1) | (x & 1);
        x >>= 1;
    }
    r
}

/// Fold one line-domain pair at absolute position `subset_start` (even) via
/// an inverse butterfly keyed on the domain point's inverse x-coordinate,
/// then `alpha`-combine the two halves. The shared building block for both
/// the dense `fold_line` and the verifier's sparse per-query folding.
fn line_fold_pair(domain: LineDomain, subset_start: usize, pair: (QM31, QM31), alpha: QM31) -> QM31 {
    let x = domain.at(bit_reverse(subset_start, domain.log_size()));
    let inv_x = QM31::from(x.inverse().expect("domain point coordinate is never zero for a canonical coset"));
    let (f0, f1) = ibutterfly(pair.0, pair.1, inv_x);
    f0 + alpha * f1
}

/// Fold one circle-domain pair at absolute position `subset_start` (even),
/// keyed on the domain point's inverse y-coordinate.
fn circle_fold_pair(domain: CircleDomain, subset_start: usize, pair: (QM31, QM31), alpha: QM31) -> QM31 {
    let p = domain.at(bit_reverse(subset_start, domain.log_size()));
    let itwid = QM31::from(p.y.inverse().expect("domain point coordinate is never zero for a canonical coset"));
    let (f0, f1) = ibutterfly(pair.0, pair.1, itwid);
    f0 + alpha * f1
}

/// Fold a line-domain evaluation by one step: `eval[2i], eval[2i+1]` combine
/// via an inverse butterfly keyed on the domain point's inverse x-coordinate,
/// then `alpha`-combine the two halves.
pub fn fold_line(eval: &[QM31], domain: LineDomain, alpha: QM31) -> Vec<QM31> {
    assert_eq!(eval.len(), domain.size());
    (0..eval.len() / 2)
        .map(|i| line_fold_pair(domain, 2 * i, (eval[2 * i], eval[2 * i + 1]), alpha))
        .collect()
}

/// Fold a circle-domain evaluation into (and accumulate onto) a line-domain
/// buffer. Multiple columns may be folded into the same `dst` by calling
/// this repeatedly with the same `alpha`: each call first scales the
/// existing accumulation by `alpha^2`, then adds its own folded values.
pub fn fold_circle_into_line(dst: &mut Vec<QM31>, src: &[QM31], src_domain: CircleDomain, alpha: QM31) {
    assert_eq!(src.len(), src_domain.size());
    let half = src.len() / 2;
    if dst.is_empty() {
        *dst = vec![QM31::zero(); half];
    }
    assert_eq!(dst.len(), half);
    let alpha_sq = alpha * alpha;
    for i in 0..half {
        let value = circle_fold_pair(src_domain, 2 * i, (src[2 * i], src[2 * i + 1]), alpha);
        dst[i] = dst[i] * alpha_sq + value;
    }
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum SparseEvalError {
    #[error("query_evals.len does not match queries.len")]
    ShapeMismatch,
    #[error("witness stream ran out before all positions were filled")]
    InsufficientWitness,
}

/// Rebuild, from a sparse set of queried evaluations plus a witness stream
/// of the non-queried neighbors, every full `2^fold_step`-sized subset a
/// query falls into, alongside the positions that make up the full
/// decommitment and each subset's bit-reversed domain start index. §4.F.
pub fn compute_decommitment_positions_and_rebuild_evals(
    queries: &[usize],
    query_evals: &[QM31],
    witness_evals: &[QM31],
    fold_step: u32,
    log_domain_size: u32,
) -> Result<(Vec<usize>, Vec<Vec<QM31>>, Vec<usize>), SparseEvalError> {
    if queries.len() != query_evals.len() {
        return Err(SparseEvalError::ShapeMismatch);
    }
    let subset_size = 1usize << fold_step;
    let mut decommitment_positions = Vec::new();
    let mut subset_evals = Vec::new();
    let mut subset_domain_initial_indexes = Vec::new();

    let mut q_idx = 0;
    let mut w_idx = 0;
    let mut i = 0;
    while i < queries.len() {
        let subset_start = (queries[i] >> fold_step) << fold_step;
        let mut subset = Vec::with_capacity(subset_size);
        for pos in subset_start..subset_start + subset_size {
            decommitment_positions.push(pos);
            if q_idx < queries.len() && queries[q_idx] == pos {
                subset.push(query_evals[q_idx]);
                q_idx += 1;
            } else {
                let v = witness_evals
                    .get(w_idx)
                    .copied()
                    .ok_or(SparseEvalError::InsufficientWitness)?;
                w_idx += 1;
                subset.push(v);
            }
        }
        subset_domain_initial_indexes.push(bit_reverse(subset_start, log_domain_size));
        subset_evals.push(subset);
        while i < queries.len() && (queries[i] >> fold_step) << fold_step == subset_start {
            i += 1;
        }
    }
    Ok((decommitment_positions, subset_evals, subset_domain_initial_indexes))
}

struct InnerLayerVerifier {
    domain: LineDomain,
    alpha: QM31,
    commitment: Hash,
}

/// Verifies that a `FriProof` attests a quotient evaluation is close to a
/// low-degree polynomial, given the claimed degree bound of the column the
/// quotient was built from.
pub struct FriVerifier<H> {
    config: FriConfig,
    first_layer_domain: CircleDomain,
    first_layer_commitment: Hash,
    first_alpha: QM31,
    inner_layers: Vec<InnerLayerVerifier>,
    last_layer_domain: LineDomain,
    last_layer_poly: LinePoly,
    queries: Option<Queries>,
    _hasher: std::marker::PhantomData<H>,
}

impl<H: MerkleHasher> FriVerifier<H> {
    #[instrument(skip_all)]
    pub fn commit(
        channel: &mut Channel<H>,
        config: FriConfig,
        proof: &FriProof,
        column_bound: u32,
    ) -> Result<Self, FriVerificationError> {
        channel.mix_root(proof.first_layer.commitment);
        let first_alpha = channel.draw_secure_felt();

        let first_layer_log_size = column_bound + config.log_blowup_factor;
        let first_layer_domain = CircleDomain::new(Coset::half_odds(first_layer_log_size - 1));

        let mut layer_bound = column_bound
            .checked_sub(CIRCLE_TO_LINE_FOLD_STEP)
            .ok_or(FriVerificationError::InvalidNumFriLayers)?;
        let mut current_domain = first_layer_domain.line_domain();

        let mut inner_layers = Vec::with_capacity(proof.inner_layers.len());
        for layer_proof in &proof.inner_layers {
            channel.mix_root(layer_proof.commitment);
            let alpha = channel.draw_secure_felt();
            inner_layers.push(InnerLayerVerifier {
                domain: current_domain,
                alpha,
                commitment: layer_proof.commitment,
            });
            layer_bound = layer_bound
                .checked_sub(FOLD_STEP)
                .ok_or(FriVerificationError::InvalidNumFriLayers)?;
            current_domain = current_domain.double();
        }

        if layer_bound != config.log_last_layer_degree_bound {
            return Err(FriVerificationError::InvalidNumFriLayers);
        }
        if proof.last_layer_poly.len() > (1usize << config.log_last_layer_degree_bound) {
            return Err(FriVerificationError::LastLayerDegreeInvalid);
        }
        channel.mix_felts(&proof.last_layer_poly.coeffs);

        Ok(Self {
            config,
            first_layer_domain,
            first_layer_commitment: proof.first_layer.commitment,
            first_alpha,
            inner_layers,
            last_layer_domain: current_domain,
            last_layer_poly: proof.last_layer_poly.clone(),
            queries: None,
            _hasher: std::marker::PhantomData,
        })
    }

    pub fn sample_query_positions(&mut self, channel: &mut Channel<H>) -> Queries {
        let queries = Queries::draw(channel, self.first_layer_domain.log_size(), self.config.n_queries);
        self.queries = Some(queries.clone());
        queries
    }

    #[instrument(skip_all)]
    pub fn decommit(
        &self,
        proof: &FriProof,
        first_layer_query_evals: &[QM31],
    ) -> Result<(), FriVerificationError> {
        let queries = self
            .queries
            .as_ref()
            .expect("sample_query_positions must be called before decommit");

        let (positions, subsets, _) = compute_decommitment_positions_and_rebuild_evals(
            &queries.positions,
            first_layer_query_evals,
            &proof.first_layer.fri_witness,
            CIRCLE_TO_LINE_FOLD_STEP,
            self.first_layer_domain.log_size(),
        )
        .map_err(|_| FriVerificationError::FirstLayerEvaluationsInvalid)?;

        let flat: Vec<QM31> = subsets.iter().flatten().copied().collect();
        let lane_columns: Vec<Vec<M31>> = (0..4)
            .map(|lane| flat.iter().map(|e| e.to_m31_array()[lane]).collect())
            .collect();
        let first_layer_verifier = MerkleVerifier::<H>::new(
            self.first_layer_commitment,
            vec![self.first_layer_domain.log_size(); 4],
        );
        first_layer_verifier
            .verify(&positions, &lane_columns, &proof.first_layer.decommitment)
            .map_err(|e| match e {
                MerkleVerificationError::RootMismatch => FriVerificationError::FirstLayerCommitmentInvalid,
                _ => FriVerificationError::FirstLayerEvaluationsInvalid,
            })?;

        // Each reconstructed subset is `subset_size = 2` consecutive
        // positions, so `positions[2*g]` is group `g`'s (even) start.
        let mut evals: Vec<QM31> = subsets
            .iter()
            .enumerate()
            .map(|(g, subset)| {
                circle_fold_pair(
                    self.first_layer_domain,
                    positions[2 * g],
                    (subset[0], subset[1]),
                    self.first_alpha,
                )
            })
            .collect();
        let mut queries = queries.fold(CIRCLE_TO_LINE_FOLD_STEP);

        for (layer, layer_proof) in self.inner_layers.iter().zip(&proof.inner_layers) {
            let (positions, subsets, _) = compute_decommitment_positions_and_rebuild_evals(
                &queries.positions,
                &evals,
                &layer_proof.fri_witness,
                FOLD_STEP,
                layer.domain.log_size(),
            )
            .map_err(|_| FriVerificationError::InnerLayerEvaluationsInvalid)?;

            let flat: Vec<QM31> = subsets.iter().flatten().copied().collect();
            let lane_columns: Vec<Vec<M31>> = (0..4)
                .map(|lane| flat.iter().map(|e| e.to_m31_array()[lane]).collect())
                .collect();
            let layer_verifier =
                MerkleVerifier::<H>::new(layer.commitment, vec![layer.domain.log_size(); 4]);
            layer_verifier
                .verify(&positions, &lane_columns, &layer_proof.decommitment)
                .map_err(|e| match e {
                    MerkleVerificationError::RootMismatch => {
                        FriVerificationError::InnerLayerCommitmentInvalid
                    }
                    _ => FriVerificationError::InnerLayerEvaluationsInvalid,
                })?;

            evals = subsets
                .iter()
                .enumerate()
                .map(|(g, subset)| {
                    line_fold_pair(layer.domain, positions[2 * g], (subset[0], subset[1]), layer.alpha)
                })
                .collect();
            queries = queries.fold(FOLD_STEP);
        }

        for (i, &q) in queries.positions.iter().enumerate() {
            let x = self
                .last_layer_domain
                .at(bit_reverse(q, self.last_layer_domain.log_size()));
            let expected = self.last_layer_poly.eval_at_point(QM31::from(x));
            if expected != evals[i] {
                return Err(FriVerificationError::LastLayerEvaluationsInvalid);
            }
        }

        Ok(())
    }
}
