//! The top-level verifier driver: channel, commitment scheme, and AIR
//! components wired into the one entry point a caller actually calls. §4.H.

use tracing::instrument;

use crate::air::{Components, PREPROCESSED_TRACE_IDX};
use crate::channel::Channel;
use crate::circle::CirclePointQM31;
use crate::error::{InvalidStructureError, VerificationError};
use crate::fields::cm31::CM31;
use crate::fields::m31::M31;
use crate::fields::qm31::QM31;
use crate::fields::{FieldExpOps, One, Zero};
use crate::hash::MerkleHasher;
use crate::pcs::{CommitmentSchemeVerifier, COMPOSITION_LOG_SPLIT, SECURE_EXTENSION_DEGREE};
use crate::proof::StarkProof;

/// Reconstruct a `QM31` value from the four base-field "lane" evaluations
/// of its canonical decomposition, generalizing `QM31::from_m31_array` to
/// lanes that are themselves out-of-domain `QM31` samples (the lane
/// decomposition is `QM31`-linear, so the same basis combination that
/// recombines base-field lanes recombines extension-field ones).
fn qm31_from_lanes(lanes: [QM31; 4]) -> QM31 {
    let i = QM31::from_cm31(CM31::from_m31(M31::zero(), M31::one()), CM31::zero());
    let u = QM31::from_cm31(CM31::zero(), CM31::one());
    let iu = QM31::from_cm31(CM31::zero(), CM31::from_m31(M31::zero(), M31::one()));
    lanes[0] + lanes[1] * i + lanes[2] * u + lanes[3] * iu
}

/// Reconstruct the composition polynomial's claimed out-of-domain evaluation
/// from its `2^COMPOSITION_LOG_SPLIT * SECURE_EXTENSION_DEGREE` committed
/// columns: recombine each split's four lanes into one `QM31`, then Horner
/// over the splits keyed on the OODS point's y-coordinate. §4.H step 6.
fn composition_value_from_columns(columns: &[Vec<QM31>], oods_point: CirclePointQM31) -> QM31 {
    let n_splits = 1usize << COMPOSITION_LOG_SPLIT;
    let degree = SECURE_EXTENSION_DEGREE as usize;
    let splits: Vec<QM31> = (0..n_splits)
        .map(|s| {
            let lanes = [
                columns[s * degree][0],
                columns[s * degree + 1][0],
                columns[s * degree + 2][0],
                columns[s * degree + 3][0],
            ];
            qm31_from_lanes(lanes)
        })
        .collect();
    let mut value = splits[n_splits - 1];
    for &split in splits[..n_splits - 1].iter().rev() {
        value = value * oods_point.y + split;
    }
    value
}

/// Verify a `StarkProof` against a set of AIR components.
///
/// `commitment_scheme` arrives empty; every committed tree the proof names
/// (preprocessed, main, ..., composition) is committed here, in order, so
/// the channel absorbs roots in exactly the sequence the prover mixed them.
#[instrument(skip_all)]
pub fn verify<H: MerkleHasher>(
    components: &Components,
    channel: &mut Channel<H>,
    commitment_scheme: &mut CommitmentSchemeVerifier<H>,
    proof: &StarkProof,
) -> Result<(), VerificationError> {
    let pcs_proof = &proof.commitment_scheme_proof;

    if pcs_proof.commitments.is_empty() {
        return Err(InvalidStructureError::MissingCommitment.into());
    }

    let column_log_sizes = components.column_log_sizes()?;
    let n_trees = pcs_proof.commitments.len();
    if column_log_sizes.len() != n_trees - 1 {
        return Err(InvalidStructureError::InvalidProofShape(
            "number of non-composition commitments does not match the components' tree count".into(),
        )
        .into());
    }
    for (&commitment, sizes) in pcs_proof.commitments[..n_trees - 1].iter().zip(&column_log_sizes) {
        commitment_scheme.commit(commitment, sizes.clone(), channel);
    }

    if commitment_scheme.trees.len() <= PREPROCESSED_TRACE_IDX {
        return Err(InvalidStructureError::MissingPreprocessedTrace.into());
    }

    // 2. Draw random_coeff (α).
    let random_coeff = channel.draw_secure_felt();

    // 3. Commit the composition tree: the last commitment, with
    // `2 * SECURE_EXTENSION_DEGREE` equal-size columns.
    let log_blowup = pcs_proof.config.fri_config.log_blowup_factor;
    let composition_log_size = components.composition_log_degree_bound() + log_blowup;
    let n_composition_columns = (1usize << COMPOSITION_LOG_SPLIT) * SECURE_EXTENSION_DEGREE as usize;
    let composition_column_log_size = composition_log_size.saturating_sub(COMPOSITION_LOG_SPLIT);
    let last_commitment = pcs_proof.commitments[n_trees - 1];
    commitment_scheme.commit(
        last_commitment,
        vec![composition_column_log_size; n_composition_columns],
        channel,
    );

    // 4. Draw oods_point; require composition_log_size > COMPOSITION_LOG_SPLIT.
    // A single secure-field challenge `t` is mapped onto the circle via the
    // standard stereographic parametrization `x = (1-t^2)/(1+t^2)`,
    // `y = 2t/(1+t^2)`, so the point genuinely satisfies `x^2+y^2=1` over
    // `QM31` (an arbitrary `(x, y)` pair would not).
    let oods_point = {
        let t = channel.draw_secure_felt();
        let one_plus_t_squared_inv = (t * t + QM31::one()).inverse()?;
        let x = (QM31::one() - t * t) * one_plus_t_squared_inv;
        let y = (t + t) * one_plus_t_squared_inv;
        CirclePointQM31 { x, y }
    };
    if composition_log_size <= COMPOSITION_LOG_SPLIT {
        return Err(InvalidStructureError::CompositionLogSizeTooSmall {
            log_size: composition_log_size,
            split: COMPOSITION_LOG_SPLIT,
        }
        .into());
    }

    // 5. Build sample_points from components, then append the composition
    // tree's trivial one-point-per-column mask.
    let mut sample_points = components.mask_points(oods_point, false);
    sample_points.push(vec![vec![oods_point]; n_composition_columns]);

    if pcs_proof.sampled_values.len() != sample_points.len() {
        return Err(
            InvalidStructureError::InvalidProofShape("sampled_values tree axis length mismatch".into())
                .into(),
        );
    }

    // 6. Extract the claimed composition OODS eval from the composition
    // tree's sampled columns.
    let composition_columns = &pcs_proof.sampled_values[n_trees - 1];
    let reconstructed = composition_value_from_columns(composition_columns, oods_point);

    // 7. Verify equality against the components' own evaluation.
    let component_sampled_values = pcs_proof.sampled_values[..n_trees - 1].to_vec();
    let expected = components.eval_composition_polynomial_at_point(
        oods_point,
        &component_sampled_values,
        random_coeff,
    );
    if expected != reconstructed {
        return Err(VerificationError::OodsNotMatching);
    }

    // 8. Verify every sampled value against the committed trees.
    commitment_scheme.verify_values(&sample_points, random_coeff, pcs_proof, channel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::m31::M31;

    fn qm(x: u64) -> QM31 {
        QM31::from(M31::from_u64(x))
    }

    #[test]
    fn lane_reconstruction_agrees_with_from_m31_array_on_base_field_lanes() {
        let a = M31::from_u64(3);
        let b = M31::from_u64(5);
        let c = M31::from_u64(7);
        let d = M31::from_u64(11);
        let expected = QM31::from_m31(a, b, c, d);
        let lanes = [QM31::from(a), QM31::from(b), QM31::from(c), QM31::from(d)];
        assert_eq!(qm31_from_lanes(lanes), expected);
    }

    #[test]
    fn composition_reconstruction_matches_hand_computed_horner() {
        use crate::circle::M31_CIRCLE_GEN;

        let point = M31_CIRCLE_GEN.mul(9).into_ef();
        let split0 = QM31::from_m31(
            M31::from_u64(1),
            M31::from_u64(2),
            M31::from_u64(3),
            M31::from_u64(4),
        );
        let split1 = QM31::from_m31(
            M31::from_u64(5),
            M31::from_u64(6),
            M31::from_u64(7),
            M31::from_u64(8),
        );
        let columns: Vec<Vec<QM31>> = [split0, split1]
            .iter()
            .flat_map(|s| s.to_m31_array().map(|lane| vec![QM31::from(lane)]))
            .collect();

        let result = composition_value_from_columns(&columns, point);
        let expected = split0 + split1 * point.y;
        assert_eq!(result, expected);
    }

    #[test]
    fn empty_commitments_is_rejected() {
        use crate::air::Components;
        use crate::hash::Blake2sMerkleHasher;
        use crate::pcs::{CommitmentSchemeProof, PcsConfig};
        use crate::fri::{FriConfig, FriFirstLayerProof, FriProof};
        use crate::poly::line::LinePoly;
        use crate::vcs::verifier::MerkleDecommitment;

        let components = Components { components: vec![], n_preprocessed_columns: 0 };
        let mut channel = Channel::<Blake2sMerkleHasher>::default();
        let mut scheme = CommitmentSchemeVerifier::<Blake2sMerkleHasher>::new();
        let proof = StarkProof {
            commitment_scheme_proof: CommitmentSchemeProof {
                commitments: vec![],
                config: PcsConfig {
                    pow_bits: 0,
                    fri_config: FriConfig::new(0, 1, 1).unwrap(),
                },
                sampled_values: vec![],
                decommitments: vec![],
                queried_values: vec![],
                proof_of_work: 0,
                fri_proof: FriProof {
                    first_layer: FriFirstLayerProof {
                        fri_witness: vec![],
                        decommitment: MerkleDecommitment::default(),
                        commitment: crate::hash::Hash::default(),
                    },
                    inner_layers: vec![],
                    last_layer_poly: LinePoly::new(vec![qm(0)]),
                },
            },
        };

        let err = verify(&components, &mut channel, &mut scheme, &proof).unwrap_err();
        assert!(matches!(
            err,
            VerificationError::InvalidStructure(InvalidStructureError::MissingCommitment)
        ));
    }
}
