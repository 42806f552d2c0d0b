//! AIR component interface: the capability bundle every constraint system
//! implements so the verifier driver can evaluate its constraints at an
//! out-of-domain point without knowing anything about the computation being
//! proven. §3, §4.E, §9 ("dynamic dispatch on components").
//!
//! Concrete components (Blake, Plonk, Poseidon, Fibonacci, ...) are
//! consumers of this interface; this crate specifies only the interface and
//! its composition, not any example circuit.

pub mod accumulator;

use crate::air::accumulator::PointEvaluationAccumulator;
use crate::circle::CirclePointQM31;
use crate::error::InvalidStructureError;
use crate::fields::qm31::QM31;

/// Columns belonging to one tree, in component-declaration order.
pub type ColumnVec<T> = Vec<T>;

/// One entry per committed tree: preprocessed, main, composition.
pub type TreeVec<T> = Vec<T>;

pub const PREPROCESSED_TRACE_IDX: usize = 0;

/// The six verifier-facing capabilities every AIR component exposes.
pub trait Component {
    fn n_constraints(&self) -> usize;

    fn max_constraint_log_degree_bound(&self) -> u32;

    /// Log-size of every column this component reads, one `ColumnVec` per
    /// tree the component touches.
    fn trace_log_degree_bounds(&self) -> TreeVec<ColumnVec<u32>>;

    /// For each tree, for each column, the list of mask points this
    /// component samples, anchored at `point` and shifted per the
    /// component's own mask offsets.
    fn mask_points(&self, point: CirclePointQM31) -> TreeVec<ColumnVec<Vec<CirclePointQM31>>>;

    /// Indices, into the global preprocessed-column list, that this
    /// component reads from the preprocessed trace.
    fn preprocessed_column_indices(&self) -> Vec<usize>;

    /// Evaluate every constraint-quotient of this component at `point`,
    /// given the mask values sampled there, folding each into
    /// `evaluation_accumulator`.
    fn evaluate_constraint_quotients_at_point(
        &self,
        point: CirclePointQM31,
        mask: &TreeVec<ColumnVec<Vec<QM31>>>,
        evaluation_accumulator: &mut PointEvaluationAccumulator,
    );
}

/// Prover-side extension of [`Component`]. Not exercised by the verifier
/// driver in this crate (prover-side interpolation/FFT depth is out of
/// scope); declared so the trait hierarchy matches what a full prover
/// implementation would add.
pub trait ComponentProver: Component {
    fn evaluate_constraint_quotients_on_domain(&self, domain_log_size: u32) -> Vec<QM31>;
}

/// The verifier's view of all components in a proof: an ordered list plus
/// the number of columns the preprocessed trace declares globally (not
/// every component reads every preprocessed column).
pub struct Components<'a> {
    pub components: Vec<&'a dyn Component>,
    pub n_preprocessed_columns: usize,
}

impl<'a> Components<'a> {
    pub fn composition_log_degree_bound(&self) -> u32 {
        self.components
            .iter()
            .map(|c| c.max_constraint_log_degree_bound())
            .max()
            .expect("at least one component")
    }

    /// Concatenate every component's mask-point tree along the columns
    /// axis, then override the preprocessed tree to a canonical shape: one
    /// point per preprocessed column if `include_all_preprocessed`,
    /// otherwise one point per preprocessed column some component actually
    /// reads (others get no mask points at all).
    pub fn mask_points(
        &self,
        point: CirclePointQM31,
        include_all_preprocessed: bool,
    ) -> TreeVec<ColumnVec<Vec<CirclePointQM31>>> {
        let mut merged: TreeVec<ColumnVec<Vec<CirclePointQM31>>> = Vec::new();
        for component in &self.components {
            let per_component = component.mask_points(point);
            for (tree_idx, columns) in per_component.into_iter().enumerate() {
                if merged.len() <= tree_idx {
                    merged.resize_with(tree_idx + 1, Vec::new);
                }
                merged[tree_idx].extend(columns);
            }
        }

        let used: std::collections::BTreeSet<usize> = self
            .components
            .iter()
            .flat_map(|c| c.preprocessed_column_indices())
            .collect();

        let preprocessed: ColumnVec<Vec<CirclePointQM31>> = (0..self.n_preprocessed_columns)
            .map(|i| {
                if include_all_preprocessed || used.contains(&i) {
                    vec![point]
                } else {
                    Vec::new()
                }
            })
            .collect();

        if merged.is_empty() {
            merged.push(preprocessed);
        } else {
            merged[PREPROCESSED_TRACE_IDX] = preprocessed;
        }
        merged
    }

    /// Merge per-component trace-log-size trees along the columns axis,
    /// checking that every preprocessed column declared by more than one
    /// component agrees on its log-size, and that every declared
    /// preprocessed column was visited by some component.
    pub fn column_log_sizes(&self) -> Result<TreeVec<ColumnVec<u32>>, InvalidStructureError> {
        let mut preprocessed_sizes: Vec<Option<u32>> = vec![None; self.n_preprocessed_columns];
        let mut merged: TreeVec<ColumnVec<u32>> = Vec::new();

        for component in &self.components {
            let bounds = component.trace_log_degree_bounds();
            let indices = component.preprocessed_column_indices();
            if let Some(preprocessed_here) = bounds.get(PREPROCESSED_TRACE_IDX) {
                for (&idx, &log_size) in indices.iter().zip(preprocessed_here.iter()) {
                    match preprocessed_sizes[idx] {
                        None => preprocessed_sizes[idx] = Some(log_size),
                        Some(existing) if existing != log_size => {
                            return Err(InvalidStructureError::PreprocessedColumnSizeMismatch(idx));
                        }
                        Some(_) => {}
                    }
                }
            }
            for (tree_idx, columns) in bounds.into_iter().enumerate() {
                if tree_idx == PREPROCESSED_TRACE_IDX {
                    continue;
                }
                if merged.len() <= tree_idx {
                    merged.resize_with(tree_idx + 1, Vec::new);
                }
                merged[tree_idx].extend(columns);
            }
        }

        for (idx, size) in preprocessed_sizes.iter().enumerate() {
            if size.is_none() {
                return Err(InvalidStructureError::PreprocessedColumnSizeMissing(idx));
            }
        }
        let preprocessed: ColumnVec<u32> = preprocessed_sizes.into_iter().flatten().collect();
        if merged.is_empty() {
            merged.push(preprocessed);
        } else {
            merged[PREPROCESSED_TRACE_IDX] = preprocessed;
        }
        Ok(merged)
    }

    /// Form the random linear combination of every component's
    /// constraint-quotient evaluations at `point`.
    pub fn eval_composition_polynomial_at_point(
        &self,
        point: CirclePointQM31,
        mask_values: &TreeVec<ColumnVec<Vec<QM31>>>,
        random_coeff: QM31,
    ) -> QM31 {
        let mut accumulator = PointEvaluationAccumulator::new(random_coeff);
        for component in &self.components {
            component.evaluate_constraint_quotients_at_point(point, mask_values, &mut accumulator);
        }
        accumulator.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::m31::M31;

    /// A single-column, single-constraint test component: constrains its
    /// one main-trace column to equal a fixed value at the mask point,
    /// reading no preprocessed columns.
    struct ConstantComponent {
        log_size: u32,
        expected: QM31,
    }

    impl Component for ConstantComponent {
        fn n_constraints(&self) -> usize {
            1
        }

        fn max_constraint_log_degree_bound(&self) -> u32 {
            self.log_size
        }

        fn trace_log_degree_bounds(&self) -> TreeVec<ColumnVec<u32>> {
            vec![vec![], vec![self.log_size]]
        }

        fn mask_points(&self, point: CirclePointQM31) -> TreeVec<ColumnVec<Vec<CirclePointQM31>>> {
            vec![vec![], vec![vec![point]]]
        }

        fn preprocessed_column_indices(&self) -> Vec<usize> {
            vec![]
        }

        fn evaluate_constraint_quotients_at_point(
            &self,
            _point: CirclePointQM31,
            mask: &TreeVec<ColumnVec<Vec<QM31>>>,
            evaluation_accumulator: &mut PointEvaluationAccumulator,
        ) {
            let sampled = mask[1][0][0];
            evaluation_accumulator.accumulate(sampled - self.expected);
        }
    }

    #[test]
    fn composition_log_degree_bound_is_the_max() {
        let a = ConstantComponent { log_size: 4, expected: QM31::from(M31::from_u32_unchecked(0)) };
        let b = ConstantComponent { log_size: 7, expected: QM31::from(M31::from_u32_unchecked(0)) };
        let components = Components {
            components: vec![&a, &b],
            n_preprocessed_columns: 0,
        };
        assert_eq!(components.composition_log_degree_bound(), 7);
    }

    #[test]
    fn satisfied_constraint_accumulates_to_zero() {
        let expected = QM31::from(M31::from_u32_unchecked(42));
        let component = ConstantComponent { log_size: 3, expected };
        let components = Components {
            components: vec![&component],
            n_preprocessed_columns: 0,
        };
        let point = CirclePointQM31::zero();
        let mask_values = vec![vec![], vec![vec![expected]]];
        let result = components.eval_composition_polynomial_at_point(
            point,
            &mask_values,
            QM31::from(M31::from_u32_unchecked(3)),
        );
        assert_eq!(result, QM31::from(M31::from_u32_unchecked(0)));
    }

    #[test]
    fn missing_preprocessed_column_is_an_error() {
        struct ReadsPreprocessed;
        impl Component for ReadsPreprocessed {
            fn n_constraints(&self) -> usize {
                0
            }
            fn max_constraint_log_degree_bound(&self) -> u32 {
                1
            }
            fn trace_log_degree_bounds(&self) -> TreeVec<ColumnVec<u32>> {
                vec![vec![4], vec![]]
            }
            fn mask_points(&self, _point: CirclePointQM31) -> TreeVec<ColumnVec<Vec<CirclePointQM31>>> {
                vec![vec![vec![]], vec![]]
            }
            fn preprocessed_column_indices(&self) -> Vec<usize> {
                vec![0]
            }
            fn evaluate_constraint_quotients_at_point(
                &self,
                _point: CirclePointQM31,
                _mask: &TreeVec<ColumnVec<Vec<QM31>>>,
                _acc: &mut PointEvaluationAccumulator,
            ) {
            }
        }

        let component = ReadsPreprocessed;
        let components = Components {
            components: vec![&component],
            // Declares two preprocessed columns, but only column 0 is ever
            // visited by a component.
            n_preprocessed_columns: 2,
        };
        assert_eq!(
            components.column_log_sizes(),
            Err(InvalidStructureError::PreprocessedColumnSizeMissing(1))
        );
    }
}
