//! Point-evaluation accumulator: folds a sequence of constraint-quotient
//! evaluations into one random linear combination. §4.E.

use crate::fields::qm31::QM31;

/// `acc <- acc * alpha + e` on each `accumulate`, so after `n` calls the
/// held value is the Horner polynomial `e_1*alpha^(n-1) + ... + e_n`, i.e.
/// coefficients in the order the caller fed them.
#[derive(Clone, Copy, Debug)]
pub struct PointEvaluationAccumulator {
    alpha: QM31,
    acc: QM31,
}

impl PointEvaluationAccumulator {
    pub fn new(alpha: QM31) -> Self {
        Self {
            alpha,
            acc: QM31::from(crate::fields::m31::M31::from_u32_unchecked(0)),
        }
    }

    pub fn accumulate(&mut self, evaluation: QM31) {
        self.acc = self.acc * self.alpha + evaluation;
    }

    pub fn accumulate_all(&mut self, evaluations: &[QM31]) {
        for &e in evaluations {
            self.accumulate(e);
        }
    }

    pub fn finalize(self) -> QM31 {
        self.acc
    }
}
