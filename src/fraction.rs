//! Unreduced fractions over the field tower, summed without early division
//! so a batch of many fractions can be combined with one final inverse.
//! Used by the constraint-quotient accumulator. §4.G.

use std::ops::{Add, Mul, Sub};

use crate::fields::{FieldExpOps, Zero};

/// `numerator / denominator`, kept unreduced: `add` cross-multiplies rather
/// than computing a common denominator's inverse, so a long sum of
/// fractions costs one inversion instead of one per term.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fraction<N, D> {
    pub numerator: N,
    pub denominator: D,
}

impl<N, D> Fraction<N, D> {
    pub fn new(numerator: N, denominator: D) -> Self {
        Self {
            numerator,
            denominator,
        }
    }
}

impl<N, D> Add for Fraction<N, D>
where
    N: Copy + Add<Output = N> + Mul<D, Output = N>,
    D: Copy + Mul<Output = D>,
{
    type Output = Self;

    /// `a/b + c/d = (a*d + c*b) / (b*d)`, no reduction.
    fn add(self, rhs: Self) -> Self {
        Self {
            numerator: self.numerator * rhs.denominator + rhs.numerator * self.denominator,
            denominator: self.denominator * rhs.denominator,
        }
    }
}

/// Sum a slice of fractions with one pass of cross-multiplying adds.
pub fn sum_fractions<N, D>(fractions: &[Fraction<N, D>]) -> Fraction<N, D>
where
    N: Copy + Zero + Add<Output = N> + Mul<D, Output = N>,
    D: Copy + crate::fields::One + Mul<Output = D>,
{
    fractions
        .iter()
        .copied()
        .fold(Fraction::new(N::zero(), D::one()), |acc, f| acc + f)
}

/// Reduce a fraction to a field element, the one division paid at the end
/// of a batched sum.
impl<N, D> Fraction<N, D>
where
    D: FieldExpOps + Copy,
    N: Mul<D, Output = N>,
{
    pub fn reduce(self) -> N {
        self.numerator * self.denominator.inverse().expect("fraction denominator is zero")
    }
}
