use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

use crate::error::FieldError;
use crate::fields::cm31::CM31;
use crate::fields::m31::M31;
use crate::fields::{ComplexConjugate, FieldExpOps, One, TryIntoBase, Zero};

/// The quotient constant defining the quartic extension: `u^2 = R = 2 + i`.
pub const R: CM31 = CM31::from_m31(M31::from_u32_unchecked(2), M31::from_u32_unchecked(1));

/// `CM31[u] / (u^2 - R)`, the degree-4 "secure" extension field used for
/// every Fiat-Shamir challenge, FRI folding coefficient, and out-of-domain
/// sample in this crate.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QM31(pub CM31, pub CM31);

impl QM31 {
    pub const fn from_cm31(a: CM31, b: CM31) -> Self {
        Self(a, b)
    }

    pub fn from_m31(a: M31, b: M31, c: M31, d: M31) -> Self {
        Self(CM31::from_m31(a, b), CM31::from_m31(c, d))
    }

    /// Build a `QM31` from the four base-field "lanes" of its canonical
    /// representation, as consumed by `Commitment::commit_qm31`-style
    /// hashing and produced by batch-inverse partial evaluations.
    pub fn from_m31_array(array: [M31; 4]) -> Self {
        Self::from_m31(array[0], array[1], array[2], array[3])
    }

    pub fn to_m31_array(self) -> [M31; 4] {
        [self.0 .0, self.0 .1, self.1 .0, self.1 .1]
    }
}

impl TryIntoBase<M31> for QM31 {
    fn try_into_base(self) -> Result<M31, FieldError> {
        if self.0 .1.is_zero() && self.1.is_zero() {
            Ok(self.0 .0)
        } else {
            Err(FieldError::NonBaseField)
        }
    }
}

impl fmt::Debug for QM31 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            write!(f, "0")
        } else {
            write!(f, "({}) + ({})u", self.0, self.1)
        }
    }
}

impl fmt::Display for QM31 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) + ({})u", self.0, self.1)
    }
}

impl Zero for QM31 {
    fn zero() -> Self {
        Self(CM31::zero(), CM31::zero())
    }
    fn is_zero(&self) -> bool {
        self.0.is_zero() && self.1.is_zero()
    }
}

impl One for QM31 {
    fn one() -> Self {
        Self(CM31::one(), CM31::zero())
    }
}

impl Add for QM31 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0, self.1 + rhs.1)
    }
}

impl Sub for QM31 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0, self.1 - rhs.1)
    }
}

impl Neg for QM31 {
    type Output = Self;
    fn neg(self) -> Self {
        Self(-self.0, -self.1)
    }
}

impl Mul for QM31 {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        // (a + bu)(c + du) = (ac + R*bd) + (ad + bc)u
        let ac = self.0 * rhs.0;
        let bd = self.1 * rhs.1;
        let ad = self.0 * rhs.1;
        let bc = self.1 * rhs.0;
        Self(ac + R * bd, ad + bc)
    }
}

impl Mul<M31> for QM31 {
    type Output = Self;
    fn mul(self, rhs: M31) -> Self {
        Self(self.0 * rhs, self.1 * rhs)
    }
}

impl FieldExpOps for QM31 {
    fn inverse(&self) -> Result<Self, FieldError> {
        if self.is_zero() {
            return Err(FieldError::DivisionByZero);
        }
        // (a + bu)^-1 = conj(a+bu) / norm(a+bu), where conjugation negates
        // the `u` component and norm = (a+bu)(a-bu) = a^2 - R*b^2 in CM31.
        let conj = self.complex_conjugate();
        let norm = *self * conj;
        debug_assert!(norm.1.is_zero());
        let norm_inv = norm.0.inverse()?;
        Ok(Self(conj.0 * norm_inv, conj.1 * norm_inv))
    }
}

impl ComplexConjugate for QM31 {
    fn complex_conjugate(&self) -> Self {
        Self(self.0, -self.1)
    }
}

impl From<M31> for QM31 {
    fn from(value: M31) -> Self {
        Self::from_m31(value, M31::zero(), M31::zero(), M31::zero())
    }
}

impl From<CM31> for QM31 {
    fn from(value: CM31) -> Self {
        Self(value, CM31::zero())
    }
}
