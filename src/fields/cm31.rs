use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

use crate::error::FieldError;
use crate::fields::m31::M31;
use crate::fields::{ComplexConjugate, FieldExpOps, One, Zero};

/// `GF(p)[i] / (i^2 + 1)`, the degree-2 extension of `M31`.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CM31(pub M31, pub M31);

impl CM31 {
    pub const fn from_m31(a: M31, b: M31) -> Self {
        Self(a, b)
    }
}

impl fmt::Debug for CM31 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} + {}i", self.0, self.1)
    }
}

impl fmt::Display for CM31 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} + {}i", self.0, self.1)
    }
}

impl Zero for CM31 {
    fn zero() -> Self {
        Self(M31::zero(), M31::zero())
    }
    fn is_zero(&self) -> bool {
        self.0.is_zero() && self.1.is_zero()
    }
}

impl One for CM31 {
    fn one() -> Self {
        Self(M31::one(), M31::zero())
    }
}

impl Add for CM31 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0, self.1 + rhs.1)
    }
}

impl Sub for CM31 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0, self.1 - rhs.1)
    }
}

impl Neg for CM31 {
    type Output = Self;
    fn neg(self) -> Self {
        Self(-self.0, -self.1)
    }
}

impl Mul for CM31 {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        // (a + bi)(c + di) = (ac - bd) + (ad + bc)i
        Self(
            self.0 * rhs.0 - self.1 * rhs.1,
            self.0 * rhs.1 + self.1 * rhs.0,
        )
    }
}

impl FieldExpOps for CM31 {
    fn inverse(&self) -> Result<Self, FieldError> {
        if self.is_zero() {
            return Err(FieldError::DivisionByZero);
        }
        // conj(a + bi) = a - bi; (a+bi)(a-bi) = a^2 + b^2 lands back in M31,
        // and is itself nonzero here since -1 is a non-residue mod p.
        let denom = self.0 * self.0 + self.1 * self.1;
        let denom_inv = denom.inverse()?;
        Ok(Self(self.0 * denom_inv, -self.1 * denom_inv))
    }
}

impl ComplexConjugate for CM31 {
    fn complex_conjugate(&self) -> Self {
        Self(self.0, -self.1)
    }
}

impl From<M31> for CM31 {
    fn from(value: M31) -> Self {
        Self(value, M31::zero())
    }
}

impl Mul<M31> for CM31 {
    type Output = Self;
    fn mul(self, rhs: M31) -> Self {
        Self(self.0 * rhs, self.1 * rhs)
    }
}
