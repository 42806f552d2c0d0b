//! M31 / CM31 / QM31 field arithmetic.
//!
//! `M31` is the base field, a newtype over a canonical `u32 < 2^31 - 1`.
//! `CM31` is its degree-2 complex extension, `QM31` the degree-4 secure
//! extension used for out-of-domain sampling and Fiat-Shamir challenges.

pub mod batch_inverse;
pub mod cm31;
pub mod m31;
pub mod qm31;

pub use batch_inverse::batch_inverse_in_place;
pub use cm31::CM31;
pub use m31::M31;
pub use qm31::QM31;

use std::fmt::Debug;
use std::ops::{Add, Mul, Neg, Sub};

use crate::error::FieldError;

/// Shared capability of all three field types: group/ring laws plus the
/// multiplicative-inverse family of operations.
pub trait FieldExpOps:
    Neg<Output = Self> + Add<Output = Self> + Sub<Output = Self> + Mul<Output = Self> + Copy + Sized
{
    fn square(&self) -> Self {
        *self * *self
    }

    fn double(&self) -> Self {
        *self + *self
    }

    /// Square-and-multiply exponentiation.
    fn pow(&self, mut exp: u128) -> Self
    where
        Self: One,
    {
        let mut result = Self::one();
        let mut base = *self;
        while exp > 0 {
            if exp & 1 == 1 {
                result = result * base;
            }
            base = base.square();
            exp >>= 1;
        }
        result
    }

    /// Fermat's little theorem inverse. The concrete field types check and
    /// return `FieldError::DivisionByZero` when called on zero.
    fn inverse(&self) -> Result<Self, FieldError>;
}

pub trait Zero {
    fn zero() -> Self;
    fn is_zero(&self) -> bool;
}

pub trait One {
    fn one() -> Self;
}

/// Marker for fields carrying a Galois conjugate (`CM31` conjugates the
/// imaginary unit `i`, `QM31` conjugates `u`).
pub trait ComplexConjugate {
    fn complex_conjugate(&self) -> Self;
}

/// Fallible narrowing from an extension field down to its base field.
pub trait TryIntoBase<Base> {
    fn try_into_base(self) -> Result<Base, FieldError>;
}

pub trait Field:
    FieldExpOps + Zero + One + Add<Output = Self> + PartialEq + Eq + Debug + Clone + Copy
{
}

impl<T> Field for T where
    T: FieldExpOps + Zero + One + Add<Output = Self> + PartialEq + Eq + Debug + Clone + Copy
{
}
