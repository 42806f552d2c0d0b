//! Constraint framework: the expression DSL used to derive and simplify
//! constraint polynomials offline. §4.E.

pub mod expr;

pub use expr::{ExprArena, ExprId};
