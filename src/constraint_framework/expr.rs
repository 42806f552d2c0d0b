//! Arena-allocated expression DSL, used offline to generate deterministic
//! test vectors and to simplify constraint polynomials before they're
//! hand-transcribed into a `Component::evaluate_constraint_quotients_at_point`
//! implementation. Not on the verifier hot path. §4.E, §9 ("arena
//! allocation": integer-indexed, no per-node refcounting).

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::fields::m31::M31;
use crate::fields::qm31::QM31;
use crate::fields::{One, Zero};

/// An index into an [`ExprArena`]. Cheap to copy, meaningless outside the
/// arena that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ExprId(u32);

#[derive(Clone, Debug, PartialEq)]
enum ExprNode {
    Col(usize),
    Constant(QM31),
    Param(String),
    Add(ExprId, ExprId),
    Sub(ExprId, ExprId),
    Mul(ExprId, ExprId),
    Neg(ExprId),
    Inv(ExprId),
    /// Four base-field expressions assembled into one secure-field lane
    /// tuple `(a, b, c, d)`.
    SecureCol([ExprId; 4]),
}

/// A DAG of expression nodes. Every constructor applies the simplification
/// rules inline (constant folding, additive/multiplicative identities,
/// double-negation, `inv(inv x) = x`), so the arena never holds a
/// reducible subtree.
#[derive(Clone, Debug, Default)]
pub struct ExprArena {
    nodes: Vec<ExprNode>,
    /// Named intermediates: `let`-bound subexpressions resolved by name
    /// rather than re-walked, so a large shared subexpression is built once.
    intermediates: HashMap<String, ExprId>,
}

impl ExprArena {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, node: ExprNode) -> ExprId {
        let id = ExprId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    fn get(&self, id: ExprId) -> &ExprNode {
        &self.nodes[id.0 as usize]
    }

    pub fn col(&mut self, index: usize) -> ExprId {
        self.push(ExprNode::Col(index))
    }

    pub fn constant(&mut self, value: QM31) -> ExprId {
        self.push(ExprNode::Constant(value))
    }

    pub fn param(&mut self, name: impl Into<String>) -> ExprId {
        self.push(ExprNode::Param(name.into()))
    }

    /// Bind `id` under `name` so later code can fetch it back with
    /// [`ExprArena::named`] instead of threading the `ExprId` through.
    pub fn bind(&mut self, name: impl Into<String>, id: ExprId) {
        self.intermediates.insert(name.into(), id);
    }

    pub fn named(&self, name: &str) -> Option<ExprId> {
        self.intermediates.get(name).copied()
    }

    fn as_constant(&self, id: ExprId) -> Option<QM31> {
        match self.get(id) {
            ExprNode::Constant(v) => Some(*v),
            _ => None,
        }
    }

    pub fn add(&mut self, a: ExprId, b: ExprId) -> ExprId {
        if let (Some(x), Some(y)) = (self.as_constant(a), self.as_constant(b)) {
            return self.constant(x + y);
        }
        if let Some(x) = self.as_constant(a) {
            if x.is_zero() {
                return b;
            }
        }
        if let Some(y) = self.as_constant(b) {
            if y.is_zero() {
                return a;
            }
        }
        self.push(ExprNode::Add(a, b))
    }

    pub fn sub(&mut self, a: ExprId, b: ExprId) -> ExprId {
        if let (Some(x), Some(y)) = (self.as_constant(a), self.as_constant(b)) {
            return self.constant(x - y);
        }
        if let Some(y) = self.as_constant(b) {
            if y.is_zero() {
                return a;
            }
        }
        self.push(ExprNode::Sub(a, b))
    }

    pub fn mul(&mut self, a: ExprId, b: ExprId) -> ExprId {
        if let (Some(x), Some(y)) = (self.as_constant(a), self.as_constant(b)) {
            return self.constant(x * y);
        }
        if let Some(x) = self.as_constant(a) {
            if x.is_zero() {
                return a;
            }
            if x == QM31::one() {
                return b;
            }
            if x == -QM31::one() {
                return self.neg(b);
            }
        }
        if let Some(y) = self.as_constant(b) {
            if y.is_zero() {
                return b;
            }
            if y == QM31::one() {
                return a;
            }
            if y == -QM31::one() {
                return self.neg(a);
            }
        }
        self.push(ExprNode::Mul(a, b))
    }

    pub fn neg(&mut self, a: ExprId) -> ExprId {
        if let Some(x) = self.as_constant(a) {
            return self.constant(-x);
        }
        if let ExprNode::Neg(inner) = self.get(a) {
            return *inner;
        }
        if let ExprNode::Sub(x, y) = self.get(a).clone() {
            return self.push(ExprNode::Sub(y, x));
        }
        self.push(ExprNode::Neg(a))
    }

    pub fn inv(&mut self, a: ExprId) -> ExprId {
        if let Some(x) = self.as_constant(a) {
            return self.constant(x.inverse_checked().expect("inversion of zero constant"));
        }
        if let ExprNode::Inv(inner) = self.get(a) {
            return *inner;
        }
        self.push(ExprNode::Inv(a))
    }

    /// Assemble four base-field lane expressions into one secure-field
    /// value. Folds to a single constant when all four lanes are constants
    /// that are themselves base-field (zero imaginary/extension parts).
    pub fn secure_col(&mut self, lanes: [ExprId; 4]) -> ExprId {
        let as_base: Option<Vec<M31>> = lanes
            .iter()
            .map(|&id| self.as_constant(id).and_then(|v| v.try_into_base_lane()))
            .collect();
        if let Some(values) = as_base {
            return self.constant(QM31::from_m31_array([
                values[0], values[1], values[2], values[3],
            ]));
        }
        self.push(ExprNode::SecureCol(lanes))
    }

    /// Degree bound of the polynomial `id` represents: columns contribute
    /// 1, constants and parameters 0, multiplication sums operand degrees,
    /// addition/subtraction takes the max.
    pub fn degree_bound(&self, id: ExprId) -> u32 {
        match self.get(id) {
            ExprNode::Col(_) => 1,
            ExprNode::Constant(_) | ExprNode::Param(_) => 0,
            ExprNode::Add(a, b) | ExprNode::Sub(a, b) => {
                self.degree_bound(*a).max(self.degree_bound(*b))
            }
            ExprNode::Mul(a, b) => self.degree_bound(*a) + self.degree_bound(*b),
            ExprNode::Neg(a) => self.degree_bound(*a),
            ExprNode::Inv(a) => {
                let d = self.degree_bound(*a);
                assert_eq!(d, 0, "inversion is only allowed on degree-0 operands");
                0
            }
            ExprNode::SecureCol(lanes) => lanes.iter().map(|&l| self.degree_bound(l)).max().unwrap_or(0),
        }
    }

    /// Derive a deterministic pseudo-random field value for a column index,
    /// parameter name, or extension-field parameter, keyed by a stable hash
    /// of its identity plus `salt` — used so repeated test-vector generation
    /// is reproducible without an explicit RNG thread.
    fn stable_random(identity: &str, lane: u8, salt: u64) -> M31 {
        let mut hasher = DefaultHasher::new();
        identity.hash(&mut hasher);
        lane.hash(&mut hasher);
        salt.hash(&mut hasher);
        let h = hasher.finish();
        M31::from_u64(h)
    }

    fn random_value(&self, id: ExprId, salt: u64) -> QM31 {
        match self.get(id) {
            ExprNode::Col(index) => {
                QM31::from(Self::stable_random(&format!("col:{index}"), 0, salt))
            }
            ExprNode::Constant(v) => *v,
            ExprNode::Param(name) => QM31::from_m31_array([
                Self::stable_random(name, 0, salt),
                Self::stable_random(name, 1, salt),
                Self::stable_random(name, 2, salt),
                Self::stable_random(name, 3, salt),
            ]),
            ExprNode::Add(a, b) => self.random_value(*a, salt) + self.random_value(*b, salt),
            ExprNode::Sub(a, b) => self.random_value(*a, salt) - self.random_value(*b, salt),
            ExprNode::Mul(a, b) => self.random_value(*a, salt) * self.random_value(*b, salt),
            ExprNode::Neg(a) => -self.random_value(*a, salt),
            ExprNode::Inv(a) => self
                .random_value(*a, salt)
                .inverse_checked()
                .expect("random assignment hit zero for an inverted operand"),
            ExprNode::SecureCol(lanes) => {
                let v: Vec<M31> = lanes
                    .iter()
                    .map(|&l| {
                        self.random_value(l, salt)
                            .try_into_base_lane()
                            .expect("secure_col lane must evaluate to a base-field value")
                    })
                    .collect();
                QM31::from_m31_array([v[0], v[1], v[2], v[3]])
            }
        }
    }

    /// Evaluate `id` under a deterministic random assignment of every
    /// column/param/secure-param leaf, keyed by `salt`. Used to spot-check
    /// algebraic identities (e.g. that a simplified expression and its
    /// unsimplified form evaluate identically) without a prover.
    pub fn evaluate_randomly(&self, id: ExprId, salt: u64) -> QM31 {
        self.random_value(id, salt)
    }
}

/// Narrow a `QM31` down to a base-field lane, used only by the expression
/// DSL's constant-folding of `secure_col`; unlike `TryIntoBase` this never
/// fails on a zero-valued extension part by definition (a `QM31` lifted
/// from `M31` always qualifies).
trait TryIntoBaseLane {
    fn try_into_base_lane(self) -> Option<M31>;
    fn inverse_checked(self) -> Option<QM31>;
}

impl TryIntoBaseLane for QM31 {
    fn try_into_base_lane(self) -> Option<M31> {
        use crate::fields::TryIntoBase;
        self.try_into_base().ok()
    }

    fn inverse_checked(self) -> Option<QM31> {
        use crate::fields::FieldExpOps;
        self.inverse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_folding_collapses_arithmetic() {
        let mut arena = ExprArena::new();
        let a = arena.constant(QM31::from(M31::from_u64(2)));
        let b = arena.constant(QM31::from(M31::from_u64(3)));
        let sum = arena.add(a, b);
        assert_eq!(arena.degree_bound(sum), 0);
        assert_eq!(arena.evaluate_randomly(sum, 0), QM31::from(M31::from_u64(5)));
    }

    #[test]
    fn adding_zero_is_identity() {
        let mut arena = ExprArena::new();
        let col = arena.col(0);
        let zero = arena.constant(QM31::zero());
        let sum = arena.add(col, zero);
        assert_eq!(sum, col);
    }

    #[test]
    fn double_negation_cancels() {
        let mut arena = ExprArena::new();
        let col = arena.col(0);
        let neg = arena.neg(col);
        let double_neg = arena.neg(neg);
        assert_eq!(double_neg, col);
    }

    #[test]
    fn neg_of_sub_swaps_operands() {
        let mut arena = ExprArena::new();
        let a = arena.col(0);
        let b = arena.col(1);
        let sub = arena.sub(a, b);
        let negated = arena.neg(sub);
        let salt = 7;
        assert_eq!(
            arena.evaluate_randomly(negated, salt),
            arena.evaluate_randomly(b, salt) - arena.evaluate_randomly(a, salt)
        );
    }

    #[test]
    fn inv_of_inv_is_identity() {
        let mut arena = ExprArena::new();
        let p = arena.param("x");
        let inv = arena.inv(p);
        let inv_inv = arena.inv(inv);
        assert_eq!(inv_inv, p);
    }

    #[test]
    fn degree_bound_follows_spec_rules() {
        let mut arena = ExprArena::new();
        let a = arena.col(0);
        let b = arena.col(1);
        let product = arena.mul(a, b);
        let sum = arena.add(product, a);
        assert_eq!(arena.degree_bound(product), 2);
        assert_eq!(arena.degree_bound(sum), 2);
    }

    #[test]
    fn secure_col_of_base_constants_folds_to_one_constant() {
        let mut arena = ExprArena::new();
        let lanes = [
            arena.constant(QM31::from(M31::from_u64(1))),
            arena.constant(QM31::from(M31::from_u64(2))),
            arena.constant(QM31::from(M31::from_u64(3))),
            arena.constant(QM31::from(M31::from_u64(4))),
        ];
        let secure = arena.secure_col(lanes);
        assert_eq!(
            arena.evaluate_randomly(secure, 0),
            QM31::from_m31_array([
                M31::from_u64(1),
                M31::from_u64(2),
                M31::from_u64(3),
                M31::from_u64(4)
            ])
        );
    }

    #[test]
    fn random_assignment_is_deterministic_across_calls() {
        let mut arena = ExprArena::new();
        let col = arena.col(3);
        let param = arena.param("alpha");
        let expr = arena.add(col, param);
        assert_eq!(
            arena.evaluate_randomly(expr, 11),
            arena.evaluate_randomly(expr, 11)
        );
    }

    #[test]
    fn named_intermediates_resolve_by_name() {
        let mut arena = ExprArena::new();
        let col = arena.col(0);
        arena.bind("x", col);
        assert_eq!(arena.named("x"), Some(col));
        assert_eq!(arena.named("missing"), None);
    }
}
