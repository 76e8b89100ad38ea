//! # Loop Canonicalizer
//!
//! Recognizes the canonical loop form behind loop-associated directives and
//! normalizes each associated loop into a [`LoopIterationSpace`]:
//!
//! ```text
//! for (counter = lower; counter relop upper; counter += step)
//!                                   │
//!                                   ▼
//! lower, upper, step (positive when constant), subtract, is_less, strict,
//! precondition, trip count = (upper - lower - strict + step) / step
//! ```
//!
//! A collapsed nest ([`LoopNest`]) multiplies the per-level trip counts into
//! one flattened iteration space and records how each level's counter is
//! recovered from the flattened induction variable.
//!
//! Inner bounds that depend on an outer counter (non-rectangular nests) are
//! replaced by the min/max of their values over the outer counter's range.
//! The original condition is kept for the run-time recheck.

pub mod canonical;
pub mod collapse;
pub mod fold;
pub mod trip_count;

pub use collapse::LoopCanonicalizer;

use crate::ast::{
    BinaryOp, DeclId, Expr, ExprKind, IntType, SourceLocation, Stmt, StmtKind, Ty,
};
use crate::diagnostics::{Diagnostic, DiagnosticArg, DiagnosticKind, LoopPart};
use serde::{Deserialize, Serialize};

/// Number of iterations of one loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripCount {
    /// Trip-count expression, zero when the precondition fails
    pub expr: Expr,
    /// Integer type the count is computed in
    pub ty: IntType,
    /// Value when every operand is constant
    pub value: Option<u128>,
}

/// Covering range of a bound that depends on an outer counter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundPair {
    /// Smallest value over the outer counter's range
    pub min: Expr,
    /// Largest value over the outer counter's range
    pub max: Expr,
    /// Constant value of `min`
    pub min_value: Option<i128>,
    /// Constant value of `max`
    pub max_value: Option<i128>,
}

/// One normalized loop of a nest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopIterationSpace {
    /// Nesting level, 0 is outermost
    pub level: usize,
    /// Counter variable
    pub counter: DeclId,
    /// Counter type
    pub counter_ty: Ty,
    /// Placeholder for the per-thread copy of the counter
    pub private_counter: DeclId,
    /// Initial value
    pub lower: Expr,
    /// Bound the condition tests against
    pub upper: Expr,
    /// Step expression, positive when constant
    pub step: Expr,
    /// Constant step
    pub step_value: Option<i128>,
    /// Counter moves downwards
    pub subtract: bool,
    /// Condition is `<`/`<=` (counter ascends)
    pub is_less: bool,
    /// Condition is `<`/`>`
    pub strict: bool,
    /// Loop runs at least once
    pub precondition: Expr,
    /// Iteration count
    pub trip_count: TripCount,
    /// Outer level the lower bound depends on
    pub lower_dependency: Option<usize>,
    /// Outer level the upper bound depends on
    pub upper_dependency: Option<usize>,
    /// Covering range of a dependent lower bound
    pub lower_bounds: Option<BoundPair>,
    /// Covering range of a dependent upper bound
    pub upper_bounds: Option<BoundPair>,
    /// Original condition of a non-rectangular loop
    pub final_condition: Option<Expr>,
    /// Location of the `for`
    pub location: SourceLocation,
}

impl LoopIterationSpace {
    /// Whether either bound depends on an outer counter
    pub fn is_non_rectangular(&self) -> bool {
        self.lower_dependency.is_some() || self.upper_dependency.is_some()
    }

    /// Lower bound of the covering iteration space
    pub fn effective_lower(&self) -> &Expr {
        match &self.lower_bounds {
            Some(pair) if self.is_less => &pair.min,
            Some(pair) => &pair.max,
            None => &self.lower,
        }
    }

    /// Upper bound of the covering iteration space
    pub fn effective_upper(&self) -> &Expr {
        match &self.upper_bounds {
            Some(pair) if self.is_less => &pair.max,
            Some(pair) => &pair.min,
            None => &self.upper,
        }
    }

    /// Relational operator of the normalized condition
    pub fn condition_op(&self) -> BinaryOp {
        match (self.is_less, self.strict) {
            (true, true) => BinaryOp::Lt,
            (true, false) => BinaryOp::Le,
            (false, true) => BinaryOp::Gt,
            (false, false) => BinaryOp::Ge,
        }
    }

    /// Canonical `for` statement with this space's bounds and step.
    ///
    /// The result canonicalizes back to the same lower, upper, step and
    /// direction.
    pub fn to_for_stmt(&self, body: Stmt) -> Stmt {
        let counter = || Expr::decl_ref(self.counter, self.counter_ty.clone(), self.location);
        let init = Expr::assign(counter(), self.lower.clone());
        let cond = Expr::binary(self.condition_op(), counter(), self.upper.clone());
        let op = if self.subtract {
            BinaryOp::Sub
        } else {
            BinaryOp::Add
        };
        let inc = Expr::compound_assign(op, counter(), self.step.clone());
        Stmt::new(
            StmtKind::For {
                init: Some(Box::new(Stmt::new(StmtKind::Expr(init), self.location))),
                cond: Some(cond),
                inc: Some(inc),
                body: Box::new(body),
            },
            self.location,
        )
    }
}

/// How one level's counter is recovered from the flattened induction variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecovery {
    /// Level
    pub level: usize,
    /// Product of the trip counts of all inner levels
    pub divisor: Expr,
    /// Constant value of `divisor`
    pub divisor_value: Option<u128>,
    /// `lower ± (remainder / divisor) * step`, where the remainder is what
    /// outer levels left of the induction variable
    pub counter_value: Expr,
}

/// Normalized collapsed loop nest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopNest {
    /// Levels, outermost first
    pub levels: Vec<LoopIterationSpace>,
    /// Product of the per-level trip counts
    pub total_trip_count: TripCount,
    /// Flattened induction variable
    pub induction_var: DeclId,
    /// Counter recovery, outermost first
    pub recovery: Vec<IndexRecovery>,
}

impl LoopNest {
    /// Number of associated loops
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Per-level iteration indices for flattened iteration `iv`.
    ///
    /// `None` when a trip count is not constant or `iv` is out of range.
    pub fn recover_indices(&self, iv: u128) -> Option<Vec<u128>> {
        let total = self.total_trip_count.value?;
        if iv >= total {
            return None;
        }
        let mut remainder = iv;
        let mut indices = Vec::with_capacity(self.levels.len());
        for step in &self.recovery {
            let divisor = step.divisor_value?;
            if divisor == 0 {
                return None;
            }
            indices.push(remainder / divisor);
            remainder %= divisor;
        }
        Some(indices)
    }

    /// Counter values for flattened iteration `iv` over the covering
    /// iteration space.
    ///
    /// Each level starts at its own lower bound evaluated with the recovered
    /// outer counters, so a non-rectangular point may still fail that
    /// level's [`final_condition`](LoopIterationSpace::final_condition).
    pub fn evaluate_point(&self, iv: u128) -> Option<Vec<i128>> {
        let indices = self.recover_indices(iv)?;
        let mut bindings: Vec<(DeclId, i128)> = Vec::with_capacity(indices.len());
        for (space, index) in self.levels.iter().zip(indices) {
            let lower = fold::eval(&space.lower, &bindings)?;
            let step = space.step_value?;
            let offset = i128::try_from(index).ok()?.checked_mul(step)?;
            let value = if space.subtract {
                lower.checked_sub(offset)?
            } else {
                lower.checked_add(offset)?
            };
            bindings.push((space.counter, value));
        }
        Some(bindings.into_iter().map(|(_, v)| v).collect())
    }

    /// Whether counter values `point` pass every level's run-time recheck.
    ///
    /// `None` when a condition is not constant under these values.
    pub fn accepts(&self, point: &[i128]) -> Option<bool> {
        if point.len() != self.levels.len() {
            return None;
        }
        let bindings: Vec<(DeclId, i128)> = self
            .levels
            .iter()
            .map(|space| space.counter)
            .zip(point.iter().copied())
            .collect();
        for condition in self.levels.iter().filter_map(|s| s.final_condition.as_ref()) {
            if fold::eval(condition, &bindings)? == 0 {
                return Some(false);
            }
        }
        Some(true)
    }
}

/// Why a loop nest could not be normalized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopFailure {
    /// Part of the loop is not in canonical form
    NonCanonical {
        /// Offending part
        part: LoopPart,
        /// Where it was found
        location: SourceLocation,
    },
    /// Constant step moves away from the bound
    IncompatibleDirection {
        /// Increment location
        location: SourceLocation,
    },
    /// Dependent bound the lowering cannot handle
    NonRectangularUnsupported {
        /// Bound location
        location: SourceLocation,
    },
}

impl LoopFailure {
    /// Diagnostic for this failure
    pub fn to_diagnostic(&self, level: usize) -> Diagnostic {
        let (location, kind) = match *self {
            LoopFailure::NonCanonical { part, location } => {
                (location, DiagnosticKind::NonCanonicalLoop(part))
            }
            LoopFailure::IncompatibleDirection { location } => {
                (location, DiagnosticKind::IncompatibleLoopDirection)
            }
            LoopFailure::NonRectangularUnsupported { location } => {
                (location, DiagnosticKind::NonRectangularUnsupported)
            }
        };
        Diagnostic::new(location, kind).with(DiagnosticArg::Integer(level as i128))
    }
}

/// Result of canonicalizing the loops of one region
#[derive(Debug, Clone, PartialEq)]
pub enum NestOutcome {
    /// Normalized nest
    Nest(LoopNest),
    /// At least one failure was reported
    Invalid,
    /// Loop expressions are dependent; nothing was checked
    Deferred,
}

/// Builds `lhs op rhs` typed as `ty`
pub(crate) fn arith(op: BinaryOp, lhs: Expr, rhs: Expr, ty: &Ty) -> Expr {
    let location = lhs.location;
    Expr::new(
        ExprKind::Binary {
            op,
            lhs: Box::new(lhs.cast(ty.clone())),
            rhs: Box::new(rhs.cast(ty.clone())),
        },
        ty.clone(),
        location,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space(lower: i128, upper: i128, step: i128, subtract: bool) -> LoopIterationSpace {
        let loc = SourceLocation::new(1, 1);
        LoopIterationSpace {
            level: 0,
            counter: DeclId(0),
            counter_ty: Ty::i32(),
            private_counter: DeclId(1),
            lower: Expr::int(lower, Ty::i32(), loc),
            upper: Expr::int(upper, Ty::i32(), loc),
            step: Expr::int(step, Ty::i32(), loc),
            step_value: Some(step),
            subtract,
            is_less: !subtract,
            strict: true,
            precondition: Expr::new(ExprKind::BoolLiteral(true), Ty::bool(), loc),
            trip_count: TripCount {
                expr: Expr::int(0, Ty::i32(), loc),
                ty: IntType::signed(32),
                value: None,
            },
            lower_dependency: None,
            upper_dependency: None,
            lower_bounds: None,
            upper_bounds: None,
            final_condition: None,
            location: loc,
        }
    }

    #[test]
    fn test_condition_op() {
        assert_eq!(space(0, 10, 1, false).condition_op(), BinaryOp::Lt);
        assert_eq!(space(10, 0, 1, true).condition_op(), BinaryOp::Gt);
    }

    #[test]
    fn test_to_for_stmt_shape() {
        let s = space(10, 0, 2, true);
        let body = Stmt::new(StmtKind::Null, s.location);
        let stmt = s.to_for_stmt(body);
        match stmt.kind {
            StmtKind::For { cond, inc, .. } => {
                let cond = cond.unwrap();
                assert!(matches!(cond.kind, ExprKind::Binary { op: BinaryOp::Gt, .. }));
                let inc = inc.unwrap();
                assert!(matches!(
                    inc.kind,
                    ExprKind::CompoundAssign {
                        op: BinaryOp::Sub,
                        ..
                    }
                ));
            }
            _ => panic!("expected a for statement"),
        }
    }

    #[test]
    fn test_failure_diagnostics() {
        let loc = SourceLocation::new(3, 5);
        let diag = LoopFailure::NonCanonical {
            part: LoopPart::Increment,
            location: loc,
        }
        .to_diagnostic(1);
        assert_eq!(diag.kind, DiagnosticKind::NonCanonicalLoop(LoopPart::Increment));
        assert_eq!(diag.location, loc);
        assert_eq!(diag.args, vec![DiagnosticArg::Integer(1)]);
    }
}
