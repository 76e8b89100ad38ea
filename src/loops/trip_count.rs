//! Trip-count formulas and iteration-type selection.

use super::{arith, fold, TripCount};
use crate::ast::{BinaryOp, Expr, IntType, Ty};

/// Bounds and step of one loop after normalization
#[derive(Debug, Clone, Copy)]
pub struct TripCountInput<'a> {
    /// Initial value
    pub lower: &'a Expr,
    /// Bound
    pub upper: &'a Expr,
    /// Step, positive when constant
    pub step: &'a Expr,
    /// Counter ascends
    pub is_less: bool,
    /// Strict comparison
    pub strict: bool,
    /// Arithmetic type of the counter
    pub counter: IntType,
}

impl TripCountInput<'_> {
    /// Widest integer operand, counter included
    fn operand_bits(&self) -> u16 {
        [self.lower, self.upper, self.step]
            .iter()
            .filter_map(|e| e.ty.int_type())
            .map(|it| it.bits)
            .fold(self.counter.bits, u16::max)
    }
}

/// `lower < upper` (or `<=`, `>`, `>=`) for the normalized direction
pub fn precondition(lower: &Expr, upper: &Expr, is_less: bool, strict: bool) -> Expr {
    let op = match (is_less, strict) {
        (true, true) => BinaryOp::Lt,
        (true, false) => BinaryOp::Le,
        (false, true) => BinaryOp::Gt,
        (false, false) => BinaryOp::Ge,
    };
    Expr::binary(op, lower.clone(), upper.clone())
}

/// Trip count for constant operands, `None` on overflow or a non-positive
/// step
pub fn constant_trip_count(
    lower: i128,
    upper: i128,
    step: i128,
    is_less: bool,
    strict: bool,
) -> Option<u128> {
    if step <= 0 {
        return None;
    }
    let (from, to) = if is_less { (lower, upper) } else { (upper, lower) };
    let runs = if strict { from < to } else { from <= to };
    if !runs {
        return Some(0);
    }
    let span = to
        .checked_sub(from)?
        .checked_sub(i128::from(strict))?
        .checked_add(step)?;
    u128::try_from(span / step).ok()
}

/// Intermediate values of the formula, for the overflow check
fn intermediates(lower: i128, upper: i128, step: i128, is_less: bool, strict: bool) -> Option<[i128; 3]> {
    let (from, to) = if is_less { (lower, upper) } else { (upper, lower) };
    let diff = to.checked_sub(from)?;
    let adjusted = diff.checked_sub(i128::from(strict))?;
    let total = adjusted.checked_add(step)?;
    Some([diff, adjusted, total])
}

/// Unsigned iteration type for `operand_bits`-wide operands, capped at the
/// backend width
pub fn iteration_type(operand_bits: u16, iteration_width: u16) -> IntType {
    let bits = if operand_bits <= 32 { 32 } else { 64 };
    IntType::unsigned(bits.min(iteration_width))
}

fn int_ty(it: IntType) -> Ty {
    Ty::int(it.bits, it.signed)
}

/// Trip count of one normalized loop.
///
/// When every operand is constant and all intermediates fit one bit wider
/// than the counter type, the count keeps the counter type. Otherwise it is
/// computed in an unsigned type sized from the operands.
pub fn compute(input: &TripCountInput<'_>, iteration_width: u16) -> TripCount {
    let constants = (
        fold::eval_const(input.lower),
        fold::eval_const(input.upper),
        fold::eval_const(input.step),
    );
    let mut value = None;
    let mut keeps_counter_type = false;
    if let (Some(lower), Some(upper), Some(step)) = constants {
        value = constant_trip_count(lower, upper, step, input.is_less, input.strict);
        let wide = input.counter.widened();
        keeps_counter_type = value
            .and_then(|v| i128::try_from(v).ok())
            .map(|v| input.counter.contains(v))
            .unwrap_or(false)
            && [lower, upper, step].iter().all(|v| wide.contains(*v))
            && intermediates(lower, upper, step, input.is_less, input.strict)
                .map(|vals| vals.iter().all(|v| wide.contains(*v)))
                .unwrap_or(false);
    }

    let ty = if keeps_counter_type {
        input.counter
    } else {
        let promoted = iteration_type(input.operand_bits(), iteration_width);
        tracing::debug!(counter = %input.counter, iteration = %promoted, "trip count promoted");
        promoted
    };
    if let Some(v) = value {
        if i128::try_from(v).map(|v| !ty.contains(v)).unwrap_or(true) {
            tracing::warn!(trip_count = v, ty = %ty, "trip count exceeds the iteration type");
        }
    }

    let t = int_ty(ty);
    let (from, to) = if input.is_less {
        (input.lower, input.upper)
    } else {
        (input.upper, input.lower)
    };
    let location = input.lower.location;
    let mut span = arith(BinaryOp::Sub, to.clone(), from.clone(), &t);
    if input.strict {
        span = arith(BinaryOp::Sub, span, Expr::int(1, t.clone(), location), &t);
    }
    span = arith(BinaryOp::Add, span, input.step.clone(), &t);
    let count = arith(BinaryOp::Div, span, input.step.clone(), &t);
    let guard = precondition(input.lower, input.upper, input.is_less, input.strict);
    let expr = Expr::conditional(guard, count, Expr::int(0, t, location));
    TripCount { expr, ty, value }
}

/// Product of the trip counts of a collapsed nest
pub fn product(counts: &[TripCount], iteration_width: u16) -> TripCount {
    let value = counts
        .iter()
        .try_fold(1u128, |acc, c| c.value.and_then(|v| acc.checked_mul(v)));
    let ty = match counts {
        [single] => single.ty,
        _ => {
            let widest = counts.iter().map(|c| c.ty.bits).max().unwrap_or(32);
            let fits_32 = value.map(|v| v <= u128::from(u32::MAX)).unwrap_or(false);
            let bits = if widest <= 32 && fits_32 { 32 } else { 64 };
            IntType::unsigned(bits.min(iteration_width))
        }
    };
    let t = int_ty(ty);
    let expr = counts
        .iter()
        .map(|c| c.expr.clone())
        .reduce(|acc, e| arith(BinaryOp::Mul, acc, e, &t))
        .map(|e| e.cast(t.clone()))
        .unwrap_or_else(|| Expr::int(1, t.clone(), Default::default()));
    TripCount { expr, ty, value }
}
