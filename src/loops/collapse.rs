//! Loop nests associated with a directive: collapse/ordered depth, perfect
//! nesting, non-rectangular bounds and the flattened iteration space.

use super::canonical::{self, LoopShape};
use super::trip_count::{self, TripCountInput};
use super::{
    arith, fold, BoundPair, IndexRecovery, LoopFailure, LoopIterationSpace, LoopNest, NestOutcome,
    TripCount,
};
use crate::analysis::AnalysisOptions;
use crate::ast::{BinaryOp, DeclTable, Expr, ExprKind, IntType, Region, Stmt, StmtKind, Ty};
use crate::diagnostics::{DiagnosticSink, LoopPart};

/// Loops associated with a directive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssociatedLoops {
    /// `max(collapse, ordered(n))`
    pub depth: usize,
    /// `collapse` argument
    pub collapse: usize,
    /// `ordered(n)` argument
    pub ordered: Option<usize>,
}

/// Normalizes the loop nests of loop-associated regions
#[derive(Debug, Clone, Copy)]
pub struct LoopCanonicalizer<'a> {
    options: &'a AnalysisOptions,
}

impl<'a> LoopCanonicalizer<'a> {
    /// Creates a canonicalizer
    pub fn new(options: &'a AnalysisOptions) -> Self {
        LoopCanonicalizer { options }
    }

    /// Number of associated loops from `collapse` and `ordered(n)`.
    ///
    /// `Ok(None)` when an argument is dependent.
    pub fn associated_loops(
        &self,
        region: &Region,
    ) -> std::result::Result<Option<AssociatedLoops>, LoopFailure> {
        let collapse = match region.collapse_arg() {
            Some(e) if e.is_dependent() => return Ok(None),
            Some(e) => positive_constant(e)?,
            None => 1,
        };
        let ordered = match region.ordered_arg() {
            Some(Some(e)) if e.is_dependent() => return Ok(None),
            Some(Some(e)) => {
                let n = positive_constant(e)?;
                if n < collapse {
                    return Err(LoopFailure::NonCanonical {
                        part: LoopPart::ClauseArgument,
                        location: e.location,
                    });
                }
                Some(n)
            }
            _ => None,
        };
        Ok(Some(AssociatedLoops {
            depth: collapse.max(ordered.unwrap_or(0)),
            collapse,
            ordered,
        }))
    }

    /// Canonicalizes the loops associated with `region`, reporting every
    /// failure to `sink`.
    ///
    /// Synthesized counters and the flattened induction variable are added
    /// to `decls`.
    pub fn canonicalize_nest(
        &self,
        region: &Region,
        decls: &mut DeclTable,
        sink: &mut dyn DiagnosticSink,
    ) -> NestOutcome {
        let associated = match self.associated_loops(region) {
            Ok(Some(associated)) => associated,
            Ok(None) => return NestOutcome::Deferred,
            Err(failure) => {
                sink.report(failure.to_diagnostic(0));
                return NestOutcome::Invalid;
            }
        };
        let Some(body) = region.body.as_deref() else {
            sink.report(
                LoopFailure::NonCanonical {
                    part: LoopPart::NestDepth,
                    location: region.location,
                }
                .to_diagnostic(0),
            );
            return NestOutcome::Invalid;
        };
        match self.canonicalize_loops(body, associated.depth, decls) {
            Ok(Some(nest)) => NestOutcome::Nest(nest),
            Ok(None) => NestOutcome::Deferred,
            Err(failures) => {
                for (level, failure) in failures {
                    sink.report(failure.to_diagnostic(level));
                }
                NestOutcome::Invalid
            }
        }
    }

    /// Canonicalizes `depth` perfectly nested loops starting at `body`.
    ///
    /// `Ok(None)` when a loop header is dependent. Failures carry the level
    /// they were found at.
    pub fn canonicalize_loops(
        &self,
        body: &Stmt,
        depth: usize,
        decls: &mut DeclTable,
    ) -> std::result::Result<Option<LoopNest>, Vec<(usize, LoopFailure)>> {
        let mut failures = Vec::new();
        let mut levels: Vec<LoopIterationSpace> = Vec::with_capacity(depth);
        let mut current = body.single_child();

        for level in 0..depth {
            let StmtKind::For { body: inner, .. } = &current.kind else {
                failures.push((level, nest_failure(current)));
                break;
            };
            if canonical::header_is_dependent(current) {
                tracing::debug!(level, "dependent loop header, deferring");
                return Ok(None);
            }
            match canonical::recognize(current, decls, self.options) {
                Ok(shape) => match self.build_space(level, shape, &levels, decls) {
                    Ok(space) => levels.push(space),
                    Err(failure) => failures.push((level, failure)),
                },
                Err(errs) => failures.extend(errs.into_iter().map(|f| (level, f))),
            }
            current = inner.single_child();
        }

        if !failures.is_empty() {
            return Err(failures);
        }
        let nest = self.flatten(levels, decls);
        tracing::debug!(
            depth = nest.depth(),
            total = ?nest.total_trip_count.value,
            "loop nest canonicalized"
        );
        Ok(Some(nest))
    }

    fn build_space(
        &self,
        level: usize,
        shape: LoopShape,
        outer: &[LoopIterationSpace],
        decls: &mut DeclTable,
    ) -> std::result::Result<LoopIterationSpace, LoopFailure> {
        let lower_dependency = bound_dependency(&shape.lower, &shape, outer)?;
        let upper_dependency = bound_dependency(&shape.upper, &shape, outer)?;
        let lower_bounds = lower_dependency.map(|idx| bound_pair(&shape.lower, &outer[idx]));
        let upper_bounds = upper_dependency.map(|idx| bound_pair(&shape.upper, &outer[idx]));

        let counter_int = shape
            .counter_ty
            .counter_int_type()
            .unwrap_or(IntType::signed(64));
        let mut space = LoopIterationSpace {
            level,
            counter: shape.counter,
            counter_ty: shape.counter_ty.clone(),
            private_counter: shape.counter,
            precondition: shape.condition.clone(),
            trip_count: TripCount {
                expr: shape.step.clone(),
                ty: counter_int,
                value: None,
            },
            final_condition: (lower_dependency.is_some() || upper_dependency.is_some())
                .then(|| shape.condition.clone()),
            lower: shape.lower,
            upper: shape.upper,
            step: shape.step,
            step_value: shape.step_value,
            subtract: shape.subtract,
            is_less: shape.is_less,
            strict: shape.strict,
            lower_dependency,
            upper_dependency,
            lower_bounds,
            upper_bounds,
            location: shape.location,
        };

        let input = TripCountInput {
            lower: space.effective_lower(),
            upper: space.effective_upper(),
            step: &space.step,
            is_less: space.is_less,
            strict: space.strict,
            counter: counter_int,
        };
        let trip = trip_count::compute(&input, self.options.iteration_width);
        let precondition =
            trip_count::precondition(input.lower, input.upper, space.is_less, space.strict);
        space.trip_count = trip;
        space.precondition = precondition;

        let name = decls
            .get(space.counter)
            .map(|d| format!("{}.private", d.name))
            .unwrap_or_else(|| "counter.private".to_string());
        space.private_counter = decls.synthesize(name, space.counter_ty.clone(), space.location);
        Ok(space)
    }

    fn flatten(&self, levels: Vec<LoopIterationSpace>, decls: &mut DeclTable) -> LoopNest {
        let counts: Vec<TripCount> = levels.iter().map(|l| l.trip_count.clone()).collect();
        let total = trip_count::product(&counts, self.options.iteration_width);
        let iv_ty = Ty::int(total.ty.bits, total.ty.signed);
        let location = levels.first().map(|l| l.location).unwrap_or_default();
        let induction_var = decls.synthesize("iv", iv_ty.clone(), location);

        let mut recovery = Vec::with_capacity(levels.len());
        let mut remainder = Expr::decl_ref(induction_var, iv_ty.clone(), location);
        for (k, space) in levels.iter().enumerate() {
            let inner = &counts[k + 1..];
            let divisor_value = inner
                .iter()
                .try_fold(1u128, |acc, c| c.value.and_then(|v| acc.checked_mul(v)));
            let divisor = if inner.is_empty() {
                Expr::int(1, iv_ty.clone(), location)
            } else {
                trip_count::product(inner, self.options.iteration_width)
                    .expr
                    .cast(iv_ty.clone())
            };
            let index = arith(BinaryOp::Div, remainder.clone(), divisor.clone(), &iv_ty);
            remainder = arith(BinaryOp::Rem, remainder, divisor.clone(), &iv_ty);

            let offset_ty = space
                .counter_ty
                .counter_int_type()
                .map(|it| Ty::int(it.bits, it.signed))
                .unwrap_or_else(Ty::i64);
            let offset = arith(BinaryOp::Mul, index, space.step.clone(), &offset_ty);
            let op = if space.subtract {
                BinaryOp::Sub
            } else {
                BinaryOp::Add
            };
            let counter_value = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(space.lower.clone()),
                    rhs: Box::new(offset),
                },
                space.counter_ty.clone(),
                space.location,
            );
            recovery.push(IndexRecovery {
                level: k,
                divisor,
                divisor_value,
                counter_value,
            });
        }

        LoopNest {
            levels,
            total_trip_count: total,
            induction_var,
            recovery,
        }
    }
}

fn positive_constant(expr: &Expr) -> std::result::Result<usize, LoopFailure> {
    fold::eval_const(expr)
        .filter(|v| *v > 0)
        .and_then(|v| usize::try_from(v).ok())
        .ok_or(LoopFailure::NonCanonical {
            part: LoopPart::ClauseArgument,
            location: expr.location,
        })
}

/// Failure for a level that is not a `for` statement
fn nest_failure(stmt: &Stmt) -> LoopFailure {
    let part = if contains_loop(stmt) {
        LoopPart::NotPerfectlyNested
    } else {
        LoopPart::NestDepth
    };
    LoopFailure::NonCanonical {
        part,
        location: stmt.location,
    }
}

fn contains_loop(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::For { .. } => true,
        StmtKind::Compound(stmts) => stmts.iter().any(contains_loop),
        _ => false,
    }
}

/// Outer level a bound depends on.
///
/// At most one outer counter may appear, the bound must be affine in it,
/// and both counters must support random access.
fn bound_dependency(
    bound: &Expr,
    shape: &LoopShape,
    outer: &[LoopIterationSpace],
) -> std::result::Result<Option<usize>, LoopFailure> {
    let unsupported = LoopFailure::NonRectangularUnsupported {
        location: bound.location,
    };
    let deps: Vec<usize> = outer
        .iter()
        .enumerate()
        .filter(|(_, space)| bound.references(space.counter))
        .map(|(idx, _)| idx)
        .collect();
    match deps.as_slice() {
        [] => Ok(None),
        [idx] => {
            let space = &outer[*idx];
            if !fold::is_affine_in(bound, space.counter)
                || !shape.counter_ty.has_random_access()
                || !space.counter_ty.has_random_access()
            {
                return Err(unsupported);
            }
            Ok(Some(*idx))
        }
        _ => Err(unsupported),
    }
}

/// Min/max of `bound` over the first and last values of `outer`'s counter
fn bound_pair(bound: &Expr, outer: &LoopIterationSpace) -> BoundPair {
    let first = outer.effective_lower().clone();
    let location = bound.location;
    let counter_int = outer
        .counter_ty
        .counter_int_type()
        .unwrap_or(IntType::signed(64));
    let offset_ty = Ty::int(counter_int.bits, counter_int.signed);
    let trip = outer.trip_count.expr.clone().cast(offset_ty.clone());
    let last_index = arith(
        BinaryOp::Sub,
        trip,
        Expr::int(1, offset_ty.clone(), location),
        &offset_ty,
    );
    let offset = arith(BinaryOp::Mul, last_index, outer.step.clone(), &offset_ty);
    let op = if outer.subtract {
        BinaryOp::Sub
    } else {
        BinaryOp::Add
    };
    let last = Expr::new(
        ExprKind::Binary {
            op,
            lhs: Box::new(first.clone()),
            rhs: Box::new(offset),
        },
        outer.counter_ty.clone(),
        location,
    );
    let last_value = last_counter_value(outer);

    let at_first = bound.substitute(outer.counter, &first);
    let at_last = match last_value {
        Some(v) => bound.substitute(outer.counter, &Expr::int(v, outer.counter_ty.clone(), location)),
        None => bound.substitute(outer.counter, &last),
    };
    let first_value = fold::eval_const(&at_first);
    let last_bound_value = fold::eval_const(&at_last);

    match (first_value, last_bound_value) {
        (Some(a), Some(b)) => {
            let (min, max) = if a <= b {
                (at_first, at_last)
            } else {
                (at_last, at_first)
            };
            BoundPair {
                min,
                max,
                min_value: Some(a.min(b)),
                max_value: Some(a.max(b)),
            }
        }
        _ => {
            let pick = |op: BinaryOp| {
                Expr::conditional(
                    Expr::binary(op, at_first.clone(), at_last.clone()),
                    at_first.clone(),
                    at_last.clone(),
                )
            };
            BoundPair {
                min: pick(BinaryOp::Le),
                max: pick(BinaryOp::Ge),
                min_value: None,
                max_value: None,
            }
        }
    }
}

/// Last value the outer counter takes, when its iteration space is constant
fn last_counter_value(outer: &LoopIterationSpace) -> Option<i128> {
    let first = fold::eval_const(outer.effective_lower())?;
    let trip = i128::try_from(outer.trip_count.value?).ok()?;
    let step = outer.step_value?;
    if trip == 0 {
        return Some(first);
    }
    let offset = (trip - 1).checked_mul(step)?;
    if outer.subtract {
        first.checked_sub(offset)
    } else {
        first.checked_add(offset)
    }
}
