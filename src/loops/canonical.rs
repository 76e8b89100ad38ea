//! Canonical form recognition for a single `for` statement.
//!
//! The init, condition and increment checks are independent: every failing
//! part is reported, not only the first one.

use super::{fold, LoopFailure};
use crate::analysis::AnalysisOptions;
use crate::ast::{
    BinaryOp, DeclId, DeclTable, Expr, ExprKind, SourceLocation, Stmt, StmtKind, Ty,
};
use crate::diagnostics::LoopPart;

/// Recognized shape of one loop before bounds are resolved against outer
/// levels
#[derive(Debug, Clone, PartialEq)]
pub struct LoopShape {
    /// Counter variable
    pub counter: DeclId,
    /// Counter type
    pub counter_ty: Ty,
    /// Initial value
    pub lower: Expr,
    /// Bound from the condition
    pub upper: Expr,
    /// Step, positive when constant
    pub step: Expr,
    /// Constant step
    pub step_value: Option<i128>,
    /// Counter moves downwards
    pub subtract: bool,
    /// Counter ascends
    pub is_less: bool,
    /// Strict comparison
    pub strict: bool,
    /// Original condition
    pub condition: Expr,
    /// Location of the `for`
    pub location: SourceLocation,
}

/// Relational shape of the condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    Less { strict: bool },
    Greater { strict: bool },
    NotEqual,
}

/// Whether any of the loop header expressions is dependent
pub fn header_is_dependent(stmt: &Stmt) -> bool {
    let StmtKind::For { init, cond, inc, .. } = &stmt.kind else {
        return false;
    };
    let init_dependent = match init.as_deref().map(|s| &s.kind) {
        Some(StmtKind::Expr(e)) => e.is_dependent(),
        Some(StmtKind::Decl(inits)) => inits
            .iter()
            .filter_map(|d| d.init.as_ref())
            .any(Expr::is_dependent),
        _ => false,
    };
    init_dependent
        || cond.as_ref().map(Expr::is_dependent).unwrap_or(false)
        || inc.as_ref().map(Expr::is_dependent).unwrap_or(false)
}

/// Recognizes the canonical form of the `for` statement `stmt`
pub fn recognize(
    stmt: &Stmt,
    decls: &DeclTable,
    options: &AnalysisOptions,
) -> std::result::Result<LoopShape, Vec<LoopFailure>> {
    let StmtKind::For { init, cond, inc, .. } = &stmt.kind else {
        return Err(vec![failure(LoopPart::NestDepth, stmt.location)]);
    };
    let mut failures = Vec::new();

    let init_location = init.as_ref().map(|s| s.location).unwrap_or(stmt.location);
    let init_part = init.as_deref().and_then(match_init);
    let counter = match &init_part {
        Some((counter, _)) => Some(*counter),
        None => {
            failures.push(failure(LoopPart::Init, init_location));
            inc.as_ref().and_then(increment_target)
        }
    };
    let Some(counter) = counter else {
        let location = inc.as_ref().map(|e| e.location).unwrap_or(stmt.location);
        failures.push(failure(LoopPart::Increment, location));
        return Err(failures);
    };

    let counter_ty = match decls.get(counter) {
        Some(decl) if decl.ty.is_valid_counter() => Some(decl.ty.clone()),
        _ => {
            failures.push(failure(LoopPart::CounterType, init_location));
            None
        }
    };
    let lower = match init_part {
        Some((_, lower)) if lower.references(counter) => {
            failures.push(failure(LoopPart::Init, init_location));
            None
        }
        Some((_, lower)) => Some(lower),
        None => None,
    };

    let cond_location = cond.as_ref().map(|e| e.location).unwrap_or(stmt.location);
    let relation = cond
        .as_ref()
        .and_then(|c| match_condition(c, counter, options.allows_not_equal()));
    if relation.is_none() {
        failures.push(failure(LoopPart::Condition, cond_location));
    }

    let inc_location = inc.as_ref().map(|e| e.location).unwrap_or(stmt.location);
    let mut increment = inc.as_ref().and_then(|e| match_increment(e, counter));
    if increment.is_none() {
        failures.push(failure(LoopPart::Increment, inc_location));
    }

    let mut step_value = None;
    if let Some((step, subtract)) = increment.as_mut() {
        match fold::eval_const(step) {
            Some(0) => {
                failures.push(failure(LoopPart::Increment, inc_location));
            }
            Some(v) if v < 0 => match v.checked_neg() {
                Some(magnitude) => {
                    *step = Expr::int(magnitude, step.ty.clone(), step.location);
                    *subtract = !*subtract;
                    step_value = Some(magnitude);
                }
                None => failures.push(failure(LoopPart::Increment, inc_location)),
            },
            Some(v) => step_value = Some(v),
            None => {}
        }
    }

    let subtract = increment.as_ref().map(|(_, s)| *s).unwrap_or(false);
    let has_relation = relation.is_some();
    let (is_less, strict, upper) = match relation {
        Some((Relation::Less { strict }, bound)) => (true, strict, Some(bound)),
        Some((Relation::Greater { strict }, bound)) => (false, strict, Some(bound)),
        Some((Relation::NotEqual, bound)) => {
            (!(subtract && step_value.is_some()), true, Some(bound))
        }
        None => (true, true, None),
    };
    if step_value.is_some() && has_relation && is_less == subtract {
        failures.push(LoopFailure::IncompatibleDirection {
            location: inc_location,
        });
    }

    if !failures.is_empty() {
        tracing::debug!(?counter, failures = failures.len(), "loop not in canonical form");
        return Err(failures);
    }
    match (counter_ty, lower, upper, increment, cond) {
        (Some(counter_ty), Some(lower), Some(upper), Some((step, subtract)), Some(condition)) => {
            tracing::trace!(?counter, is_less, strict, subtract, "canonical loop");
            Ok(LoopShape {
                counter,
                counter_ty,
                lower,
                upper,
                step,
                step_value,
                subtract,
                is_less,
                strict,
                condition: condition.clone(),
                location: stmt.location,
            })
        }
        _ => Err(vec![failure(LoopPart::Init, init_location)]),
    }
}

fn failure(part: LoopPart, location: SourceLocation) -> LoopFailure {
    LoopFailure::NonCanonical { part, location }
}

/// `counter = lower` or a declaration with an initializer
fn match_init(stmt: &Stmt) -> Option<(DeclId, Expr)> {
    match &stmt.kind {
        StmtKind::Expr(e) => match &e.ignore_implicit().kind {
            ExprKind::Assign { lhs, rhs } => Some((lhs.as_decl_ref()?, (**rhs).clone())),
            _ => None,
        },
        StmtKind::Decl(inits) => match inits.as_slice() {
            [single] => Some((single.decl, single.init.clone()?)),
            _ => None,
        },
        _ => None,
    }
}

/// Variable the increment writes, used when the init part is unusable
fn increment_target(inc: &Expr) -> Option<DeclId> {
    match &inc.ignore_implicit().kind {
        ExprKind::Unary { op, operand } if op.is_increment_or_decrement() => operand.as_decl_ref(),
        ExprKind::CompoundAssign { lhs, .. } | ExprKind::Assign { lhs, .. } => lhs.as_decl_ref(),
        _ => None,
    }
}

/// `counter relop bound` or `bound relop counter`
fn match_condition(cond: &Expr, counter: DeclId, allows_not_equal: bool) -> Option<(Relation, Expr)> {
    let ExprKind::Binary { op, lhs, rhs } = &cond.ignore_implicit().kind else {
        return None;
    };
    let (op, bound) = if lhs.as_decl_ref() == Some(counter) && !rhs.references(counter) {
        (*op, rhs)
    } else if rhs.as_decl_ref() == Some(counter) && !lhs.references(counter) {
        (op.flipped(), lhs)
    } else {
        return None;
    };
    let relation = match op {
        BinaryOp::Lt => Relation::Less { strict: true },
        BinaryOp::Le => Relation::Less { strict: false },
        BinaryOp::Gt => Relation::Greater { strict: true },
        BinaryOp::Ge => Relation::Greater { strict: false },
        BinaryOp::Ne if allows_not_equal => Relation::NotEqual,
        _ => return None,
    };
    Some((relation, (**bound).clone()))
}

/// Step and subtract flag of `++`, `--`, `+=`, `-=`, `c = c ± s`, `c = s + c`
fn match_increment(inc: &Expr, counter: DeclId) -> Option<(Expr, bool)> {
    let is_counter = |e: &Expr| e.as_decl_ref() == Some(counter);
    match &inc.ignore_implicit().kind {
        ExprKind::Unary { op, operand } if op.is_increment_or_decrement() && is_counter(operand) => {
            let ty = operand
                .ty
                .counter_int_type()
                .map(|it| Ty::int(it.bits, it.signed))
                .unwrap_or_else(Ty::i32);
            Some((Expr::int(1, ty, inc.location), op.is_decrement()))
        }
        ExprKind::CompoundAssign { op, lhs, rhs }
            if is_counter(lhs) && !rhs.references(counter) =>
        {
            match op {
                BinaryOp::Add => Some(((**rhs).clone(), false)),
                BinaryOp::Sub => Some(((**rhs).clone(), true)),
                _ => None,
            }
        }
        ExprKind::Assign { lhs, rhs } if is_counter(lhs) => {
            let ExprKind::Binary { op, lhs: a, rhs: b } = &rhs.ignore_implicit().kind else {
                return None;
            };
            match op {
                BinaryOp::Add if is_counter(a) && !b.references(counter) => {
                    Some(((**b).clone(), false))
                }
                BinaryOp::Add if is_counter(b) && !a.references(counter) => {
                    Some(((**a).clone(), false))
                }
                BinaryOp::Sub if is_counter(a) && !b.references(counter) => {
                    Some(((**b).clone(), true))
                }
                _ => None,
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::LanguageVersion;
    use crate::ast::TreeBuilder;

    fn opts() -> AnalysisOptions {
        AnalysisOptions::default()
    }

    fn parts(err: Vec<LoopFailure>) -> Vec<LoopPart> {
        err.into_iter()
            .filter_map(|f| match f {
                LoopFailure::NonCanonical { part, .. } => Some(part),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_ascending_loop() {
        let mut b = TreeBuilder::new();
        let i = b.local("i", Ty::i32());
        let n = b.local("n", Ty::i32());
        let (lower, upper) = (b.int(0), b.var(n));
        let body = b.use_vars(&[i]);
        let stmt = b.counted_loop(i, lower, upper, body);
        let shape = recognize(&stmt, b.decls(), &opts()).unwrap();
        assert_eq!(shape.counter, i);
        assert_eq!(shape.lower.int_literal(), Some(0));
        assert_eq!(shape.upper.as_decl_ref(), Some(n));
        assert_eq!(shape.step_value, Some(1));
        assert!(shape.is_less && shape.strict && !shape.subtract);
    }

    #[test]
    fn test_descending_loop() {
        let mut b = TreeBuilder::new();
        let i = b.local("i", Ty::i32());
        let n = b.local("n", Ty::i32());
        let start = b.var(n);
        let init = b.assign(i, start);
        let init = b.expr_stmt(init);
        let (iv, zero) = (b.var(i), b.int(0));
        let cond = b.gt(iv, zero);
        let inc = b.post_dec(i);
        let body = b.use_vars(&[i]);
        let stmt = b.for_loop(init, cond, inc, body);
        let shape = recognize(&stmt, b.decls(), &opts()).unwrap();
        assert_eq!(shape.lower.as_decl_ref(), Some(n));
        assert_eq!(shape.upper.int_literal(), Some(0));
        assert!(!shape.is_less && shape.strict && shape.subtract);
    }

    #[test]
    fn test_negative_constant_step_normalized() {
        let mut b = TreeBuilder::new();
        let i = b.local("i", Ty::i32());
        let ten = b.int(10);
        let init = b.assign(i, ten);
        let init = b.expr_stmt(init);
        let (iv, zero) = (b.var(i), b.int(0));
        let cond = b.ge(iv, zero);
        let minus_two = b.int(-2);
        let inc = b.add_assign(i, minus_two);
        let body = b.use_vars(&[i]);
        let stmt = b.for_loop(init, cond, inc, body);
        let shape = recognize(&stmt, b.decls(), &opts()).unwrap();
        assert_eq!(shape.step_value, Some(2));
        assert!(shape.subtract);
        assert!(!shape.is_less && !shape.strict);
    }

    #[test]
    fn test_zero_step_rejected() {
        let mut b = TreeBuilder::new();
        let i = b.local("i", Ty::i32());
        let zero = b.int(0);
        let init = b.assign(i, zero);
        let init = b.expr_stmt(init);
        let (iv, ten) = (b.var(i), b.int(10));
        let cond = b.lt(iv, ten);
        let step = b.int(0);
        let inc = b.add_assign(i, step);
        let body = b.use_vars(&[i]);
        let stmt = b.for_loop(init, cond, inc, body);
        let err = recognize(&stmt, b.decls(), &opts()).unwrap_err();
        assert_eq!(parts(err), vec![LoopPart::Increment]);
    }

    #[test]
    fn test_direction_mismatch() {
        let mut b = TreeBuilder::new();
        let i = b.local("i", Ty::i32());
        let zero = b.int(0);
        let init = b.assign(i, zero);
        let init = b.expr_stmt(init);
        let (iv, ten) = (b.var(i), b.int(10));
        let cond = b.lt(iv, ten);
        let inc = b.post_dec(i);
        let body = b.use_vars(&[i]);
        let stmt = b.for_loop(init, cond, inc, body);
        let err = recognize(&stmt, b.decls(), &opts()).unwrap_err();
        assert!(matches!(err[0], LoopFailure::IncompatibleDirection { .. }));
    }

    #[test]
    fn test_runtime_step_skips_direction_check() {
        let mut b = TreeBuilder::new();
        let i = b.local("i", Ty::i32());
        let s = b.local("s", Ty::i32());
        let zero = b.int(0);
        let init = b.assign(i, zero);
        let init = b.expr_stmt(init);
        let (iv, ten) = (b.var(i), b.int(10));
        let cond = b.lt(iv, ten);
        let step = b.var(s);
        let inc = b.sub_assign(i, step);
        let body = b.use_vars(&[i]);
        let stmt = b.for_loop(init, cond, inc, body);
        let shape = recognize(&stmt, b.decls(), &opts()).unwrap();
        assert_eq!(shape.step_value, None);
        assert!(shape.subtract);
    }

    #[test]
    fn test_not_equal_depends_on_version() {
        let mut b = TreeBuilder::new();
        let i = b.local("i", Ty::i32());
        let zero = b.int(0);
        let init = b.assign(i, zero);
        let init = b.expr_stmt(init);
        let (iv, ten) = (b.var(i), b.int(10));
        let cond = b.ne(iv, ten);
        let inc = b.pre_inc(i);
        let body = b.use_vars(&[i]);
        let stmt = b.for_loop(init, cond, inc, body);

        let shape = recognize(&stmt, b.decls(), &opts()).unwrap();
        assert!(shape.is_less && shape.strict);

        let old = AnalysisOptions::for_version(LanguageVersion::V45);
        let err = recognize(&stmt, b.decls(), &old).unwrap_err();
        assert_eq!(parts(err), vec![LoopPart::Condition]);
    }

    #[test]
    fn test_not_equal_follows_negative_step() {
        let mut b = TreeBuilder::new();
        let i = b.local("i", Ty::i32());
        let ten = b.int(10);
        let init = b.assign(i, ten);
        let init = b.expr_stmt(init);
        let (iv, zero) = (b.var(i), b.int(0));
        let cond = b.ne(iv, zero);
        let inc = b.pre_dec(i);
        let body = b.use_vars(&[i]);
        let stmt = b.for_loop(init, cond, inc, body);
        let shape = recognize(&stmt, b.decls(), &opts()).unwrap();
        assert!(!shape.is_less && shape.subtract);
    }

    #[test]
    fn test_all_parts_reported() {
        let mut b = TreeBuilder::new();
        let i = b.local("i", Ty::i32());
        let j = b.local("j", Ty::i32());
        let init = b.use_vars(&[i]);
        let (jv, ten) = (b.var(j), b.int(10));
        let cond = b.lt(jv, ten);
        let inc = b.post_inc(i);
        let body = b.use_vars(&[i]);
        let stmt = b.for_loop(init, cond, inc, body);
        let err = recognize(&stmt, b.decls(), &opts()).unwrap_err();
        assert_eq!(parts(err), vec![LoopPart::Init, LoopPart::Condition]);
    }

    #[test]
    fn test_assign_forms_of_increment() {
        let mut b = TreeBuilder::new();
        let i = b.local("i", Ty::i32());
        let (iv, two) = (b.var(i), b.int(2));
        let rhs = b.add(two, iv);
        let inc = b.assign(i, rhs);
        let (step, subtract) = match_increment(&inc, i).unwrap();
        assert_eq!(step.int_literal(), Some(2));
        assert!(!subtract);

        let (iv, three) = (b.var(i), b.int(3));
        let rhs = b.sub(iv, three);
        let inc = b.assign(i, rhs);
        let (step, subtract) = match_increment(&inc, i).unwrap();
        assert_eq!(step.int_literal(), Some(3));
        assert!(subtract);

        let (three, iv) = (b.int(3), b.var(i));
        let rhs = b.sub(three, iv);
        let inc = b.assign(i, rhs);
        assert!(match_increment(&inc, i).is_none());
    }

    #[test]
    fn test_declaration_init() {
        let mut b = TreeBuilder::new();
        let i = b.block_local("i", Ty::i64());
        let zero = b.int(0);
        let init = b.decl_stmt(i, Some(zero));
        let (iv, ten) = (b.var(i), b.int(10));
        let cond = b.le(iv, ten);
        let inc = b.pre_inc(i);
        let body = b.use_vars(&[i]);
        let stmt = b.for_loop(init, cond, inc, body);
        let shape = recognize(&stmt, b.decls(), &opts()).unwrap();
        assert!(!shape.strict);
        assert_eq!(shape.counter_ty, Ty::i64());
    }

    #[test]
    fn test_unnegatable_step_rejected() {
        let mut b = TreeBuilder::new();
        let i = b.local("i", Ty::i64());
        let zero = b.int(0);
        let init = b.assign(i, zero);
        let init = b.expr_stmt(init);
        let (iv, ten) = (b.var(i), b.int(10));
        let cond = b.lt(iv, ten);
        let step = b.typed_int(i128::MIN, Ty::i64());
        let inc = b.add_assign(i, step);
        let body = b.use_vars(&[i]);
        let stmt = b.for_loop(init, cond, inc, body);
        let err = recognize(&stmt, b.decls(), &opts()).unwrap_err();
        assert_eq!(parts(err), vec![LoopPart::Increment]);
    }

    #[test]
    fn test_float_counter_rejected() {
        let mut b = TreeBuilder::new();
        let x = b.local("x", Ty::f64());
        let zero = b.int(0);
        let (lower, upper) = (zero, b.int(4));
        let body = b.use_vars(&[x]);
        let stmt = b.counted_loop(x, lower, upper, body);
        let err = recognize(&stmt, b.decls(), &opts()).unwrap_err();
        assert_eq!(parts(err), vec![LoopPart::CounterType]);
    }
}
