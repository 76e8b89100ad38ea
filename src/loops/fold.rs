//! Constant evaluation of bound and step expressions.
//!
//! Arithmetic is done in `i128` with checked operations; any overflow,
//! division by zero or unknown variable makes the whole expression
//! non-constant.

use crate::ast::{BinaryOp, DeclId, Expr, ExprKind, UnaryOp};

/// Variable values available during evaluation
pub trait Bindings {
    /// Value of `var`, if known
    fn value_of(&self, var: DeclId) -> Option<i128>;
}

impl Bindings for () {
    fn value_of(&self, _var: DeclId) -> Option<i128> {
        None
    }
}

impl Bindings for [(DeclId, i128)] {
    fn value_of(&self, var: DeclId) -> Option<i128> {
        self.iter().find(|(d, _)| *d == var).map(|(_, v)| *v)
    }
}

impl Bindings for Vec<(DeclId, i128)> {
    fn value_of(&self, var: DeclId) -> Option<i128> {
        self.as_slice().value_of(var)
    }
}

/// Evaluates an expression without variable bindings
pub fn eval_const(expr: &Expr) -> Option<i128> {
    eval(expr, &())
}

/// Evaluates an expression with `bindings` for variable references
pub fn eval<B: Bindings + ?Sized>(expr: &Expr, bindings: &B) -> Option<i128> {
    match &expr.kind {
        ExprKind::IntLiteral(v) => Some(*v),
        ExprKind::BoolLiteral(b) => Some(i128::from(*b)),
        ExprKind::DeclRef(id) => bindings.value_of(*id),
        ExprKind::Cast(inner) | ExprKind::Paren(inner) => eval(inner, bindings),
        ExprKind::Construct(args) if args.len() == 1 => eval(&args[0], bindings),
        ExprKind::Unary { op, operand } => {
            let v = eval(operand, bindings)?;
            match op {
                UnaryOp::Neg => v.checked_neg(),
                UnaryOp::Not => Some(i128::from(v == 0)),
                _ => None,
            }
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let l = eval(lhs, bindings)?;
            let r = eval(rhs, bindings)?;
            binary(*op, l, r)
        }
        ExprKind::Conditional {
            cond,
            then_expr,
            else_expr,
        } => {
            if eval(cond, bindings)? != 0 {
                eval(then_expr, bindings)
            } else {
                eval(else_expr, bindings)
            }
        }
        _ => None,
    }
}

fn binary(op: BinaryOp, l: i128, r: i128) -> Option<i128> {
    match op {
        BinaryOp::Add => l.checked_add(r),
        BinaryOp::Sub => l.checked_sub(r),
        BinaryOp::Mul => l.checked_mul(r),
        BinaryOp::Div => l.checked_div(r),
        BinaryOp::Rem => l.checked_rem(r),
        BinaryOp::Lt => Some(i128::from(l < r)),
        BinaryOp::Le => Some(i128::from(l <= r)),
        BinaryOp::Gt => Some(i128::from(l > r)),
        BinaryOp::Ge => Some(i128::from(l >= r)),
        BinaryOp::Eq => Some(i128::from(l == r)),
        BinaryOp::Ne => Some(i128::from(l != r)),
        BinaryOp::And => Some(i128::from(l != 0 && r != 0)),
        BinaryOp::Or => Some(i128::from(l != 0 || r != 0)),
    }
}

/// Whether `expr` is affine in `var`: sums and differences of terms that
/// are either free of `var` or `var` scaled by a `var`-free factor
pub fn is_affine_in(expr: &Expr, var: DeclId) -> bool {
    degree(expr, var).map(|d| d <= 1).unwrap_or(false)
}

fn degree(expr: &Expr, var: DeclId) -> Option<u32> {
    if !expr.references(var) {
        return Some(0);
    }
    match &expr.kind {
        ExprKind::DeclRef(id) if *id == var => Some(1),
        ExprKind::Cast(inner) | ExprKind::Paren(inner) => degree(inner, var),
        ExprKind::Construct(args) if args.len() == 1 => degree(&args[0], var),
        ExprKind::Unary {
            op: UnaryOp::Neg,
            operand,
        } => degree(operand, var),
        ExprKind::Binary {
            op: BinaryOp::Add | BinaryOp::Sub,
            lhs,
            rhs,
        } => Some(degree(lhs, var)?.max(degree(rhs, var)?)),
        ExprKind::Binary {
            op: BinaryOp::Mul,
            lhs,
            rhs,
        } => Some(degree(lhs, var)? + degree(rhs, var)?),
        _ => None,
    }
}
