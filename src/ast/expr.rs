//! Typed expressions.

use super::decl::DeclId;
use super::stmt::Stmt;
use super::ty::Ty;
use super::SourceLocation;
use serde::{Deserialize, Serialize};

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,

    // Relational
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==`
    Eq,
    /// `!=`
    Ne,

    // Logical
    /// `&&`
    And,
    /// `||`
    Or,
}

impl BinaryOp {
    /// Relational operator with operands swapped (`a < b` == `b > a`)
    pub fn flipped(self) -> BinaryOp {
        match self {
            BinaryOp::Lt => BinaryOp::Gt,
            BinaryOp::Le => BinaryOp::Ge,
            BinaryOp::Gt => BinaryOp::Lt,
            BinaryOp::Ge => BinaryOp::Le,
            other => other,
        }
    }

    /// `<`, `<=`, `>`, `>=`, `==`, `!=`
    pub fn is_relational(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne
        )
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// `++x`
    PreInc,
    /// `x++`
    PostInc,
    /// `--x`
    PreDec,
    /// `x--`
    PostDec,
    /// `-x`
    Neg,
    /// `!x`
    Not,
    /// `*x`
    Deref,
    /// `&x`
    AddrOf,
}

impl UnaryOp {
    /// `++`/`--` in either position
    pub fn is_increment_or_decrement(self) -> bool {
        matches!(
            self,
            UnaryOp::PreInc | UnaryOp::PostInc | UnaryOp::PreDec | UnaryOp::PostDec
        )
    }

    /// `--` in either position
    pub fn is_decrement(self) -> bool {
        matches!(self, UnaryOp::PreDec | UnaryOp::PostDec)
    }
}

/// Expression shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    /// Integer literal
    IntLiteral(i128),
    /// Boolean literal
    BoolLiteral(bool),
    /// Reference to a declared variable
    DeclRef(DeclId),
    /// Binary operation
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: Box<Expr>,
        /// Right operand
        rhs: Box<Expr>,
    },
    /// Unary operation
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Expr>,
    },
    /// `lhs = rhs`
    Assign {
        /// Assigned place
        lhs: Box<Expr>,
        /// Value
        rhs: Box<Expr>,
    },
    /// `lhs op= rhs`
    CompoundAssign {
        /// Arithmetic operator
        op: BinaryOp,
        /// Assigned place
        lhs: Box<Expr>,
        /// Value
        rhs: Box<Expr>,
    },
    /// `cond ? then : else`
    Conditional {
        /// Condition
        cond: Box<Expr>,
        /// Value when true
        then_expr: Box<Expr>,
        /// Value when false
        else_expr: Box<Expr>,
    },
    /// Implicit conversion inserted by the type checker
    Cast(Box<Expr>),
    /// Parenthesized expression
    Paren(Box<Expr>),
    /// Copy or converting constructor call (iterator counters)
    Construct(Vec<Expr>),
    /// `base[index]`
    Subscript {
        /// Indexed value
        base: Box<Expr>,
        /// Index
        index: Box<Expr>,
    },
    /// Call of a named function
    Call {
        /// Callee name
        callee: String,
        /// Arguments
        args: Vec<Expr>,
    },
    /// Lambda/closure; its body runs in the context that invokes it
    Closure {
        /// Body
        body: Box<Stmt>,
    },
}

/// A typed expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    /// Shape
    pub kind: ExprKind,
    /// Result type
    pub ty: Ty,
    /// Source location
    pub location: SourceLocation,
    /// Type- or value-dependent (generic context, not yet instantiated)
    #[serde(default)]
    pub dependent: bool,
}

impl Expr {
    /// Creates an expression
    pub fn new(kind: ExprKind, ty: Ty, location: SourceLocation) -> Self {
        Expr {
            kind,
            ty,
            location,
            dependent: false,
        }
    }

    /// Integer literal of type `ty`
    pub fn int(value: i128, ty: Ty, location: SourceLocation) -> Self {
        Expr::new(ExprKind::IntLiteral(value), ty, location)
    }

    /// Reference to `decl` of type `ty`
    pub fn decl_ref(decl: DeclId, ty: Ty, location: SourceLocation) -> Self {
        Expr::new(ExprKind::DeclRef(decl), ty, location)
    }

    /// Binary operation; relational operators produce `bool`, everything else
    /// takes the left operand's type
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        let ty = if op.is_relational() || matches!(op, BinaryOp::And | BinaryOp::Or) {
            Ty::bool()
        } else {
            lhs.ty.clone()
        };
        let location = lhs.location;
        Expr::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
            location,
        )
    }

    /// Unary operation
    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        let ty = if op == UnaryOp::Not {
            Ty::bool()
        } else {
            operand.ty.clone()
        };
        let location = operand.location;
        Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            ty,
            location,
        )
    }

    /// Assignment
    pub fn assign(lhs: Expr, rhs: Expr) -> Self {
        let ty = lhs.ty.clone();
        let location = lhs.location;
        Expr::new(
            ExprKind::Assign {
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
            location,
        )
    }

    /// Compound assignment
    pub fn compound_assign(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        let ty = lhs.ty.clone();
        let location = lhs.location;
        Expr::new(
            ExprKind::CompoundAssign {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
            location,
        )
    }

    /// Conditional expression typed like its `then` arm
    pub fn conditional(cond: Expr, then_expr: Expr, else_expr: Expr) -> Self {
        let ty = then_expr.ty.clone();
        let location = cond.location;
        Expr::new(
            ExprKind::Conditional {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
            ty,
            location,
        )
    }

    /// Implicit conversion to `ty`; a no-op when the type already matches
    pub fn cast(self, ty: Ty) -> Self {
        if self.ty == ty {
            return self;
        }
        let location = self.location;
        Expr::new(ExprKind::Cast(Box::new(self)), ty, location)
    }

    /// Strips implicit casts, parentheses and single-argument constructor
    /// wrappers
    pub fn ignore_implicit(&self) -> &Expr {
        let mut current = self;
        loop {
            match &current.kind {
                ExprKind::Cast(inner) | ExprKind::Paren(inner) => current = inner,
                ExprKind::Construct(args) if args.len() == 1 => current = &args[0],
                _ => return current,
            }
        }
    }

    /// The referenced declaration when this is (a wrapped) variable reference
    pub fn as_decl_ref(&self) -> Option<DeclId> {
        match self.ignore_implicit().kind {
            ExprKind::DeclRef(id) => Some(id),
            _ => None,
        }
    }

    /// Literal integer value after stripping implicit wrappers and negation
    pub fn int_literal(&self) -> Option<i128> {
        match &self.ignore_implicit().kind {
            ExprKind::IntLiteral(v) => Some(*v),
            ExprKind::Unary {
                op: UnaryOp::Neg,
                operand,
            } => operand.int_literal().map(|v| -v),
            _ => None,
        }
    }

    /// Whether `decl` is referenced anywhere inside this expression
    pub fn references(&self, decl: DeclId) -> bool {
        let mut found = false;
        self.visit_decl_refs(&mut |id, _| {
            if id == decl {
                found = true;
            }
        });
        found
    }

    /// Direct sub-expressions (closure bodies are statements and not included)
    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::IntLiteral(_)
            | ExprKind::BoolLiteral(_)
            | ExprKind::DeclRef(_)
            | ExprKind::Closure { .. } => Vec::new(),
            ExprKind::Binary { lhs, rhs, .. }
            | ExprKind::Assign { lhs, rhs }
            | ExprKind::CompoundAssign { lhs, rhs, .. } => vec![&**lhs, &**rhs],
            ExprKind::Unary { operand, .. } => vec![&**operand],
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => vec![&**cond, &**then_expr, &**else_expr],
            ExprKind::Cast(inner) | ExprKind::Paren(inner) => vec![&**inner],
            ExprKind::Construct(args) | ExprKind::Call { args, .. } => args.iter().collect(),
            ExprKind::Subscript { base, index } => vec![&**base, &**index],
        }
    }

    /// Calls `f` for every variable reference, closure bodies included
    pub fn visit_decl_refs(&self, f: &mut dyn FnMut(DeclId, SourceLocation)) {
        match &self.kind {
            ExprKind::IntLiteral(_) | ExprKind::BoolLiteral(_) => {}
            ExprKind::DeclRef(id) => f(*id, self.location),
            ExprKind::Binary { lhs, rhs, .. }
            | ExprKind::Assign { lhs, rhs }
            | ExprKind::CompoundAssign { lhs, rhs, .. } => {
                lhs.visit_decl_refs(f);
                rhs.visit_decl_refs(f);
            }
            ExprKind::Unary { operand, .. } => operand.visit_decl_refs(f),
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                cond.visit_decl_refs(f);
                then_expr.visit_decl_refs(f);
                else_expr.visit_decl_refs(f);
            }
            ExprKind::Cast(inner) | ExprKind::Paren(inner) => inner.visit_decl_refs(f),
            ExprKind::Construct(args) | ExprKind::Call { args, .. } => {
                for arg in args {
                    arg.visit_decl_refs(f);
                }
            }
            ExprKind::Subscript { base, index } => {
                base.visit_decl_refs(f);
                index.visit_decl_refs(f);
            }
            ExprKind::Closure { body } => body.visit_decl_refs(f),
        }
    }

    /// Replaces every reference to `decl` with `replacement`
    pub fn substitute(&self, decl: DeclId, replacement: &Expr) -> Expr {
        let sub = |e: &Expr| Box::new(e.substitute(decl, replacement));
        let kind = match &self.kind {
            ExprKind::DeclRef(id) if *id == decl => {
                return replacement.clone().cast(self.ty.clone());
            }
            ExprKind::Binary { op, lhs, rhs } => ExprKind::Binary {
                op: *op,
                lhs: sub(lhs),
                rhs: sub(rhs),
            },
            ExprKind::Unary { op, operand } => ExprKind::Unary {
                op: *op,
                operand: sub(operand),
            },
            ExprKind::Assign { lhs, rhs } => ExprKind::Assign {
                lhs: sub(lhs),
                rhs: sub(rhs),
            },
            ExprKind::CompoundAssign { op, lhs, rhs } => ExprKind::CompoundAssign {
                op: *op,
                lhs: sub(lhs),
                rhs: sub(rhs),
            },
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => ExprKind::Conditional {
                cond: sub(cond),
                then_expr: sub(then_expr),
                else_expr: sub(else_expr),
            },
            ExprKind::Cast(inner) => ExprKind::Cast(sub(inner)),
            ExprKind::Paren(inner) => ExprKind::Paren(sub(inner)),
            ExprKind::Construct(args) => {
                ExprKind::Construct(args.iter().map(|a| a.substitute(decl, replacement)).collect())
            }
            ExprKind::Call { callee, args } => ExprKind::Call {
                callee: callee.clone(),
                args: args.iter().map(|a| a.substitute(decl, replacement)).collect(),
            },
            ExprKind::Subscript { base, index } => ExprKind::Subscript {
                base: sub(base),
                index: sub(index),
            },
            other => other.clone(),
        };
        Expr {
            kind,
            ty: self.ty.clone(),
            location: self.location,
            dependent: self.dependent,
        }
    }

    /// Whether this expression or any sub-expression is dependent
    pub fn is_dependent(&self) -> bool {
        if self.dependent {
            return true;
        }
        match &self.kind {
            ExprKind::Binary { lhs, rhs, .. }
            | ExprKind::Assign { lhs, rhs }
            | ExprKind::CompoundAssign { lhs, rhs, .. } => lhs.is_dependent() || rhs.is_dependent(),
            ExprKind::Unary { operand, .. } => operand.is_dependent(),
            ExprKind::Cast(inner) | ExprKind::Paren(inner) => inner.is_dependent(),
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => cond.is_dependent() || then_expr.is_dependent() || else_expr.is_dependent(),
            ExprKind::Construct(args) | ExprKind::Call { args, .. } => {
                args.iter().any(Expr::is_dependent)
            }
            ExprKind::Subscript { base, index } => base.is_dependent() || index.is_dependent(),
            _ => false,
        }
    }
}
