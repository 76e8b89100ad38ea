//! Convenience builders for assembling trees by hand.
//!
//! Drivers normally deserialize a [`Program`](super::Program); the builders
//! exist for embedding the analysis in tools and for tests. Locations are
//! handed out line by line so every node gets a distinct position.

use super::clause::{
    Clause, ClauseItem, ClauseKind, DefaultSharing, DefaultmapBehavior, MapType, OrderKind,
    ReductionOp,
};
use super::decl::{DeclId, DeclScope, DeclTable, StorageClass};
use super::directive::{DirectiveKind, Region};
use super::expr::{BinaryOp, Expr, ExprKind, UnaryOp};
use super::stmt::{DeclInit, Stmt, StmtKind};
use super::ty::{Ty, VarCategory};
use super::{Program, SourceLocation};

/// Builds declarations, expressions and statements against one table
#[derive(Debug, Default)]
pub struct TreeBuilder {
    decls: DeclTable,
    line: u32,
}

impl TreeBuilder {
    /// Creates an empty builder
    pub fn new() -> Self {
        TreeBuilder {
            decls: DeclTable::new(),
            line: 0,
        }
    }

    /// Next unused location
    pub fn loc(&mut self) -> SourceLocation {
        self.line += 1;
        SourceLocation::new(self.line, 1)
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    /// Function-scope automatic variable
    pub fn local(&mut self, name: &str, ty: Ty) -> DeclId {
        let loc = self.loc();
        self.decls
            .declare(name, ty, StorageClass::Automatic, DeclScope::Function, loc)
    }

    /// Block-scope automatic variable
    pub fn block_local(&mut self, name: &str, ty: Ty) -> DeclId {
        let loc = self.loc();
        self.decls
            .declare(name, ty, StorageClass::Automatic, DeclScope::Block, loc)
    }

    /// File-scope variable
    pub fn global(&mut self, name: &str, ty: Ty) -> DeclId {
        let loc = self.loc();
        self.decls
            .declare(name, ty, StorageClass::Static, DeclScope::File, loc)
    }

    /// `static` local
    pub fn static_local(&mut self, name: &str, ty: Ty) -> DeclId {
        let loc = self.loc();
        self.decls
            .declare(name, ty, StorageClass::Static, DeclScope::Block, loc)
    }

    /// Non-static data member
    pub fn member(&mut self, name: &str, ty: Ty) -> DeclId {
        let loc = self.loc();
        self.decls
            .declare(name, ty, StorageClass::Automatic, DeclScope::Member, loc)
    }

    /// File-scope variable named in a `threadprivate` directive
    pub fn threadprivate(&mut self, name: &str, ty: Ty) -> DeclId {
        let id = self.global(name, ty);
        if let Some(decl) = self.decls.get_mut(id) {
            decl.threadprivate = true;
        }
        id
    }

    /// File-scope variable named in a `declare target` directive
    pub fn declare_target(&mut self, name: &str, ty: Ty) -> DeclId {
        let id = self.global(name, ty);
        if let Some(decl) = self.decls.get_mut(id) {
            decl.declare_target = true;
        }
        id
    }

    /// Declaration table built so far
    pub fn decls(&self) -> &DeclTable {
        &self.decls
    }

    /// Mutable declaration table
    pub fn decls_mut(&mut self) -> &mut DeclTable {
        &mut self.decls
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    /// Reference to `decl`, typed from the table
    pub fn var(&mut self, decl: DeclId) -> Expr {
        let ty = self
            .decls
            .get(decl)
            .map(|d| d.ty.clone())
            .unwrap_or_else(Ty::void);
        let loc = self.loc();
        Expr::decl_ref(decl, ty, loc)
    }

    /// `int` literal
    pub fn int(&mut self, value: i128) -> Expr {
        let loc = self.loc();
        Expr::int(value, Ty::i32(), loc)
    }

    /// Literal of an explicit type
    pub fn typed_int(&mut self, value: i128, ty: Ty) -> Expr {
        let loc = self.loc();
        Expr::int(value, ty, loc)
    }

    /// `a < b`
    pub fn lt(&self, a: Expr, b: Expr) -> Expr {
        Expr::binary(BinaryOp::Lt, a, b)
    }

    /// `a <= b`
    pub fn le(&self, a: Expr, b: Expr) -> Expr {
        Expr::binary(BinaryOp::Le, a, b)
    }

    /// `a > b`
    pub fn gt(&self, a: Expr, b: Expr) -> Expr {
        Expr::binary(BinaryOp::Gt, a, b)
    }

    /// `a >= b`
    pub fn ge(&self, a: Expr, b: Expr) -> Expr {
        Expr::binary(BinaryOp::Ge, a, b)
    }

    /// `a != b`
    pub fn ne(&self, a: Expr, b: Expr) -> Expr {
        Expr::binary(BinaryOp::Ne, a, b)
    }

    /// `a + b`
    pub fn add(&self, a: Expr, b: Expr) -> Expr {
        Expr::binary(BinaryOp::Add, a, b)
    }

    /// `a - b`
    pub fn sub(&self, a: Expr, b: Expr) -> Expr {
        Expr::binary(BinaryOp::Sub, a, b)
    }

    /// `a * b`
    pub fn mul(&self, a: Expr, b: Expr) -> Expr {
        Expr::binary(BinaryOp::Mul, a, b)
    }

    /// `decl = value`
    pub fn assign(&mut self, decl: DeclId, value: Expr) -> Expr {
        let target = self.var(decl);
        Expr::assign(target, value)
    }

    /// `++decl`
    pub fn pre_inc(&mut self, decl: DeclId) -> Expr {
        let v = self.var(decl);
        Expr::unary(UnaryOp::PreInc, v)
    }

    /// `decl++`
    pub fn post_inc(&mut self, decl: DeclId) -> Expr {
        let v = self.var(decl);
        Expr::unary(UnaryOp::PostInc, v)
    }

    /// `--decl`
    pub fn pre_dec(&mut self, decl: DeclId) -> Expr {
        let v = self.var(decl);
        Expr::unary(UnaryOp::PreDec, v)
    }

    /// `decl--`
    pub fn post_dec(&mut self, decl: DeclId) -> Expr {
        let v = self.var(decl);
        Expr::unary(UnaryOp::PostDec, v)
    }

    /// `decl += step`
    pub fn add_assign(&mut self, decl: DeclId, step: Expr) -> Expr {
        let v = self.var(decl);
        Expr::compound_assign(BinaryOp::Add, v, step)
    }

    /// `decl -= step`
    pub fn sub_assign(&mut self, decl: DeclId, step: Expr) -> Expr {
        let v = self.var(decl);
        Expr::compound_assign(BinaryOp::Sub, v, step)
    }

    /// Call that reads every listed variable (`use(a, b, ...)`)
    pub fn use_expr(&mut self, vars: &[DeclId]) -> Expr {
        let args = vars.iter().map(|&v| self.var(v)).collect();
        let loc = self.loc();
        Expr::new(
            ExprKind::Call {
                callee: "use".to_string(),
                args,
            },
            Ty::void(),
            loc,
        )
    }

    /// Closure whose body is `body`
    pub fn closure(&mut self, body: Stmt) -> Expr {
        let loc = self.loc();
        Expr::new(
            ExprKind::Closure {
                body: Box::new(body),
            },
            Ty::void(),
            loc,
        )
    }

    // ========================================================================
    // Statements
    // ========================================================================

    /// Expression statement
    pub fn expr_stmt(&mut self, expr: Expr) -> Stmt {
        let loc = self.loc();
        Stmt::new(StmtKind::Expr(expr), loc)
    }

    /// Statement reading every listed variable
    pub fn use_vars(&mut self, vars: &[DeclId]) -> Stmt {
        let e = self.use_expr(vars);
        self.expr_stmt(e)
    }

    /// Declaration statement
    pub fn decl_stmt(&mut self, decl: DeclId, init: Option<Expr>) -> Stmt {
        let loc = self.loc();
        Stmt::new(StmtKind::Decl(vec![DeclInit { decl, init }]), loc)
    }

    /// `{ ... }`
    pub fn block(&mut self, stmts: Vec<Stmt>) -> Stmt {
        let loc = self.loc();
        Stmt::new(StmtKind::Compound(stmts), loc)
    }

    /// `for (init; cond; inc) body`
    pub fn for_loop(&mut self, init: Stmt, cond: Expr, inc: Expr, body: Stmt) -> Stmt {
        let loc = self.loc();
        Stmt::new(
            StmtKind::For {
                init: Some(Box::new(init)),
                cond: Some(cond),
                inc: Some(inc),
                body: Box::new(body),
            },
            loc,
        )
    }

    /// `for (counter = lower; counter < upper; counter++) body`
    pub fn counted_loop(&mut self, counter: DeclId, lower: Expr, upper: Expr, body: Stmt) -> Stmt {
        let init_expr = self.assign(counter, lower);
        let init = self.expr_stmt(init_expr);
        let c = self.var(counter);
        let cond = self.lt(c, upper);
        let inc = self.post_inc(counter);
        self.for_loop(init, cond, inc, body)
    }

    /// Starts a region of the given kind
    pub fn region(&mut self, kind: DirectiveKind) -> RegionBuilder {
        let loc = self.loc();
        RegionBuilder::new(kind, loc)
    }

    /// Finishes the program
    pub fn finish(self, body: Vec<Stmt>) -> Program {
        Program::new(self.decls, body)
    }

    /// Gives up the declaration table
    pub fn into_decls(self) -> DeclTable {
        self.decls
    }
}

/// Assembles one region node clause by clause
#[derive(Debug, Clone)]
pub struct RegionBuilder {
    region: Region,
}

impl RegionBuilder {
    /// Starts a region at `location`
    pub fn new(kind: DirectiveKind, location: SourceLocation) -> Self {
        RegionBuilder {
            region: Region::new(kind, location),
        }
    }

    fn list(mut self, kind: ClauseKind, vars: &[DeclId]) -> Self {
        let loc = self.region.location;
        let items = vars.iter().map(|&v| ClauseItem::new(v, loc)).collect();
        self.region.clauses.push(Clause::new(kind, items, loc));
        self
    }

    fn flag(self, kind: ClauseKind) -> Self {
        self.list(kind, &[])
    }

    /// `private(vars)`
    pub fn private(self, vars: &[DeclId]) -> Self {
        self.list(ClauseKind::Private, vars)
    }

    /// `firstprivate(vars)`
    pub fn firstprivate(self, vars: &[DeclId]) -> Self {
        self.list(ClauseKind::Firstprivate, vars)
    }

    /// `lastprivate(vars)`
    pub fn lastprivate(self, vars: &[DeclId]) -> Self {
        self.list(ClauseKind::Lastprivate { conditional: false }, vars)
    }

    /// `shared(vars)`
    pub fn shared(self, vars: &[DeclId]) -> Self {
        self.list(ClauseKind::Shared, vars)
    }

    /// `reduction(op: vars)`
    pub fn reduction(self, op: ReductionOp, vars: &[DeclId]) -> Self {
        self.list(ClauseKind::Reduction(op), vars)
    }

    /// `linear(vars[: step])`
    pub fn linear(self, vars: &[DeclId], step: Option<i128>) -> Self {
        let loc = self.region.location;
        let step = step.map(|s| Expr::int(s, Ty::i32(), loc));
        self.list(ClauseKind::Linear { step }, vars)
    }

    /// `copyin(vars)`
    pub fn copyin(self, vars: &[DeclId]) -> Self {
        self.list(ClauseKind::Copyin, vars)
    }

    /// `map(map_type: vars)`
    pub fn map(self, map_type: MapType, vars: &[DeclId]) -> Self {
        self.list(ClauseKind::Map(map_type), vars)
    }

    /// `default(mode)`
    pub fn default(self, mode: DefaultSharing) -> Self {
        self.flag(ClauseKind::Default(mode))
    }

    /// `defaultmap(behavior[: category])`
    pub fn defaultmap(self, behavior: DefaultmapBehavior, category: Option<VarCategory>) -> Self {
        self.flag(ClauseKind::Defaultmap { behavior, category })
    }

    /// `collapse(n)`
    pub fn collapse(self, n: i128) -> Self {
        let e = Expr::int(n, Ty::i32(), self.region.location);
        self.flag(ClauseKind::Collapse(e))
    }

    /// `ordered` or `ordered(n)`
    pub fn ordered(self, n: Option<i128>) -> Self {
        let e = n.map(|n| Expr::int(n, Ty::i32(), self.region.location));
        self.flag(ClauseKind::Ordered(e))
    }

    /// `nowait`
    pub fn nowait(self) -> Self {
        self.flag(ClauseKind::Nowait)
    }

    /// `untied`
    pub fn untied(self) -> Self {
        self.flag(ClauseKind::Untied)
    }

    /// `simd` (on `ordered`)
    pub fn simd(self) -> Self {
        self.flag(ClauseKind::Simd)
    }

    /// `order(concurrent)`
    pub fn order_concurrent(self) -> Self {
        self.flag(ClauseKind::Order(OrderKind::Concurrent))
    }

    /// Arbitrary clause
    pub fn clause(mut self, clause: Clause) -> Self {
        self.region.clauses.push(clause);
        self
    }

    /// Construct name
    pub fn named(mut self, name: &str) -> Self {
        self.region.name = Some(name.to_string());
        self
    }

    /// Construct type named by `cancel`/`cancellation point`
    pub fn cancels(mut self, target: DirectiveKind) -> Self {
        self.region.cancel_target = Some(target);
        self
    }

    /// Marks the region as appearing in an uninstantiated generic context
    pub fn dependent(mut self) -> Self {
        self.region.dependent = true;
        self
    }

    /// Associated statement
    pub fn body(mut self, body: Stmt) -> Self {
        self.region.body = Some(Box::new(body));
        self
    }

    /// The region node
    pub fn build_region(self) -> Region {
        self.region
    }

    /// The region wrapped in a statement
    pub fn build(self) -> Stmt {
        let loc = self.region.location;
        Stmt::new(StmtKind::Region(Box::new(self.region)), loc)
    }
}
