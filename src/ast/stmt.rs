//! Statements.

use super::decl::DeclId;
use super::directive::Region;
use super::expr::Expr;
use super::SourceLocation;
use serde::{Deserialize, Serialize};

/// One declarator of a declaration statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclInit {
    /// Declared variable
    pub decl: DeclId,
    /// Initializer, if any
    pub init: Option<Expr>,
}

/// Statement shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    /// Expression statement
    Expr(Expr),
    /// Declaration statement
    Decl(Vec<DeclInit>),
    /// `{ ... }`
    Compound(Vec<Stmt>),
    /// `for (init; cond; inc) body`
    For {
        /// Init statement
        init: Option<Box<Stmt>>,
        /// Condition
        cond: Option<Expr>,
        /// Increment
        inc: Option<Expr>,
        /// Body
        body: Box<Stmt>,
    },
    /// `while (cond) body`
    While {
        /// Condition
        cond: Expr,
        /// Body
        body: Box<Stmt>,
    },
    /// `if (cond) then else`
    If {
        /// Condition
        cond: Expr,
        /// Then branch
        then_branch: Box<Stmt>,
        /// Else branch
        else_branch: Option<Box<Stmt>>,
    },
    /// Directive-annotated region
    Region(Box<Region>),
    /// `;`
    Null,
}

/// A statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    /// Shape
    pub kind: StmtKind,
    /// Source location
    pub location: SourceLocation,
}

impl Stmt {
    /// Creates a statement
    pub fn new(kind: StmtKind, location: SourceLocation) -> Self {
        Stmt { kind, location }
    }

    /// Unwraps blocks holding exactly one statement
    pub fn single_child(&self) -> &Stmt {
        let mut current = self;
        while let StmtKind::Compound(stmts) = &current.kind {
            if stmts.len() != 1 {
                break;
            }
            current = &stmts[0];
        }
        current
    }

    /// The region node when this statement (possibly inside single-statement
    /// blocks) is a region
    pub fn as_region(&self) -> Option<&Region> {
        match &self.single_child().kind {
            StmtKind::Region(region) => Some(region),
            _ => None,
        }
    }

    /// Calls `f` for every variable reference in this statement, including
    /// nested regions' bodies and clause items
    pub fn visit_decl_refs(&self, f: &mut dyn FnMut(DeclId, SourceLocation)) {
        match &self.kind {
            StmtKind::Expr(e) => e.visit_decl_refs(f),
            StmtKind::Decl(inits) => {
                for init in inits.iter().filter_map(|d| d.init.as_ref()) {
                    init.visit_decl_refs(f);
                }
            }
            StmtKind::Compound(stmts) => {
                for s in stmts {
                    s.visit_decl_refs(f);
                }
            }
            StmtKind::For {
                init,
                cond,
                inc,
                body,
            } => {
                if let Some(init) = init {
                    init.visit_decl_refs(f);
                }
                if let Some(cond) = cond {
                    cond.visit_decl_refs(f);
                }
                if let Some(inc) = inc {
                    inc.visit_decl_refs(f);
                }
                body.visit_decl_refs(f);
            }
            StmtKind::While { cond, body } => {
                cond.visit_decl_refs(f);
                body.visit_decl_refs(f);
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                cond.visit_decl_refs(f);
                then_branch.visit_decl_refs(f);
                if let Some(e) = else_branch {
                    e.visit_decl_refs(f);
                }
            }
            StmtKind::Region(region) => {
                for clause in &region.clauses {
                    for item in &clause.items {
                        f(item.decl, item.location);
                    }
                }
                if let Some(body) = &region.body {
                    body.visit_decl_refs(f);
                }
            }
            StmtKind::Null => {}
        }
    }

    /// Collects every variable declared lexically inside this statement
    pub fn collect_declared(&self, out: &mut Vec<DeclId>) {
        match &self.kind {
            StmtKind::Decl(inits) => out.extend(inits.iter().map(|d| d.decl)),
            StmtKind::Compound(stmts) => {
                for s in stmts {
                    s.collect_declared(out);
                }
            }
            StmtKind::For { init, body, .. } => {
                if let Some(init) = init {
                    init.collect_declared(out);
                }
                body.collect_declared(out);
            }
            StmtKind::While { body, .. } => body.collect_declared(out),
            StmtKind::If {
                then_branch,
                else_branch,
                ..
            } => {
                then_branch.collect_declared(out);
                if let Some(e) = else_branch {
                    e.collect_declared(out);
                }
            }
            StmtKind::Region(region) => {
                if let Some(body) = &region.body {
                    body.collect_declared(out);
                }
            }
            StmtKind::Expr(_) | StmtKind::Null => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ty::Ty;

    fn loc() -> SourceLocation {
        SourceLocation::new(1, 1)
    }

    #[test]
    fn test_single_child_unwraps_blocks() {
        let inner = Stmt::new(StmtKind::Null, SourceLocation::new(9, 1));
        let block = Stmt::new(
            StmtKind::Compound(vec![Stmt::new(StmtKind::Compound(vec![inner.clone()]), loc())]),
            loc(),
        );
        assert_eq!(block.single_child(), &inner);
    }

    #[test]
    fn test_collect_declared() {
        let stmt = Stmt::new(
            StmtKind::Compound(vec![
                Stmt::new(
                    StmtKind::Decl(vec![DeclInit {
                        decl: DeclId(4),
                        init: None,
                    }]),
                    loc(),
                ),
                Stmt::new(
                    StmtKind::While {
                        cond: Expr::decl_ref(DeclId(1), Ty::bool(), loc()),
                        body: Box::new(Stmt::new(
                            StmtKind::Decl(vec![DeclInit {
                                decl: DeclId(5),
                                init: Some(Expr::int(0, Ty::i32(), loc())),
                            }]),
                            loc(),
                        )),
                    },
                    loc(),
                ),
            ]),
            loc(),
        );
        let mut out = Vec::new();
        stmt.collect_declared(&mut out);
        assert_eq!(out, vec![DeclId(4), DeclId(5)]);
    }
}
