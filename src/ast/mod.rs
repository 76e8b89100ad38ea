//! # Input Tree
//!
//! The typed syntax tree consumed by the analysis. Parsing and type checking
//! happen upstream; by the time a tree reaches this crate every variable
//! reference is resolved to a [`DeclId`] and every expression carries its
//! [`Ty`].
//!
//! ```text
//! Program
//!   ├── DeclTable        (declarations: storage, scope, type)
//!   └── Vec<Stmt>
//!         └── Region      (directive kind + clauses + body)
//!               └── Stmt  (loops, blocks, nested regions, ...)
//! ```
//!
//! All node types derive serde `Serialize`/`Deserialize` so a driver can hand
//! trees over as JSON.

pub mod builder;
pub mod clause;
pub mod decl;
pub mod directive;
pub mod expr;
pub mod stmt;
pub mod ty;

pub use builder::{RegionBuilder, TreeBuilder};
pub use clause::{
    Clause, ClauseItem, ClauseKind, ClauseTag, DefaultSharing, DefaultmapBehavior, MapType,
    OrderKind, ReductionOp,
};
pub use decl::{DeclId, DeclScope, DeclTable, StorageClass, VarDecl};
pub use directive::{DirectiveKind, Region};
pub use expr::{BinaryOp, Expr, ExprKind, UnaryOp};
pub use stmt::{DeclInit, Stmt, StmtKind};
pub use ty::{IntType, Ty, TyKind, VarCategory};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position in the host source file
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct SourceLocation {
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
}

impl SourceLocation {
    /// Creates a location
    pub fn new(line: u32, column: u32) -> Self {
        SourceLocation { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A complete translation unit handed to the analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Program {
    /// Every declaration referenced by the tree
    pub decls: DeclTable,
    /// Top-level statements (function bodies flattened by the driver)
    pub body: Vec<Stmt>,
}

impl Program {
    /// Creates a program from a declaration table and statements
    pub fn new(decls: DeclTable, body: Vec<Stmt>) -> Self {
        Program { decls, body }
    }

    /// Deserializes a program from JSON
    pub fn from_json(source: &str) -> crate::Result<Self> {
        serde_json::from_str(source).map_err(|e| crate::Error::Serialization(e.to_string()))
    }

    /// Serializes the program to JSON
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string(self).map_err(|e| crate::Error::Serialization(e.to_string()))
    }
}
