//! # regionsema - Semantic Analysis for Parallel-Region Directives
//!
//! A semantic-analysis pass for OpenMP-style parallel-region directives. It
//! works on an already-parsed tree: every statement annotated with a directive
//! (`parallel`, `for`, `task`, `target`, `teams`, ...) is a [`Region`], and the
//! pass answers three questions about each one:
//!
//! - **Which data-sharing attribute does each variable have?** Explicit clauses,
//!   predetermined rules, `default`/`defaultmap` and implicit inference are
//!   combined by the [`AttributeResolver`].
//! - **Is the region legally nested?** The [`nesting`] rule table checks the
//!   closely-nesting restrictions between constructs.
//! - **What is the iteration space of its loops?** The [`LoopCanonicalizer`]
//!   normalizes associated `for` loops, computes trip counts and flattens
//!   collapsed nests.
//!
//! Problems in the analyzed program are reported as [`Diagnostic`]s through a
//! [`DiagnosticSink`]. API misuse (unbalanced stack operations, bad options) is
//! reported as an [`Error`].
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! regionsema = "0.4"
//! ```
//!
//! ```rust
//! use regionsema::{analyze, AnalysisOptions, DiagnosticBuffer, DirectiveKind, DsaKind};
//! use regionsema::ast::{TreeBuilder, Ty};
//!
//! # fn main() -> regionsema::Result<()> {
//! let mut b = TreeBuilder::new();
//! let i = b.local("i", Ty::i32());
//! let sum = b.local("sum", Ty::i32());
//! let (lower, upper) = (b.int(0), b.int(100));
//! let body = b.use_vars(&[i, sum]);
//! let lp = b.counted_loop(i, lower, upper, body);
//! let region = b.region(DirectiveKind::ParallelFor).body(lp).build();
//! let program = b.finish(vec![region]);
//!
//! let mut diagnostics = DiagnosticBuffer::new();
//! let report = analyze(&program, &AnalysisOptions::default(), &mut diagnostics)?;
//!
//! let region = &report.regions[0];
//! assert_eq!(region.kind_of(i), Some(DsaKind::Private));
//! assert_eq!(region.kind_of(sum), Some(DsaKind::Shared));
//! assert_eq!(region.loop_nest.as_ref().unwrap().total_trip_count.value, Some(100));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐    ┌──────────────────┐    ┌──────────────────┐
//! │ ast::Program │───▶│ analysis::analyze│───▶│  AnalysisReport  │
//! └──────────────┘    └────────┬─────────┘    └──────────────────┘
//!                              │
//!        ┌─────────────┬───────┴──────┬──────────────┐
//!        ▼             ▼              ▼              ▼
//!   region stack   dsa (clauses,   nesting rules   loops (canonical,
//!                  resolver,                        trip count,
//!                  implicit)                        collapse)
//! ```
//!
//! ## Modules
//!
//! - [`ast`] - Input tree: declarations, types, expressions, statements, regions
//! - [`region`] - Region descriptors and the scope stack
//! - [`dsa`] - Explicit clauses, attribute resolution and implicit inference
//! - [`nesting`] - Closely-nesting rules
//! - [`loops`] - Canonical loop form and collapsed iteration spaces
//! - [`analysis`] - The pass driver and its report
//! - [`diagnostics`] - Diagnostic kinds and sinks
//! - [`error`] - API errors

#![warn(missing_docs)]
#![allow(clippy::new_without_default)]

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod analysis;
pub mod ast;
pub mod diagnostics;
pub mod dsa;
pub mod error;
pub mod loops;
pub mod nesting;
pub mod region;

// Re-export main types
pub use analysis::{analyze, AnalysisOptions, AnalysisReport, LanguageVersion, RegionAnalysis};
pub use ast::{DeclId, DirectiveKind, Program, Region};
pub use diagnostics::{Diagnostic, DiagnosticBuffer, DiagnosticKind, DiagnosticSink};
pub use dsa::{AttributeResolver, ImplicitAttributeInferencer, Resolution};
pub use error::{Error, Result};
pub use loops::{LoopCanonicalizer, LoopNest};
pub use nesting::{check_nesting, NestingVerdict};
pub use region::{DsaKind, RegionScopeStack};
