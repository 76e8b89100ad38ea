//! # Analysis Pass
//!
//! Walks a [`Program`] once, in source order, and analyzes every region:
//!
//! ```text
//! region ─▶ nesting check ─▶ push frame ─▶ explicit clauses ─▶ loop nest
//!        ─▶ implicit attributes ─▶ resolve referenced variables
//!        ─▶ nested regions ─▶ pop frame
//! ```
//!
//! Illegal nesting is fatal for the region: it gets no attribute or loop data
//! and its body is skipped. Attribute and loop problems are local; they are
//! reported and the rest of the region is analyzed normally. Regions in an
//! uninstantiated generic context are deferred without diagnostics.
//!
//! ## Usage
//!
//! ```
//! use regionsema::analysis::{analyze, AnalysisOptions};
//! use regionsema::ast::{DirectiveKind, TreeBuilder, Ty};
//! use regionsema::diagnostics::DiagnosticBuffer;
//! use regionsema::region::DsaKind;
//!
//! let mut b = TreeBuilder::new();
//! let total = b.global("total", Ty::i32());
//! let body = b.use_vars(&[total]);
//! let parallel = b.region(DirectiveKind::Parallel).body(body).build();
//! let program = b.finish(vec![parallel]);
//!
//! let mut diagnostics = DiagnosticBuffer::new();
//! let report = analyze(&program, &AnalysisOptions::default(), &mut diagnostics).unwrap();
//! assert!(diagnostics.is_empty());
//! assert_eq!(report.regions[0].attribute(total).unwrap().kind, DsaKind::Shared);
//! ```

pub mod options;

pub use options::{AnalysisOptions, LanguageVersion};

use crate::ast::{
    DeclId, DeclTable, DirectiveKind, Expr, ExprKind, Program, Region, SourceLocation, Stmt,
    StmtKind,
};
use crate::diagnostics::DiagnosticSink;
use crate::dsa::{
    referenced_variables, AttributeResolver, ClauseProcessor, ImplicitAttributeInferencer,
    ImplicitClauses, Resolution, ResolvedAttr,
};
use crate::error::{Error, Result};
use crate::loops::{LoopCanonicalizer, LoopNest, NestOutcome};
use crate::nesting::{check_nesting, NestingQuery, NestingVerdict};
use crate::region::{DsaKind, RegionScopeStack};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// Results
// ============================================================================

/// How far a region was analyzed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionStatus {
    /// Fully analyzed
    Analyzed,
    /// Illegal nesting; nothing else was computed
    InvalidNesting,
    /// Dependent region; nothing was checked
    Deferred,
}

/// Resolved attribute of one variable in one region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableAttribute {
    /// Canonical variable
    pub var: DeclId,
    /// Its attribute
    pub attr: ResolvedAttr,
}

/// Everything the analysis learned about one region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionAnalysis {
    /// Preorder index
    pub id: usize,
    /// Directive
    pub kind: DirectiveKind,
    /// Construct name
    pub name: Option<String>,
    /// Directive location
    pub location: SourceLocation,
    /// Closest enclosing region
    pub parent: Option<usize>,
    /// Number of enclosing regions
    pub depth: usize,
    /// Nesting verdict
    pub nesting: NestingVerdict,
    /// Analysis status
    pub status: RegionStatus,
    /// Variables with an attribute, in order of first reference
    pub attributes: Vec<VariableAttribute>,
    /// Variables left without attribute
    pub unresolved: Vec<DeclId>,
    /// Variables whose clause item was rejected
    pub rejected: Vec<DeclId>,
    /// Synthesized clauses
    pub implicit: ImplicitClauses,
    /// Normalized associated loops
    pub loop_nest: Option<LoopNest>,
    /// A `cancel` targets this region
    pub cancel_present: bool,
}

impl RegionAnalysis {
    fn skeleton(
        id: usize,
        region: &Region,
        parent: Option<usize>,
        depth: usize,
        nesting: NestingVerdict,
        status: RegionStatus,
    ) -> Self {
        RegionAnalysis {
            id,
            kind: region.kind,
            name: region.name.clone(),
            location: region.location,
            parent,
            depth,
            nesting,
            status,
            attributes: Vec::new(),
            unresolved: Vec::new(),
            rejected: Vec::new(),
            implicit: ImplicitClauses::default(),
            loop_nest: None,
            cancel_present: false,
        }
    }

    /// Attribute of `var` in this region
    pub fn attribute(&self, var: DeclId) -> Option<&ResolvedAttr> {
        self.attributes
            .iter()
            .find(|a| a.var == var)
            .map(|a| &a.attr)
    }

    /// Attribute kind of `var` in this region
    pub fn kind_of(&self, var: DeclId) -> Option<DsaKind> {
        self.attribute(var).map(|a| a.kind)
    }
}

/// Result of analyzing a program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Regions in preorder
    pub regions: Vec<RegionAnalysis>,
    /// Declarations, including synthesized counters and induction variables
    pub decls: DeclTable,
}

impl AnalysisReport {
    /// Region by preorder index
    pub fn region(&self, id: usize) -> Option<&RegionAnalysis> {
        self.regions.get(id)
    }

    /// Regions of a given kind
    pub fn regions_of(&self, kind: DirectiveKind) -> impl Iterator<Item = &RegionAnalysis> {
        self.regions.iter().filter(move |r| r.kind == kind)
    }

    /// Serializes the report as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a report from JSON
    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Analyzes every region of `program`, reporting problems to `sink`
pub fn analyze(
    program: &Program,
    options: &AnalysisOptions,
    sink: &mut dyn DiagnosticSink,
) -> Result<AnalysisReport> {
    options.validate()?;
    let mut analyzer = Analyzer::new(program.decls.clone(), options.clone(), sink);
    for stmt in &program.body {
        analyzer.walk_stmt(stmt)?;
    }
    analyzer.finish()
}

/// Single walk over a program; owns the region stack
pub struct Analyzer<'s> {
    decls: DeclTable,
    options: AnalysisOptions,
    stack: RegionScopeStack,
    sink: &'s mut dyn DiagnosticSink,
    regions: Vec<RegionAnalysis>,
    parents: Vec<usize>,
}

impl<'s> Analyzer<'s> {
    /// Creates an analyzer over a declaration table
    pub fn new(decls: DeclTable, options: AnalysisOptions, sink: &'s mut dyn DiagnosticSink) -> Self {
        Analyzer {
            decls,
            options,
            stack: RegionScopeStack::new(),
            sink,
            regions: Vec::new(),
            parents: Vec::new(),
        }
    }

    /// Ends the walk; fails if a region was left open
    pub fn finish(self) -> Result<AnalysisReport> {
        let remaining = self.stack.total_depth();
        if remaining > 0 {
            return Err(Error::UnbalancedStack { remaining });
        }
        Ok(AnalysisReport {
            regions: self.regions,
            decls: self.decls,
        })
    }

    /// Walks a statement outside or inside a region
    pub fn walk_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match &stmt.kind {
            StmtKind::Region(region) => self.walk_region(region, false),
            StmtKind::Expr(e) => self.walk_expr(e),
            StmtKind::Decl(inits) => {
                for init in inits.iter().filter_map(|d| d.init.as_ref()) {
                    self.walk_expr(init)?;
                }
                Ok(())
            }
            StmtKind::Compound(stmts) => {
                for s in stmts {
                    self.walk_stmt(s)?;
                }
                Ok(())
            }
            StmtKind::For {
                init,
                cond,
                inc,
                body,
            } => {
                if let Some(init) = init {
                    self.walk_stmt(init)?;
                }
                for e in cond.iter().chain(inc.iter()) {
                    self.walk_expr(e)?;
                }
                self.walk_stmt(body)
            }
            StmtKind::While { cond, body } => {
                self.walk_expr(cond)?;
                self.walk_stmt(body)
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.walk_expr(cond)?;
                self.walk_stmt(then_branch)?;
                if let Some(e) = else_branch {
                    self.walk_stmt(e)?;
                }
                Ok(())
            }
            StmtKind::Null => Ok(()),
        }
    }

    /// Regions inside closures run in the closure's defining context
    fn walk_expr(&mut self, expr: &Expr) -> Result<()> {
        if let ExprKind::Closure { body } = &expr.kind {
            return self.walk_stmt(body);
        }
        for child in expr.children() {
            self.walk_expr(child)?;
        }
        Ok(())
    }

    /// Analyzes one region and everything nested in it
    pub fn walk_region(&mut self, region: &Region, sole_child: bool) -> Result<()> {
        let id = self.regions.len();
        let parent = self.parents.last().copied();
        let depth = self.stack.depth();

        if region.dependent && self.options.defer_dependent {
            tracing::debug!(kind = %region.kind, "dependent region deferred");
            self.regions.push(RegionAnalysis::skeleton(
                id,
                region,
                parent,
                depth,
                NestingVerdict::Legal,
                RegionStatus::Deferred,
            ));
            return Ok(());
        }

        let query = NestingQuery::for_region(region, sole_child, self.stack.frames());
        let nesting = check_nesting(&query);
        if let Some(diagnostic) = nesting.to_diagnostic(&query, region.location) {
            self.sink.report(diagnostic);
            self.regions.push(RegionAnalysis::skeleton(
                id,
                region,
                parent,
                depth,
                nesting,
                RegionStatus::InvalidNesting,
            ));
            return Ok(());
        }
        if region.kind == DirectiveKind::Cancel {
            self.stack.mark_cancel_target();
        }

        tracing::debug!(kind = %region.kind, depth, "enter region");
        self.stack
            .push(region.kind, region.name.clone(), region.location)?;
        self.declare_locals(region);

        ClauseProcessor::new(&self.decls, &self.options, &mut *self.sink)
            .process(&mut self.stack, region)?;
        let loop_nest = self.canonicalize_loops(region);
        let implicit = ImplicitAttributeInferencer::new(&self.decls, &self.options, &mut *self.sink)
            .infer(&mut self.stack, region);

        let mut analysis =
            RegionAnalysis::skeleton(id, region, parent, depth, nesting, RegionStatus::Analyzed);
        self.resolve_attributes(region, loop_nest.as_ref(), &mut analysis);
        analysis.implicit = implicit;
        analysis.loop_nest = loop_nest;
        self.regions.push(analysis);

        self.parents.push(id);
        if let Some(body) = &region.body {
            match body.as_region() {
                Some(child) => self.walk_region(child, true)?,
                None => self.walk_stmt(body)?,
            }
        }
        self.parents.pop();

        let frame = self.stack.pop()?;
        self.regions[id].cancel_present = frame.flags.cancel_present;
        tracing::debug!(kind = %region.kind, cancel = frame.flags.cancel_present, "leave region");
        Ok(())
    }

    /// Automatic variables declared lexically inside the region
    fn declare_locals(&mut self, region: &Region) {
        let Some(body) = &region.body else {
            return;
        };
        let mut declared = Vec::new();
        body.collect_declared(&mut declared);
        let Some(frame) = self.stack.current_mut() else {
            return;
        };
        for var in declared {
            let var = self.decls.canonical(var);
            if self.decls.get(var).map(|d| d.is_automatic()).unwrap_or(false) {
                frame.declare_local(var);
            }
        }
    }

    /// Normalizes the associated loop nest and registers its counters
    fn canonicalize_loops(&mut self, region: &Region) -> Option<LoopNest> {
        if !region.kind.is_loop_associated() {
            return None;
        }
        let canonicalizer = LoopCanonicalizer::new(&self.options);
        if let Ok(Some(associated)) = canonicalizer.associated_loops(region) {
            if let Some(frame) = self.stack.current_mut() {
                frame.associated_loops = associated.depth;
                frame.ordered_param = associated.ordered;
            }
        }
        let nest = match canonicalizer.canonicalize_nest(region, &mut self.decls, &mut *self.sink) {
            NestOutcome::Nest(nest) => nest,
            NestOutcome::Invalid | NestOutcome::Deferred => return None,
        };

        let predetermined = match (region.kind.is_simd(), nest.depth()) {
            (true, 1) => DsaKind::Linear,
            (true, _) => DsaKind::Lastprivate,
            (false, _) => DsaKind::Private,
        };
        let mut processor = ClauseProcessor::new(&self.decls, &self.options, &mut *self.sink);
        for level in &nest.levels {
            processor.register_loop_counter(&mut self.stack, level.counter, predetermined);
        }
        Some(nest)
    }

    /// Resolves every referenced or listed variable at the region's frame
    fn resolve_attributes(
        &self,
        region: &Region,
        loop_nest: Option<&LoopNest>,
        analysis: &mut RegionAnalysis,
    ) {
        let mut order: Vec<DeclId> = Vec::new();
        if let Some(nest) = loop_nest {
            order.extend(nest.levels.iter().map(|l| l.counter));
        }
        for clause in &region.clauses {
            order.extend(clause.items.iter().map(|item| item.decl));
        }
        if let Some(body) = &region.body {
            order.extend(
                referenced_variables(&self.decls, body)
                    .into_iter()
                    .map(|(var, _)| var),
            );
        }

        let resolver = AttributeResolver::new(&self.decls, &self.options);
        let mut seen = BTreeSet::new();
        for var in order {
            let var = self.decls.canonical(var);
            if !seen.insert(var) {
                continue;
            }
            match resolver.resolve(&self.stack, var) {
                Resolution::Resolved(attr) => analysis.attributes.push(VariableAttribute { var, attr }),
                Resolution::Unresolved => analysis.unresolved.push(var),
                Resolution::Rejected => analysis.rejected.push(var),
            }
        }
        tracing::trace!(
            kind = %region.kind,
            resolved = analysis.attributes.len(),
            unresolved = analysis.unresolved.len(),
            "attributes resolved"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{DefaultSharing, TreeBuilder, Ty};
    use crate::diagnostics::{DiagnosticBuffer, DiagnosticKind, NestingFailure};
    use crate::dsa::AttrOrigin;

    #[test]
    fn test_preorder_ids_and_parents() {
        let mut b = TreeBuilder::new();
        let x = b.global("x", Ty::i32());
        let inner_body = b.use_vars(&[x]);
        let single = b.region(DirectiveKind::Single).body(inner_body).build();
        let barrier = b.region(DirectiveKind::Barrier).build();
        let block = b.block(vec![single, barrier]);
        let parallel = b.region(DirectiveKind::Parallel).body(block).build();
        let program = b.finish(vec![parallel]);

        let mut sink = DiagnosticBuffer::new();
        let report = analyze(&program, &AnalysisOptions::default(), &mut sink).unwrap();
        assert!(sink.is_empty());
        assert_eq!(report.regions.len(), 3);
        assert_eq!(report.regions[0].kind, DirectiveKind::Parallel);
        assert_eq!(report.regions[1].parent, Some(0));
        assert_eq!(report.regions[1].depth, 1);
        assert_eq!(report.regions[2].kind, DirectiveKind::Barrier);
        assert_eq!(report.regions[2].parent, Some(0));
    }

    #[test]
    fn test_illegal_nesting_skips_body() {
        let mut b = TreeBuilder::new();
        let x = b.local("x", Ty::i32());
        let inner = b.use_vars(&[x]);
        let task = b.region(DirectiveKind::Task).body(inner).build();
        let section = b.region(DirectiveKind::Section).body(task).build();
        let program = b.finish(vec![section]);

        let mut sink = DiagnosticBuffer::new();
        let report = analyze(&program, &AnalysisOptions::default(), &mut sink).unwrap();
        assert!(sink.contains(DiagnosticKind::IllegalNesting(NestingFailure::Orphaned)));
        assert_eq!(report.regions.len(), 1);
        assert_eq!(report.regions[0].status, RegionStatus::InvalidNesting);
        assert!(report.regions[0].attributes.is_empty());
    }

    #[test]
    fn test_dependent_region_deferred() {
        let mut b = TreeBuilder::new();
        let x = b.local("x", Ty::i32());
        let body = b.use_vars(&[x]);
        let region = b
            .region(DirectiveKind::Task)
            .default(DefaultSharing::None)
            .dependent()
            .body(body)
            .build();
        let program = b.finish(vec![region]);

        let mut sink = DiagnosticBuffer::new();
        let report = analyze(&program, &AnalysisOptions::default(), &mut sink).unwrap();
        assert!(sink.is_empty());
        assert_eq!(report.regions[0].status, RegionStatus::Deferred);
    }

    #[test]
    fn test_cancel_marks_parent() {
        let mut b = TreeBuilder::new();
        let cancel = b
            .region(DirectiveKind::Cancel)
            .cancels(DirectiveKind::Parallel)
            .build();
        let parallel = b.region(DirectiveKind::Parallel).body(cancel).build();
        let program = b.finish(vec![parallel]);

        let mut sink = DiagnosticBuffer::new();
        let report = analyze(&program, &AnalysisOptions::default(), &mut sink).unwrap();
        assert!(sink.is_empty());
        assert!(report.regions[0].cancel_present);
    }

    #[test]
    fn test_loop_counter_predetermined() {
        let mut b = TreeBuilder::new();
        let i = b.local("i", Ty::i32());
        let n = b.local("n", Ty::i32());
        let (lower, upper) = (b.int(0), b.var(n));
        let body = b.use_vars(&[i]);
        let lp = b.counted_loop(i, lower, upper, body);
        let region = b.region(DirectiveKind::ParallelFor).body(lp).build();
        let program = b.finish(vec![region]);

        let mut sink = DiagnosticBuffer::new();
        let report = analyze(&program, &AnalysisOptions::default(), &mut sink).unwrap();
        assert!(sink.is_empty());
        let analysis = &report.regions[0];
        let attr = analysis.attribute(i).unwrap();
        assert_eq!(attr.kind, DsaKind::Private);
        assert_eq!(attr.origin, AttrOrigin::Predetermined);
        assert_eq!(analysis.kind_of(n), Some(DsaKind::Shared));
        assert_eq!(analysis.loop_nest.as_ref().unwrap().depth(), 1);
    }

    #[test]
    fn test_simd_counter_linear() {
        let mut b = TreeBuilder::new();
        let i = b.local("i", Ty::i32());
        let (lower, upper) = (b.int(0), b.int(8));
        let body = b.use_vars(&[i]);
        let lp = b.counted_loop(i, lower, upper, body);
        let region = b.region(DirectiveKind::Simd).body(lp).build();
        let program = b.finish(vec![region]);

        let mut sink = DiagnosticBuffer::new();
        let report = analyze(&program, &AnalysisOptions::default(), &mut sink).unwrap();
        assert_eq!(report.regions[0].kind_of(i), Some(DsaKind::Linear));
    }

    #[test]
    fn test_invalid_options_rejected() {
        let program = TreeBuilder::new().finish(vec![]);
        let options = AnalysisOptions {
            iteration_width: 16,
            ..AnalysisOptions::default()
        };
        let mut sink = DiagnosticBuffer::new();
        let err = analyze(&program, &options, &mut sink).unwrap_err();
        assert!(matches!(err, Error::InvalidOptions(_)));
    }

    #[test]
    fn test_report_json_round_trip() {
        let mut b = TreeBuilder::new();
        let x = b.global("x", Ty::i32());
        let body = b.use_vars(&[x]);
        let region = b.region(DirectiveKind::Parallel).body(body).build();
        let program = b.finish(vec![region]);
        let mut sink = DiagnosticBuffer::new();
        let report = analyze(&program, &AnalysisOptions::default(), &mut sink).unwrap();
        let json = report.to_json().unwrap();
        assert_eq!(AnalysisReport::from_json(&json).unwrap(), report);
    }
}
