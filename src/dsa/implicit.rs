//! Implicit data-sharing attributes for variables referenced but not listed.
//!
//! The region body is scanned once. Closure bodies count as part of the
//! region; nested regions are entered only to learn which variables they
//! privatize, since those references never reach the current region's copy.

use super::resolver::{AttrOrigin, AttributeResolver, Resolution};
use crate::analysis::AnalysisOptions;
use crate::ast::{
    ClauseKind, DeclId, DeclTable, DefaultSharing, DefaultmapBehavior, Expr, ExprKind, MapType,
    Region, SourceLocation, Stmt, StmtKind, VarCategory,
};
use crate::diagnostics::{
    ConflictReason, Diagnostic, DiagnosticArg, DiagnosticKind, DiagnosticSink, UnresolvedContext,
};
use crate::region::{AttrModifier, DsaKind, RegionScopeStack, VariableAttributeEntry};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Clauses the region behaves as if it had been written with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplicitClauses {
    /// Implicit `firstprivate`
    pub firstprivate: Vec<DeclId>,
    /// Implicit `private`
    pub private: Vec<DeclId>,
    /// Implicit `shared`
    pub shared: Vec<DeclId>,
    /// Implicit `map`, per map type
    pub map: BTreeMap<MapType, Vec<DeclId>>,
}

impl ImplicitClauses {
    /// No implicit clause at all
    pub fn is_empty(&self) -> bool {
        self.firstprivate.is_empty()
            && self.private.is_empty()
            && self.shared.is_empty()
            && self.map.is_empty()
    }

    /// Variables implicitly mapped with `map_type`
    pub fn mapped(&self, map_type: MapType) -> &[DeclId] {
        self.map.get(&map_type).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Variables referenced in `body`, canonicalized, in order of first reference.
///
/// References inside a nested region to a variable that region lists in a
/// `private` clause are skipped; other clause items of nested regions count
/// as references at the item's location.
pub fn referenced_variables(decls: &DeclTable, body: &Stmt) -> Vec<(DeclId, SourceLocation)> {
    let mut collector = RefCollector {
        decls,
        seen: BTreeSet::new(),
        out: Vec::new(),
    };
    collector.stmt(body, &BTreeSet::new());
    collector.out
}

struct RefCollector<'a> {
    decls: &'a DeclTable,
    seen: BTreeSet<DeclId>,
    out: Vec<(DeclId, SourceLocation)>,
}

impl RefCollector<'_> {
    fn record(&mut self, var: DeclId, location: SourceLocation, skip: &BTreeSet<DeclId>) {
        let var = self.decls.canonical(var);
        if !skip.contains(&var) && self.seen.insert(var) {
            self.out.push((var, location));
        }
    }

    fn stmt(&mut self, stmt: &Stmt, skip: &BTreeSet<DeclId>) {
        match &stmt.kind {
            StmtKind::Expr(e) => self.expr(e, skip),
            StmtKind::Decl(inits) => {
                for init in inits.iter().filter_map(|d| d.init.as_ref()) {
                    self.expr(init, skip);
                }
            }
            StmtKind::Compound(stmts) => {
                for s in stmts {
                    self.stmt(s, skip);
                }
            }
            StmtKind::For {
                init,
                cond,
                inc,
                body,
            } => {
                if let Some(init) = init {
                    self.stmt(init, skip);
                }
                if let Some(cond) = cond {
                    self.expr(cond, skip);
                }
                if let Some(inc) = inc {
                    self.expr(inc, skip);
                }
                self.stmt(body, skip);
            }
            StmtKind::While { cond, body } => {
                self.expr(cond, skip);
                self.stmt(body, skip);
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.expr(cond, skip);
                self.stmt(then_branch, skip);
                if let Some(e) = else_branch {
                    self.stmt(e, skip);
                }
            }
            StmtKind::Region(region) => self.nested_region(region, skip),
            StmtKind::Null => {}
        }
    }

    fn nested_region(&mut self, region: &Region, skip: &BTreeSet<DeclId>) {
        let mut inner_skip = skip.clone();
        for clause in &region.clauses {
            for item in &clause.items {
                if clause.kind == ClauseKind::Private {
                    inner_skip.insert(self.decls.canonical(item.decl));
                } else {
                    self.record(item.decl, item.location, skip);
                }
            }
            match &clause.kind {
                ClauseKind::If(e) | ClauseKind::NumThreads(e) | ClauseKind::Final(e) => {
                    self.expr(e, skip)
                }
                _ => {}
            }
        }
        if let Some(body) = &region.body {
            self.stmt(body, &inner_skip);
        }
    }

    fn expr(&mut self, expr: &Expr, skip: &BTreeSet<DeclId>) {
        match &expr.kind {
            ExprKind::DeclRef(id) => self.record(*id, expr.location, skip),
            ExprKind::Closure { body } => self.stmt(body, skip),
            _ => {
                for child in expr.children() {
                    self.expr(child, skip);
                }
            }
        }
    }
}

/// Synthesizes attributes for unlisted variables of the innermost region
pub struct ImplicitAttributeInferencer<'a> {
    decls: &'a DeclTable,
    options: &'a AnalysisOptions,
    sink: &'a mut dyn DiagnosticSink,
}

impl<'a> ImplicitAttributeInferencer<'a> {
    /// Creates an inferencer reporting into `sink`
    pub fn new(
        decls: &'a DeclTable,
        options: &'a AnalysisOptions,
        sink: &'a mut dyn DiagnosticSink,
    ) -> Self {
        ImplicitAttributeInferencer {
            decls,
            options,
            sink,
        }
    }

    /// Infers implicit attributes for `region`, whose frame must be the
    /// innermost visible one, and records them in that frame
    pub fn infer(&mut self, stack: &mut RegionScopeStack, region: &Region) -> ImplicitClauses {
        let mut implicit = ImplicitClauses::default();
        let Some(body) = &region.body else {
            return implicit;
        };
        let Some(current) = stack.depth().checked_sub(1) else {
            return implicit;
        };
        for (var, location) in referenced_variables(self.decls, body) {
            self.infer_variable(stack, region, current, var, location, &mut implicit);
        }
        implicit
    }

    fn infer_variable(
        &mut self,
        stack: &mut RegionScopeStack,
        region: &Region,
        current: usize,
        var: DeclId,
        location: SourceLocation,
        implicit: &mut ImplicitClauses,
    ) {
        let Some(decl) = self.decls.get(var) else {
            return;
        };
        let Some(frame) = stack.current() else {
            return;
        };
        if decl.threadprivate || frame.entry(var).is_some() || frame.is_rejected(var) {
            return;
        }
        let default_mode = frame.default_sharing;
        let defaultmap = frame.defaultmap;

        let resolution = AttributeResolver::new(self.decls, self.options).resolve(stack, var);
        if let Resolution::Resolved(attr) = &resolution {
            if attr.is_predetermined() && attr.frame == Some(current) {
                return;
            }
        }

        match (&resolution, default_mode) {
            (Resolution::Unresolved, DefaultSharing::None) => {
                self.unresolved(stack, var, location, UnresolvedContext::DefaultNone);
                return;
            }
            (Resolution::Unresolved, DefaultSharing::Private | DefaultSharing::Firstprivate) => {
                self.unresolved(stack, var, location, UnresolvedContext::DefaultPrivateStatic);
                return;
            }
            (Resolution::Rejected, _) => return,
            _ => {}
        }

        if region.kind.is_target() {
            if decl.declare_target {
                return;
            }
            let category = decl.ty.category();
            match implicit_target_attr(category, defaultmap.get(category)) {
                Some(TargetAttr::Firstprivate) => {
                    self.synthesize(stack, var, location, DsaKind::Firstprivate, AttrModifier::None);
                    implicit.firstprivate.push(var);
                }
                Some(TargetAttr::Map(map_type)) => {
                    self.synthesize(stack, var, location, DsaKind::Mapped, AttrModifier::Map(map_type));
                    implicit.map.entry(map_type).or_default().push(var);
                }
                None => self.unresolved(stack, var, location, UnresolvedContext::DefaultmapNone),
            }
            return;
        }

        if region.kind.is_task() && self.is_enclosing_reduction_item(stack, var) {
            self.sink.report(
                Diagnostic::new(
                    location,
                    DiagnosticKind::AttributeConflict(ConflictReason::ReductionInTask),
                )
                .with(DiagnosticArg::Variable(var))
                .with(DiagnosticArg::Directive(region.kind)),
            );
            if let Some(frame) = stack.current_mut() {
                frame.reject(var);
            }
            return;
        }

        let Resolution::Resolved(attr) = resolution else {
            return;
        };
        let synthesized = match attr.origin {
            AttrOrigin::Inherited => Some(attr.kind),
            AttrOrigin::Default if attr.frame == Some(current) => Some(attr.kind),
            _ => None,
        };
        match synthesized {
            Some(DsaKind::Shared) => {
                self.synthesize(stack, var, location, DsaKind::Shared, AttrModifier::None);
                implicit.shared.push(var);
            }
            Some(DsaKind::Private) => {
                self.synthesize(stack, var, location, DsaKind::Private, AttrModifier::None);
                implicit.private.push(var);
            }
            Some(DsaKind::Firstprivate) => {
                self.synthesize(stack, var, location, DsaKind::Firstprivate, AttrModifier::None);
                implicit.firstprivate.push(var);
            }
            _ => {}
        }
    }

    /// Reduction item of the closest enclosing parallel, worksharing or teams
    /// region
    fn is_enclosing_reduction_item(&self, stack: &mut RegionScopeStack, var: DeclId) -> bool {
        let view = stack.suppress_innermost();
        let found = view
            .innermost_matching(|f| {
                f.kind.is_parallel() || f.kind.is_worksharing() || f.kind.is_teams()
            })
            .map(|(_, f)| f.is_reduction_item(var))
            .unwrap_or(false);
        found
    }

    fn synthesize(
        &mut self,
        stack: &mut RegionScopeStack,
        var: DeclId,
        location: SourceLocation,
        kind: DsaKind,
        modifier: AttrModifier,
    ) {
        let mut entry = VariableAttributeEntry::new(kind, location).with_modifier(modifier);
        if kind.is_privatizing() {
            entry.private_copy = Some(stack.allocate_private_copy());
        }
        if let Some(frame) = stack.current_mut() {
            if frame.insert_implicit(var, entry) {
                tracing::trace!(var = %var, %kind, "implicit attribute");
            }
        }
    }

    fn unresolved(
        &mut self,
        stack: &mut RegionScopeStack,
        var: DeclId,
        location: SourceLocation,
        context: UnresolvedContext,
    ) {
        let directive = stack.current().map(|f| f.kind);
        let mut diag = Diagnostic::new(location, DiagnosticKind::UnresolvedUnderNoDefault(context))
            .with(DiagnosticArg::Variable(var));
        if let Some(kind) = directive {
            diag = diag.with(DiagnosticArg::Directive(kind));
        }
        self.sink.report(diag);
        if let Some(frame) = stack.current_mut() {
            frame.reject(var);
        }
    }
}

enum TargetAttr {
    Firstprivate,
    Map(MapType),
}

/// Implicit treatment of a variable referenced in a target region
fn implicit_target_attr(category: VarCategory, behavior: DefaultmapBehavior) -> Option<TargetAttr> {
    match behavior {
        DefaultmapBehavior::Default => Some(match category {
            VarCategory::Scalar => TargetAttr::Firstprivate,
            VarCategory::Pointer => TargetAttr::Map(MapType::Alloc),
            VarCategory::Aggregate => TargetAttr::Map(MapType::Tofrom),
        }),
        DefaultmapBehavior::Firstprivate => Some(TargetAttr::Firstprivate),
        DefaultmapBehavior::None => None,
        other => other.map_type().map(TargetAttr::Map),
    }
}
