//! Registration of explicit clauses into the current frame.
//!
//! Each list item is checked on its own; an invalid item is reported, marked
//! rejected in the frame and left out of every downstream list while the rest
//! of the region is processed normally.

use super::resolver::{loop_counter_accepts, AttributeResolver};
use crate::analysis::AnalysisOptions;
use crate::ast::{
    Clause, ClauseItem, ClauseKind, ClauseTag, DeclId, DeclTable, DirectiveKind, Region,
};
use crate::diagnostics::{ConflictReason, Diagnostic, DiagnosticArg, DiagnosticKind, DiagnosticSink};
use crate::error::Result;
use crate::region::{
    AttrModifier, DsaKind, EntryInsert, RegionScopeStack, VariableAttributeEntry,
};

/// Applies a region's clauses to the innermost frame of a stack
pub struct ClauseProcessor<'a> {
    decls: &'a DeclTable,
    options: &'a AnalysisOptions,
    sink: &'a mut dyn DiagnosticSink,
}

impl<'a> ClauseProcessor<'a> {
    /// Creates a processor reporting into `sink`
    pub fn new(
        decls: &'a DeclTable,
        options: &'a AnalysisOptions,
        sink: &'a mut dyn DiagnosticSink,
    ) -> Self {
        ClauseProcessor {
            decls,
            options,
            sink,
        }
    }

    /// Registers every clause of `region`; the region's frame must be the
    /// innermost visible one
    pub fn process(&mut self, stack: &mut RegionScopeStack, region: &Region) -> Result<()> {
        self.apply_region_clauses(stack, region);
        for clause in &region.clauses {
            for item in &clause.items {
                self.register_item(stack, region.kind, clause, item)?;
            }
        }
        Ok(())
    }

    /// Non-list clauses: default modes, defaultmap and flags
    fn apply_region_clauses(&mut self, stack: &mut RegionScopeStack, region: &Region) {
        let Some(frame) = stack.current_mut() else {
            return;
        };
        for clause in &region.clauses {
            match &clause.kind {
                ClauseKind::Default(mode) => frame.default_sharing = *mode,
                ClauseKind::Defaultmap { behavior, category } => {
                    if region.kind.is_target() {
                        frame.defaultmap.set(*behavior, *category);
                    } else {
                        self.sink.report(
                            Diagnostic::new(
                                clause.location,
                                DiagnosticKind::AttributeConflict(
                                    ConflictReason::InvalidForDirective,
                                ),
                            )
                            .with(DiagnosticArg::Clause(ClauseTag::Defaultmap))
                            .with(DiagnosticArg::Directive(region.kind)),
                        );
                    }
                }
                ClauseKind::Nowait => frame.flags.nowait = true,
                ClauseKind::Untied => frame.flags.untied = true,
                ClauseKind::Ordered(_) => frame.flags.ordered = true,
                ClauseKind::Order(_) => frame.flags.order_concurrent = true,
                _ => {}
            }
        }
    }

    fn register_item(
        &mut self,
        stack: &mut RegionScopeStack,
        directive: DirectiveKind,
        clause: &Clause,
        item: &ClauseItem,
    ) -> Result<()> {
        let decls = self.decls;
        let var = decls.canonical(item.decl);
        let decl = decls.decl(var)?;
        let tag = clause.kind.tag();

        // Threadprivate variables only travel through copyin/copyprivate.
        match clause.kind {
            ClauseKind::Copyin | ClauseKind::Copyprivate => {
                if clause.kind == ClauseKind::Copyin && !decl.threadprivate {
                    self.conflict(item, var, tag, ConflictReason::NotThreadprivate);
                }
                return Ok(());
            }
            _ if decl.threadprivate && clause.kind.tag() != ClauseTag::Map => {
                self.conflict(item, var, tag, ConflictReason::Threadprivate);
                self.reject(stack, var);
                return Ok(());
            }
            _ => {}
        }

        let Some((kind, modifier)) = self.entry_kind(directive, clause) else {
            return Ok(());
        };

        if (kind == DsaKind::Mapped && !directive.accepts_map())
            || (kind == DsaKind::Linear && !directive.is_loop_associated())
        {
            self.conflict(item, var, tag, ConflictReason::InvalidForDirective);
            self.reject(stack, var);
            return Ok(());
        }

        if clause.kind == ClauseKind::IsDevicePtr && !decl.ty.is_pointer() {
            self.conflict(item, var, tag, ConflictReason::NotPointer);
            self.reject(stack, var);
            return Ok(());
        }

        let is_local = stack.current().map(|f| f.is_local(var)).unwrap_or(false);
        if is_local && clause.kind.reads_original() && kind != DsaKind::Lastprivate {
            self.conflict(item, var, tag, ConflictReason::LocalVariable);
            self.reject(stack, var);
            return Ok(());
        }

        if decl.ty.is_const_not_mutable() && self.writes_const(kind) {
            self.conflict(item, var, tag, ConflictReason::ConstVariable);
            self.reject(stack, var);
            return Ok(());
        }

        if directive.is_plain_worksharing() && self.private_in_enclosing_parallel(stack, var, kind) {
            self.conflict(item, var, tag, ConflictReason::PrivateInParallel);
            self.reject(stack, var);
            return Ok(());
        }

        let mut entry = VariableAttributeEntry::new(kind, item.location).with_modifier(modifier);
        if kind.is_privatizing() {
            entry.private_copy = Some(stack.allocate_private_copy());
        }
        entry.applies_to_pointee = item.section && decl.ty.is_pointer();

        let Some(frame) = stack.current_mut() else {
            return Ok(());
        };
        match frame.insert_explicit(var, entry) {
            EntryInsert::Inserted | EntryInsert::Duplicate => {}
            EntryInsert::Merged => {
                tracing::debug!(var = %var, "firstprivate merged into lastprivate");
            }
            EntryInsert::Conflict(existing) => {
                self.sink.report(
                    Diagnostic::new(
                        item.location,
                        DiagnosticKind::AttributeConflict(ConflictReason::ConflictingClauses),
                    )
                    .with(DiagnosticArg::Variable(var))
                    .with(DiagnosticArg::Attribute(existing.kind))
                    .with(DiagnosticArg::Attribute(kind))
                    .with(DiagnosticArg::Location(existing.location)),
                );
            }
        }
        Ok(())
    }

    /// Attribute recorded for a data clause; `None` for clauses without one
    fn entry_kind(
        &self,
        directive: DirectiveKind,
        clause: &Clause,
    ) -> Option<(DsaKind, AttrModifier)> {
        let entry = match &clause.kind {
            ClauseKind::Private => (DsaKind::Private, AttrModifier::None),
            ClauseKind::Firstprivate | ClauseKind::IsDevicePtr => {
                (DsaKind::Firstprivate, AttrModifier::None)
            }
            ClauseKind::Lastprivate { conditional } => (
                DsaKind::Lastprivate,
                if *conditional {
                    AttrModifier::Conditional
                } else {
                    AttrModifier::None
                },
            ),
            ClauseKind::Shared => (DsaKind::Shared, AttrModifier::None),
            ClauseKind::Reduction(op)
            | ClauseKind::TaskReduction(op)
            | ClauseKind::InReduction(op) => (DsaKind::Reduction, AttrModifier::Reduction(*op)),
            ClauseKind::Linear { step } => {
                let value = match step {
                    Some(e) => e.int_literal(),
                    None => Some(1),
                };
                (DsaKind::Linear, AttrModifier::LinearStep(value))
            }
            ClauseKind::Map(map_type) => (DsaKind::Mapped, AttrModifier::Map(*map_type)),
            _ => return None,
        };
        tracing::trace!(%directive, clause = %clause.kind.tag(), "register clause");
        Some(entry)
    }

    /// Const items cannot appear where the region writes the original
    fn writes_const(&self, kind: DsaKind) -> bool {
        match kind {
            DsaKind::Lastprivate | DsaKind::Reduction | DsaKind::Linear => true,
            DsaKind::Private => self.options.legacy_const_sharing(),
            _ => false,
        }
    }

    /// Worksharing list items checked "as if in the parent": reduction items
    /// must not be private there, firstprivate/lastprivate items must be
    /// neither private nor a reduction item
    fn private_in_enclosing_parallel(
        &self,
        stack: &mut RegionScopeStack,
        var: DeclId,
        kind: DsaKind,
    ) -> bool {
        let forbidden: &[DsaKind] = match kind {
            DsaKind::Reduction => &[DsaKind::Private, DsaKind::Firstprivate, DsaKind::Lastprivate],
            DsaKind::Firstprivate | DsaKind::Lastprivate => &[DsaKind::Private, DsaKind::Reduction],
            _ => return false,
        };
        let view = stack.suppress_innermost();
        let Some((parallel, _)) = view.innermost_matching(|f| f.kind.is_parallel()) else {
            return false;
        };
        let resolution = AttributeResolver::new(self.decls, self.options).resolve(&view, var);
        match resolution.attr() {
            Some(attr) => {
                forbidden.contains(&attr.kind) && attr.frame.map_or(false, |f| f >= parallel)
            }
            None => false,
        }
    }

    /// Registers a loop counter of the current region with its predetermined
    /// kind, reporting explicit clauses that contradict it
    pub fn register_loop_counter(
        &mut self,
        stack: &mut RegionScopeStack,
        counter: DeclId,
        predetermined: DsaKind,
    ) {
        let var = self.decls.canonical(counter);
        let Some(frame) = stack.current_mut() else {
            return;
        };
        if let Some(entry) = frame.entry(var) {
            if !entry.implicit && !loop_counter_accepts(predetermined, entry.kind) {
                self.sink.report(
                    Diagnostic::new(
                        entry.location,
                        DiagnosticKind::AttributeConflict(ConflictReason::LoopCounter),
                    )
                    .with(DiagnosticArg::Variable(var))
                    .with(DiagnosticArg::Attribute(entry.kind))
                    .with(DiagnosticArg::Attribute(predetermined)),
                );
            }
        }
        frame.register_loop_control(var, predetermined);
    }

    fn conflict(&mut self, item: &ClauseItem, var: DeclId, tag: ClauseTag, reason: ConflictReason) {
        self.sink.report(
            Diagnostic::new(item.location, DiagnosticKind::AttributeConflict(reason))
                .with(DiagnosticArg::Variable(var))
                .with(DiagnosticArg::Clause(tag)),
        );
    }

    fn reject(&self, stack: &mut RegionScopeStack, var: DeclId) {
        if let Some(frame) = stack.current_mut() {
            frame.reject(var);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{DefaultSharing, MapType, ReductionOp, SourceLocation, TreeBuilder, Ty};
    use crate::diagnostics::DiagnosticBuffer;

    fn push(stack: &mut RegionScopeStack, region: &Region) {
        stack
            .push(region.kind, region.name.clone(), region.location)
            .unwrap();
    }

    fn run(
        b: &TreeBuilder,
        stack: &mut RegionScopeStack,
        region: &Region,
        opts: &AnalysisOptions,
    ) -> DiagnosticBuffer {
        let mut diags = DiagnosticBuffer::new();
        push(stack, region);
        ClauseProcessor::new(b.decls(), opts, &mut diags)
            .process(stack, region)
            .unwrap();
        diags
    }

    #[test]
    fn test_explicit_entries_and_default() {
        let mut b = TreeBuilder::new();
        let x = b.local("x", Ty::i32());
        let s = b.local("s", Ty::i32());
        let region = b
            .region(DirectiveKind::Parallel)
            .private(&[x])
            .reduction(ReductionOp::Add, &[s])
            .default(DefaultSharing::None)
            .build_region();
        let mut stack = RegionScopeStack::new();
        let diags = run(&b, &mut stack, &region, &AnalysisOptions::default());
        assert!(diags.is_empty());
        let frame = stack.current().unwrap();
        assert_eq!(frame.default_sharing, DefaultSharing::None);
        assert_eq!(frame.entry(x).unwrap().kind, DsaKind::Private);
        assert!(frame.entry(x).unwrap().private_copy.is_some());
        assert_eq!(
            frame.entry(s).unwrap().modifier,
            AttrModifier::Reduction(ReductionOp::Add)
        );
    }

    #[test]
    fn test_conflicting_clauses() {
        let mut b = TreeBuilder::new();
        let x = b.local("x", Ty::i32());
        let region = b
            .region(DirectiveKind::Parallel)
            .private(&[x])
            .shared(&[x])
            .build_region();
        let mut stack = RegionScopeStack::new();
        let diags = run(&b, &mut stack, &region, &AnalysisOptions::default());
        assert!(diags.contains(DiagnosticKind::AttributeConflict(
            ConflictReason::ConflictingClauses
        )));
        assert_eq!(stack.current().unwrap().entry(x).unwrap().kind, DsaKind::Private);
    }

    #[test]
    fn test_firstprivate_lastprivate_merge_is_silent() {
        let mut b = TreeBuilder::new();
        let x = b.local("x", Ty::i32());
        let region = b
            .region(DirectiveKind::ParallelFor)
            .firstprivate(&[x])
            .lastprivate(&[x])
            .build_region();
        let mut stack = RegionScopeStack::new();
        let diags = run(&b, &mut stack, &region, &AnalysisOptions::default());
        assert!(diags.is_empty());
        let entry = stack.current().unwrap().entry(x).unwrap();
        assert_eq!(entry.kind, DsaKind::Lastprivate);
        assert!(entry.merged_firstprivate);
    }

    #[test]
    fn test_threadprivate_restrictions() {
        let mut b = TreeBuilder::new();
        let tp = b.threadprivate("tp", Ty::i32());
        let g = b.global("g", Ty::i32());
        let region = b
            .region(DirectiveKind::Parallel)
            .private(&[tp])
            .copyin(&[g])
            .build_region();
        let mut stack = RegionScopeStack::new();
        let diags = run(&b, &mut stack, &region, &AnalysisOptions::default());
        assert!(diags.contains(DiagnosticKind::AttributeConflict(
            ConflictReason::Threadprivate
        )));
        assert!(diags.contains(DiagnosticKind::AttributeConflict(
            ConflictReason::NotThreadprivate
        )));
        assert!(stack.current().unwrap().is_rejected(tp));
    }

    #[test]
    fn test_local_variable_in_outer_value_clause() {
        let mut b = TreeBuilder::new();
        let t = b.block_local("t", Ty::i32());
        let region = b
            .region(DirectiveKind::Parallel)
            .firstprivate(&[t])
            .build_region();
        let mut stack = RegionScopeStack::new();
        push(&mut stack, &region);
        stack.current_mut().unwrap().declare_local(t);
        let mut diags = DiagnosticBuffer::new();
        let opts = AnalysisOptions::default();
        ClauseProcessor::new(b.decls(), &opts, &mut diags)
            .process(&mut stack, &region)
            .unwrap();
        assert!(diags.contains(DiagnosticKind::AttributeConflict(
            ConflictReason::LocalVariable
        )));
    }

    #[test]
    fn test_const_in_reduction() {
        let mut b = TreeBuilder::new();
        let c = b.local("c", Ty::i32().as_const());
        let region = b
            .region(DirectiveKind::Parallel)
            .reduction(ReductionOp::Add, &[c])
            .build_region();
        let mut stack = RegionScopeStack::new();
        let diags = run(&b, &mut stack, &region, &AnalysisOptions::default());
        assert!(diags.contains(DiagnosticKind::AttributeConflict(
            ConflictReason::ConstVariable
        )));
    }

    #[test]
    fn test_reduction_on_worksharing_of_parallel_private() {
        let mut b = TreeBuilder::new();
        let x = b.local("x", Ty::i32());
        let parallel = b.region(DirectiveKind::Parallel).private(&[x]).build_region();
        let for_region = b
            .region(DirectiveKind::For)
            .reduction(ReductionOp::Add, &[x])
            .build_region();
        let opts = AnalysisOptions::default();
        let mut stack = RegionScopeStack::new();
        let outer = run(&b, &mut stack, &parallel, &opts);
        assert!(outer.is_empty());
        let inner = run(&b, &mut stack, &for_region, &opts);
        assert!(inner.contains(DiagnosticKind::AttributeConflict(
            ConflictReason::PrivateInParallel
        )));
        assert_eq!(stack.depth(), 2);
    }

    #[test]
    fn test_map_only_on_target() {
        let mut b = TreeBuilder::new();
        let a = b.local("a", Ty::f64().array_of(Some(8)));
        let target = b.region(DirectiveKind::Target).map(MapType::To, &[a]).build_region();
        let parallel = b.region(DirectiveKind::Parallel).map(MapType::To, &[a]).build_region();
        let opts = AnalysisOptions::default();

        let mut stack = RegionScopeStack::new();
        let diags = run(&b, &mut stack, &target, &opts);
        assert!(diags.is_empty());
        assert_eq!(
            stack.current().unwrap().entry(a).unwrap().modifier,
            AttrModifier::Map(MapType::To)
        );

        let mut stack = RegionScopeStack::new();
        let diags = run(&b, &mut stack, &parallel, &opts);
        assert!(diags.contains(DiagnosticKind::AttributeConflict(
            ConflictReason::InvalidForDirective
        )));
    }

    #[test]
    fn test_pointer_section_applies_to_pointee() {
        let mut b = TreeBuilder::new();
        let p = b.local("p", Ty::i32().pointer_to());
        let mut region = b.region(DirectiveKind::Parallel).build_region();
        region.clauses.push(Clause::new(
            ClauseKind::Reduction(ReductionOp::Add),
            vec![ClauseItem {
                decl: p,
                location: SourceLocation::new(5, 20),
                section: true,
            }],
            SourceLocation::new(5, 10),
        ));
        let mut stack = RegionScopeStack::new();
        run(&b, &mut stack, &region, &AnalysisOptions::default());
        assert!(stack.current().unwrap().entry(p).unwrap().applies_to_pointee);
    }

    #[test]
    fn test_loop_counter_conflict() {
        let mut b = TreeBuilder::new();
        let i = b.local("i", Ty::i32());
        let region = b.region(DirectiveKind::For).shared(&[i]).build_region();
        let opts = AnalysisOptions::default();
        let mut stack = RegionScopeStack::new();
        let mut diags = run(&b, &mut stack, &region, &opts);
        ClauseProcessor::new(b.decls(), &opts, &mut diags).register_loop_counter(
            &mut stack,
            i,
            DsaKind::Private,
        );
        assert!(diags.contains(DiagnosticKind::AttributeConflict(
            ConflictReason::LoopCounter
        )));
        let resolver = AttributeResolver::new(b.decls(), &opts);
        assert_eq!(resolver.resolve(&stack, i).kind(), Some(DsaKind::Private));
    }
}
