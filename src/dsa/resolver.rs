//! Effective data-sharing attribute of a variable at a stack position.
//!
//! Resolution starts at the innermost visible frame and only ever moves
//! outward. The outward walk is a loop over the frame index; task regions
//! without a `default` clause look at the enclosing context level by level
//! and promote anything that is not shared to firstprivate.

use crate::analysis::AnalysisOptions;
use crate::ast::{DeclId, DeclTable, DefaultSharing, SourceLocation, VarDecl};
use crate::region::{
    AttrModifier, DsaKind, RegionDescriptor, RegionScopeStack, VariableAttributeEntry,
};
use serde::{Deserialize, Serialize};

/// Where a resolved attribute came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttrOrigin {
    /// Listed in a clause
    Explicit,
    /// Synthesized by implicit inference
    Implicit,
    /// Fixed by the variable's nature (local, loop counter, threadprivate, const)
    Predetermined,
    /// `default` clause or the region's default rule
    Default,
    /// Task region inheriting from its enclosing context
    Inherited,
}

/// A successfully resolved attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAttr {
    /// Attribute kind
    pub kind: DsaKind,
    /// Operator, step or map type
    pub modifier: AttrModifier,
    /// Index of the frame that determined the attribute; `None` outside all
    /// regions
    pub frame: Option<usize>,
    /// Location of the clause or declaration that determined it
    pub location: Option<SourceLocation>,
    /// How it was determined
    pub origin: AttrOrigin,
}

impl ResolvedAttr {
    fn new(kind: DsaKind, frame: Option<usize>, origin: AttrOrigin) -> Self {
        ResolvedAttr {
            kind,
            modifier: AttrModifier::None,
            frame,
            location: None,
            origin,
        }
    }

    fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Fixed by the variable's nature rather than by clauses
    pub fn is_predetermined(&self) -> bool {
        self.origin == AttrOrigin::Predetermined
    }
}

/// Outcome of resolving one variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// Attribute determined
    Resolved(ResolvedAttr),
    /// No attribute applies (e.g. under `default(none)`)
    Unresolved,
    /// The variable's clause item was invalid in a visible region
    Rejected,
}

impl Resolution {
    /// The attribute, when resolved
    pub fn attr(&self) -> Option<&ResolvedAttr> {
        match self {
            Resolution::Resolved(a) => Some(a),
            _ => None,
        }
    }

    /// The attribute kind, when resolved
    pub fn kind(&self) -> Option<DsaKind> {
        self.attr().map(|a| a.kind)
    }
}

/// Resolves attributes against a frame slice
#[derive(Debug, Clone, Copy)]
pub struct AttributeResolver<'a> {
    decls: &'a DeclTable,
    options: &'a AnalysisOptions,
}

impl<'a> AttributeResolver<'a> {
    /// Creates a resolver over a declaration table
    pub fn new(decls: &'a DeclTable, options: &'a AnalysisOptions) -> Self {
        AttributeResolver { decls, options }
    }

    /// Resolves `var` at the innermost visible frame of `stack`
    pub fn resolve(&self, stack: &RegionScopeStack, var: DeclId) -> Resolution {
        let frames = stack.frames();
        self.resolve_at(frames, frames.len(), var)
    }

    /// Resolves `var` with `frames[..depth]` visible
    pub fn resolve_at(&self, frames: &[RegionDescriptor], depth: usize, var: DeclId) -> Resolution {
        let var = self.decls.canonical(var);
        let Some(decl) = self.decls.get(var) else {
            return Resolution::Unresolved;
        };
        let depth = depth.min(frames.len());

        if decl.threadprivate {
            let frame = depth.checked_sub(1);
            return Resolution::Resolved(
                ResolvedAttr::new(DsaKind::Threadprivate, frame, AttrOrigin::Predetermined)
                    .at(decl.location),
            );
        }

        let mut level = depth;
        loop {
            let Some(idx) = level.checked_sub(1) else {
                return self.outside_regions(decl);
            };
            let frame = &frames[idx];
            tracing::trace!(var = %var, frame = idx, kind = %frame.kind, "resolve");

            if let Some(kind) = frame.loop_control(var) {
                return match frame.entry(var) {
                    Some(entry) if loop_counter_accepts(kind, entry.kind) => {
                        Resolution::Resolved(explicit(entry, idx))
                    }
                    _ => Resolution::Resolved(
                        ResolvedAttr::new(kind, Some(idx), AttrOrigin::Predetermined)
                            .at(decl.location),
                    ),
                };
            }

            if frame.is_local(var) {
                return Resolution::Resolved(
                    ResolvedAttr::new(DsaKind::Private, Some(idx), AttrOrigin::Predetermined)
                        .at(decl.location),
                );
            }

            if self.options.legacy_const_sharing() && decl.ty.is_const_not_mutable() {
                return match frame.entry(var) {
                    Some(entry)
                        if matches!(entry.kind, DsaKind::Firstprivate | DsaKind::Shared) =>
                    {
                        Resolution::Resolved(explicit(entry, idx))
                    }
                    _ => Resolution::Resolved(
                        ResolvedAttr::new(DsaKind::Shared, Some(idx), AttrOrigin::Predetermined)
                            .at(decl.location),
                    ),
                };
            }

            if let Some(entry) = frame.entry(var) {
                return Resolution::Resolved(explicit(entry, idx));
            }
            if frame.is_rejected(var) {
                return Resolution::Rejected;
            }

            let at_frame = |kind| {
                Resolution::Resolved(
                    ResolvedAttr::new(kind, Some(idx), AttrOrigin::Default).at(frame.location),
                )
            };
            match frame.default_sharing {
                DefaultSharing::Shared => return at_frame(DsaKind::Shared),
                DefaultSharing::None => return Resolution::Unresolved,
                DefaultSharing::Private | DefaultSharing::Firstprivate
                    if decl.is_file_scope() =>
                {
                    return Resolution::Unresolved
                }
                DefaultSharing::Private => return at_frame(DsaKind::Private),
                DefaultSharing::Firstprivate => return at_frame(DsaKind::Firstprivate),
                DefaultSharing::Unspecified => {
                    if frame.kind.implies_shared_default() {
                        return at_frame(DsaKind::Shared);
                    }
                    if frame.kind.is_task() {
                        return self.inherit_into_task(frames, idx, var, decl);
                    }
                    level = idx;
                }
            }
        }
    }

    /// Attribute of a variable referenced outside every region
    fn outside_regions(&self, decl: &VarDecl) -> Resolution {
        if decl.has_static_storage() || decl.is_data_member() {
            Resolution::Resolved(
                ResolvedAttr::new(DsaKind::Shared, None, AttrOrigin::Predetermined)
                    .at(decl.location),
            )
        } else {
            Resolution::Unresolved
        }
    }

    /// Attribute of `var` in task frame `task` without a `default` clause.
    ///
    /// Shared only when the enclosing context shares it all the way out to an
    /// implicit task boundary (or past every region); firstprivate otherwise.
    fn inherit_into_task(
        &self,
        frames: &[RegionDescriptor],
        task: usize,
        var: DeclId,
        decl: &VarDecl,
    ) -> Resolution {
        let inherited = |kind| {
            Resolution::Resolved(
                ResolvedAttr::new(kind, Some(task), AttrOrigin::Inherited)
                    .at(frames[task].location),
            )
        };
        let mut level = task;
        loop {
            if level == 0 {
                return match self.outside_regions(decl) {
                    Resolution::Resolved(a) if a.kind == DsaKind::Shared => {
                        inherited(DsaKind::Shared)
                    }
                    _ => inherited(DsaKind::Firstprivate),
                };
            }
            match self.resolve_at(frames, level, var) {
                Resolution::Rejected => return Resolution::Rejected,
                Resolution::Resolved(attr) if attr.kind == DsaKind::Shared => match attr.frame {
                    Some(f) if !frames[f].kind.is_implicit_task_boundary() && f < level => {
                        level = f;
                    }
                    _ => return inherited(DsaKind::Shared),
                },
                _ => return inherited(DsaKind::Firstprivate),
            }
        }
    }
}

fn explicit(entry: &VariableAttributeEntry, frame: usize) -> ResolvedAttr {
    ResolvedAttr {
        kind: entry.kind,
        modifier: entry.modifier,
        frame: Some(frame),
        location: Some(entry.location),
        origin: if entry.implicit {
            AttrOrigin::Implicit
        } else {
            AttrOrigin::Explicit
        },
    }
}

/// Explicit kinds a loop counter may carry instead of its predetermined one
pub fn loop_counter_accepts(predetermined: DsaKind, explicit: DsaKind) -> bool {
    match predetermined {
        DsaKind::Linear => matches!(
            explicit,
            DsaKind::Linear | DsaKind::Private | DsaKind::Lastprivate
        ),
        _ => matches!(explicit, DsaKind::Private | DsaKind::Lastprivate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{DirectiveKind, TreeBuilder, Ty};

    fn loc() -> SourceLocation {
        SourceLocation::new(1, 1)
    }

    #[test]
    fn test_parallel_shares_by_default() {
        let mut b = TreeBuilder::new();
        let x = b.local("x", Ty::i32());
        let opts = AnalysisOptions::default();
        let mut stack = RegionScopeStack::new();
        stack.push(DirectiveKind::Parallel, None, loc()).unwrap();

        let r = AttributeResolver::new(b.decls(), &opts);
        let attr = *r.resolve(&stack, x).attr().unwrap();
        assert_eq!(attr.kind, DsaKind::Shared);
        assert_eq!(attr.frame, Some(0));
        assert_eq!(attr.origin, AttrOrigin::Default);
    }

    #[test]
    fn test_default_none_is_unresolved() {
        let mut b = TreeBuilder::new();
        let x = b.local("x", Ty::i32());
        let opts = AnalysisOptions::default();
        let mut stack = RegionScopeStack::new();
        stack.push(DirectiveKind::Parallel, None, loc()).unwrap().default_sharing =
            DefaultSharing::None;
        let r = AttributeResolver::new(b.decls(), &opts);
        assert_eq!(r.resolve(&stack, x), Resolution::Unresolved);
    }

    #[test]
    fn test_local_beats_default() {
        let mut b = TreeBuilder::new();
        let x = b.block_local("x", Ty::i32());
        let opts = AnalysisOptions::default();
        let mut stack = RegionScopeStack::new();
        let frame = stack.push(DirectiveKind::Parallel, None, loc()).unwrap();
        frame.default_sharing = DefaultSharing::None;
        frame.declare_local(x);
        let r = AttributeResolver::new(b.decls(), &opts);
        let attr = *r.resolve(&stack, x).attr().unwrap();
        assert_eq!(attr.kind, DsaKind::Private);
        assert!(attr.is_predetermined());
    }

    #[test]
    fn test_task_promotes_private_to_firstprivate() {
        let mut b = TreeBuilder::new();
        let x = b.local("x", Ty::i32());
        let opts = AnalysisOptions::default();
        let mut stack = RegionScopeStack::new();
        stack
            .push(DirectiveKind::Parallel, None, loc())
            .unwrap()
            .insert_explicit(x, VariableAttributeEntry::new(DsaKind::Private, loc()));
        stack.push(DirectiveKind::Task, None, loc()).unwrap();
        let r = AttributeResolver::new(b.decls(), &opts);
        let attr = *r.resolve(&stack, x).attr().unwrap();
        assert_eq!(attr.kind, DsaKind::Firstprivate);
        assert_eq!(attr.origin, AttrOrigin::Inherited);
        assert_eq!(attr.frame, Some(1));
    }

    #[test]
    fn test_task_keeps_shared_from_parallel() {
        let mut b = TreeBuilder::new();
        let x = b.local("x", Ty::i32());
        let opts = AnalysisOptions::default();
        let mut stack = RegionScopeStack::new();
        stack.push(DirectiveKind::Parallel, None, loc()).unwrap();
        stack.push(DirectiveKind::Single, None, loc()).unwrap();
        stack.push(DirectiveKind::Task, None, loc()).unwrap();
        let r = AttributeResolver::new(b.decls(), &opts);
        assert_eq!(r.resolve(&stack, x).kind(), Some(DsaKind::Shared));
    }

    #[test]
    fn test_orphaned_task_local_is_firstprivate_global_shared() {
        let mut b = TreeBuilder::new();
        let x = b.local("x", Ty::i32());
        let g = b.global("g", Ty::i32());
        let opts = AnalysisOptions::default();
        let mut stack = RegionScopeStack::new();
        stack.push(DirectiveKind::Task, None, loc()).unwrap();
        let r = AttributeResolver::new(b.decls(), &opts);
        assert_eq!(r.resolve(&stack, x).kind(), Some(DsaKind::Firstprivate));
        assert_eq!(r.resolve(&stack, g).kind(), Some(DsaKind::Shared));
    }

    #[test]
    fn test_exhaustion_rules() {
        let mut b = TreeBuilder::new();
        let x = b.local("x", Ty::i32());
        let s = b.static_local("s", Ty::i32());
        let m = b.member("m", Ty::i32());
        let opts = AnalysisOptions::default();
        let mut stack = RegionScopeStack::new();
        stack.push(DirectiveKind::For, None, loc()).unwrap();
        let r = AttributeResolver::new(b.decls(), &opts);
        assert_eq!(r.resolve(&stack, x), Resolution::Unresolved);
        assert_eq!(r.resolve(&stack, s).kind(), Some(DsaKind::Shared));
        assert_eq!(r.resolve(&stack, m).kind(), Some(DsaKind::Shared));
    }

    #[test]
    fn test_default_private_excludes_file_scope() {
        let mut b = TreeBuilder::new();
        let g = b.global("g", Ty::i32());
        let x = b.local("x", Ty::i32());
        let opts = AnalysisOptions::default();
        let mut stack = RegionScopeStack::new();
        stack.push(DirectiveKind::Parallel, None, loc()).unwrap().default_sharing =
            DefaultSharing::Firstprivate;
        let r = AttributeResolver::new(b.decls(), &opts);
        assert_eq!(r.resolve(&stack, g), Resolution::Unresolved);
        assert_eq!(r.resolve(&stack, x).kind(), Some(DsaKind::Firstprivate));
    }

    #[test]
    fn test_rejected_item() {
        let mut b = TreeBuilder::new();
        let x = b.local("x", Ty::i32());
        let opts = AnalysisOptions::default();
        let mut stack = RegionScopeStack::new();
        stack.push(DirectiveKind::Parallel, None, loc()).unwrap().reject(x);
        let r = AttributeResolver::new(b.decls(), &opts);
        assert_eq!(r.resolve(&stack, x), Resolution::Rejected);
    }

    #[test]
    fn test_legacy_const_shared() {
        let mut b = TreeBuilder::new();
        let c = b.local("c", Ty::i32().as_const());
        let mut stack = RegionScopeStack::new();
        stack.push(DirectiveKind::Parallel, None, loc()).unwrap().default_sharing =
            DefaultSharing::None;

        let legacy = AnalysisOptions::for_version(crate::analysis::LanguageVersion::V31);
        let r = AttributeResolver::new(b.decls(), &legacy);
        let attr = *r.resolve(&stack, c).attr().unwrap();
        assert_eq!(attr.kind, DsaKind::Shared);
        assert!(attr.is_predetermined());

        let modern = AnalysisOptions::default();
        let r = AttributeResolver::new(b.decls(), &modern);
        assert_eq!(r.resolve(&stack, c), Resolution::Unresolved);
    }

    #[test]
    fn test_capture_placeholder_resolves_like_original() {
        let mut b = TreeBuilder::new();
        let x = b.local("x", Ty::i32());
        let cap = b.decls_mut().capture(x).unwrap();
        let opts = AnalysisOptions::default();
        let mut stack = RegionScopeStack::new();
        stack
            .push(DirectiveKind::Parallel, None, loc())
            .unwrap()
            .insert_explicit(x, VariableAttributeEntry::new(DsaKind::Private, loc()));
        let r = AttributeResolver::new(b.decls(), &opts);
        assert_eq!(r.resolve(&stack, cap), r.resolve(&stack, x));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let mut b = TreeBuilder::new();
        let x = b.local("x", Ty::i32());
        let opts = AnalysisOptions::default();
        let mut stack = RegionScopeStack::new();
        stack.push(DirectiveKind::Parallel, None, loc()).unwrap();
        stack.push(DirectiveKind::Task, None, loc()).unwrap();
        let r = AttributeResolver::new(b.decls(), &opts);
        let first = r.resolve(&stack, x);
        for _ in 0..10 {
            assert_eq!(r.resolve(&stack, x), first);
        }
    }
}
