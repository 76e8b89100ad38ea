//! # Diagnostics
//!
//! Problems found in the analyzed program. The analysis never formats text;
//! it reports a [`DiagnosticKind`] plus typed arguments and lets the driver
//! render them.
//!
//! Every kind belongs to exactly one [`DiagnosticFamily`]:
//!
//! | Family | Kinds |
//! |---|---|
//! | AttributeConflict | conflicting clauses, local/const/threadprivate misuse, reduction in task |
//! | UnresolvedUnderNoDefault | variable without attribute under `default(none)` and friends |
//! | IllegalNesting | orphaned or wrongly placed region |
//! | DuplicateNamedRegion | same-name `critical` nested in itself |
//! | NonCanonicalLoop | init/condition/increment/nest shape |
//! | IncompatibleLoopDirection | step moves away from the bound |
//! | NonRectangularUnsupported | dependent bounds the lowering cannot handle |

use crate::ast::{ClauseTag, DeclId, DirectiveKind, SourceLocation};
use crate::region::DsaKind;
use serde::{Deserialize, Serialize};

/// Diagnostic family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticFamily {
    AttributeConflict,
    UnresolvedUnderNoDefault,
    IllegalNesting,
    DuplicateNamedRegion,
    NonCanonicalLoop,
    IncompatibleLoopDirection,
    NonRectangularUnsupported,
}

/// Why an explicit or implicit attribute is invalid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictReason {
    /// Listed with two incompatible clauses on one region
    ConflictingClauses,
    /// Automatic variable declared inside the region listed in a clause that
    /// needs its outer value
    LocalVariable,
    /// `const` variable in a clause that writes it
    ConstVariable,
    /// Threadprivate variable in a clause other than copyin/copyprivate
    Threadprivate,
    /// copyin item that is not threadprivate
    NotThreadprivate,
    /// Worksharing list item already private in the enclosing parallel region
    PrivateInParallel,
    /// Loop counter listed with a kind it cannot take
    LoopCounter,
    /// Task accesses a reduction item of the enclosing region
    ReductionInTask,
    /// Clause not accepted on this directive
    InvalidForDirective,
    /// Pointer-only clause on a non-pointer
    NotPointer,
}

/// Why a variable stayed without attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnresolvedContext {
    /// `default(none)`
    DefaultNone,
    /// `default(private)`/`default(firstprivate)` on a file-scope variable
    DefaultPrivateStatic,
    /// `defaultmap(none)` on a target region
    DefaultmapNone,
}

/// Why a region may not appear where it does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NestingFailure {
    /// Needs an enclosing region but has none
    Orphaned,
    /// The enclosing region does not admit it
    IncompatibleParent,
}

/// Part of a loop that is not in canonical form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoopPart {
    /// Initialization
    Init,
    /// Test expression
    Condition,
    /// Increment expression
    Increment,
    /// Fewer loops than `collapse`/`ordered` require
    NestDepth,
    /// Statements between collapsed loops
    NotPerfectlyNested,
    /// `collapse`/`ordered` argument is not a positive constant
    ClauseArgument,
    /// Counter type cannot be used
    CounterType,
}

/// Diagnostic kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// Invalid data-sharing attribute
    AttributeConflict(ConflictReason),
    /// Variable without attribute where one is required
    UnresolvedUnderNoDefault(UnresolvedContext),
    /// Illegal region nesting
    IllegalNesting(NestingFailure),
    /// Same-name region nested in itself
    DuplicateNamedRegion,
    /// Loop not in canonical form
    NonCanonicalLoop(LoopPart),
    /// Step direction contradicts the condition
    IncompatibleLoopDirection,
    /// Non-rectangular bound that cannot be handled
    NonRectangularUnsupported,
}

impl DiagnosticKind {
    /// Family this kind reports under
    pub fn family(&self) -> DiagnosticFamily {
        match self {
            DiagnosticKind::AttributeConflict(_) => DiagnosticFamily::AttributeConflict,
            DiagnosticKind::UnresolvedUnderNoDefault(_) => {
                DiagnosticFamily::UnresolvedUnderNoDefault
            }
            DiagnosticKind::IllegalNesting(_) => DiagnosticFamily::IllegalNesting,
            DiagnosticKind::DuplicateNamedRegion => DiagnosticFamily::DuplicateNamedRegion,
            DiagnosticKind::NonCanonicalLoop(_) => DiagnosticFamily::NonCanonicalLoop,
            DiagnosticKind::IncompatibleLoopDirection => {
                DiagnosticFamily::IncompatibleLoopDirection
            }
            DiagnosticKind::NonRectangularUnsupported => {
                DiagnosticFamily::NonRectangularUnsupported
            }
        }
    }
}

/// Typed diagnostic argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticArg {
    /// A variable
    Variable(DeclId),
    /// A directive kind
    Directive(DirectiveKind),
    /// A clause kind
    Clause(ClauseTag),
    /// A data-sharing attribute
    Attribute(DsaKind),
    /// A related location (previous clause, enclosing region)
    Location(SourceLocation),
    /// A construct name
    Name(String),
    /// An integer (clause arguments, loop levels)
    Integer(i128),
}

/// A reported problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Primary location
    pub location: SourceLocation,
    /// What went wrong
    pub kind: DiagnosticKind,
    /// Arguments for rendering
    pub args: Vec<DiagnosticArg>,
}

impl Diagnostic {
    /// Creates a diagnostic without arguments
    pub fn new(location: SourceLocation, kind: DiagnosticKind) -> Self {
        Diagnostic {
            location,
            kind,
            args: Vec::new(),
        }
    }

    /// Appends an argument
    pub fn with(mut self, arg: DiagnosticArg) -> Self {
        self.args.push(arg);
        self
    }

    /// First variable argument
    pub fn variable(&self) -> Option<DeclId> {
        self.args.iter().find_map(|a| match a {
            DiagnosticArg::Variable(v) => Some(*v),
            _ => None,
        })
    }
}

/// Receiver of diagnostics
pub trait DiagnosticSink {
    /// Accepts one diagnostic
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Collecting sink with family queries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticBuffer {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBuffer {
    /// Creates an empty buffer
    pub fn new() -> Self {
        DiagnosticBuffer::default()
    }

    /// Everything reported so far, in order
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Number of diagnostics
    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    /// Nothing reported
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Diagnostics of one family
    pub fn of_family(&self, family: DiagnosticFamily) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(move |d| d.kind.family() == family)
    }

    /// Whether any diagnostic of `kind` was reported
    pub fn contains(&self, kind: DiagnosticKind) -> bool {
        self.diagnostics.iter().any(|d| d.kind == kind)
    }

    /// Gives up the collected diagnostics
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

impl DiagnosticSink for DiagnosticBuffer {
    fn report(&mut self, diagnostic: Diagnostic) {
        tracing::debug!(kind = ?diagnostic.kind, location = %diagnostic.location, "diagnostic");
        self.diagnostics.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_kind_has_one_family() {
        let kinds = [
            (
                DiagnosticKind::AttributeConflict(ConflictReason::ReductionInTask),
                DiagnosticFamily::AttributeConflict,
            ),
            (
                DiagnosticKind::UnresolvedUnderNoDefault(UnresolvedContext::DefaultNone),
                DiagnosticFamily::UnresolvedUnderNoDefault,
            ),
            (
                DiagnosticKind::IllegalNesting(NestingFailure::Orphaned),
                DiagnosticFamily::IllegalNesting,
            ),
            (
                DiagnosticKind::DuplicateNamedRegion,
                DiagnosticFamily::DuplicateNamedRegion,
            ),
            (
                DiagnosticKind::NonCanonicalLoop(LoopPart::NestDepth),
                DiagnosticFamily::NonCanonicalLoop,
            ),
        ];
        for (kind, family) in kinds {
            assert_eq!(kind.family(), family);
        }
    }

    #[test]
    fn test_buffer_queries() {
        let mut buf = DiagnosticBuffer::new();
        buf.report(
            Diagnostic::new(SourceLocation::new(2, 3), DiagnosticKind::DuplicateNamedRegion)
                .with(DiagnosticArg::Name("A".into())),
        );
        buf.report(
            Diagnostic::new(
                SourceLocation::new(4, 1),
                DiagnosticKind::AttributeConflict(ConflictReason::LocalVariable),
            )
            .with(DiagnosticArg::Variable(DeclId(7))),
        );
        assert_eq!(buf.len(), 2);
        assert!(buf.contains(DiagnosticKind::DuplicateNamedRegion));
        assert_eq!(buf.of_family(DiagnosticFamily::AttributeConflict).count(), 1);
        assert_eq!(buf.diagnostics()[1].variable(), Some(DeclId(7)));
    }
}
