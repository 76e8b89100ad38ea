//! # Nesting Validator
//!
//! Decides whether a region may appear inside the regions that enclose it.
//! The legality rules are data ([`rules::NESTING_RULES`]); a single engine
//! walks the table and turns the first matching row into a [`NestingVerdict`].
//!
//! The check runs before the child is pushed, so the chain handed in is the
//! enclosing chain with the closest parent last.

pub mod rules;

use crate::ast::{DirectiveKind, Region, SourceLocation};
use crate::diagnostics::{Diagnostic, DiagnosticArg, DiagnosticKind, NestingFailure};
use crate::region::RegionDescriptor;
use rules::{RuleClass, RuleOutcome};
use serde::{Deserialize, Serialize};

/// Everything a nesting rule may look at
#[derive(Debug, Clone, Copy)]
pub struct NestingQuery<'a> {
    /// Directive being entered
    pub child: DirectiveKind,
    /// Its construct name
    pub child_name: Option<&'a str>,
    /// Construct type named by a cancellation directive
    pub cancel_target: Option<DirectiveKind>,
    /// Child carries the `simd` clause
    pub child_has_simd_clause: bool,
    /// Child is the only statement of its parent's body
    pub sole_child: bool,
    /// Enclosing regions, outermost first
    pub chain: &'a [RegionDescriptor],
}

impl<'a> NestingQuery<'a> {
    /// Query for entering `region` below `chain`
    pub fn for_region(region: &'a Region, sole_child: bool, chain: &'a [RegionDescriptor]) -> Self {
        NestingQuery {
            child: region.kind,
            child_name: region.name.as_deref(),
            cancel_target: region.cancel_target,
            child_has_simd_clause: region.has_simd_clause(),
            sole_child,
            chain,
        }
    }

    /// Closest enclosing region
    pub fn parent(&self) -> Option<&'a RegionDescriptor> {
        self.chain.last()
    }

    /// Index of the innermost enclosing `critical` with the child's name.
    /// Two unnamed criticals share the same (empty) name.
    pub fn same_name_critical(&self) -> Option<usize> {
        self.chain
            .iter()
            .enumerate()
            .rev()
            .find(|(_, frame)| {
                frame.kind == DirectiveKind::Critical && frame.name.as_deref() == self.child_name
            })
            .map(|(idx, _)| idx)
    }
}

/// Category of an illegal nesting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureCategory {
    /// Needs an enclosing region that is missing
    Orphaned,
    /// Enclosing region of the wrong kind
    IncompatibleParent,
    /// Same-named critical already encloses it
    DuplicateName,
}

/// Result of a nesting check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NestingVerdict {
    /// Nesting is allowed
    Legal,
    /// Nesting is forbidden
    Illegal {
        /// Category
        failure: FailureCategory,
        /// Directive the region belongs in
        hint: Option<DirectiveKind>,
        /// Name of the rule that fired
        rule: String,
        /// Chain index of the conflicting region (duplicate names)
        conflicting: Option<usize>,
    },
}

impl NestingVerdict {
    /// Whether the region may be analyzed
    pub fn is_legal(&self) -> bool {
        matches!(self, NestingVerdict::Legal)
    }

    /// Diagnostic for an illegal verdict
    pub fn to_diagnostic(&self, query: &NestingQuery<'_>, location: SourceLocation) -> Option<Diagnostic> {
        let NestingVerdict::Illegal {
            failure,
            hint,
            conflicting,
            ..
        } = self
        else {
            return None;
        };
        let kind = match failure {
            FailureCategory::Orphaned => DiagnosticKind::IllegalNesting(NestingFailure::Orphaned),
            FailureCategory::IncompatibleParent => {
                DiagnosticKind::IllegalNesting(NestingFailure::IncompatibleParent)
            }
            FailureCategory::DuplicateName => DiagnosticKind::DuplicateNamedRegion,
        };
        let mut diag = Diagnostic::new(location, kind).with(DiagnosticArg::Directive(query.child));
        if let Some(parent) = query.parent() {
            diag = diag.with(DiagnosticArg::Directive(parent.kind));
        }
        if let Some(hint) = hint {
            diag = diag.with(DiagnosticArg::Directive(*hint));
        }
        if let Some(frame) = conflicting.and_then(|idx| query.chain.get(idx)) {
            if let Some(name) = &frame.name {
                diag = diag.with(DiagnosticArg::Name(name.clone()));
            }
            diag = diag.with(DiagnosticArg::Location(frame.location));
        }
        Some(diag)
    }
}

/// Checks `query` against the rule table
pub fn check_nesting(query: &NestingQuery<'_>) -> NestingVerdict {
    let Some(rule) = rules::first_match(query) else {
        return NestingVerdict::Legal;
    };
    let verdict = match rule.outcome {
        RuleOutcome::Legal => NestingVerdict::Legal,
        RuleOutcome::Illegal { class, hint } => {
            let failure = match class {
                RuleClass::Orphaned => FailureCategory::Orphaned,
                RuleClass::IncompatibleParent => FailureCategory::IncompatibleParent,
                RuleClass::DuplicateName => FailureCategory::DuplicateName,
                RuleClass::OrphanedOrIncompatible if query.parent().is_none() => {
                    FailureCategory::Orphaned
                }
                RuleClass::OrphanedOrIncompatible => FailureCategory::IncompatibleParent,
            };
            let hint = match (hint, query.cancel_target) {
                (None, Some(target)) if query.child.is_cancellation() => Some(target),
                (hint, _) => hint,
            };
            let conflicting = match class {
                RuleClass::DuplicateName => query.same_name_critical(),
                _ => None,
            };
            NestingVerdict::Illegal {
                failure,
                hint,
                rule: rule.name.to_string(),
                conflicting,
            }
        }
    };
    tracing::debug!(child = %query.child, rule = rule.name, ?verdict, "nesting rule matched");
    verdict
}
