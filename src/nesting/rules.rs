//! Static nesting rule table.
//!
//! Rows are checked top to bottom; the first row whose child set and
//! predicate both match decides the verdict. A query that matches no row is
//! legal.

use super::NestingQuery;
use crate::ast::DirectiveKind;
use lazy_static::lazy_static;
use std::collections::HashMap;

/// Category a failing rule reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleClass {
    /// Region needs an enclosing region
    Orphaned,
    /// The closest enclosing region does not admit the child
    IncompatibleParent,
    /// Same-name construct already encloses the child
    DuplicateName,
    /// Orphaned when there is no parent, incompatible otherwise
    OrphanedOrIncompatible,
}

/// Outcome of a matching row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    /// Nesting is legal, stop searching
    Legal,
    /// Nesting is illegal
    Illegal {
        class: RuleClass,
        /// Directive the child should be nested in
        hint: Option<DirectiveKind>,
    },
}

/// One row of the table
#[derive(Clone, Copy)]
pub struct NestingRule {
    /// Rule identifier, recorded in verdicts
    pub name: &'static str,
    /// Child kinds the row applies to
    pub child: fn(DirectiveKind) -> bool,
    /// Context predicate
    pub applies: fn(&NestingQuery<'_>) -> bool,
    /// Verdict when both match
    pub outcome: RuleOutcome,
}

fn any_kind(_: DirectiveKind) -> bool {
    true
}

fn parent_kind(q: &NestingQuery<'_>) -> Option<DirectiveKind> {
    q.parent().map(|p| p.kind)
}

fn parent_is(q: &NestingQuery<'_>, pred: fn(DirectiveKind) -> bool) -> bool {
    parent_kind(q).map(pred).unwrap_or(false)
}

fn is_synchronizing(kind: DirectiveKind) -> bool {
    matches!(kind, DirectiveKind::Critical | DirectiveKind::Ordered)
}

fn is_master_like(kind: DirectiveKind) -> bool {
    matches!(kind, DirectiveKind::Master | DirectiveKind::Masked)
}

lazy_static! {
    /// Parent kinds a `cancel`/`cancellation point` may name, keyed by the
    /// construct type in the directive
    pub static ref CANCEL_TABLE: HashMap<DirectiveKind, Vec<DirectiveKind>> = {
        let mut table = HashMap::new();
        table.insert(
            DirectiveKind::Parallel,
            vec![DirectiveKind::Parallel, DirectiveKind::TargetParallel],
        );
        table.insert(
            DirectiveKind::For,
            vec![
                DirectiveKind::For,
                DirectiveKind::ParallelFor,
                DirectiveKind::TargetParallelFor,
                DirectiveKind::DistributeParallelFor,
            ],
        );
        table.insert(
            DirectiveKind::Sections,
            vec![
                DirectiveKind::Sections,
                DirectiveKind::ParallelSections,
                DirectiveKind::Section,
            ],
        );
        table.insert(
            DirectiveKind::Taskgroup,
            vec![DirectiveKind::Task, DirectiveKind::Taskloop],
        );
        table
    };

    /// Nesting rules in priority order
    pub static ref NESTING_RULES: Vec<NestingRule> = vec![
        NestingRule {
            name: "order-concurrent-parent",
            child: |k| {
                !(k.is_parallel()
                    || k.is_simd()
                    || matches!(k, DirectiveKind::Loop | DirectiveKind::Atomic))
            },
            applies: |q| q.parent().map(|p| p.flags.order_concurrent).unwrap_or(false),
            outcome: RuleOutcome::Illegal {
                class: RuleClass::IncompatibleParent,
                hint: None,
            },
        },
        NestingRule {
            name: "simd-parent",
            child: any_kind,
            applies: |q| {
                parent_is(q, DirectiveKind::is_simd)
                    && !match q.child {
                        DirectiveKind::Simd | DirectiveKind::Atomic | DirectiveKind::Scan => true,
                        DirectiveKind::Ordered => q.child_has_simd_clause,
                        _ => false,
                    }
            },
            outcome: RuleOutcome::Illegal {
                class: RuleClass::IncompatibleParent,
                hint: None,
            },
        },
        NestingRule {
            name: "atomic-parent",
            child: any_kind,
            applies: |q| parent_kind(q) == Some(DirectiveKind::Atomic),
            outcome: RuleOutcome::Illegal {
                class: RuleClass::IncompatibleParent,
                hint: None,
            },
        },
        NestingRule {
            name: "section-in-sections",
            child: |k| k == DirectiveKind::Section,
            applies: |q| !parent_is(q, DirectiveKind::is_sections),
            outcome: RuleOutcome::Illegal {
                class: RuleClass::OrphanedOrIncompatible,
                hint: Some(DirectiveKind::Sections),
            },
        },
        NestingRule {
            name: "barrier-closely-nested",
            child: |k| k == DirectiveKind::Barrier,
            applies: |q| {
                parent_is(q, |p| {
                    p.is_worksharing()
                        || p.is_loop_associated()
                        || p.is_task()
                        || is_synchronizing(p)
                        || is_master_like(p)
                })
            },
            outcome: RuleOutcome::Illegal {
                class: RuleClass::IncompatibleParent,
                hint: None,
            },
        },
        NestingRule {
            name: "master-closely-nested",
            child: is_master_like,
            applies: |q| {
                parent_is(q, |p| {
                    p.is_worksharing() || p.is_loop_associated() || p.is_task() || is_synchronizing(p)
                })
            },
            outcome: RuleOutcome::Illegal {
                class: RuleClass::IncompatibleParent,
                hint: None,
            },
        },
        NestingRule {
            name: "worksharing-closely-nested",
            child: DirectiveKind::is_plain_worksharing,
            applies: |q| {
                parent_is(q, |p| {
                    p.is_worksharing()
                        || p.is_task()
                        || is_synchronizing(p)
                        || is_master_like(p)
                        || p == DirectiveKind::Loop
                })
            },
            outcome: RuleOutcome::Illegal {
                class: RuleClass::IncompatibleParent,
                hint: None,
            },
        },
        NestingRule {
            name: "ordered-in-critical-or-task",
            child: |k| k == DirectiveKind::Ordered,
            applies: |q| parent_is(q, |p| p == DirectiveKind::Critical || p.is_task()),
            outcome: RuleOutcome::Illegal {
                class: RuleClass::IncompatibleParent,
                hint: None,
            },
        },
        NestingRule {
            name: "ordered-needs-ordered-loop",
            child: |k| k == DirectiveKind::Ordered,
            applies: |q| match q.parent() {
                Some(p) => {
                    !(p.kind.is_loop_associated()
                        && (p.flags.ordered || (q.child_has_simd_clause && p.kind.is_simd())))
                }
                None => true,
            },
            outcome: RuleOutcome::Illegal {
                class: RuleClass::OrphanedOrIncompatible,
                hint: Some(DirectiveKind::For),
            },
        },
        NestingRule {
            name: "teams-sole-child-of-target",
            child: |k| matches!(k, DirectiveKind::Teams | DirectiveKind::TeamsDistribute),
            applies: |q| match parent_kind(q) {
                Some(DirectiveKind::Target) => !q.sole_child,
                Some(_) => true,
                None => false,
            },
            outcome: RuleOutcome::Illegal {
                class: RuleClass::IncompatibleParent,
                hint: Some(DirectiveKind::Target),
            },
        },
        NestingRule {
            name: "teams-strict-nesting",
            child: |k| {
                !(k.is_distribute()
                    || k.is_parallel()
                    || matches!(k, DirectiveKind::Loop | DirectiveKind::Atomic))
            },
            applies: |q| parent_is(q, DirectiveKind::is_teams_region),
            outcome: RuleOutcome::Illegal {
                class: RuleClass::IncompatibleParent,
                hint: None,
            },
        },
        NestingRule {
            name: "distribute-in-teams",
            child: DirectiveKind::is_distribute,
            applies: |q| !parent_is(q, DirectiveKind::is_teams_region),
            outcome: RuleOutcome::Illegal {
                class: RuleClass::OrphanedOrIncompatible,
                hint: Some(DirectiveKind::Teams),
            },
        },
        NestingRule {
            name: "cancel-matches-parent",
            child: DirectiveKind::is_cancellation,
            applies: |q| match (q.cancel_target, parent_kind(q)) {
                (Some(target), Some(parent)) => CANCEL_TABLE
                    .get(&target)
                    .map(|kinds| kinds.contains(&parent))
                    .unwrap_or(false),
                _ => false,
            },
            outcome: RuleOutcome::Legal,
        },
        NestingRule {
            name: "cancel-mismatch",
            child: DirectiveKind::is_cancellation,
            applies: |_| true,
            outcome: RuleOutcome::Illegal {
                class: RuleClass::OrphanedOrIncompatible,
                hint: None,
            },
        },
        NestingRule {
            name: "critical-same-name",
            child: |k| k == DirectiveKind::Critical,
            applies: |q| q.same_name_critical().is_some(),
            outcome: RuleOutcome::Illegal {
                class: RuleClass::DuplicateName,
                hint: None,
            },
        },
        NestingRule {
            name: "scan-in-loop",
            child: |k| k == DirectiveKind::Scan,
            applies: |q| !parent_is(q, DirectiveKind::is_loop_associated),
            outcome: RuleOutcome::Illegal {
                class: RuleClass::OrphanedOrIncompatible,
                hint: Some(DirectiveKind::For),
            },
        },
    ];
}

/// First row matching `query`
pub fn first_match(query: &NestingQuery<'_>) -> Option<&'static NestingRule> {
    NESTING_RULES
        .iter()
        .find(|rule| (rule.child)(query.child) && (rule.applies)(query))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_names_unique() {
        let mut names: Vec<&str> = NESTING_RULES.iter().map(|r| r.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), NESTING_RULES.len());
    }

    #[test]
    fn test_cancel_table_covers_construct_types() {
        assert!(CANCEL_TABLE[&DirectiveKind::Parallel].contains(&DirectiveKind::Parallel));
        assert!(CANCEL_TABLE[&DirectiveKind::For].contains(&DirectiveKind::ParallelFor));
        assert!(CANCEL_TABLE[&DirectiveKind::Sections].contains(&DirectiveKind::Section));
        assert!(CANCEL_TABLE[&DirectiveKind::Taskgroup].contains(&DirectiveKind::Task));
        assert!(!CANCEL_TABLE.contains_key(&DirectiveKind::Single));
    }
}
