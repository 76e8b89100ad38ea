//! Directive kinds and region nodes.
//!
//! Directive classification predicates live here so every component agrees on
//! what counts as "parallel", "worksharing", "task" and so on. Combined
//! directives belong to every family they combine.

use super::clause::{Clause, ClauseKind, DefaultSharing, OrderKind};
use super::expr::Expr;
use super::stmt::Stmt;
use super::SourceLocation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of directive kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DirectiveKind {
    Parallel,
    For,
    ForSimd,
    Simd,
    Sections,
    Section,
    Single,
    Master,
    Masked,
    Critical,
    Barrier,
    Taskwait,
    Taskyield,
    Taskgroup,
    Flush,
    Ordered,
    Atomic,
    Task,
    Taskloop,
    TaskloopSimd,
    Target,
    TargetData,
    TargetParallel,
    TargetParallelFor,
    TargetTeams,
    TargetTeamsDistribute,
    Teams,
    TeamsDistribute,
    Distribute,
    DistributeParallelFor,
    DistributeSimd,
    ParallelFor,
    ParallelForSimd,
    ParallelSections,
    Loop,
    Scan,
    Cancel,
    CancellationPoint,
}

impl DirectiveKind {
    /// Spelling used in source
    pub fn name(self) -> &'static str {
        match self {
            DirectiveKind::Parallel => "parallel",
            DirectiveKind::For => "for",
            DirectiveKind::ForSimd => "for simd",
            DirectiveKind::Simd => "simd",
            DirectiveKind::Sections => "sections",
            DirectiveKind::Section => "section",
            DirectiveKind::Single => "single",
            DirectiveKind::Master => "master",
            DirectiveKind::Masked => "masked",
            DirectiveKind::Critical => "critical",
            DirectiveKind::Barrier => "barrier",
            DirectiveKind::Taskwait => "taskwait",
            DirectiveKind::Taskyield => "taskyield",
            DirectiveKind::Taskgroup => "taskgroup",
            DirectiveKind::Flush => "flush",
            DirectiveKind::Ordered => "ordered",
            DirectiveKind::Atomic => "atomic",
            DirectiveKind::Task => "task",
            DirectiveKind::Taskloop => "taskloop",
            DirectiveKind::TaskloopSimd => "taskloop simd",
            DirectiveKind::Target => "target",
            DirectiveKind::TargetData => "target data",
            DirectiveKind::TargetParallel => "target parallel",
            DirectiveKind::TargetParallelFor => "target parallel for",
            DirectiveKind::TargetTeams => "target teams",
            DirectiveKind::TargetTeamsDistribute => "target teams distribute",
            DirectiveKind::Teams => "teams",
            DirectiveKind::TeamsDistribute => "teams distribute",
            DirectiveKind::Distribute => "distribute",
            DirectiveKind::DistributeParallelFor => "distribute parallel for",
            DirectiveKind::DistributeSimd => "distribute simd",
            DirectiveKind::ParallelFor => "parallel for",
            DirectiveKind::ParallelForSimd => "parallel for simd",
            DirectiveKind::ParallelSections => "parallel sections",
            DirectiveKind::Loop => "loop",
            DirectiveKind::Scan => "scan",
            DirectiveKind::Cancel => "cancel",
            DirectiveKind::CancellationPoint => "cancellation point",
        }
    }

    /// Creates a team of threads
    pub fn is_parallel(self) -> bool {
        matches!(
            self,
            DirectiveKind::Parallel
                | DirectiveKind::ParallelFor
                | DirectiveKind::ParallelForSimd
                | DirectiveKind::ParallelSections
                | DirectiveKind::TargetParallel
                | DirectiveKind::TargetParallelFor
                | DirectiveKind::DistributeParallelFor
        )
    }

    /// Creates a league of teams
    pub fn is_teams(self) -> bool {
        matches!(
            self,
            DirectiveKind::Teams
                | DirectiveKind::TargetTeams
                | DirectiveKind::TeamsDistribute
                | DirectiveKind::TargetTeamsDistribute
        )
    }

    /// Stand-alone `teams` or `target teams` (not combined with distribute)
    pub fn is_teams_region(self) -> bool {
        matches!(self, DirectiveKind::Teams | DirectiveKind::TargetTeams)
    }

    /// Creates explicit tasks
    pub fn is_task(self) -> bool {
        matches!(
            self,
            DirectiveKind::Task | DirectiveKind::Taskloop | DirectiveKind::TaskloopSimd
        )
    }

    /// Offloads to a device and supports implicit mapping
    pub fn is_target(self) -> bool {
        matches!(
            self,
            DirectiveKind::Target
                | DirectiveKind::TargetParallel
                | DirectiveKind::TargetParallelFor
                | DirectiveKind::TargetTeams
                | DirectiveKind::TargetTeamsDistribute
        )
    }

    /// Accepts `map` clauses
    pub fn accepts_map(self) -> bool {
        self.is_target() || self == DirectiveKind::TargetData
    }

    /// SIMD-classified
    pub fn is_simd(self) -> bool {
        matches!(
            self,
            DirectiveKind::Simd
                | DirectiveKind::ForSimd
                | DirectiveKind::ParallelForSimd
                | DirectiveKind::TaskloopSimd
                | DirectiveKind::DistributeSimd
        )
    }

    /// Worksharing constructs, combined forms included
    pub fn is_worksharing(self) -> bool {
        matches!(
            self,
            DirectiveKind::For
                | DirectiveKind::ForSimd
                | DirectiveKind::Sections
                | DirectiveKind::Single
                | DirectiveKind::ParallelFor
                | DirectiveKind::ParallelForSimd
                | DirectiveKind::ParallelSections
                | DirectiveKind::TargetParallelFor
                | DirectiveKind::DistributeParallelFor
        )
    }

    /// Worksharing constructs that do not create their own team
    pub fn is_plain_worksharing(self) -> bool {
        self.is_worksharing() && !self.is_parallel()
    }

    /// Worksharing loops
    pub fn is_worksharing_loop(self) -> bool {
        matches!(
            self,
            DirectiveKind::For
                | DirectiveKind::ForSimd
                | DirectiveKind::ParallelFor
                | DirectiveKind::ParallelForSimd
                | DirectiveKind::TargetParallelFor
                | DirectiveKind::DistributeParallelFor
        )
    }

    /// Associated with one or more loops
    pub fn is_loop_associated(self) -> bool {
        matches!(
            self,
            DirectiveKind::For
                | DirectiveKind::ForSimd
                | DirectiveKind::Simd
                | DirectiveKind::Taskloop
                | DirectiveKind::TaskloopSimd
                | DirectiveKind::TargetParallelFor
                | DirectiveKind::TargetTeamsDistribute
                | DirectiveKind::TeamsDistribute
                | DirectiveKind::Distribute
                | DirectiveKind::DistributeParallelFor
                | DirectiveKind::DistributeSimd
                | DirectiveKind::ParallelFor
                | DirectiveKind::ParallelForSimd
                | DirectiveKind::Loop
        )
    }

    /// Distribute constructs that must be nested in a teams region
    pub fn is_distribute(self) -> bool {
        matches!(
            self,
            DirectiveKind::Distribute
                | DirectiveKind::DistributeParallelFor
                | DirectiveKind::DistributeSimd
        )
    }

    /// `sections` and `parallel sections`
    pub fn is_sections(self) -> bool {
        matches!(
            self,
            DirectiveKind::Sections | DirectiveKind::ParallelSections
        )
    }

    /// `cancel` and `cancellation point`
    pub fn is_cancellation(self) -> bool {
        matches!(
            self,
            DirectiveKind::Cancel | DirectiveKind::CancellationPoint
        )
    }

    /// Directives without an associated statement
    pub fn is_standalone(self) -> bool {
        matches!(
            self,
            DirectiveKind::Barrier
                | DirectiveKind::Taskwait
                | DirectiveKind::Taskyield
                | DirectiveKind::Flush
                | DirectiveKind::Scan
                | DirectiveKind::Cancel
                | DirectiveKind::CancellationPoint
        )
    }

    /// Variables without an attribute are shared by default
    pub fn implies_shared_default(self) -> bool {
        self.is_parallel() || self.is_teams()
    }

    /// Regions that bound the outward walk of task attribute promotion
    pub fn is_implicit_task_boundary(self) -> bool {
        self.is_parallel() || self.is_teams() || self.is_task()
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A directive-annotated region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Directive
    pub kind: DirectiveKind,
    /// Construct name (`critical(name)`)
    #[serde(default)]
    pub name: Option<String>,
    /// Construct type named by `cancel`/`cancellation point`
    #[serde(default)]
    pub cancel_target: Option<DirectiveKind>,
    /// Clauses in source order
    #[serde(default)]
    pub clauses: Vec<Clause>,
    /// Associated statement (absent for stand-alone directives)
    #[serde(default)]
    pub body: Option<Box<Stmt>>,
    /// Directive location
    pub location: SourceLocation,
    /// Appears in a generic context that is not instantiated yet
    #[serde(default)]
    pub dependent: bool,
}

impl Region {
    /// Creates a region without clauses or body
    pub fn new(kind: DirectiveKind, location: SourceLocation) -> Self {
        Region {
            kind,
            name: None,
            cancel_target: None,
            clauses: Vec::new(),
            body: None,
            location,
            dependent: false,
        }
    }

    /// Mode of the last `default` clause
    pub fn default_sharing(&self) -> DefaultSharing {
        self.clauses
            .iter()
            .rev()
            .find_map(|c| match c.kind {
                ClauseKind::Default(mode) => Some(mode),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Argument of `collapse`
    pub fn collapse_arg(&self) -> Option<&Expr> {
        self.clauses.iter().find_map(|c| match &c.kind {
            ClauseKind::Collapse(e) => Some(e),
            _ => None,
        })
    }

    /// `ordered` clause: `Some(None)` for a bare `ordered`
    pub fn ordered_arg(&self) -> Option<Option<&Expr>> {
        self.clauses.iter().find_map(|c| match &c.kind {
            ClauseKind::Ordered(e) => Some(e.as_ref()),
            _ => None,
        })
    }

    /// Has a clause matching `pred`
    pub fn has_clause(&self, pred: impl Fn(&ClauseKind) -> bool) -> bool {
        self.clauses.iter().any(|c| pred(&c.kind))
    }

    /// `order(concurrent)` present
    pub fn is_order_concurrent(&self) -> bool {
        self.has_clause(|k| matches!(k, ClauseKind::Order(OrderKind::Concurrent)))
    }

    /// `simd` clause present (ordered simd)
    pub fn has_simd_clause(&self) -> bool {
        self.has_clause(|k| matches!(k, ClauseKind::Simd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_directives_join_families() {
        let k = DirectiveKind::ParallelForSimd;
        assert!(k.is_parallel());
        assert!(k.is_worksharing());
        assert!(k.is_simd());
        assert!(k.is_loop_associated());
        assert!(!k.is_plain_worksharing());
    }

    #[test]
    fn test_task_family() {
        assert!(DirectiveKind::Task.is_task());
        assert!(DirectiveKind::TaskloopSimd.is_task());
        assert!(!DirectiveKind::Taskgroup.is_task());
        assert!(DirectiveKind::Task.is_implicit_task_boundary());
        assert!(!DirectiveKind::For.is_implicit_task_boundary());
    }

    #[test]
    fn test_shared_default_regions() {
        assert!(DirectiveKind::Parallel.implies_shared_default());
        assert!(DirectiveKind::Teams.implies_shared_default());
        assert!(!DirectiveKind::Task.implies_shared_default());
        assert!(!DirectiveKind::For.implies_shared_default());
        assert!(!DirectiveKind::Target.implies_shared_default());
    }

    #[test]
    fn test_default_sharing_last_clause_wins() {
        let mut region = Region::new(DirectiveKind::Parallel, SourceLocation::new(1, 1));
        assert_eq!(region.default_sharing(), DefaultSharing::Unspecified);
        region.clauses.push(Clause::new(
            ClauseKind::Default(DefaultSharing::None),
            vec![],
            SourceLocation::new(1, 10),
        ));
        assert_eq!(region.default_sharing(), DefaultSharing::None);
    }
}
