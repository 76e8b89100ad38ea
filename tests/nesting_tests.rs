//! Nesting restrictions checked through whole-program analysis

use regionsema::analysis::RegionStatus;
use regionsema::ast::{Stmt, TreeBuilder, Ty};
use regionsema::diagnostics::{DiagnosticArg, NestingFailure};
use regionsema::nesting::FailureCategory;
use regionsema::{
    analyze, AnalysisOptions, AnalysisReport, DiagnosticBuffer, DiagnosticKind, DirectiveKind,
    NestingVerdict,
};

fn run(body: Vec<Stmt>, b: TreeBuilder) -> (AnalysisReport, DiagnosticBuffer) {
    let program = b.finish(body);
    let mut sink = DiagnosticBuffer::new();
    let report = analyze(&program, &AnalysisOptions::default(), &mut sink).unwrap();
    (report, sink)
}

// ====================
// Barriers and critical sections
// ====================

#[test]
fn test_barrier_in_critical_is_illegal() {
    for name in [None, Some("lock")] {
        let mut b = TreeBuilder::new();
        let barrier = b.region(DirectiveKind::Barrier).build();
        let mut critical = b.region(DirectiveKind::Critical);
        if let Some(name) = name {
            critical = critical.named(name);
        }
        let critical = critical.body(barrier).build();
        let parallel = b.region(DirectiveKind::Parallel).body(critical).build();
        let (report, sink) = run(vec![parallel], b);

        assert!(sink.contains(DiagnosticKind::IllegalNesting(
            NestingFailure::IncompatibleParent
        )));
        let barrier = report.regions_of(DirectiveKind::Barrier).next().unwrap();
        assert_eq!(barrier.status, RegionStatus::InvalidNesting);
        assert!(!barrier.nesting.is_legal());
    }
}

#[test]
fn test_duplicate_critical_name_through_intermediate_regions() {
    // critical(A) { parallel { task { critical(A) } } }
    let mut b = TreeBuilder::new();
    let inner = b.region(DirectiveKind::Critical).named("A").build();
    let task = b.region(DirectiveKind::Task).body(inner).build();
    let parallel = b.region(DirectiveKind::Parallel).body(task).build();
    let outer = b
        .region(DirectiveKind::Critical)
        .named("A")
        .body(parallel)
        .build();
    let (report, sink) = run(vec![outer], b);

    assert!(sink.contains(DiagnosticKind::DuplicateNamedRegion));
    let diag = sink
        .diagnostics()
        .iter()
        .find(|d| d.kind == DiagnosticKind::DuplicateNamedRegion)
        .unwrap();
    assert!(diag.args.contains(&DiagnosticArg::Location(report.regions[0].location)));

    let inner = report.regions.last().unwrap();
    assert_eq!(inner.kind, DirectiveKind::Critical);
    match &inner.nesting {
        NestingVerdict::Illegal {
            failure,
            conflicting,
            ..
        } => {
            assert_eq!(*failure, FailureCategory::DuplicateName);
            assert_eq!(*conflicting, Some(0));
        }
        NestingVerdict::Legal => panic!("expected a duplicate-name verdict"),
    }
}

#[test]
fn test_differently_named_criticals_nest() {
    let mut b = TreeBuilder::new();
    let inner = b.region(DirectiveKind::Critical).named("B").build();
    let outer = b
        .region(DirectiveKind::Critical)
        .named("A")
        .body(inner)
        .build();
    let (report, sink) = run(vec![outer], b);
    assert!(sink.is_empty());
    assert!(report.regions.iter().all(|r| r.nesting.is_legal()));
}

// ====================
// Orphaned constructs
// ====================

#[test]
fn test_orphaned_section_hints_sections() {
    let mut b = TreeBuilder::new();
    let section = b.region(DirectiveKind::Section).build();
    let (report, sink) = run(vec![section], b);

    assert!(sink.contains(DiagnosticKind::IllegalNesting(NestingFailure::Orphaned)));
    match &report.regions[0].nesting {
        NestingVerdict::Illegal { hint, .. } => assert_eq!(*hint, Some(DirectiveKind::Sections)),
        NestingVerdict::Legal => panic!("section outside sections must be rejected"),
    }
}

#[test]
fn test_section_inside_sections_is_legal() {
    let mut b = TreeBuilder::new();
    let first = b.region(DirectiveKind::Section).build();
    let second = b.region(DirectiveKind::Section).build();
    let block = b.block(vec![first, second]);
    let sections = b.region(DirectiveKind::Sections).body(block).build();
    let parallel = b.region(DirectiveKind::Parallel).body(sections).build();
    let (report, sink) = run(vec![parallel], b);
    assert!(sink.is_empty());
    assert_eq!(report.regions.len(), 4);
}

// ====================
// Teams and distribute
// ====================

#[test]
fn test_teams_must_be_only_statement_of_target() {
    let mut b = TreeBuilder::new();
    let x = b.local("x", Ty::i32());
    let teams = b.region(DirectiveKind::Teams).build();
    let other = b.use_vars(&[x]);
    let block = b.block(vec![teams, other]);
    let target = b.region(DirectiveKind::Target).body(block).build();
    let (_, sink) = run(vec![target], b);
    assert!(sink.contains(DiagnosticKind::IllegalNesting(
        NestingFailure::IncompatibleParent
    )));

    let mut b = TreeBuilder::new();
    let teams = b.region(DirectiveKind::Teams).build();
    let target = b.region(DirectiveKind::Target).body(teams).build();
    let (_, sink) = run(vec![target], b);
    assert!(sink.is_empty());
}

#[test]
fn test_distribute_outside_teams_is_orphaned() {
    let mut b = TreeBuilder::new();
    let i = b.local("i", Ty::i32());
    let (lower, upper) = (b.int(0), b.int(10));
    let body = b.use_vars(&[i]);
    let lp = b.counted_loop(i, lower, upper, body);
    let distribute = b.region(DirectiveKind::Distribute).body(lp).build();
    let (report, sink) = run(vec![distribute], b);

    assert!(sink.contains(DiagnosticKind::IllegalNesting(NestingFailure::Orphaned)));
    assert!(report.regions[0].loop_nest.is_none());
}

// ====================
// Cancellation
// ====================

#[test]
fn test_cancel_marks_matching_region() {
    let mut b = TreeBuilder::new();
    let cancel = b
        .region(DirectiveKind::Cancel)
        .cancels(DirectiveKind::Taskgroup)
        .build();
    let task = b.region(DirectiveKind::Task).body(cancel).build();
    let taskgroup = b.region(DirectiveKind::Taskgroup).body(task).build();
    let (report, sink) = run(vec![taskgroup], b);

    assert!(sink.is_empty());
    let task = report.regions_of(DirectiveKind::Task).next().unwrap();
    assert!(task.cancel_present);
}

#[test]
fn test_cancel_with_wrong_construct_type() {
    let mut b = TreeBuilder::new();
    let cancel = b
        .region(DirectiveKind::Cancel)
        .cancels(DirectiveKind::For)
        .build();
    let parallel = b.region(DirectiveKind::Parallel).body(cancel).build();
    let (report, sink) = run(vec![parallel], b);

    assert!(sink.contains(DiagnosticKind::IllegalNesting(
        NestingFailure::IncompatibleParent
    )));
    assert!(!report.regions[0].cancel_present);
}
