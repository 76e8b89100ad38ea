//! Property-based tests for loop normalization and attribute resolution
//!
//! These tests use proptest to generate loop bounds, steps and nests and
//! verify that:
//! 1. Trip counts agree with brute-force iteration of the source loop
//! 2. Collapsed index recovery visits every point of the nest in order
//!    (for dependent bounds, the recheck keeps exactly the nest's points)
//! 3. Analysis results are deterministic

use proptest::prelude::*;
use regionsema::ast::{DeclTable, Expr, Stmt, TreeBuilder, Ty};
use regionsema::loops::LoopNest;
use regionsema::{analyze, AnalysisOptions, DiagnosticBuffer, DirectiveKind, LoopCanonicalizer};

// =============================================================================
// HELPERS
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct LoopSpec {
    lower: i128,
    upper: i128,
    step: i128,
    ascending: bool,
    strict: bool,
}

fn loop_spec() -> impl Strategy<Value = LoopSpec> {
    (-20i128..20, -20i128..20, 1i128..6, any::<bool>(), any::<bool>()).prop_map(
        |(lower, upper, step, ascending, strict)| LoopSpec {
            lower,
            upper,
            step,
            ascending,
            strict,
        },
    )
}

/// Values the counter takes when the loop runs as written
fn brute_force(spec: LoopSpec) -> Vec<i128> {
    let mut values = Vec::new();
    let mut i = spec.lower;
    loop {
        let runs = match (spec.ascending, spec.strict) {
            (true, true) => i < spec.upper,
            (true, false) => i <= spec.upper,
            (false, true) => i > spec.upper,
            (false, false) => i >= spec.upper,
        };
        if !runs {
            break;
        }
        values.push(i);
        i = if spec.ascending { i + spec.step } else { i - spec.step };
    }
    values
}

fn build_loop(b: &mut TreeBuilder, counter: regionsema::DeclId, spec: LoopSpec, body: Stmt) -> Stmt {
    let lower = b.int(spec.lower);
    build_loop_from(b, counter, lower, spec, body)
}

/// Inner loop whose lower bound is `outer + offset`
fn build_offset_loop(
    b: &mut TreeBuilder,
    counter: regionsema::DeclId,
    outer: regionsema::DeclId,
    offset: i128,
    spec: LoopSpec,
    body: Stmt,
) -> Stmt {
    let (ov, shift) = (b.var(outer), b.int(offset));
    let lower = b.add(ov, shift);
    build_loop_from(b, counter, lower, spec, body)
}

fn build_loop_from(
    b: &mut TreeBuilder,
    counter: regionsema::DeclId,
    lower: Expr,
    spec: LoopSpec,
    body: Stmt,
) -> Stmt {
    let init = b.assign(counter, lower);
    let init = b.expr_stmt(init);
    let (iv, upper) = (b.var(counter), b.int(spec.upper));
    let cond = match (spec.ascending, spec.strict) {
        (true, true) => b.lt(iv, upper),
        (true, false) => b.le(iv, upper),
        (false, true) => b.gt(iv, upper),
        (false, false) => b.ge(iv, upper),
    };
    let step = b.int(spec.step);
    let inc = if spec.ascending {
        b.add_assign(counter, step)
    } else {
        b.sub_assign(counter, step)
    };
    b.for_loop(init, cond, inc, body)
}

fn canonicalize(stmt: &Stmt, depth: usize, decls: &mut DeclTable) -> LoopNest {
    let options = AnalysisOptions::default();
    LoopCanonicalizer::new(&options)
        .canonicalize_loops(stmt, depth, decls)
        .expect("canonical loop")
        .expect("constant header")
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn trip_count_matches_iteration(spec in loop_spec()) {
        let mut b = TreeBuilder::new();
        let i = b.local("i", Ty::i32());
        let body = b.use_vars(&[i]);
        let stmt = build_loop(&mut b, i, spec, body);
        let mut decls = b.into_decls();

        let nest = canonicalize(&stmt, 1, &mut decls);
        let expected = brute_force(spec);
        prop_assert_eq!(nest.total_trip_count.value, Some(expected.len() as u128));

        let visited: Vec<i128> = (0..expected.len() as u128)
            .map(|iv| nest.evaluate_point(iv).expect("in range")[0])
            .collect();
        prop_assert_eq!(visited, expected);
    }

    #[test]
    fn collapsed_recovery_visits_nest_in_order(outer in loop_spec(), inner in loop_spec()) {
        let mut b = TreeBuilder::new();
        let i = b.local("i", Ty::i32());
        let j = b.local("j", Ty::i32());
        let body = b.use_vars(&[i, j]);
        let inner_loop = build_loop(&mut b, j, inner, body);
        let stmt = build_loop(&mut b, i, outer, inner_loop);
        let mut decls = b.into_decls();

        let nest = canonicalize(&stmt, 2, &mut decls);
        let expected: Vec<Vec<i128>> = brute_force(outer)
            .into_iter()
            .flat_map(|x| brute_force(inner).into_iter().map(move |y| vec![x, y]))
            .collect();
        prop_assert_eq!(nest.total_trip_count.value, Some(expected.len() as u128));

        let total = expected.len() as u128;
        let visited: Vec<Vec<i128>> = (0..total)
            .map(|iv| nest.evaluate_point(iv).expect("in range"))
            .collect();
        prop_assert_eq!(visited, expected);
        prop_assert!(nest.recover_indices(total).is_none());
    }

    #[test]
    fn dependent_lower_bound_accepts_only_nest_points(
        outer_lower in -8i128..8,
        outer_upper in -8i128..8,
        offset in -6i128..6,
        inner in loop_spec(),
    ) {
        let mut b = TreeBuilder::new();
        let i = b.local("i", Ty::i32());
        let j = b.local("j", Ty::i32());
        let body = b.use_vars(&[i, j]);
        let inner_loop = build_offset_loop(&mut b, j, i, offset, inner, body);
        let (lower, upper) = (b.int(outer_lower), b.int(outer_upper));
        let stmt = b.counted_loop(i, lower, upper, inner_loop);
        let mut decls = b.into_decls();

        let nest = canonicalize(&stmt, 2, &mut decls);
        prop_assert!(nest.levels[1].is_non_rectangular());
        let expected: Vec<Vec<i128>> = (outer_lower..outer_upper)
            .flat_map(|x| {
                let spec = LoopSpec { lower: x + offset, ..inner };
                brute_force(spec).into_iter().map(move |y| vec![x, y])
            })
            .collect();

        let total = nest.total_trip_count.value.expect("constant covering space");
        prop_assert!(total >= expected.len() as u128);
        let accepted: Vec<Vec<i128>> = (0..total)
            .map(|iv| nest.evaluate_point(iv).expect("in range"))
            .filter(|point| nest.accepts(point) == Some(true))
            .collect();
        prop_assert_eq!(accepted, expected);
    }

    #[test]
    fn analysis_is_deterministic(spec in loop_spec(), shared in any::<bool>()) {
        let mut b = TreeBuilder::new();
        let i = b.local("i", Ty::i32());
        let x = b.local("x", Ty::i32());
        let g = b.global("g", Ty::i32());
        let task_body = b.use_vars(&[x, g]);
        let task = b.region(DirectiveKind::Task).body(task_body).build();
        let body = b.block(vec![task]);
        let lp = build_loop(&mut b, i, spec, body);
        let region = b.region(DirectiveKind::ParallelFor);
        let region = if shared { region.shared(&[x]) } else { region.private(&[x]) };
        let region = region.body(lp).build();
        let program = b.finish(vec![region]);

        let options = AnalysisOptions::default();
        let mut first_sink = DiagnosticBuffer::new();
        let first = analyze(&program, &options, &mut first_sink).unwrap();
        let mut second_sink = DiagnosticBuffer::new();
        let second = analyze(&program, &options, &mut second_sink).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first_sink.diagnostics(), second_sink.diagnostics());
    }
}
