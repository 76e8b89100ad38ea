use criterion::{black_box, criterion_group, criterion_main, Criterion};
use regionsema::ast::{ReductionOp, Stmt, TreeBuilder, Ty};
use regionsema::{analyze, AnalysisOptions, DiagnosticBuffer, DirectiveKind, Program};

/// `parallel { for(collapse 2) { task { ... } } }` repeated `copies` times
fn build_program(copies: usize) -> Program {
    let mut b = TreeBuilder::new();
    let n = b.local("n", Ty::i32());
    let sum = b.local("sum", Ty::i64());
    let g = b.global("table", Ty::f64().array_of(Some(1024)));
    let mut regions: Vec<Stmt> = Vec::with_capacity(copies);
    for k in 0..copies {
        let i = b.local(&format!("i{}", k), Ty::i32());
        let j = b.local(&format!("j{}", k), Ty::i32());
        let task_body = b.use_vars(&[i, j, g, sum]);
        let task = b.region(DirectiveKind::Task).body(task_body).build();
        let (lj, uj) = (b.var(i), b.var(n));
        let inner = b.counted_loop(j, lj, uj, task);
        let (li, ui) = (b.int(0), b.var(n));
        let outer = b.counted_loop(i, li, ui, inner);
        let worksharing = b
            .region(DirectiveKind::For)
            .collapse(2)
            .reduction(ReductionOp::Add, &[sum])
            .body(outer)
            .build();
        let parallel = b.region(DirectiveKind::Parallel).body(worksharing).build();
        regions.push(parallel);
    }
    b.finish(regions)
}

fn analysis_benchmark(c: &mut Criterion) {
    let program = build_program(64);
    let options = AnalysisOptions::default();

    c.bench_function("analyze 64 collapsed nests", |b| {
        b.iter(|| {
            let mut sink = DiagnosticBuffer::new();
            analyze(black_box(&program), &options, &mut sink).unwrap()
        })
    });
}

criterion_group!(benches, analysis_benchmark);
criterion_main!(benches);
