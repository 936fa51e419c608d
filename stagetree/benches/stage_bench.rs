//! Benchmarks for stage tree execution.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stagetree::prelude::*;

fn wide_stage(parallel: bool, steps: usize) -> StageContext {
    let mut builder = StageContext::builder("wide");
    if parallel {
        builder = builder.parallel();
    }
    for _ in 0..steps {
        builder = builder.run("noop", |_ctx: StepContext| async { Ok(ActionOutput::Success) });
    }
    builder.build()
}

fn nested_stage(depth: usize) -> StageContext {
    let leaf = StageContext::builder("leaf")
        .run("noop", |_ctx: StepContext| async { Ok(ActionOutput::Success) })
        .build();
    (0..depth).fold(leaf, |inner, level| {
        StageContext::builder(format!("level{level}")).stage(inner).build()
    })
}

fn stage_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");

    let sequential = wide_stage(false, 64);
    c.bench_function("sequential_64_steps", |b| {
        b.to_async(&runtime).iter(|| async {
            black_box(run(sequential.clone(), StageIndex::Stage(0), CancelSignal::new()).await)
        });
    });

    let parallel = wide_stage(true, 64);
    c.bench_function("parallel_64_steps", |b| {
        b.to_async(&runtime).iter(|| async {
            black_box(run(parallel.clone(), StageIndex::Stage(0), CancelSignal::new()).await)
        });
    });

    let nested = nested_stage(16);
    c.bench_function("nested_depth_16", |b| {
        b.to_async(&runtime).iter(|| async {
            black_box(run(nested.clone(), StageIndex::Stage(0), CancelSignal::new()).await)
        });
    });
}

criterion_group!(benches, stage_benchmark);
criterion_main!(benches);
