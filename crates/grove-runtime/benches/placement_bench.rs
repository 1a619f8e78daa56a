use criterion::{black_box, criterion_group, criterion_main, Criterion};
use grove_runtime::{EngineConfig, Placement, PopulationEngine, RecordingScene};

fn fill_cycle(placement: Placement) -> u32 {
    let mut engine = PopulationEngine::new(EngineConfig {
        placement,
        ..EngineConfig::default()
    })
    .expect("default config is valid");
    let mut scene = RecordingScene::new();
    for target in (10..=99).step_by(10).chain(std::iter::once(99)) {
        engine.reconcile(target, "January", &mut scene);
        engine.advance(1_000, &mut scene);
    }
    engine.materialized_count()
}

fn bench_placement(c: &mut Criterion) {
    c.bench_function("scatter 99 trees", |b| {
        b.iter(|| black_box(fill_cycle(Placement::Scatter)))
    });
    c.bench_function("grid 99 trees", |b| {
        b.iter(|| black_box(fill_cycle(Placement::Grid)))
    });
}

criterion_group!(benches, bench_placement);
criterion_main!(benches);
