//! Criterion benchmarks for the MEU hot path in `sa-core`.
//!
//! Every run uses the built-in allocation model so results are comparable
//! between machines.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sa_config::{EngineSettings, StrategyKind};
use sa_core::inference::InferenceEngine;
use sa_core::model::{build_allocation_model, scenarios};

fn bench_infer(c: &mut Criterion) {
    let diagram = build_allocation_model().expect("built-in model should build");
    let mut group = c.benchmark_group("infer");

    for strategy in [StrategyKind::Enumeration, StrategyKind::VariableElimination] {
        for scenario in scenarios() {
            group.bench_with_input(
                BenchmarkId::new(strategy.to_string(), scenario.name),
                &scenario.evidence,
                |b, evidence| {
                    b.iter(|| {
                        let settings = EngineSettings {
                            strategy,
                            ..EngineSettings::default()
                        };
                        let mut engine = InferenceEngine::new(black_box(&diagram), settings);
                        engine
                            .set_evidence(evidence.iter().copied())
                            .expect("scenario evidence should resolve");
                        engine.infer().expect("inference should succeed");
                        black_box(engine.meu("Invest_In").expect("decision should exist"));
                    })
                },
            );
        }
    }

    // Without evidence the whole product space is live; elimination only.
    group.bench_function("variable_elimination/prior", |b| {
        let settings = EngineSettings {
            strategy: StrategyKind::VariableElimination,
            ..EngineSettings::default()
        };
        b.iter(|| {
            let mut engine = InferenceEngine::new(black_box(&diagram), settings.clone());
            engine.infer().expect("inference should succeed");
            black_box(engine.meu("Invest_In").expect("decision should exist"));
        })
    });

    group.finish();
}

fn bench_build(c: &mut Criterion) {
    c.bench_function("build_allocation_model", |b| {
        b.iter(|| black_box(build_allocation_model().expect("built-in model should build")))
    });
}

criterion_group!(benches, bench_infer, bench_build);
criterion_main!(benches);
