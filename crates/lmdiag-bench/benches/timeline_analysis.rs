// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use lmdiag_bench::{config_sweep, loss_curve};
use lmdiag_doctor::{AnomalyDetector, AnomalyInputs, GapGrid, estimate_costs};
use lmdiag_timeline::TimelineAnalyzer;

const STEP_BUDGET: u64 = 20_000;

fn benchmark_timeline(c: &mut Criterion) {
    let analyzer = TimelineAnalyzer::default();
    let mut group = c.benchmark_group("timeline_analysis");

    for len in [50, 500, 5_000] {
        let series = loss_curve(len, 0xdead_beef);
        group.bench_function(format!("analyze_len{len}"), |b| {
            b.iter(|| black_box(analyzer.analyze(black_box(&series))))
        });
    }

    group.finish();
}

fn benchmark_doctor(c: &mut Criterion) {
    let configs = config_sweep(0xc0ff_ee);
    let train = loss_curve(500, 1);
    let validation = loss_curve(500, 2);
    let detector = AnomalyDetector::default();
    let mut group = c.benchmark_group("doctor");

    group.bench_function("detect_full_inputs", |b| {
        b.iter(|| {
            let inputs = AnomalyInputs::new(&configs[0]).with_losses(&train, &validation);
            black_box(detector.detect(black_box(&inputs)))
        })
    });

    group.bench_function("estimate_costs_sweep60", |b| {
        b.iter(|| black_box(estimate_costs(black_box(&configs), STEP_BUDGET)))
    });

    group.bench_function("gap_grid_sweep60", |b| {
        b.iter(|| black_box(GapGrid::build(black_box(&configs))))
    });

    group.finish();
}

criterion_group!(benches, benchmark_timeline, benchmark_doctor);
criterion_main!(benches);
