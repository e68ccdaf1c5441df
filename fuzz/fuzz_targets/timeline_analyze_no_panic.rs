// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

#[path = "common.rs"]
mod common;

use lmdiag_core::{ConfigRecord, GradNormEntry, MetricPoint, MetricSeries};
use lmdiag_doctor::{AnomalyInputs, detect_anomalies};
use lmdiag_timeline::{Stability, analyze, computed_generalization_gap};
use libfuzzer_sys::fuzz_target;

fn build_series(cursor: &mut common::ByteCursor<'_>, len: usize) -> Option<MetricSeries> {
    let mut step = 0u64;
    let mut points = Vec::with_capacity(len);
    for _ in 0..len {
        // Occasionally repeat a step to exercise the ordering check.
        step = step.saturating_add(u64::from(cursor.next_u8() % 4));
        points.push(MetricPoint::new(step, cursor.next_value()));
    }
    MetricSeries::new(points).ok()
}

fn build_grad_norm(cursor: &mut common::ByteCursor<'_>) -> GradNormEntry {
    match cursor.next_u8() % 4 {
        0 => GradNormEntry::Scalar(cursor.next_value()),
        1 => GradNormEntry::Structured {
            total: Some(cursor.next_value()),
        },
        2 => GradNormEntry::Structured { total: None },
        _ => GradNormEntry::Unparseable,
    }
}

fuzz_target!(|data: &[u8]| {
    let mut cursor = common::ByteCursor::new(data);
    let train_len = common::bounded(cursor.next_u8(), 0, 64);
    let val_len = common::bounded(cursor.next_u8(), 0, 64);
    let train = build_series(&mut cursor, train_len);
    let validation = build_series(&mut cursor, val_len);

    if let Some(series) = validation.as_ref() {
        match analyze(series) {
            Stability::InsufficientData { points } => assert!(points < 5),
            Stability::Measured(info) => {
                assert!(info.variance >= 0.0 || info.variance.is_nan());
                assert!(info.spike_steps.windows(2).all(|pair| pair[0] < pair[1]));
            }
        }
    }

    let mut grad_norms = Vec::new();
    while !cursor.is_exhausted() && grad_norms.len() < 32 {
        grad_norms.push(build_grad_norm(&mut cursor));
    }

    let record = ConfigRecord {
        config_id: "fuzz".to_string(),
        final_train_loss: cursor.next_value(),
        perplexity: cursor.next_value(),
        generalization_gap: Some(cursor.next_value()),
        expected_uniform_loss: Some(cursor.next_value()),
        ..ConfigRecord::default()
    };

    let mut inputs = AnomalyInputs::new(&record).with_grad_norms(&grad_norms);
    if let (Some(train), Some(validation)) = (train.as_ref(), validation.as_ref()) {
        let _gap = computed_generalization_gap(train, validation, 10);
        inputs = inputs.with_losses(train, validation);
    }
    let report = detect_anomalies(&inputs);
    assert_eq!(report.reasons.len(), report.flags.count());
});
