// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use lmdiag_core::stats::mean;
use lmdiag_core::{MetricSeries, TimelineConfig};

/// Last validation value minus the mean of the trailing `window` training
/// values. `None` when either series is empty.
///
/// Positive values mean the model does worse on held-out data than its
/// smoothed training loss.
pub fn computed_generalization_gap(
    train: &MetricSeries,
    validation: &MetricSeries,
    window: usize,
) -> Option<f64> {
    let last_validation = validation.last()?.value;
    let values = train.values();
    let start = values.len().saturating_sub(window.max(1));
    let smoothed_train = mean(&values[start..])?;
    Some(last_validation - smoothed_train)
}

/// [`computed_generalization_gap`] with the configured smoothing window.
pub fn generalization_gap_with(
    config: &TimelineConfig,
    train: &MetricSeries,
    validation: &MetricSeries,
) -> Option<f64> {
    computed_generalization_gap(train, validation, config.gap_smoothing_window)
}
