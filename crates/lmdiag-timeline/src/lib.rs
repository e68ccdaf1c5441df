// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod analyzer;
pub mod gap;
pub mod snapshots;

pub use analyzer::{Stability, StabilityInfo, TimelineAnalyzer, Trend, analyze};
pub use gap::{computed_generalization_gap, generalization_gap_with};
pub use snapshots::{
    ActivationStats, GradientHealth, GroupHealth, PARAM_GROUPS, SaturationLevel,
    SnapshotHealth, SnapshotTimeline, TimelineSnapshot, parse_step_key, step_label,
};
