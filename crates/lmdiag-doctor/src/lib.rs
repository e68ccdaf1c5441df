// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod anomaly;
pub mod cost;
pub mod gap_grid;
pub mod selection;

pub use anomaly::{AnomalyDetector, AnomalyFlags, AnomalyInputs, AnomalyReport, detect_anomalies};
pub use cost::{
    CostEstimate, CostEstimator, CostLabel, estimate_cost, estimate_costs, format_flops,
    training_flops,
};
pub use gap_grid::{GapCell, GapGrid, GapSeverity, format_gap};
pub use selection::{FilterMode, select_configs, select_configs_with};
