// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::fmt;

use lmdiag_core::{ConfigRecord, CostConfig, DiagError};
use tracing::warn;

/// Relative compute cost within a comparison set, cheapest first.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CostLabel {
    Minimal,
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl CostLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::VeryHigh => "very-high",
        }
    }
}

impl fmt::Display for CostLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct CostEstimate {
    pub config_id: String,
    pub flops: f64,
    /// `flops` over the largest `flops` in the set, in `[0, 1]`.
    pub ratio: f64,
    pub label: CostLabel,
}

/// Approximate training FLOPs: parameter count times step budget.
pub fn training_flops(total_params: u64, total_steps: u64) -> f64 {
    total_params as f64 * total_steps as f64
}

#[derive(Clone, Debug, Default)]
pub struct CostEstimator {
    config: CostConfig,
}

impl CostEstimator {
    pub fn new(config: CostConfig) -> Result<Self, DiagError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CostConfig {
        &self.config
    }

    /// Maps a normalized ratio to a label; a ratio on a breakpoint takes the
    /// cheaper class.
    pub fn classify(&self, ratio: f64) -> CostLabel {
        const LABELS: [CostLabel; 4] = [
            CostLabel::Minimal,
            CostLabel::Low,
            CostLabel::Moderate,
            CostLabel::High,
        ];
        self.config
            .breakpoints
            .iter()
            .zip(LABELS)
            .find(|(breakpoint, _)| ratio <= **breakpoint)
            .map_or(CostLabel::VeryHigh, |(_, label)| label)
    }

    /// Classifies every record against the most expensive one in `configs`.
    pub fn estimate_costs(&self, configs: &[ConfigRecord], total_steps: u64) -> Vec<CostEstimate> {
        let max_flops = max_flops(configs.iter(), total_steps);
        configs
            .iter()
            .map(|config| self.estimate_with_max(config, max_flops, total_steps))
            .collect()
    }

    /// Classifies one record against its siblings. The record itself takes
    /// part in the maximum.
    pub fn estimate_cost(
        &self,
        config: &ConfigRecord,
        siblings: &[ConfigRecord],
        total_steps: u64,
    ) -> CostEstimate {
        let max_flops = max_flops(siblings.iter().chain([config]), total_steps);
        self.estimate_with_max(config, max_flops, total_steps)
    }

    fn estimate_with_max(&self, config: &ConfigRecord, max_flops: f64, total_steps: u64) -> CostEstimate {
        let flops = training_flops(config.total_params, total_steps);
        let ratio = if max_flops > 0.0 {
            (flops / max_flops).clamp(0.0, 1.0)
        } else {
            0.0
        };
        CostEstimate {
            config_id: config.config_id.clone(),
            flops,
            ratio,
            label: self.classify(ratio),
        }
    }
}

fn max_flops<'a>(configs: impl Iterator<Item = &'a ConfigRecord>, total_steps: u64) -> f64 {
    let max = configs
        .map(|config| training_flops(config.total_params, total_steps))
        .fold(0.0, f64::max);
    if max <= 0.0 {
        warn!(total_steps, "cost set has no positive FLOP count; every ratio is 0");
    }
    max
}

/// Classifies every record with the default breakpoints.
pub fn estimate_costs(configs: &[ConfigRecord], total_steps: u64) -> Vec<CostEstimate> {
    CostEstimator::default().estimate_costs(configs, total_steps)
}

/// Classifies one record against its siblings with the default breakpoints.
pub fn estimate_cost(config: &ConfigRecord, siblings: &[ConfigRecord], total_steps: u64) -> CostEstimate {
    CostEstimator::default().estimate_cost(config, siblings, total_steps)
}

/// Renders a FLOP count with a decimal SI prefix, e.g. `1.50 GFLOPs`.
pub fn format_flops(flops: f64) -> String {
    if flops >= 1e12 {
        format!("{:.2} TFLOPs", flops / 1e12)
    } else if flops >= 1e9 {
        format!("{:.2} GFLOPs", flops / 1e9)
    } else if flops >= 1e6 {
        format!("{:.2} MFLOPs", flops / 1e6)
    } else if flops >= 1e3 {
        format!("{:.2} KFLOPs", flops / 1e3)
    } else {
        format!("{flops:.0} FLOPs")
    }
}

#[cfg(test)]
mod tests {
    use super::{CostEstimator, CostLabel, estimate_cost, estimate_costs, format_flops};
    use lmdiag_core::{ConfigRecord, CostConfig};

    fn with_params(id: &str, total_params: u64) -> ConfigRecord {
        ConfigRecord {
            config_id: id.to_string(),
            total_params,
            ..ConfigRecord::default()
        }
    }

    #[test]
    fn doubling_params_walks_up_the_labels() {
        let configs = [with_params("a", 100), with_params("b", 200), with_params("c", 400)];
        let estimates = estimate_costs(&configs, 5_000);
        let ratios: Vec<f64> = estimates.iter().map(|e| e.ratio).collect();
        assert_eq!(ratios, vec![0.25, 0.5, 1.0]);
        let labels: Vec<CostLabel> = estimates.iter().map(|e| e.label).collect();
        assert_eq!(labels, vec![CostLabel::Low, CostLabel::Moderate, CostLabel::VeryHigh]);
        assert_eq!(estimates[2].flops, 2.0e6);
    }

    #[test]
    fn every_class_is_reachable() {
        let estimator = CostEstimator::default();
        assert_eq!(estimator.classify(0.0), CostLabel::Minimal);
        assert_eq!(estimator.classify(0.1), CostLabel::Minimal);
        assert_eq!(estimator.classify(0.2), CostLabel::Low);
        assert_eq!(estimator.classify(0.3), CostLabel::Moderate);
        assert_eq!(estimator.classify(0.6), CostLabel::High);
        assert_eq!(estimator.classify(0.76), CostLabel::VeryHigh);
    }

    #[test]
    fn zero_maximum_yields_zero_ratio() {
        let configs = [with_params("a", 0), with_params("b", 0)];
        let estimates = estimate_costs(&configs, 1_000);
        assert!(estimates.iter().all(|e| e.ratio == 0.0 && e.label == CostLabel::Minimal));
        assert_eq!(estimate_costs(&configs, 0).len(), 2);
        assert!(estimate_costs(&[], 1_000).is_empty());
    }

    #[test]
    fn single_estimate_includes_itself_in_the_maximum() {
        let siblings = [with_params("a", 100)];
        let estimate = estimate_cost(&with_params("big", 1_000), &siblings, 10);
        assert_eq!(estimate.ratio, 1.0);
        assert_eq!(estimate.label, CostLabel::VeryHigh);
        assert_eq!(estimate.config_id, "big");
    }

    #[test]
    fn custom_breakpoints_are_validated_and_used() {
        let estimator = CostEstimator::new(CostConfig {
            breakpoints: [0.2, 0.4, 0.6, 0.8],
        })
        .expect("breakpoints increase");
        assert_eq!(estimator.classify(0.25), CostLabel::Low);
        assert!(
            CostEstimator::new(CostConfig {
                breakpoints: [0.5, 0.4, 0.6, 0.8],
            })
            .is_err()
        );
    }

    #[test]
    fn labels_render_kebab_case() {
        assert_eq!(CostLabel::VeryHigh.to_string(), "very-high");
        assert_eq!(CostLabel::Minimal.as_str(), "minimal");
        assert!(CostLabel::Low < CostLabel::High);
    }

    #[test]
    fn flop_counts_pick_a_prefix() {
        assert_eq!(format_flops(512.0), "512 FLOPs");
        assert_eq!(format_flops(1_500.0), "1.50 KFLOPs");
        assert_eq!(format_flops(2.0e6), "2.00 MFLOPs");
        assert_eq!(format_flops(3.25e9), "3.25 GFLOPs");
        assert_eq!(format_flops(1.0e13), "10.00 TFLOPs");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn label_serializes_kebab_case() {
        let encoded = serde_json::to_string(&CostLabel::VeryHigh).expect("label should serialize");
        assert_eq!(encoded, "\"very-high\"");
    }
}
