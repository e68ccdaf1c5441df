// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use lmdiag_core::stats::mean;
use lmdiag_core::{
    AnomalyConfig, ConfigRecord, DiagError, DiagnosticsConfig, GradNormEntry, MetricSeries,
    TimelineConfig, positive_grad_norms,
};
use lmdiag_timeline::{Stability, TimelineAnalyzer, computed_generalization_gap};
use tracing::debug;

/// Six independent health flags for one trained configuration.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AnomalyFlags {
    pub loss_above_random: bool,
    pub large_gen_gap: bool,
    pub loss_increasing: bool,
    pub non_decreasing_loss: bool,
    pub perplexity_mismatch: bool,
    pub unstable_gradients: bool,
}

impl AnomalyFlags {
    pub fn any(&self) -> bool {
        self.count() > 0
    }

    pub fn count(&self) -> usize {
        self.as_pairs().iter().filter(|(_, raised)| *raised).count()
    }

    /// Names of the raised flags in declaration order.
    pub fn raised(&self) -> Vec<&'static str> {
        self.as_pairs()
            .into_iter()
            .filter_map(|(name, raised)| raised.then_some(name))
            .collect()
    }

    fn as_pairs(&self) -> [(&'static str, bool); 6] {
        [
            ("loss_above_random", self.loss_above_random),
            ("large_gen_gap", self.large_gen_gap),
            ("loss_increasing", self.loss_increasing),
            ("non_decreasing_loss", self.non_decreasing_loss),
            ("perplexity_mismatch", self.perplexity_mismatch),
            ("unstable_gradients", self.unstable_gradients),
        ]
    }
}

/// Everything known about one configuration. Only the record is required.
#[derive(Clone, Copy, Debug)]
pub struct AnomalyInputs<'a> {
    pub record: &'a ConfigRecord,
    pub train: Option<&'a MetricSeries>,
    pub validation: Option<&'a MetricSeries>,
    pub grad_norms: Option<&'a [GradNormEntry]>,
    /// Generalization gap computed by the caller from the full timeline.
    pub computed_gap: Option<f64>,
}

impl<'a> AnomalyInputs<'a> {
    pub fn new(record: &'a ConfigRecord) -> Self {
        Self {
            record,
            train: None,
            validation: None,
            grad_norms: None,
            computed_gap: None,
        }
    }

    pub fn with_losses(mut self, train: &'a MetricSeries, validation: &'a MetricSeries) -> Self {
        self.train = Some(train);
        self.validation = Some(validation);
        self
    }

    pub fn with_validation(mut self, validation: &'a MetricSeries) -> Self {
        self.validation = Some(validation);
        self
    }

    pub fn with_grad_norms(mut self, grad_norms: &'a [GradNormEntry]) -> Self {
        self.grad_norms = Some(grad_norms);
        self
    }

    pub fn with_computed_gap(mut self, gap: f64) -> Self {
        self.computed_gap = Some(gap);
        self
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct AnomalyReport {
    pub flags: AnomalyFlags,
    /// Stability of the validation series, `None` without one.
    pub validation_stability: Option<Stability>,
    /// One line per raised flag.
    pub reasons: Vec<String>,
}

/// Heuristic anomaly inference over a configuration record and its logs.
#[derive(Clone, Debug, Default)]
pub struct AnomalyDetector {
    config: AnomalyConfig,
    analyzer: TimelineAnalyzer,
    gap_window: usize,
}

impl AnomalyDetector {
    pub fn new(config: AnomalyConfig, timeline: TimelineConfig) -> Result<Self, DiagError> {
        config.validate()?;
        let gap_window = timeline.gap_smoothing_window;
        let analyzer = TimelineAnalyzer::new(timeline)?;
        Ok(Self {
            config,
            analyzer,
            gap_window,
        })
    }

    pub fn from_config(config: &DiagnosticsConfig) -> Result<Self, DiagError> {
        Self::new(config.anomaly.clone(), config.timeline.clone())
    }

    pub fn config(&self) -> &AnomalyConfig {
        &self.config
    }

    pub fn detect(&self, inputs: &AnomalyInputs<'_>) -> AnomalyReport {
        let record = inputs.record;
        let final_loss = record.final_loss();
        let mut flags = AnomalyFlags::default();
        let mut reasons = Vec::new();

        if let Some(uniform) = record.expected_uniform_loss {
            let limit = self.config.random_loss_ratio * uniform;
            if final_loss >= limit {
                flags.loss_above_random = true;
                reasons.push(format!(
                    "loss_above_random: final loss {final_loss:.3} >= {:.2} x uniform loss {uniform:.3}",
                    self.config.random_loss_ratio
                ));
            }
        }

        if let Some(gap) = self.effective_gap(inputs) {
            if gap > self.config.gen_gap_threshold {
                flags.large_gen_gap = true;
                reasons.push(format!(
                    "large_gen_gap: generalization gap {gap:.3} > {:.3}",
                    self.config.gen_gap_threshold
                ));
            }
        }

        let validation_stability = inputs.validation.map(|series| self.analyzer.analyze(series));
        if let Some(series) = inputs.validation {
            let values = series.values();
            if let Some((recent, previous)) = self.recent_window_means(&values) {
                if recent > self.config.increasing_ratio * previous {
                    flags.loss_increasing = true;
                    reasons.push(format!(
                        "loss_increasing: last {w} validation mean {recent:.4} > {:.2} x previous {w} mean {previous:.4}",
                        self.config.increasing_ratio,
                        w = self.config.increasing_window
                    ));
                }
            }
            if let Some((first, second)) = self.half_means(&values) {
                if second >= self.config.plateau_ratio * first {
                    flags.non_decreasing_loss = true;
                    reasons.push(format!(
                        "non_decreasing_loss: second-half validation mean {second:.4} >= {:.2} x first-half mean {first:.4}",
                        self.config.plateau_ratio
                    ));
                }
            }
        }

        let expected_perplexity = final_loss.exp();
        if expected_perplexity.is_finite() && expected_perplexity > 0.0 {
            let relative = (expected_perplexity - record.perplexity).abs() / expected_perplexity;
            if relative > self.config.perplexity_tolerance {
                flags.perplexity_mismatch = true;
                reasons.push(format!(
                    "perplexity_mismatch: logged perplexity {:.3} differs from exp(loss) {expected_perplexity:.3} by {:.1}%",
                    record.perplexity,
                    relative * 100.0
                ));
            }
        }

        if let Some(entries) = inputs.grad_norms {
            let norms = positive_grad_norms(entries);
            if norms.len() >= 2 {
                let max = norms.iter().copied().fold(f64::MIN, f64::max);
                let min = norms.iter().copied().fold(f64::MAX, f64::min);
                let ratio = max / min;
                if ratio > self.config.gradient_ratio_limit {
                    flags.unstable_gradients = true;
                    reasons.push(format!(
                        "unstable_gradients: gradient norm range {min:.3e}..{max:.3e} spans ratio {ratio:.1} > {:.0}",
                        self.config.gradient_ratio_limit
                    ));
                }
            }
        }

        debug!(
            config_id = %record.config_id,
            raised = flags.count(),
            "evaluated anomaly flags"
        );

        AnomalyReport {
            flags,
            validation_stability,
            reasons,
        }
    }

    /// External gap, then the gap derived from both loss series, then the
    /// record's logged gap.
    fn effective_gap(&self, inputs: &AnomalyInputs<'_>) -> Option<f64> {
        inputs
            .computed_gap
            .filter(|gap| gap.is_finite())
            .or_else(|| match (inputs.train, inputs.validation) {
                (Some(train), Some(validation)) => {
                    computed_generalization_gap(train, validation, self.gap_window)
                }
                _ => None,
            })
            .or(inputs.record.generalization_gap)
    }

    fn recent_window_means(&self, values: &[f64]) -> Option<(f64, f64)> {
        let window = self.config.increasing_window;
        let paired = window.checked_mul(2)?;
        let len = values.len();
        if len < self.config.increasing_min_points || len < paired {
            return None;
        }
        let recent = mean(&values[len - window..])?;
        let previous = mean(&values[len - paired..len - window])?;
        Some((recent, previous))
    }

    fn half_means(&self, values: &[f64]) -> Option<(f64, f64)> {
        if values.len() < self.config.plateau_min_points {
            return None;
        }
        let (first, second) = values.split_at(values.len() / 2);
        Some((mean(first)?, mean(second)?))
    }
}

/// Detects anomalies with the default thresholds.
pub fn detect_anomalies(inputs: &AnomalyInputs<'_>) -> AnomalyReport {
    AnomalyDetector::default().detect(inputs)
}

#[cfg(test)]
mod tests {
    use super::{AnomalyDetector, AnomalyFlags, AnomalyInputs, detect_anomalies};
    use lmdiag_core::{
        AnomalyConfig, ConfigRecord, DiagnosticsConfig, GradNormEntry, MetricSeries,
        TimelineConfig,
    };
    use lmdiag_timeline::Stability;

    fn record(final_loss: f64) -> ConfigRecord {
        ConfigRecord {
            config_id: "e16_h64_lr0.01".to_string(),
            emb_dim: 16,
            hidden_size: 64,
            learning_rate: 0.01,
            final_train_loss: final_loss,
            perplexity: final_loss.exp(),
            total_params: 10_000,
            ..ConfigRecord::default()
        }
    }

    fn series(values: &[f64]) -> MetricSeries {
        MetricSeries::from_values(values).expect("test values are finite")
    }

    #[test]
    fn healthy_record_without_timeline_raises_nothing() {
        let rec = record(1.2);
        let report = detect_anomalies(&AnomalyInputs::new(&rec));
        assert_eq!(report.flags, AnomalyFlags::default());
        assert!(report.reasons.is_empty());
        assert_eq!(report.validation_stability, None);
    }

    #[test]
    fn loss_at_uniform_level_is_above_random() {
        let mut rec = record(2.0);
        rec.expected_uniform_loss = Some(2.0);
        let report = detect_anomalies(&AnomalyInputs::new(&rec));
        assert!(report.flags.loss_above_random);
        assert_eq!(report.reasons.len(), 1);
        assert!(report.reasons[0].starts_with("loss_above_random"));

        rec.expected_uniform_loss = Some(10.0);
        assert!(!detect_anomalies(&AnomalyInputs::new(&rec)).flags.loss_above_random);
    }

    #[test]
    fn gap_prefers_external_then_series_then_record() {
        let mut rec = record(1.0);
        rec.generalization_gap = Some(0.5);
        assert!(detect_anomalies(&AnomalyInputs::new(&rec)).flags.large_gen_gap);

        let external = AnomalyInputs::new(&rec).with_computed_gap(0.1);
        assert!(!detect_anomalies(&external).flags.large_gen_gap);

        let train = series(&[2.0, 1.5, 1.0, 1.0]);
        let val = series(&[2.0, 1.6, 1.1]);
        let from_series = AnomalyInputs::new(&rec).with_losses(&train, &val);
        assert!(!detect_anomalies(&from_series).flags.large_gen_gap);

        rec.generalization_gap = None;
        assert!(!detect_anomalies(&AnomalyInputs::new(&rec)).flags.large_gen_gap);
    }

    #[test]
    fn rising_validation_tail_is_loss_increasing() {
        let rec = record(1.0);
        let val = series(&[2.0, 1.8, 1.6, 1.5, 1.5, 1.6, 1.8, 2.0, 2.2, 2.4]);
        let report = detect_anomalies(&AnomalyInputs::new(&rec).with_validation(&val));
        assert!(report.flags.loss_increasing);
        assert!(report.validation_stability.is_some());
    }

    #[test]
    fn short_validation_series_never_flags_trends() {
        let rec = record(1.0);
        let val = series(&[1.0, 2.0, 3.0]);
        let report = detect_anomalies(&AnomalyInputs::new(&rec).with_validation(&val));
        assert!(!report.flags.loss_increasing);
        assert!(!report.flags.non_decreasing_loss);
        assert_eq!(
            report.validation_stability,
            Some(Stability::InsufficientData { points: 3 })
        );
    }

    #[test]
    fn flat_long_validation_is_non_decreasing() {
        let rec = record(1.0);
        let flat: Vec<f64> = (0..24).map(|i| 2.0 + if i % 2 == 0 { 0.01 } else { -0.01 }).collect();
        let report = detect_anomalies(&AnomalyInputs::new(&rec).with_validation(&series(&flat)));
        assert!(report.flags.non_decreasing_loss);
        assert!(!report.flags.loss_increasing);

        let falling: Vec<f64> = (0..24).map(|i| 3.0 - 0.1 * i as f64).collect();
        let report =
            detect_anomalies(&AnomalyInputs::new(&rec).with_validation(&series(&falling)));
        assert!(!report.flags.non_decreasing_loss);
    }

    #[test]
    fn perplexity_far_from_exp_loss_is_a_mismatch() {
        let mut rec = record(2.0);
        assert!(!detect_anomalies(&AnomalyInputs::new(&rec)).flags.perplexity_mismatch);
        rec.perplexity = 2.0_f64.exp() * 1.2;
        assert!(detect_anomalies(&AnomalyInputs::new(&rec)).flags.perplexity_mismatch);
    }

    #[test]
    fn overflowing_exp_loss_is_not_a_mismatch() {
        let mut rec = record(1.0);
        rec.final_train_loss = 1.0e4;
        rec.perplexity = 12.0;
        assert!(!detect_anomalies(&AnomalyInputs::new(&rec)).flags.perplexity_mismatch);
    }

    #[test]
    fn gradient_ratio_uses_only_positive_entries() {
        let rec = record(1.0);
        let entries = [
            GradNormEntry::Scalar(0.001),
            GradNormEntry::Structured { total: Some(5.0) },
            GradNormEntry::Scalar(0.0),
            GradNormEntry::Unparseable,
        ];
        let report = detect_anomalies(&AnomalyInputs::new(&rec).with_grad_norms(&entries));
        assert!(report.flags.unstable_gradients);

        let single = [GradNormEntry::Scalar(1.0e-9), GradNormEntry::Unparseable];
        let report = detect_anomalies(&AnomalyInputs::new(&rec).with_grad_norms(&single));
        assert!(!report.flags.unstable_gradients);
    }

    #[test]
    fn raised_names_follow_flag_order() {
        let flags = AnomalyFlags {
            perplexity_mismatch: true,
            loss_above_random: true,
            ..AnomalyFlags::default()
        };
        assert!(flags.any());
        assert_eq!(flags.count(), 2);
        assert_eq!(flags.raised(), vec!["loss_above_random", "perplexity_mismatch"]);
    }

    #[test]
    fn custom_thresholds_are_honored() {
        let detector = AnomalyDetector::new(
            AnomalyConfig {
                gen_gap_threshold: 0.05,
                ..AnomalyConfig::default()
            },
            TimelineConfig::default(),
        )
        .expect("config is valid");
        let mut rec = record(1.0);
        rec.generalization_gap = Some(0.1);
        assert!(detector.detect(&AnomalyInputs::new(&rec)).flags.large_gen_gap);
        assert!(AnomalyDetector::from_config(&DiagnosticsConfig::default()).is_ok());
    }

    #[test]
    fn invalid_thresholds_are_rejected() {
        let err = AnomalyDetector::new(
            AnomalyConfig {
                increasing_window: 0,
                ..AnomalyConfig::default()
            },
            TimelineConfig::default(),
        )
        .expect_err("zero window should fail");
        assert!(err.to_string().contains("increasing_window"));

        let err = AnomalyDetector::new(
            AnomalyConfig {
                increasing_window: usize::MAX / 2 + 1,
                increasing_min_points: usize::MAX,
                ..AnomalyConfig::default()
            },
            TimelineConfig::default(),
        )
        .expect_err("window that cannot be doubled should fail");
        assert!(err.to_string().contains("too large"));
    }
}
