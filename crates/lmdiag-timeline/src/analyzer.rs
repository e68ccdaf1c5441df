// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use lmdiag_core::stats::{mean, population_variance, std_dev};
use lmdiag_core::{DiagError, MetricSeries, TimelineConfig};
use tracing::debug;

/// Direction of a metric between the first and last quartile of a run.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trend {
    Decreasing,
    Flat,
    Increasing,
}

impl Trend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Decreasing => "decreasing",
            Self::Flat => "flat",
            Self::Increasing => "increasing",
        }
    }
}

/// Stability summary of one metric timeline.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct StabilityInfo {
    /// Population variance of all values.
    pub variance: f64,
    pub trend: Trend,
    /// Steps whose value jumped above the trailing window, in step order.
    pub spike_steps: Vec<u64>,
    /// First step below the convergence fraction of the initial value.
    pub convergence_step: Option<u64>,
}

/// Analyzer outcome. Short series are unknown, never flat.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "status", rename_all = "snake_case"))]
#[derive(Clone, Debug, PartialEq)]
pub enum Stability {
    InsufficientData { points: usize },
    Measured(StabilityInfo),
}

impl Stability {
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Measured(_))
    }

    pub fn info(&self) -> Option<&StabilityInfo> {
        match self {
            Self::Measured(info) => Some(info),
            Self::InsufficientData { .. } => None,
        }
    }

    pub fn trend(&self) -> Option<Trend> {
        self.info().map(|info| info.trend)
    }
}

/// Trend, variance, spike and convergence analysis over logged metrics.
#[derive(Clone, Debug, Default)]
pub struct TimelineAnalyzer {
    config: TimelineConfig,
}

impl TimelineAnalyzer {
    pub fn new(config: TimelineConfig) -> Result<Self, DiagError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    pub fn analyze(&self, series: &MetricSeries) -> Stability {
        let len = series.len();
        if len < self.config.min_points {
            return Stability::InsufficientData { points: len };
        }

        let values = series.values();
        let variance = population_variance(&values).unwrap_or(0.0);
        let trend = quartile_trend(&values, self.config.trend_tolerance);
        let window = self.config.spike_window(len);
        let points = series.points();
        let spike_steps: Vec<u64> = spike_indices(&values, window, self.config.spike_sigma)
            .into_iter()
            .map(|idx| points[idx].step)
            .collect();
        let convergence_step = convergence_index(&values, self.config.convergence_fraction)
            .map(|idx| points[idx].step);

        debug!(
            points = len,
            variance,
            trend = trend.as_str(),
            spikes = spike_steps.len(),
            converged = convergence_step.is_some(),
            "analyzed metric timeline"
        );

        Stability::Measured(StabilityInfo {
            variance,
            trend,
            spike_steps,
            convergence_step,
        })
    }
}

/// Analyzes with the default thresholds.
pub fn analyze(series: &MetricSeries) -> Stability {
    TimelineAnalyzer::default().analyze(series)
}

/// Compares the last quartile mean against the first. The remainder of
/// `len / 4` is absorbed into the first quartile.
fn quartile_trend(values: &[f64], tolerance: f64) -> Trend {
    let len = values.len();
    let quarter = len / 4;
    if quarter == 0 {
        return Trend::Flat;
    }
    let head_len = quarter + len % 4;
    let (Some(first), Some(last)) = (mean(&values[..head_len]), mean(&values[len - quarter..]))
    else {
        return Trend::Flat;
    };

    if last < (1.0 - tolerance) * first {
        Trend::Decreasing
    } else if last > (1.0 + tolerance) * first {
        Trend::Increasing
    } else {
        Trend::Flat
    }
}

/// Indices whose value exceeds `mean + sigma * std` of the `window`
/// values before them.
fn spike_indices(values: &[f64], window: usize, sigma: f64) -> Vec<usize> {
    if window == 0 {
        return Vec::new();
    }
    (window..values.len())
        .filter(|&idx| {
            let trailing = &values[idx - window..idx];
            match (mean(trailing), std_dev(trailing)) {
                (Some(mu), Some(sd)) => values[idx] > mu + sigma * sd,
                _ => false,
            }
        })
        .collect()
}

fn convergence_index(values: &[f64], fraction: f64) -> Option<usize> {
    let first = *values.first()?;
    // Only positive, loss-like metrics have a meaningful halving point.
    if first <= 0.0 {
        return None;
    }
    let target = fraction * first;
    values.iter().position(|&v| v < target)
}
