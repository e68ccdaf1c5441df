// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Named thresholds for every lmdiag component.

use crate::DiagError;

pub const DEFAULT_POWER_ITERATIONS: usize = 50;
pub const DEFAULT_PROJECTION_LOWER: f64 = 0.05;
pub const DEFAULT_PROJECTION_UPPER: f64 = 0.95;
pub const DEFAULT_EIGENVALUE_FLOOR: f64 = 1.0e-12;

pub const DEFAULT_MIN_TIMELINE_POINTS: usize = 5;
pub const DEFAULT_TREND_TOLERANCE: f64 = 0.05;
pub const DEFAULT_SPIKE_SIGMA: f64 = 2.5;
pub const DEFAULT_MIN_SPIKE_WINDOW: usize = 5;
pub const DEFAULT_SPIKE_WINDOW_DIVISOR: usize = 10;
pub const DEFAULT_CONVERGENCE_FRACTION: f64 = 0.5;
pub const DEFAULT_GAP_SMOOTHING_WINDOW: usize = 10;

pub const DEFAULT_RANDOM_LOSS_RATIO: f64 = 0.98;
pub const DEFAULT_GEN_GAP_THRESHOLD: f64 = 0.3;
pub const DEFAULT_INCREASING_MIN_POINTS: usize = 10;
pub const DEFAULT_INCREASING_WINDOW: usize = 5;
pub const DEFAULT_INCREASING_RATIO: f64 = 1.02;
pub const DEFAULT_PLATEAU_MIN_POINTS: usize = 20;
pub const DEFAULT_PLATEAU_RATIO: f64 = 0.99;
pub const DEFAULT_PERPLEXITY_TOLERANCE: f64 = 0.05;
pub const DEFAULT_GRADIENT_RATIO_LIMIT: f64 = 1000.0;
pub const DEFAULT_LOW_SCORE_THRESHOLD: f64 = 0.2;

pub const DEFAULT_COST_BREAKPOINTS: [f64; 4] = [0.10, 0.25, 0.50, 0.75];

fn ensure_finite_positive(name: &str, value: f64) -> Result<(), DiagError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(DiagError::invalid_input(format!(
            "{name} must be finite and > 0; got {value}"
        )));
    }
    Ok(())
}

/// Settings for the embedding projector.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectionConfig {
    pub power_iterations: usize,
    pub lower_bound: f64,
    pub upper_bound: f64,
    /// Eigenvalues at or below `eigenvalue_floor` times the larger of the
    /// covariance trace and the mean squared row norm count as zero.
    pub eigenvalue_floor: f64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            power_iterations: DEFAULT_POWER_ITERATIONS,
            lower_bound: DEFAULT_PROJECTION_LOWER,
            upper_bound: DEFAULT_PROJECTION_UPPER,
            eigenvalue_floor: DEFAULT_EIGENVALUE_FLOOR,
        }
    }
}

impl ProjectionConfig {
    pub fn validate(&self) -> Result<(), DiagError> {
        if self.power_iterations == 0 {
            return Err(DiagError::invalid_input(
                "ProjectionConfig.power_iterations must be >= 1; got 0",
            ));
        }
        if !self.lower_bound.is_finite()
            || !self.upper_bound.is_finite()
            || self.lower_bound >= self.upper_bound
        {
            return Err(DiagError::invalid_input(format!(
                "ProjectionConfig bounds must be finite with lower < upper; got [{}, {}]",
                self.lower_bound, self.upper_bound
            )));
        }
        if !self.eigenvalue_floor.is_finite() || self.eigenvalue_floor < 0.0 {
            return Err(DiagError::invalid_input(format!(
                "ProjectionConfig.eigenvalue_floor must be finite and >= 0; got {}",
                self.eigenvalue_floor
            )));
        }
        Ok(())
    }

    pub fn midpoint(&self) -> f64 {
        0.5 * (self.lower_bound + self.upper_bound)
    }
}

/// Settings for timeline stability analysis.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
pub struct TimelineConfig {
    pub min_points: usize,
    /// Relative band around the first-quartile mean that counts as flat.
    pub trend_tolerance: f64,
    pub spike_sigma: f64,
    pub min_spike_window: usize,
    pub spike_window_divisor: usize,
    pub convergence_fraction: f64,
    pub gap_smoothing_window: usize,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            min_points: DEFAULT_MIN_TIMELINE_POINTS,
            trend_tolerance: DEFAULT_TREND_TOLERANCE,
            spike_sigma: DEFAULT_SPIKE_SIGMA,
            min_spike_window: DEFAULT_MIN_SPIKE_WINDOW,
            spike_window_divisor: DEFAULT_SPIKE_WINDOW_DIVISOR,
            convergence_fraction: DEFAULT_CONVERGENCE_FRACTION,
            gap_smoothing_window: DEFAULT_GAP_SMOOTHING_WINDOW,
        }
    }
}

impl TimelineConfig {
    pub fn validate(&self) -> Result<(), DiagError> {
        // Quartile trend needs at least one point per quartile.
        if self.min_points < 4 {
            return Err(DiagError::invalid_input(format!(
                "TimelineConfig.min_points must be >= 4; got {}",
                self.min_points
            )));
        }
        if !self.trend_tolerance.is_finite() || !(0.0..1.0).contains(&self.trend_tolerance) {
            return Err(DiagError::invalid_input(format!(
                "TimelineConfig.trend_tolerance must be within [0, 1); got {}",
                self.trend_tolerance
            )));
        }
        ensure_finite_positive("TimelineConfig.spike_sigma", self.spike_sigma)?;
        for (name, value) in [
            ("min_spike_window", self.min_spike_window),
            ("spike_window_divisor", self.spike_window_divisor),
            ("gap_smoothing_window", self.gap_smoothing_window),
        ] {
            if value == 0 {
                return Err(DiagError::invalid_input(format!(
                    "TimelineConfig.{name} must be >= 1; got 0"
                )));
            }
        }
        if !self.convergence_fraction.is_finite()
            || self.convergence_fraction <= 0.0
            || self.convergence_fraction >= 1.0
        {
            return Err(DiagError::invalid_input(format!(
                "TimelineConfig.convergence_fraction must be within (0, 1); got {}",
                self.convergence_fraction
            )));
        }
        Ok(())
    }

    /// Spike look-back window for a series of `len` points.
    pub fn spike_window(&self, len: usize) -> usize {
        self.min_spike_window
            .max(len / self.spike_window_divisor.max(1))
    }
}

/// Thresholds for anomaly flags and configuration selection.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
pub struct AnomalyConfig {
    pub random_loss_ratio: f64,
    pub gen_gap_threshold: f64,
    pub increasing_min_points: usize,
    pub increasing_window: usize,
    pub increasing_ratio: f64,
    pub plateau_min_points: usize,
    pub plateau_ratio: f64,
    pub perplexity_tolerance: f64,
    pub gradient_ratio_limit: f64,
    pub low_score_threshold: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            random_loss_ratio: DEFAULT_RANDOM_LOSS_RATIO,
            gen_gap_threshold: DEFAULT_GEN_GAP_THRESHOLD,
            increasing_min_points: DEFAULT_INCREASING_MIN_POINTS,
            increasing_window: DEFAULT_INCREASING_WINDOW,
            increasing_ratio: DEFAULT_INCREASING_RATIO,
            plateau_min_points: DEFAULT_PLATEAU_MIN_POINTS,
            plateau_ratio: DEFAULT_PLATEAU_RATIO,
            perplexity_tolerance: DEFAULT_PERPLEXITY_TOLERANCE,
            gradient_ratio_limit: DEFAULT_GRADIENT_RATIO_LIMIT,
            low_score_threshold: DEFAULT_LOW_SCORE_THRESHOLD,
        }
    }
}

impl AnomalyConfig {
    pub fn validate(&self) -> Result<(), DiagError> {
        for (name, value) in [
            ("random_loss_ratio", self.random_loss_ratio),
            ("increasing_ratio", self.increasing_ratio),
            ("plateau_ratio", self.plateau_ratio),
            ("perplexity_tolerance", self.perplexity_tolerance),
            ("gradient_ratio_limit", self.gradient_ratio_limit),
        ] {
            ensure_finite_positive(&format!("AnomalyConfig.{name}"), value)?;
        }
        for (name, value) in [
            ("gen_gap_threshold", self.gen_gap_threshold),
            ("low_score_threshold", self.low_score_threshold),
        ] {
            if !value.is_finite() {
                return Err(DiagError::invalid_input(format!(
                    "AnomalyConfig.{name} must be finite; got {value}"
                )));
            }
        }
        if self.increasing_window == 0 {
            return Err(DiagError::invalid_input(
                "AnomalyConfig.increasing_window must be >= 1; got 0",
            ));
        }
        let Some(paired_window) = self.increasing_window.checked_mul(2) else {
            return Err(DiagError::invalid_input(format!(
                "AnomalyConfig.increasing_window is too large; got {}",
                self.increasing_window
            )));
        };
        if self.increasing_min_points < paired_window {
            return Err(DiagError::invalid_input(format!(
                "AnomalyConfig.increasing_min_points must be >= 2 * increasing_window ({paired_window}); got {}",
                self.increasing_min_points
            )));
        }
        if self.plateau_min_points < 2 {
            return Err(DiagError::invalid_input(format!(
                "AnomalyConfig.plateau_min_points must be >= 2; got {}",
                self.plateau_min_points
            )));
        }
        Ok(())
    }
}

/// Breakpoints splitting normalized compute cost into five classes.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
pub struct CostConfig {
    pub breakpoints: [f64; 4],
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            breakpoints: DEFAULT_COST_BREAKPOINTS,
        }
    }
}

impl CostConfig {
    pub fn validate(&self) -> Result<(), DiagError> {
        let mut previous = 0.0;
        for (idx, &value) in self.breakpoints.iter().enumerate() {
            if !value.is_finite() || value <= previous || value > 1.0 {
                return Err(DiagError::invalid_input(format!(
                    "CostConfig.breakpoints must be strictly increasing within (0, 1]; index {idx} has {value}"
                )));
            }
            previous = value;
        }
        Ok(())
    }
}

/// The full threshold block, one section per component.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiagnosticsConfig {
    pub projection: ProjectionConfig,
    pub timeline: TimelineConfig,
    pub anomaly: AnomalyConfig,
    pub cost: CostConfig,
}

impl DiagnosticsConfig {
    pub fn validate(&self) -> Result<(), DiagError> {
        self.projection.validate()?;
        self.timeline.validate()?;
        self.anomaly.validate()?;
        self.cost.validate()
    }
}
