// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use lmdiag_core::stats::l2_norm;
use lmdiag_core::{DiagError, GradNormEntry, MetricSeries};
use tracing::debug;

/// Parameter groups of the MLP language model, in display order.
pub const PARAM_GROUPS: [&str; 5] = ["C", "W1", "b1", "W2", "b2"];

const TOTAL_GROUP: &str = "total";
const STEP_KEY_PREFIX: &str = "step_";

/// Activation statistics attached to a snapshot. Older logs spell the
/// saturation field `saturated_fraction`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ActivationStats {
    pub saturation_fraction: Option<f64>,
    pub saturated_fraction: Option<f64>,
    pub dead_fraction: Option<f64>,
}

impl ActivationStats {
    pub fn saturation(&self) -> Option<f64> {
        self.saturation_fraction.or(self.saturated_fraction)
    }
}

/// One periodic training snapshot.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimelineSnapshot {
    pub step: Option<u64>,
    pub grad_norms: BTreeMap<String, GradNormEntry>,
    pub activation_stats: Option<ActivationStats>,
    /// Overrides `activation_stats.dead_fraction` when present.
    pub dead_neurons: Option<f64>,
}

impl TimelineSnapshot {
    /// Norm of one parameter group; missing or unusable entries read as 0.
    pub fn group_norm(&self, group: &str) -> f64 {
        self.grad_norms
            .get(group)
            .and_then(GradNormEntry::as_scalar)
            .unwrap_or(0.0)
    }

    /// The logged `total` entry, else the L2 combination of the positive
    /// group norms.
    pub fn total_grad_norm(&self) -> GradNormEntry {
        if let Some(total) = self.grad_norms.get(TOTAL_GROUP) {
            return *total;
        }
        let norms: Vec<f64> = self
            .grad_norms
            .values()
            .filter_map(GradNormEntry::as_scalar)
            .collect();
        let combined = l2_norm(&norms);
        if combined > 0.0 && combined.is_finite() {
            GradNormEntry::Scalar(combined)
        } else {
            GradNormEntry::Unparseable
        }
    }

    pub fn saturation(&self) -> f64 {
        self.activation_stats
            .and_then(|stats| stats.saturation())
            .filter(|value| value.is_finite())
            .unwrap_or(0.0)
    }

    pub fn dead_fraction(&self) -> f64 {
        self.dead_neurons
            .or_else(|| self.activation_stats.and_then(|stats| stats.dead_fraction))
            .filter(|value| value.is_finite())
            .unwrap_or(0.0)
    }
}

/// Parses snapshot keys of the form `step_<n>`; bare integers are accepted.
pub fn parse_step_key(key: &str) -> Option<u64> {
    key.strip_prefix(STEP_KEY_PREFIX)
        .unwrap_or(key)
        .trim()
        .parse()
        .ok()
}

/// Compact step label: `1500` renders as `2k`, small steps verbatim.
pub fn step_label(step: u64) -> String {
    if step >= 1000 {
        format!("{:.0}k", step as f64 / 1000.0)
    } else {
        step.to_string()
    }
}

/// Gradient norm relative to the largest group norm in the timeline.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum GradientHealth {
    Calm,
    Elevated,
    High,
    Critical,
}

impl GradientHealth {
    /// `None` when the timeline has no positive norm to compare against.
    pub fn classify(norm: f64, max_norm: f64) -> Option<Self> {
        if !(max_norm.is_finite() && max_norm > 0.0) {
            return None;
        }
        let ratio = (norm / max_norm).min(1.0);
        Some(if ratio < 0.25 {
            Self::Calm
        } else if ratio < 0.5 {
            Self::Elevated
        } else if ratio < 0.75 {
            Self::High
        } else {
            Self::Critical
        })
    }
}

/// Share of activations pinned at the nonlinearity's extremes.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SaturationLevel {
    Healthy,
    Mild,
    Moderate,
    Severe,
}

impl SaturationLevel {
    pub fn classify(fraction: f64) -> Self {
        if fraction < 0.1 {
            Self::Healthy
        } else if fraction < 0.3 {
            Self::Mild
        } else if fraction < 0.5 {
            Self::Moderate
        } else {
            Self::Severe
        }
    }
}

/// Health summary of one parameter group at one snapshot.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct GroupHealth {
    pub group: String,
    pub norm: f64,
    pub health: Option<GradientHealth>,
}

/// Per-snapshot health row.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotHealth {
    pub step: u64,
    pub groups: Vec<GroupHealth>,
    pub saturation: f64,
    pub saturation_level: SaturationLevel,
    pub dead_fraction: f64,
}

/// Snapshots ordered by step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SnapshotTimeline {
    snapshots: Vec<(u64, TimelineSnapshot)>,
}

impl SnapshotTimeline {
    /// Builds a timeline from snapshots that carry their own step.
    pub fn new(snapshots: Vec<TimelineSnapshot>) -> Result<Self, DiagError> {
        let mut resolved = Vec::with_capacity(snapshots.len());
        for (idx, snapshot) in snapshots.into_iter().enumerate() {
            let step = snapshot.step.ok_or_else(|| {
                DiagError::invalid_input(format!("snapshot at index {idx} has no step"))
            })?;
            resolved.push((step, snapshot));
        }
        Self::from_resolved(resolved)
    }

    /// Builds a timeline from a keyed snapshot map. An explicit `step`
    /// wins over the `step_<n>` key.
    pub fn from_keyed<K: AsRef<str>>(
        snapshots: impl IntoIterator<Item = (K, TimelineSnapshot)>,
    ) -> Result<Self, DiagError> {
        let mut resolved = Vec::new();
        for (key, snapshot) in snapshots {
            let key = key.as_ref();
            let step = snapshot
                .step
                .or_else(|| parse_step_key(key))
                .ok_or_else(|| {
                    DiagError::invalid_input(format!(
                        "snapshot key {key:?} has no step and is not of the form step_<n>"
                    ))
                })?;
            resolved.push((step, snapshot));
        }
        Self::from_resolved(resolved)
    }

    fn from_resolved(mut snapshots: Vec<(u64, TimelineSnapshot)>) -> Result<Self, DiagError> {
        snapshots.sort_by_key(|(step, _)| *step);
        if let Some(pair) = snapshots.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(DiagError::invalid_input(format!(
                "duplicate snapshot step {}",
                pair[0].0
            )));
        }
        debug!(snapshots = snapshots.len(), "built snapshot timeline");
        Ok(Self { snapshots })
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn steps(&self) -> Vec<u64> {
        self.snapshots.iter().map(|(step, _)| *step).collect()
    }

    pub fn snapshots(&self) -> impl Iterator<Item = (u64, &TimelineSnapshot)> {
        self.snapshots.iter().map(|(step, snapshot)| (*step, snapshot))
    }

    /// Norm of one parameter group across the timeline.
    pub fn group_norm_series(&self, group: &str) -> Result<MetricSeries, DiagError> {
        MetricSeries::from_pairs(
            self.snapshots
                .iter()
                .map(|(step, snapshot)| (*step, snapshot.group_norm(group))),
        )
    }

    /// One total gradient-norm entry per snapshot, ready for anomaly checks.
    pub fn total_grad_norms(&self) -> Vec<GradNormEntry> {
        self.snapshots
            .iter()
            .map(|(_, snapshot)| snapshot.total_grad_norm())
            .collect()
    }

    /// Dead-neuron fraction across the timeline.
    pub fn dead_fraction_series(&self) -> Result<MetricSeries, DiagError> {
        MetricSeries::from_pairs(
            self.snapshots
                .iter()
                .map(|(step, snapshot)| (*step, snapshot.dead_fraction())),
        )
    }

    /// Largest parameter-group norm over all snapshots, 0 when none is
    /// positive.
    pub fn max_group_norm(&self) -> f64 {
        self.snapshots
            .iter()
            .flat_map(|(_, snapshot)| PARAM_GROUPS.iter().map(|group| snapshot.group_norm(group)))
            .fold(0.0, f64::max)
    }

    pub fn has_gradient_data(&self) -> bool {
        self.max_group_norm() > 0.0
    }

    pub fn has_saturation_data(&self) -> bool {
        self.snapshots
            .iter()
            .any(|(_, snapshot)| snapshot.saturation() > 0.0 || snapshot.dead_fraction() > 0.0)
    }

    /// Classifies every parameter group and the activation saturation of
    /// each snapshot.
    pub fn health(&self) -> Vec<SnapshotHealth> {
        let max_norm = self.max_group_norm();
        self.snapshots
            .iter()
            .map(|(step, snapshot)| {
                let groups = PARAM_GROUPS
                    .iter()
                    .map(|group| {
                        let norm = snapshot.group_norm(group);
                        GroupHealth {
                            group: (*group).to_string(),
                            norm,
                            health: GradientHealth::classify(norm, max_norm),
                        }
                    })
                    .collect();
                let saturation = snapshot.saturation();
                SnapshotHealth {
                    step: *step,
                    groups,
                    saturation,
                    saturation_level: SaturationLevel::classify(saturation),
                    dead_fraction: snapshot.dead_fraction(),
                }
            })
            .collect()
    }
}
