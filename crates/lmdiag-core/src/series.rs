// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::DiagError;

/// One logged observation of a training metric.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MetricPoint {
    pub step: u64,
    pub value: f64,
}

impl MetricPoint {
    pub const fn new(step: u64, value: f64) -> Self {
        Self { step, value }
    }
}

/// A logged scalar timeline (training loss, validation loss, gradient norm,
/// dead-neuron fraction) with strictly increasing steps.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "Vec<MetricPoint>", into = "Vec<MetricPoint>")
)]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetricSeries {
    points: Vec<MetricPoint>,
}

impl MetricSeries {
    pub fn new(points: Vec<MetricPoint>) -> Result<Self, DiagError> {
        for (idx, pair) in points.windows(2).enumerate() {
            if pair[1].step <= pair[0].step {
                return Err(DiagError::invalid_input(format!(
                    "steps must be strictly increasing: index {} has step {} after {}",
                    idx + 1,
                    pair[1].step,
                    pair[0].step
                )));
            }
        }
        if let Some((idx, point)) = points
            .iter()
            .enumerate()
            .find(|(_, point)| !point.value.is_finite())
        {
            return Err(DiagError::degenerate_input(format!(
                "metric value at index {idx} (step {}) is non-finite: {}",
                point.step, point.value
            )));
        }
        Ok(Self { points })
    }

    /// Builds a series from `(step, value)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (u64, f64)>) -> Result<Self, DiagError> {
        Self::new(
            pairs
                .into_iter()
                .map(|(step, value)| MetricPoint::new(step, value))
                .collect(),
        )
    }

    /// Builds a series with implicit steps `0..n`.
    pub fn from_values(values: &[f64]) -> Result<Self, DiagError> {
        Self::from_pairs(values.iter().copied().enumerate().map(|(i, v)| (i as u64, v)))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[MetricPoint] {
        &self.points
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|point| point.value).collect()
    }

    pub fn steps(&self) -> Vec<u64> {
        self.points.iter().map(|point| point.step).collect()
    }

    pub fn first(&self) -> Option<MetricPoint> {
        self.points.first().copied()
    }

    pub fn last(&self) -> Option<MetricPoint> {
        self.points.last().copied()
    }
}

impl TryFrom<Vec<MetricPoint>> for MetricSeries {
    type Error = DiagError;

    fn try_from(points: Vec<MetricPoint>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<MetricSeries> for Vec<MetricPoint> {
    fn from(series: MetricSeries) -> Self {
        series.points
    }
}
