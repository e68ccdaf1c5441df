// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use lmdiag_core::stats::{dot, l2_norm, normalize_axis};
use lmdiag_core::{DiagError, EmbeddingMatrix, ProjectionConfig, TokenEmbeddings};
use tracing::debug;

// Irrational increments keep the seeds off every coordinate axis and away from
// the symmetric directions small embedding tables tend to produce.
const PRIMARY_SEED_STEP: f64 = 0.618_033_988_749_895;
const SECONDARY_SEED_STEP: f64 = 0.414_213_562_373_095;

/// One projected token position.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

/// Token positions with each axis min-max scaled into the configured bounds.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Projection2D {
    points: Vec<Point2>,
}

impl Projection2D {
    fn from_axes(xs: &[f64], ys: &[f64], lo: f64, hi: f64) -> Self {
        let xs = normalize_axis(xs, lo, hi);
        let ys = normalize_axis(ys, lo, hi);
        Self {
            points: xs
                .into_iter()
                .zip(ys)
                .map(|(x, y)| Point2 { x, y })
                .collect(),
        }
    }

    pub fn points(&self) -> &[Point2] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn into_points(self) -> Vec<Point2> {
        self.points
    }

    /// Re-applies the per-axis min-max scaling to these points.
    pub fn renormalized(&self, lo: f64, hi: f64) -> Self {
        let xs: Vec<f64> = self.points.iter().map(|p| p.x).collect();
        let ys: Vec<f64> = self.points.iter().map(|p| p.y).collect();
        Self::from_axes(&xs, &ys, lo, hi)
    }
}

/// Principal axes found for one projection.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectionAxes {
    pub e1: Vec<f64>,
    pub e2: Vec<f64>,
    pub lambda1: f64,
    pub lambda2: f64,
    /// Trace of the covariance matrix (total variance).
    pub total_variance: f64,
}

impl ProjectionAxes {
    /// Share of total variance carried by each axis, `(0, 0)` when there is
    /// no variance at all.
    pub fn explained_variance_ratio(&self) -> (f64, f64) {
        if self.total_variance <= 0.0 {
            return (0.0, 0.0);
        }
        (
            (self.lambda1 / self.total_variance).max(0.0),
            (self.lambda2 / self.total_variance).max(0.0),
        )
    }
}

/// Two-axis principal-component projector for embedding tables.
///
/// Axes come from power iteration on the covariance matrix, with the first
/// axis deflated out by its Rayleigh quotient before the second is found.
#[derive(Clone, Debug, Default)]
pub struct EmbeddingProjector {
    config: ProjectionConfig,
}

impl EmbeddingProjector {
    pub fn new(config: ProjectionConfig) -> Result<Self, DiagError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    /// Projects every row to a 2D point. An empty matrix yields an empty
    /// projection.
    pub fn project(&self, matrix: &EmbeddingMatrix) -> Result<Projection2D, DiagError> {
        self.project_with_axes(matrix).map(|(projection, _)| projection)
    }

    /// Like [`EmbeddingProjector::project`], also returning the axes used
    /// (`None` for an empty matrix).
    pub fn project_with_axes(
        &self,
        matrix: &EmbeddingMatrix,
    ) -> Result<(Projection2D, Option<ProjectionAxes>), DiagError> {
        if matrix.is_empty() {
            return Ok((Projection2D::default(), None));
        }
        matrix.ensure_finite()?;

        let n = matrix.n();
        let d = matrix.d();
        let centered = center(matrix);
        let mut cov = covariance(&centered, n, d);
        let total_variance: f64 = (0..d).map(|i| cov[i * d + i]).sum();
        // Scale the floor by the raw magnitude too, so centering round-off on
        // identical rows never reads as a real axis.
        let mean_sq_norm =
            matrix.as_flat().iter().map(|v| v * v).sum::<f64>() / n as f64;
        let floor = self.config.eigenvalue_floor * total_variance.max(mean_sq_norm);

        let iterations = self.config.power_iterations;
        let e1 = power_iterate(&cov, d, seed(d, PRIMARY_SEED_STEP, false), iterations);
        let lambda1 = rayleigh_quotient(&cov, d, &e1);
        for i in 0..d {
            for j in 0..d {
                cov[i * d + j] -= lambda1 * e1[i] * e1[j];
            }
        }
        let e2 = power_iterate(&cov, d, seed(d, SECONDARY_SEED_STEP, true), iterations);
        let lambda2 = rayleigh_quotient(&cov, d, &e2);

        let axis1_live = lambda1.is_finite() && lambda1 > floor;
        let axis2_live = lambda2.is_finite() && lambda2 > floor;
        if !axis1_live || !axis2_live {
            debug!(
                n,
                d,
                lambda1,
                lambda2,
                "projection axis without variance collapses to midpoint"
            );
        }

        let mut xs = Vec::with_capacity(n);
        let mut ys = Vec::with_capacity(n);
        for row in centered.chunks_exact(d) {
            xs.push(if axis1_live { dot(row, &e1) } else { 0.0 });
            ys.push(if axis2_live { dot(row, &e2) } else { 0.0 });
        }

        let mut projection = Projection2D::from_axes(
            &xs,
            &ys,
            self.config.lower_bound,
            self.config.upper_bound,
        );
        if !axis1_live || !axis2_live {
            let midpoint = self.config.midpoint();
            for point in &mut projection.points {
                if !axis1_live {
                    point.x = midpoint;
                }
                if !axis2_live {
                    point.y = midpoint;
                }
            }
        }
        debug!(n, d, lambda1, lambda2, total_variance, "projected embedding matrix");

        Ok((
            projection,
            Some(ProjectionAxes {
                e1,
                e2,
                lambda1,
                lambda2,
                total_variance,
            }),
        ))
    }

    /// Projects a labeled embedding table, pairing each point with its token.
    pub fn project_tokens(
        &self,
        tokens: &TokenEmbeddings,
    ) -> Result<Vec<(String, Point2)>, DiagError> {
        let projection = self.project(tokens.matrix())?;
        Ok(tokens
            .vocab()
            .labels()
            .iter()
            .cloned()
            .zip(projection.into_points())
            .collect())
    }
}

/// Projects with the default configuration.
pub fn project(matrix: &EmbeddingMatrix) -> Result<Projection2D, DiagError> {
    EmbeddingProjector::default().project(matrix)
}

fn center(matrix: &EmbeddingMatrix) -> Vec<f64> {
    let n = matrix.n();
    let d = matrix.d();
    // A single row has no spread to center against.
    if n <= 1 {
        return vec![0.0; n * d];
    }

    let mut means = vec![0.0; d];
    for row in matrix.rows() {
        for (mean, value) in means.iter_mut().zip(row) {
            *mean += value;
        }
    }
    for mean in &mut means {
        *mean /= n as f64;
    }

    let mut centered = Vec::with_capacity(n * d);
    for row in matrix.rows() {
        centered.extend(row.iter().zip(&means).map(|(value, mean)| value - mean));
    }
    centered
}

fn covariance(centered: &[f64], n: usize, d: usize) -> Vec<f64> {
    let denom = n.saturating_sub(1).max(1) as f64;
    let mut cov = vec![0.0; d * d];
    for row in centered.chunks_exact(d) {
        for i in 0..d {
            let ri = row[i];
            if ri == 0.0 {
                continue;
            }
            for j in i..d {
                cov[i * d + j] += ri * row[j];
            }
        }
    }
    for i in 0..d {
        for j in i..d {
            let value = cov[i * d + j] / denom;
            cov[i * d + j] = value;
            cov[j * d + i] = value;
        }
    }
    cov
}

fn seed(d: usize, step: f64, alternate: bool) -> Vec<f64> {
    (0..d)
        .map(|i| {
            let magnitude = 1.0 + step * i as f64;
            if alternate && i % 2 == 1 {
                -magnitude
            } else {
                magnitude
            }
        })
        .collect()
}

fn mat_vec(m: &[f64], d: usize, v: &[f64]) -> Vec<f64> {
    m.chunks_exact(d).map(|row| dot(row, v)).collect()
}

fn scaled_to_unit(v: &[f64]) -> Option<Vec<f64>> {
    let norm = l2_norm(v);
    if norm == 0.0 || !norm.is_finite() {
        return None;
    }
    Some(v.iter().map(|x| x / norm).collect())
}

fn power_iterate(m: &[f64], d: usize, seed: Vec<f64>, iterations: usize) -> Vec<f64> {
    let mut v = scaled_to_unit(&seed).unwrap_or(seed);
    for _ in 0..iterations {
        // A vanishing product means the matrix has nothing left along v; keep
        // the last unit iterate.
        match scaled_to_unit(&mat_vec(m, d, &v)) {
            Some(next) => v = next,
            None => break,
        }
    }
    v
}

fn rayleigh_quotient(m: &[f64], d: usize, v: &[f64]) -> f64 {
    dot(v, &mat_vec(m, d, v))
}
