// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Numeric helpers shared by every lmdiag component.

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population variance (divides by `n`), `None` for an empty slice.
pub fn population_variance(values: &[f64]) -> Option<f64> {
    let mu = mean(values)?;
    let sum_sq: f64 = values
        .iter()
        .map(|value| {
            let centered = value - mu;
            centered * centered
        })
        .sum();
    Some(sum_sq / values.len() as f64)
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    population_variance(values).map(f64::sqrt)
}

/// Smallest and largest value, `None` for an empty slice.
pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let (&first, rest) = values.split_first()?;
    Some(
        rest.iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
    )
}

/// Dot product over the shared prefix of `a` and `b`.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Euclidean norm computed with running rescaling so large components do not
/// overflow the sum of squares.
pub fn l2_norm(values: &[f64]) -> f64 {
    let mut scale = 0.0;
    let mut sumsq = 1.0;
    let mut has_nonzero = false;

    for &value in values {
        let x = value.abs();
        if x == 0.0 {
            continue;
        }
        has_nonzero = true;
        if scale < x {
            let ratio = if scale == 0.0 { 0.0 } else { scale / x };
            sumsq = 1.0 + sumsq * ratio * ratio;
            scale = x;
        } else {
            let ratio = x / scale;
            sumsq += ratio * ratio;
        }
    }

    if !has_nonzero {
        0.0
    } else {
        scale * sumsq.sqrt()
    }
}

/// Cosine of the angle between `a` and `b`.
///
/// Returns `0.0` when either vector has zero norm so rankings stay total.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let denom = l2_norm(a) * l2_norm(b);
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    (dot(a, b) / denom).clamp(-1.0, 1.0)
}

/// Min-max rescales `values` into `[lo, hi]`.
///
/// A zero (or floating-point-noise) range maps every value to the interval
/// midpoint, as does any non-finite value.
pub fn normalize_axis(values: &[f64], lo: f64, hi: f64) -> Vec<f64> {
    let Some((min, max)) = min_max(values) else {
        return Vec::new();
    };
    let range = max - min;
    let magnitude = min.abs().max(max.abs());
    let midpoint = 0.5 * (lo + hi);
    if !range.is_finite() || range <= f64::EPSILON * magnitude {
        return vec![midpoint; values.len()];
    }
    let span = hi - lo;
    values
        .iter()
        .map(|&v| {
            if v.is_finite() {
                (lo + (v - min) / range * span).clamp(lo, hi)
            } else {
                midpoint
            }
        })
        .collect()
}
