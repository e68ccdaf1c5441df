// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// One gradient-norm log entry as it arrives from a training timeline.
///
/// Logs carry either a bare scalar or a per-group object with a `total`
/// field. Everything else is kept as [`GradNormEntry::Unparseable`] so callers
/// can count it, and [`GradNormEntry::as_scalar`] drops it.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(from = "serde_json::Value", into = "serde_json::Value")
)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GradNormEntry {
    Scalar(f64),
    Structured { total: Option<f64> },
    Unparseable,
}

impl GradNormEntry {
    /// Plain positive norm: the scalar form first, then `total`.
    ///
    /// Non-positive and non-finite values yield `None`.
    pub fn as_scalar(&self) -> Option<f64> {
        let raw = match *self {
            Self::Scalar(value) => value,
            Self::Structured { total: Some(total) } => total,
            Self::Structured { total: None } | Self::Unparseable => return None,
        };
        (raw.is_finite() && raw > 0.0).then_some(raw)
    }
}

/// Normalizes a gradient-norm log to positive scalars, preserving order.
pub fn positive_grad_norms(entries: &[GradNormEntry]) -> Vec<f64> {
    entries.iter().filter_map(GradNormEntry::as_scalar).collect()
}

#[cfg(feature = "serde")]
fn number_like(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(number) => number.as_f64(),
        serde_json::Value::String(raw) => raw.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(feature = "serde")]
impl From<serde_json::Value> for GradNormEntry {
    fn from(value: serde_json::Value) -> Self {
        if let Some(scalar) = number_like(&value) {
            return Self::Scalar(scalar);
        }
        match value {
            serde_json::Value::Object(fields) => Self::Structured {
                total: fields.get("total").and_then(number_like),
            },
            _ => Self::Unparseable,
        }
    }
}

#[cfg(feature = "serde")]
impl From<GradNormEntry> for serde_json::Value {
    fn from(entry: GradNormEntry) -> Self {
        match entry {
            GradNormEntry::Scalar(value) => serde_json::json!(value),
            GradNormEntry::Structured { total } => serde_json::json!({ "total": total }),
            GradNormEntry::Unparseable => serde_json::Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{GradNormEntry, positive_grad_norms};

    #[test]
    fn scalar_form_is_preferred() {
        assert_eq!(GradNormEntry::Scalar(0.7).as_scalar(), Some(0.7));
        assert_eq!(
            GradNormEntry::Structured { total: Some(1.5) }.as_scalar(),
            Some(1.5)
        );
    }

    #[test]
    fn non_positive_and_missing_entries_are_dropped() {
        assert_eq!(GradNormEntry::Scalar(0.0).as_scalar(), None);
        assert_eq!(GradNormEntry::Scalar(-2.0).as_scalar(), None);
        assert_eq!(GradNormEntry::Scalar(f64::NAN).as_scalar(), None);
        assert_eq!(GradNormEntry::Structured { total: None }.as_scalar(), None);
        assert_eq!(GradNormEntry::Unparseable.as_scalar(), None);
    }

    #[test]
    fn positive_grad_norms_keeps_order() {
        let entries = [
            GradNormEntry::Scalar(3.0),
            GradNormEntry::Unparseable,
            GradNormEntry::Structured { total: Some(0.5) },
            GradNormEntry::Scalar(-1.0),
            GradNormEntry::Scalar(2.0),
        ];
        assert_eq!(positive_grad_norms(&entries), vec![3.0, 0.5, 2.0]);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserializes_every_logged_shape() {
        let entries: Vec<GradNormEntry> = serde_json::from_str(
            r#"[1.25, "0.5", {"total": 2.0, "W1": 0.3}, {"W1": 0.3}, "n/a", null, [1, 2]]"#,
        )
        .expect("any json value should map onto an entry");
        assert_eq!(
            entries,
            vec![
                GradNormEntry::Scalar(1.25),
                GradNormEntry::Scalar(0.5),
                GradNormEntry::Structured { total: Some(2.0) },
                GradNormEntry::Structured { total: None },
                GradNormEntry::Unparseable,
                GradNormEntry::Unparseable,
                GradNormEntry::Unparseable,
            ]
        );
    }
}
