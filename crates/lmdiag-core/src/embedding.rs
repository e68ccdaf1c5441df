// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::DiagError;
use std::collections::HashSet;

/// Row-major `n x d` matrix of token embeddings.
///
/// Every row has the same dimension `d`; an empty matrix has `d == 0`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")
)]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EmbeddingMatrix {
    values: Vec<f64>,
    n: usize,
    d: usize,
}

impl EmbeddingMatrix {
    /// Builds a matrix from per-token rows.
    ///
    /// # Panics
    ///
    /// Panics when rows disagree on their dimension or a non-empty matrix has
    /// zero-width rows. Collaborators must never hand over ragged embeddings.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        match Self::try_from_rows(rows) {
            Ok(matrix) => matrix,
            Err(err) => panic!("malformed embedding matrix: {err}"),
        }
    }

    /// Fallible form of [`EmbeddingMatrix::from_rows`] for deserialization
    /// boundaries.
    pub fn try_from_rows(rows: Vec<Vec<f64>>) -> Result<Self, DiagError> {
        let n = rows.len();
        let d = rows.first().map_or(0, Vec::len);
        if n > 0 && d == 0 {
            return Err(DiagError::invalid_input("embedding rows must have d >= 1"));
        }

        let expected_len = n
            .checked_mul(d)
            .ok_or_else(|| DiagError::invalid_input("n*d overflow while validating shape"))?;
        let mut values = Vec::with_capacity(expected_len);
        for (idx, row) in rows.into_iter().enumerate() {
            if row.len() != d {
                return Err(DiagError::invalid_input(format!(
                    "row dimension mismatch: row {idx} has {}, expected d={d}",
                    row.len()
                )));
            }
            values.extend(row);
        }
        Ok(Self { values, n, d })
    }

    /// Builds a matrix from a flat row-major buffer.
    pub fn from_flat(values: Vec<f64>, n: usize, d: usize) -> Result<Self, DiagError> {
        if n > 0 && d == 0 {
            return Err(DiagError::invalid_input("d must be >= 1 when n >= 1"));
        }
        let expected_len = n
            .checked_mul(d)
            .ok_or_else(|| DiagError::invalid_input("n*d overflow while validating shape"))?;
        if values.len() != expected_len {
            return Err(DiagError::invalid_input(format!(
                "value length mismatch: got {}, expected {expected_len} (n={n}, d={d})",
                values.len()
            )));
        }
        // An empty matrix carries no dimension.
        let d = if n == 0 { 0 } else { d };
        Ok(Self { values, n, d })
    }

    /// Number of rows (tokens).
    pub fn n(&self) -> usize {
        self.n
    }

    /// Row dimension.
    pub fn d(&self) -> usize {
        self.d
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn row(&self, idx: usize) -> &[f64] {
        &self.values[idx * self.d..(idx + 1) * self.d]
    }

    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[f64]> + '_ {
        (0..self.n).map(move |idx| self.row(idx))
    }

    pub fn as_flat(&self) -> &[f64] {
        &self.values
    }

    /// Returns an error naming the first row holding a NaN or infinity.
    pub fn ensure_finite(&self) -> Result<(), DiagError> {
        for (idx, row) in self.rows().enumerate() {
            if let Some((dim, value)) = row.iter().enumerate().find(|(_, v)| !v.is_finite()) {
                return Err(DiagError::degenerate_input(format!(
                    "embedding row {idx} has non-finite value {value} at dim {dim}"
                )));
            }
        }
        Ok(())
    }
}

impl TryFrom<Vec<Vec<f64>>> for EmbeddingMatrix {
    type Error = DiagError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self, Self::Error> {
        Self::try_from_rows(rows)
    }
}

impl From<EmbeddingMatrix> for Vec<Vec<f64>> {
    fn from(matrix: EmbeddingMatrix) -> Self {
        matrix.rows().map(<[f64]>::to_vec).collect()
    }
}

/// Token labels aligned 1:1 with embedding rows.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "Vec<String>", into = "Vec<String>")
)]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Vocabulary {
    labels: Vec<String>,
}

impl Vocabulary {
    /// Builds a vocabulary, rejecting duplicate labels.
    pub fn new(labels: Vec<String>) -> Result<Self, DiagError> {
        let mut seen = HashSet::with_capacity(labels.len());
        for (idx, label) in labels.iter().enumerate() {
            if !seen.insert(label.as_str()) {
                return Err(DiagError::invalid_input(format!(
                    "duplicate vocabulary label {label:?} at index {idx}"
                )));
            }
        }
        Ok(Self { labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn label(&self, idx: usize) -> Option<&str> {
        self.labels.get(idx).map(String::as_str)
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|candidate| candidate == label)
    }
}

impl TryFrom<Vec<String>> for Vocabulary {
    type Error = DiagError;

    fn try_from(labels: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(labels)
    }
}

impl From<Vocabulary> for Vec<String> {
    fn from(vocab: Vocabulary) -> Self {
        vocab.labels
    }
}

/// A vocabulary paired with its embedding matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenEmbeddings {
    vocab: Vocabulary,
    matrix: EmbeddingMatrix,
}

impl TokenEmbeddings {
    pub fn new(vocab: Vocabulary, matrix: EmbeddingMatrix) -> Result<Self, DiagError> {
        if vocab.len() != matrix.n() {
            return Err(DiagError::degenerate_input(format!(
                "vocabulary/matrix length mismatch: {} labels, {} rows",
                vocab.len(),
                matrix.n()
            )));
        }
        Ok(Self { vocab, matrix })
    }

    /// Convenience constructor from `(label, vector)` pairs.
    ///
    /// # Panics
    ///
    /// Panics on ragged vectors, as [`EmbeddingMatrix::from_rows`] does.
    pub fn from_pairs<S: Into<String>>(
        pairs: impl IntoIterator<Item = (S, Vec<f64>)>,
    ) -> Result<Self, DiagError> {
        let (labels, rows): (Vec<String>, Vec<Vec<f64>>) = pairs
            .into_iter()
            .map(|(label, row)| (label.into(), row))
            .unzip();
        Self::new(Vocabulary::new(labels)?, EmbeddingMatrix::from_rows(rows))
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn matrix(&self) -> &EmbeddingMatrix {
        &self.matrix
    }

    /// Embedding row for `label`, if present.
    pub fn vector(&self, label: &str) -> Option<&[f64]> {
        self.vocab.position(label).map(|idx| self.matrix.row(idx))
    }
}
