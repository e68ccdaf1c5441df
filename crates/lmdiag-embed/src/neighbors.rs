// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use lmdiag_core::stats::cosine_similarity;
use lmdiag_core::{DiagError, EmbeddingMatrix, TokenEmbeddings, Vocabulary};
use tracing::{debug, warn};

/// Another token and its cosine similarity to the query token.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Neighbor {
    pub label: String,
    pub similarity: f64,
}

/// Ranks every other token by cosine similarity to `label`, most similar
/// first. Equal similarities keep vocabulary order.
///
/// An unknown label yields an empty ranking.
pub fn rank_neighbors(tokens: &TokenEmbeddings, label: &str) -> Vec<Neighbor> {
    let Some(query_idx) = tokens.vocab().position(label) else {
        debug!(label, "neighbor query for unknown token");
        return Vec::new();
    };
    let matrix = tokens.matrix();
    let query = matrix.row(query_idx);

    let mut ranked: Vec<Neighbor> = tokens
        .vocab()
        .labels()
        .iter()
        .zip(matrix.rows())
        .enumerate()
        .filter(|(idx, _)| *idx != query_idx)
        .map(|(_, (other, row))| Neighbor {
            label: other.clone(),
            // Adding 0.0 folds -0.0 into 0.0 so `total_cmp` sees a tie.
            similarity: cosine_similarity(query, row) + 0.0,
        })
        .collect();
    // Stable sort keeps vocabulary order among ties.
    ranked.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    ranked
}

/// The `k` most similar tokens to `label`.
pub fn nearest_k(tokens: &TokenEmbeddings, label: &str, k: usize) -> Vec<Neighbor> {
    let mut ranked = rank_neighbors(tokens, label);
    ranked.truncate(k);
    ranked
}

/// Ranks neighbors over a separately supplied matrix and vocabulary.
///
/// Mismatched lengths are reported as [`DiagError::DegenerateInput`].
pub fn rank_neighbors_in(
    matrix: &EmbeddingMatrix,
    vocab: &Vocabulary,
    label: &str,
) -> Result<Vec<Neighbor>, DiagError> {
    let tokens = TokenEmbeddings::new(vocab.clone(), matrix.clone()).inspect_err(|err| {
        warn!(error = %err, "neighbor ranking rejected mismatched embedding table");
    })?;
    Ok(rank_neighbors(&tokens, label))
}
