// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

#[path = "common.rs"]
mod common;

use lmdiag_core::{EmbeddingMatrix, TokenEmbeddings, Vocabulary};
use lmdiag_embed::{project, rank_neighbors};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut cursor = common::ByteCursor::new(data);
    let n = common::bounded(cursor.next_u8(), 0, 24);
    let d = common::bounded(cursor.next_u8(), 1, 12);
    let values: Vec<f64> = (0..n * d).map(|_| cursor.next_value()).collect();
    let Ok(matrix) = EmbeddingMatrix::from_flat(values, n, d) else {
        return;
    };

    match project(&matrix) {
        Ok(projection) => {
            assert_eq!(projection.len(), n);
            for point in projection.points() {
                assert!((0.05..=0.95).contains(&point.x), "x out of bounds: {}", point.x);
                assert!((0.05..=0.95).contains(&point.y), "y out of bounds: {}", point.y);
            }
        }
        Err(_) => assert!(matrix.as_flat().iter().any(|value| !value.is_finite())),
    }

    let labels: Vec<String> = (0..n).map(|idx| format!("t{idx}")).collect();
    let query = labels.first().cloned().unwrap_or_default();
    let Ok(vocab) = Vocabulary::new(labels) else {
        return;
    };
    let Ok(tokens) = TokenEmbeddings::new(vocab, matrix) else {
        return;
    };
    let ranked = rank_neighbors(&tokens, &query);
    assert_eq!(ranked.len(), n.saturating_sub(1));
});
