// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use lmdiag_core::{EmbeddingMatrix, TokenEmbeddings, Vocabulary};
use lmdiag_embed::{project, rank_neighbors};
use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

const MIN_PROPTEST_CASES: u32 = 256;
const LOWER: f64 = 0.05;
const UPPER: f64 = 0.95;
const RENORM_TOL: f64 = 1e-9;

fn proptest_cases() -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .map(|parsed| parsed.max(MIN_PROPTEST_CASES))
        .unwrap_or(MIN_PROPTEST_CASES)
}

fn matrix_strategy() -> impl Strategy<Value = EmbeddingMatrix> {
    (1usize..40, 1usize..8).prop_flat_map(|(n, d)| {
        prop::collection::vec(-10.0f64..10.0, n * d).prop_map(move |values| {
            EmbeddingMatrix::from_flat(values, n, d)
                .expect("generated buffer length should always match n * d")
        })
    })
}

fn coarse_tokens_strategy() -> impl Strategy<Value = TokenEmbeddings> {
    (2usize..24, 1usize..4).prop_flat_map(|(n, d)| {
        prop::collection::vec(-1i8..=1, n * d).prop_map(move |cells| {
            let values = cells.into_iter().map(f64::from).collect();
            let matrix = EmbeddingMatrix::from_flat(values, n, d)
                .expect("generated buffer length should always match n * d");
            let labels = (0..n).map(|idx| format!("tok{idx}")).collect();
            let vocab = Vocabulary::new(labels).expect("generated labels are unique");
            TokenEmbeddings::new(vocab, matrix).expect("lengths match")
        })
    })
}

fn within_bounds(value: f64) -> bool {
    (LOWER..=UPPER).contains(&value)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: proptest_cases(),
        max_shrink_iters: 1024,
        failure_persistence: Some(Box::new(FileFailurePersistence::Off)),
        .. ProptestConfig::default()
    })]

    #[test]
    fn projected_coordinates_stay_within_bounds(matrix in matrix_strategy()) {
        let projection = project(&matrix).expect("finite matrices should project");
        prop_assert_eq!(projection.len(), matrix.n());
        for point in projection.points() {
            prop_assert!(within_bounds(point.x), "x out of bounds: {}", point.x);
            prop_assert!(within_bounds(point.y), "y out of bounds: {}", point.y);
        }
    }

    #[test]
    fn renormalizing_a_projection_is_a_no_op(matrix in matrix_strategy()) {
        let projection = project(&matrix).expect("finite matrices should project");
        let again = projection.renormalized(LOWER, UPPER);
        for (before, after) in projection.points().iter().zip(again.points()) {
            prop_assert!((before.x - after.x).abs() <= RENORM_TOL);
            prop_assert!((before.y - after.y).abs() <= RENORM_TOL);
        }
    }

    #[test]
    fn single_token_always_lands_in_the_center(row in prop::collection::vec(-1e3f64..1e3, 1..16)) {
        let projection = project(&EmbeddingMatrix::from_rows(vec![row]))
            .expect("finite matrices should project");
        let point = projection.points()[0];
        prop_assert_eq!((point.x, point.y), (0.5, 0.5));
    }

    #[test]
    fn neighbor_ranking_is_sorted_and_excludes_query(
        matrix in matrix_strategy(),
        query_seed in any::<prop::sample::Index>(),
    ) {
        let labels: Vec<String> = (0..matrix.n()).map(|idx| format!("tok{idx}")).collect();
        let query = labels[query_seed.index(labels.len())].clone();
        let vocab = Vocabulary::new(labels).expect("generated labels are unique");
        let tokens = TokenEmbeddings::new(vocab, matrix).expect("lengths match");

        let ranked = rank_neighbors(&tokens, &query);
        prop_assert_eq!(ranked.len(), tokens.vocab().len() - 1);
        prop_assert!(ranked.iter().all(|neighbor| neighbor.label != query));
        prop_assert!(ranked.windows(2).all(|pair| pair[0].similarity >= pair[1].similarity));
        prop_assert!(ranked.iter().all(|neighbor| (-1.0..=1.0).contains(&neighbor.similarity)));
    }

    #[test]
    fn tied_neighbors_keep_vocabulary_order(
        tokens in coarse_tokens_strategy(),
        query_seed in any::<prop::sample::Index>(),
    ) {
        let query = tokens.vocab().labels()[query_seed.index(tokens.vocab().len())].clone();
        let ranked = rank_neighbors(&tokens, &query);
        for pair in ranked.windows(2) {
            if pair[0].similarity == pair[1].similarity {
                let first = tokens.vocab().position(&pair[0].label).expect("label is known");
                let second = tokens.vocab().position(&pair[1].label).expect("label is known");
                prop_assert!(
                    first < second,
                    "tie between {} and {} out of vocabulary order",
                    pair[0].label,
                    pair[1].label
                );
            }
        }
    }
}
