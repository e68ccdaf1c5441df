// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Deterministic workload generators shared by the criterion benches.

use lmdiag_core::{ConfigRecord, EmbeddingMatrix, MetricSeries};

pub fn lcg_next(state: &mut u64) -> u64 {
    *state = state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    *state
}

/// Uniform draw in `[-1, 1)` from the top 53 bits of the generator.
pub fn lcg_unit(state: &mut u64) -> f64 {
    let bits = lcg_next(state) >> 11;
    (bits as f64 / (1u64 << 53) as f64) * 2.0 - 1.0
}

/// `n` random embeddings of dimension `d` with one dominant direction.
pub fn embedding_table(n: usize, d: usize, seed: u64) -> EmbeddingMatrix {
    let mut state = seed;
    let values = (0..n * d)
        .map(|idx| {
            let scale = if idx % d == 0 { 4.0 } else { 1.0 };
            scale * lcg_unit(&mut state)
        })
        .collect();
    EmbeddingMatrix::from_flat(values, n, d).expect("benchmark table should be well formed")
}

/// A decaying loss curve with multiplicative noise and an occasional spike.
pub fn loss_curve(len: usize, seed: u64) -> MetricSeries {
    let mut state = seed;
    let pairs = (0..len).map(|idx| {
        let base = 3.3 * (-(idx as f64) / (len as f64 / 4.0 + 1.0)).exp() + 0.8;
        let noise = 1.0 + 0.02 * lcg_unit(&mut state);
        let spike = if idx % 97 == 96 { 1.5 } else { 1.0 };
        (idx as u64 * 10, base * noise * spike)
    });
    MetricSeries::from_pairs(pairs).expect("benchmark curve should be well formed")
}

/// A hyperparameter sweep over embedding size, hidden size and learning rate.
pub fn config_sweep(seed: u64) -> Vec<ConfigRecord> {
    let mut state = seed;
    let mut configs = Vec::new();
    for emb_dim in [2, 4, 8, 16, 32] {
        for hidden_size in [32, 64, 128, 256] {
            for learning_rate in [0.01, 0.03, 0.1] {
                let loss = 1.5 + 0.5 * (lcg_unit(&mut state) + 1.0);
                configs.push(ConfigRecord {
                    config_id: format!("e{emb_dim}_h{hidden_size}_lr{learning_rate}"),
                    emb_dim,
                    hidden_size,
                    learning_rate,
                    final_train_loss: loss,
                    final_val_loss: Some(loss + 0.1),
                    perplexity: loss.exp(),
                    generalization_gap: Some(0.25 * lcg_unit(&mut state) + 0.1),
                    total_params: (27 * emb_dim + 3 * emb_dim * hidden_size + hidden_size * 27)
                        as u64,
                    score: Some(1.0 / loss),
                    expected_uniform_loss: ConfigRecord::uniform_loss_for_vocab(27),
                });
            }
        }
    }
    configs
}

#[cfg(test)]
mod tests {
    use super::{config_sweep, embedding_table, lcg_unit, loss_curve};

    #[test]
    fn generators_are_deterministic() {
        assert_eq!(embedding_table(8, 3, 7), embedding_table(8, 3, 7));
        assert_eq!(loss_curve(50, 1), loss_curve(50, 1));
        assert_eq!(config_sweep(3).len(), 60);
    }

    #[test]
    fn unit_draws_stay_in_range() {
        let mut state = 42;
        for _ in 0..1_000 {
            let value = lcg_unit(&mut state);
            assert!((-1.0..1.0).contains(&value));
        }
    }
}
