// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Hyperparameters and summary metrics of one trained configuration.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigRecord {
    pub config_id: String,
    pub emb_dim: usize,
    pub hidden_size: usize,
    pub learning_rate: f64,
    pub final_train_loss: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub final_val_loss: Option<f64>,
    pub perplexity: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub generalization_gap: Option<f64>,
    pub total_params: u64,
    /// Optional quality score in `[0, 1]`, higher is better.
    #[cfg_attr(feature = "serde", serde(default))]
    pub score: Option<f64>,
    /// Loss of a uniform predictor over the vocabulary (`ln |V|`).
    #[cfg_attr(feature = "serde", serde(default))]
    pub expected_uniform_loss: Option<f64>,
}

impl ConfigRecord {
    /// Loss the anomaly checks compare against: the final training loss,
    /// which is also the loss the logged perplexity was derived from.
    pub fn final_loss(&self) -> f64 {
        self.final_train_loss
    }

    /// Uniform-predictor loss for a vocabulary of `vocab_size` tokens.
    pub fn uniform_loss_for_vocab(vocab_size: usize) -> Option<f64> {
        (vocab_size > 0).then(|| (vocab_size as f64).ln())
    }
}
