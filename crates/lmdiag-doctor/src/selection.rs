// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use lmdiag_core::{AnomalyConfig, ConfigRecord};

/// Which configurations of a sweep to surface.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FilterMode {
    #[default]
    All,
    /// Top quarter by score.
    Best,
    /// Bottom quarter by score.
    Worst,
    /// Large gap or low score.
    Anomalies,
}

const QUARTILE: f64 = 0.25;

/// Selects config ids for `mode` with the default thresholds.
pub fn select_configs(configs: &[ConfigRecord], mode: FilterMode) -> Vec<String> {
    select_configs_with(&AnomalyConfig::default(), configs, mode)
}

/// Selects config ids for `mode`. `All` keeps input order; the other modes
/// return ids ranked by score, best first.
pub fn select_configs_with(
    config: &AnomalyConfig,
    configs: &[ConfigRecord],
    mode: FilterMode,
) -> Vec<String> {
    if mode == FilterMode::All {
        return configs.iter().map(|c| c.config_id.clone()).collect();
    }

    let mut ranked: Vec<&ConfigRecord> = configs.iter().collect();
    ranked.sort_by(|a, b| b.score.unwrap_or(0.0).total_cmp(&a.score.unwrap_or(0.0)));

    let n = ranked.len();
    let chosen: Vec<&ConfigRecord> = match mode {
        FilterMode::All => ranked,
        FilterMode::Best => {
            let take = (n as f64 * QUARTILE).ceil() as usize;
            ranked.into_iter().take(take).collect()
        }
        FilterMode::Worst => {
            let skip = (n as f64 * (1.0 - QUARTILE)).floor() as usize;
            ranked.into_iter().skip(skip).collect()
        }
        FilterMode::Anomalies => ranked
            .into_iter()
            .filter(|c| {
                c.generalization_gap.unwrap_or(0.0) > config.gen_gap_threshold
                    || c.score.unwrap_or(1.0) < config.low_score_threshold
            })
            .collect(),
    };
    chosen.into_iter().map(|c| c.config_id.clone()).collect()
}
