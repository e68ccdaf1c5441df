// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use lmdiag_core::ConfigRecord;

/// Overfitting severity of a generalization gap.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum GapSeverity {
    Underfit,
    Healthy,
    Mild,
    Elevated,
    Overfit,
}

impl GapSeverity {
    pub fn classify(gap: f64) -> Self {
        if gap < 0.0 {
            Self::Underfit
        } else if gap < 0.1 {
            Self::Healthy
        } else if gap < 0.2 {
            Self::Mild
        } else if gap < 0.3 {
            Self::Elevated
        } else {
            Self::Overfit
        }
    }
}

/// Configurations sharing one `(emb_dim, hidden_size)` pair.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct GapCell {
    pub emb_dim: usize,
    pub hidden_size: usize,
    /// Mean of the logged gaps across learning rates; `None` if none logged.
    pub mean_gap: Option<f64>,
    pub best_loss: f64,
    pub config_ids: Vec<String>,
}

impl GapCell {
    pub fn count(&self) -> usize {
        self.config_ids.len()
    }

    pub fn severity(&self) -> Option<GapSeverity> {
        self.mean_gap.map(GapSeverity::classify)
    }
}

/// Generalization gap averaged over learning rates on the
/// embedding-size by hidden-size grid.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GapGrid {
    emb_dims: Vec<usize>,
    hidden_sizes: Vec<usize>,
    cells: Vec<GapCell>,
}

impl GapGrid {
    pub fn build(configs: &[ConfigRecord]) -> Self {
        let mut grouped: BTreeMap<(usize, usize), Vec<&ConfigRecord>> = BTreeMap::new();
        for config in configs {
            grouped
                .entry((config.emb_dim, config.hidden_size))
                .or_default()
                .push(config);
        }

        let emb_dims: BTreeSet<usize> = grouped.keys().map(|(emb, _)| *emb).collect();
        let hidden_sizes: BTreeSet<usize> = grouped.keys().map(|(_, hidden)| *hidden).collect();
        let cells = grouped
            .into_iter()
            .map(|((emb_dim, hidden_size), members)| {
                let gaps: Vec<f64> = members
                    .iter()
                    .filter_map(|config| config.generalization_gap)
                    .collect();
                let mean_gap = lmdiag_core::stats::mean(&gaps);
                let best_loss = members
                    .iter()
                    .map(|config| config.final_loss())
                    .fold(f64::INFINITY, f64::min);
                GapCell {
                    emb_dim,
                    hidden_size,
                    mean_gap,
                    best_loss,
                    config_ids: members.iter().map(|config| config.config_id.clone()).collect(),
                }
            })
            .collect();

        Self {
            emb_dims: emb_dims.into_iter().collect(),
            hidden_sizes: hidden_sizes.into_iter().collect(),
            cells,
        }
    }

    /// Distinct embedding sizes, ascending.
    pub fn emb_dims(&self) -> &[usize] {
        &self.emb_dims
    }

    /// Distinct hidden sizes, ascending.
    pub fn hidden_sizes(&self) -> &[usize] {
        &self.hidden_sizes
    }

    /// Populated cells ordered by `(emb_dim, hidden_size)`.
    pub fn cells(&self) -> &[GapCell] {
        &self.cells
    }

    pub fn cell(&self, emb_dim: usize, hidden_size: usize) -> Option<&GapCell> {
        self.cells
            .binary_search_by_key(&(emb_dim, hidden_size), |cell| {
                (cell.emb_dim, cell.hidden_size)
            })
            .ok()
            .map(|idx| &self.cells[idx])
    }
}

/// Signed gap label, `+0.123` for overfitting and `-0.050` otherwise.
pub fn format_gap(gap: Option<f64>) -> String {
    match gap {
        Some(gap) if gap > 0.0 => format!("+{gap:.3}"),
        Some(gap) => format!("{gap:.3}"),
        None => "n/a".to_string(),
    }
}
