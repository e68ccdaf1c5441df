// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Core shared types for lmdiag: the data model handed over by data-fetching
//! layers, numeric helpers, the error type and the threshold configuration.

pub mod config;
pub mod embedding;
pub mod error;
pub mod grad_norm;
pub mod record;
pub mod series;
pub mod stats;

pub use config::{AnomalyConfig, CostConfig, DiagnosticsConfig, ProjectionConfig, TimelineConfig};
pub use embedding::{EmbeddingMatrix, TokenEmbeddings, Vocabulary};
pub use error::DiagError;
pub use grad_norm::{GradNormEntry, positive_grad_norms};
pub use record::ConfigRecord;
pub use series::{MetricPoint, MetricSeries};
