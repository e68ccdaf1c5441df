// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod neighbors;
pub mod projector;

pub use neighbors::{Neighbor, nearest_k, rank_neighbors, rank_neighbors_in};
pub use projector::{EmbeddingProjector, Point2, Projection2D, ProjectionAxes, project};
