//! # Core Module
//!
//! Stateless building blocks for facility siting: candidate and raster data
//! models, grid alignment, and the natural-neighbour adjacency graph.
//!
//! ## Architecture
//!
//! - **Data Models** ([`models`]) - Candidates, the global grid, effect and baseline rasters
//! - **Spatial Structure** ([`spatial`]) - Voronoi adjacency and neighbourhood expansion
//! - **Utilities** ([`utils`]) - Planar geometry helpers
//!
//! Every type here is immutable once constructed and free of I/O. Rasters are
//! normalised on ingestion (negative and non-finite cells become zero) so the
//! evaluation layer can rely on non-negative inputs.

pub mod models;
pub mod spatial;
pub mod utils;
