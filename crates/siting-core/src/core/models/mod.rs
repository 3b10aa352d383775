//! # Core Models Module
//!
//! Plain data structures describing candidate sites and the rasters attached
//! to them. Nothing in here performs I/O; the loader hands in coordinates and
//! raw bands and these types normalise and validate them.
//!
//! - [`ids`] - Candidate identifiers and arena keys
//! - [`candidate`] - Candidate sites and ordered candidate sets
//! - [`grid`] - The shared global grid, its affine transform and raster alignment
//! - [`raster`] - Effect layers, baseline weight rasters and ingestion normalisation

pub mod candidate;
pub mod grid;
pub mod ids;
pub mod raster;
