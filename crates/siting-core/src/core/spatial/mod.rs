//! # Spatial Module
//!
//! Proximity structure over candidate sites. [`adjacency`] derives the
//! natural-neighbour graph from a Delaunay triangulation and answers
//! radius-bounded neighbourhood queries used to restrict mutations.

pub mod adjacency;
