//! # Workflows Module
//!
//! High-level entry points for an external optimizer.
//!
//! - **Siting Problem** ([`problem`]) - Bundles candidates, adjacency graph,
//!   layer store and baselines behind neighbourhood and batch-evaluation calls.

pub mod problem;
