//! # Siting Core Library
//!
//! Spatial building blocks for multi-objective facility siting: which candidate
//! sites are near each other, and how well a chosen subset of sites serves a
//! population once their pre-simulated effect rasters are combined.
//!
//! ## Architectural Philosophy
//!
//! - **[`core`]: The Foundation.** Stateless data models (candidates, grids,
//!   rasters) and pure algorithms such as the Voronoi adjacency graph and its
//!   radius-bounded neighbourhood query.
//!
//! - **[`engine`]: The Evaluation Core.** The layer store that owns ingested
//!   rasters, configuration, progress reporting and the composite evaluator
//!   that scores subsets against population and isolation baselines.
//!
//! - **[`workflows`]: The Public API.** [`workflows::problem::SitingProblem`]
//!   ties the layers together for an optimizer that proposes and scores subsets.
//!
//! The library never installs a `tracing` subscriber; embedding applications
//! decide how spans and events are collected.

pub mod core;
pub mod engine;
pub mod workflows;
