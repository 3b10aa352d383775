//! # Engine Module
//!
//! Evaluation machinery that turns ingested effect rasters into objective
//! vectors for candidate subsets.
//!
//! ## Overview
//!
//! The engine owns the caller-side state of a siting run: the arena of
//! per-candidate effect rasters, the configuration that governs ingestion and
//! neighbourhood queries, and the compositing evaluator an optimizer calls for
//! every trial subset. Evaluation is a pure function of read-only inputs.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Builder, defaults and TOML partial configs
//! - **Layer Store** ([`store`]) - Arena of aligned effect rasters keyed by candidate and layer
//! - **Compositing** ([`composite`]) - Max-compositing and reduction against baselines
//! - **Objectives** ([`objective`]) - The `(reduction, coverage, fairness)` vector
//! - **Progress Monitoring** ([`progress`]) - Phase and task events for long operations
//! - **Error Handling** ([`error`]) - Engine error type aggregating the core errors

pub mod composite;
pub mod config;
pub mod error;
pub mod objective;
pub mod progress;
pub mod store;
