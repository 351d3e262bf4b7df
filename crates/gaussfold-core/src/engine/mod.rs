//! # Engine Module
//!
//! This module implements the optimization engine of GaussFold: the stateful search that
//! refines a candidate backbone layout against a Gaussian restraint model.
//!
//! ## Overview
//!
//! The engine owns everything that changes while a structure is being folded. It seeds and
//! evolves a population of layouts, tracks the incumbent best layout and its score history,
//! decides when to stop, and optionally polishes the result with a quasi-Newton local search.
//! Restraint models built in [`crate::core`] are read-only here.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Search, polish, graph and restraint settings with a validating builder
//! - **Objectives** ([`objective`]) - Scoring traits implemented by the restraint model
//! - **Genetic Search** ([`genetic`]) - Steady-state tournament selection, crossover and mutation
//! - **State Tracking** ([`state`]) - Population, stop reasons and optimization results
//! - **Local Polish** ([`polish`]) - L-BFGS refinement using the analytic gradient
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress reporting
//! - **Error Handling** ([`error`]) - Engine-level error taxonomy
//!
//! ## Key Capabilities
//!
//! - **Reproducible search** from an explicit seed with first-index tie breaking
//! - **Parallel scoring** of the initial population behind the `parallel` feature
//! - **Distinguishable stop reasons** for stalls, time limits and invalid scores

pub mod config;
pub mod error;
pub mod genetic;
pub mod objective;
pub mod polish;
pub mod progress;
pub mod state;
pub mod utils;
