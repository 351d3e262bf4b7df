//! # GaussFold Core Library
//!
//! Distance-geometry reconstruction of protein backbones from predicted residue contacts.
//! A contact map is thresholded into a graph, graph distances become Gaussian distance
//! restraints, and a genetic search refines an initial embedding to maximize their
//! log-likelihood.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`PointArena`, residue labels) and pure
//!   algorithms: the contact graph, the restraint model with its analytic gradient, the
//!   bond-length deviation corrector, and transform-invariant structural alignment.
//!
//! - **[`engine`]: The Logic Core.** The stateful search: configuration, the steady-state
//!   genetic optimizer, L-BFGS polishing, stop reasons and progress reporting.
//!
//! - **[`workflows`]: The Public API.** Complete procedures (`fold`, `score`) that tie the
//!   `engine` and `core` together behind a small entry point.

pub mod core;
pub mod engine;
pub mod workflows;
