//! # Core Module
//!
//! Stateless data models and pure algorithms of the folding pipeline.
//!
//! ## Overview
//!
//! Everything in this layer is a function of its inputs: no progress
//! reporting, no configuration merging, no long-lived state. The engine layer
//! composes these pieces into an optimization run.
//!
//! ## Architecture
//!
//! - **Point Models** ([`models`]) - Point arena, stable point ids, residue labels
//!   and the amino-acid lookup table
//! - **Contact Graph** ([`graph`]) - Top-k thresholding of a contact map and capped
//!   all-pairs hop distances, with an explicit connectivity policy
//! - **Restraints** ([`restraints`]) - Restraint kinds, the statistics table, the
//!   Gaussian scoring model with its analytic gradient, and the model builder
//! - **Local Repair** ([`corrector`]) - Consecutive-distance correction over triples
//! - **Evaluation** ([`alignment`]) - Reflection-aware TM-score and RMSD superposition
//! - **Numerics** ([`utils`]) - Geometry helpers and small minimizers

pub mod alignment;
pub mod corrector;
pub mod graph;
pub mod models;
pub mod restraints;
pub mod utils;
