//! # Workflows Module
//!
//! This module provides the end-to-end procedures exposed by GaussFold.
//!
//! ## Overview
//!
//! Workflows are the top-level entry points for users of the library. They tie the stateless
//! models and algorithms of [`crate::core`] to the search machinery of [`crate::engine`],
//! report progress phase by phase, and return complete results.
//!
//! ## Architecture
//!
//! - **Fold Workflow** ([`fold`]) - Contact graph, embedding, local repair, restraint model,
//!   genetic search and optional local polish
//! - **Score Workflow** ([`score`]) - Transform-invariant TM-score and RMSD against a reference
//!
//! ## Key Capabilities
//!
//! - **Pluggable embedding** through the [`fold::Embedder`] trait
//! - **Progress monitoring** with phase and task events
//! - **Reproducible runs** from a single seed

pub mod fold;
pub mod score;
