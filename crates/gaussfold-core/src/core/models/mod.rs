//! # Point Models
//!
//! The optimizer works on plain coordinate buffers. This module describes what
//! each index of such a buffer stands for.
//!
//! - [`arena`] - Owns every modelled point (one per residue, plus an optional
//!   center-of-mass dummy) and hands out dense ids
//! - [`ids`] - The [`PointId`](ids::PointId) newtype; its index is the row of the
//!   point in every layout and restraint matrix
//! - [`labels`] - Secondary-structure and solvent-accessibility labels
//! - [`sequence`] - Amino-acid one-letter lookup

pub mod arena;
pub mod ids;
pub mod labels;
pub mod sequence;
