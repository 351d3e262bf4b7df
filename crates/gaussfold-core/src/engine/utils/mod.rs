//! Utility functions for the engine module.
//!
//! Random number generation helpers shared by the stochastic search and the
//! connectivity repair step: seeding from an optional user seed and isotropic
//! Gaussian noise on 3-D points.

pub mod sampling;
