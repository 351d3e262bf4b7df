use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum NoiseError {
    #[error("standard deviation must be finite and non-negative, got {0}")]
    InvalidStd(f64),
}

/// Seeded generator when `seed` is given, entropy-seeded otherwise.
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Isotropic Gaussian noise for 3-D points.
#[derive(Debug, Clone, Copy)]
pub struct PointNoise {
    normal: Normal<f64>,
}

impl PointNoise {
    pub fn new(std: f64) -> Result<Self, NoiseError> {
        if !(std.is_finite() && std >= 0.0) {
            return Err(NoiseError::InvalidStd(std));
        }
        let normal = Normal::new(0.0, std).map_err(|_| NoiseError::InvalidStd(std))?;
        Ok(Self { normal })
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> Vector3<f64> {
        Vector3::new(
            self.normal.sample(rng),
            self.normal.sample(rng),
            self.normal.sample(rng),
        )
    }

    /// Copy of `coords` with independent noise on every coordinate.
    pub fn perturb<R: Rng>(&self, coords: &[Point3<f64>], rng: &mut R) -> Vec<Point3<f64>> {
        coords.iter().map(|p| p + self.sample(rng)).collect()
    }
}
