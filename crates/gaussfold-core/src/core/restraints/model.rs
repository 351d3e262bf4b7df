use nalgebra::{DMatrix, Point3, Vector3};
use std::collections::BTreeSet;
use thiserror::Error;

/// Pairs closer than this contribute no gradient (direction undefined).
const MIN_GRADIENT_DISTANCE: f64 = 1e-12;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ModelError {
    #[error("Point index {index} out of range for a model of {size} points")]
    IndexOutOfRange { index: usize, size: usize },
    #[error("Cannot restrain point {0} to itself")]
    SelfPair(usize),
    #[error("Invalid mean distance {mu} for pair ({i}, {j})")]
    InvalidMu { i: usize, j: usize, mu: f64 },
    #[error("Invalid sigma {sigma} for pair ({i}, {j}): must be positive and finite")]
    InvalidSigma { i: usize, j: usize, sigma: f64 },
    #[error("Invalid weight {weight} for pair ({i}, {j}): must be non-negative and finite")]
    InvalidWeight { i: usize, j: usize, weight: f64 },
    #[error("Matrix '{what}' is {rows}x{cols}, expected {expected}x{expected}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        rows: usize,
        cols: usize,
    },
    #[error("Layout has {actual} points, model expects {expected}")]
    LayoutLength { expected: usize, actual: usize },
    #[error("'{what}' has length {actual}, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("No distance distribution for restraint '{kind}' between {i} and {j}")]
    UnsupportedRestraint { kind: String, i: usize, j: usize },
}

/// Gaussian restraints over `n` points.
///
/// `mu`, `sigma` and `weight` are symmetric; NaN marks a pair without a
/// restraint. The score of a layout is the log-likelihood
/// `-0.5 * sum w * ((d - mu) / sigma)^2` over restrained pairs `i < j`.
/// Higher is better.
#[derive(Debug, Clone, PartialEq)]
pub struct RestraintModel {
    n: usize,
    mu: DMatrix<f64>,
    sigma: DMatrix<f64>,
    weight: DMatrix<f64>,
    active: BTreeSet<(usize, usize)>,
}

impl RestraintModel {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            mu: DMatrix::from_element(n, n, f64::NAN),
            sigma: DMatrix::from_element(n, n, f64::NAN),
            weight: DMatrix::from_element(n, n, f64::NAN),
            active: BTreeSet::new(),
        }
    }

    /// Builds a model from full matrices, reading the strict upper triangle.
    /// A NaN `mu` marks an unrestrained pair; a NaN weight defaults to 1.
    pub fn from_parts(
        mu: &DMatrix<f64>,
        sigma: &DMatrix<f64>,
        weight: Option<&DMatrix<f64>>,
    ) -> Result<Self, ModelError> {
        let n = mu.nrows();
        let check = |what: &'static str, m: &DMatrix<f64>| {
            if m.nrows() != n || m.ncols() != n {
                Err(ModelError::DimensionMismatch {
                    what,
                    expected: n,
                    rows: m.nrows(),
                    cols: m.ncols(),
                })
            } else {
                Ok(())
            }
        };
        check("mu", mu)?;
        check("sigma", sigma)?;
        if let Some(w) = weight {
            check("weight", w)?;
        }

        let mut model = Self::new(n);
        for i in 0..n {
            for j in (i + 1)..n {
                if mu[(i, j)].is_nan() {
                    continue;
                }
                let w = weight.map(|w| w[(i, j)]).filter(|w| !w.is_nan()).unwrap_or(1.0);
                model.add_restraint(i, j, mu[(i, j)], sigma[(i, j)], w)?;
            }
        }
        Ok(model)
    }

    /// Sets the restraint between `i` and `j` in both triangles. A second call
    /// for the same pair overwrites the first.
    pub fn add_restraint(
        &mut self,
        i: usize,
        j: usize,
        mu: f64,
        sigma: f64,
        weight: f64,
    ) -> Result<(), ModelError> {
        for index in [i, j] {
            if index >= self.n {
                return Err(ModelError::IndexOutOfRange {
                    index,
                    size: self.n,
                });
            }
        }
        if i == j {
            return Err(ModelError::SelfPair(i));
        }
        if !(mu.is_finite() && mu >= 0.0) {
            return Err(ModelError::InvalidMu { i, j, mu });
        }
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(ModelError::InvalidSigma { i, j, sigma });
        }
        if !(weight.is_finite() && weight >= 0.0) {
            return Err(ModelError::InvalidWeight { i, j, weight });
        }

        for (a, b) in [(i, j), (j, i)] {
            self.mu[(a, b)] = mu;
            self.sigma[(a, b)] = sigma;
            self.weight[(a, b)] = weight;
        }
        self.active.insert((i.min(j), i.max(j)));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn n_restraints(&self) -> usize {
        self.active.len()
    }

    /// `(mu, sigma, weight)` for a restrained pair.
    pub fn restraint(&self, i: usize, j: usize) -> Option<(f64, f64, f64)> {
        let key = (i.min(j), i.max(j));
        self.active
            .contains(&key)
            .then(|| (self.mu[key], self.sigma[key], self.weight[key]))
    }

    /// Restrained pairs `(i, j)` with `i < j`, in row-major order.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.active.iter().copied()
    }

    pub fn mu(&self) -> &DMatrix<f64> {
        &self.mu
    }

    pub fn sigma(&self) -> &DMatrix<f64> {
        &self.sigma
    }

    pub fn weight(&self) -> &DMatrix<f64> {
        &self.weight
    }

    /// Log-likelihood of a layout. Returns NaN when the layout does not have
    /// one point per model index.
    pub fn evaluate(&self, coords: &[Point3<f64>]) -> f64 {
        if coords.len() != self.n {
            return f64::NAN;
        }
        let sum: f64 = self
            .active
            .iter()
            .map(|&(i, j)| {
                let d = (coords[i] - coords[j]).norm();
                let z = (d - self.mu[(i, j)]) / self.sigma[(i, j)];
                self.weight[(i, j)] * z * z
            })
            .sum();
        -0.5 * sum
    }

    /// Analytic gradient of [`evaluate`](Self::evaluate) with respect to every
    /// point.
    pub fn gradient(&self, coords: &[Point3<f64>]) -> Result<Vec<Vector3<f64>>, ModelError> {
        self.value_and_gradient(coords).map(|(_, g)| g)
    }

    pub fn value_and_gradient(
        &self,
        coords: &[Point3<f64>],
    ) -> Result<(f64, Vec<Vector3<f64>>), ModelError> {
        if coords.len() != self.n {
            return Err(ModelError::LayoutLength {
                expected: self.n,
                actual: coords.len(),
            });
        }
        let mut grad = vec![Vector3::zeros(); self.n];
        let mut sum = 0.0;
        for &(i, j) in &self.active {
            let diff = coords[i] - coords[j];
            let d = diff.norm();
            let (mu, sigma, w) = (self.mu[(i, j)], self.sigma[(i, j)], self.weight[(i, j)]);
            let z = (d - mu) / sigma;
            sum += w * z * z;
            if d < MIN_GRADIENT_DISTANCE {
                continue;
            }
            // d/dp_i of -0.5 w ((d - mu) / sigma)^2
            let coeff = -w * (d - mu) / (sigma * sigma * d);
            let g = diff * coeff;
            grad[i] += g;
            grad[j] -= g;
        }
        Ok((-0.5 * sum, grad))
    }
}
