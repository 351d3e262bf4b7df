use crate::core::restraints::{ModelError, RestraintModel};
use nalgebra::{Point3, Vector3};

/// Fitness of a candidate layout. Higher is better.
pub trait Objective: Sync {
    fn evaluate(&self, coords: &[Point3<f64>]) -> f64;
}

/// An objective that also provides its analytic gradient.
pub trait DifferentiableObjective: Objective {
    fn value_and_gradient(
        &self,
        coords: &[Point3<f64>],
    ) -> Result<(f64, Vec<Vector3<f64>>), ModelError>;
}

impl Objective for RestraintModel {
    fn evaluate(&self, coords: &[Point3<f64>]) -> f64 {
        RestraintModel::evaluate(self, coords)
    }
}

impl DifferentiableObjective for RestraintModel {
    fn value_and_gradient(
        &self,
        coords: &[Point3<f64>],
    ) -> Result<(f64, Vec<Vector3<f64>>), ModelError> {
        RestraintModel::value_and_gradient(self, coords)
    }
}

/// Adapts a plain scoring function.
pub struct FnObjective<F>(pub F);

impl<F> Objective for FnObjective<F>
where
    F: Fn(&[Point3<f64>]) -> f64 + Sync,
{
    fn evaluate(&self, coords: &[Point3<f64>]) -> f64 {
        (self.0)(coords)
    }
}
