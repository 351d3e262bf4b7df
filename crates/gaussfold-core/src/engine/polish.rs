use super::config::PolishConfig;
use super::error::EngineError;
use super::objective::DifferentiableObjective;
use crate::core::utils::minimize::lbfgs;
use nalgebra::{DVector, Point3};
use tracing::{debug, instrument};

#[derive(Debug, Clone, PartialEq)]
pub struct PolishOutcome {
    pub coords: Vec<Point3<f64>>,
    pub score: f64,
    /// Whether the local search beat the starting score.
    pub improved: bool,
    pub evaluations: usize,
}

fn flatten(coords: &[Point3<f64>]) -> DVector<f64> {
    DVector::from_iterator(
        coords.len() * 3,
        coords.iter().flat_map(|p| [p.x, p.y, p.z]),
    )
}

fn unflatten(x: &DVector<f64>) -> Vec<Point3<f64>> {
    x.as_slice()
        .chunks_exact(3)
        .map(|c| Point3::new(c[0], c[1], c[2]))
        .collect()
}

/// Gradient ascent on the objective starting from `coords`.
///
/// L-BFGS minimizes the negated score. The polished layout is returned only if
/// its score is strictly higher than `score`; otherwise the input comes back
/// unchanged.
#[instrument(skip_all, name = "local_polish", fields(n_points = coords.len()))]
pub fn polish<O>(
    coords: &[Point3<f64>],
    score: f64,
    objective: &O,
    config: &PolishConfig,
) -> Result<PolishOutcome, EngineError>
where
    O: DifferentiableObjective + ?Sized,
{
    objective.value_and_gradient(coords)?;

    let minimum = lbfgs(
        |x: &DVector<f64>| {
            let layout = unflatten(x);
            match objective.value_and_gradient(&layout) {
                Ok((value, grad)) => {
                    let g = DVector::from_iterator(
                        grad.len() * 3,
                        grad.iter().flat_map(|g| [-g.x, -g.y, -g.z]),
                    );
                    (-value, g)
                }
                Err(_) => (f64::NAN, DVector::zeros(x.len())),
            }
        },
        flatten(coords),
        &config.options,
    );

    let polished = unflatten(&minimum.x);
    let polished_score = objective.evaluate(&polished);
    debug!(
        "Local polish: {:.4} -> {:.4} after {} evaluation(s).",
        score, polished_score, minimum.evaluations
    );

    if polished_score > score {
        Ok(PolishOutcome {
            coords: polished,
            score: polished_score,
            improved: true,
            evaluations: minimum.evaluations,
        })
    } else {
        Ok(PolishOutcome {
            coords: coords.to_vec(),
            score,
            improved: false,
            evaluations: minimum.evaluations,
        })
    }
}
