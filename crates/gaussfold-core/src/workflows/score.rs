use crate::core::alignment::{AlignerConfig, Alignment, Metric, StructuralAligner};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use nalgebra::Point3;
use tracing::{info, instrument};

/// Aligns `predicted` onto `reference` once per requested metric.
///
/// Reference points set to `None` are unobserved and excluded from both
/// layouts.
#[instrument(skip_all, name = "score_workflow", fields(n_points = predicted.len()))]
pub fn run(
    predicted: &[Point3<f64>],
    reference: &[Option<Point3<f64>>],
    metrics: &[Metric],
    config: &AlignerConfig,
    reporter: &ProgressReporter,
) -> Result<Vec<Alignment>, EngineError> {
    reporter.report(Progress::PhaseStart {
        name: "Structural Alignment",
    });
    reporter.report(Progress::TaskStart {
        total_steps: metrics.len() as u64,
    });
    let aligner = StructuralAligner::new(config.clone());
    let mut alignments = Vec::with_capacity(metrics.len());
    for &metric in metrics {
        let alignment = aligner.align(predicted, reference, metric)?;
        info!("{} = {:.4}", metric, alignment.score);
        alignments.push(alignment);
        reporter.report(Progress::TaskIncrement);
    }
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);
    Ok(alignments)
}
