use crate::cli::{MetricChoice, ScoreArgs};
use crate::error::Result;
use crate::files;
use crate::utils::progress::CliProgressHandler;
use gaussfold::core::alignment::{AlignerConfig, Metric};
use gaussfold::engine::progress::ProgressReporter;
use gaussfold::workflows;
use nalgebra::Point3;
use tracing::info;

fn metrics_for(choice: MetricChoice) -> Vec<Metric> {
    match choice {
        MetricChoice::Tm => vec![Metric::TmScore],
        MetricChoice::Rmsd => vec![Metric::Rmsd],
        MetricChoice::Both => vec![Metric::TmScore, Metric::Rmsd],
    }
}

/// Places aligned points back on the rows of the observed reference residues.
fn per_residue(
    aligned: &[Point3<f64>],
    reference: &[Option<Point3<f64>>],
) -> Vec<Option<Point3<f64>>> {
    let mut points = aligned.iter().copied();
    reference
        .iter()
        .map(|q| q.and_then(|_| points.next()))
        .collect()
}

pub fn run(args: ScoreArgs) -> Result<()> {
    info!("Loading predicted layout from {:?}", &args.predicted);
    let predicted = files::read_layout(&args.predicted)?;
    info!("Loading reference layout from {:?}", &args.reference);
    let reference = files::read_partial_layout(&args.reference)?;

    let config = AlignerConfig {
        n_random_starts: args.starts,
        seed: args.seed,
        ..AlignerConfig::default()
    };
    let metrics = metrics_for(args.metric);

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let alignments = workflows::score::run(&predicted, &reference, &metrics, &config, &reporter)?;

    for alignment in &alignments {
        println!(
            "{:<10} {:.4}  ({} aligned points)",
            alignment.metric.to_string(),
            alignment.score,
            alignment.coords.len()
        );
    }

    if let Some(path) = &args.aligned_output {
        if let Some(best) = alignments.first() {
            files::write_partial_layout(path, &per_residue(&best.coords, &reference))?;
            println!(
                "✓ Layout superposed under {} written to: {}",
                best.metric,
                path.display()
            );
        }
    }

    Ok(())
}
