use crate::cli::FoldArgs;
use crate::config::PartialFoldConfig;
use crate::error::Result;
use crate::files;
use crate::utils::progress::CliProgressHandler;
use gaussfold::engine::progress::ProgressReporter;
use gaussfold::workflows::{self, fold::FoldInput, fold::PrecomputedEmbedding};
use tracing::{info, warn};

pub fn run(args: FoldArgs) -> Result<()> {
    let partial_config = match &args.config {
        Some(path) => PartialFoldConfig::from_file(path)?,
        None => PartialFoldConfig::default(),
    };
    info!("Merging configuration from file and CLI arguments...");
    let final_config = partial_config.merge_with_cli(&args)?;

    info!("Loading contact map from {:?}", &args.contacts);
    let contact_map = files::read_matrix(&args.contacts)?;
    let secondary_structure = files::read_secondary_structure(&args.secondary_structure)?;
    let accessibility = args
        .accessibility
        .as_deref()
        .map(files::read_accessibility)
        .transpose()?;
    let sequence = args
        .sequence
        .as_deref()
        .map(files::read_sequence)
        .transpose()?;
    let embedding = PrecomputedEmbedding::new(files::read_layout(&args.initial)?);

    let mut input = FoldInput::new(&contact_map, &secondary_structure);
    if let Some(accessibility) = &accessibility {
        input = input.accessibility(accessibility);
    }
    if let Some(sequence) = &sequence {
        input = input.sequence(sequence);
    }

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Folding a chain of {} residues...", contact_map.nrows());
    info!("Invoking the core fold workflow...");
    let result = workflows::fold::run(&input, &embedding, &final_config, &reporter)?;

    let n_missing = result.missing.iter().filter(|&&m| m).count();
    if n_missing > 0 {
        warn!(
            "{} residue(s) had no usable contact information.",
            n_missing
        );
    }
    info!(
        "Search stopped after {} generation(s): {}",
        result.search.iterations, result.search.stop_reason
    );

    files::write_layout(&args.output, &result.coords)?;
    println!(
        "✓ Folded layout (score: {:.4}, {} restraints) written to: {}",
        result.score,
        result.n_restraints,
        args.output.display()
    );
    if result.polished {
        println!(
            "  Local polish improved the search result ({:.4} -> {:.4}).",
            result.search.best_score, result.score
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use nalgebra::Point3;
    use std::fmt::Write as _;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    const N: usize = 12;

    fn helix() -> Vec<Point3<f64>> {
        (0..N)
            .map(|i| {
                let t = (i as f64) * 100f64.to_radians();
                Point3::new(2.3 * t.cos(), 2.3 * t.sin(), 1.5 * i as f64)
            })
            .collect()
    }

    fn write_inputs(dir: &Path) {
        let coords = helix();
        let mut cmap = String::new();
        for a in &coords {
            let row: Vec<String> = coords
                .iter()
                .map(|b| format!("{:.6}", (-((a - b).norm() / 8.0).powi(2)).exp()))
                .collect();
            writeln!(cmap, "{}", row.join(",")).unwrap();
        }
        fs::write(dir.join("cmap.csv"), cmap).unwrap();
        fs::write(dir.join("ss.txt"), ">helix\nHHHHHHHHHHHH\n").unwrap();

        let initial: Vec<Point3<f64>> = coords
            .iter()
            .enumerate()
            .map(|(i, p)| p + nalgebra::Vector3::new(0.3 * (i % 3) as f64, -0.2, 0.1))
            .collect();
        files::write_layout(&dir.join("x0.csv"), &initial).unwrap();
    }

    fn fold_args(dir: &Path, extra: &[&str]) -> FoldArgs {
        let path = |name: &str| dir.join(name).to_string_lossy().into_owned();
        let mut args = vec![
            "gaussfold".to_string(),
            "fold".to_string(),
            "--contacts".to_string(),
            path("cmap.csv"),
            "--secondary-structure".to_string(),
            path("ss.txt"),
            "--initial".to_string(),
            path("x0.csv"),
            "-o".to_string(),
            path("out.csv"),
            "--seed".to_string(),
            "5".to_string(),
            "--pop-size".to_string(),
            "20".to_string(),
            "--n-iter".to_string(),
            "60".to_string(),
            "-S".to_string(),
            "optimizer.partition-size=5".to_string(),
            "-S".to_string(),
            "optimizer.early-stopping=30".to_string(),
            "-S".to_string(),
            "optimizer.init-std=0.5".to_string(),
        ];
        args.extend(extra.iter().map(|s| s.to_string()));
        match Cli::parse_from(args).command {
            Commands::Fold(args) => args,
            _ => panic!("Expected 'fold' subcommand"),
        }
    }

    #[test]
    fn fold_command_writes_one_point_per_residue() {
        let dir = tempdir().unwrap();
        write_inputs(dir.path());

        run(fold_args(dir.path(), &[])).unwrap();

        let folded = files::read_layout(&dir.path().join("out.csv")).unwrap();
        assert_eq!(folded.len(), N);
        assert!(folded.iter().all(|p| p.coords.iter().all(|c| c.is_finite())));
    }

    #[test]
    fn fold_command_rejects_mismatched_labels() {
        let dir = tempdir().unwrap();
        write_inputs(dir.path());
        fs::write(dir.path().join("ss.txt"), "HHHH\n").unwrap();

        assert!(run(fold_args(dir.path(), &["--no-polish"])).is_err());
        assert!(!dir.path().join("out.csv").exists());
    }
}
