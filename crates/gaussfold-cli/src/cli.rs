use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Antoine Passemiers",
    version,
    about = "GaussFold CLI - Reconstruct protein backbones from predicted contact maps using Gaussian distance restraints and a genetic optimizer.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fold a chain from its contact map, labels and an initial embedding.
    Fold(FoldArgs),
    /// Score a predicted layout against a reference with TM-score and/or RMSD.
    Score(ScoreArgs),
}

/// Arguments for the `fold` subcommand.
#[derive(Args, Debug)]
pub struct FoldArgs {
    // --- Inputs ---
    /// Contact probability matrix (comma-separated, one row per line; empty or NaN cells are missing).
    #[arg(long, required = true, value_name = "PATH")]
    pub contacts: PathBuf,

    /// Secondary structure labels, one H/E/C (or 8-state DSSP) code per residue.
    #[arg(long = "secondary-structure", required = true, value_name = "PATH")]
    pub secondary_structure: PathBuf,

    /// Solvent accessibility labels, one B/M/E code per residue.
    #[arg(long, value_name = "PATH")]
    pub accessibility: Option<PathBuf>,

    /// Primary structure in one-letter codes, used to place disulfide bonds.
    #[arg(long, value_name = "PATH")]
    pub sequence: Option<PathBuf>,

    /// Initial layout (N rows of x,y,z) produced by an external embedding.
    #[arg(long, required = true, value_name = "PATH")]
    pub initial: PathBuf,

    /// Path for the folded layout (N rows of x,y,z).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Optimizer Overrides ---
    /// Seed for every random choice of the run.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Override the population size of the genetic search.
    #[arg(long, value_name = "INT")]
    pub pop_size: Option<usize>,

    /// Override the maximum number of generations.
    #[arg(long, value_name = "INT")]
    pub n_iter: Option<usize>,

    /// Disable the final gradient-based polish, overriding the config file.
    #[arg(long)]
    pub no_polish: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S optimizer.mutation-std=0.2
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricChoice {
    Tm,
    Rmsd,
    Both,
}

/// Arguments for the `score` subcommand.
#[derive(Args, Debug)]
pub struct ScoreArgs {
    /// Predicted layout (N rows of x,y,z).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub predicted: PathBuf,

    /// Reference layout (N rows of x,y,z; empty rows mark unobserved residues).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub reference: PathBuf,

    /// Similarity metric(s) to report.
    #[arg(short, long, value_enum, default_value_t = MetricChoice::Both)]
    pub metric: MetricChoice,

    /// Write the predicted layout superposed onto the reference, one row per
    /// residue; residues missing from the reference are left empty.
    #[arg(long, value_name = "PATH")]
    pub aligned_output: Option<PathBuf>,

    /// Random rotation starts per reflection branch (0 uses only the
    /// least-squares start).
    #[arg(long, value_name = "INT", default_value_t = 1)]
    pub starts: usize,

    /// Seed for the random rotation starts.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,
}
