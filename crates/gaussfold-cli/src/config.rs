use crate::cli::FoldArgs;
use crate::error::{CliError, Result};
use gaussfold::core::corrector::{CollinearPolicy, CorrectorConfig};
use gaussfold::core::graph::{ConnectivityPolicy, GraphConfig};
use gaussfold::core::restraints::{ModelConfig, RestraintTable};
use gaussfold::engine::config::{self as core_config, GeneticConfig, PolishConfig};
use gaussfold::engine::error::EngineError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
enum PartialConnectivity {
    LeaveMissing,
    ForceEdges,
}

impl FromStr for PartialConnectivity {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "leave-missing" => Ok(Self::LeaveMissing),
            "force-edges" => Ok(Self::ForceEdges),
            _ => Err(CliError::Config(format!(
                "Unknown connectivity policy '{}'. Expected 'leave-missing' or 'force-edges'.",
                s
            ))),
        }
    }
}

impl From<PartialConnectivity> for ConnectivityPolicy {
    fn from(p: PartialConnectivity) -> Self {
        match p {
            PartialConnectivity::LeaveMissing => ConnectivityPolicy::LeaveMissing,
            PartialConnectivity::ForceEdges => ConnectivityPolicy::ForceEdges,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
enum PartialCollinear {
    Skip,
    Bend,
}

impl FromStr for PartialCollinear {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "skip" => Ok(Self::Skip),
            "bend" => Ok(Self::Bend),
            _ => Err(CliError::Config(format!(
                "Unknown collinear policy '{}'. Expected 'skip' or 'bend'.",
                s
            ))),
        }
    }
}

impl From<PartialCollinear> for CollinearPolicy {
    fn from(p: PartialCollinear) -> Self {
        match p {
            PartialCollinear::Skip => CollinearPolicy::Skip,
            PartialCollinear::Bend => CollinearPolicy::Bend,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialGraphConfig {
    separation: Option<usize>,
    contact_density: Option<f64>,
    max_distance: Option<u32>,
    connectivity: Option<PartialConnectivity>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialCorrectionConfig {
    target_distance: Option<f64>,
    tolerance: Option<f64>,
    max_sweeps: Option<usize>,
    collinear: Option<PartialCollinear>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialModelConfig {
    separation: Option<usize>,
    min_disulfide_probability: Option<f64>,
    exterior_restraints: Option<bool>,
    use_weights: Option<bool>,
    restraint_table: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialOptimizerConfig {
    pop_size: Option<usize>,
    n_iter: Option<usize>,
    partition_size: Option<usize>,
    mutation_rate: Option<f64>,
    mutation_std: Option<f64>,
    init_std: Option<f64>,
    early_stopping: Option<usize>,
    seed: Option<u64>,
    time_limit_secs: Option<f64>,
    log_interval: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialPolishConfig {
    enabled: Option<bool>,
    max_iterations: Option<usize>,
    memory: Option<usize>,
    gradient_tolerance: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialFoldConfig {
    graph: Option<PartialGraphConfig>,
    correction: Option<PartialCorrectionConfig>,
    model: Option<PartialModelConfig>,
    optimizer: Option<PartialOptimizerConfig>,
    polish: Option<PartialPolishConfig>,
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        CliError::Config(format!("Invalid value for {}: '{}'", key, value))
    })
}

impl PartialFoldConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Resolves the final configuration. Precedence: CLI flags, then `--set`
    /// values, then the file, then library defaults.
    pub fn merge_with_cli(mut self, args: &FoldArgs) -> Result<core_config::FoldConfig> {
        self.apply_set_values(&args.set_values)?;

        let graph_file = self.graph.take().unwrap_or_default();
        let correction_file = self.correction.take().unwrap_or_default();
        let model_file = self.model.take().unwrap_or_default();
        let opt_file = self.optimizer.take().unwrap_or_default();
        let polish_file = self.polish.take().unwrap_or_default();

        let graph_defaults = GraphConfig::default();
        let graph = GraphConfig {
            separation: graph_file.separation.unwrap_or(graph_defaults.separation),
            contact_density: graph_file
                .contact_density
                .unwrap_or(graph_defaults.contact_density),
            max_distance: graph_file.max_distance.unwrap_or(graph_defaults.max_distance),
            connectivity: graph_file
                .connectivity
                .map(Into::into)
                .unwrap_or(graph_defaults.connectivity),
        };

        let corrector_defaults = CorrectorConfig::default();
        let corrector = CorrectorConfig {
            target_distance: correction_file
                .target_distance
                .unwrap_or(corrector_defaults.target_distance),
            tolerance: correction_file
                .tolerance
                .unwrap_or(corrector_defaults.tolerance),
            max_sweeps: correction_file
                .max_sweeps
                .unwrap_or(corrector_defaults.max_sweeps),
            collinear_policy: correction_file
                .collinear
                .map(Into::into)
                .unwrap_or(corrector_defaults.collinear_policy),
            ..corrector_defaults
        };

        let model_defaults = ModelConfig::default();
        let model = ModelConfig {
            separation: model_file.separation.unwrap_or(model_defaults.separation),
            min_disulfide_probability: model_file
                .min_disulfide_probability
                .unwrap_or(model_defaults.min_disulfide_probability),
            exterior_restraints: model_file
                .exterior_restraints
                .unwrap_or(model_defaults.exterior_restraints),
            use_weights: model_file.use_weights.unwrap_or(model_defaults.use_weights),
        };
        let table = match &model_file.restraint_table {
            Some(path) => RestraintTable::load(path).map_err(EngineError::from)?,
            None => RestraintTable::default(),
        };

        let time_limit = opt_file
            .time_limit_secs
            .map(|secs| {
                Duration::try_from_secs_f64(secs).map_err(|e| {
                    CliError::Config(format!("Invalid optimizer.time-limit-secs {}: {}", secs, e))
                })
            })
            .transpose()?;
        let genetic_defaults = GeneticConfig::default();
        let genetic = GeneticConfig {
            pop_size: args
                .pop_size
                .or(opt_file.pop_size)
                .unwrap_or(genetic_defaults.pop_size),
            n_iter: args
                .n_iter
                .or(opt_file.n_iter)
                .unwrap_or(genetic_defaults.n_iter),
            partition_size: opt_file
                .partition_size
                .unwrap_or(genetic_defaults.partition_size),
            mutation_rate: opt_file
                .mutation_rate
                .unwrap_or(genetic_defaults.mutation_rate),
            mutation_std: opt_file
                .mutation_std
                .unwrap_or(genetic_defaults.mutation_std),
            init_std: opt_file.init_std.unwrap_or(genetic_defaults.init_std),
            early_stopping: opt_file
                .early_stopping
                .unwrap_or(genetic_defaults.early_stopping),
            seed: args.seed.or(opt_file.seed),
            time_limit,
            log_interval: opt_file
                .log_interval
                .unwrap_or(genetic_defaults.log_interval),
        };

        let mut polish = PolishConfig::default();
        polish.enabled = !args.no_polish && polish_file.enabled.unwrap_or(polish.enabled);
        if let Some(max_iterations) = polish_file.max_iterations {
            polish.options.max_iterations = max_iterations;
        }
        if let Some(memory) = polish_file.memory {
            polish.options.memory = memory;
        }
        if let Some(tolerance) = polish_file.gradient_tolerance {
            polish.options.gradient_tolerance = tolerance;
        }

        core_config::FoldConfigBuilder::new()
            .graph(graph)
            .corrector(corrector)
            .model(model)
            .genetic(genetic)
            .polish(polish)
            .table(table)
            .build()
            .map_err(|e| CliError::Config(e.to_string()))
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };
            let (key, value) = (key.trim(), value.trim());
            let unsupported = || {
                CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                ))
            };

            match key.split_once('.') {
                Some(("graph", field)) => {
                    let graph = self.graph.get_or_insert_with(Default::default);
                    match field {
                        "separation" => graph.separation = Some(parse_value(key, value)?),
                        "contact-density" => {
                            graph.contact_density = Some(parse_value(key, value)?)
                        }
                        "max-distance" => graph.max_distance = Some(parse_value(key, value)?),
                        "connectivity" => graph.connectivity = Some(value.parse()?),
                        _ => return Err(unsupported()),
                    }
                }
                Some(("correction", field)) => {
                    let correction = self.correction.get_or_insert_with(Default::default);
                    match field {
                        "target-distance" => {
                            correction.target_distance = Some(parse_value(key, value)?)
                        }
                        "tolerance" => correction.tolerance = Some(parse_value(key, value)?),
                        "max-sweeps" => correction.max_sweeps = Some(parse_value(key, value)?),
                        "collinear" => correction.collinear = Some(value.parse()?),
                        _ => return Err(unsupported()),
                    }
                }
                Some(("model", field)) => {
                    let model = self.model.get_or_insert_with(Default::default);
                    match field {
                        "separation" => model.separation = Some(parse_value(key, value)?),
                        "min-disulfide-probability" => {
                            model.min_disulfide_probability = Some(parse_value(key, value)?)
                        }
                        "exterior-restraints" => {
                            model.exterior_restraints = Some(parse_value(key, value)?)
                        }
                        "use-weights" => model.use_weights = Some(parse_value(key, value)?),
                        "restraint-table" => model.restraint_table = Some(PathBuf::from(value)),
                        _ => return Err(unsupported()),
                    }
                }
                Some(("optimizer", field)) => {
                    let optimizer = self.optimizer.get_or_insert_with(Default::default);
                    match field {
                        "pop-size" => optimizer.pop_size = Some(parse_value(key, value)?),
                        "n-iter" => optimizer.n_iter = Some(parse_value(key, value)?),
                        "partition-size" => {
                            optimizer.partition_size = Some(parse_value(key, value)?)
                        }
                        "mutation-rate" => optimizer.mutation_rate = Some(parse_value(key, value)?),
                        "mutation-std" => optimizer.mutation_std = Some(parse_value(key, value)?),
                        "init-std" => optimizer.init_std = Some(parse_value(key, value)?),
                        "early-stopping" => {
                            optimizer.early_stopping = Some(parse_value(key, value)?)
                        }
                        "seed" => optimizer.seed = Some(parse_value(key, value)?),
                        "time-limit-secs" => {
                            optimizer.time_limit_secs = Some(parse_value(key, value)?)
                        }
                        "log-interval" => optimizer.log_interval = Some(parse_value(key, value)?),
                        _ => return Err(unsupported()),
                    }
                }
                Some(("polish", field)) => {
                    let polish = self.polish.get_or_insert_with(Default::default);
                    match field {
                        "enabled" => polish.enabled = Some(parse_value(key, value)?),
                        "max-iterations" => polish.max_iterations = Some(parse_value(key, value)?),
                        "memory" => polish.memory = Some(parse_value(key, value)?),
                        "gradient-tolerance" => {
                            polish.gradient_tolerance = Some(parse_value(key, value)?)
                        }
                        _ => return Err(unsupported()),
                    }
                }
                _ => return Err(unsupported()),
            }
        }
        Ok(())
    }
}
