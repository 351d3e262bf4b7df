use crate::core::corrector::CorrectorConfig;
use crate::core::graph::GraphConfig;
use crate::core::restraints::{ModelConfig, RestraintTable};
use crate::core::utils::minimize::LbfgsOptions;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Invalid restraint table: {0}")]
    InvalidTable(String),
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidParameter {
        name,
        reason: reason.into(),
    }
}

fn check_probability(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(name, format!("{} is not in [0, 1]", value)))
    }
}

fn check_non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(name, format!("{} must be finite and non-negative", value)))
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(name, format!("{} must be finite and positive", value)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneticConfig {
    pub pop_size: usize,
    pub n_iter: usize,
    /// Individuals drawn into each of the two selection partitions.
    pub partition_size: usize,
    /// Probability that a child's point receives mutation noise.
    pub mutation_rate: f64,
    pub mutation_std: f64,
    /// Noise used to spread the initial population around the seed layout.
    pub init_std: f64,
    /// Generations without a new best score before the search stops.
    pub early_stopping: usize,
    pub seed: Option<u64>,
    pub time_limit: Option<Duration>,
    pub log_interval: usize,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            pop_size: 2000,
            n_iter: 100_000,
            partition_size: 50,
            mutation_rate: 0.5,
            mutation_std: 0.3,
            init_std: 10.0,
            early_stopping: 2000,
            seed: None,
            time_limit: None,
            log_interval: 100,
        }
    }
}

impl GeneticConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.partition_size == 0 {
            return Err(invalid("partition_size", "must be at least 1"));
        }
        if self.pop_size < 2 * self.partition_size {
            return Err(invalid(
                "pop_size",
                format!(
                    "{} is smaller than two partitions of {}",
                    self.pop_size, self.partition_size
                ),
            ));
        }
        if self.early_stopping == 0 {
            return Err(invalid("early_stopping", "must be at least 1"));
        }
        if self.log_interval == 0 {
            return Err(invalid("log_interval", "must be at least 1"));
        }
        check_probability("mutation_rate", self.mutation_rate)?;
        check_non_negative("mutation_std", self.mutation_std)?;
        check_non_negative("init_std", self.init_std)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolishConfig {
    pub enabled: bool,
    pub options: LbfgsOptions,
}

impl Default for PolishConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            options: LbfgsOptions::default(),
        }
    }
}

impl PolishConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.options.memory == 0 {
            return Err(invalid("polish.memory", "must be at least 1"));
        }
        check_non_negative("polish.gradient_tolerance", self.options.gradient_tolerance)?;
        check_non_negative("polish.f_tolerance", self.options.f_tolerance)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FoldConfig {
    pub graph: GraphConfig,
    pub corrector: CorrectorConfig,
    pub model: ModelConfig,
    pub genetic: GeneticConfig,
    pub polish: PolishConfig,
    pub table: RestraintTable,
}

impl FoldConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("graph.contact_density", self.graph.contact_density)?;
        if self.graph.max_distance == 0 {
            return Err(invalid("graph.max_distance", "must be at least 1"));
        }
        check_positive("correction.target_distance", self.corrector.target_distance)?;
        check_positive("correction.tolerance", self.corrector.tolerance)?;
        check_non_negative(
            "correction.collinear_tolerance",
            self.corrector.collinear_tolerance,
        )?;
        check_probability(
            "model.min_disulfide_probability",
            self.model.min_disulfide_probability,
        )?;
        self.genetic.validate()?;
        self.polish.validate()?;
        self.table
            .validate()
            .map_err(|e| ConfigError::InvalidTable(e.to_string()))?;
        Ok(())
    }
}

/// Collects fold settings and validates them together.
///
/// Sections left unset keep their defaults; single-value setters override one
/// field of the relevant section.
#[derive(Default)]
pub struct FoldConfigBuilder {
    graph: Option<GraphConfig>,
    corrector: Option<CorrectorConfig>,
    model: Option<ModelConfig>,
    genetic: Option<GeneticConfig>,
    polish: Option<PolishConfig>,
    table: Option<RestraintTable>,
    seed: Option<u64>,
    pop_size: Option<usize>,
    n_iter: Option<usize>,
    use_local_polish: Option<bool>,
}

impl FoldConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph(mut self, graph: GraphConfig) -> Self {
        self.graph = Some(graph);
        self
    }
    pub fn corrector(mut self, corrector: CorrectorConfig) -> Self {
        self.corrector = Some(corrector);
        self
    }
    pub fn model(mut self, model: ModelConfig) -> Self {
        self.model = Some(model);
        self
    }
    pub fn genetic(mut self, genetic: GeneticConfig) -> Self {
        self.genetic = Some(genetic);
        self
    }
    pub fn polish(mut self, polish: PolishConfig) -> Self {
        self.polish = Some(polish);
        self
    }
    pub fn table(mut self, table: RestraintTable) -> Self {
        self.table = Some(table);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn pop_size(mut self, pop_size: usize) -> Self {
        self.pop_size = Some(pop_size);
        self
    }
    pub fn n_iter(mut self, n_iter: usize) -> Self {
        self.n_iter = Some(n_iter);
        self
    }
    pub fn use_local_polish(mut self, enabled: bool) -> Self {
        self.use_local_polish = Some(enabled);
        self
    }

    pub fn build(self) -> Result<FoldConfig, ConfigError> {
        let mut genetic = self.genetic.unwrap_or_default();
        if let Some(seed) = self.seed {
            genetic.seed = Some(seed);
        }
        if let Some(pop_size) = self.pop_size {
            genetic.pop_size = pop_size;
        }
        if let Some(n_iter) = self.n_iter {
            genetic.n_iter = n_iter;
        }
        let mut polish = self.polish.unwrap_or_default();
        if let Some(enabled) = self.use_local_polish {
            polish.enabled = enabled;
        }
        let config = FoldConfig {
            graph: self.graph.unwrap_or_default(),
            corrector: self.corrector.unwrap_or_default(),
            model: self.model.unwrap_or_default(),
            genetic,
            polish,
            table: self.table.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }
}
