use super::config::{ConfigError, GeneticConfig};
use super::error::EngineError;
use super::objective::Objective;
use super::progress::{Progress, ProgressReporter};
use super::state::{OptimizationResult, Population, StopReason};
use super::utils::sampling::{NoiseError, PointNoise, seeded_rng};
use nalgebra::Point3;
use rand::Rng;
use rand::seq::index;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Steady-state genetic search over layouts.
///
/// Every generation draws two disjoint partitions of the population, takes
/// the best member of each as a parent, builds a child by per-point uniform
/// crossover and Gaussian mutation, and moves it into the slot of the current
/// worst member. The best layout seen so far is kept aside and returned.
#[derive(Debug, Clone, Default)]
pub struct GeneticOptimizer {
    config: GeneticConfig,
}

impl GeneticOptimizer {
    pub fn new(config: GeneticConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneticConfig {
        &self.config
    }

    #[instrument(
        skip_all,
        name = "genetic_optimization",
        fields(pop_size = self.config.pop_size, n_points = initial.len())
    )]
    pub fn run<O>(
        &self,
        initial: &[Point3<f64>],
        objective: &O,
        reporter: &ProgressReporter,
    ) -> Result<OptimizationResult, EngineError>
    where
        O: Objective + ?Sized,
    {
        let config = &self.config;
        config.validate()?;
        if initial.is_empty() {
            return Err(EngineError::InvalidLayout(
                "initial layout has no points".to_string(),
            ));
        }
        let init_noise = PointNoise::new(config.init_std).map_err(|e| noise_error("init_std", e))?;
        let mutation_noise =
            PointNoise::new(config.mutation_std).map_err(|e| noise_error("mutation_std", e))?;
        let mut rng = seeded_rng(config.seed);
        let started = Instant::now();

        let mut members = Vec::with_capacity(config.pop_size);
        members.push(initial.to_vec());
        for _ in 1..config.pop_size {
            members.push(init_noise.perturb(initial, &mut rng));
        }
        let scores = evaluate_all(&members, objective);
        let mut population = Population::new(members, scores);

        let Some(seed_index) = population.best_index() else {
            return Err(EngineError::InvalidLayout(
                "objective is NaN for every initial individual".to_string(),
            ));
        };
        let mut best_score = population.scores()[seed_index];
        let mut incumbent = population
            .member(seed_index)
            .map(<[Point3<f64>]>::to_vec)
            .unwrap_or_else(|| initial.to_vec());
        let mut best_iteration = 0;
        let mut history = Vec::with_capacity(config.n_iter.min(1 << 16));
        let mut stop_reason = StopReason::MaxIterations;
        let mut iterations = 0;

        if population.scores().iter().any(|s| s.is_nan()) {
            warn!("Objective returned NaN while scoring the initial population.");
            stop_reason = StopReason::InvalidScore { iteration: 0 };
        }
        info!(
            "Initial population of {} scored; best = {:.4}.",
            population.len(),
            best_score
        );

        if stop_reason == StopReason::MaxIterations {
            reporter.report(Progress::TaskStart {
                total_steps: config.n_iter as u64,
            });
            for k in 0..config.n_iter {
                if let Some(limit) = config.time_limit {
                    if started.elapsed() >= limit {
                        stop_reason = StopReason::TimeLimit;
                        break;
                    }
                }

                let drawn = index::sample(&mut rng, population.len(), 2 * config.partition_size)
                    .into_vec();
                let (left, right) = drawn.split_at(config.partition_size);
                let (Some(a), Some(b)) = (population.best_of(left), population.best_of(right))
                else {
                    stop_reason = StopReason::InvalidScore { iteration: k };
                    break;
                };

                let child = match (population.member(a), population.member(b)) {
                    (Some(pa), Some(pb)) => {
                        breed(pa, pb, config.mutation_rate, &mutation_noise, &mut rng)
                    }
                    _ => break,
                };
                let score = objective.evaluate(&child);
                if score.is_nan() {
                    warn!("Objective returned NaN at generation {}; stopping.", k);
                    stop_reason = StopReason::InvalidScore { iteration: k };
                    break;
                }

                if score > best_score {
                    best_score = score;
                    best_iteration = k;
                    incumbent.clone_from(&child);
                }
                if let Some(worst) = population.worst_index() {
                    population.replace(worst, child, score);
                }
                history.push(best_score);
                iterations = k + 1;
                reporter.report(Progress::TaskIncrement);

                if iterations % config.log_interval == 0 {
                    debug!("Generation {}: best score = {:.4}", iterations, best_score);
                    reporter.report(Progress::StatusUpdate {
                        text: format!("best {:.3}", best_score),
                    });
                }
                if k - best_iteration >= config.early_stopping {
                    stop_reason = StopReason::Stalled { best_iteration };
                    break;
                }
            }
            reporter.report(Progress::TaskFinish);
        }

        info!(
            "Genetic search finished after {} generation(s) ({}); best = {:.4}.",
            iterations, stop_reason, best_score
        );
        Ok(OptimizationResult {
            coords: incumbent,
            best_score,
            best_iteration,
            history,
            stop_reason,
            iterations,
        })
    }
}

fn noise_error(name: &'static str, error: NoiseError) -> EngineError {
    ConfigError::InvalidParameter {
        name,
        reason: error.to_string(),
    }
    .into()
}

fn evaluate_all<O>(members: &[Vec<Point3<f64>>], objective: &O) -> Vec<f64>
where
    O: Objective + ?Sized,
{
    #[cfg(not(feature = "parallel"))]
    let iterator = members.iter();
    #[cfg(feature = "parallel")]
    let iterator = members.par_iter();

    iterator.map(|coords| objective.evaluate(coords)).collect()
}

/// Uniform crossover followed by per-point mutation, into a fresh buffer.
fn breed<R: Rng>(
    a: &[Point3<f64>],
    b: &[Point3<f64>],
    mutation_rate: f64,
    noise: &PointNoise,
    rng: &mut R,
) -> Vec<Point3<f64>> {
    a.iter()
        .zip(b)
        .map(|(pa, pb)| {
            let p = if rng.gen_bool(0.5) { *pa } else { *pb };
            if rng.gen_bool(mutation_rate) {
                p + noise.sample(rng)
            } else {
                p
            }
        })
        .collect()
}
