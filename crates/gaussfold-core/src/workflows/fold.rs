use crate::core::corrector::{CorrectionReport, DeviationCorrector};
use crate::core::graph::ContactGraph;
use crate::core::graph::contact::DISTANCE_SCALE;
use crate::core::models::arena::PointArena;
use crate::core::models::labels::{SecondaryStructure, SolventAccessibility};
use crate::core::models::sequence::AminoAcid;
use crate::core::restraints::{ModelBuilder, ModelError, RestraintModel};
use crate::engine::config::FoldConfig;
use crate::engine::error::EngineError;
use crate::engine::genetic::GeneticOptimizer;
use crate::engine::polish::polish;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::OptimizationResult;
use crate::engine::utils::sampling::seeded_rng;
use nalgebra::{DMatrix, Point3};
use tracing::{info, instrument, warn};

/// Produces a first 3-D layout from a matrix of target distances.
pub trait Embedder {
    fn embed(&self, distances: &DMatrix<f64>) -> Result<Vec<Point3<f64>>, EngineError>;
}

/// A layout computed ahead of time, e.g. by an external MDS routine.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecomputedEmbedding {
    coords: Vec<Point3<f64>>,
}

impl PrecomputedEmbedding {
    pub fn new(coords: Vec<Point3<f64>>) -> Self {
        Self { coords }
    }
}

impl Embedder for PrecomputedEmbedding {
    fn embed(&self, distances: &DMatrix<f64>) -> Result<Vec<Point3<f64>>, EngineError> {
        if self.coords.len() != distances.nrows() {
            return Err(EngineError::Embedding(format!(
                "precomputed layout has {} points, the contact graph has {}",
                self.coords.len(),
                distances.nrows()
            )));
        }
        if self.coords.iter().any(|p| !p.coords.iter().all(|c| c.is_finite())) {
            return Err(EngineError::Embedding(
                "precomputed layout contains non-finite coordinates".to_string(),
            ));
        }
        Ok(self.coords.clone())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FoldInput<'a> {
    pub contact_map: &'a DMatrix<f64>,
    pub secondary_structure: &'a [SecondaryStructure],
    pub accessibility: Option<&'a [SolventAccessibility]>,
    pub sequence: Option<&'a [AminoAcid]>,
}

impl<'a> FoldInput<'a> {
    pub fn new(
        contact_map: &'a DMatrix<f64>,
        secondary_structure: &'a [SecondaryStructure],
    ) -> Self {
        Self {
            contact_map,
            secondary_structure,
            accessibility: None,
            sequence: None,
        }
    }

    pub fn accessibility(mut self, accessibility: &'a [SolventAccessibility]) -> Self {
        self.accessibility = Some(accessibility);
        self
    }

    pub fn sequence(mut self, sequence: &'a [AminoAcid]) -> Self {
        self.sequence = Some(sequence);
        self
    }
}

#[derive(Debug, Clone)]
pub struct FoldResult {
    /// One point per residue.
    pub coords: Vec<Point3<f64>>,
    /// Every modelled point, including a center-of-mass point if one was added.
    pub layout: Vec<Point3<f64>>,
    pub score: f64,
    pub search: OptimizationResult,
    pub polished: bool,
    pub correction: CorrectionReport,
    pub missing: Vec<bool>,
    pub forced_edges: Vec<(usize, usize)>,
    pub n_restraints: usize,
}

#[instrument(
    skip_all,
    name = "fold_workflow",
    fields(n_residues = input.secondary_structure.len())
)]
pub fn run<E>(
    input: &FoldInput,
    embedder: &E,
    config: &FoldConfig,
    reporter: &ProgressReporter,
) -> Result<FoldResult, EngineError>
where
    E: Embedder + ?Sized,
{
    config.validate()?;
    let n = input.contact_map.nrows();
    if let Some(sequence) = input.sequence {
        if sequence.len() != n {
            return Err(ModelError::LengthMismatch {
                what: "sequence",
                expected: n,
                actual: sequence.len(),
            }
            .into());
        }
    }

    // === Phase 1: Contact graph ===
    reporter.report(Progress::PhaseStart {
        name: "Contact Graph",
    });
    let mut graph = ContactGraph::from_contact_map(input.contact_map, &config.graph)?;
    let mut rng = seeded_rng(config.genetic.seed);
    let forced_edges = graph.apply_policy(config.graph.connectivity, &mut rng);
    if !forced_edges.is_empty() {
        warn!(
            "Added {} synthetic edge(s) to connect the contact graph.",
            forced_edges.len()
        );
    }
    info!(
        "Contact graph: {} residues, {} edges above threshold {:.4}.",
        graph.len(),
        graph.n_edges(),
        graph.threshold()
    );
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Initial embedding and local repair ===
    reporter.report(Progress::PhaseStart {
        name: "Embedding",
    });
    let initial = embedder.embed(&graph.scaled_distances(DISTANCE_SCALE))?;
    if initial.len() != n {
        return Err(EngineError::InvalidLayout(format!(
            "embedding returned {} points for {} residues",
            initial.len(),
            n
        )));
    }
    let correction = DeviationCorrector::new(config.corrector.clone()).fit_transform(&initial);
    reporter.report(Progress::PhaseFinish);

    // === Phase 3: Restraint model ===
    reporter.report(Progress::PhaseStart {
        name: "Restraint Model",
    });
    let (model, arena) = restraint_model(&graph, input, config)?;
    let layout = arena.expand_layout(&correction.coords).ok_or_else(|| {
        EngineError::InvalidLayout("corrected layout does not match the chain".to_string())
    })?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 4: Genetic search ===
    reporter.report(Progress::PhaseStart {
        name: "Genetic Search",
    });
    let search = GeneticOptimizer::new(config.genetic.clone()).run(&layout, &model, reporter)?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 5: Local polish (optional) ===
    let (layout, score, polished) = if config.polish.enabled {
        reporter.report(Progress::PhaseStart {
            name: "Local Polish",
        });
        let outcome = polish(&search.coords, search.best_score, &model, &config.polish)?;
        reporter.report(Progress::PhaseFinish);
        (outcome.coords, outcome.score, outcome.improved)
    } else {
        (search.coords.clone(), search.best_score, false)
    };

    let coords = arena.residue_coords(&layout).ok_or_else(|| {
        EngineError::InvalidLayout("optimized layout does not match the arena".to_string())
    })?;

    info!(
        "Fold complete: score = {:.4} ({} restraints, stop: {}).",
        score,
        model.n_restraints(),
        search.stop_reason
    );
    Ok(FoldResult {
        coords,
        layout,
        score,
        search,
        polished,
        correction,
        missing: graph.missing().to_vec(),
        forced_edges,
        n_restraints: model.n_restraints(),
    })
}

pub(crate) fn restraint_model(
    graph: &ContactGraph,
    input: &FoldInput,
    config: &FoldConfig,
) -> Result<(RestraintModel, PointArena), EngineError> {
    let mut arena = PointArena::for_chain(graph.len(), input.sequence);
    let mut builder = ModelBuilder::new(
        graph,
        input.secondary_structure,
        &config.table,
        &config.model,
    )
    .contact_map(input.contact_map);
    if let Some(accessibility) = input.accessibility {
        builder = builder.accessibility(accessibility);
    }
    let model = builder.build(&mut arena)?;
    Ok((model, arena))
}
