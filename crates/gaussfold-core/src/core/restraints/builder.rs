use super::kind::{Restraint, RestraintKind};
use super::model::{ModelError, RestraintModel};
use super::table::{GaussianParams, RestraintTable};
use crate::core::graph::ContactGraph;
use crate::core::models::arena::PointArena;
use crate::core::models::ids::PointId;
use crate::core::models::labels::{SecondaryStructure, SolventAccessibility, segment_ids};
use nalgebra::DMatrix;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// Pairs must be more than this many positions apart to receive repulsion
    /// and plain contact restraints.
    pub separation: usize,
    /// Cysteine pairs below this contact probability are never bonded.
    pub min_disulfide_probability: f64,
    /// Push exposed residues away from the center of mass.
    pub exterior_restraints: bool,
    /// Use the contact graph's confidence weights for weighted distributions.
    pub use_weights: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            separation: 1,
            min_disulfide_probability: 0.0,
            exterior_restraints: false,
            use_weights: true,
        }
    }
}

/// Derives the restraint set of a chain from its contact graph and labels.
///
/// Restraints are emitted in a fixed order and later ones overwrite earlier
/// ones on the same pair: repulsion, burial, disulfide bonds, backbone
/// adjacency, contacts, local secondary structure, paired contacts.
pub struct ModelBuilder<'a> {
    graph: &'a ContactGraph,
    labels: &'a [SecondaryStructure],
    table: &'a RestraintTable,
    config: &'a ModelConfig,
    accessibility: Option<&'a [SolventAccessibility]>,
    contact_map: Option<&'a DMatrix<f64>>,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(
        graph: &'a ContactGraph,
        labels: &'a [SecondaryStructure],
        table: &'a RestraintTable,
        config: &'a ModelConfig,
    ) -> Self {
        Self {
            graph,
            labels,
            table,
            config,
            accessibility: None,
            contact_map: None,
        }
    }

    pub fn accessibility(mut self, accessibility: &'a [SolventAccessibility]) -> Self {
        self.accessibility = Some(accessibility);
        self
    }

    /// Contact probabilities, used to pick disulfide partners.
    pub fn contact_map(mut self, contact_map: &'a DMatrix<f64>) -> Self {
        self.contact_map = Some(contact_map);
        self
    }

    fn check_lengths(&self, n: usize) -> Result<(), ModelError> {
        let lengths = [
            ("secondary structure", Some(self.labels.len())),
            ("contact graph", Some(self.graph.len())),
            ("solvent accessibility", self.accessibility.map(<[_]>::len)),
        ];
        for (what, actual) in lengths {
            if let Some(actual) = actual {
                if actual != n {
                    return Err(ModelError::LengthMismatch {
                        what,
                        expected: n,
                        actual,
                    });
                }
            }
        }
        if let Some(cmap) = self.contact_map {
            if cmap.nrows() != n || cmap.ncols() != n {
                return Err(ModelError::DimensionMismatch {
                    what: "contact map",
                    expected: n,
                    rows: cmap.nrows(),
                    cols: cmap.ncols(),
                });
            }
        }
        Ok(())
    }

    /// Emits the ordered restraint list. Adds a center-of-mass point to the
    /// arena when burial restraints need one.
    pub fn restraints(&self, arena: &mut PointArena) -> Result<Vec<Restraint>, ModelError> {
        let n = arena.n_residues();
        self.check_lengths(n)?;

        let needs_com = self.accessibility.is_some_and(|acc| {
            acc.iter().any(|a| match a {
                SolventAccessibility::Buried => true,
                SolventAccessibility::Exposed => self.config.exterior_restraints,
                SolventAccessibility::Medium => false,
            })
        });
        let com = needs_com.then(|| arena.add_center_of_mass());

        let ids: Vec<PointId> = (0..n).filter_map(|i| arena.residue(i)).collect();
        let weights = if self.config.use_weights {
            self.graph.weights()
        } else {
            DMatrix::from_element(n, n, 1.0)
        };
        let weight_of = |params: Option<GaussianParams>, i: usize, j: usize| match params {
            Some(p) if p.weighted => weights[(i, j)],
            _ => 1.0,
        };
        let segments = segment_ids(self.labels);
        let sep = self.config.separation;
        let mut out = Vec::new();

        for i in 0..n {
            for j in 0..i.saturating_sub(sep) {
                out.push(Restraint::new(ids[i], ids[j], RestraintKind::Repulsion));
            }
        }

        if let (Some(acc), Some(com)) = (self.accessibility, com) {
            for (i, a) in acc.iter().enumerate() {
                match a {
                    SolventAccessibility::Buried => {
                        out.push(Restraint::new(ids[i], com, RestraintKind::Interior));
                    }
                    SolventAccessibility::Exposed if self.config.exterior_restraints => {
                        out.push(Restraint::new(ids[i], com, RestraintKind::Exterior));
                    }
                    _ => {}
                }
            }
        }

        if let Some(cmap) = self.contact_map {
            let cysteines: Vec<usize> = arena.cysteines().collect();
            for (i, j) in
                disulfide_pairs(&cysteines, cmap, self.config.min_disulfide_probability)
            {
                debug!("Disulfide bond between residues {} and {}.", i, j);
                out.push(Restraint::new(ids[i], ids[j], RestraintKind::DisulfideBond));
            }
        }

        for separation in 1..=3 {
            for i in 0..n.saturating_sub(separation) {
                out.push(Restraint::new(
                    ids[i],
                    ids[i + separation],
                    RestraintKind::Adjacent { separation },
                ));
            }
        }

        for i in 0..n {
            for j in 0..i.saturating_sub(sep) {
                if self.graph.distance(i, j) == Some(1) {
                    out.push(Restraint::new(ids[i], ids[j], RestraintKind::Contact));
                }
            }
        }

        for i in 0..n {
            for j in 0..i {
                if segments[i] != segments[j] {
                    continue;
                }
                let kind = RestraintKind::SecondaryStructure {
                    label: self.labels[i],
                    separation: i - j,
                };
                let params = kind.params(self.table);
                if params.is_some() {
                    let weight = weight_of(params, i, j);
                    out.push(Restraint::new(ids[i], ids[j], kind).with_weight(weight));
                }
            }
        }

        for i in 0..n {
            for j in 0..i {
                let in_contact = self.graph.distance(i, j) == Some(1);
                if !in_contact || i - j < self.table.min_paired_separation {
                    continue;
                }
                let (a, b) = (self.labels[j], self.labels[i]);
                let same_segment = segments[i] == segments[j];
                let both_strands =
                    a == SecondaryStructure::Strand && b == SecondaryStructure::Strand;
                if both_strands && !same_segment {
                    continue;
                }
                let kind = RestraintKind::PairedContact { a, b };
                let params = kind.params(self.table);
                if params.is_some() {
                    let weight = weight_of(params, i, j);
                    out.push(Restraint::new(ids[i], ids[j], kind).with_weight(weight));
                }
            }
        }

        Ok(out)
    }

    pub fn build(&self, arena: &mut PointArena) -> Result<RestraintModel, ModelError> {
        let restraints = self.restraints(arena)?;
        let model = assemble_model(arena.len(), &restraints, self.table)?;

        let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
        for r in &restraints {
            *counts.entry(kind_group(&r.kind)).or_default() += 1;
        }
        debug!(
            "Restraint model over {} points: {} restraints emitted, {} active pairs ({:?}).",
            arena.len(),
            restraints.len(),
            model.n_restraints(),
            counts
        );
        Ok(model)
    }
}

fn kind_group(kind: &RestraintKind) -> &'static str {
    match kind {
        RestraintKind::Adjacent { .. } => "adjacent",
        RestraintKind::Distance { .. } => "distance",
        RestraintKind::Contact => "contact",
        RestraintKind::SecondaryStructure { .. } => "local",
        RestraintKind::PairedContact { .. } => "paired",
        RestraintKind::DisulfideBond => "disulfide",
        RestraintKind::Interior => "interior",
        RestraintKind::Exterior => "exterior",
        RestraintKind::Repulsion => "repulsion",
    }
}

/// Writes an ordered restraint list into a model over `n_points` points.
pub fn assemble_model(
    n_points: usize,
    restraints: &[Restraint],
    table: &RestraintTable,
) -> Result<RestraintModel, ModelError> {
    let mut model = RestraintModel::new(n_points);
    for r in restraints {
        let (i, j) = (r.i.index(), r.j.index());
        let params = r
            .kind
            .params(table)
            .ok_or_else(|| ModelError::UnsupportedRestraint {
                kind: r.kind.to_string(),
                i,
                j,
            })?;
        model.add_restraint(i, j, params.mu, params.sigma, r.weight)?;
    }
    Ok(model)
}

/// Greedy pairing: repeatedly bonds the two unpaired cysteines with the
/// highest contact probability.
pub fn disulfide_pairs(
    cysteines: &[usize],
    contact_map: &DMatrix<f64>,
    min_probability: f64,
) -> Vec<(usize, usize)> {
    let mut candidates: Vec<(usize, usize, f64)> = Vec::new();
    for (a, &i) in cysteines.iter().enumerate() {
        for &j in &cysteines[a + 1..] {
            let p = contact_map[(i, j)];
            if !p.is_nan() && p >= min_probability {
                candidates.push((i.min(j), i.max(j), p));
            }
        }
    }
    candidates.sort_by(|x, y| y.2.total_cmp(&x.2));

    let mut paired = vec![false; contact_map.nrows()];
    let mut bonds = Vec::new();
    for (i, j, _) in candidates {
        if !paired[i] && !paired[j] {
            paired[i] = true;
            paired[j] = true;
            bonds.push((i, j));
        }
    }
    bonds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::contact::MAX_GRAPH_DISTANCE;
    use crate::core::models::sequence::AminoAcid;
    use SecondaryStructure::*;

    fn graph_with_edges(n: usize, edges: &[(usize, usize)]) -> ContactGraph {
        let mut adjacency = DMatrix::from_element(n, n, false);
        for &(i, j) in edges {
            adjacency[(i, j)] = true;
            adjacency[(j, i)] = true;
        }
        ContactGraph::from_adjacency(adjacency, 0.5, MAX_GRAPH_DISTANCE)
    }

    fn chain_edges(n: usize) -> Vec<(usize, usize)> {
        (0..n - 1).map(|i| (i, i + 1)).collect()
    }

    #[test]
    fn backbone_adjacency_covers_separations_one_to_three() {
        let n = 6;
        let graph = graph_with_edges(n, &chain_edges(n));
        let labels = vec![Coil; n];
        let (table, config) = (RestraintTable::default(), ModelConfig::default());
        let mut arena = PointArena::for_chain(n, None);
        let restraints = ModelBuilder::new(&graph, &labels, &table, &config)
            .restraints(&mut arena)
            .unwrap();
        let count = |sep: usize| {
            restraints
                .iter()
                .filter(|r| r.kind == RestraintKind::Adjacent { separation: sep })
                .count()
        };
        assert_eq!((count(1), count(2), count(3)), (5, 4, 3));

        let model = ModelBuilder::new(&graph, &labels, &table, &config)
            .build(&mut PointArena::for_chain(n, None))
            .unwrap();
        assert_eq!(model.restraint(0, 1).unwrap().0, 3.81);
        assert_eq!(model.restraint(0, 3).unwrap().0, 7.00);
        // Separation above 3 falls back to repulsion.
        assert_eq!(model.restraint(0, 5).unwrap().0, 20.0);
    }

    #[test]
    fn local_helix_rule_overwrites_adjacency_and_contact() {
        let n = 8;
        let mut edges = chain_edges(n);
        edges.push((0, 2));
        let graph = graph_with_edges(n, &edges);
        let labels = vec![Helix; n];
        let (table, config) = (RestraintTable::default(), ModelConfig::default());
        let model = ModelBuilder::new(&graph, &labels, &table, &config)
            .build(&mut PointArena::for_chain(n, None))
            .unwrap();
        assert_eq!(model.restraint(0, 2), Some((5.48, 0.14, 1.0)));
        assert_eq!(model.restraint(0, 5).unwrap().0, 8.75);
        // Separation 1 has no helix rule and keeps the backbone distance.
        assert_eq!(model.restraint(3, 4).unwrap().0, 3.81);
    }

    #[test]
    fn local_rules_stay_inside_one_segment() {
        let n = 6;
        let graph = graph_with_edges(n, &chain_edges(n));
        let labels = vec![Helix, Helix, Helix, Strand, Strand, Strand];
        let (table, config) = (RestraintTable::default(), ModelConfig::default());
        let model = ModelBuilder::new(&graph, &labels, &table, &config)
            .build(&mut PointArena::for_chain(n, None))
            .unwrap();
        assert_eq!(model.restraint(0, 2).unwrap().0, 5.48);
        assert_eq!(model.restraint(3, 5).unwrap().0, 6.74);
        // Crosses the helix/strand boundary: backbone value only.
        assert_eq!(model.restraint(1, 3).unwrap().0, 5.20);
    }

    #[test]
    fn plain_contacts_respect_separation() {
        let n = 10;
        let mut edges = chain_edges(n);
        edges.push((1, 8));
        let graph = graph_with_edges(n, &edges);
        let labels = vec![Coil; n];
        let table = RestraintTable::default();
        let config = ModelConfig {
            separation: 2,
            ..Default::default()
        };
        let model = ModelBuilder::new(&graph, &labels, &table, &config)
            .build(&mut PointArena::for_chain(n, None))
            .unwrap();
        assert_eq!(model.restraint(1, 8).unwrap().0, 3.82);
        assert_eq!(model.restraint(0, 2), Some((5.20, 0.55, 1.0)));
        // 0 and 3 are 3 apart (> 2): repulsion, overwritten by adjacency.
        assert_eq!(model.restraint(0, 3).unwrap().0, 7.00);
    }

    #[test]
    fn paired_contacts_use_label_combination() {
        let n = 12;
        let mut edges = chain_edges(n);
        edges.push((1, 9));
        edges.push((2, 7));
        let graph = graph_with_edges(n, &edges);
        let mut labels = vec![Coil; n];
        labels[1] = Helix;
        labels[9] = Strand;
        labels[2] = Strand;
        labels[7] = Coil;
        let (table, config) = (RestraintTable::default(), ModelConfig::default());
        let model = ModelBuilder::new(&graph, &labels, &table, &config)
            .build(&mut PointArena::for_chain(n, None))
            .unwrap();
        assert_eq!(model.restraint(1, 9).unwrap().0, 6.05);
        assert_eq!(model.restraint(2, 7).unwrap().0, 6.44);
    }

    #[test]
    fn strand_pairs_need_a_shared_segment() {
        let n = 12;
        let mut edges = chain_edges(n);
        edges.push((1, 10));
        edges.push((4, 9));
        let graph = graph_with_edges(n, &edges);
        let mut labels = vec![Strand; n];
        labels[5] = Coil;
        let (table, config) = (RestraintTable::default(), ModelConfig::default());
        let model = ModelBuilder::new(&graph, &labels, &table, &config)
            .build(&mut PointArena::for_chain(n, None))
            .unwrap();
        // 6..=11 is one segment: 4 and 9 are in different segments.
        assert_eq!(model.restraint(4, 9).unwrap().0, 3.82);
        // Same labels, different segments as well.
        assert_eq!(model.restraint(1, 10).unwrap().0, 3.82);

        let labels = vec![Strand; n];
        let model = ModelBuilder::new(&graph, &labels, &table, &config)
            .build(&mut PointArena::for_chain(n, None))
            .unwrap();
        assert_eq!(model.restraint(1, 10).unwrap().0, 4.54);
    }

    #[test]
    fn buried_residues_are_tied_to_the_center_of_mass() {
        let n = 5;
        let graph = graph_with_edges(n, &chain_edges(n));
        let labels = vec![Coil; n];
        let acc = vec![
            SolventAccessibility::Buried,
            SolventAccessibility::Exposed,
            SolventAccessibility::Medium,
            SolventAccessibility::Buried,
            SolventAccessibility::Exposed,
        ];
        let (table, config) = (RestraintTable::default(), ModelConfig::default());
        let mut arena = PointArena::for_chain(n, None);
        let model = ModelBuilder::new(&graph, &labels, &table, &config)
            .accessibility(&acc)
            .build(&mut arena)
            .unwrap();
        let com = arena.center_of_mass().unwrap().index();
        assert_eq!(model.len(), n + 1);
        assert_eq!(model.restraint(0, com).unwrap().0, 5.0);
        assert_eq!(model.restraint(3, com).unwrap().0, 5.0);
        assert!(model.restraint(1, com).is_none());

        let config = ModelConfig {
            exterior_restraints: true,
            ..Default::default()
        };
        let mut arena = PointArena::for_chain(n, None);
        let model = ModelBuilder::new(&graph, &labels, &table, &config)
            .accessibility(&acc)
            .build(&mut arena)
            .unwrap();
        let com = arena.center_of_mass().unwrap().index();
        assert_eq!(model.restraint(4, com).unwrap().0, 12.5);
    }

    #[test]
    fn all_medium_accessibility_adds_no_dummy_point() {
        let n = 4;
        let graph = graph_with_edges(n, &chain_edges(n));
        let labels = vec![Coil; n];
        let acc = vec![SolventAccessibility::Medium; n];
        let (table, config) = (RestraintTable::default(), ModelConfig::default());
        let mut arena = PointArena::for_chain(n, None);
        ModelBuilder::new(&graph, &labels, &table, &config)
            .accessibility(&acc)
            .build(&mut arena)
            .unwrap();
        assert!(arena.center_of_mass().is_none());
    }

    #[test]
    fn disulfide_pairing_is_greedy_by_probability() {
        let mut cmap = DMatrix::zeros(10, 10);
        let mut set = |i: usize, j: usize, p: f64| {
            cmap[(i, j)] = p;
            cmap[(j, i)] = p;
        };
        set(0, 3, 0.6);
        set(3, 7, 0.9);
        set(0, 9, 0.5);
        set(7, 9, 0.8);
        let bonds = disulfide_pairs(&[0, 3, 7, 9], &cmap, 0.0);
        assert_eq!(bonds, vec![(3, 7), (0, 9)]);

        let bonds = disulfide_pairs(&[0, 3, 7, 9], &cmap, 0.55);
        assert_eq!(bonds, vec![(3, 7)]);
        assert!(disulfide_pairs(&[4], &cmap, 0.0).is_empty());
    }

    #[test]
    fn disulfide_restraints_come_from_the_sequence() {
        let seq = AminoAcid::parse_sequence("ACAAAAAACA").unwrap();
        let n = seq.len();
        let graph = graph_with_edges(n, &chain_edges(n));
        let labels = vec![Coil; n];
        let mut cmap = DMatrix::zeros(n, n);
        cmap[(1, 8)] = 0.7;
        cmap[(8, 1)] = 0.7;
        let (table, config) = (RestraintTable::default(), ModelConfig::default());
        let model = ModelBuilder::new(&graph, &labels, &table, &config)
            .contact_map(&cmap)
            .build(&mut PointArena::for_chain(n, Some(&seq)))
            .unwrap();
        assert_eq!(model.restraint(1, 8), Some((5.50, 0.45, 1.0)));
    }

    #[test]
    fn missing_nodes_zero_weighted_restraints_only() {
        let n = 6;
        // Node 5 is isolated.
        let graph = graph_with_edges(n, &chain_edges(5));
        let labels = vec![Helix; n];
        let (table, config) = (RestraintTable::default(), ModelConfig::default());
        let model = ModelBuilder::new(&graph, &labels, &table, &config)
            .build(&mut PointArena::for_chain(n, None))
            .unwrap();
        assert_eq!(model.restraint(2, 5).unwrap().2, 0.0);
        // Helix separation 5 is unweighted.
        assert_eq!(model.restraint(0, 5).unwrap().2, 1.0);
        assert_eq!(model.restraint(0, 2).unwrap().2, 1.0);

        let config = ModelConfig {
            use_weights: false,
            ..Default::default()
        };
        let model = ModelBuilder::new(&graph, &labels, &table, &config)
            .build(&mut PointArena::for_chain(n, None))
            .unwrap();
        assert_eq!(model.restraint(2, 5).unwrap().2, 1.0);
    }

    #[test]
    fn mismatched_label_length_is_rejected() {
        let graph = graph_with_edges(4, &chain_edges(4));
        let labels = vec![Coil; 3];
        let (table, config) = (RestraintTable::default(), ModelConfig::default());
        let err = ModelBuilder::new(&graph, &labels, &table, &config)
            .build(&mut PointArena::for_chain(4, None))
            .unwrap_err();
        assert_eq!(
            err,
            ModelError::LengthMismatch {
                what: "secondary structure",
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn unsupported_kind_fails_assembly() {
        let mut arena = PointArena::for_chain(6, None);
        let (a, b) = (arena.residue(0).unwrap(), arena.residue(5).unwrap());
        let _ = arena.add_center_of_mass();
        let restraints = [Restraint::new(a, b, RestraintKind::Adjacent { separation: 5 })];
        let err = assemble_model(arena.len(), &restraints, &RestraintTable::default()).unwrap_err();
        assert!(matches!(err, ModelError::UnsupportedRestraint { i: 0, j: 5, .. }));
    }
}
