use nalgebra::DMatrix;
use rand::Rng;
use std::collections::VecDeque;
use thiserror::Error;
use tracing::{debug, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Graph distances above this hop count are statistically implausible.
pub const MAX_GRAPH_DISTANCE: u32 = 14;

/// Angstroms per graph hop, from distances observed at graph distance 1.
pub const DISTANCE_SCALE: f64 = 5.72;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum GraphError {
    #[error("Contact map must be square, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },
    #[error("Contact map is empty")]
    Empty,
    #[error("Contact density must be positive and finite, got {0}")]
    InvalidDensity(f64),
}

/// What to do with nodes that are unreachable from the main component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectivityPolicy {
    /// Keep the graph as thresholded; unreachable pairs stay flagged.
    #[default]
    LeaveMissing,
    /// Link every detached component to a random node of the main component.
    ForceEdges,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphConfig {
    /// Minimum sequence separation `j - i` for an entry to take part in the top-k vote.
    pub separation: usize,
    /// Number of contacts kept, as a multiple of the chain length.
    pub contact_density: f64,
    pub max_distance: u32,
    pub connectivity: ConnectivityPolicy,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            separation: 1,
            contact_density: 2.5,
            max_distance: MAX_GRAPH_DISTANCE,
            connectivity: ConnectivityPolicy::LeaveMissing,
        }
    }
}

/// Replaces NaN entries and the diagonal with zeros.
pub fn sanitize_contact_map(cmap: &DMatrix<f64>) -> DMatrix<f64> {
    let mut clean = cmap.map(|v| if v.is_nan() { 0.0 } else { v });
    clean.fill_diagonal(0.0);
    clean
}

/// Value at rank `round(density * n)` among the upper-triangle entries with
/// `j - i >= separation`. Entries strictly above it become contacts.
pub fn top_k_threshold(cmap: &DMatrix<f64>, separation: usize, density: f64) -> f64 {
    let n = cmap.nrows();
    let sep = separation.max(1);
    let mut proba: Vec<f64> = (0..n)
        .flat_map(|i| ((i + sep)..n).map(move |j| (i, j)))
        .map(|(i, j)| cmap[(i, j)])
        .collect();
    if proba.is_empty() {
        return f64::INFINITY;
    }
    proba.sort_by(f64::total_cmp);
    let n_top = ((density * n as f64).round() as usize).clamp(1, proba.len());
    proba[proba.len() - n_top]
}

/// Thresholded contact graph with capped all-pairs hop distances.
#[derive(Debug, Clone)]
pub struct ContactGraph {
    adjacency: DMatrix<bool>,
    distances: DMatrix<Option<u32>>,
    missing: Vec<bool>,
    threshold: f64,
    max_distance: u32,
}

impl ContactGraph {
    pub fn from_contact_map(cmap: &DMatrix<f64>, config: &GraphConfig) -> Result<Self, GraphError> {
        let (rows, cols) = cmap.shape();
        if rows != cols {
            return Err(GraphError::NotSquare { rows, cols });
        }
        if rows == 0 {
            return Err(GraphError::Empty);
        }
        if !(config.contact_density.is_finite() && config.contact_density > 0.0) {
            return Err(GraphError::InvalidDensity(config.contact_density));
        }

        let clean = sanitize_contact_map(cmap);
        let threshold = top_k_threshold(&clean, config.separation, config.contact_density);
        let adjacency = DMatrix::from_fn(rows, rows, |i, j| {
            i != j && (clean[(i, j)] > threshold || clean[(j, i)] > threshold)
        });
        debug!(
            "Contact threshold {:.4} selected {} edges over {} nodes.",
            threshold,
            count_edges(&adjacency),
            rows
        );
        Ok(Self::from_adjacency(adjacency, threshold, config.max_distance))
    }

    /// Builds a graph from an explicit symmetric adjacency matrix.
    pub fn from_adjacency(adjacency: DMatrix<bool>, threshold: f64, max_distance: u32) -> Self {
        let mut graph = Self {
            distances: DMatrix::from_element(adjacency.nrows(), adjacency.ncols(), None),
            missing: vec![false; adjacency.nrows()],
            adjacency,
            threshold,
            max_distance,
        };
        graph.recompute();
        graph
    }

    fn recompute(&mut self) {
        let n = self.adjacency.nrows();
        let neighbors = self.neighbor_lists();

        #[cfg(not(feature = "parallel"))]
        let sources = 0..n;

        #[cfg(feature = "parallel")]
        let sources = (0..n).into_par_iter();

        let rows: Vec<Vec<Option<u32>>> = sources
            .map(|source| bfs_hops(&neighbors, source))
            .collect();

        let cap = self.max_distance;
        self.distances = DMatrix::from_fn(n, n, |i, j| rows[i][j].map(|d| d.min(cap)));

        let components = self.components();
        self.missing = vec![false; n];
        if components.len() > 1 {
            for component in &components[1..] {
                for &node in component {
                    self.missing[node] = true;
                }
            }
            warn!(
                "Contact graph is disconnected: {} components, {} nodes outside the main one.",
                components.len(),
                self.missing.iter().filter(|&&m| m).count()
            );
        }
    }

    fn neighbor_lists(&self) -> Vec<Vec<usize>> {
        let n = self.adjacency.nrows();
        (0..n)
            .map(|i| (0..n).filter(|&j| j != i && self.adjacency[(i, j)]).collect())
            .collect()
    }

    /// Connected components, largest first. Ties keep the component holding
    /// the lowest node index first.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let n = self.adjacency.nrows();
        let mut seen = vec![false; n];
        let mut components = Vec::new();
        for start in 0..n {
            if seen[start] {
                continue;
            }
            let members: Vec<usize> = (0..n)
                .filter(|&j| self.distances[(start, j)].is_some())
                .collect();
            for &m in &members {
                seen[m] = true;
            }
            components.push(members);
        }
        components.sort_by(|a, b| b.len().cmp(&a.len()));
        components
    }

    /// Links each detached component to a random node of the main component
    /// and recomputes distances. Returns the synthetic edges that were added.
    pub fn force_connectivity<R: Rng>(&mut self, rng: &mut R) -> Vec<(usize, usize)> {
        let components = self.components();
        if components.len() <= 1 {
            return Vec::new();
        }
        let main = &components[0];
        let mut added = Vec::with_capacity(components.len() - 1);
        for component in &components[1..] {
            let unreached = component[0];
            let reached = main[rng.gen_range(0..main.len())];
            self.adjacency[(unreached, reached)] = true;
            self.adjacency[(reached, unreached)] = true;
            added.push((unreached, reached));
        }
        debug!("Forced connectivity with {} synthetic edges.", added.len());
        self.recompute();
        added
    }

    pub fn apply_policy<R: Rng>(
        &mut self,
        policy: ConnectivityPolicy,
        rng: &mut R,
    ) -> Vec<(usize, usize)> {
        match policy {
            ConnectivityPolicy::LeaveMissing => Vec::new(),
            ConnectivityPolicy::ForceEdges => self.force_connectivity(rng),
        }
    }

    pub fn len(&self) -> usize {
        self.adjacency.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.nrows() == 0
    }

    pub fn adjacency(&self) -> &DMatrix<bool> {
        &self.adjacency
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn max_distance(&self) -> u32 {
        self.max_distance
    }

    pub fn n_edges(&self) -> usize {
        count_edges(&self.adjacency)
    }

    /// Capped hop count, or `None` when `j` is unreachable from `i`.
    pub fn distance(&self, i: usize, j: usize) -> Option<u32> {
        self.distances.get((i, j)).copied().flatten()
    }

    /// Per-node flag: true for nodes outside the main connected component.
    pub fn missing(&self) -> &[bool] {
        &self.missing
    }

    pub fn is_connected(&self) -> bool {
        !self.missing.iter().any(|&m| m)
    }

    /// Hop distances with unreachable pairs reported at the cap.
    pub fn distance_matrix(&self) -> DMatrix<u32> {
        let cap = self.max_distance;
        self.distances.map(|d| d.unwrap_or(cap))
    }

    /// Metric distances handed to the embedding step.
    pub fn scaled_distances(&self, scale: f64) -> DMatrix<f64> {
        self.distance_matrix().map(|d| d as f64 * scale)
    }

    /// Restraint weights: 1 everywhere except rows and columns of missing nodes.
    pub fn weights(&self) -> DMatrix<f64> {
        let n = self.len();
        DMatrix::from_fn(n, n, |i, j| {
            if self.missing[i] || self.missing[j] { 0.0 } else { 1.0 }
        })
    }
}

fn count_edges(adjacency: &DMatrix<bool>) -> usize {
    let n = adjacency.nrows();
    (0..n)
        .map(|i| ((i + 1)..n).filter(|&j| adjacency[(i, j)]).count())
        .sum()
}

fn bfs_hops(neighbors: &[Vec<usize>], source: usize) -> Vec<Option<u32>> {
    let mut hops = vec![None; neighbors.len()];
    hops[source] = Some(0);
    let mut queue = VecDeque::from([source]);
    while let Some(node) = queue.pop_front() {
        let next = hops[node].unwrap_or(0) + 1;
        for &nb in &neighbors[node] {
            if hops[nb].is_none() {
                hops[nb] = Some(next);
                queue.push_back(nb);
            }
        }
    }
    hops
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn random_symmetric_map(n: usize, seed: u64) -> DMatrix<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut m = DMatrix::zeros(n, n);
        for i in 0..n {
            for j in (i + 1)..n {
                let v: f64 = rng.r#gen();
                m[(i, j)] = v;
                m[(j, i)] = v;
            }
        }
        m
    }

    fn path_map(n: usize) -> DMatrix<f64> {
        DMatrix::from_fn(n, n, |i, j| if i.abs_diff(j) == 1 { 0.9 } else { 0.1 })
    }

    #[test]
    fn rejects_non_square_and_empty_maps() {
        let config = GraphConfig::default();
        assert_eq!(
            ContactGraph::from_contact_map(&DMatrix::zeros(2, 3), &config).unwrap_err(),
            GraphError::NotSquare { rows: 2, cols: 3 }
        );
        assert_eq!(
            ContactGraph::from_contact_map(&DMatrix::zeros(0, 0), &config).unwrap_err(),
            GraphError::Empty
        );
    }

    #[test]
    fn rejects_non_positive_density() {
        let config = GraphConfig {
            contact_density: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            ContactGraph::from_contact_map(&path_map(4), &config),
            Err(GraphError::InvalidDensity(_))
        ));
    }

    #[test]
    fn sanitize_replaces_nan_and_diagonal() {
        let mut m = DMatrix::from_element(3, 3, 0.5);
        m[(0, 2)] = f64::NAN;
        let clean = sanitize_contact_map(&m);
        assert_eq!(clean[(0, 2)], 0.0);
        assert_eq!(clean[(1, 1)], 0.0);
        assert_eq!(clean[(0, 1)], 0.5);
    }

    #[test]
    fn threshold_selects_requested_number_of_contacts() {
        let n = 20;
        let cmap = random_symmetric_map(n, 3);
        for density in [2.5, 4.5] {
            let config = GraphConfig {
                contact_density: density,
                ..Default::default()
            };
            let graph = ContactGraph::from_contact_map(&cmap, &config).unwrap();
            // Entries strictly above the value at rank n_top: exactly n_top - 1 survive
            // when all values are distinct.
            let n_top = (density * n as f64).round() as usize;
            assert_eq!(graph.n_edges(), n_top - 1);
        }
    }

    #[test]
    fn higher_density_never_removes_edges() {
        let cmap = random_symmetric_map(25, 11);
        let sparse = ContactGraph::from_contact_map(
            &cmap,
            &GraphConfig {
                contact_density: 2.5,
                ..Default::default()
            },
        )
        .unwrap();
        let dense = ContactGraph::from_contact_map(
            &cmap,
            &GraphConfig {
                contact_density: 4.5,
                ..Default::default()
            },
        )
        .unwrap();
        for i in 0..25 {
            for j in 0..25 {
                if sparse.adjacency()[(i, j)] {
                    assert!(dense.adjacency()[(i, j)]);
                }
            }
        }
    }

    #[test]
    fn distances_are_symmetric_with_zero_diagonal_and_triangle_inequality() {
        let n = 30;
        let graph = ContactGraph::from_contact_map(
            &random_symmetric_map(n, 7),
            &GraphConfig {
                contact_density: 4.5,
                ..Default::default()
            },
        )
        .unwrap();
        for i in 0..n {
            assert_eq!(graph.distance(i, i), Some(0));
            for j in 0..n {
                assert_eq!(graph.distance(i, j), graph.distance(j, i));
                for k in 0..n {
                    if let (Some(ij), Some(jk), Some(ik)) =
                        (graph.distance(i, j), graph.distance(j, k), graph.distance(i, k))
                    {
                        assert!(ik <= ij + jk);
                    }
                }
            }
        }
    }

    #[test]
    fn distances_are_capped() {
        let n = 20;
        let config = GraphConfig {
            contact_density: 1.0,
            ..Default::default()
        };
        let graph = ContactGraph::from_contact_map(&path_map(n), &config).unwrap();
        assert!(graph.is_connected());
        assert_eq!(graph.distance(0, 5), Some(5));
        assert_eq!(graph.distance(0, n - 1), Some(MAX_GRAPH_DISTANCE));
    }

    fn two_islands() -> ContactGraph {
        // 0-1-2 and 3-4, plus isolated node 5.
        let mut adjacency = DMatrix::from_element(6, 6, false);
        for (i, j) in [(0, 1), (1, 2), (3, 4)] {
            adjacency[(i, j)] = true;
            adjacency[(j, i)] = true;
        }
        ContactGraph::from_adjacency(adjacency, 0.5, MAX_GRAPH_DISTANCE)
    }

    #[test]
    fn disconnected_nodes_are_flagged_and_zero_weighted() {
        let graph = two_islands();
        assert!(!graph.is_connected());
        assert_eq!(graph.missing(), &[false, false, false, true, true, true]);
        assert_eq!(graph.distance(0, 3), None);
        assert_eq!(graph.distance(3, 4), Some(1));

        let weights = graph.weights();
        assert_eq!(weights[(0, 2)], 1.0);
        assert_eq!(weights[(0, 4)], 0.0);
        assert_eq!(weights[(5, 1)], 0.0);
    }

    #[test]
    fn leave_missing_policy_keeps_graph_unchanged() {
        let mut graph = two_islands();
        let mut rng = StdRng::seed_from_u64(0);
        let added = graph.apply_policy(ConnectivityPolicy::LeaveMissing, &mut rng);
        assert!(added.is_empty());
        assert!(!graph.is_connected());
        assert_eq!(graph.distance_matrix()[(0, 5)], MAX_GRAPH_DISTANCE);
    }

    #[test]
    fn force_edges_policy_connects_every_component() {
        let mut graph = two_islands();
        let mut rng = StdRng::seed_from_u64(42);
        let added = graph.apply_policy(ConnectivityPolicy::ForceEdges, &mut rng);
        assert_eq!(added.len(), 2);
        for &(unreached, reached) in &added {
            assert!(unreached >= 3);
            assert!(reached <= 2);
        }
        assert!(graph.is_connected());
        assert!(graph.weights().iter().all(|&w| w == 1.0));
        for i in 0..6 {
            for j in 0..6 {
                assert!(graph.distance(i, j).is_some());
            }
        }
    }

    #[test]
    fn scaled_distances_multiply_hops() {
        let graph = two_islands();
        let scaled = graph.scaled_distances(DISTANCE_SCALE);
        assert!((scaled[(0, 2)] - 2.0 * DISTANCE_SCALE).abs() < 1e-12);
        assert!((scaled[(0, 3)] - MAX_GRAPH_DISTANCE as f64 * DISTANCE_SCALE).abs() < 1e-12);
    }
}
