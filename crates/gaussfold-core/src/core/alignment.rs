use crate::core::utils::geometry::{center, euler_angles, euler_rotation, kabsch_rotation};
use crate::core::utils::minimize::{NelderMeadOptions, nelder_mead_bounded};
use nalgebra::{DVector, Point3, Rotation3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use std::fmt;
use thiserror::Error;
use tracing::{debug, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum AlignError {
    #[error("Predicted layout has {predicted} points but the reference has {reference}")]
    LengthMismatch { predicted: usize, reference: usize },
    #[error("Reference has no observed points")]
    NoObservedPoints,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Template-modelling score in `[0, 1]`, maximized.
    TmScore,
    /// Root-mean-square deviation, minimized.
    Rmsd,
}

impl Metric {
    pub fn maximize(self) -> bool {
        matches!(self, Self::TmScore)
    }

    /// Score of two equally long layouts as they are, without superposition.
    pub fn evaluate(self, predicted: &[Point3<f64>], reference: &[Point3<f64>]) -> f64 {
        match self {
            Self::TmScore => tm_score_fixed(predicted, reference),
            Self::Rmsd => rmsd_fixed(predicted, reference),
        }
    }

    fn is_better(self, candidate: f64, incumbent: f64) -> bool {
        if self.maximize() {
            candidate > incumbent
        } else {
            candidate < incumbent
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TmScore => write!(f, "TM-score"),
            Self::Rmsd => write!(f, "RMSD"),
        }
    }
}

/// Distance scale of the TM-score for a chain of `length` points.
pub fn tm_d0(length: usize) -> f64 {
    1.24 * (length as f64 - 15.0).cbrt() - 1.8
}

pub fn tm_score_fixed(predicted: &[Point3<f64>], reference: &[Point3<f64>]) -> f64 {
    tm_score_with_d0(predicted, reference, tm_d0(predicted.len()))
}

/// TM-score with an explicit distance scale.
pub fn tm_score_with_d0(predicted: &[Point3<f64>], reference: &[Point3<f64>], d0: f64) -> f64 {
    let l = predicted.len();
    if l == 0 || l != reference.len() || d0 == 0.0 {
        return f64::NAN;
    }
    let sum: f64 = predicted
        .iter()
        .zip(reference.iter())
        .map(|(p, q)| {
            let r = (p - q).norm() / d0;
            1.0 / (1.0 + r * r)
        })
        .sum();
    sum / l as f64
}

pub fn rmsd_fixed(predicted: &[Point3<f64>], reference: &[Point3<f64>]) -> f64 {
    crate::core::utils::geometry::calculate_rmsd(predicted, reference).unwrap_or(f64::NAN)
}

/// Rigid transform with optional axis reflections: `p -> S (R p + t)`, where
/// `R = Rx(phi) Ry(psi) Rz(theta)` and `S` negates the flagged axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformParams {
    pub translation: Vector3<f64>,
    pub angles: [f64; 3],
    pub reflect: [bool; 3],
}

impl Default for TransformParams {
    fn default() -> Self {
        Self {
            translation: Vector3::zeros(),
            angles: [0.0; 3],
            reflect: [false; 3],
        }
    }
}

impl TransformParams {
    /// Reads `(tx, ty, tz, rx, ry, rz, swap_x, swap_y, swap_z)`; a swap flag is
    /// set when its value exceeds 0.5.
    pub fn from_array(x: [f64; 9]) -> Self {
        Self {
            translation: Vector3::new(x[0], x[1], x[2]),
            angles: [x[3], x[4], x[5]],
            reflect: [x[6] > 0.5, x[7] > 0.5, x[8] > 0.5],
        }
    }

    pub fn to_array(&self) -> [f64; 9] {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        [
            self.translation.x,
            self.translation.y,
            self.translation.z,
            self.angles[0],
            self.angles[1],
            self.angles[2],
            flag(self.reflect[0]),
            flag(self.reflect[1]),
            flag(self.reflect[2]),
        ]
    }

    pub fn rotation(&self) -> Rotation3<f64> {
        euler_rotation(self.angles[0], self.angles[1], self.angles[2])
    }

    pub fn apply(&self, coords: &[Point3<f64>]) -> Vec<Point3<f64>> {
        let rotation = self.rotation();
        coords
            .iter()
            .map(|p| reflect(&(rotation * p + self.translation), self.reflect))
            .collect()
    }
}

fn reflect(p: &Point3<f64>, flags: [bool; 3]) -> Point3<f64> {
    let mut q = *p;
    for axis in 0..3 {
        if flags[axis] {
            q[axis] = -q[axis];
        }
    }
    q
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlignerConfig {
    /// Random rotation starts per reflection branch.
    pub n_random_starts: usize,
    /// Also start every branch from the least-squares superposition.
    pub kabsch_seed: bool,
    pub seed: Option<u64>,
    pub translation_bound: f64,
    pub rotation_bound: f64,
    pub max_iterations: usize,
    /// Lower bound applied to the TM-score distance scale. Short chains get
    /// a tiny or negative scale without it.
    pub d0_floor: Option<f64>,
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            n_random_starts: 1,
            kabsch_seed: true,
            seed: None,
            translation_bound: 1000.0,
            rotation_bound: 2.0 * PI,
            max_iterations: 3000,
            d0_floor: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    pub metric: Metric,
    pub score: f64,
    pub params: TransformParams,
    /// Observed predicted points after centering and the best transform.
    pub coords: Vec<Point3<f64>>,
    /// Centered observed reference points the score was computed against.
    pub reference: Vec<Point3<f64>>,
}

/// Transform-invariant comparison of a predicted layout with a reference.
///
/// Both layouts are centered; then, for each of the eight axis-reflection
/// combinations, a bounded simplex search over translation and rotation
/// optimizes the metric. The best branch wins.
#[derive(Debug, Clone, Default)]
pub struct StructuralAligner {
    config: AlignerConfig,
}

impl StructuralAligner {
    pub fn new(config: AlignerConfig) -> Self {
        Self { config }
    }

    fn score(&self, metric: Metric, predicted: &[Point3<f64>], reference: &[Point3<f64>]) -> f64 {
        match (metric, self.config.d0_floor) {
            (Metric::TmScore, Some(floor)) => {
                let d0 = tm_d0(predicted.len()).max(floor);
                tm_score_with_d0(predicted, reference, d0)
            }
            _ => metric.evaluate(predicted, reference),
        }
    }

    #[instrument(skip_all, name = "structural_alignment", fields(metric = %metric))]
    pub fn align(
        &self,
        predicted: &[Point3<f64>],
        reference: &[Option<Point3<f64>>],
        metric: Metric,
    ) -> Result<Alignment, AlignError> {
        if predicted.len() != reference.len() {
            return Err(AlignError::LengthMismatch {
                predicted: predicted.len(),
                reference: reference.len(),
            });
        }
        let (observed_pred, observed_ref): (Vec<_>, Vec<_>) = predicted
            .iter()
            .zip(reference.iter())
            .filter_map(|(p, q)| q.as_ref().map(|q| (*p, *q)))
            .unzip();
        if observed_ref.is_empty() {
            return Err(AlignError::NoObservedPoints);
        }
        let p = center(&observed_pred);
        let q = center(&observed_ref);

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let bound = self.config.rotation_bound;
        let mut draw_angle = || {
            if bound > 0.0 {
                rng.gen_range(-bound..bound)
            } else {
                0.0
            }
        };
        let branches: Vec<([bool; 3], Vec<[f64; 3]>)> = (0..8u8)
            .map(|bits| {
                let flags = [bits & 4 != 0, bits & 2 != 0, bits & 1 != 0];
                let mut starts = Vec::with_capacity(self.config.n_random_starts + 1);
                if self.config.kabsch_seed {
                    let target: Vec<_> = q.iter().map(|x| reflect(x, flags)).collect();
                    if let Some(rotation) = kabsch_rotation(&p, &target) {
                        let (phi, psi, theta) = euler_angles(&rotation);
                        starts.push([phi, psi, theta]);
                    }
                }
                for _ in 0..self.config.n_random_starts {
                    starts.push([draw_angle(), draw_angle(), draw_angle()]);
                }
                if starts.is_empty() {
                    starts.push([0.0; 3]);
                }
                (flags, starts)
            })
            .collect();

        #[cfg(not(feature = "parallel"))]
        let iterator = branches.iter();

        #[cfg(feature = "parallel")]
        let iterator = branches.par_iter();

        let results: Vec<(f64, TransformParams)> = iterator
            .map(|(flags, starts)| self.optimize_branch(&p, &q, *flags, starts, metric))
            .collect();

        let (score, params) = results
            .into_iter()
            .reduce(|best, candidate| {
                if metric.is_better(candidate.0, best.0) || best.0.is_nan() {
                    candidate
                } else {
                    best
                }
            })
            .unwrap_or((f64::NAN, TransformParams::default()));

        debug!(
            "Best {} {:.4} with reflections {:?}.",
            metric, score, params.reflect
        );

        Ok(Alignment {
            metric,
            score,
            coords: params.apply(&p),
            params,
            reference: q,
        })
    }

    fn optimize_branch(
        &self,
        p: &[Point3<f64>],
        q: &[Point3<f64>],
        flags: [bool; 3],
        starts: &[[f64; 3]],
        metric: Metric,
    ) -> (f64, TransformParams) {
        let sign = if metric.maximize() { -1.0 } else { 1.0 };
        let t = self.config.translation_bound;
        let r = self.config.rotation_bound;
        let bounds = [(-t, t), (-t, t), (-t, t), (-r, r), (-r, r), (-r, r)];
        let steps = [1.0, 1.0, 1.0, 0.25, 0.25, 0.25];
        let options = NelderMeadOptions {
            max_iterations: self.config.max_iterations,
            ..Default::default()
        };
        let to_params = |x: &DVector<f64>| TransformParams {
            translation: Vector3::new(x[0], x[1], x[2]),
            angles: [x[3], x[4], x[5]],
            reflect: flags,
        };
        let objective = |x: &DVector<f64>| sign * self.score(metric, &to_params(x).apply(p), q);

        let mut best: Option<(f64, TransformParams)> = None;
        for angles in starts {
            let x0 = DVector::from_vec(vec![0.0, 0.0, 0.0, angles[0], angles[1], angles[2]]);
            let start_value = objective(&x0);
            let found = nelder_mead_bounded(&objective, &x0, &steps, &bounds, &options);
            let (value, x) = if found.value <= start_value || start_value.is_nan() {
                (found.value, found.x)
            } else {
                (start_value, x0)
            };
            let score = sign * value;
            if best.is_none_or(|(b, _)| metric.is_better(score, b)) {
                best = Some((score, to_params(&x)));
            }
        }
        best.unwrap_or((f64::NAN, TransformParams {
            reflect: flags,
            ..Default::default()
        }))
    }

    pub fn tm_score(
        &self,
        predicted: &[Point3<f64>],
        reference: &[Option<Point3<f64>>],
    ) -> Result<f64, AlignError> {
        self.align(predicted, reference, Metric::TmScore).map(|a| a.score)
    }

    pub fn rmsd(
        &self,
        predicted: &[Point3<f64>],
        reference: &[Option<Point3<f64>>],
    ) -> Result<f64, AlignError> {
        self.align(predicted, reference, Metric::Rmsd).map(|a| a.score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aligner(seed: u64) -> StructuralAligner {
        StructuralAligner::new(AlignerConfig {
            seed: Some(seed),
            ..Default::default()
        })
    }

    fn random_layout(n: usize, seed: u64) -> Vec<Point3<f64>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                Point3::new(
                    rng.gen_range(-10.0..10.0),
                    rng.gen_range(-10.0..10.0),
                    rng.gen_range(-10.0..10.0),
                )
            })
            .collect()
    }

    fn observed(coords: &[Point3<f64>]) -> Vec<Option<Point3<f64>>> {
        coords.iter().copied().map(Some).collect()
    }

    fn noisy(coords: &[Point3<f64>], scale: f64, seed: u64) -> Vec<Point3<f64>> {
        let mut rng = StdRng::seed_from_u64(seed);
        coords
            .iter()
            .map(|p| {
                p + Vector3::new(
                    rng.gen_range(-scale..scale),
                    rng.gen_range(-scale..scale),
                    rng.gen_range(-scale..scale),
                )
            })
            .collect()
    }

    fn rigid_with_reflection(coords: &[Point3<f64>]) -> Vec<Point3<f64>> {
        TransformParams {
            translation: Vector3::new(12.0, -3.0, 40.0),
            angles: [0.9, -2.1, 0.4],
            reflect: [false, true, false],
        }
        .apply(coords)
    }

    #[test]
    fn d0_follows_length_rule() {
        assert!((tm_d0(23) - (1.24 * 2.0 - 1.8)).abs() < 1e-12);
        assert!((tm_d0(19) - 0.16837730444056742).abs() < 1e-12);
        assert!(tm_d0(16) < 0.0);
    }

    #[test]
    fn short_chain_tm_score_uses_unfloored_scale() {
        let reference = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ];
        let predicted = vec![
            Point3::new(0.0, 0.1, 0.0),
            Point3::new(1.0, 0.1, 0.0),
            Point3::new(2.0, 0.1, 0.0),
        ];
        let d0 = tm_d0(3);
        let expected = 1.0 / (1.0 + (0.1 / d0).powi(2));
        assert!((tm_score_fixed(&predicted, &reference) - expected).abs() < 1e-12);
        assert!((tm_score_with_d0(&predicted, &reference, 0.5) - 1.0 / 1.04).abs() < 1e-12);
    }

    #[test]
    fn d0_floor_is_applied_only_when_configured() {
        let reference = random_layout(19, 21);
        let predicted = noisy(&reference, 0.3, 22);
        let plain = aligner(5).tm_score(&predicted, &observed(&reference)).unwrap();
        let floored = StructuralAligner::new(AlignerConfig {
            seed: Some(5),
            d0_floor: Some(0.5),
            ..AlignerConfig::default()
        })
        .tm_score(&predicted, &observed(&reference))
        .unwrap();
        assert!(floored > plain);
    }

    #[test]
    fn transform_params_round_trip_through_array() {
        let params = TransformParams {
            translation: Vector3::new(1.0, 2.0, 3.0),
            angles: [0.1, 0.2, 0.3],
            reflect: [true, false, true],
        };
        assert_eq!(TransformParams::from_array(params.to_array()), params);
        assert_eq!(
            TransformParams::from_array([0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.4, 0.6, 0.5]).reflect,
            [false, true, false]
        );
    }

    #[test]
    fn identical_layouts_score_perfectly() {
        let coords = random_layout(30, 1);
        let a = aligner(7);
        let tm = a.tm_score(&coords, &observed(&coords)).unwrap();
        let rmsd = a.rmsd(&coords, &observed(&coords)).unwrap();
        assert!((tm - 1.0).abs() < 1e-6);
        assert!(rmsd < 1e-6);
    }

    #[test]
    fn tm_score_of_transformed_copy_is_one() {
        let coords = random_layout(30, 2);
        let moved = rigid_with_reflection(&coords);
        let alignment = aligner(3).align(&moved, &observed(&coords), Metric::TmScore).unwrap();
        assert!((alignment.score - 1.0).abs() < 1e-6);
        for (p, q) in alignment.coords.iter().zip(alignment.reference.iter()) {
            assert!((p - q).norm() < 1e-4);
        }
    }

    #[test]
    fn rmsd_is_invariant_under_rigid_motion_and_reflection() {
        let reference = random_layout(25, 4);
        let predicted = noisy(&reference, 1.5, 5);
        let a = aligner(11);
        let before = a.rmsd(&predicted, &observed(&reference)).unwrap();
        let after = a
            .rmsd(&rigid_with_reflection(&predicted), &observed(&reference))
            .unwrap();
        assert!(before > 0.1);
        assert!((before - after).abs() < 1e-6);
    }

    #[test]
    fn tm_score_is_invariant_under_rigid_motion_and_reflection() {
        let reference = random_layout(40, 6);
        let predicted = noisy(&reference, 0.5, 8);
        let a = aligner(13);
        let before = a.tm_score(&predicted, &observed(&reference)).unwrap();
        let after = a
            .tm_score(&rigid_with_reflection(&predicted), &observed(&reference))
            .unwrap();
        assert!(before > 0.5 && before <= 1.0);
        assert!((before - after).abs() < 1e-3);
    }

    #[test]
    fn missing_reference_points_are_excluded() {
        let coords = random_layout(12, 9);
        let mut reference = observed(&coords);
        reference[3] = None;
        reference[7] = None;
        let mut predicted = coords.clone();
        predicted[3] = Point3::new(500.0, 0.0, 0.0);
        predicted[7] = Point3::new(0.0, -300.0, 0.0);

        let alignment = aligner(1).align(&predicted, &reference, Metric::Rmsd).unwrap();
        assert_eq!(alignment.coords.len(), 10);
        assert!(alignment.score < 1e-6);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let coords = random_layout(5, 10);
        let a = aligner(0);
        assert_eq!(
            a.align(&coords, &observed(&coords[..4]), Metric::Rmsd),
            Err(AlignError::LengthMismatch {
                predicted: 5,
                reference: 4
            })
        );
        assert_eq!(
            a.align(&coords, &[None; 5], Metric::TmScore),
            Err(AlignError::NoObservedPoints)
        );
    }

    #[test]
    fn seeded_alignment_is_reproducible() {
        let reference = random_layout(20, 12);
        let predicted = noisy(&reference, 2.0, 13);
        let config = AlignerConfig {
            seed: Some(99),
            kabsch_seed: false,
            n_random_starts: 2,
            ..Default::default()
        };
        let first = StructuralAligner::new(config.clone())
            .align(&predicted, &observed(&reference), Metric::TmScore)
            .unwrap();
        let second = StructuralAligner::new(config)
            .align(&predicted, &observed(&reference), Metric::TmScore)
            .unwrap();
        assert_eq!(first.score, second.score);
        assert_eq!(first.params, second.params);
    }
}
