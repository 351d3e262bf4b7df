use crate::core::utils::geometry::{any_perpendicular, frobenius_distance};
use crate::core::utils::minimize::minimize_scalar_bounded;
use nalgebra::Point3;
use tracing::{debug, trace, warn};

/// Average C-alpha to C-alpha distance between consecutive residues.
pub const CA_CA_DISTANCE: f64 = 3.82;

const LINE_SEARCH_TOLERANCE: f64 = 1e-9;

/// How a sweep treats a triple whose three points are (nearly) on a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollinearPolicy {
    /// Leave the middle point where it is.
    #[default]
    Skip,
    /// Move the middle point onto the perpendicular bisector of its neighbors.
    Bend,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorrectorConfig {
    pub target_distance: f64,
    /// A sweep moving the layout by less than this (Frobenius norm) ends the loop.
    pub tolerance: f64,
    pub max_sweeps: usize,
    pub collinear_policy: CollinearPolicy,
    /// Sine of the angle at the first point below which a triple counts as collinear.
    pub collinear_tolerance: f64,
}

impl Default for CorrectorConfig {
    fn default() -> Self {
        Self {
            target_distance: CA_CA_DISTANCE,
            tolerance: 1e-3,
            max_sweeps: 12,
            collinear_policy: CollinearPolicy::Skip,
            collinear_tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionReport {
    pub coords: Vec<Point3<f64>>,
    pub sweeps: usize,
    pub skipped_triples: usize,
    pub converged: bool,
}

/// Repairs consecutive-point distances in a layout.
///
/// Each sweep visits disjoint triples `(i - 1, i, i + 1)`, alternating between
/// odd and even `i`. The middle point of a triple slides along the parabola
/// through the three points (in their plane) to the position that best
/// matches the target distance to both neighbors.
#[derive(Debug, Clone, Default)]
pub struct DeviationCorrector {
    config: CorrectorConfig,
}

impl DeviationCorrector {
    pub fn new(config: CorrectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CorrectorConfig {
        &self.config
    }

    fn is_collinear(&self, p1: &Point3<f64>, p2: &Point3<f64>, p3: &Point3<f64>) -> bool {
        let a = p2 - p1;
        let b = p3 - p1;
        let scale = a.norm() * b.norm();
        scale == 0.0 || a.cross(&b).norm() <= self.config.collinear_tolerance * scale
    }

    /// New position of `p2`. Returns `None` for degenerate input (coincident
    /// endpoints, or a parabola that cannot be fitted).
    pub fn correct_triple(
        &self,
        p1: &Point3<f64>,
        p2: &Point3<f64>,
        p3: &Point3<f64>,
    ) -> Option<Point3<f64>> {
        let target = self.config.target_distance;
        let chord = p3 - p1;
        let span = chord.norm();
        let ex = chord.try_normalize(1e-12)?;

        if self.is_collinear(p1, p2, p3) {
            let up = any_perpendicular(&ex)?;
            let half = 0.5 * span;
            let height = (target * target - half * half).max(0.0).sqrt();
            let bent = p1 + ex * half + up.into_inner() * height;
            return finite(bent);
        }

        let ez = (p2 - p1).cross(&chord).try_normalize(1e-12)?;
        let ey = ez.cross(&ex);

        // p1 maps to (0, 0) and p3 to (span, 0) in the plane's frame.
        let local = p2 - p1;
        let (x2, y2) = (local.dot(&ex), local.dot(&ey));
        let denom = x2 * (x2 - span);
        if denom.abs() < 1e-12 * span * span {
            return None;
        }
        let curvature = y2 / denom;
        let parabola = |x: f64| curvature * x * (x - span);

        let objective = |x: f64| {
            let y = parabola(x);
            let left = (x * x + y * y).sqrt();
            let right = ((x - span) * (x - span) + y * y).sqrt();
            (left - target).abs() + (right - target).abs()
        };
        let best = minimize_scalar_bounded(objective, 0.0, span, LINE_SEARCH_TOLERANCE);
        let x = best.x;
        finite(p1 + ex * x + ey * parabola(x))
    }

    pub fn fit_transform(&self, coords: &[Point3<f64>]) -> CorrectionReport {
        let n = coords.len();
        let n_triples = n.saturating_sub(2) / 2;
        let mut current = coords.to_vec();
        let mut skipped = 0;
        let mut sweeps = 0;
        let mut converged = n_triples == 0;

        while n_triples > 0 && sweeps < self.config.max_sweeps {
            let previous = current.clone();
            let offset = (sweeps % 2) + 1;
            for t in 0..n_triples {
                let i = offset + 2 * t;
                let (p1, p2, p3) = (current[i - 1], current[i], current[i + 1]);
                if self.config.collinear_policy == CollinearPolicy::Skip
                    && self.is_collinear(&p1, &p2, &p3)
                {
                    skipped += 1;
                    trace!("Skipping collinear triple centered on point {}.", i);
                    continue;
                }
                match self.correct_triple(&p1, &p2, &p3) {
                    Some(p) => current[i] = p,
                    None => {
                        skipped += 1;
                        trace!("Skipping degenerate triple centered on point {}.", i);
                    }
                }
            }
            sweeps += 1;

            let tau = frobenius_distance(&previous, &current);
            debug!("Deviation correction sweep {}: change {:.3e}.", sweeps, tau);
            if tau < self.config.tolerance {
                converged = true;
                break;
            }
        }

        if skipped > 0 {
            warn!(
                "Deviation correction skipped {} degenerate triples over {} sweeps.",
                skipped, sweeps
            );
        }

        CorrectionReport {
            coords: current,
            sweeps,
            skipped_triples: skipped,
            converged,
        }
    }
}

fn finite(p: Point3<f64>) -> Option<Point3<f64>> {
    p.coords.iter().all(|v| v.is_finite()).then_some(p)
}

/// Mean absolute deviation of consecutive distances from `target`.
pub fn mean_bond_deviation(coords: &[Point3<f64>], target: f64) -> f64 {
    if coords.len() < 2 {
        return 0.0;
    }
    let total: f64 = coords
        .windows(2)
        .map(|w| ((w[1] - w[0]).norm() - target).abs())
        .sum();
    total / (coords.len() - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::utils::geometry::euler_rotation;
    use nalgebra::Vector3;

    fn corrector(target: f64) -> DeviationCorrector {
        DeviationCorrector::new(CorrectorConfig {
            target_distance: target,
            ..Default::default()
        })
    }

    fn zigzag(n: usize, step: f64, target: f64) -> Vec<Point3<f64>> {
        let height = (target * target - step * step).sqrt();
        let rotation = euler_rotation(0.3, -0.7, 1.1);
        (0..n)
            .map(|i| {
                let p = Point3::new(i as f64 * step, (i % 2) as f64 * height, 0.0);
                rotation * p + Vector3::new(1.0, -2.0, 0.5)
            })
            .collect()
    }

    #[test]
    fn collinear_triple_is_bent_to_the_target_distance() {
        let c = corrector(3.0);
        let (p1, p2, p3) = (
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(4.0, 0.0, 0.0),
        );
        let fixed = c.correct_triple(&p1, &p2, &p3).unwrap();
        let (left, right) = ((fixed - p1).norm(), (fixed - p3).norm());
        assert!((left - 3.0).abs() < (2.0f64 - 3.0).abs());
        assert!((right - 3.0).abs() < (2.0f64 - 3.0).abs());
        assert!((left - 3.0).abs() < 1e-9 && (right - 3.0).abs() < 1e-9);
    }

    #[test]
    fn bent_point_stays_at_midpoint_when_target_is_too_short() {
        let c = corrector(1.0);
        let fixed = c
            .correct_triple(
                &Point3::new(0.0, 0.0, 0.0),
                &Point3::new(2.0, 0.0, 0.0),
                &Point3::new(4.0, 0.0, 0.0),
            )
            .unwrap();
        assert!((fixed - Point3::new(2.0, 0.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn correction_reduces_deviation_and_stays_in_plane() {
        let c = corrector(CA_CA_DISTANCE);
        let (p1, p2, p3) = (
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 2.0, 0.0),
            Point3::new(6.0, 0.0, 0.0),
        );
        let cost = |p: &Point3<f64>| {
            ((p - p1).norm() - CA_CA_DISTANCE).abs() + ((p - p3).norm() - CA_CA_DISTANCE).abs()
        };
        let fixed = c.correct_triple(&p1, &p2, &p3).unwrap();
        assert!(cost(&fixed) < cost(&p2));
        assert!(fixed.z.abs() < 1e-12);
        assert!(fixed.x >= -1e-9 && fixed.x <= 6.0 + 1e-9);
        // The point stays on the parabola through the three inputs.
        let expected_y = -0.4 * fixed.x * (fixed.x - 6.0);
        assert!((fixed.y - expected_y).abs() < 1e-9);
    }

    #[test]
    fn coincident_endpoints_are_rejected() {
        let c = corrector(CA_CA_DISTANCE);
        let p = Point3::new(1.0, 1.0, 1.0);
        assert!(c.correct_triple(&p, &Point3::new(2.0, 0.0, 0.0), &p).is_none());
    }

    #[test]
    fn ideal_zigzag_is_a_fixed_point() {
        let coords = zigzag(9, 2.5, CA_CA_DISTANCE);
        let c = corrector(CA_CA_DISTANCE);
        let first = c.fit_transform(&coords);
        assert!(first.converged);
        assert_eq!(first.sweeps, 1);
        assert!(frobenius_distance(&coords, &first.coords) < 1e-6);

        let second = c.fit_transform(&first.coords);
        assert!(frobenius_distance(&first.coords, &second.coords) < c.config().tolerance);
    }

    #[test]
    fn skip_policy_leaves_collinear_chain_untouched() {
        let coords: Vec<_> = (0..5).map(|i| Point3::new(2.0 * i as f64, 0.0, 0.0)).collect();
        let report = corrector(CA_CA_DISTANCE).fit_transform(&coords);
        assert_eq!(report.coords, coords);
        assert!(report.skipped_triples >= 1);
        assert!(report.converged);
    }

    #[test]
    fn bend_policy_repairs_collinear_chain() {
        let coords: Vec<_> = (0..5).map(|i| Point3::new(2.0 * i as f64, 0.0, 0.0)).collect();
        let c = DeviationCorrector::new(CorrectorConfig {
            collinear_policy: CollinearPolicy::Bend,
            ..Default::default()
        });
        let report = c.fit_transform(&coords);
        assert_eq!(report.skipped_triples, 0);
        assert!(report.coords[1].y.abs() > 1.0 || report.coords[1].z.abs() > 1.0);
        assert!(
            mean_bond_deviation(&report.coords, CA_CA_DISTANCE)
                < mean_bond_deviation(&coords, CA_CA_DISTANCE)
        );
    }

    #[test]
    fn sweeps_are_capped() {
        let mut coords = zigzag(12, 2.5, CA_CA_DISTANCE);
        for (i, p) in coords.iter_mut().enumerate() {
            p.z += (i as f64 * 1.7).sin() * 3.0;
        }
        let c = DeviationCorrector::new(CorrectorConfig {
            max_sweeps: 3,
            tolerance: 0.0,
            ..Default::default()
        });
        let report = c.fit_transform(&coords);
        assert_eq!(report.sweeps, 3);
        assert!(!report.converged);
    }

    #[test]
    fn short_chains_are_returned_unchanged() {
        let coords = vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)];
        let report = corrector(CA_CA_DISTANCE).fit_transform(&coords);
        assert_eq!(report.coords, coords);
        assert_eq!(report.sweeps, 0);
        assert!(report.converged);
    }
}
