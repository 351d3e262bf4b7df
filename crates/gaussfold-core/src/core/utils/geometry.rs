use nalgebra::{Matrix3, Point3, Rotation3, Unit, Vector3};

pub fn centroid(coords: &[Point3<f64>]) -> Point3<f64> {
    if coords.is_empty() {
        return Point3::origin();
    }
    let sum = coords
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Point3::from(sum / coords.len() as f64)
}

pub fn center(coords: &[Point3<f64>]) -> Vec<Point3<f64>> {
    let c = centroid(coords).coords;
    coords.iter().map(|p| p - c).collect()
}

/// Frobenius norm of the difference between two equally sized layouts.
pub fn frobenius_distance(a: &[Point3<f64>], b: &[Point3<f64>]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(p, q)| (p - q).norm_squared())
        .sum::<f64>()
        .sqrt()
}

pub fn calculate_rmsd(coords1: &[Point3<f64>], coords2: &[Point3<f64>]) -> Option<f64> {
    if coords1.len() != coords2.len() || coords1.is_empty() {
        return None;
    }
    let n = coords1.len() as f64;
    let squared_dist_sum: f64 = coords1
        .iter()
        .zip(coords2.iter())
        .map(|(p1, p2)| (p1 - p2).norm_squared())
        .sum();
    Some((squared_dist_sum / n).sqrt())
}

/// Rotation `Rx(phi) * Ry(psi) * Rz(theta)`.
pub fn euler_rotation(phi: f64, psi: f64, theta: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Vector3::x_axis(), phi)
        * Rotation3::from_axis_angle(&Vector3::y_axis(), psi)
        * Rotation3::from_axis_angle(&Vector3::z_axis(), theta)
}

/// Inverse of [`euler_rotation`]: returns `(phi, psi, theta)`.
pub fn euler_angles(rotation: &Rotation3<f64>) -> (f64, f64, f64) {
    let m = rotation.matrix();
    let psi = m[(0, 2)].clamp(-1.0, 1.0).asin();
    if psi.cos().abs() > 1e-9 {
        let phi = (-m[(1, 2)]).atan2(m[(2, 2)]);
        let theta = (-m[(0, 1)]).atan2(m[(0, 0)]);
        (phi, psi, theta)
    } else {
        // Gimbal lock: only phi + theta (or phi - theta) is determined.
        let phi = m[(2, 1)].atan2(m[(1, 1)]);
        (phi, psi, 0.0)
    }
}

/// Proper rotation `R` minimizing `sum |R p_i - q_i|^2` over two centered point
/// sets (Kabsch). Returns `None` for empty input or a failed decomposition.
pub fn kabsch_rotation(p: &[Point3<f64>], q: &[Point3<f64>]) -> Option<Rotation3<f64>> {
    if p.len() != q.len() || p.is_empty() {
        return None;
    }
    let h: Matrix3<f64> = p
        .iter()
        .zip(q.iter())
        .fold(Matrix3::zeros(), |acc, (a, b)| acc + a.coords * b.coords.transpose());

    let svd = h.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let v = v_t.transpose();

    let mut r = v * u.transpose();
    if r.determinant() < 0.0 {
        // Flip the axis of the smallest singular value to stay a proper rotation.
        let (min_idx, _) = svd
            .singular_values
            .iter()
            .enumerate()
            .fold((0, f64::INFINITY), |best, (i, &s)| {
                if s < best.1 { (i, s) } else { best }
            });
        let mut v_fixed = v;
        v_fixed.column_mut(min_idx).neg_mut();
        r = v_fixed * u.transpose();
    }
    Some(Rotation3::from_matrix_unchecked(r))
}

/// Some unit vector perpendicular to `v`, chosen deterministically.
pub fn any_perpendicular(v: &Vector3<f64>) -> Option<Unit<Vector3<f64>>> {
    let n = v.try_normalize(1e-12)?;
    let helper = if n.x.abs() <= n.y.abs() && n.x.abs() <= n.z.abs() {
        Vector3::x()
    } else if n.y.abs() <= n.z.abs() {
        Vector3::y()
    } else {
        Vector3::z()
    };
    Unit::try_new(helper - n * n.dot(&helper), 1e-12)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const TOLERANCE: f64 = 1e-9;

    fn sample_points() -> Vec<Point3<f64>> {
        vec![
            Point3::new(1.0, 0.2, -0.3),
            Point3::new(-0.5, 1.5, 0.7),
            Point3::new(0.3, -1.1, 2.0),
            Point3::new(2.2, 0.9, -1.4),
            Point3::new(-1.7, -0.4, 0.1),
        ]
    }

    #[test]
    fn centroid_of_empty_set_is_origin() {
        assert_eq!(centroid(&[]), Point3::origin());
    }

    #[test]
    fn center_moves_centroid_to_origin() {
        let centered = center(&sample_points());
        assert!(centroid(&centered).coords.norm() < TOLERANCE);
    }

    #[test]
    fn frobenius_distance_of_single_offset_point() {
        let a = [Point3::origin(), Point3::new(1.0, 1.0, 1.0)];
        let b = [Point3::origin(), Point3::new(1.0, 1.0, 3.0)];
        assert!((frobenius_distance(&a, &b) - 2.0).abs() < TOLERANCE);
    }

    #[test]
    fn calculate_rmsd_handles_mismatched_and_empty_inputs() {
        assert!(calculate_rmsd(&[], &[]).is_none());
        assert!(calculate_rmsd(&[Point3::origin()], &[]).is_none());
        let a = [Point3::origin(), Point3::origin()];
        let b = [Point3::new(3.0, 0.0, 0.0), Point3::new(0.0, 3.0, 0.0)];
        assert!((calculate_rmsd(&a, &b).unwrap() - 3.0).abs() < TOLERANCE);
    }

    #[test]
    fn euler_angles_round_trip_away_from_gimbal_lock() {
        let (phi, psi, theta) = (0.4, -1.1, 2.5);
        let r = euler_rotation(phi, psi, theta);
        let (a, b, c) = euler_angles(&r);
        let r2 = euler_rotation(a, b, c);
        assert!((r.matrix() - r2.matrix()).norm() < 1e-9);
    }

    #[test]
    fn euler_angles_reconstruct_rotation_at_gimbal_lock() {
        let r = euler_rotation(0.3, PI / 2.0, 0.8);
        let (a, b, c) = euler_angles(&r);
        let r2 = euler_rotation(a, b, c);
        assert!((r.matrix() - r2.matrix()).norm() < 1e-6);
    }

    #[test]
    fn kabsch_recovers_applied_rotation() {
        let p = center(&sample_points());
        let rot = euler_rotation(0.7, -0.2, 1.9);
        let q: Vec<_> = p.iter().map(|x| rot * x).collect();
        let found = kabsch_rotation(&p, &q).unwrap();
        assert!((found.matrix() - rot.matrix()).norm() < 1e-8);
        assert!((found.matrix().determinant() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn kabsch_stays_proper_for_mirrored_input() {
        let p = center(&sample_points());
        let q: Vec<_> = p.iter().map(|x| Point3::new(-x.x, x.y, x.z)).collect();
        let found = kabsch_rotation(&p, &q).unwrap();
        assert!((found.matrix().determinant() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn any_perpendicular_is_orthogonal_unit_vector() {
        for v in [Vector3::x(), Vector3::new(1.0, 2.0, 3.0), Vector3::new(0.0, 0.0, -5.0)] {
            let n = any_perpendicular(&v).unwrap();
            assert!(n.dot(&v).abs() < 1e-12);
            assert!((n.norm() - 1.0).abs() < 1e-12);
        }
        assert!(any_perpendicular(&Vector3::zeros()).is_none());
    }
}
