use nalgebra::{DMatrix, DVector, Matrix3, Vector3, SVD};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// A plane equation `normal . x = d`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaneEq {
    pub normal: [f64; 3],
    pub d: f64,
}

impl PlaneEq {
    pub fn new(normal: [f64; 3], d: f64) -> Self {
        Self { normal, d }
    }

    /// Signed distance of `p` from the plane (assumes a unit normal).
    pub fn distance(&self, p: [f64; 3]) -> f64 {
        self.normal[0] * p[0] + self.normal[1] * p[1] + self.normal[2] * p[2] - self.d
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    #[error("Singular 3x3 system: |det| = {det:.3e} is below {threshold:.3e}")]
    Singular { det: f64, threshold: f64 },

    #[error("Least-squares system has no equations")]
    Empty,

    #[error("SVD solve failed: {reason}")]
    Decomposition { reason: String },
}

/// Result of a least-squares plane solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeastSquaresPoint {
    pub point: [f64; 3],
    /// Numerical rank of the plane normals (0..=3).
    pub rank: usize,
    /// Largest absolute plane residual at `point`.
    pub max_residual: f64,
}

/// Solve the intersection point of exactly three planes.
///
/// `det_threshold` is compared against the absolute determinant of the
/// normal matrix; for unit normals this is the volume of the parallelepiped
/// they span, so callers pass their perpendicularity tolerance.
pub fn solve3(planes: &[PlaneEq; 3], det_threshold: f64) -> Result<[f64; 3], SolveError> {
    let m = Matrix3::from_rows(&[
        Vector3::from(planes[0].normal).transpose(),
        Vector3::from(planes[1].normal).transpose(),
        Vector3::from(planes[2].normal).transpose(),
    ]);
    let det = m.determinant();
    if det.abs() < det_threshold {
        debug!(det, det_threshold, "3x3 plane system is singular");
        return Err(SolveError::Singular {
            det,
            threshold: det_threshold,
        });
    }

    let b = Vector3::new(planes[0].d, planes[1].d, planes[2].d);
    let x = m.lu().solve(&b).ok_or(SolveError::Singular {
        det,
        threshold: det_threshold,
    })?;
    Ok([x[0], x[1], x[2]])
}

/// Numerical rank of a set of row vectors, relative to the largest singular value.
pub fn rank(rows: &[[f64; 3]], relative_threshold: f64) -> usize {
    if rows.is_empty() {
        return 0;
    }
    let flat: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    let mat = DMatrix::from_row_slice(rows.len(), 3, &flat);
    let svd = SVD::new(mat, false, false);
    let sv = &svd.singular_values;
    let max_sv = sv.iter().cloned().fold(0.0_f64, f64::max);
    if max_sv == 0.0 {
        return 0;
    }
    sv.iter().filter(|&&s| s > max_sv * relative_threshold).count()
}

/// Point nearest (in the least-squares sense) to every plane, moving `origin`
/// as little as possible along directions the planes leave undetermined.
///
/// Solves `A (origin + delta) = b` for the minimum-norm `delta` through the
/// SVD pseudo-inverse; singular values below `relative_threshold * max` are
/// treated as zero.
pub fn least_squares_point(
    planes: &[PlaneEq],
    origin: [f64; 3],
    relative_threshold: f64,
) -> Result<LeastSquaresPoint, SolveError> {
    if planes.is_empty() {
        return Err(SolveError::Empty);
    }

    let m = planes.len();
    let flat: Vec<f64> = planes.iter().flat_map(|p| p.normal.iter().copied()).collect();
    let a = DMatrix::from_row_slice(m, 3, &flat);
    let rhs = DVector::from_iterator(m, planes.iter().map(|p| p.distance(origin) * -1.0));

    let svd = SVD::new(a, true, true);
    let max_sv = svd.singular_values.iter().cloned().fold(0.0_f64, f64::max);
    let eps = max_sv * relative_threshold;
    let rank = svd.singular_values.iter().filter(|&&s| s > eps).count();

    let delta = svd
        .solve(&rhs, eps)
        .map_err(|reason| SolveError::Decomposition {
            reason: reason.to_string(),
        })?;

    let point = [origin[0] + delta[0], origin[1] + delta[1], origin[2] + delta[2]];
    let max_residual = planes
        .iter()
        .map(|p| p.distance(point).abs())
        .fold(0.0_f64, f64::max);

    Ok(LeastSquaresPoint {
        point,
        rank,
        max_residual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn axis_planes(x: f64, y: f64, z: f64) -> [PlaneEq; 3] {
        [
            PlaneEq::new([1.0, 0.0, 0.0], x),
            PlaneEq::new([0.0, 1.0, 0.0], y),
            PlaneEq::new([0.0, 0.0, 1.0], z),
        ]
    }

    #[test]
    fn test_solve3_axis_planes() {
        let p = solve3(&axis_planes(1.0, 2.0, 3.0), 1e-9).unwrap();
        assert_abs_diff_eq!(p[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p[1], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p[2], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_solve3_singular() {
        let planes = [
            PlaneEq::new([1.0, 0.0, 0.0], 0.0),
            PlaneEq::new([0.0, 1.0, 0.0], 0.0),
            PlaneEq::new([1.0, 0.0, 0.0], 1.0),
        ];
        assert!(matches!(solve3(&planes, 1e-9), Err(SolveError::Singular { .. })));
    }

    #[test]
    fn test_rank() {
        assert_eq!(rank(&[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]], 1e-9), 3);
        assert_eq!(rank(&[[1.0, 0.0, 0.0], [-1.0, 0.0, 0.0]], 1e-9), 1);
        assert_eq!(rank(&[], 1e-9), 0);
    }

    #[test]
    fn test_least_squares_single_plane_projects() {
        let planes = [PlaneEq::new([0.0, 0.0, 1.0], 2.0)];
        let sol = least_squares_point(&planes, [3.0, 4.0, 5.0], 1e-9).unwrap();
        assert_eq!(sol.rank, 1);
        assert_abs_diff_eq!(sol.point[0], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(sol.point[1], 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(sol.point[2], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_least_squares_parallel_planes_average() {
        let planes = [
            PlaneEq::new([0.0, 0.0, 1.0], 0.0),
            PlaneEq::new([0.0, 0.0, 1.0], 1.0),
        ];
        let sol = least_squares_point(&planes, [0.0, 0.0, 7.0], 1e-9).unwrap();
        assert_abs_diff_eq!(sol.point[2], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(sol.max_residual, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_least_squares_empty() {
        assert_eq!(least_squares_point(&[], [0.0; 3], 1e-9), Err(SolveError::Empty));
    }
}
