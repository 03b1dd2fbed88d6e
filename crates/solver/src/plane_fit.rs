//! Plane fitting for closed polygons.

use crate::linear::PlaneEq;

/// Newell's normal of a closed polygon.
///
/// The result is not normalized: its length is twice the polygon's area and
/// its direction follows the right-hand rule over the vertex order.
pub fn newell_normal(points: &[[f64; 3]]) -> [f64; 3] {
    let mut n = [0.0; 3];
    let count = points.len();
    for i in 0..count {
        let a = points[i];
        let b = points[(i + 1) % count];
        n[0] += (a[1] - b[1]) * (a[2] + b[2]);
        n[1] += (a[2] - b[2]) * (a[0] + b[0]);
        n[2] += (a[0] - b[0]) * (a[1] + b[1]);
    }
    n
}

/// Fit a plane through a closed polygon.
///
/// Returns `None` when the polygon has fewer than three points or its Newell
/// normal is shorter than `min_length` (a zero-area polygon).
pub fn fit_plane(points: &[[f64; 3]], min_length: f64) -> Option<PlaneEq> {
    if points.len() < 3 {
        return None;
    }
    let n = newell_normal(points);
    let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
    if len <= min_length {
        return None;
    }
    let unit = [n[0] / len, n[1] / len, n[2] / len];

    let inv = 1.0 / points.len() as f64;
    let mut centroid = [0.0; 3];
    for p in points {
        centroid[0] += p[0] * inv;
        centroid[1] += p[1] * inv;
        centroid[2] += p[2] * inv;
    }
    let d = unit[0] * centroid[0] + unit[1] * centroid[1] + unit[2] * centroid[2];
    Some(PlaneEq::new(unit, d))
}
