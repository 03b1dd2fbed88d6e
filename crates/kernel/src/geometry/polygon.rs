//! Planar polygon helpers: projection to 2D, containment, ear clipping.

use super::point::{Point2d, Point3d};
use super::vector::Vec3;

/// Drop the dominant axis of `normal`, keeping counter-clockwise order
/// about `normal` counter-clockwise in 2D.
pub fn project_to_2d(points: &[Point3d], normal: &Vec3) -> Vec<Point2d> {
    let k = normal.dominant_axis();
    let (mut a, mut b) = ((k + 1) % 3, (k + 2) % 3);
    if normal.component(k) < 0.0 {
        std::mem::swap(&mut a, &mut b);
    }
    points
        .iter()
        .map(|p| Point2d::new(p.axis(a), p.axis(b)))
        .collect()
}

/// Twice the signed area; positive for counter-clockwise order.
pub fn signed_area_2d(points: &[Point2d]) -> f64 {
    let n = points.len();
    (0..n)
        .map(|i| {
            let p = points[i];
            let q = points[(i + 1) % n];
            p.x * q.y - q.x * p.y
        })
        .sum()
}

/// Crossing-number containment test; boundary points are unspecified.
pub fn point_in_polygon_2d(p: &Point2d, polygon: &[Point2d]) -> bool {
    let n = polygon.len();
    let mut inside = false;
    let mut j = n.wrapping_sub(1);
    for i in 0..n {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Point-in-polygon for a planar 3D polygon with the given normal.
pub fn point_in_polygon_3d(p: &Point3d, polygon: &[Point3d], normal: &Vec3) -> bool {
    let flat = project_to_2d(polygon, normal);
    let q = project_to_2d(std::slice::from_ref(p), normal);
    point_in_polygon_2d(&q[0], &flat)
}

fn strictly_inside_triangle(p: &Point2d, a: &Point2d, b: &Point2d, c: &Point2d, sign: f64) -> bool {
    a.orient(b, p) * sign > 0.0 && b.orient(c, p) * sign > 0.0 && c.orient(a, p) * sign > 0.0
}

/// Ear-clip a simple polygon into triangles of indices into `points`.
///
/// Triangles keep the winding of the input. Collinear runs are dropped
/// without emitting slivers. Returns `None` if the polygon self-intersects
/// badly enough that no ear can be found.
pub fn triangulate(points: &[Point2d]) -> Option<Vec<[usize; 3]>> {
    let n = points.len();
    if n < 3 {
        return None;
    }
    let sign = if signed_area_2d(points) >= 0.0 { 1.0 } else { -1.0 };
    let mut remaining: Vec<usize> = (0..n).collect();
    let mut triangles = Vec::with_capacity(n - 2);

    while remaining.len() > 3 {
        let m = remaining.len();
        let mut clipped = false;
        for i in 0..m {
            let (ia, ib, ic) = (remaining[(i + m - 1) % m], remaining[i], remaining[(i + 1) % m]);
            let (a, b, c) = (&points[ia], &points[ib], &points[ic]);
            if a.orient(b, c) * sign <= 0.0 {
                continue;
            }
            let blocked = remaining.iter().any(|&k| {
                k != ia
                    && k != ib
                    && k != ic
                    && points[k] != *a
                    && points[k] != *b
                    && points[k] != *c
                    && strictly_inside_triangle(&points[k], a, b, c, sign)
            });
            if !blocked {
                triangles.push([ia, ib, ic]);
                remaining.remove(i);
                clipped = true;
                break;
            }
        }
        if clipped {
            continue;
        }
        // No convex ear: shed a collinear vertex or give up.
        let flat = (0..m).find(|&i| {
            let (ia, ib, ic) = (remaining[(i + m - 1) % m], remaining[i], remaining[(i + 1) % m]);
            points[ia].orient(&points[ib], &points[ic]) == 0.0
        })?;
        remaining.remove(flat);
    }

    let (a, b, c) = (remaining[0], remaining[1], remaining[2]);
    if points[a].orient(&points[b], &points[c]) * sign > 0.0 {
        triangles.push([a, b, c]);
    }
    Some(triangles)
}
