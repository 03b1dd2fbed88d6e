use serde::{Deserialize, Serialize};

use nmg_solver::{fit_plane, PlaneEq};

use super::point::Point3d;
use super::vector::Vec3;
use crate::Tolerance;

/// Oriented plane `normal . p = d` with a unit normal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f64,
}

impl Plane {
    /// `normal` must already be unit length.
    pub fn new(normal: Vec3, d: f64) -> Self {
        Self { normal, d }
    }

    pub fn from_point_normal(point: &Point3d, normal: Vec3) -> Option<Self> {
        let n = normal.normalized()?;
        Some(Self::new(n, n.dot(&point.to_vec3())))
    }

    /// Newell fit over a closed polygon; the normal follows its winding.
    pub fn from_polygon(points: &[Point3d]) -> Option<Self> {
        let raw: Vec<[f64; 3]> = points.iter().map(Point3d::to_array).collect();
        fit_plane(&raw, 0.0).map(Self::from_eq)
    }

    pub fn from_eq(eq: PlaneEq) -> Self {
        Self::new(Vec3::from_array(eq.normal), eq.d)
    }

    pub fn to_eq(&self) -> PlaneEq {
        PlaneEq::new(self.normal.to_array(), self.d)
    }

    /// Signed distance, positive on the normal side.
    pub fn distance(&self, p: &Point3d) -> f64 {
        self.normal.dot(&p.to_vec3()) - self.d
    }

    pub fn project(&self, p: &Point3d) -> Point3d {
        *p - self.normal * self.distance(p)
    }

    pub fn flipped(&self) -> Self {
        Self::new(-self.normal, -self.d)
    }

    pub fn contains(&self, p: &Point3d, tol: &Tolerance) -> bool {
        self.distance(p).abs() <= tol.dist
    }

    pub fn is_parallel(&self, other: &Self, tol: &Tolerance) -> bool {
        tol.is_parallel(self.normal.dot(&other.normal))
    }

    /// Same geometric plane regardless of orientation.
    pub fn is_coplanar(&self, other: &Self, tol: &Tolerance) -> bool {
        let cos = self.normal.dot(&other.normal);
        if !tol.is_parallel(cos) {
            return false;
        }
        let other_d = if cos < 0.0 { -other.d } else { other.d };
        (self.d - other_d).abs() <= tol.dist
    }

    /// Line common to both planes, or `None` when they are parallel.
    pub fn intersect(&self, other: &Self, tol: &Tolerance) -> Option<Line3> {
        if self.is_parallel(other, tol) {
            return None;
        }
        let u = self.normal.cross(&other.normal);
        let len_sq = u.length_squared();
        let point = (other.normal.cross(&u) * self.d + u.cross(&self.normal) * other.d) / len_sq;
        Some(Line3::new(Point3d::ORIGIN + point, u.normalized()?))
    }
}

/// Infinite line with a unit direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line3 {
    pub point: Point3d,
    pub dir: Vec3,
}

impl Line3 {
    pub fn new(point: Point3d, dir: Vec3) -> Self {
        Self { point, dir }
    }

    pub fn at(&self, t: f64) -> Point3d {
        self.point + self.dir * t
    }

    pub fn param_of(&self, p: &Point3d) -> f64 {
        (*p - self.point).dot(&self.dir)
    }

    pub fn closest_point(&self, p: &Point3d) -> Point3d {
        self.at(self.param_of(p))
    }

    /// Re-anchor at the point nearest `p` and flip to point along `toward`.
    pub fn anchored(&self, p: &Point3d, toward: &Vec3) -> Self {
        let dir = if self.dir.dot(toward) < 0.0 {
            -self.dir
        } else {
            self.dir
        };
        Self::new(self.closest_point(p), dir)
    }

    /// Parameter where the line meets `plane`, `None` when parallel to it.
    pub fn intersect_plane(&self, plane: &Plane, tol: &Tolerance) -> Option<f64> {
        let denom = plane.normal.dot(&self.dir);
        if tol.is_perpendicular(denom) {
            return None;
        }
        Some(-plane.distance(&self.point) / denom)
    }

    /// Parameters `(t, s)` of the closest approach to `other`, `None` when parallel.
    pub fn closest_params(&self, other: &Self, tol: &Tolerance) -> Option<(f64, f64)> {
        let b = self.dir.dot(&other.dir);
        if tol.is_parallel(b) {
            return None;
        }
        let w = self.point - other.point;
        let d = self.dir.dot(&w);
        let e = other.dir.dot(&w);
        let denom = 1.0 - b * b;
        let t = (b * e - d) / denom;
        let s = (e - b * d) / denom;
        Some((t, s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn tol() -> Tolerance {
        Tolerance::default()
    }

    #[test]
    fn test_from_polygon_and_distance() {
        let pts = [
            Point3d::new(0.0, 0.0, 2.0),
            Point3d::new(1.0, 0.0, 2.0),
            Point3d::new(1.0, 1.0, 2.0),
            Point3d::new(0.0, 1.0, 2.0),
        ];
        let plane = Plane::from_polygon(&pts).unwrap();
        assert_abs_diff_eq!(plane.normal.z, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(plane.distance(&Point3d::new(5.0, 5.0, 3.0)), 1.0, epsilon = 1e-12);
        let proj = plane.project(&Point3d::new(0.3, 0.4, -7.0));
        assert_abs_diff_eq!(proj.z, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_coplanar_ignores_orientation() {
        let a = Plane::new(Vec3::Z, 1.0);
        assert!(a.is_coplanar(&a.flipped(), &tol()));
        assert!(!a.is_coplanar(&Plane::new(Vec3::Z, 1.1), &tol()));
        assert!(!a.is_coplanar(&Plane::new(Vec3::X, 1.0), &tol()));
    }

    #[test]
    fn test_plane_intersection_line() {
        let a = Plane::new(Vec3::X, 1.0);
        let b = Plane::new(Vec3::Y, 2.0);
        let line = a.intersect(&b, &tol()).unwrap();
        assert_abs_diff_eq!(line.point.x, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(line.point.y, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(line.dir.z.abs(), 1.0, epsilon = 1e-12);
        assert!(a.intersect(&a.flipped(), &tol()).is_none());
    }

    #[test]
    fn test_line_plane_and_line_line() {
        let line = Line3::new(Point3d::ORIGIN, Vec3::X);
        let t = line.intersect_plane(&Plane::new(Vec3::X, 3.0), &tol()).unwrap();
        assert_abs_diff_eq!(t, 3.0, epsilon = 1e-12);
        assert!(line.intersect_plane(&Plane::new(Vec3::Y, 3.0), &tol()).is_none());

        let other = Line3::new(Point3d::new(2.0, -1.0, 0.0), Vec3::Y);
        let (t, s) = line.closest_params(&other, &tol()).unwrap();
        assert_abs_diff_eq!(t, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_anchored_orients_direction() {
        let line = Line3::new(Point3d::new(-4.0, 1.0, 0.0), Vec3::X);
        let a = line.anchored(&Point3d::new(2.0, 0.0, 0.0), &(-Vec3::X));
        assert_abs_diff_eq!(a.point.x, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(a.dir.x, -1.0, epsilon = 1e-12);
    }
}
