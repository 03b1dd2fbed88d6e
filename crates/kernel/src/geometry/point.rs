use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

use super::vector::Vec3;

/// A vertex position in model space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3d {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3d {
    pub const ORIGIN: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance_to(&self, other: &Self) -> f64 {
        self.distance_squared_to(other).sqrt()
    }

    pub fn distance_squared_to(&self, other: &Self) -> f64 {
        (*self - *other).length_squared()
    }

    pub fn midpoint(&self, other: &Self) -> Self {
        self.lerp(other, 0.5)
    }

    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        *self + (*other - *self) * t
    }

    /// Coordinate along axis 0, 1 or 2.
    pub fn axis(&self, axis: usize) -> f64 {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// Arithmetic mean; `None` for an empty slice.
    pub fn centroid(points: &[Point3d]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let inv = 1.0 / points.len() as f64;
        let sum = points
            .iter()
            .fold(Vec3::ZERO, |acc, p| acc + p.to_vec3());
        Some(Point3d::ORIGIN + sum * inv)
    }

    pub fn to_vec3(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn from_array(arr: [f64; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }
}

impl Add<Vec3> for Point3d {
    type Output = Point3d;
    fn add(self, rhs: Vec3) -> Self::Output {
        Point3d::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Point3d {
    type Output = Vec3;
    fn sub(self, rhs: Self) -> Self::Output {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Sub<Vec3> for Point3d {
    type Output = Point3d;
    fn sub(self, rhs: Vec3) -> Self::Output {
        Point3d::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// A point in a face's projection plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2d {
    pub x: f64,
    pub y: f64,
}

impl Point2d {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Z component of `(b - self) x (c - self)`; positive for a left turn.
    pub fn orient(&self, b: &Self, c: &Self) -> f64 {
        (b.x - self.x) * (c.y - self.y) - (b.y - self.y) * (c.x - self.x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_sub_add_round_trip() {
        let a = Point3d::new(3.0, 4.0, 5.0);
        let b = Point3d::new(1.0, 1.0, 1.0);
        let v = a - b;
        assert_eq!(v, Vec3::new(2.0, 3.0, 4.0));
        assert_eq!(b + v, a);
    }

    #[test]
    fn test_centroid() {
        let pts = [
            Point3d::new(0.0, 0.0, 0.0),
            Point3d::new(2.0, 0.0, 0.0),
            Point3d::new(2.0, 2.0, 0.0),
            Point3d::new(0.0, 2.0, 4.0),
        ];
        let c = Point3d::centroid(&pts).unwrap();
        assert!((c.x - 1.0).abs() < 1e-12);
        assert!((c.y - 1.0).abs() < 1e-12);
        assert!((c.z - 1.0).abs() < 1e-12);
        assert!(Point3d::centroid(&[]).is_none());
    }

    #[test]
    fn test_axis_and_midpoint() {
        let p = Point3d::new(1.0, 2.0, 3.0);
        assert_eq!(p.axis(0), 1.0);
        assert_eq!(p.axis(2), 3.0);
        let m = Point3d::ORIGIN.midpoint(&Point3d::new(2.0, 4.0, 6.0));
        assert_eq!(m, Point3d::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_orient_2d() {
        let a = Point2d::new(0.0, 0.0);
        assert!(a.orient(&Point2d::new(1.0, 0.0), &Point2d::new(0.0, 1.0)) > 0.0);
        assert!(a.orient(&Point2d::new(0.0, 1.0), &Point2d::new(1.0, 0.0)) < 0.0);
    }
}
