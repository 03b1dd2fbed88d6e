use serde::{Deserialize, Serialize};

use super::point::Point3d;
use super::vector::Vec3;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point3d,
    pub max: Point3d,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoundingBox {
    pub fn new(min: Point3d, max: Point3d) -> Self {
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self {
            min: Point3d::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3d::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3d>) -> Self {
        let mut bb = Self::empty();
        for p in points {
            bb.expand_to_include(p);
        }
        bb
    }

    pub fn expand_to_include(&mut self, p: &Point3d) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    pub fn union(&self, other: &Self) -> Self {
        let mut out = *self;
        if !other.is_empty() {
            out.expand_to_include(&other.min);
            out.expand_to_include(&other.max);
        }
        out
    }

    /// Grown by `margin` on every side.
    pub fn inflated(&self, margin: f64) -> Self {
        let m = Vec3::new(margin, margin, margin);
        Self::new(self.min - m, self.max + m)
    }

    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    pub fn contains_point(&self, p: &Point3d) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// `other` lies entirely inside `self`.
    pub fn encloses(&self, other: &Self) -> bool {
        !other.is_empty() && self.contains_point(&other.min) && self.contains_point(&other.max)
    }

    pub fn diagonal(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.min.distance_to(&self.max)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points_and_union() {
        let a = BoundingBox::from_points(&[Point3d::new(0.0, 0.0, 0.0), Point3d::new(1.0, 2.0, 3.0)]);
        let b = BoundingBox::from_points(&[Point3d::new(-1.0, 0.5, 1.0)]);
        let u = a.union(&b);
        assert_eq!(u.min, Point3d::new(-1.0, 0.0, 0.0));
        assert_eq!(u.max, Point3d::new(1.0, 2.0, 3.0));
        assert_eq!(a.union(&BoundingBox::empty()), a);
    }

    #[test]
    fn test_encloses_and_intersects() {
        let outer = BoundingBox::new(Point3d::new(0.0, 0.0, 0.0), Point3d::new(4.0, 4.0, 4.0));
        let inner = BoundingBox::new(Point3d::new(1.0, 1.0, 1.0), Point3d::new(2.0, 2.0, 2.0));
        let far = BoundingBox::new(Point3d::new(5.0, 5.0, 5.0), Point3d::new(6.0, 6.0, 6.0));
        assert!(outer.encloses(&inner));
        assert!(!inner.encloses(&outer));
        assert!(outer.intersects(&inner));
        assert!(!outer.intersects(&far));
        assert!(outer.inflated(1.0).intersects(&far));
    }

    #[test]
    fn test_empty() {
        let e = BoundingBox::empty();
        assert!(e.is_empty());
        assert_eq!(e.diagonal(), 0.0);
    }
}
