use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A direction or displacement in 3D.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };
    pub const X: Self = Self {
        x: 1.0,
        y: 0.0,
        z: 0.0,
    };
    pub const Y: Self = Self {
        x: 0.0,
        y: 1.0,
        z: 0.0,
    };
    pub const Z: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 1.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Unit vector along axis 0, 1 or 2.
    pub fn axis(axis: usize) -> Self {
        match axis {
            0 => Self::X,
            1 => Self::Y,
            _ => Self::Z,
        }
    }

    pub fn component(&self, axis: usize) -> f64 {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Self) -> Self {
        Self {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn length(&self) -> f64 {
        self.length_squared().sqrt()
    }

    pub fn length_squared(&self) -> f64 {
        self.dot(self)
    }

    /// Unit vector, or `None` for a zero or non-finite vector.
    pub fn normalized(&self) -> Option<Self> {
        let len = self.length();
        if len > 0.0 && len.is_finite() {
            Some(*self / len)
        } else {
            None
        }
    }

    /// Cosine of the angle between two vectors; 0 when either is zero.
    pub fn cos_angle(&self, other: &Self) -> f64 {
        let len_product = self.length() * other.length();
        if len_product > 0.0 {
            (self.dot(other) / len_product).clamp(-1.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn angle_to(&self, other: &Self) -> f64 {
        self.cos_angle(other).acos()
    }

    /// Component of `self` orthogonal to the unit vector `n`.
    pub fn reject_from(&self, n: &Self) -> Self {
        *self - *n * self.dot(n)
    }

    /// Index of the largest absolute component.
    pub fn dominant_axis(&self) -> usize {
        let (ax, ay, az) = (self.x.abs(), self.y.abs(), self.z.abs());
        if ax >= ay && ax >= az {
            0
        } else if ay >= az {
            1
        } else {
            2
        }
    }

    /// Any unit vector perpendicular to `self` (which must be non-zero).
    pub fn any_perpendicular(&self) -> Self {
        let helper = match self.dominant_axis() {
            0 => Self::Y,
            1 => Self::Z,
            _ => Self::X,
        };
        let p = self.cross(&helper);
        p.normalized().unwrap_or(Self::X)
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn from_array(arr: [f64; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }

    /// Triple scalar product: self . (b x c)
    pub fn triple(&self, b: &Self, c: &Self) -> f64 {
        self.dot(&b.cross(c))
    }
}

impl Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Mul<Vec3> for f64 {
    type Output = Vec3;
    fn mul(self, rhs: Vec3) -> Self::Output {
        Vec3::new(self * rhs.x, self * rhs.y, self * rhs.z)
    }
}

impl Div<f64> for Vec3 {
    type Output = Self;
    fn div(self, rhs: f64) -> Self::Output {
        Self::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y, -self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_cross_product() {
        let result = Vec3::X.cross(&Vec3::Y);
        assert_eq!(result, Vec3::Z);
    }

    #[test]
    fn test_normalized_rejects_zero() {
        assert!(Vec3::ZERO.normalized().is_none());
        let n = Vec3::new(3.0, 0.0, 4.0).normalized().unwrap();
        assert!((n.x - 0.6).abs() < 1e-12);
        assert!((n.z - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_angle_to() {
        assert!((Vec3::X.angle_to(&Vec3::Y) - FRAC_PI_2).abs() < 1e-12);
        assert!((Vec3::X.angle_to(&(-Vec3::X)) - PI).abs() < 1e-12);
        assert_eq!(Vec3::X.cos_angle(&Vec3::ZERO), 0.0);
    }

    #[test]
    fn test_reject_and_dominant_axis() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        let r = v.reject_from(&Vec3::Z);
        assert_eq!(r, Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(Vec3::new(0.1, -5.0, 2.0).dominant_axis(), 1);
    }

    #[test]
    fn test_any_perpendicular() {
        for v in [Vec3::X, Vec3::Y, Vec3::Z, Vec3::new(1.0, -2.0, 0.5)] {
            let p = v.any_perpendicular();
            assert!(p.dot(&v).abs() < 1e-12);
            assert!((p.length() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_triple_product() {
        assert!((Vec3::X.triple(&Vec3::Y, &Vec3::Z) - 1.0).abs() < 1e-12);
    }
}
