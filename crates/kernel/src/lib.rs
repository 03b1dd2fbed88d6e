pub mod config;
pub mod convert;
pub mod error;
pub mod geometry;
pub mod repair;
pub mod topology;

pub use config::{ClassifyConfig, CollapseParams, KernelConfig, Verbosity, VertexSolveConfig};
pub use error::{invariant_violation, KernelError};
pub use repair::Repairer;

use serde::{Deserialize, Serialize};

use geometry::point::Point3d;

/// Tolerance record used for every approximate geometric decision.
///
/// `dist_sq` and `para` are derived from `dist` and `perp`; serde only reads
/// and writes the two primary values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawTolerance", into = "RawTolerance")]
pub struct Tolerance {
    /// Points closer than this are coincident.
    pub dist: f64,
    /// `dist * dist`.
    pub dist_sq: f64,
    /// Cosine below which two directions are perpendicular.
    pub perp: f64,
    /// Cosine above which two directions are parallel (`1 - perp`).
    pub para: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawTolerance {
    dist: f64,
    perp: f64,
}

impl From<RawTolerance> for Tolerance {
    fn from(raw: RawTolerance) -> Self {
        Tolerance::new(raw.dist, raw.perp)
    }
}

impl From<Tolerance> for RawTolerance {
    fn from(tol: Tolerance) -> Self {
        RawTolerance {
            dist: tol.dist,
            perp: tol.perp,
        }
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::new(0.0005, 1e-6)
    }
}

impl Tolerance {
    pub fn new(dist: f64, perp: f64) -> Self {
        Self {
            dist,
            dist_sq: dist * dist,
            perp,
            para: 1.0 - perp,
        }
    }

    pub fn points_coincident(&self, a: &Point3d, b: &Point3d) -> bool {
        a.distance_squared_to(b) <= self.dist_sq
    }

    pub fn is_zero_length(&self, length: f64) -> bool {
        length.abs() <= self.dist
    }

    /// `cos` is the cosine between two unit directions.
    pub fn is_parallel(&self, cos: f64) -> bool {
        cos.abs() >= self.para
    }

    pub fn is_perpendicular(&self, cos: f64) -> bool {
        cos.abs() <= self.perp
    }

    pub fn validate(&self) -> Result<(), KernelError> {
        if !(self.dist > 0.0 && self.dist.is_finite()) {
            return Err(KernelError::InvalidConfig {
                reason: format!("tolerance dist must be positive, got {}", self.dist),
            });
        }
        if !(self.perp > 0.0 && self.perp < 1.0) {
            return Err(KernelError::InvalidConfig {
                reason: format!("tolerance perp must lie in (0, 1), got {}", self.perp),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_fields() {
        let tol = Tolerance::new(0.01, 1e-4);
        assert!((tol.dist_sq - 1e-4).abs() < 1e-18);
        assert!((tol.para - 0.9999).abs() < 1e-12);
    }

    #[test]
    fn test_serde_round_trip_recomputes_derived() {
        let json = r#"{"dist": 0.1, "perp": 0.001}"#;
        let tol: Tolerance = serde_json::from_str(json).unwrap();
        assert!((tol.dist_sq - 0.01).abs() < 1e-15);
        assert!((tol.para - 0.999).abs() < 1e-12);
        let back = serde_json::to_string(&tol).unwrap();
        assert!(back.contains("\"dist\":0.1"));
        assert!(!back.contains("dist_sq"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(Tolerance::new(0.0, 1e-6).validate().is_err());
        assert!(Tolerance::new(1e-3, 1.5).validate().is_err());
        assert!(Tolerance::default().validate().is_ok());
    }
}
