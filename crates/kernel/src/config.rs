//! Configuration for the repair kernel.
//!
//! Heuristic constants (collapse thresholds, solver limits, ray directions)
//! live here as tunable defaults rather than being baked into the algorithms.

use serde::{Deserialize, Serialize};

use crate::error::KernelError;
use crate::Tolerance;

/// How much per-element detail the algorithms log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// Only summaries and failures.
    Quiet,
    #[default]
    Normal,
    /// Per-element decisions (planes, wedges, collapse candidates).
    Verbose,
}

impl Verbosity {
    pub fn is_verbose(self) -> bool {
        self >= Verbosity::Verbose
    }
}

/// Limits for the vertex geometry solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VertexSolveConfig {
    /// Vertices touching more distinct planes than this are rejected.
    pub max_planes: usize,
    /// Use the least-squares point instead of exact/faceted solving.
    pub approximate: bool,
}

impl Default for VertexSolveConfig {
    fn default() -> Self {
        Self {
            max_planes: 32,
            approximate: false,
        }
    }
}

/// Edge-collapse decimation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollapseParams {
    /// Largest perpendicular deviation a collapse may introduce.
    pub max_distance: f64,
    /// Largest rotation (degrees) any neighboring triangle normal may undergo.
    pub min_dihedral_angle_degrees: f64,
    /// Collapses whose worst pre/post normal cosine is at or below this are flips.
    pub flip_dot_threshold: f64,
    /// Upper bound on full candidate sweeps.
    pub max_sweeps: usize,
}

impl Default for CollapseParams {
    fn default() -> Self {
        Self {
            max_distance: 0.0005,
            min_dihedral_angle_degrees: 10.0,
            flip_dot_threshold: 0.0,
            max_sweeps: 64,
        }
    }
}

impl CollapseParams {
    pub fn new(max_distance: f64, min_dihedral_angle_degrees: f64) -> Self {
        Self {
            max_distance,
            min_dihedral_angle_degrees,
            ..Self::default()
        }
    }

    /// Smallest acceptable cosine between pre- and post-collapse normals.
    pub fn min_normal_cosine(&self) -> f64 {
        self.min_dihedral_angle_degrees.to_radians().cos()
    }
}

/// Ray casting setup for point-in-shell classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyConfig {
    /// Directions used for the majority vote; an odd count avoids ties.
    pub ray_directions: Vec<[f64; 3]>,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            ray_directions: vec![
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
                [0.577_350_269_189_625_8, 0.577_350_269_189_625_8, 0.577_350_269_189_625_8],
                [-0.854_242_208_705_946, 0.427_121_104_352_973, 0.256_272_662_611_783_8],
            ],
        }
    }
}

/// Top-level configuration handed to [`crate::Repairer`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    pub tolerance: Tolerance,
    pub verbosity: Verbosity,
    pub vertex: VertexSolveConfig,
    pub collapse: CollapseParams,
    pub classify: ClassifyConfig,
}

impl KernelConfig {
    /// Vertices are moved by least squares; no faces are added.
    pub fn approximate() -> Self {
        Self {
            vertex: VertexSolveConfig {
                approximate: true,
                ..VertexSolveConfig::default()
            },
            ..Self::default()
        }
    }

    /// Decimation of scanned or tessellated input.
    pub fn decimation(max_distance: f64, min_dihedral_angle_degrees: f64) -> Self {
        Self {
            collapse: CollapseParams::new(max_distance, min_dihedral_angle_degrees),
            ..Self::default()
        }
    }

    /// Parse a JSON configuration; absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, KernelError> {
        let config: KernelConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, KernelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn verbose(mut self) -> Self {
        self.verbosity = Verbosity::Verbose;
        self
    }

    pub fn validate(&self) -> Result<(), KernelError> {
        self.tolerance.validate()?;
        if self.vertex.max_planes < 3 {
            return Err(KernelError::InvalidConfig {
                reason: format!("vertex.max_planes must be at least 3, got {}", self.vertex.max_planes),
            });
        }
        if self.collapse.max_distance < 0.0 {
            return Err(KernelError::InvalidConfig {
                reason: "collapse.max_distance must not be negative".into(),
            });
        }
        if !(0.0..=180.0).contains(&self.collapse.min_dihedral_angle_degrees) {
            return Err(KernelError::InvalidConfig {
                reason: format!(
                    "collapse.min_dihedral_angle_degrees must lie in [0, 180], got {}",
                    self.collapse.min_dihedral_angle_degrees
                ),
            });
        }
        if self.classify.ray_directions.is_empty() {
            return Err(KernelError::InvalidConfig {
                reason: "classify.ray_directions must not be empty".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(KernelConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = KernelConfig::from_json(
            r#"{ "tolerance": { "dist": 0.01, "perp": 0.0001 }, "collapse": { "max_distance": 0.2 } }"#,
        )
        .unwrap();
        assert_eq!(config.tolerance.dist, 0.01);
        assert_eq!(config.collapse.max_distance, 0.2);
        assert_eq!(config.collapse.max_sweeps, CollapseParams::default().max_sweeps);
        assert_eq!(config.vertex, VertexSolveConfig::default());
        assert_eq!(config.verbosity, Verbosity::Normal);
    }

    #[test]
    fn test_invalid_json_values_rejected() {
        let err = KernelConfig::from_json(r#"{ "vertex": { "max_planes": 2 } }"#).unwrap_err();
        assert!(matches!(err, KernelError::InvalidConfig { .. }));
        let err = KernelConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, KernelError::Json(_)));
    }

    #[test]
    fn test_round_trip() {
        let config = KernelConfig::default().verbose();
        let json = config.to_json().unwrap();
        let back = KernelConfig::from_json(&json).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn test_presets() {
        let approx = KernelConfig::approximate();
        assert!(approx.vertex.approximate);
        assert!(approx.validate().is_ok());
        let coarse = KernelConfig::decimation(0.05, 20.0);
        assert_eq!(coarse.collapse.max_distance, 0.05);
        assert_eq!(coarse.collapse.max_sweeps, 64);
        assert!(coarse.validate().is_ok());
    }

    #[test]
    fn test_min_normal_cosine() {
        let params = CollapseParams::new(0.1, 60.0);
        assert!((params.min_normal_cosine() - 0.5).abs() < 1e-12);
    }
}
