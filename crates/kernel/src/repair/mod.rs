//! Repair passes over an NMG model.
//!
//! The free functions in the submodules take explicit tolerance and
//! parameter arguments. [`Repairer`] bundles a validated [`KernelConfig`]
//! and forwards it to them.

pub mod classify;
pub mod cleanup;
pub mod collapse;
pub mod connect;
pub mod decompose;
pub mod orient;
pub mod vertex;

use tracing::{info, instrument};

use crate::config::KernelConfig;
use crate::convert::CanonicalShape;
use crate::error::KernelError;
use crate::topology::model::{Model, RegionId, ShellId, VertexId};

pub use connect::ConnectReport;
pub use orient::OrientReport;
pub use vertex::VertexSolution;

/// Counts from [`Repairer::cleanup`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub fused: usize,
    pub zero_length: usize,
    pub cracks: usize,
    pub split_faces: usize,
}

/// Entry point for running repairs with one configuration.
#[derive(Debug, Clone, Default)]
pub struct Repairer {
    config: KernelConfig,
}

impl Repairer {
    pub fn new(config: KernelConfig) -> Result<Self, KernelError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn solve_vertex(&self, model: &mut Model, v: VertexId) -> Result<VertexSolution, KernelError> {
        vertex::solve_vertex(model, v, &self.config)
    }

    pub fn solve_shell_vertices(&self, model: &mut Model, shell: ShellId) -> Result<usize, KernelError> {
        vertex::solve_shell_vertices(model, shell, &self.config)
    }

    pub fn decompose(&self, model: &mut Model, shell: ShellId) -> Vec<ShellId> {
        decompose::decompose_shell(model, shell, &self.config.tolerance)
    }

    pub fn fix_normals(&self, model: &mut Model, shell: ShellId) -> Result<OrientReport, KernelError> {
        orient::fix_shell_normals(model, shell, &self.config)
    }

    pub fn fix_region_normals(&self, model: &mut Model, region: RegionId) -> Result<OrientReport, KernelError> {
        orient::fix_region_normals(model, region, &self.config)
    }

    pub fn decimate(&self, model: &mut Model, shell: ShellId) -> usize {
        collapse::decimate_shell(model, shell, &self.config)
    }

    pub fn connect(&self, model: &mut Model, dst: ShellId, src: ShellId) -> Result<ConnectReport, KernelError> {
        connect::connect_open_shells(model, dst, src, &self.config.tolerance)
    }

    /// Fuse, drop zero-length edges and cracks, then give every exterior
    /// loop its own face.
    #[instrument(skip(self, model))]
    pub fn cleanup(&self, model: &mut Model, shell: ShellId) -> Result<CleanupReport, KernelError> {
        let tol = &self.config.tolerance;
        let mut report = CleanupReport {
            fused: cleanup::fuse_vertices(model, shell, tol),
            ..CleanupReport::default()
        };
        if !model.shells.contains_key(shell) {
            return Ok(report);
        }
        report.zero_length = cleanup::kill_zero_length_edges(model, shell, tol);
        if !model.shells.contains_key(shell) {
            return Ok(report);
        }
        report.cracks = cleanup::kill_cracks(model, shell);
        if !model.shells.contains_key(shell) {
            return Ok(report);
        }
        report.split_faces = cleanup::split_shell_disjoint_loops(model, shell)?;
        cleanup::rebound(model);
        info!(?report, "cleaned shell");
        Ok(report)
    }

    /// Recognize `shell` as `T`.
    pub fn convert<T: CanonicalShape>(&self, model: &Model, shell: ShellId) -> Result<T, KernelError> {
        T::from_shell(model, shell, &self.config.tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::ArbSolid;
    use crate::geometry::point::Point3d;
    use crate::topology::primitives::make_box_shell;
    use crate::Tolerance;

    #[test]
    fn test_rejects_invalid_config() {
        let config = KernelConfig::default().with_tolerance(Tolerance::new(-1.0, 1e-6));
        assert!(matches!(Repairer::new(config), Err(KernelError::InvalidConfig { .. })));
    }

    #[test]
    fn test_clean_box_passes_through() {
        let repairer = Repairer::default();
        let mut model = Model::new();
        let (_, shell) = make_box_shell(
            &mut model,
            Point3d::ORIGIN,
            Point3d::new(1.0, 1.0, 1.0),
            &repairer.config().tolerance,
        )
        .unwrap();
        assert_eq!(repairer.cleanup(&mut model, shell).unwrap(), CleanupReport::default());
        assert_eq!(repairer.fix_normals(&mut model, shell).unwrap().flipped, 0);
        assert_eq!(repairer.solve_shell_vertices(&mut model, shell).unwrap(), 0);
        let arb: ArbSolid = repairer.convert(&model, shell).unwrap();
        assert_eq!(arb.vertices, 8);
    }
}
