use std::fmt::Display;

use thiserror::Error;

use crate::convert::ShapeKind;
use crate::geometry::point::Point3d;
use crate::topology::model::{FaceId, ShellId, VertexId};

/// Structural failures returned by the repair entry points.
///
/// Each variant names the offending element and, where there is one, its
/// coordinates. None of these are retried: the input is deterministic.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("Indeterminate vertex {vertex:?} at {point:?}: plane system is singular")]
    IndeterminateVertex { vertex: VertexId, point: Point3d },

    #[error("Vertex {vertex:?} at {point:?} touches {count} distinct planes (limit {limit})")]
    TooManyFaces {
        vertex: VertexId,
        point: Point3d,
        count: usize,
        limit: usize,
    },

    #[error("Vertex {vertex:?} at {point:?} has a face fan that cannot be ordered: {reason}")]
    UnorderedVertexFan {
        vertex: VertexId,
        point: Point3d,
        reason: String,
    },

    #[error("Shell {shell:?} is not orientable: face {face:?} near {point:?} needs conflicting flips")]
    NonOrientable {
        shell: ShellId,
        face: FaceId,
        point: Point3d,
    },

    #[error("No free-edge path from {from:?} at {from_point:?} to {to:?} at {to_point:?}")]
    NoPath {
        from: VertexId,
        from_point: Point3d,
        to: VertexId,
        to_point: Point3d,
    },

    #[error("Shell {shell:?} is not convertible to {target}: {reason}")]
    NotConvertible {
        shell: ShellId,
        target: ShapeKind,
        reason: String,
    },

    #[error("Degenerate face {face:?}: {reason}")]
    DegenerateFace { face: Option<FaceId>, reason: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Linear solve failed: {0}")]
    Solve(#[from] nmg_solver::SolveError),
}

/// Abort on a broken topology invariant.
///
/// A radial mate that cannot be found or an up-pointer chain that does not
/// lead back to its owner means the graph is already corrupt; carrying on
/// would spread the damage.
#[track_caller]
pub fn invariant_violation(message: impl Display) -> ! {
    panic!("NMG invariant violated: {message}")
}
