//! Recognition and export of canonical solids.
//!
//! Every converter either proves the shell is exactly its target shape or
//! returns [`KernelError::NotConvertible`]; nothing is approximated.

pub mod arb;
pub mod bot;
pub mod poly;
pub mod tgc;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::KernelError;
use crate::geometry::plane::Plane;
use crate::topology::model::{FaceId, Model, Orientation, ShellId, VertexId};
use crate::Tolerance;

pub use arb::ArbSolid;
pub use bot::{BotMesh, BotMode};
pub use poly::{PolyFacet, PolySolid};
pub use tgc::{TgcForm, TgcSolid};

/// Target representation of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Arb,
    Tgc,
    Bot,
    PolySolid,
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShapeKind::Arb => "ARB",
            ShapeKind::Tgc => "TGC",
            ShapeKind::Bot => "BOT",
            ShapeKind::PolySolid => "polygon solid",
        };
        f.write_str(name)
    }
}

/// A shape a shell can be exported as.
pub trait CanonicalShape: Serialize + Sized {
    const KIND: ShapeKind;

    /// Recognize `shell` as this shape.
    fn from_shell(model: &Model, shell: ShellId, tol: &Tolerance) -> Result<Self, KernelError>;

    fn to_json(&self) -> Result<String, KernelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub(crate) fn refuse(shell: ShellId, target: ShapeKind, reason: impl Into<String>) -> KernelError {
    let reason = reason.into();
    warn!(?shell, %target, %reason, "shell not convertible");
    KernelError::NotConvertible { shell, target, reason }
}

/// One planar single-loop face.
pub(crate) struct SimpleFace {
    pub face: FaceId,
    pub plane: Plane,
    /// Loop of the outward side.
    pub verts: Vec<VertexId>,
}

/// Every face of `shell` as a [`SimpleFace`], or why one is not.
pub(crate) fn simple_faces(
    model: &Model,
    shell: ShellId,
    target: ShapeKind,
    tol: &Tolerance,
) -> Result<Vec<SimpleFace>, KernelError> {
    let faces = model.shell_faces(shell);
    if faces.is_empty() {
        return Err(refuse(shell, target, "shell has no faces"));
    }
    let mut out = Vec::with_capacity(faces.len());
    for face in faces {
        let loops = model.face_loopuses(face);
        let [lu] = loops.as_slice() else {
            return Err(refuse(shell, target, format!("face {face:?} has {} loops", loops.len())));
        };
        let verts = model.lu_vertices(*lu);
        let plane = model.faces[face].plane;
        if verts.len() < 3 {
            return Err(refuse(shell, target, format!("face {face:?} has fewer than 3 vertices")));
        }
        if let Some(&off) = verts
            .iter()
            .find(|&&v| !plane.contains(&model.vertices[v].point, tol))
        {
            return Err(refuse(shell, target, format!("vertex {off:?} is off the plane of face {face:?}")));
        }
        out.push(SimpleFace { face, plane, verts });
    }
    Ok(out)
}

/// Fails unless every edge of `shell` joins exactly two faces.
pub(crate) fn require_winged(model: &Model, shell: ShellId, target: ShapeKind) -> Result<(), KernelError> {
    for edge in model.shell_edges(shell) {
        let n = model.edge_faces(edge).len();
        if n != 2 {
            return Err(refuse(shell, target, format!("edge {edge:?} joins {n} faces")));
        }
    }
    Ok(())
}

/// Every edge turns outward: crossing from one face to its neighbor
/// rotates the normal positively about the edge direction.
pub(crate) fn check_convex(
    model: &Model,
    shell: ShellId,
    target: ShapeKind,
    tol: &Tolerance,
) -> Result<(), KernelError> {
    for edge in model.shell_edges(shell) {
        let faces = model.edge_faces(edge);
        let &[f1, f2] = faces.as_slice() else {
            continue;
        };
        for (from, to) in [(f1, f2), (f2, f1)] {
            let Some(eu) = model.edge_uses(edge).into_iter().find(|&eu| {
                model.eu_face(eu) == Some(from) && model.eu_orientation(eu) == Orientation::Same
            }) else {
                continue;
            };
            let Some(dir) = model.eu_vector(eu).normalized() else {
                return Err(refuse(shell, target, format!("edge {edge:?} has zero length")));
            };
            let turn = model.faces[from]
                .plane
                .normal
                .cross(&model.faces[to].plane.normal)
                .dot(&dir);
            if turn <= tol.perp {
                return Err(refuse(shell, target, format!("not convex at edge {edge:?}")));
            }
        }
    }
    Ok(())
}
