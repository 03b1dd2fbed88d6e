//! Triangle mesh export.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{refuse, CanonicalShape, ShapeKind};
use crate::error::KernelError;
use crate::geometry::polygon::{project_to_2d, triangulate};
use crate::topology::model::{Model, ShellId, VertexId};
use crate::Tolerance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BotMode {
    /// Every edge joins exactly two faces.
    Solid,
    Surface,
}

/// Indexed triangles wound counter-clockwise about their outward normals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotMesh {
    pub mode: BotMode,
    pub vertices: Vec<[f64; 3]>,
    pub faces: Vec<[usize; 3]>,
    /// One unit normal per triangle.
    pub normals: Vec<[f64; 3]>,
}

impl BotMesh {
    pub fn triangle_count(&self) -> usize {
        self.faces.len()
    }
}

impl CanonicalShape for BotMesh {
    const KIND: ShapeKind = ShapeKind::Bot;

    #[instrument(skip(model, _tol))]
    fn from_shell(model: &Model, shell: ShellId, _tol: &Tolerance) -> Result<Self, KernelError> {
        let mut index: HashMap<VertexId, usize> = HashMap::new();
        let mut mesh = BotMesh {
            mode: BotMode::Solid,
            vertices: Vec::new(),
            faces: Vec::new(),
            normals: Vec::new(),
        };

        for face in model.shell_faces(shell) {
            let loops = model.face_loopuses(face);
            let [lu] = loops.as_slice() else {
                return Err(refuse(shell, ShapeKind::Bot, format!("face {face:?} has holes")));
            };
            let verts = model.lu_vertices(*lu);
            let normal = model.faces[face].plane.normal;
            let flat = project_to_2d(&model.lu_points(*lu), &normal);
            let triangles = triangulate(&flat)
                .ok_or_else(|| refuse(shell, ShapeKind::Bot, format!("face {face:?} cannot be triangulated")))?;
            for tri in triangles {
                let mut corners = [0; 3];
                for (slot, &k) in corners.iter_mut().zip(&tri) {
                    let v = verts[k];
                    *slot = *index.entry(v).or_insert_with(|| {
                        mesh.vertices.push(model.vertices[v].point.to_array());
                        mesh.vertices.len() - 1
                    });
                }
                mesh.faces.push(corners);
                mesh.normals.push(normal.to_array());
            }
        }
        if mesh.faces.is_empty() {
            return Err(refuse(shell, ShapeKind::Bot, "shell has no faces"));
        }
        if model
            .shell_edges(shell)
            .into_iter()
            .any(|e| model.edge_faces(e).len() != 2)
        {
            mesh.mode = BotMode::Surface;
        }
        info!(
            triangles = mesh.faces.len(),
            vertices = mesh.vertices.len(),
            mode = ?mesh.mode,
            "exported BOT"
        );
        Ok(mesh)
    }
}
