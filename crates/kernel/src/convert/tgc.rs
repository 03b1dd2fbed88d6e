//! Right circular cylinders and truncated cones faceted as n-gon prisms and frustums.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{check_convex, refuse, require_winged, simple_faces, CanonicalShape, ShapeKind, SimpleFace};
use crate::error::KernelError;
use crate::geometry::point::Point3d;
use crate::geometry::vector::Vec3;
use crate::topology::model::{Model, ShellId, VertexId};
use crate::Tolerance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TgcForm {
    /// Equal cap radii.
    Rcc,
    Trc,
}

/// Base center `v`, axis `h`, base radius vectors `a`/`b` and the parallel
/// top radius vectors `c`/`d`, with `a x b` along `h`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TgcSolid {
    pub form: TgcForm,
    pub v: [f64; 3],
    pub h: [f64; 3],
    pub a: [f64; 3],
    pub b: [f64; 3],
    pub c: [f64; 3],
    pub d: [f64; 3],
}

impl TgcSolid {
    pub fn base_radius(&self) -> f64 {
        Vec3::from_array(self.a).length()
    }

    pub fn top_radius(&self) -> f64 {
        Vec3::from_array(self.c).length()
    }
}

/// Two faces of equal vertex count, facing opposite ways, that together
/// hold every vertex and are joined only by quads spanning both.
fn find_caps<'a>(
    faces: &'a [SimpleFace],
    vertex_count: usize,
    tol: &Tolerance,
) -> Option<(&'a SimpleFace, &'a SimpleFace)> {
    for (i, base) in faces.iter().enumerate() {
        for top in &faces[i + 1..] {
            let n = base.verts.len();
            if top.verts.len() != n || 2 * n != vertex_count || faces.len() != n + 2 {
                continue;
            }
            if base.plane.normal.dot(&top.plane.normal) > -tol.para {
                continue;
            }
            if base.verts.iter().any(|v| top.verts.contains(v)) {
                continue;
            }
            let spans = |f: &SimpleFace| {
                f.verts.len() == 4
                    && f.verts.iter().filter(|v| base.verts.contains(v)).count() == 2
                    && f.verts.iter().filter(|v| top.verts.contains(v)).count() == 2
            };
            let sides_ok = faces
                .iter()
                .filter(|f| f.face != base.face && f.face != top.face)
                .all(spans);
            if sides_ok {
                return Some((base, top));
            }
        }
    }
    None
}

/// Center and mean radius of a cap, or `None` if it is not circular.
fn circle(model: &Model, verts: &[VertexId], tol: &Tolerance) -> Option<(Point3d, f64)> {
    let points: Vec<Point3d> = verts.iter().map(|&v| model.vertices[v].point).collect();
    let center = Point3d::centroid(&points)?;
    let radii: Vec<f64> = points.iter().map(|p| p.distance_to(&center)).collect();
    let mean = radii.iter().sum::<f64>() / radii.len() as f64;
    radii
        .iter()
        .all(|r| (r - mean).abs() <= tol.dist)
        .then_some((center, mean))
}

impl CanonicalShape for TgcSolid {
    const KIND: ShapeKind = ShapeKind::Tgc;

    #[instrument(skip(model, tol))]
    fn from_shell(model: &Model, shell: ShellId, tol: &Tolerance) -> Result<Self, KernelError> {
        let faces = simple_faces(model, shell, ShapeKind::Tgc, tol)?;
        require_winged(model, shell, ShapeKind::Tgc)?;
        check_convex(model, shell, ShapeKind::Tgc, tol)?;
        let vertex_count = model.shell_vertices(shell).len();
        let (base, top) =
            find_caps(&faces, vertex_count, tol).ok_or_else(|| refuse(shell, ShapeKind::Tgc, "no pair of end caps"))?;

        let (base_center, base_radius) =
            circle(model, &base.verts, tol).ok_or_else(|| refuse(shell, ShapeKind::Tgc, "base cap is not circular"))?;
        let (top_center, top_radius) =
            circle(model, &top.verts, tol).ok_or_else(|| refuse(shell, ShapeKind::Tgc, "top cap is not circular"))?;

        let h = top_center - base_center;
        let axis = h
            .normalized()
            .ok_or_else(|| refuse(shell, ShapeKind::Tgc, "caps share a center"))?;
        if !tol.is_parallel(axis.dot(&base.plane.normal)) {
            return Err(refuse(shell, ShapeKind::Tgc, "axis is not perpendicular to the caps"));
        }
        let a_dir = (model.vertices[base.verts[0]].point - base_center)
            .normalized()
            .ok_or_else(|| refuse(shell, ShapeKind::Tgc, "zero base radius"))?;
        let b_dir = axis.cross(&a_dir);

        let form = if (base_radius - top_radius).abs() <= tol.dist {
            TgcForm::Rcc
        } else {
            TgcForm::Trc
        };
        debug!(?form, base_radius, top_radius, sides = base.verts.len(), "recognized TGC");
        Ok(TgcSolid {
            form,
            v: base_center.to_array(),
            h: h.to_array(),
            a: (a_dir * base_radius).to_array(),
            b: (b_dir * base_radius).to_array(),
            c: (a_dir * top_radius).to_array(),
            d: (b_dir * top_radius).to_array(),
        })
    }
}
