//! Legacy polygon solid export: facets of at most five vertices.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::{refuse, CanonicalShape, ShapeKind};
use crate::error::KernelError;
use crate::geometry::point::Point3d;
use crate::geometry::polygon::{project_to_2d, triangulate};
use crate::geometry::vector::Vec3;
use crate::topology::model::{Model, ShellId};
use crate::Tolerance;

/// Largest facet the format holds.
pub const MAX_FACET_VERTICES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolyFacet {
    pub vertices: Vec<[f64; 3]>,
    /// Per-vertex normals; the face normal for a planar facet.
    pub normals: Vec<[f64; 3]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolySolid {
    pub facets: Vec<PolyFacet>,
}

fn facet(points: &[Point3d], normal: &Vec3) -> PolyFacet {
    PolyFacet {
        vertices: points.iter().map(Point3d::to_array).collect(),
        normals: vec![normal.to_array(); points.len()],
    }
}

/// Every fan triangle from the first point turns the same way as the polygon.
fn is_convex_fan(points: &[Point3d], normal: &Vec3) -> bool {
    points
        .windows(2)
        .skip(1)
        .all(|w| (w[0] - points[0]).cross(&(w[1] - points[0])).dot(normal) > 0.0)
}

/// Convex polygons are cut into fans of up to five points sharing the first
/// point; anything else is ear-clipped.
fn split_polygon(points: &[Point3d], normal: &Vec3) -> Option<Vec<Vec<Point3d>>> {
    if points.len() <= MAX_FACET_VERTICES {
        return Some(vec![points.to_vec()]);
    }
    if is_convex_fan(points, normal) {
        let mut pieces = Vec::new();
        let mut start = 1;
        while start + 1 < points.len() {
            let end = (start + MAX_FACET_VERTICES - 1).min(points.len());
            let mut piece = vec![points[0]];
            piece.extend_from_slice(&points[start..end]);
            pieces.push(piece);
            start = end - 1;
        }
        return Some(pieces);
    }
    let flat = project_to_2d(points, normal);
    let triangles = triangulate(&flat)?;
    Some(
        triangles
            .into_iter()
            .map(|t| t.iter().map(|&k| points[k]).collect())
            .collect(),
    )
}

impl CanonicalShape for PolySolid {
    const KIND: ShapeKind = ShapeKind::PolySolid;

    #[instrument(skip(model, _tol))]
    fn from_shell(model: &Model, shell: ShellId, _tol: &Tolerance) -> Result<Self, KernelError> {
        let mut facets = Vec::new();
        for face in model.shell_faces(shell) {
            let loops = model.face_loopuses(face);
            let [lu] = loops.as_slice() else {
                return Err(refuse(shell, ShapeKind::PolySolid, format!("face {face:?} has holes")));
            };
            let normal = model.faces[face].plane.normal;
            let points = model.lu_points(*lu);
            let pieces = split_polygon(&points, &normal).ok_or_else(|| {
                refuse(shell, ShapeKind::PolySolid, format!("face {face:?} cannot be split"))
            })?;
            if pieces.len() > 1 {
                debug!(?face, pieces = pieces.len(), "split large face");
            }
            facets.extend(pieces.iter().map(|p| facet(p, &normal)));
        }
        if facets.is_empty() {
            return Err(refuse(shell, ShapeKind::PolySolid, "shell has no faces"));
        }
        info!(facets = facets.len(), "exported polygon solid");
        Ok(PolySolid { facets })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::euler::{make_face, make_region, make_vertex};
    use crate::topology::primitives::{make_box_shell, make_frustum};

    #[test]
    fn test_box_keeps_its_quads() {
        let mut model = Model::new();
        let tol = Tolerance::default();
        let (_, shell) = make_box_shell(&mut model, Point3d::ORIGIN, Point3d::new(1.0, 1.0, 1.0), &tol).unwrap();
        let solid = PolySolid::from_shell(&model, shell, &tol).unwrap();
        assert_eq!(solid.facets.len(), 6);
        assert!(solid.facets.iter().all(|f| f.vertices.len() == 4 && f.normals.len() == 4));
    }

    #[test]
    fn test_octagon_caps_are_fanned() {
        let mut model = Model::new();
        let tol = Tolerance::default();
        let (_, shell) = make_frustum(&mut model, 8, 1.0, 1.0, 1.0, &tol).unwrap();
        let solid = PolySolid::from_shell(&model, shell, &tol).unwrap();
        // 8 sides, two pieces per cap.
        assert_eq!(solid.facets.len(), 12);
        assert!(solid.facets.iter().all(|f| f.vertices.len() <= MAX_FACET_VERTICES));
        let cap_vertices: usize = solid
            .facets
            .iter()
            .filter(|f| f.normals[0][2].abs() > 0.5)
            .map(|f| f.vertices.len())
            .sum();
        assert_eq!(cap_vertices, 2 * 10);
    }

    #[test]
    fn test_concave_face_is_ear_clipped() {
        let mut model = Model::new();
        let tol = Tolerance::default();
        let (_, shell) = make_region(&mut model);
        // The fan from (3, 0) would leave the L.
        let outline = [
            (3.0, 0.0),
            (3.0, 1.0),
            (1.0, 1.0),
            (1.0, 3.0),
            (0.0, 3.0),
            (0.0, 0.0),
        ];
        let verts: Vec<_> = outline
            .iter()
            .map(|&(x, y)| make_vertex(&mut model, Point3d::new(x, y, 0.0)))
            .collect();
        make_face(&mut model, shell, &verts).unwrap();
        let solid = PolySolid::from_shell(&model, shell, &tol).unwrap();
        assert_eq!(solid.facets.len(), 4);
        assert!(solid.facets.iter().all(|f| f.vertices.len() == 3));
        assert!(solid.to_json().unwrap().contains("facets"));
    }
}
