//! Convex polyhedra of four to eight vertices (ARB4..ARB8).

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{check_convex, refuse, require_winged, simple_faces, CanonicalShape, ShapeKind, SimpleFace};
use crate::error::KernelError;
use crate::topology::model::{Model, ShellId, VertexId};
use crate::Tolerance;

/// An ARB in the eight-point layout: a base quad `0..4` and the points
/// above it `4..8`. Smaller forms repeat points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbSolid {
    /// Distinct points, 4 to 8.
    pub vertices: usize,
    pub points: [[f64; 3]; 8],
}

/// The single neighbor of each base vertex that is not on the base.
fn rise(model: &Model, shell_verts: &[VertexId], base: &[VertexId; 4]) -> Option<[VertexId; 4]> {
    let mut tops = [base[0]; 4];
    for (top, &b) in tops.iter_mut().zip(base) {
        let above: Vec<VertexId> = model
            .vertex_neighbors(b)
            .into_iter()
            .filter(|n| shell_verts.contains(n) && !base.contains(n))
            .collect();
        let [single] = above.as_slice() else {
            return None;
        };
        *top = *single;
    }
    Some(tops)
}

fn fits_layout(vertices: usize, t: &[VertexId; 4]) -> bool {
    let distinct3 = t[0] != t[1] && t[1] != t[2] && t[0] != t[2];
    match vertices {
        8 => distinct3 && t[3] != t[0] && t[3] != t[1] && t[3] != t[2],
        7 => distinct3 && t[3] == t[0],
        6 => t[0] == t[1] && t[2] == t[3] && t[0] != t[2],
        _ => false,
    }
}

/// Base quad (inward loop order) and the four points above it.
fn quad_layout(
    model: &Model,
    shell_verts: &[VertexId],
    faces: &[SimpleFace],
) -> Option<([VertexId; 4], [VertexId; 4])> {
    for face in faces.iter().filter(|f| f.verts.len() == 4) {
        let mut base = [face.verts[3], face.verts[2], face.verts[1], face.verts[0]];
        let Some(mut tops) = rise(model, shell_verts, &base) else {
            continue;
        };
        for _ in 0..4 {
            if fits_layout(shell_verts.len(), &tops) {
                return Some((base, tops));
            }
            base.rotate_left(1);
            tops.rotate_left(1);
        }
    }
    None
}

impl CanonicalShape for ArbSolid {
    const KIND: ShapeKind = ShapeKind::Arb;

    #[instrument(skip(model, tol))]
    fn from_shell(model: &Model, shell: ShellId, tol: &Tolerance) -> Result<Self, KernelError> {
        let faces = simple_faces(model, shell, ShapeKind::Arb, tol)?;
        require_winged(model, shell, ShapeKind::Arb)?;
        check_convex(model, shell, ShapeKind::Arb, tol)?;

        let verts = model.shell_vertices(shell);
        let tris = faces.iter().filter(|f| f.verts.len() == 3).count();
        let quads = faces.iter().filter(|f| f.verts.len() == 4).count();
        if tris + quads != faces.len() {
            return Err(refuse(shell, ShapeKind::Arb, "a face has more than four vertices"));
        }
        let nv = verts.len();
        let expected = match nv {
            4 => (0, 4),
            5 => (1, 4),
            6 => (3, 2),
            7 => (4, 2),
            8 => (6, 0),
            _ => return Err(refuse(shell, ShapeKind::Arb, format!("{nv} vertices"))),
        };
        if (quads, tris) != expected {
            return Err(refuse(
                shell,
                ShapeKind::Arb,
                format!("{nv} vertices with {quads} quads and {tris} triangles"),
            ));
        }

        let at = |v: VertexId| model.vertices[v].point.to_array();
        let apex = |used: &[VertexId]| verts.iter().copied().find(|v| !used.contains(v));
        let points = match nv {
            4 => {
                let base = &faces[0].verts;
                let (b0, b1, b2) = (base[2], base[1], base[0]);
                let a = apex(&[b0, b1, b2]).ok_or_else(|| refuse(shell, ShapeKind::Arb, "no apex"))?;
                [at(b0), at(b1), at(b2), at(b0), at(a), at(a), at(a), at(a)]
            }
            5 => {
                let Some(quad) = faces.iter().find(|f| f.verts.len() == 4) else {
                    return Err(refuse(shell, ShapeKind::Arb, "no base quad"));
                };
                let b: Vec<VertexId> = quad.verts.iter().rev().copied().collect();
                let a = apex(&b).ok_or_else(|| refuse(shell, ShapeKind::Arb, "no apex"))?;
                [at(b[0]), at(b[1]), at(b[2]), at(b[3]), at(a), at(a), at(a), at(a)]
            }
            _ => {
                let (b, t) = quad_layout(model, &verts, &faces)
                    .ok_or_else(|| refuse(shell, ShapeKind::Arb, format!("no ARB{nv} vertex layout")))?;
                [at(b[0]), at(b[1]), at(b[2]), at(b[3]), at(t[0]), at(t[1]), at(t[2]), at(t[3])]
            }
        };
        debug!(vertices = nv, "recognized ARB");
        Ok(ArbSolid { vertices: nv, points })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::point::Point3d;
    use crate::topology::euler::{flip_face, make_region};
    use crate::topology::primitives::{make_arb8, make_box_shell, make_frustum, make_polyhedron, make_tetrahedron};

    fn same_set(a: &[[f64; 3]], b: &[Point3d]) -> bool {
        let close = |p: &[f64; 3], q: &Point3d| Point3d::from_array(*p).distance_to(q) < 1e-9;
        a.iter().all(|p| b.iter().any(|q| close(p, q))) && b.iter().all(|q| a.iter().any(|p| close(p, q)))
    }

    #[test]
    fn test_arb8_round_trip() {
        let mut model = Model::new();
        let tol = Tolerance::default();
        let points = [
            Point3d::new(0.0, 0.0, 0.0),
            Point3d::new(2.0, 0.0, 0.0),
            Point3d::new(2.0, 2.0, 0.0),
            Point3d::new(0.0, 2.0, 0.0),
            Point3d::new(0.5, 0.5, 1.0),
            Point3d::new(1.5, 0.5, 1.0),
            Point3d::new(1.5, 1.5, 1.0),
            Point3d::new(0.5, 1.5, 1.0),
        ];
        let (_, shell) = make_arb8(&mut model, &points, &tol).unwrap();
        let arb = ArbSolid::from_shell(&model, shell, &tol).unwrap();
        assert_eq!(arb.vertices, 8);
        assert!(same_set(&arb.points, &points));
        let json = arb.to_json().unwrap();
        assert!(json.contains("\"vertices\": 8"));
    }

    #[test]
    fn test_tetrahedron_is_arb4() {
        let mut model = Model::new();
        let tol = Tolerance::default();
        let points = [
            Point3d::new(0.0, 0.0, 0.0),
            Point3d::new(1.0, 0.0, 0.0),
            Point3d::new(0.0, 1.0, 0.0),
            Point3d::new(0.0, 0.0, 1.0),
        ];
        let (_, shell) = make_tetrahedron(&mut model, &points, &tol).unwrap();
        let arb = ArbSolid::from_shell(&model, shell, &tol).unwrap();
        assert_eq!(arb.vertices, 4);
        assert_eq!(arb.points[3], arb.points[0]);
        assert!(arb.points[4..].iter().all(|p| *p == arb.points[4]));
        assert!(same_set(&arb.points, &points));
    }

    #[test]
    fn test_prism_is_arb6() {
        let mut model = Model::new();
        let tol = Tolerance::default();
        let (_, shell) = make_region(&mut model);
        let points = [
            Point3d::new(0.0, 0.0, 0.0),
            Point3d::new(1.0, 0.0, 0.0),
            Point3d::new(0.0, 1.0, 0.0),
            Point3d::new(0.0, 0.0, 2.0),
            Point3d::new(1.0, 0.0, 2.0),
            Point3d::new(0.0, 1.0, 2.0),
        ];
        let faces = vec![
            vec![0, 2, 1],
            vec![3, 4, 5],
            vec![0, 1, 4, 3],
            vec![1, 2, 5, 4],
            vec![2, 0, 3, 5],
        ];
        make_polyhedron(&mut model, shell, &points, &faces, &tol).unwrap();
        let arb = ArbSolid::from_shell(&model, shell, &tol).unwrap();
        assert_eq!(arb.vertices, 6);
        assert_eq!(arb.points[4], arb.points[5]);
        assert_eq!(arb.points[6], arb.points[7]);
        assert_ne!(arb.points[4], arb.points[6]);
        assert!(same_set(&arb.points, &points));
    }

    #[test]
    fn test_inverted_face_is_not_convex() {
        let mut model = Model::new();
        let tol = Tolerance::default();
        let (_, shell) = make_box_shell(&mut model, Point3d::ORIGIN, Point3d::new(1.0, 1.0, 1.0), &tol).unwrap();
        let face = model.shell_faces(shell)[0];
        flip_face(&mut model, face);
        let err = ArbSolid::from_shell(&model, shell, &tol).unwrap_err();
        assert!(matches!(err, KernelError::NotConvertible { target: ShapeKind::Arb, .. }));
    }

    #[test]
    fn test_hexagonal_prism_has_too_many_vertices() {
        let mut model = Model::new();
        let tol = Tolerance::default();
        let (_, shell) = make_frustum(&mut model, 6, 1.0, 1.0, 1.0, &tol).unwrap();
        assert!(ArbSolid::from_shell(&model, shell, &tol).is_err());
    }
}
