//! Small repairs shared by the larger algorithms.

use nmg_solver::newell_normal;
use tracing::{debug, info, instrument};

use crate::error::KernelError;
use crate::geometry::plane::Plane;
use crate::geometry::point::Point3d;
use crate::geometry::polygon::point_in_polygon_3d;
use crate::geometry::vector::Vec3;
use crate::topology::euler::{fuse_vertex, glue_faces, kill_edgeuse_pair, make_face_from_loops};
use crate::topology::model::{EdgeId, FaceId, LoopUseId, Model, Orientation, ShellId, VertexId};
use crate::Tolerance;

/// Fuse every pair of shell vertices closer than `tol.dist`.
///
/// Edges that become duplicates are radially joined and edges that collapse
/// to a point are removed. Returns the number of vertices fused away.
#[instrument(skip(model, tol))]
pub fn fuse_vertices(model: &mut Model, shell: ShellId, tol: &Tolerance) -> usize {
    let vertices = model.shell_vertices(shell);
    let mut fused = 0;
    let mut kept: Vec<VertexId> = Vec::new();
    for v in vertices {
        if !model.vertices.contains_key(v) {
            continue;
        }
        let point = model.vertices[v].point;
        match kept
            .iter()
            .find(|&&k| tol.points_coincident(&model.vertices[k].point, &point))
        {
            Some(&k) => {
                fuse_vertex(model, k, v);
                fused += 1;
            }
            None => kept.push(v),
        }
    }
    if fused > 0 {
        kill_zero_length_edges(model, shell, tol);
        let faces = model.shell_faces(shell);
        glue_faces(model, &faces, tol);
        kill_cracks(model, shell);
    }
    debug!(fused, "fused vertices");
    fused
}

fn remove_edge(model: &mut Model, edge: EdgeId) {
    while model.edges.contains_key(edge) {
        let eu = model.edges[edge].edgeuse;
        kill_edgeuse_pair(model, eu);
    }
}

/// Remove edges shorter than `tol.dist`, fusing their endpoints first.
pub fn kill_zero_length_edges(model: &mut Model, shell: ShellId, tol: &Tolerance) -> usize {
    let mut killed = 0;
    for edge in model.shell_edges(shell) {
        if !model.edges.contains_key(edge) || !tol.is_zero_length(model.edge_length(edge)) {
            continue;
        }
        let (a, b) = model.edge_vertices(edge);
        fuse_vertex(model, a, b);
        remove_edge(model, edge);
        killed += 1;
    }
    if killed > 0 {
        debug!(killed, "removed zero-length edges");
    }
    killed
}

/// Out-and-back edgeuse pair in a loop, if any.
fn find_crack(model: &Model, lu: LoopUseId) -> Option<usize> {
    let list = model.lu_edgeuses(lu);
    let n = list.len();
    (0..n).find(|&i| n > 1 && model.edgeuses[list[i]].edge == model.edgeuses[list[(i + 1) % n]].edge)
}

/// Remove every crack from the face loops of `shell`. Returns the number removed.
pub fn kill_cracks(model: &mut Model, shell: ShellId) -> usize {
    let mut killed = 0;
    'scan: loop {
        if !model.shells.contains_key(shell) {
            break;
        }
        for face in model.shell_faces(shell) {
            for lu in model.face_loopuses(face) {
                let Some(i) = find_crack(model, lu) else {
                    continue;
                };
                let list = model.lu_edgeuses(lu);
                let (a, b) = (list[i], list[(i + 1) % list.len()]);
                kill_edgeuse_pair(model, a);
                if model.edgeuses.contains_key(b) {
                    kill_edgeuse_pair(model, b);
                }
                killed += 1;
                continue 'scan;
            }
        }
        break;
    }
    if killed > 0 {
        debug!(killed, "removed cracks");
    }
    killed
}

/// Give each exterior loop of `face` its own face; holes follow the exterior
/// that contains them. Returns the faces created.
pub fn split_disjoint_loops(model: &mut Model, face: FaceId) -> Result<Vec<FaceId>, KernelError> {
    let exteriors = model.face_exterior_loopuses(face);
    if exteriors.len() < 2 {
        return Ok(vec![]);
    }
    let normal = model.faces[face].plane.normal;
    let holes: Vec<LoopUseId> = model
        .face_loopuses(face)
        .into_iter()
        .filter(|&lu| model.loopuses[lu].orientation == Orientation::Opposite)
        .collect();
    let owner_of = |model: &Model, hole: LoopUseId| -> usize {
        let Some(&sample) = model.lu_points(hole).first() else {
            return 0;
        };
        exteriors
            .iter()
            .position(|&ext| point_in_polygon_3d(&sample, &model.lu_points(ext), &normal))
            .unwrap_or(0)
    };
    let owners: Vec<usize> = holes.iter().map(|&h| owner_of(model, h)).collect();

    let shell = model.face_shell(face);
    let mut created = Vec::new();
    for (k, &ext) in exteriors.iter().enumerate().skip(1) {
        let mut group = vec![ext];
        group.extend(holes.iter().zip(&owners).filter(|&(_, &o)| o == k).map(|(&h, _)| h));
        let new_face = make_face_from_loops(model, shell, &group)?;
        if model.faces[new_face].plane.normal.dot(&normal) < 0.0 {
            model.faces[new_face].plane = model.faces[new_face].plane.flipped();
        }
        created.push(new_face);
    }
    model.rebound_face(face);
    info!(?face, created = created.len(), "split face with disjoint loops");
    Ok(created)
}

/// [`split_disjoint_loops`] over every face of a shell.
pub fn split_shell_disjoint_loops(model: &mut Model, shell: ShellId) -> Result<usize, KernelError> {
    let mut created = 0;
    for face in model.shell_faces(shell) {
        created += split_disjoint_loops(model, face)?.len();
    }
    Ok(created)
}

/// Recompute every bounding box in the model.
pub fn rebound(model: &mut Model) {
    let regions: Vec<_> = model.regions.keys().collect();
    for region in regions {
        model.rebound_region(region);
    }
}

/// Newell plane over all loops of the face's `Same` side.
///
/// Holes wind against the exterior and subtract from the normal. The sign
/// follows the loops, not the stored plane.
pub fn face_plane_from_loops(model: &Model, face: FaceId) -> Option<Plane> {
    let mut sum = Vec3::ZERO;
    let mut points: Vec<Point3d> = Vec::new();
    for lu in model.face_loopuses(face) {
        let loop_points = model.lu_points(lu);
        if loop_points.len() < 3 {
            continue;
        }
        let raw: Vec<[f64; 3]> = loop_points.iter().map(Point3d::to_array).collect();
        sum = sum + Vec3::from_array(newell_normal(&raw));
        points.extend(loop_points);
    }
    let centroid = Point3d::centroid(&points)?;
    Plane::from_point_normal(&centroid, sum)
}

/// Area of a loop, negative when it winds against its face's plane.
///
/// Loops outside faces report their unsigned area.
pub fn loop_area(model: &Model, lu: LoopUseId) -> f64 {
    let raw: Vec<[f64; 3]> = model.lu_points(lu).iter().map(Point3d::to_array).collect();
    if raw.len() < 3 {
        return 0.0;
    }
    let n = Vec3::from_array(newell_normal(&raw));
    let area = 0.5 * n.length();
    match model.lu_faceuse(lu) {
        Some(fu) if n.dot(&model.fu_plane(fu).normal) < 0.0 => -area,
        _ => area,
    }
}

/// Net area of a face: exterior loops minus holes.
pub fn face_area(model: &Model, face: FaceId) -> f64 {
    model
        .face_loopuses(face)
        .into_iter()
        .map(|lu| loop_area(model, lu))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::audit::audit_shell;
    use crate::topology::euler::{add_face_loop, make_face, make_region, make_vertex};
    use crate::topology::primitives::make_box_shell;
    use approx::assert_abs_diff_eq;

    fn square(model: &mut Model, x0: f64, y0: f64, size: f64) -> Vec<VertexId> {
        [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]
            .iter()
            .map(|&(x, y)| make_vertex(model, Point3d::new(x0 + x * size, y0 + y * size, 0.0)))
            .collect()
    }

    #[test]
    fn test_face_area_with_hole() {
        let mut model = Model::new();
        let (_, shell) = make_region(&mut model);
        let outer = square(&mut model, 0.0, 0.0, 4.0);
        let face = make_face(&mut model, shell, &outer).unwrap();
        let mut inner = square(&mut model, 1.0, 1.0, 1.0);
        inner.reverse();
        add_face_loop(&mut model, face, &inner, Orientation::Opposite).unwrap();
        assert_abs_diff_eq!(face_area(&model, face), 15.0, epsilon = 1e-12);
        let plane = face_plane_from_loops(&model, face).unwrap();
        assert_abs_diff_eq!(plane.normal.z, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(plane.d, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_split_disjoint_loops_keeps_holes_with_owner() {
        let mut model = Model::new();
        let (_, shell) = make_region(&mut model);
        let left = square(&mut model, 0.0, 0.0, 3.0);
        let face = make_face(&mut model, shell, &left).unwrap();
        let right = square(&mut model, 10.0, 0.0, 3.0);
        add_face_loop(&mut model, face, &right, Orientation::Same).unwrap();
        let mut hole = square(&mut model, 11.0, 1.0, 1.0);
        hole.reverse();
        add_face_loop(&mut model, face, &hole, Orientation::Opposite).unwrap();

        let created = split_disjoint_loops(&mut model, face).unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(model.face_loopuses(face).len(), 1);
        assert_eq!(model.face_loopuses(created[0]).len(), 2);
        assert_abs_diff_eq!(face_area(&model, face), 9.0, epsilon = 1e-12);
        assert_abs_diff_eq!(face_area(&model, created[0]), 8.0, epsilon = 1e-12);
        assert!(model.faces[created[0]].plane.normal.z > 0.0);
    }

    #[test]
    fn test_fuse_vertices_glues_coincident_faces() {
        let mut model = Model::new();
        let tol = Tolerance::default();
        let (_, shell) = make_region(&mut model);
        let a = square(&mut model, 0.0, 0.0, 1.0);
        let b = square(&mut model, 1.0, 0.0, 1.0);
        model.vertices[b[0]].point.x += 1e-5;
        model.vertices[b[3]].point.x -= 1e-5;
        make_face(&mut model, shell, &a).unwrap();
        make_face(&mut model, shell, &b).unwrap();

        assert_eq!(fuse_vertices(&mut model, shell, &tol), 2);
        assert_eq!(model.shell_vertices(shell).len(), 6);
        let shared = model.edges_between(a[1], a[2]);
        assert_eq!(shared.len(), 1);
        assert_eq!(model.edge_faces(shared[0]).len(), 2);
        assert!(audit_shell(&model, shell, &tol).all_valid());
    }

    #[test]
    fn test_kill_zero_length_edge() {
        let mut model = Model::new();
        let tol = Tolerance::default();
        let (_, boxed) = make_box_shell(&mut model, Point3d::ORIGIN, Point3d::new(1.0, 1.0, 1.0), &tol).unwrap();
        assert_eq!(kill_zero_length_edges(&mut model, boxed, &tol), 0);

        let (_, shell) = make_region(&mut model);
        let mut v = square(&mut model, 5.0, 5.0, 1.0);
        v.push(make_vertex(&mut model, Point3d::new(5.0, 5.0 + 1e-5, 0.0)));
        let face = make_face(&mut model, shell, &v).unwrap();
        assert_eq!(kill_zero_length_edges(&mut model, shell, &tol), 1);
        let lu = model.face_loopuses(face)[0];
        assert_eq!(model.lu_edgeuses(lu).len(), 4);
        assert!(audit_shell(&model, shell, &tol).all_valid());
    }

    #[test]
    fn test_kill_crack() {
        let mut model = Model::new();
        let tol = Tolerance::default();
        let (_, shell) = make_region(&mut model);
        let v = square(&mut model, 0.0, 0.0, 1.0);
        let tail = make_vertex(&mut model, Point3d::new(2.0, 0.5, 0.0));
        // v1 -> tail -> v1 hangs off the square.
        let face = make_face(&mut model, shell, &[v[0], v[1], tail, v[1], v[2], v[3]]).unwrap();
        glue_faces(&mut model, &[face], &tol);
        assert!(!audit_shell(&model, shell, &tol).edges_valid);

        assert_eq!(kill_cracks(&mut model, shell), 1);
        let lu = model.face_loopuses(face)[0];
        assert_eq!(model.lu_vertices(lu), v);
        assert!(!model.vertices.contains_key(tail));
        assert!(audit_shell(&model, shell, &tol).all_valid());
    }
}
