//! Stitching one open shell onto the boundary of another.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, info, instrument, warn};

use crate::error::KernelError;
use crate::topology::euler::{fuse_vertex, glue_faces, join_shells, make_face};
use crate::topology::model::{EdgeId, EdgeUseId, FaceId, Model, Orientation, ShellId, VertexId};
use crate::Tolerance;

/// What [`connect_open_shells`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectReport {
    pub fused: usize,
    pub glued: usize,
    pub bridged: usize,
}

fn same_side_use(model: &Model, edge: EdgeId) -> Option<EdgeUseId> {
    model
        .edge_uses(edge)
        .into_iter()
        .find(|&eu| model.eu_face(eu).is_some() && model.eu_orientation(eu) == Orientation::Same)
}

fn boundary_vertices(model: &Model, edges: &[EdgeId]) -> Vec<VertexId> {
    let mut out = Vec::new();
    for &edge in edges {
        let (a, b) = model.edge_vertices(edge);
        for v in [a, b] {
            if !out.contains(&v) {
                out.push(v);
            }
        }
    }
    out
}

/// Shortest walk `from -> .. -> to` over boundary edges traversed against
/// their outward use, so a face through it agrees with its neighbors.
fn boundary_path(model: &Model, edges: &[EdgeId], from: VertexId, to: VertexId) -> Option<Vec<VertexId>> {
    // step[c] lists n such that some outward use runs n -> c.
    let mut steps: HashMap<VertexId, Vec<VertexId>> = HashMap::new();
    for &edge in edges {
        if let Some(eu) = same_side_use(model, edge) {
            steps.entry(model.eu_end(eu)).or_default().push(model.eu_start(eu));
        }
    }
    let mut previous: HashMap<VertexId, VertexId> = HashMap::new();
    let mut queue = VecDeque::from([from]);
    while let Some(current) = queue.pop_front() {
        if current == to {
            let mut path = vec![to];
            let mut at = to;
            while at != from {
                at = previous[&at];
                path.push(at);
            }
            path.reverse();
            return Some(path);
        }
        for &next in steps.get(&current).into_iter().flatten() {
            if next != from && !previous.contains_key(&next) {
                previous.insert(next, current);
                queue.push_back(next);
            }
        }
    }
    None
}

/// Merge `src` into `dst` and close the seam between them.
///
/// Boundary vertices of `src` within `tol.dist` of a boundary vertex of `dst`
/// are fused onto it and free edges with matching ends are glued. A remaining
/// free edge of `src` whose ends both sit on the `dst` boundary is bridged by
/// a filler face through the `dst` boundary path between them. `src` no
/// longer exists afterwards.
#[instrument(skip(model, tol))]
pub fn connect_open_shells(
    model: &mut Model,
    dst: ShellId,
    src: ShellId,
    tol: &Tolerance,
) -> Result<ConnectReport, KernelError> {
    let mut report = ConnectReport::default();
    if dst == src {
        return Ok(report);
    }
    let src_faces: Vec<FaceId> = model.shell_faces(src);
    let src_boundary = boundary_vertices(model, &model.shell_free_edges(src));
    let dst_boundary = boundary_vertices(model, &model.shell_free_edges(dst));

    join_shells(model, dst, src);

    for v in src_boundary {
        if !model.vertices.contains_key(v) || dst_boundary.contains(&v) {
            continue;
        }
        let p = model.vertices[v].point;
        let nearest = dst_boundary
            .iter()
            .copied()
            .filter(|&w| model.vertices.contains_key(w))
            .map(|w| (w, model.vertices[w].point.distance_squared_to(&p)))
            .filter(|&(_, d2)| d2 <= tol.dist_sq)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((w, _)) = nearest {
            fuse_vertex(model, w, v);
            report.fused += 1;
        }
    }

    let faces = model.shell_faces(dst);
    report.glued = glue_faces(model, &faces, tol);

    let is_src = |model: &Model, edge: EdgeId| {
        model.edge_faces(edge).iter().all(|f| src_faces.contains(f))
    };
    let free = model.shell_free_edges(dst);
    let (open_src, open_dst): (Vec<EdgeId>, Vec<EdgeId>) = free.into_iter().partition(|&e| is_src(model, e));
    let seam = boundary_vertices(model, &open_dst);

    let mut fillers = Vec::new();
    for edge in open_src {
        if !model.edges.contains_key(edge) || !model.edge_is_free(edge) {
            continue;
        }
        let Some(eu) = same_side_use(model, edge) else {
            continue;
        };
        let (a, b) = (model.eu_start(eu), model.eu_end(eu));
        if !(seam.contains(&a) && seam.contains(&b)) {
            continue;
        }
        let Some(path) = boundary_path(model, &open_dst, a, b) else {
            let (from_point, to_point) = (model.vertices[a].point, model.vertices[b].point);
            warn!(?a, ?b, "no boundary path to bridge free edge");
            return Err(KernelError::NoPath {
                from: a,
                from_point,
                to: b,
                to_point,
            });
        };
        if path.len() < 3 {
            continue;
        }
        let mut loop_verts = vec![b];
        loop_verts.extend_from_slice(&path[..path.len() - 1]);
        debug!(?edge, n = loop_verts.len(), "bridging free edge");
        fillers.push(make_face(model, dst, &loop_verts)?);
        report.bridged += 1;
    }
    if !fillers.is_empty() {
        let faces = model.shell_faces(dst);
        report.glued += glue_faces(model, &faces, tol);
    }

    let region = model.shells[dst].region;
    model.rebound_region(region);
    info!(
        fused = report.fused,
        glued = report.glued,
        bridged = report.bridged,
        "connected shells"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::point::Point3d;
    use crate::topology::audit::audit_shell;
    use crate::topology::euler::{make_region, make_vertex};

    fn face_shell(model: &mut Model, points: &[[f64; 3]]) -> ShellId {
        let (_, shell) = make_region(model);
        let verts: Vec<VertexId> = points
            .iter()
            .map(|&p| make_vertex(model, Point3d::from_array(p)))
            .collect();
        make_face(model, shell, &verts).unwrap();
        shell
    }

    #[test]
    fn test_nudged_neighbors_are_fused_and_glued() {
        let mut model = Model::new();
        let tol = Tolerance::default();
        let dst = face_shell(&mut model, &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]]);
        let src = face_shell(
            &mut model,
            &[[1.00001, 0.0, 0.0], [2.0, 0.0, 0.0], [2.0, 1.0, 0.0], [1.00001, 1.0, 0.0]],
        );
        let report = connect_open_shells(&mut model, dst, src, &tol).unwrap();
        assert_eq!(report.fused, 2);
        assert_eq!(report.glued, 1);
        assert_eq!(report.bridged, 0);
        assert!(!model.shells.contains_key(src));
        assert_eq!(model.shell_faces(dst).len(), 2);
        assert_eq!(model.shell_free_edges(dst).len(), 6);
        assert!(audit_shell(&model, dst, &tol).all_valid());
    }

    fn wedge(model: &mut Model) -> (ShellId, [VertexId; 3]) {
        let (_, shell) = make_region(model);
        let p0 = make_vertex(model, Point3d::new(0.0, 0.0, 0.0));
        let m = make_vertex(model, Point3d::new(1.0, 0.0, -1.0));
        let q = make_vertex(model, Point3d::new(1.0, -1.0, -1.0));
        let p2 = make_vertex(model, Point3d::new(2.0, 0.0, 0.0));
        let a = make_face(model, shell, &[m, p0, q]).unwrap();
        let b = make_face(model, shell, &[p2, m, q]).unwrap();
        glue_faces(model, &[a, b], &Tolerance::default());
        (shell, [p0, m, p2])
    }

    #[test]
    fn test_free_edge_is_bridged_through_boundary_path() {
        let mut model = Model::new();
        let tol = Tolerance::default();
        let (dst, [p0, m, p2]) = wedge(&mut model);
        let src = face_shell(&mut model, &[[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [2.0, 2.0, 0.0], [0.0, 2.0, 0.0]]);

        let report = connect_open_shells(&mut model, dst, src, &tol).unwrap();
        assert_eq!(report.fused, 2);
        assert_eq!(report.bridged, 1);
        assert_eq!(model.shell_faces(dst).len(), 4);
        for (a, b) in [(p0, m), (m, p2), (p0, p2)] {
            let edges = model.edges_between(a, b);
            assert_eq!(edges.len(), 1);
            assert_eq!(model.edge_faces(edges[0]).len(), 2);
        }
        let audit = audit_shell(&model, dst, &tol);
        assert!(audit.all_valid(), "{:?}", audit.errors);
    }

    #[test]
    fn test_disconnected_boundary_reports_no_path() {
        let mut model = Model::new();
        let tol = Tolerance::default();
        let dst = face_shell(&mut model, &[[1.0, 0.0, -1.0], [0.0, 0.0, 0.0], [1.0, -1.0, -1.0]]);
        let other = face_shell(&mut model, &[[2.0, 0.0, 0.0], [3.0, 0.0, -1.0], [3.0, -1.0, -1.0]]);
        join_shells(&mut model, dst, other);
        let src = face_shell(&mut model, &[[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [2.0, 2.0, 0.0], [0.0, 2.0, 0.0]]);

        let err = connect_open_shells(&mut model, dst, src, &tol).unwrap_err();
        assert!(matches!(err, KernelError::NoPath { .. }));
    }
}
