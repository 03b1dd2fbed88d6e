//! Edge-collapse decimation of triangulated shells.

use tracing::{debug, info, instrument};

use super::cleanup::face_plane_from_loops;
use crate::config::{CollapseParams, KernelConfig};
use crate::topology::euler::{fuse_vertex, glue_faces, kill_face};
use crate::topology::model::{EdgeId, FaceId, FlagTable, Model, ShellId, VertexId};
use crate::Tolerance;

/// A legal collapse of `from` onto `to`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollapseCandidate {
    pub from: VertexId,
    pub to: VertexId,
    /// Largest distance of `to` from the pre-move plane of a moved triangle.
    pub deviation: f64,
    /// Smallest cosine between a moved triangle's normals before and after.
    pub min_cosine: f64,
}

fn triangle(model: &Model, face: FaceId) -> Option<[VertexId; 3]> {
    let loops = model.face_loopuses(face);
    let [lu] = loops.as_slice() else {
        return None;
    };
    <[VertexId; 3]>::try_from(model.lu_vertices(*lu)).ok()
}

fn on_boundary(model: &Model, v: VertexId) -> bool {
    model.vertex_edges(v).into_iter().any(|e| model.edge_is_free(e))
}

fn only_free_edges(model: &Model, v: VertexId) -> bool {
    model.vertex_edges(v).into_iter().all(|e| model.edge_is_free(e))
}

/// The only vertices adjacent to both ends are the apexes of the edge's triangles.
fn link_condition(model: &Model, a: VertexId, b: VertexId, faces: &[FaceId]) -> bool {
    let apexes: Vec<VertexId> = faces
        .iter()
        .filter_map(|&f| triangle(model, f))
        .flat_map(|t| t.into_iter().filter(|&x| x != a && x != b))
        .collect();
    let from_b = model.vertex_neighbors(b);
    model
        .vertex_neighbors(a)
        .into_iter()
        .filter(|n| from_b.contains(n))
        .all(|n| apexes.contains(&n))
}

/// Score moving `from` onto `to`, or `None` if the move is illegal.
///
/// A moved triangle thinner than `tol.dist_sq` (twice its area) counts as
/// degenerate and makes the move illegal.
pub fn evaluate_collapse(
    model: &Model,
    edge: EdgeId,
    from: VertexId,
    to: VertexId,
    params: &CollapseParams,
    tol: &Tolerance,
) -> Option<CollapseCandidate> {
    let removed = model.edge_faces(edge);
    let target = model.vertices[to].point;
    let mut deviation: f64 = 0.0;
    let mut min_cosine: f64 = 1.0;
    for face in model.vertex_faces(from) {
        if removed.contains(&face) {
            continue;
        }
        let corners = triangle(model, face)?;
        let before = model.faces[face].plane;
        let [a, b, c] = corners.map(|v| if v == from { target } else { model.vertices[v].point });
        let normal = (b - a).cross(&(c - a));
        let twice_area = normal.length();
        if twice_area <= tol.dist_sq {
            return None;
        }
        deviation = deviation.max(before.distance(&target).abs());
        min_cosine = min_cosine.min(before.normal.dot(&normal) / twice_area);
    }
    if deviation > params.max_distance
        || min_cosine <= params.flip_dot_threshold
        || min_cosine < params.min_normal_cosine()
    {
        return None;
    }
    Some(CollapseCandidate {
        from,
        to,
        deviation,
        min_cosine,
    })
}

/// Best legal collapse of `edge`, checking topology before geometry.
pub fn choose_collapse(
    model: &Model,
    edge: EdgeId,
    params: &CollapseParams,
    tol: &Tolerance,
) -> Option<CollapseCandidate> {
    let faces = model.edge_faces(edge);
    if faces.is_empty() || faces.len() > 2 || faces.iter().any(|&f| triangle(model, f).is_none()) {
        return None;
    }
    let (a, b) = model.edge_vertices(edge);
    let free = model.edge_is_free(edge);
    if free && !(only_free_edges(model, a) && only_free_edges(model, b)) {
        return None;
    }
    if !link_condition(model, a, b, &faces) {
        return None;
    }

    let mut best: Option<CollapseCandidate> = None;
    for (from, to) in [(a, b), (b, a)] {
        if !free && on_boundary(model, from) {
            continue;
        }
        if let Some(candidate) = evaluate_collapse(model, edge, from, to, params, tol) {
            if best.is_none_or(|b| candidate.min_cosine > b.min_cosine) {
                best = Some(candidate);
            }
        }
    }
    best
}

/// Kill the edge's triangles, fuse `from` into `to` and rejoin duplicate edges.
fn apply_collapse(model: &mut Model, edge: EdgeId, candidate: CollapseCandidate, tol: &Tolerance) {
    for face in model.edge_faces(edge) {
        kill_face(model, face);
    }
    let CollapseCandidate { from, to, .. } = candidate;
    if !model.vertices.contains_key(to) {
        return;
    }
    if model.vertices.contains_key(from) {
        fuse_vertex(model, to, from);
    }
    let around = model.vertex_faces(to);
    glue_faces(model, &around, tol);
    for face in around {
        if let Some(plane) = face_plane_from_loops(model, face) {
            model.faces[face].plane = plane;
        }
    }
}

/// Collapse one edge if some direction is legal. Returns the surviving vertex.
pub fn collapse_edge(model: &mut Model, edge: EdgeId, params: &CollapseParams, tol: &Tolerance) -> Option<VertexId> {
    let candidate = choose_collapse(model, edge, params, tol)?;
    apply_collapse(model, edge, candidate, tol);
    Some(candidate.to)
}

/// Decimate a triangulated shell by repeated edge collapse.
///
/// Each sweep visits the edges still flagged as candidates; a collapse
/// re-flags the edges around the surviving vertex. Sweeps stop at a fixed
/// point or after `max_sweeps`. Returns the number of collapses.
#[instrument(skip(model, config))]
pub fn decimate_shell(model: &mut Model, shell: ShellId, config: &KernelConfig) -> usize {
    let params = &config.collapse;
    let tol = config.tolerance;
    let mut candidate = FlagTable::new(model);
    for edge in model.shell_edges(shell) {
        candidate.mark(model.edges[edge].index);
    }

    let mut total = 0;
    for sweep in 0..params.max_sweeps {
        let mut collapsed = 0;
        for edge in model.shell_edges(shell) {
            if !model.edges.contains_key(edge) {
                continue;
            }
            let index = model.edges[edge].index;
            if !candidate.is_set(index) {
                continue;
            }
            candidate.clear(index);
            let Some(kept) = collapse_edge(model, edge, params, &tol) else {
                continue;
            };
            collapsed += 1;
            if config.verbosity.is_verbose() {
                debug!(?edge, ?kept, "collapsed edge");
            }
            if !model.shells.contains_key(shell) {
                info!(collapsed = total + collapsed, "shell decimated away");
                return total + collapsed;
            }
            if model.vertices.contains_key(kept) {
                for face in model.vertex_faces(kept) {
                    for eu in model.face_edgeuses(face) {
                        candidate.mark(model.edges[model.edgeuses[eu].edge].index);
                    }
                }
            }
        }
        total += collapsed;
        debug!(sweep, collapsed, "collapse sweep");
        if collapsed == 0 {
            break;
        }
    }
    info!(collapsed = total, "decimated shell");
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::point::Point3d;
    use crate::topology::audit::audit_shell;
    use crate::topology::primitives::{make_grid, make_subdivided_box};

    fn boundary_count(model: &Model, shell: ShellId) -> usize {
        model
            .shell_vertices(shell)
            .into_iter()
            .filter(|&v| on_boundary(model, v))
            .count()
    }

    #[test]
    fn test_flat_grid_decimates_inside_fixed_boundary() {
        let mut model = Model::new();
        let config = KernelConfig::default();
        let (_, shell) = make_grid(&mut model, 4, 4, 1.0, &config.tolerance).unwrap();
        assert_eq!(boundary_count(&model, shell), 16);

        let collapsed = decimate_shell(&mut model, shell, &config);
        assert!(collapsed > 0);
        assert_eq!(model.shell_faces(shell).len(), 32 - 2 * collapsed);
        assert_eq!(boundary_count(&model, shell), 16);
        for face in model.shell_faces(shell) {
            assert!(model.faces[face].plane.normal.z > 0.999);
        }
        let audit = audit_shell(&model, shell, &config.tolerance);
        assert!(audit.all_valid(), "{:?}", audit.errors);
    }

    #[test]
    fn test_subdivided_box_keeps_its_shape() {
        let mut model = Model::new();
        let config = KernelConfig::default();
        let (_, shell) = make_subdivided_box(&mut model, 3, 3.0, &config.tolerance).unwrap();
        let before = model.shell_faces(shell).len();
        let collapsed = decimate_shell(&mut model, shell, &config);
        assert!(collapsed > 0);
        assert!(model.shell_faces(shell).len() < before);

        let on_surface = |p: &Point3d| {
            [p.x, p.y, p.z]
                .iter()
                .any(|&c| c.abs() < 1e-9 || (c - 3.0).abs() < 1e-9)
        };
        let vertices = model.shell_vertices(shell);
        assert!(vertices.iter().all(|&v| on_surface(&model.vertices[v].point)));
        let corners = vertices
            .iter()
            .filter(|&&v| {
                let p = model.vertices[v].point;
                [p.x, p.y, p.z].iter().all(|&c| c.abs() < 1e-9 || (c - 3.0).abs() < 1e-9)
            })
            .count();
        assert_eq!(corners, 8);
        let audit = audit_shell(&model, shell, &config.tolerance);
        assert!(audit.all_valid(), "{:?}", audit.errors);
    }

    #[test]
    fn test_raised_vertex_survives() {
        let mut model = Model::new();
        let config = KernelConfig::default();
        let (_, shell) = make_grid(&mut model, 4, 4, 1.0, &config.tolerance).unwrap();
        let bump = model
            .shell_vertices(shell)
            .into_iter()
            .find(|&v| model.vertices[v].point.distance_to(&Point3d::new(2.0, 2.0, 0.0)) < 1e-9)
            .unwrap();
        model.vertices[bump].point.z = 0.01;
        for face in model.vertex_faces(bump) {
            model.faces[face].plane = face_plane_from_loops(&model, face).unwrap();
        }

        decimate_shell(&mut model, shell, &config);
        assert!(model.vertices.contains_key(bump));
        assert!((model.vertices[bump].point.z - 0.01).abs() < 1e-12);
        assert!(audit_shell(&model, shell, &config.tolerance).all_valid());
    }

    #[test]
    fn test_winged_edge_with_boundary_ends_only_moves_interior() {
        let mut model = Model::new();
        let config = KernelConfig::default();
        let (_, shell) = make_grid(&mut model, 1, 1, 1.0, &config.tolerance).unwrap();
        let diagonal = model
            .shell_edges(shell)
            .into_iter()
            .find(|&e| model.edge_faces(e).len() == 2)
            .unwrap();
        assert!(choose_collapse(&model, diagonal, &config.collapse, &config.tolerance).is_none());
    }
}
