//! Vertex geometry solving.
//!
//! A vertex has to sit on every face plane that uses it. With up to three
//! distinct planes and no free edges the coordinate follows from a small
//! linear solve. Busier vertices are handled through the edge lines that
//! radiate from them: if the lines meet in one point the vertex moves there,
//! otherwise the vertex is replaced by one vertex per truncated line and the
//! gaps are closed with new edges and, for a closed fan, a cap facet.

use nmg_solver::{least_squares_point, solve3, PlaneEq};
use tracing::{debug, info, instrument, warn};

use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::geometry::plane::{Line3, Plane};
use crate::geometry::point::Point3d;
use crate::geometry::vector::Vec3;
use crate::topology::euler::{glue_faces, insert_loop_edge, make_face, make_vertex, move_vertexuse};
use crate::topology::model::{EdgeId, FaceId, FlagTable, LoopUseId, Model, ShellId, VertexId};
use crate::Tolerance;

/// Outcome of solving one vertex.
#[derive(Debug, Clone, PartialEq)]
pub enum VertexSolution {
    /// Already within tolerance of the solved coordinate.
    Unchanged,
    Moved { from: Point3d, to: Point3d },
    /// The vertex was replaced by `vertices`; `caps` are the new facets.
    Faceted { vertices: Vec<VertexId>, caps: Vec<FaceId> },
}

/// Distinct planes meeting at a vertex.
#[derive(Debug, Clone, Default)]
pub struct VertexPlanes {
    /// One entry per geometric plane, orientation ignored.
    pub planes: Vec<Plane>,
    pub faces: Vec<Vec<FaceId>>,
    /// Face edges at the vertex with a single face use.
    pub free_edges: Vec<EdgeId>,
}

pub fn vertex_planes(model: &Model, v: VertexId, tol: &Tolerance) -> VertexPlanes {
    let mut out = VertexPlanes::default();
    for face in model.vertex_faces(v) {
        let plane = model.faces[face].plane;
        match out.planes.iter().position(|p| p.is_coplanar(&plane, tol)) {
            Some(i) => out.faces[i].push(face),
            None => {
                out.planes.push(plane);
                out.faces.push(vec![face]);
            }
        }
    }
    out.free_edges = model
        .vertex_edges(v)
        .into_iter()
        .filter(|&e| model.edge_is_free(e) && !model.edge_faces(e).is_empty())
        .collect();
    out
}

/// Recompute the coordinate of `v` from the planes of its faces.
#[instrument(skip(model, config))]
pub fn solve_vertex(model: &mut Model, v: VertexId, config: &KernelConfig) -> Result<VertexSolution, KernelError> {
    let tol = config.tolerance;
    let point = model.vertices[v].point;
    let vp = vertex_planes(model, v, &tol);
    if vp.planes.len() > config.vertex.max_planes {
        warn!(?v, count = vp.planes.len(), "too many planes at vertex");
        return Err(KernelError::TooManyFaces {
            vertex: v,
            point,
            count: vp.planes.len(),
            limit: config.vertex.max_planes,
        });
    }
    if config.verbosity.is_verbose() {
        for (plane, faces) in vp.planes.iter().zip(&vp.faces) {
            debug!(?plane, ?faces, "vertex plane");
        }
    }
    if vp.planes.is_empty() {
        return Ok(VertexSolution::Unchanged);
    }

    if config.vertex.approximate {
        let target = solve_approximate(model, v, &vp, &tol)?;
        return Ok(move_vertex(model, v, target, &tol));
    }
    if vp.free_edges.is_empty() && vp.planes.len() <= 3 {
        let target = solve_simple(model, v, &vp.planes, &tol)?;
        return Ok(move_vertex(model, v, target, &tol));
    }
    solve_complex(model, v, &vp, &tol)
}

fn move_vertex(model: &mut Model, v: VertexId, to: Point3d, tol: &Tolerance) -> VertexSolution {
    let from = model.vertices[v].point;
    if tol.points_coincident(&from, &to) {
        return VertexSolution::Unchanged;
    }
    model.vertices[v].point = to;
    debug!(?v, ?from, ?to, "moved vertex");
    VertexSolution::Moved { from, to }
}

fn solve_simple(model: &Model, v: VertexId, planes: &[Plane], tol: &Tolerance) -> Result<Point3d, KernelError> {
    let point = model.vertices[v].point;
    match planes {
        [p] => Ok(p.project(&point)),
        [a, b] => Ok(two_planes(a, b, &point, tol)),
        [a, b, c] => three_planes(model, v, [a, b, c], tol),
        _ => Err(KernelError::IndeterminateVertex { vertex: v, point }),
    }
}

/// Intersection of two planes nearest `point`, or the mid-plane when parallel.
fn two_planes(a: &Plane, b: &Plane, point: &Point3d, tol: &Tolerance) -> Point3d {
    let cos = a.normal.dot(&b.normal);
    if tol.is_parallel(cos) {
        let b_d = if cos < 0.0 { -b.d } else { b.d };
        return Plane::new(a.normal, 0.5 * (a.d + b_d)).project(point);
    }
    let Some(n) = a.normal.cross(&b.normal).normalized() else {
        return a.project(point);
    };
    let third = Plane::new(n, n.dot(&point.to_vec3()));
    match solve3(&[a.to_eq(), b.to_eq(), third.to_eq()], tol.perp) {
        Ok(p) => Point3d::from_array(p),
        Err(err) => {
            debug!(%err, "two-plane solve fell back to projection");
            a.project(point)
        }
    }
}

fn three_planes(model: &Model, v: VertexId, planes: [&Plane; 3], tol: &Tolerance) -> Result<Point3d, KernelError> {
    let point = model.vertices[v].point;
    let eqs = [planes[0].to_eq(), planes[1].to_eq(), planes[2].to_eq()];
    match solve3(&eqs, tol.perp) {
        Ok(p) => return Ok(Point3d::from_array(p)),
        Err(err) => debug!(?v, %err, "singular three-plane vertex"),
    }

    for (i, j, k) in [(0, 1, 2), (0, 2, 1), (1, 2, 0)] {
        if planes[i].is_parallel(planes[j], tol) {
            continue;
        }
        let p = two_planes(planes[i], planes[j], &point, tol);
        if planes[k].contains(&p, tol) {
            return Ok(p);
        }
    }

    if let Some(p) = axis_aligned(model, v, &planes, tol) {
        return Ok(p);
    }
    warn!(?v, ?point, "indeterminate vertex");
    Err(KernelError::IndeterminateVertex { vertex: v, point })
}

/// The vertex and all its neighbors share one coordinate: hold it and solve the rest.
fn axis_aligned(model: &Model, v: VertexId, planes: &[&Plane], tol: &Tolerance) -> Option<Point3d> {
    let point = model.vertices[v].point;
    let neighbors = model.vertex_neighbors(v);
    for axis in 0..3 {
        let c = point.axis(axis);
        if !neighbors
            .iter()
            .all(|&n| (model.vertices[n].point.axis(axis) - c).abs() <= tol.dist)
        {
            continue;
        }
        let mut eqs: Vec<PlaneEq> = planes.iter().map(|p| p.to_eq()).collect();
        eqs.push(Plane::new(Vec3::axis(axis), c).to_eq());
        let Ok(fit) = least_squares_point(&eqs, point.to_array(), tol.perp) else {
            continue;
        };
        if fit.rank == 3 && fit.max_residual <= tol.dist {
            debug!(?v, axis, "axis-aligned vertex solve");
            return Some(Point3d::from_array(fit.point));
        }
    }
    None
}

/// Least-squares point over the planes plus one side plane per free edge.
fn solve_approximate(model: &Model, v: VertexId, vp: &VertexPlanes, tol: &Tolerance) -> Result<Point3d, KernelError> {
    let point = model.vertices[v].point;
    let mut eqs: Vec<PlaneEq> = vp.planes.iter().map(Plane::to_eq).collect();
    for &edge in &vp.free_edges {
        let Some(&face) = model.edge_faces(edge).first() else {
            continue;
        };
        let dir = model.eu_vector(model.edges[edge].edgeuse);
        if let Some(side) = model.faces[face].plane.normal.cross(&dir).normalized() {
            eqs.push(Plane::new(side, side.dot(&point.to_vec3())).to_eq());
        }
    }
    let fit = least_squares_point(&eqs, point.to_array(), tol.perp)?;
    debug!(?v, rank = fit.rank, residual = fit.max_residual, "least-squares vertex");
    Ok(Point3d::from_array(fit.point))
}

/// Line along `edge` through the planes of its faces, pointing away from `v`.
fn edge_line(model: &Model, v: VertexId, edge: EdgeId, tol: &Tolerance) -> Option<Line3> {
    let point = model.vertices[v].point;
    let eu = model.edge_uses(edge).into_iter().find(|&eu| model.eu_start(eu) == v)?;
    let dir = model.eu_vector(eu);
    let planes: Vec<Plane> = model
        .edge_faces(edge)
        .into_iter()
        .map(|f| model.faces[f].plane)
        .collect();
    for (i, a) in planes.iter().enumerate() {
        for b in &planes[i + 1..] {
            if let Some(line) = a.intersect(b, tol) {
                return Some(line.anchored(&point, &dir));
            }
        }
    }
    let plane = planes.first()?;
    let along = dir.reject_from(&plane.normal).normalized()?;
    Some(Line3::new(plane.project(&point), along))
}

/// Crossing of `lines[i]` with another line or a plane nearest its anchor.
fn truncate(lines: &[Line3], planes: &[Plane], i: usize, tol: &Tolerance) -> Point3d {
    let line = &lines[i];
    let mut candidates: Vec<f64> = Vec::new();
    for (j, other) in lines.iter().enumerate() {
        if j == i {
            continue;
        }
        if let Some((t, s)) = line.closest_params(other, tol) {
            if tol.points_coincident(&line.at(t), &other.at(s)) {
                candidates.push(t);
            }
        }
    }
    candidates.extend(planes.iter().filter_map(|p| line.intersect_plane(p, tol)));
    let t = candidates
        .into_iter()
        .min_by(|a, b| a.abs().total_cmp(&b.abs()))
        .unwrap_or(0.0);
    line.at(t)
}

fn solve_complex(
    model: &mut Model,
    v: VertexId,
    vp: &VertexPlanes,
    tol: &Tolerance,
) -> Result<VertexSolution, KernelError> {
    let point = model.vertices[v].point;
    let mut edges: Vec<EdgeId> = Vec::new();
    let mut lines: Vec<Line3> = Vec::new();
    for edge in model.vertex_edges(v) {
        if model.edge_faces(edge).is_empty() {
            continue;
        }
        let Some(line) = edge_line(model, v, edge, tol) else {
            warn!(?v, ?edge, "edge at vertex has no usable direction");
            return Err(KernelError::UnorderedVertexFan {
                vertex: v,
                point,
                reason: format!("edge {edge:?} has no usable line"),
            });
        };
        edges.push(edge);
        lines.push(line);
    }
    if lines.is_empty() {
        return Ok(VertexSolution::Unchanged);
    }

    let targets: Vec<Point3d> = (0..lines.len()).map(|i| truncate(&lines, &vp.planes, i, tol)).collect();
    if targets.iter().all(|t| tol.points_coincident(t, &targets[0])) {
        let Some(center) = Point3d::centroid(&targets) else {
            return Ok(VertexSolution::Unchanged);
        };
        return Ok(move_vertex(model, v, center, tol));
    }

    Ok(facet_vertex(model, v, &edges, &targets, tol))
}

/// Replace `v` by one vertex per edge target and close the gaps.
fn facet_vertex(
    model: &mut Model,
    v: VertexId,
    edges: &[EdgeId],
    targets: &[Point3d],
    tol: &Tolerance,
) -> VertexSolution {
    let faces = model.vertex_faces(v);
    let shell: ShellId = model.face_shell(faces[0]);
    let loops: Vec<LoopUseId> = faces
        .iter()
        .flat_map(|&f| model.face_loopuses(f))
        .filter(|&lu| model.lu_vertices(lu).contains(&v))
        .collect();

    let mut created: Vec<VertexId> = Vec::new();
    for (&edge, target) in edges.iter().zip(targets) {
        let to = match created.iter().find(|&&c| tol.points_coincident(&model.vertices[c].point, target)) {
            Some(&c) => c,
            None => {
                let c = make_vertex(model, *target);
                created.push(c);
                c
            }
        };
        let starting: Vec<_> = model
            .edge_uses(edge)
            .into_iter()
            .filter(|&eu| model.eu_start(eu) == v)
            .collect();
        for eu in starting {
            let vu = model.edgeuses[eu].vertexuse;
            move_vertexuse(model, vu, to);
        }
    }

    // Each loop now jumps between two targets where it used to pass through v.
    let mut gaps: Vec<(VertexId, VertexId)> = Vec::new();
    for lu in loops {
        let mut pos = 0;
        while pos < model.lu_edgeuses(lu).len() {
            let list = model.lu_edgeuses(lu);
            let n = list.len();
            let (prev, cur) = (list[(pos + n - 1) % n], list[pos]);
            let (from, to) = (model.eu_end(prev), model.eu_start(cur));
            if from != to {
                insert_loop_edge(model, lu, pos, from, to);
                gaps.push((from, to));
                pos += 1;
            }
            pos += 1;
        }
    }

    let mut caps = Vec::new();
    match cap_cycle(&gaps) {
        Some(cycle) if cycle.len() >= 3 => caps = make_caps(model, shell, &cycle, tol),
        Some(_) => {}
        None => debug!(gaps = gaps.len(), "vertex fan is open, no cap"),
    }

    let mut touched = faces;
    touched.extend(caps.iter().copied());
    glue_faces(model, &touched, tol);
    model.rebound_shell(shell);
    info!(vertices = created.len(), caps = caps.len(), "faceted vertex");
    VertexSolution::Faceted {
        vertices: created,
        caps,
    }
}

/// Cap loop running against every gap edge, if the gaps close into one cycle.
fn cap_cycle(gaps: &[(VertexId, VertexId)]) -> Option<Vec<VertexId>> {
    let &(first_from, first_to) = gaps.first()?;
    let next = |at: VertexId| {
        let mut hits = gaps.iter().filter(|&&(_, to)| to == at);
        match (hits.next(), hits.next()) {
            (Some(&(from, _)), None) => Some(from),
            _ => None,
        }
    };
    let mut cycle = vec![first_to, first_from];
    let mut at = first_from;
    loop {
        let from = next(at)?;
        if from == first_to {
            break;
        }
        if cycle.len() > gaps.len() {
            return None;
        }
        cycle.push(from);
        at = from;
    }
    (cycle.len() == gaps.len()).then_some(cycle)
}

/// One planar cap, or a fan of triangles when the cycle is not planar.
fn make_caps(model: &mut Model, shell: ShellId, cycle: &[VertexId], tol: &Tolerance) -> Vec<FaceId> {
    let points: Vec<Point3d> = cycle.iter().map(|&c| model.vertices[c].point).collect();
    let planar = Plane::from_polygon(&points).is_some_and(|plane| points.iter().all(|p| plane.contains(p, tol)));
    let polygons: Vec<Vec<VertexId>> = if planar {
        vec![cycle.to_vec()]
    } else {
        (1..cycle.len() - 1)
            .map(|i| vec![cycle[0], cycle[i], cycle[i + 1]])
            .collect()
    };
    let mut caps = Vec::new();
    for polygon in polygons {
        match make_face(model, shell, &polygon) {
            Ok(face) => caps.push(face),
            Err(err) => debug!(%err, "skipping degenerate cap"),
        }
    }
    caps
}

/// Solve every vertex of `shell`, restarting the scan after each faceting.
///
/// Returns the number of vertices moved or faceted.
#[instrument(skip(model, config))]
pub fn solve_shell_vertices(model: &mut Model, shell: ShellId, config: &KernelConfig) -> Result<usize, KernelError> {
    let mut done = FlagTable::new(model);
    let mut changed = 0;
    'scan: loop {
        for v in model.shell_vertices(shell) {
            if !model.vertices.contains_key(v) || !done.mark(model.vertices[v].index) {
                continue;
            }
            match solve_vertex(model, v, config)? {
                VertexSolution::Unchanged => {}
                VertexSolution::Moved { .. } => changed += 1,
                VertexSolution::Faceted { vertices, .. } => {
                    changed += 1;
                    for c in vertices {
                        done.mark(model.vertices[c].index);
                    }
                    continue 'scan;
                }
            }
        }
        break;
    }
    let region = model.shells[shell].region;
    model.rebound_region(region);
    info!(changed, "solved shell vertices");
    Ok(changed)
}
