//! Make/kill primitives over the NMG graph.
//!
//! Every maker leaves the four graph invariants intact. Kill operations
//! cascade upward: a loop that loses its last edgeuse dies, a face that
//! loses its last loop dies, a shell that loses its last face dies.

use tracing::{debug, instrument};

use super::model::*;
use crate::error::{invariant_violation, KernelError};
use crate::geometry::bbox::BoundingBox;
use crate::geometry::plane::Plane;
use crate::geometry::point::Point3d;
use crate::geometry::vector::Vec3;
use crate::Tolerance;

/// Highest element a kill took down with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cascade {
    Nothing,
    Loop,
    Face,
    Shell,
}

// ─── Makers ─────────────────────────────────────────────────────────────────

pub fn make_region(model: &mut Model) -> (RegionId, ShellId) {
    let index = model.next_index();
    let region = model.regions.insert(Region {
        index,
        shells: vec![],
        bbox: BoundingBox::empty(),
    });
    let shell = make_shell(model, region);
    (region, shell)
}

pub fn make_shell(model: &mut Model, region: RegionId) -> ShellId {
    let index = model.next_index();
    let shell = model.shells.insert(Shell {
        index,
        region,
        faceuses: vec![],
        wire_loopuses: vec![],
        wire_edgeuses: vec![],
        vertexuse: None,
        bbox: BoundingBox::empty(),
    });
    model.regions[region].shells.push(shell);
    shell
}

/// A vertex with no uses yet. It is dropped again as soon as its last use dies.
pub fn make_vertex(model: &mut Model, point: Point3d) -> VertexId {
    let index = model.next_index();
    model.vertices.insert(Vertex {
        index,
        point,
        uses: vec![],
    })
}

fn new_vertexuse(model: &mut Model, vertex: VertexId, up: VertexUseParent) -> VertexUseId {
    let index = model.next_index();
    let vu = model.vertexuses.insert(VertexUse { index, up, vertex });
    model.vertices[vertex].uses.push(vu);
    vu
}

fn alloc_edgeuse(model: &mut Model, edge: EdgeId, up: EdgeUseParent, start: VertexId) -> EdgeUseId {
    let index = model.next_index();
    let eu = model.edgeuses.insert(EdgeUse {
        index,
        up,
        mate: EdgeUseId::default(),
        radial: EdgeUseId::default(),
        edge,
        vertexuse: VertexUseId::default(),
    });
    let vu = new_vertexuse(model, start, VertexUseParent::EdgeUse(eu));
    model.edgeuses[eu].vertexuse = vu;
    eu
}

/// New free edge: returns `(a->b, b->a)`.
fn new_edge_pair(
    model: &mut Model,
    a: VertexId,
    b: VertexId,
    up: EdgeUseParent,
    mate_up: EdgeUseParent,
) -> (EdgeUseId, EdgeUseId) {
    let index = model.next_index();
    let edge = model.edges.insert(Edge {
        index,
        edgeuse: EdgeUseId::default(),
    });
    let eu = alloc_edgeuse(model, edge, up, a);
    let mate = alloc_edgeuse(model, edge, mate_up, b);
    for (x, y) in [(eu, mate), (mate, eu)] {
        let e = &mut model.edgeuses[x];
        e.mate = y;
        e.radial = y;
    }
    model.edges[edge].edgeuse = eu;
    (eu, mate)
}

fn new_loop_pair(
    model: &mut Model,
    up: LoopUseParent,
    mate_up: LoopUseParent,
    orientation: Orientation,
) -> (LoopUseId, LoopUseId) {
    let index = model.next_index();
    let lp = model.loops.insert(Loop {
        index,
        loopuse: LoopUseId::default(),
        bbox: BoundingBox::empty(),
    });
    let alloc = |model: &mut Model, up: LoopUseParent| {
        let index = model.next_index();
        model.loopuses.insert(LoopUse {
            index,
            up,
            mate: LoopUseId::default(),
            orientation,
            lp,
            contents: LoopContents::Edges(vec![]),
        })
    };
    let lu = alloc(model, up);
    let mate = alloc(model, mate_up);
    model.loopuses[lu].mate = mate;
    model.loopuses[mate].mate = lu;
    model.loops[lp].loopuse = lu;
    (lu, mate)
}

fn check_polygon(verts: &[VertexId]) -> Result<(), KernelError> {
    if verts.len() < 3 {
        return Err(KernelError::DegenerateFace {
            face: None,
            reason: format!("a loop needs at least 3 vertices, got {}", verts.len()),
        });
    }
    let n = verts.len();
    if (0..n).any(|i| verts[i] == verts[(i + 1) % n]) {
        return Err(KernelError::DegenerateFace {
            face: None,
            reason: "consecutive loop vertices repeat".into(),
        });
    }
    Ok(())
}

/// Build a loopuse pair through `verts` on `fu` (forward) and its mate (reversed).
fn build_face_loop(
    model: &mut Model,
    fu: FaceUseId,
    verts: &[VertexId],
    orientation: Orientation,
) -> LoopUseId {
    let mate_fu = model.faceuses[fu].mate;
    let (lu, lu_mate) = new_loop_pair(
        model,
        LoopUseParent::FaceUse(fu),
        LoopUseParent::FaceUse(mate_fu),
        orientation,
    );
    let n = verts.len();
    let mut forward = Vec::with_capacity(n);
    let mut backward = Vec::with_capacity(n);
    for i in 0..n {
        let (eu, mate) = new_edge_pair(
            model,
            verts[i],
            verts[(i + 1) % n],
            EdgeUseParent::LoopUse(lu),
            EdgeUseParent::LoopUse(lu_mate),
        );
        forward.push(eu);
        backward.push(mate);
    }
    backward.reverse();
    model.loopuses[lu].contents = LoopContents::Edges(forward);
    model.loopuses[lu_mate].contents = LoopContents::Edges(backward);
    model.faceuses[fu].loopuses.push(lu);
    model.faceuses[mate_fu].loopuses.push(lu_mate);
    lu
}

fn alloc_face(model: &mut Model, shell: ShellId, plane: Plane) -> FaceId {
    let face_index = model.next_index();
    let face = model.faces.insert(Face {
        index: face_index,
        plane,
        faceuse: FaceUseId::default(),
        bbox: BoundingBox::empty(),
    });
    let alloc = |model: &mut Model, orientation: Orientation| {
        let index = model.next_index();
        model.faceuses.insert(FaceUse {
            index,
            shell,
            face,
            mate: FaceUseId::default(),
            orientation,
            loopuses: vec![],
        })
    };
    let same = alloc(model, Orientation::Same);
    let opposite = alloc(model, Orientation::Opposite);
    model.faceuses[same].mate = opposite;
    model.faceuses[opposite].mate = same;
    model.faces[face].faceuse = same;
    model.shells[shell].faceuses.extend([same, opposite]);
    face
}

/// New face with one exterior loop through `verts`.
///
/// The plane is the Newell fit of the loop, so the outward side follows the
/// right-hand rule over `verts`. Edges start free; see [`glue_faces`].
#[instrument(skip(model, verts), fields(n = verts.len()))]
pub fn make_face(model: &mut Model, shell: ShellId, verts: &[VertexId]) -> Result<FaceId, KernelError> {
    check_polygon(verts)?;
    let points: Vec<Point3d> = verts.iter().map(|&v| model.vertices[v].point).collect();
    let plane = Plane::from_polygon(&points).ok_or_else(|| KernelError::DegenerateFace {
        face: None,
        reason: format!("loop through {points:?} has zero area"),
    })?;
    let face = alloc_face(model, shell, plane);
    let same = model.faces[face].faceuse;
    build_face_loop(model, same, verts, Orientation::Same);
    model.rebound_face(face);
    debug!(?face, "made face");
    Ok(face)
}

/// Add a loop (hole or extra exterior) to an existing face.
pub fn add_face_loop(
    model: &mut Model,
    face: FaceId,
    verts: &[VertexId],
    orientation: Orientation,
) -> Result<LoopUseId, KernelError> {
    check_polygon(verts)?;
    let fu = model.face_same_fu(face);
    let lu = build_face_loop(model, fu, verts, orientation);
    model.rebound_face(face);
    Ok(lu)
}

/// New face taking over existing loopuses (given from their `Same` side).
///
/// The plane is fitted to the first loop.
pub fn make_face_from_loops(
    model: &mut Model,
    shell: ShellId,
    loopuses: &[LoopUseId],
) -> Result<FaceId, KernelError> {
    let first = *loopuses.first().ok_or_else(|| KernelError::DegenerateFace {
        face: None,
        reason: "no loops to build a face from".into(),
    })?;
    let plane = Plane::from_polygon(&model.lu_points(first)).ok_or_else(|| KernelError::DegenerateFace {
        face: None,
        reason: "first loop has zero area".into(),
    })?;
    let face = alloc_face(model, shell, plane);
    let same = model.faces[face].faceuse;
    let opposite = model.faceuses[same].mate;
    for &lu in loopuses {
        let mate = model.loopuses[lu].mate;
        detach_loopuse(model, lu);
        detach_loopuse(model, mate);
        model.loopuses[lu].up = LoopUseParent::FaceUse(same);
        model.loopuses[mate].up = LoopUseParent::FaceUse(opposite);
        model.faceuses[same].loopuses.push(lu);
        model.faceuses[opposite].loopuses.push(mate);
    }
    model.rebound_face(face);
    Ok(face)
}

/// A wire edge owned directly by the shell.
pub fn make_wire_edge(model: &mut Model, shell: ShellId, a: VertexId, b: VertexId) -> EdgeId {
    let up = EdgeUseParent::Shell(shell);
    let (eu, mate) = new_edge_pair(model, a, b, up, up);
    model.shells[shell].wire_edgeuses.extend([eu, mate]);
    model.edgeuses[eu].edge
}

/// A wire loop: a point loop for one vertex, an edge loop otherwise.
pub fn make_wire_loop(model: &mut Model, shell: ShellId, verts: &[VertexId]) -> Result<LoopUseId, KernelError> {
    let up = LoopUseParent::Shell(shell);
    if let [v] = verts {
        let (lu, mate) = new_loop_pair(model, up, up, Orientation::Same);
        for x in [lu, mate] {
            let vu = new_vertexuse(model, *v, VertexUseParent::LoopUse(x));
            model.loopuses[x].contents = LoopContents::Vertex(vu);
        }
        model.shells[shell].wire_loopuses.extend([lu, mate]);
        return Ok(lu);
    }
    check_polygon(verts)?;
    let (lu, lu_mate) = new_loop_pair(model, up, up, Orientation::Same);
    let n = verts.len();
    let mut forward = Vec::with_capacity(n);
    let mut backward = Vec::with_capacity(n);
    for i in 0..n {
        let (eu, mate) = new_edge_pair(
            model,
            verts[i],
            verts[(i + 1) % n],
            EdgeUseParent::LoopUse(lu),
            EdgeUseParent::LoopUse(lu_mate),
        );
        forward.push(eu);
        backward.push(mate);
    }
    backward.reverse();
    model.loopuses[lu].contents = LoopContents::Edges(forward);
    model.loopuses[lu_mate].contents = LoopContents::Edges(backward);
    model.shells[shell].wire_loopuses.extend([lu, lu_mate]);
    Ok(lu)
}

/// Give the shell its single lone vertex; an existing one is replaced.
pub fn make_lone_vertex(model: &mut Model, shell: ShellId, v: VertexId) -> VertexUseId {
    if let Some(old) = model.shells[shell].vertexuse.take() {
        kill_vertexuse(model, old);
    }
    let vu = new_vertexuse(model, v, VertexUseParent::Shell(shell));
    model.shells[shell].vertexuse = Some(vu);
    vu
}

/// Insert a free edge `a->b` at `pos` in `lu`, mirrored into the mate loopuse.
///
/// The loop stays closed only if the caller's surrounding edits make it so.
pub fn insert_loop_edge(model: &mut Model, lu: LoopUseId, pos: usize, a: VertexId, b: VertexId) -> EdgeUseId {
    let lu_mate = model.loopuses[lu].mate;
    let (eu, mate) = new_edge_pair(
        model,
        a,
        b,
        EdgeUseParent::LoopUse(lu),
        EdgeUseParent::LoopUse(lu_mate),
    );
    let n = model.lu_edgeuses(lu).len();
    match &mut model.loopuses[lu].contents {
        LoopContents::Edges(list) => list.insert(pos, eu),
        LoopContents::Vertex(_) => invariant_violation("cannot insert an edge into a point loop"),
    }
    if let LoopContents::Edges(list) = &mut model.loopuses[lu_mate].contents {
        list.insert(n - pos, mate);
    }
    eu
}

// ─── Kill ───────────────────────────────────────────────────────────────────

fn kill_vertexuse(model: &mut Model, vu: VertexUseId) {
    let Some(use_) = model.vertexuses.remove(vu) else {
        invariant_violation(format!("vertexuse {vu:?} killed twice"));
    };
    let vertex = &mut model.vertices[use_.vertex];
    vertex.uses.retain(|&x| x != vu);
    if vertex.uses.is_empty() {
        model.vertices.remove(use_.vertex);
    }
}

fn detach_edgeuse(model: &mut Model, eu: EdgeUseId) {
    match model.edgeuses[eu].up {
        EdgeUseParent::LoopUse(lu) => {
            if let LoopContents::Edges(list) = &mut model.loopuses[lu].contents {
                list.retain(|&x| x != eu);
            }
        }
        EdgeUseParent::Shell(s) => model.shells[s].wire_edgeuses.retain(|&x| x != eu),
    }
}

fn detach_loopuse(model: &mut Model, lu: LoopUseId) {
    match model.loopuses[lu].up {
        LoopUseParent::FaceUse(fu) => model.faceuses[fu].loopuses.retain(|&x| x != lu),
        LoopUseParent::Shell(s) => model.shells[s].wire_loopuses.retain(|&x| x != lu),
    }
}

/// Remove an edgeuse pair from its radial cycle and parents, no cascade.
fn unlink_edgeuse_pair(model: &mut Model, eu: EdgeUseId) {
    let mate = model.edgeuses[eu].mate;
    let edge = model.edgeuses[eu].edge;
    let r = model.edgeuses[eu].radial;
    let rm = model.edgeuses[mate].radial;
    if r == mate {
        model.edges.remove(edge);
    } else {
        model.edgeuses[r].radial = rm;
        model.edgeuses[rm].radial = r;
        let head = model.edges[edge].edgeuse;
        if head == eu || head == mate {
            model.edges[edge].edgeuse = r;
        }
    }
    for x in [eu, mate] {
        detach_edgeuse(model, x);
        let vu = model.edgeuses[x].vertexuse;
        kill_vertexuse(model, vu);
        model.edgeuses.remove(x);
    }
}

/// Kill an edgeuse and its mate, cascading to an emptied loop.
pub fn kill_edgeuse_pair(model: &mut Model, eu: EdgeUseId) -> Cascade {
    let lu = model.eu_loopuse(eu);
    unlink_edgeuse_pair(model, eu);
    match lu {
        Some(lu) if model.lu_edgeuses(lu).is_empty() => kill_loopuse(model, lu),
        _ => Cascade::Nothing,
    }
}

fn unlink_loopuse_pair(model: &mut Model, lu: LoopUseId) {
    let mate = model.loopuses[lu].mate;
    match model.loopuses[lu].contents.clone() {
        LoopContents::Edges(list) => {
            for eu in list {
                if model.edgeuses.contains_key(eu) {
                    unlink_edgeuse_pair(model, eu);
                }
            }
        }
        LoopContents::Vertex(_) => {
            for x in [lu, mate] {
                if let LoopContents::Vertex(vu) = model.loopuses[x].contents {
                    kill_vertexuse(model, vu);
                }
            }
        }
    }
    let lp = model.loopuses[lu].lp;
    for x in [lu, mate] {
        detach_loopuse(model, x);
        model.loopuses.remove(x);
    }
    model.loops.remove(lp);
}

/// Kill a loopuse pair, cascading to an emptied face.
pub fn kill_loopuse(model: &mut Model, lu: LoopUseId) -> Cascade {
    let fu = model.lu_faceuse(lu);
    let shell = model.lu_shell(lu);
    unlink_loopuse_pair(model, lu);
    match fu {
        Some(fu) if model.faceuses[fu].loopuses.is_empty() => {
            let face = model.faceuses[fu].face;
            kill_face(model, face)
        }
        Some(_) => Cascade::Loop,
        None if shell_is_empty(model, shell) => {
            kill_shell(model, shell);
            Cascade::Shell
        }
        None => Cascade::Loop,
    }
}

pub fn shell_is_empty(model: &Model, shell: ShellId) -> bool {
    let s = &model.shells[shell];
    s.faceuses.is_empty() && s.wire_loopuses.is_empty() && s.wire_edgeuses.is_empty() && s.vertexuse.is_none()
}

/// Kill a face and both faceuses, cascading to an emptied shell.
pub fn kill_face(model: &mut Model, face: FaceId) -> Cascade {
    let same = model.faces[face].faceuse;
    let opposite = model.faceuses[same].mate;
    let shell = model.faceuses[same].shell;
    for lu in model.faceuses[same].loopuses.clone() {
        unlink_loopuse_pair(model, lu);
    }
    model.shells[shell].faceuses.retain(|&x| x != same && x != opposite);
    model.faceuses.remove(same);
    model.faceuses.remove(opposite);
    model.faces.remove(face);
    if shell_is_empty(model, shell) {
        kill_shell(model, shell);
        Cascade::Shell
    } else {
        Cascade::Face
    }
}

pub fn kill_shell(model: &mut Model, shell: ShellId) {
    for face in model.shell_faces(shell) {
        let same = model.faces[face].faceuse;
        let opposite = model.faceuses[same].mate;
        for lu in model.faceuses[same].loopuses.clone() {
            unlink_loopuse_pair(model, lu);
        }
        model.faceuses.remove(same);
        model.faceuses.remove(opposite);
        model.faces.remove(face);
    }
    while let Some(&lu) = model.shells[shell].wire_loopuses.first() {
        unlink_loopuse_pair(model, lu);
    }
    while let Some(&eu) = model.shells[shell].wire_edgeuses.first() {
        unlink_edgeuse_pair(model, eu);
    }
    if let Some(vu) = model.shells[shell].vertexuse.take() {
        kill_vertexuse(model, vu);
    }
    let region = model.shells[shell].region;
    model.regions[region].shells.retain(|&s| s != shell);
    model.shells.remove(shell);
    debug!(?shell, "killed shell");
}

pub fn kill_region(model: &mut Model, region: RegionId) {
    for shell in model.regions[region].shells.clone() {
        kill_shell(model, shell);
    }
    model.regions.remove(region);
}

// ─── Vertices ───────────────────────────────────────────────────────────────

/// Retarget one vertexuse; the old vertex dies with its last use.
pub fn move_vertexuse(model: &mut Model, vu: VertexUseId, to: VertexId) {
    let from = model.vertexuses[vu].vertex;
    if from == to {
        return;
    }
    let old = &mut model.vertices[from];
    old.uses.retain(|&x| x != vu);
    if old.uses.is_empty() {
        model.vertices.remove(from);
    }
    model.vertices[to].uses.push(vu);
    model.vertexuses[vu].vertex = to;
}

/// Move every use of `other` onto `keep`; `other` is destroyed.
pub fn fuse_vertex(model: &mut Model, keep: VertexId, other: VertexId) {
    if keep == other {
        return;
    }
    for vu in model.vertices[other].uses.clone() {
        move_vertexuse(model, vu, keep);
    }
    if model.vertices.contains_key(other) {
        model.vertices.remove(other);
    }
}

// ─── Faces and Shells ───────────────────────────────────────────────────────

/// Swap the faceuse orientations and negate the plane.
pub fn flip_face(model: &mut Model, face: FaceId) {
    let same = model.faces[face].faceuse;
    let opposite = model.faceuses[same].mate;
    for fu in [same, opposite] {
        let o = model.faceuses[fu].orientation;
        model.faceuses[fu].orientation = o.flipped();
    }
    let plane = model.faces[face].plane;
    model.faces[face].plane = plane.flipped();
}

/// Move a face (both faceuses) to `dst`, cascading to an emptied source.
pub fn move_face_to_shell(model: &mut Model, face: FaceId, dst: ShellId) -> Cascade {
    let same = model.faces[face].faceuse;
    let opposite = model.faceuses[same].mate;
    let src = model.faceuses[same].shell;
    if src == dst {
        return Cascade::Nothing;
    }
    model.shells[src].faceuses.retain(|&x| x != same && x != opposite);
    for fu in [same, opposite] {
        model.faceuses[fu].shell = dst;
        model.shells[dst].faceuses.push(fu);
    }
    if shell_is_empty(model, src) {
        kill_shell(model, src);
        Cascade::Shell
    } else {
        Cascade::Nothing
    }
}

/// Move everything in `src` into `dst` and kill `src`.
pub fn join_shells(model: &mut Model, dst: ShellId, src: ShellId) {
    if dst == src {
        return;
    }
    let moved = std::mem::take(&mut model.shells[src].faceuses);
    for &fu in &moved {
        model.faceuses[fu].shell = dst;
    }
    model.shells[dst].faceuses.extend(moved);

    let loops = std::mem::take(&mut model.shells[src].wire_loopuses);
    for &lu in &loops {
        model.loopuses[lu].up = LoopUseParent::Shell(dst);
    }
    model.shells[dst].wire_loopuses.extend(loops);

    let wires = std::mem::take(&mut model.shells[src].wire_edgeuses);
    for &eu in &wires {
        model.edgeuses[eu].up = EdgeUseParent::Shell(dst);
    }
    model.shells[dst].wire_edgeuses.extend(wires);

    if let Some(vu) = model.shells[src].vertexuse.take() {
        if model.shells[dst].vertexuse.is_none() {
            model.vertexuses[vu].up = VertexUseParent::Shell(dst);
            model.shells[dst].vertexuse = Some(vu);
        } else {
            kill_vertexuse(model, vu);
        }
    }
    kill_shell(model, src);
}

// ─── Radial Join ────────────────────────────────────────────────────────────

/// Merge `other` into `keep` (same endpoints) and rebuild the radial order.
#[instrument(skip(model, tol))]
pub fn join_edges(model: &mut Model, keep: EdgeId, other: EdgeId, tol: &Tolerance) {
    if keep == other {
        return;
    }
    let (a, b) = model.edge_vertices(keep);
    let (c, d) = model.edge_vertices(other);
    if !((a == c && b == d) || (a == d && b == c)) {
        invariant_violation(format!("joining edges {keep:?} and {other:?} with different endpoints"));
    }
    let mut uses = model.edge_uses(keep);
    for eu in model.edge_uses(other) {
        model.edgeuses[eu].edge = keep;
        uses.push(eu);
    }
    model.edges.remove(other);
    link_radial(model, keep, &uses, tol);
}

/// Re-sort the uses of `edge` around it by face angle.
pub fn sort_radial(model: &mut Model, edge: EdgeId, tol: &Tolerance) {
    let uses = model.edge_uses(edge);
    link_radial(model, edge, &uses, tol);
}

/// Give each shell its own copy of an edge whose uses span several shells.
///
/// Returns the edges created; the uses of the first shell keep `edge`.
pub fn split_edge_by_shell(model: &mut Model, edge: EdgeId, tol: &Tolerance) -> Vec<EdgeId> {
    let uses = model.edge_uses(edge);
    let mut groups: Vec<(ShellId, Vec<EdgeUseId>)> = Vec::new();
    for eu in uses {
        let shell = model.eu_shell(eu);
        match groups.iter_mut().find(|(s, _)| *s == shell) {
            Some((_, list)) => list.push(eu),
            None => groups.push((shell, vec![eu])),
        }
    }
    if groups.len() < 2 {
        return vec![];
    }
    let mut created = Vec::new();
    for (_, group) in &groups[1..] {
        let index = model.next_index();
        let new_edge = model.edges.insert(Edge {
            index,
            edgeuse: group[0],
        });
        link_radial(model, new_edge, group, tol);
        created.push(new_edge);
    }
    model.edges[edge].edgeuse = groups[0].1[0];
    link_radial(model, edge, &groups[0].1, tol);
    created
}

#[derive(Debug, Clone, Copy)]
struct RadialEntry {
    plus: EdgeUseId,
    minus: EdgeUseId,
    angle: f64,
}

/// Link `uses` (complete mate pairs) in angular order about the edge.
///
/// Each pair contributes its `a->b` use (`plus`) and the mate. With pairs
/// sorted by the angle of their face interior, `plus[i]` and `minus[i+1]`
/// bound the same wedge of space and become radial partners. Faces that
/// coincide in angle are permuted so that wedge partners agree in
/// orientation wherever possible.
fn link_radial(model: &mut Model, edge: EdgeId, uses: &[EdgeUseId], tol: &Tolerance) {
    let head = model.edges[edge].edgeuse;
    let a = model.eu_start(head);
    let axis = model.eu_vector(head).normalized();

    let mut entries: Vec<RadialEntry> = Vec::new();
    for &eu in uses {
        if entries.iter().any(|e| e.plus == eu || e.minus == eu) {
            continue;
        }
        let mate = model.edgeuses[eu].mate;
        let (plus, minus) = if model.eu_start(eu) == a { (eu, mate) } else { (mate, eu) };
        entries.push(RadialEntry {
            plus,
            minus,
            angle: 0.0,
        });
    }

    if let Some(d) = axis {
        let interiors: Vec<Vec3> = entries
            .iter()
            .map(|e| match model.eu_faceuse(e.plus) {
                Some(fu) => model.fu_plane(fu).normal.cross(&d),
                None => Vec3::ZERO,
            })
            .collect();
        if let Some(reference) = interiors.iter().find(|w| w.length_squared() > 0.0).copied() {
            for (entry, w) in entries.iter_mut().zip(&interiors) {
                let mut angle = d.dot(&reference.cross(w)).atan2(reference.dot(w));
                if angle < 0.0 {
                    angle += std::f64::consts::TAU;
                }
                if angle > std::f64::consts::PI && angle.cos() >= tol.para {
                    angle -= std::f64::consts::TAU;
                }
                entry.angle = angle;
            }
        }
        entries.sort_by(|x, y| x.angle.total_cmp(&y.angle));
        resolve_coincident(model, &mut entries, tol);
    }

    let n = entries.len();
    for i in 0..n {
        let p = entries[i].plus;
        let m = entries[(i + 1) % n].minus;
        model.edgeuses[p].radial = m;
        model.edgeuses[m].radial = p;
    }
    for e in &entries {
        model.edgeuses[e.plus].edge = edge;
        model.edgeuses[e.minus].edge = edge;
    }
}

fn wedge_score(model: &Model, entries: &[RadialEntry]) -> usize {
    let n = entries.len();
    (0..n)
        .filter(|&i| {
            let p = model.eu_orientation(entries[i].plus);
            let m = model.eu_orientation(entries[(i + 1) % n].minus);
            p != Orientation::Unspecified && p == m
        })
        .count()
}

fn permutations(n: usize) -> Vec<Vec<usize>> {
    if n <= 1 {
        return vec![(0..n).collect()];
    }
    let mut out = Vec::new();
    for rest in permutations(n - 1) {
        for slot in 0..n {
            let mut p = rest.clone();
            p.insert(slot, n - 1);
            out.push(p);
        }
    }
    out
}

fn resolve_coincident(model: &Model, entries: &mut [RadialEntry], tol: &Tolerance) {
    let mut start = 0;
    while start < entries.len() {
        let mut end = start + 1;
        // Same direction only: faces half a turn apart bound different wedges.
        while end < entries.len() && (entries[end].angle - entries[start].angle).cos() >= tol.para {
            end += 1;
        }
        let size = end - start;
        if (2..=4).contains(&size) {
            let original: Vec<RadialEntry> = entries[start..end].to_vec();
            let mut best = (wedge_score(model, entries), (0..size).collect::<Vec<_>>());
            for perm in permutations(size) {
                for (slot, &k) in perm.iter().enumerate() {
                    entries[start + slot] = original[k];
                }
                let score = wedge_score(model, entries);
                if score > best.0 {
                    best = (score, perm);
                }
            }
            for (slot, &k) in best.1.iter().enumerate() {
                entries[start + slot] = original[k];
            }
        }
        start = end;
    }
}

/// Radially join every edge of `faces` with any other edge on the same vertex pair.
#[instrument(skip_all, fields(faces = faces.len()))]
pub fn glue_faces(model: &mut Model, faces: &[FaceId], tol: &Tolerance) -> usize {
    let mut joined = 0;
    for &face in faces {
        if !model.faces.contains_key(face) {
            continue;
        }
        for eu in model.face_edgeuses(face) {
            if !model.edgeuses.contains_key(eu) {
                continue;
            }
            let edge = model.edgeuses[eu].edge;
            let (a, b) = model.edge_vertices(edge);
            for other in model.edges_between(a, b) {
                if other != edge {
                    join_edges(model, edge, other, tol);
                    joined += 1;
                }
            }
        }
    }
    debug!(joined, "glued faces");
    joined
}
