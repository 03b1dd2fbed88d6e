use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};

use crate::error::invariant_violation;
use crate::geometry::bbox::BoundingBox;
use crate::geometry::plane::Plane;
use crate::geometry::point::Point3d;
use crate::geometry::vector::Vec3;

// ─── Entity Keys ─────────────────────────────────────────────────────────────

new_key_type! {
    pub struct RegionId;
    pub struct ShellId;
    pub struct FaceId;
    pub struct FaceUseId;
    pub struct LoopId;
    pub struct LoopUseId;
    pub struct EdgeId;
    pub struct EdgeUseId;
    pub struct VertexId;
    pub struct VertexUseId;
}

/// Side of a face or sense of a loop.
///
/// On faceuses `Same` is the outward side. On loopuses `Same` is an exterior
/// boundary and `Opposite` a hole; both mates of a loop carry the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    Same,
    Opposite,
    Unspecified,
}

impl Orientation {
    pub fn flipped(self) -> Self {
        match self {
            Orientation::Same => Orientation::Opposite,
            Orientation::Opposite => Orientation::Same,
            Orientation::Unspecified => Orientation::Unspecified,
        }
    }
}

// ─── Topological Entities ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub index: usize,
    pub shells: Vec<ShellId>,
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shell {
    pub index: usize,
    pub region: RegionId,
    /// Both faceuses of every face in the shell.
    pub faceuses: Vec<FaceUseId>,
    pub wire_loopuses: Vec<LoopUseId>,
    pub wire_edgeuses: Vec<EdgeUseId>,
    pub vertexuse: Option<VertexUseId>,
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Face {
    pub index: usize,
    /// Outward plane of the `Same` faceuse.
    pub plane: Plane,
    pub faceuse: FaceUseId,
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceUse {
    pub index: usize,
    pub shell: ShellId,
    pub face: FaceId,
    pub mate: FaceUseId,
    pub orientation: Orientation,
    pub loopuses: Vec<LoopUseId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loop {
    pub index: usize,
    pub loopuse: LoopUseId,
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopUseParent {
    FaceUse(FaceUseId),
    Shell(ShellId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopContents {
    /// Edgeuses in traversal order; the mate loopuse holds their mates reversed.
    Edges(Vec<EdgeUseId>),
    /// A point loop.
    Vertex(VertexUseId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopUse {
    pub index: usize,
    pub up: LoopUseParent,
    pub mate: LoopUseId,
    pub orientation: Orientation,
    pub lp: LoopId,
    pub contents: LoopContents,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub index: usize,
    pub edgeuse: EdgeUseId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeUseParent {
    LoopUse(LoopUseId),
    Shell(ShellId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeUse {
    pub index: usize,
    pub up: EdgeUseParent,
    /// Runs the other way, on the other side of the same face (or wire).
    pub mate: EdgeUseId,
    /// Neighbor across the wedge of space on this use's side.
    pub radial: EdgeUseId,
    pub edge: EdgeId,
    /// Use of the start vertex.
    pub vertexuse: VertexUseId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vertex {
    pub index: usize,
    pub point: Point3d,
    pub uses: Vec<VertexUseId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VertexUseParent {
    EdgeUse(EdgeUseId),
    LoopUse(LoopUseId),
    Shell(ShellId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexUse {
    pub index: usize,
    pub up: VertexUseParent,
    pub vertex: VertexId,
}

// ─── Model ───────────────────────────────────────────────────────────────────

/// Arena storage for one NMG model.
///
/// Each element carries a dense `index` drawn from `max_index` so visited
/// sets can be flat tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Model {
    pub regions: SlotMap<RegionId, Region>,
    pub shells: SlotMap<ShellId, Shell>,
    pub faces: SlotMap<FaceId, Face>,
    pub faceuses: SlotMap<FaceUseId, FaceUse>,
    pub loops: SlotMap<LoopId, Loop>,
    pub loopuses: SlotMap<LoopUseId, LoopUse>,
    pub edges: SlotMap<EdgeId, Edge>,
    pub edgeuses: SlotMap<EdgeUseId, EdgeUse>,
    pub vertices: SlotMap<VertexId, Vertex>,
    pub vertexuses: SlotMap<VertexUseId, VertexUse>,
    pub max_index: usize,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn next_index(&mut self) -> usize {
        let index = self.max_index;
        self.max_index += 1;
        index
    }

    // ── Edgeuses ──

    pub fn eu_start(&self, eu: EdgeUseId) -> VertexId {
        self.vertexuses[self.edgeuses[eu].vertexuse].vertex
    }

    pub fn eu_end(&self, eu: EdgeUseId) -> VertexId {
        self.eu_start(self.edgeuses[eu].mate)
    }

    pub fn eu_points(&self, eu: EdgeUseId) -> (Point3d, Point3d) {
        (
            self.vertices[self.eu_start(eu)].point,
            self.vertices[self.eu_end(eu)].point,
        )
    }

    /// Unnormalized start-to-end direction.
    pub fn eu_vector(&self, eu: EdgeUseId) -> Vec3 {
        let (a, b) = self.eu_points(eu);
        b - a
    }

    pub fn eu_loopuse(&self, eu: EdgeUseId) -> Option<LoopUseId> {
        match self.edgeuses[eu].up {
            EdgeUseParent::LoopUse(lu) => Some(lu),
            EdgeUseParent::Shell(_) => None,
        }
    }

    pub fn eu_faceuse(&self, eu: EdgeUseId) -> Option<FaceUseId> {
        self.eu_loopuse(eu).and_then(|lu| self.lu_faceuse(lu))
    }

    pub fn eu_face(&self, eu: EdgeUseId) -> Option<FaceId> {
        self.eu_faceuse(eu).map(|fu| self.faceuses[fu].face)
    }

    pub fn eu_shell(&self, eu: EdgeUseId) -> ShellId {
        match self.edgeuses[eu].up {
            EdgeUseParent::Shell(s) => s,
            EdgeUseParent::LoopUse(lu) => self.lu_shell(lu),
        }
    }

    /// Orientation of the owning faceuse, `Unspecified` for wires.
    pub fn eu_orientation(&self, eu: EdgeUseId) -> Orientation {
        self.eu_faceuse(eu)
            .map(|fu| self.faceuses[fu].orientation)
            .unwrap_or(Orientation::Unspecified)
    }

    /// Unit direction from the edge into the face, in the face plane.
    ///
    /// Both uses of a face on one edge give the same direction.
    pub fn eu_interior(&self, eu: EdgeUseId) -> Option<Vec3> {
        let fu = self.eu_faceuse(eu)?;
        let d = self.eu_vector(eu).normalized()?;
        self.fu_plane(fu).normal.cross(&d).normalized()
    }

    pub fn eu_is_free(&self, eu: EdgeUseId) -> bool {
        let e = &self.edgeuses[eu];
        e.radial == e.mate
    }

    fn eu_position(&self, eu: EdgeUseId) -> Option<(LoopUseId, usize)> {
        let lu = self.eu_loopuse(eu)?;
        let pos = self
            .lu_edgeuses(lu)
            .iter()
            .position(|&x| x == eu)
            .unwrap_or_else(|| invariant_violation(format!("edgeuse {eu:?} missing from its loopuse {lu:?}")));
        Some((lu, pos))
    }

    pub fn eu_next(&self, eu: EdgeUseId) -> Option<EdgeUseId> {
        let (lu, pos) = self.eu_position(eu)?;
        let list = self.lu_edgeuses(lu);
        Some(list[(pos + 1) % list.len()])
    }

    pub fn eu_prev(&self, eu: EdgeUseId) -> Option<EdgeUseId> {
        let (lu, pos) = self.eu_position(eu)?;
        let list = self.lu_edgeuses(lu);
        Some(list[(pos + list.len() - 1) % list.len()])
    }

    /// Every use of `eu`'s edge, walking `radial` then `mate`.
    pub fn radial_cycle(&self, eu: EdgeUseId) -> Vec<EdgeUseId> {
        let limit = self.edgeuses.len() + 1;
        let mut out = vec![eu];
        let mut cur = eu;
        loop {
            let r = self.edgeuses[cur].radial;
            out.push(r);
            let m = self.edgeuses[r].mate;
            if m == eu {
                break;
            }
            out.push(m);
            cur = m;
            if out.len() > limit {
                invariant_violation(format!("radial cycle from {eu:?} does not close"));
            }
        }
        out
    }

    // ── Edges ──

    pub fn edge_uses(&self, edge: EdgeId) -> Vec<EdgeUseId> {
        self.radial_cycle(self.edges[edge].edgeuse)
    }

    pub fn edge_vertices(&self, edge: EdgeId) -> (VertexId, VertexId) {
        let eu = self.edges[edge].edgeuse;
        (self.eu_start(eu), self.eu_end(eu))
    }

    pub fn edge_length(&self, edge: EdgeId) -> f64 {
        self.eu_vector(self.edges[edge].edgeuse).length()
    }

    /// Distinct faces around the edge in radial order.
    pub fn edge_faces(&self, edge: EdgeId) -> Vec<FaceId> {
        let mut faces = Vec::new();
        for eu in self.edge_uses(edge) {
            if let Some(f) = self.eu_face(eu) {
                if !faces.contains(&f) {
                    faces.push(f);
                }
            }
        }
        faces
    }

    pub fn edge_is_free(&self, edge: EdgeId) -> bool {
        self.eu_is_free(self.edges[edge].edgeuse)
    }

    /// Edges joining `a` and `b` in either direction.
    pub fn edges_between(&self, a: VertexId, b: VertexId) -> Vec<EdgeId> {
        let mut out = Vec::new();
        for eu in self.vertex_edgeuses(a) {
            if self.eu_end(eu) == b {
                let e = self.edgeuses[eu].edge;
                if !out.contains(&e) {
                    out.push(e);
                }
            }
        }
        out
    }

    // ── Loopuses ──

    pub fn lu_edgeuses(&self, lu: LoopUseId) -> &[EdgeUseId] {
        match &self.loopuses[lu].contents {
            LoopContents::Edges(list) => list,
            LoopContents::Vertex(_) => &[],
        }
    }

    pub fn lu_vertices(&self, lu: LoopUseId) -> Vec<VertexId> {
        match &self.loopuses[lu].contents {
            LoopContents::Edges(list) => list.iter().map(|&eu| self.eu_start(eu)).collect(),
            LoopContents::Vertex(vu) => vec![self.vertexuses[*vu].vertex],
        }
    }

    pub fn lu_points(&self, lu: LoopUseId) -> Vec<Point3d> {
        self.lu_vertices(lu)
            .into_iter()
            .map(|v| self.vertices[v].point)
            .collect()
    }

    pub fn lu_faceuse(&self, lu: LoopUseId) -> Option<FaceUseId> {
        match self.loopuses[lu].up {
            LoopUseParent::FaceUse(fu) => Some(fu),
            LoopUseParent::Shell(_) => None,
        }
    }

    pub fn lu_shell(&self, lu: LoopUseId) -> ShellId {
        match self.loopuses[lu].up {
            LoopUseParent::FaceUse(fu) => self.faceuses[fu].shell,
            LoopUseParent::Shell(s) => s,
        }
    }

    // ── Faces ──

    pub fn face_same_fu(&self, face: FaceId) -> FaceUseId {
        let fu = self.faces[face].faceuse;
        if self.faceuses[fu].orientation == Orientation::Same {
            fu
        } else {
            self.faceuses[fu].mate
        }
    }

    /// Plane as seen from `fu`'s side.
    pub fn fu_plane(&self, fu: FaceUseId) -> Plane {
        let f = &self.faceuses[fu];
        let plane = self.faces[f.face].plane;
        if f.orientation == Orientation::Opposite {
            plane.flipped()
        } else {
            plane
        }
    }

    /// Loopuses of the face's `Same` side.
    pub fn face_loopuses(&self, face: FaceId) -> Vec<LoopUseId> {
        self.faceuses[self.face_same_fu(face)].loopuses.clone()
    }

    /// Exterior loopuses of the `Same` side.
    pub fn face_exterior_loopuses(&self, face: FaceId) -> Vec<LoopUseId> {
        self.face_loopuses(face)
            .into_iter()
            .filter(|&lu| self.loopuses[lu].orientation == Orientation::Same)
            .collect()
    }

    pub fn face_shell(&self, face: FaceId) -> ShellId {
        self.faceuses[self.faces[face].faceuse].shell
    }

    pub fn face_vertices(&self, face: FaceId) -> Vec<VertexId> {
        let mut out = Vec::new();
        for lu in self.face_loopuses(face) {
            for v in self.lu_vertices(lu) {
                if !out.contains(&v) {
                    out.push(v);
                }
            }
        }
        out
    }

    /// Edgeuses of the face's `Same` side, loop by loop.
    pub fn face_edgeuses(&self, face: FaceId) -> Vec<EdgeUseId> {
        self.face_loopuses(face)
            .into_iter()
            .flat_map(|lu| self.lu_edgeuses(lu).to_vec())
            .collect()
    }

    // ── Shells ──

    /// One entry per face, in faceuse order.
    pub fn shell_faces(&self, shell: ShellId) -> Vec<FaceId> {
        self.shells[shell]
            .faceuses
            .iter()
            .filter_map(|&fu| {
                let face = self.faceuses[fu].face;
                (self.faces[face].faceuse == fu).then_some(face)
            })
            .collect()
    }

    pub fn shell_edgeuses(&self, shell: ShellId) -> Vec<EdgeUseId> {
        let s = &self.shells[shell];
        let mut out = Vec::new();
        for &fu in &s.faceuses {
            for &lu in &self.faceuses[fu].loopuses {
                out.extend_from_slice(self.lu_edgeuses(lu));
            }
        }
        for &lu in &s.wire_loopuses {
            out.extend_from_slice(self.lu_edgeuses(lu));
        }
        out.extend_from_slice(&s.wire_edgeuses);
        out
    }

    pub fn shell_edges(&self, shell: ShellId) -> Vec<EdgeId> {
        let mut seen = FlagTable::new(self);
        self.shell_edgeuses(shell)
            .into_iter()
            .map(|eu| self.edgeuses[eu].edge)
            .filter(|&e| seen.mark(self.edges[e].index))
            .collect()
    }

    pub fn shell_vertices(&self, shell: ShellId) -> Vec<VertexId> {
        let mut seen = FlagTable::new(self);
        let mut out: Vec<VertexId> = self
            .shell_edgeuses(shell)
            .into_iter()
            .map(|eu| self.eu_start(eu))
            .filter(|&v| seen.mark(self.vertices[v].index))
            .collect();
        let s = &self.shells[shell];
        let point_loops = s
            .faceuses
            .iter()
            .flat_map(|&fu| self.faceuses[fu].loopuses.iter().copied())
            .chain(s.wire_loopuses.iter().copied());
        let mut extra: Vec<VertexUseId> = point_loops
            .filter_map(|lu| match self.loopuses[lu].contents {
                LoopContents::Vertex(vu) => Some(vu),
                LoopContents::Edges(_) => None,
            })
            .collect();
        extra.extend(s.vertexuse);
        for vu in extra {
            let v = self.vertexuses[vu].vertex;
            if seen.mark(self.vertices[v].index) {
                out.push(v);
            }
        }
        out
    }

    pub fn shell_free_edges(&self, shell: ShellId) -> Vec<EdgeId> {
        self.shell_edges(shell)
            .into_iter()
            .filter(|&e| self.edge_is_free(e))
            .collect()
    }

    // ── Vertices ──

    /// Edgeuses that start at `v`.
    pub fn vertex_edgeuses(&self, v: VertexId) -> Vec<EdgeUseId> {
        self.vertices[v]
            .uses
            .iter()
            .filter_map(|&vu| match self.vertexuses[vu].up {
                VertexUseParent::EdgeUse(eu) => Some(eu),
                _ => None,
            })
            .collect()
    }

    pub fn vertex_edges(&self, v: VertexId) -> Vec<EdgeId> {
        let mut out = Vec::new();
        for eu in self.vertex_edgeuses(v) {
            let e = self.edgeuses[eu].edge;
            if !out.contains(&e) {
                out.push(e);
            }
        }
        out
    }

    pub fn vertex_faces(&self, v: VertexId) -> Vec<FaceId> {
        let mut out = Vec::new();
        for eu in self.vertex_edgeuses(v) {
            if let Some(f) = self.eu_face(eu) {
                if !out.contains(&f) {
                    out.push(f);
                }
            }
        }
        out
    }

    /// Vertices joined to `v` by an edge.
    pub fn vertex_neighbors(&self, v: VertexId) -> Vec<VertexId> {
        let mut out = Vec::new();
        for eu in self.vertex_edgeuses(v) {
            let w = self.eu_end(eu);
            if w != v && !out.contains(&w) {
                out.push(w);
            }
        }
        out
    }

    // ── Bounds ──

    pub fn rebound_face(&mut self, face: FaceId) {
        let mut bb = BoundingBox::empty();
        for lu in self.face_loopuses(face) {
            let lbb = BoundingBox::from_points(&self.lu_points(lu));
            let lp = self.loopuses[lu].lp;
            self.loops[lp].bbox = lbb;
            bb = bb.union(&lbb);
        }
        self.faces[face].bbox = bb;
    }

    pub fn rebound_shell(&mut self, shell: ShellId) {
        for face in self.shell_faces(shell) {
            self.rebound_face(face);
        }
        let pts: Vec<Point3d> = self
            .shell_vertices(shell)
            .into_iter()
            .map(|v| self.vertices[v].point)
            .collect();
        self.shells[shell].bbox = BoundingBox::from_points(&pts);
    }

    pub fn rebound_region(&mut self, region: RegionId) {
        let shells = self.regions[region].shells.clone();
        let mut bb = BoundingBox::empty();
        for s in shells {
            self.rebound_shell(s);
            bb = bb.union(&self.shells[s].bbox);
        }
        self.regions[region].bbox = bb;
    }
}

// ─── Dense Index Tables ─────────────────────────────────────────────────────

/// Visited set over element indices.
#[derive(Debug, Clone)]
pub struct FlagTable {
    bits: Vec<bool>,
}

impl FlagTable {
    pub fn new(model: &Model) -> Self {
        Self {
            bits: vec![false; model.max_index],
        }
    }

    /// Set the flag; returns `true` if it was previously clear.
    pub fn mark(&mut self, index: usize) -> bool {
        if index >= self.bits.len() {
            self.bits.resize(index + 1, false);
        }
        !std::mem::replace(&mut self.bits[index], true)
    }

    pub fn clear(&mut self, index: usize) {
        if let Some(b) = self.bits.get_mut(index) {
            *b = false;
        }
    }

    pub fn is_set(&self, index: usize) -> bool {
        self.bits.get(index).copied().unwrap_or(false)
    }
}

/// Per-element side values keyed by element index.
#[derive(Debug, Clone)]
pub struct IndexTable<T> {
    slots: Vec<Option<T>>,
}

impl<T: Clone> IndexTable<T> {
    pub fn new(model: &Model) -> Self {
        Self {
            slots: vec![None; model.max_index],
        }
    }

    pub fn insert(&mut self, index: usize, value: T) {
        if index >= self.slots.len() {
            self.slots.resize(index + 1, None);
        }
        self.slots[index] = Some(value);
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(Option::as_ref)
    }
}
