//! Consistency checks for the graph invariants every repair must preserve.

use tracing::{debug, instrument};

use std::f64::consts::TAU;

use super::model::*;
use crate::geometry::plane::Plane;
use crate::geometry::vector::Vec3;
use crate::Tolerance;

/// Result of a topological and geometric consistency check.
#[derive(Debug, Clone, Default)]
pub struct TopologyAudit {
    /// Mate and radial links are symmetric and close.
    pub radial_valid: bool,
    /// Every vertex lies on the planes of the faces using it.
    pub planes_valid: bool,
    /// Loops close; no cracks, zero-length or duplicate edges.
    pub edges_valid: bool,
    /// Stored plane signs agree with exterior loop winding.
    pub signs_valid: bool,
    pub errors: Vec<TopologyError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TopologyError {
    MateMismatch {
        edgeuse: EdgeUseId,
    },
    RadialMismatch {
        edgeuse: EdgeUseId,
    },
    RadialOpen {
        edgeuse: EdgeUseId,
    },
    RadialDirection {
        edgeuse: EdgeUseId,
        radial: EdgeUseId,
    },
    RadialOrientation {
        edgeuse: EdgeUseId,
        radial: EdgeUseId,
    },
    /// Another face of the edge separates `edgeuse` from its radial partner.
    RadialWedge {
        edgeuse: EdgeUseId,
        radial: EdgeUseId,
        face: FaceId,
    },
    OpenLoop {
        loopuse: LoopUseId,
    },
    CrackLoop {
        loopuse: LoopUseId,
        edge: EdgeId,
    },
    ZeroLengthEdge {
        edge: EdgeId,
        length: f64,
    },
    DuplicateEdge {
        edge: EdgeId,
        other: EdgeId,
    },
    VertexOffPlane {
        vertex: VertexId,
        face: FaceId,
        distance: f64,
    },
    PlaneSignMismatch {
        face: FaceId,
    },
}

impl TopologyAudit {
    pub fn all_valid(&self) -> bool {
        self.radial_valid && self.planes_valid && self.edges_valid && self.signs_valid
    }

    fn merge(&mut self, other: TopologyAudit) {
        self.radial_valid &= other.radial_valid;
        self.planes_valid &= other.planes_valid;
        self.edges_valid &= other.edges_valid;
        self.signs_valid &= other.signs_valid;
        self.errors.extend(other.errors);
    }
}

/// Audit every shell of the model.
#[instrument(skip_all)]
pub fn audit_model(model: &Model, tol: &Tolerance) -> TopologyAudit {
    let mut audit = TopologyAudit {
        radial_valid: true,
        planes_valid: true,
        edges_valid: true,
        signs_valid: true,
        errors: vec![],
    };
    for shell in model.shells.keys() {
        audit.merge(audit_shell(model, shell, tol));
    }
    debug!(errors = audit.errors.len(), "model audit finished");
    audit
}

pub fn audit_shell(model: &Model, shell: ShellId, tol: &Tolerance) -> TopologyAudit {
    let mut errors = Vec::new();
    let radial_valid = check_radial(model, shell, tol, &mut errors);
    let edges_valid = check_loops(model, shell, &mut errors) & check_edges(model, shell, tol, &mut errors);
    let planes_valid = check_planes(model, shell, tol, &mut errors);
    let signs_valid = check_signs(model, shell, &mut errors);
    TopologyAudit {
        radial_valid,
        planes_valid,
        edges_valid,
        signs_valid,
        errors,
    }
}

fn check_radial(model: &Model, shell: ShellId, tol: &Tolerance, errors: &mut Vec<TopologyError>) -> bool {
    let before = errors.len();
    let limit = model.edgeuses.len() + 1;
    for eu in model.shell_edgeuses(shell) {
        let e = &model.edgeuses[eu];
        let (Some(mate), Some(radial)) = (model.edgeuses.get(e.mate), model.edgeuses.get(e.radial)) else {
            errors.push(TopologyError::RadialMismatch { edgeuse: eu });
            continue;
        };
        if mate.mate != eu || mate.edge != e.edge {
            errors.push(TopologyError::MateMismatch { edgeuse: eu });
            continue;
        }
        if radial.radial != eu || radial.edge != e.edge {
            errors.push(TopologyError::RadialMismatch { edgeuse: eu });
            continue;
        }

        // radial then mate must come back around
        let mut cur = eu;
        let mut closed = false;
        for _ in 0..limit {
            let Some(next) = model
                .edgeuses
                .get(model.edgeuses[cur].radial)
                .and_then(|r| model.edgeuses.get(r.mate).map(|_| r.mate))
            else {
                break;
            };
            if next == eu {
                closed = true;
                break;
            }
            cur = next;
        }
        if !closed {
            errors.push(TopologyError::RadialOpen { edgeuse: eu });
            continue;
        }

        if e.radial != e.mate {
            if model.eu_start(e.radial) != model.eu_end(eu) {
                errors.push(TopologyError::RadialDirection {
                    edgeuse: eu,
                    radial: e.radial,
                });
                continue;
            }
            if model.eu_orientation(e.radial) != model.eu_orientation(eu) {
                errors.push(TopologyError::RadialOrientation {
                    edgeuse: eu,
                    radial: e.radial,
                });
            }
            if let Some(face) = face_inside_wedge(model, eu, tol) {
                errors.push(TopologyError::RadialWedge {
                    edgeuse: eu,
                    radial: e.radial,
                    face,
                });
            }
        }
    }
    errors.len() == before
}

/// A face of the edge lying strictly inside the wedge that `eu` and its
/// radial partner bound.
///
/// The wedge opens from `eu`'s face toward its faceuse normal and closes
/// at the radial partner's face.
fn face_inside_wedge(model: &Model, eu: EdgeUseId, tol: &Tolerance) -> Option<FaceId> {
    let radial = model.edgeuses[eu].radial;
    let own = model.eu_face(eu)?;
    let partner = model.eu_face(radial)?;
    let w1 = model.eu_interior(eu)?;
    let w2 = model.eu_interior(radial)?;
    let axis = w1.cross(&model.fu_plane(model.eu_faceuse(eu)?).normal);
    let sweep = |w: &Vec3| {
        let angle = axis.dot(&w1.cross(w)).atan2(w1.dot(w));
        if angle < -tol.perp { angle + TAU } else { angle.max(0.0) }
    };
    let limit = sweep(&w2);
    let edge = model.edgeuses[eu].edge;
    for other in model.edge_uses(edge) {
        let Some(face) = model.eu_face(other) else {
            continue;
        };
        if face == own || face == partner {
            continue;
        }
        let Some(w) = model.eu_interior(other) else {
            continue;
        };
        let angle = sweep(&w);
        if angle > tol.perp && angle < limit - tol.perp && angle < TAU - tol.perp {
            return Some(face);
        }
    }
    None
}

fn check_loops(model: &Model, shell: ShellId, errors: &mut Vec<TopologyError>) -> bool {
    let before = errors.len();
    for face in model.shell_faces(shell) {
        for lu in model.face_loopuses(face) {
            let list = model.lu_edgeuses(lu);
            let n = list.len();
            for i in 0..n {
                let (a, b) = (list[i], list[(i + 1) % n]);
                if model.eu_end(a) != model.eu_start(b) {
                    errors.push(TopologyError::OpenLoop { loopuse: lu });
                    break;
                }
                if model.edgeuses[a].edge == model.edgeuses[b].edge {
                    errors.push(TopologyError::CrackLoop {
                        loopuse: lu,
                        edge: model.edgeuses[a].edge,
                    });
                    break;
                }
            }
        }
    }
    errors.len() == before
}

fn check_edges(model: &Model, shell: ShellId, tol: &Tolerance, errors: &mut Vec<TopologyError>) -> bool {
    let before = errors.len();
    for edge in model.shell_edges(shell) {
        let length = model.edge_length(edge);
        if tol.is_zero_length(length) {
            errors.push(TopologyError::ZeroLengthEdge { edge, length });
        }
        let (a, b) = model.edge_vertices(edge);
        let index = model.edges[edge].index;
        if let Some(other) = model
            .edges_between(a, b)
            .into_iter()
            .find(|&o| o != edge && model.edges[o].index < index && model.eu_shell(model.edges[o].edgeuse) == shell)
        {
            errors.push(TopologyError::DuplicateEdge { edge, other });
        }
    }
    errors.len() == before
}

fn check_planes(model: &Model, shell: ShellId, tol: &Tolerance, errors: &mut Vec<TopologyError>) -> bool {
    let before = errors.len();
    for face in model.shell_faces(shell) {
        let plane = model.faces[face].plane;
        for vertex in model.face_vertices(face) {
            let distance = plane.distance(&model.vertices[vertex].point);
            if distance.abs() > tol.dist {
                errors.push(TopologyError::VertexOffPlane { vertex, face, distance });
            }
        }
    }
    errors.len() == before
}

fn check_signs(model: &Model, shell: ShellId, errors: &mut Vec<TopologyError>) -> bool {
    let before = errors.len();
    for face in model.shell_faces(shell) {
        let Some(&lu) = model.face_exterior_loopuses(face).first() else {
            continue;
        };
        if let Some(fitted) = Plane::from_polygon(&model.lu_points(lu)) {
            if fitted.normal.dot(&model.faces[face].plane.normal) <= 0.0 {
                errors.push(TopologyError::PlaneSignMismatch { face });
            }
        }
    }
    errors.len() == before
}
