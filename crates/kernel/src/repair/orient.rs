//! Outward-normal propagation across the radial graph, with void detection.

use tracing::{debug, info, instrument, warn};

use super::classify::shell_inside_shell;
use super::decompose::decompose_shell;
use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::topology::euler::{flip_face, glue_faces, join_shells, sort_radial};
use crate::topology::model::{EdgeId, EdgeUseId, FaceId, FaceUseId, FlagTable, Model, Orientation, RegionId, ShellId};
use crate::Tolerance;

/// What a propagation pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrientReport {
    pub faces_visited: usize,
    pub flipped: usize,
    pub relinked: usize,
    pub components: usize,
    pub voids: usize,
}

impl OrientReport {
    fn absorb(&mut self, other: OrientReport) {
        self.faces_visited += other.faces_visited;
        self.flipped += other.flipped;
        self.relinked += other.relinked;
        self.components += other.components;
        self.voids += other.voids;
    }
}

/// Make every face reachable from `start` agree with it.
///
/// `start` becomes the `Same` side of its face. Each popped edgeuse lies on
/// the `Same` side of an already settled face; its radial partner is the
/// neighbor across the outside wedge and must be on that neighbor's `Same`
/// side too, otherwise the neighbor is flipped. Edges touching more than two
/// faces are re-sorted afterwards so wedge pairings follow the new sides.
#[instrument(skip(model, tol))]
pub fn propagate_normals(model: &mut Model, start: FaceUseId, tol: &Tolerance) -> Result<OrientReport, KernelError> {
    let mut report = OrientReport::default();
    let start_face = model.faceuses[start].face;
    if model.faceuses[start].orientation == Orientation::Opposite {
        flip_face(model, start_face);
        report.flipped += 1;
    }

    let mut visited = FlagTable::new(model);
    visited.mark(model.faces[start_face].index);
    report.faces_visited = 1;
    let mut stack: Vec<EdgeUseId> = model.face_edgeuses(start_face);
    let mut crowded: Vec<EdgeId> = Vec::new();

    while let Some(eu) = stack.pop() {
        let radial = model.edgeuses[eu].radial;
        if radial == model.edgeuses[eu].mate {
            continue;
        }
        let face = model.eu_face(eu);
        let Some(neighbor) = model.eu_face(radial) else {
            continue;
        };
        if Some(neighbor) == face {
            continue;
        }
        let edge = model.edgeuses[eu].edge;
        if model.edge_faces(edge).len() > 2 && !crowded.contains(&edge) {
            crowded.push(edge);
        }

        // The neighbor's outward use of this edge must run against `eu`.
        let neighbor_same = if model.eu_orientation(radial) == Orientation::Same {
            radial
        } else {
            model.edgeuses[radial].mate
        };
        let needs_flip = model.eu_start(neighbor_same) == model.eu_start(eu);

        if !visited.mark(model.faces[neighbor].index) {
            if needs_flip {
                let point = model.vertices[model.eu_start(eu)].point;
                let shell = model.face_shell(neighbor);
                warn!(?neighbor, ?point, "face needs conflicting orientations");
                return Err(KernelError::NonOrientable {
                    shell,
                    face: neighbor,
                    point,
                });
            }
            continue;
        }
        report.faces_visited += 1;
        if needs_flip {
            debug!(?neighbor, "flipping face");
            flip_face(model, neighbor);
            report.flipped += 1;
        }
        stack.extend(model.face_edgeuses(neighbor));
    }

    for edge in crowded {
        if !model.edges.contains_key(edge) {
            continue;
        }
        let before: Vec<EdgeUseId> = model
            .edge_uses(edge)
            .iter()
            .map(|&eu| model.edgeuses[eu].radial)
            .collect();
        let uses = model.edge_uses(edge);
        sort_radial(model, edge, tol);
        let after: Vec<EdgeUseId> = uses.iter().map(|&eu| model.edgeuses[eu].radial).collect();
        if before != after {
            report.relinked += 1;
        }
    }
    Ok(report)
}

/// Face and faceuse to trust for a component.
///
/// At the vertex extreme along an axis, the face whose normal leans most
/// along that axis must point away from the solid (toward it for a void).
/// Axes are tried z, x, y until one has a non-perpendicular face.
pub fn find_trusted_faceuse(model: &Model, shell: ShellId, void: bool, tol: &Tolerance) -> Option<FaceUseId> {
    let faces = model.shell_faces(shell);
    for axis in [2, 0, 1] {
        let mut best_vertex = None;
        let mut best_coord = f64::NEG_INFINITY;
        for &face in &faces {
            for v in model.face_vertices(face) {
                let c = model.vertices[v].point.axis(axis);
                if c > best_coord {
                    best_coord = c;
                    best_vertex = Some(v);
                }
            }
        }
        let vertex = best_vertex?;
        let candidate: Option<(FaceId, f64)> = model
            .vertex_faces(vertex)
            .into_iter()
            .filter(|f| faces.contains(f))
            .map(|f| (f, model.faces[f].plane.normal.component(axis)))
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()));
        let Some((face, component)) = candidate else {
            continue;
        };
        if component.abs() <= tol.perp {
            continue;
        }
        let outward_up = component > 0.0;
        let same = model.face_same_fu(face);
        return Some(if outward_up != void { same } else { model.faceuses[same].mate });
    }
    None
}

/// Orient every component of `shell` outward (inward for voids).
///
/// The shell is decomposed, each component is oriented from its own trusted
/// face, and the components are merged back and re-glued.
#[instrument(skip(model, config))]
pub fn fix_shell_normals(
    model: &mut Model,
    shell: ShellId,
    config: &KernelConfig,
) -> Result<OrientReport, KernelError> {
    let tol = config.tolerance;
    let components = decompose_shell(model, shell, &tol);
    let mut report = OrientReport {
        components: components.len(),
        ..OrientReport::default()
    };

    let mut is_void = vec![false; components.len()];
    for (i, &inner) in components.iter().enumerate() {
        let containers = components
            .iter()
            .filter(|&&outer| outer != inner && shell_inside_shell(model, inner, outer, &config.classify, &tol))
            .count();
        is_void[i] = containers % 2 == 1;
    }

    for (&component, &void) in components.iter().zip(&is_void) {
        if void {
            report.voids += 1;
        }
        let Some(start) = find_trusted_faceuse(model, component, void, &tol) else {
            debug!(?component, "no faces to orient");
            continue;
        };
        if config.verbosity.is_verbose() {
            debug!(?component, ?start, void, "trusted faceuse");
        }
        let part = propagate_normals(model, start, &tol)?;
        report.absorb(OrientReport { components: 0, ..part });
    }

    let mut faces: Vec<FaceId> = Vec::new();
    for &component in &components[1..] {
        join_shells(model, shell, component);
    }
    faces.extend(model.shell_faces(shell));
    glue_faces(model, &faces, &tol);
    let region = model.shells[shell].region;
    model.rebound_region(region);

    info!(
        flipped = report.flipped,
        relinked = report.relinked,
        components = report.components,
        voids = report.voids,
        "fixed shell normals"
    );
    Ok(report)
}

/// [`fix_shell_normals`] over every shell of a region.
pub fn fix_region_normals(
    model: &mut Model,
    region: RegionId,
    config: &KernelConfig,
) -> Result<OrientReport, KernelError> {
    let mut report = OrientReport::default();
    for shell in model.regions[region].shells.clone() {
        if model.shells.contains_key(shell) {
            report.absorb(fix_shell_normals(model, shell, config)?);
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::point::Point3d;
    use crate::topology::audit::audit_shell;
    use crate::topology::primitives::make_box_shell;

    #[test]
    fn test_consistent_box_needs_no_flips() {
        let mut model = Model::new();
        let config = KernelConfig::default();
        let (_, shell) =
            make_box_shell(&mut model, Point3d::ORIGIN, Point3d::new(1.0, 1.0, 1.0), &config.tolerance).unwrap();
        let report = fix_shell_normals(&mut model, shell, &config).unwrap();
        assert_eq!(report.flipped, 0);
        assert_eq!(report.faces_visited, 6);
        assert_eq!(report.components, 1);
    }

    #[test]
    fn test_repairs_flipped_faces() {
        let mut model = Model::new();
        let config = KernelConfig::default();
        let tol = config.tolerance;
        let (_, shell) = make_box_shell(&mut model, Point3d::ORIGIN, Point3d::new(1.0, 1.0, 1.0), &tol).unwrap();
        let faces = model.shell_faces(shell);
        flip_face(&mut model, faces[1]);
        flip_face(&mut model, faces[3]);
        assert!(!audit_shell(&model, shell, &tol).radial_valid);

        let report = fix_shell_normals(&mut model, shell, &config).unwrap();
        assert_eq!(report.flipped, 2);
        assert!(audit_shell(&model, shell, &tol).all_valid());
        let center = Point3d::new(0.5, 0.5, 0.5);
        for face in model.shell_faces(shell) {
            assert!(model.faces[face].plane.distance(&center) < 0.0);
        }

        let again = fix_shell_normals(&mut model, shell, &config).unwrap();
        assert_eq!(again.flipped, 0);
    }

    #[test]
    fn test_fully_inverted_box_is_turned_outward() {
        let mut model = Model::new();
        let config = KernelConfig::default();
        let tol = config.tolerance;
        let (_, shell) = make_box_shell(&mut model, Point3d::ORIGIN, Point3d::new(2.0, 1.0, 1.0), &tol).unwrap();
        for face in model.shell_faces(shell) {
            flip_face(&mut model, face);
        }
        let report = fix_shell_normals(&mut model, shell, &config).unwrap();
        assert_eq!(report.flipped, 6);
        let center = Point3d::new(1.0, 0.5, 0.5);
        for face in model.shell_faces(shell) {
            assert!(model.faces[face].plane.distance(&center) < 0.0);
        }
    }
}
