//! Point-in-shell classification by ray casting.

use tracing::debug;

use crate::config::ClassifyConfig;
use crate::geometry::plane::Line3;
use crate::geometry::point::Point3d;
use crate::geometry::polygon::point_in_polygon_3d;
use crate::geometry::vector::Vec3;
use crate::topology::model::{FaceId, FlagTable, Model, Orientation, ShellId};
use crate::Tolerance;

/// Classification of a point relative to a closed shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointClassification {
    Inside,
    Outside,
    OnBoundary,
}

/// Inside some exterior loop of the face and outside all of its holes.
pub fn point_in_face(model: &Model, face: FaceId, point: &Point3d) -> bool {
    let normal = model.faces[face].plane.normal;
    let mut inside = false;
    for lu in model.face_loopuses(face) {
        let polygon = model.lu_points(lu);
        if polygon.len() < 3 || !point_in_polygon_3d(point, &polygon, &normal) {
            continue;
        }
        match model.loopuses[lu].orientation {
            Orientation::Opposite => return false,
            _ => inside = true,
        }
    }
    inside
}

/// Classify a point against the faces of `shell`.
///
/// Casts one ray per configured direction and takes the majority parity.
pub fn classify_point(
    model: &Model,
    shell: ShellId,
    point: &Point3d,
    config: &ClassifyConfig,
    tol: &Tolerance,
) -> PointClassification {
    let faces = model.shell_faces(shell);
    for &face in &faces {
        let plane = model.faces[face].plane;
        if plane.contains(point, tol) && point_in_face(model, face, point) {
            return PointClassification::OnBoundary;
        }
    }

    let mut inside_votes = 0;
    let mut outside_votes = 0;
    for dir in &config.ray_directions {
        let Some(dir) = Vec3::from_array(*dir).normalized() else {
            continue;
        };
        let ray = Line3::new(*point, dir);
        if count_ray_crossings(model, &faces, &ray, tol) % 2 == 1 {
            inside_votes += 1;
        } else {
            outside_votes += 1;
        }
    }

    if inside_votes > outside_votes {
        PointClassification::Inside
    } else {
        PointClassification::Outside
    }
}

/// Distinct positive hit parameters of the ray against the faces.
fn count_ray_crossings(model: &Model, faces: &[FaceId], ray: &Line3, tol: &Tolerance) -> usize {
    let mut hits: Vec<f64> = Vec::new();
    for &face in faces {
        let plane = model.faces[face].plane;
        let Some(t) = ray.intersect_plane(&plane, tol) else {
            continue;
        };
        if t > tol.dist && point_in_face(model, face, &ray.at(t)) {
            hits.push(t);
        }
    }
    hits.sort_by(f64::total_cmp);
    hits.dedup_by(|a, b| (*a - *b).abs() <= tol.dist);
    hits.len()
}

/// True when `inner` lies inside the closed shell `outer`.
///
/// Decided by the first vertex of `inner` not shared with `outer` that is
/// not on `outer`'s boundary.
pub fn shell_inside_shell(
    model: &Model,
    inner: ShellId,
    outer: ShellId,
    config: &ClassifyConfig,
    tol: &Tolerance,
) -> bool {
    let outer_bb = model.shells[outer].bbox.inflated(tol.dist);
    if !outer_bb.encloses(&model.shells[inner].bbox) {
        return false;
    }
    let mut shared = FlagTable::new(model);
    for v in model.shell_vertices(outer) {
        shared.mark(model.vertices[v].index);
    }
    for v in model.shell_vertices(inner) {
        if shared.is_set(model.vertices[v].index) {
            continue;
        }
        match classify_point(model, outer, &model.vertices[v].point, config, tol) {
            PointClassification::Inside => return true,
            PointClassification::Outside => return false,
            PointClassification::OnBoundary => {
                debug!(?v, "vertex on outer boundary, trying next");
            }
        }
    }
    false
}
