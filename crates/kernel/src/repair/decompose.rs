//! Splitting a shell into its manifold, disjoint components.

use tracing::{debug, info, instrument};

use crate::topology::euler::{make_shell, move_face_to_shell, split_edge_by_shell};
use crate::topology::model::{EdgeUseId, FaceId, IndexTable, Model, Orientation, ShellId};
use crate::Tolerance;

/// Component label for every face of `shell`, in `shell_faces` order.
///
/// An edge is winged when exactly two faces of the still-unassigned set (or
/// the component being grown) use it. The flood crosses winged edges freely;
/// edges used by more faces are set aside and resolved afterwards through the
/// inside wedge of the current face.
pub fn label_components(model: &Model, shell: ShellId) -> (Vec<FaceId>, Vec<usize>) {
    let faces = model.shell_faces(shell);
    let mut label: IndexTable<usize> = IndexTable::new(model);
    let mut next_label = 0;

    for &seed in &faces {
        if label.get(model.faces[seed].index).is_some() {
            continue;
        }
        let current = next_label;
        next_label += 1;
        label.insert(model.faces[seed].index, current);

        let in_subset = |label: &IndexTable<usize>, f: FaceId| {
            label.get(model.faces[f].index).is_none_or(|&l| l == current)
        };

        let mut queue = vec![seed];
        let mut shared: Vec<EdgeUseId> = Vec::new();
        loop {
            while let Some(face) = queue.pop() {
                for eu in model.face_edgeuses(face) {
                    let edge = model.edgeuses[eu].edge;
                    let around: Vec<FaceId> = model
                        .edge_faces(edge)
                        .into_iter()
                        .filter(|&f| in_subset(&label, f))
                        .collect();
                    match around.len() {
                        2 => {
                            let other = if around[0] == face { around[1] } else { around[0] };
                            if label.get(model.faces[other].index).is_none() {
                                label.insert(model.faces[other].index, current);
                                queue.push(other);
                            }
                        }
                        n if n > 2 => shared.push(eu),
                        _ => {}
                    }
                }
            }

            let mut grew = false;
            for eu in shared.drain(..) {
                // Inside wedge of this face: its mate's radial neighbor.
                let inside = model.edgeuses[model.edgeuses[eu].mate].radial;
                let Some(candidate) = model.eu_face(inside) else {
                    continue;
                };
                if label.get(model.faces[candidate].index).is_some() {
                    continue;
                }
                if model.eu_orientation(inside) != Orientation::Opposite {
                    debug!(?candidate, "wedge partner faces outward, not in component");
                    continue;
                }
                label.insert(model.faces[candidate].index, current);
                queue.push(candidate);
                grew = true;
            }
            if !grew {
                break;
            }
        }
    }

    let labels = faces
        .iter()
        .map(|&f| label.get(model.faces[f].index).copied().unwrap_or(0))
        .collect();
    (faces, labels)
}

/// Split `shell` into components, each in its own shell of the same region.
///
/// Returns every resulting shell, the original first. A single entry means
/// the shell was already one component.
#[instrument(skip(model, tol))]
pub fn decompose_shell(model: &mut Model, shell: ShellId, tol: &Tolerance) -> Vec<ShellId> {
    let (faces, labels) = label_components(model, shell);
    let count = labels.iter().max().map_or(1, |&m| m + 1);
    if count <= 1 {
        return vec![shell];
    }

    let region = model.shells[shell].region;
    let mut shells = vec![shell];
    for _ in 1..count {
        shells.push(make_shell(model, region));
    }
    for (&face, &label) in faces.iter().zip(&labels) {
        if label > 0 {
            move_face_to_shell(model, face, shells[label]);
        }
    }

    // Edges still shared across components get one copy per shell.
    let mut split = 0;
    for &s in &shells {
        for edge in model.shell_edges(s) {
            if model.edges.contains_key(edge) {
                split += split_edge_by_shell(model, edge, tol).len();
            }
        }
    }
    model.rebound_region(region);
    info!(components = count, split_edges = split, "decomposed shell");
    shells
}
