//! Property-based tests for repair kernel invariants using the `proptest` crate.

use proptest::prelude::*;

use nmg_kernel::convert::{ArbSolid, CanonicalShape, TgcForm, TgcSolid};
use nmg_kernel::geometry::point::Point3d;
use nmg_kernel::geometry::vector::Vec3;
use nmg_kernel::repair::cleanup::face_plane_from_loops;
use nmg_kernel::repair::collapse::{choose_collapse, collapse_edge, decimate_shell};
use nmg_kernel::repair::decompose::decompose_shell;
use nmg_kernel::repair::orient::fix_shell_normals;
use nmg_kernel::repair::vertex::solve_vertex;
use nmg_kernel::topology::audit::audit_shell;
use nmg_kernel::topology::euler::{flip_face, join_shells};
use nmg_kernel::topology::model::{FaceId, Model};
use nmg_kernel::topology::primitives::{make_arb8, make_box_shell, make_frustum, make_grid};
use nmg_kernel::{CollapseParams, KernelConfig, Tolerance};

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

/// Box corner in a moderate range.
fn arb_origin() -> impl Strategy<Value = (f64, f64, f64)> {
    (-100.0f64..100.0, -100.0f64..100.0, -100.0f64..100.0)
}

/// Box extents well above the distance tolerance.
fn arb_extent() -> impl Strategy<Value = (f64, f64, f64)> {
    (0.5f64..50.0, 0.5f64..50.0, 0.5f64..50.0)
}

/// Corner displacement small enough to keep the face planes distinct.
fn arb_nudge() -> impl Strategy<Value = (f64, f64, f64)> {
    (-0.05f64..0.05, -0.05f64..0.05, -0.05f64..0.05)
}

fn boxed(model: &mut Model, origin: (f64, f64, f64), extent: (f64, f64, f64), tol: &Tolerance) -> [Point3d; 8] {
    let (x, y, z) = origin;
    let (dx, dy, dz) = extent;
    let points = [
        Point3d::new(x, y, z),
        Point3d::new(x + dx, y, z),
        Point3d::new(x + dx, y + dy, z),
        Point3d::new(x, y + dy, z),
        Point3d::new(x, y, z + dz),
        Point3d::new(x + dx, y, z + dz),
        Point3d::new(x + dx, y + dy, z + dz),
        Point3d::new(x, y + dy, z + dz),
    ];
    make_arb8(model, &points, tol).unwrap();
    points
}

/// Unnormalized normal of a triangle, following its `Same` loop.
fn triangle_normal(model: &Model, face: FaceId) -> Vec3 {
    let points = model.lu_points(model.face_loopuses(face)[0]);
    (points[1] - points[0]).cross(&(points[2] - points[0]))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    // -----------------------------------------------------------------------
    // 1. Every box satisfies the radial invariant and round-trips as an ARB8
    // -----------------------------------------------------------------------

    #[test]
    fn box_converts_to_its_own_corners(origin in arb_origin(), extent in arb_extent()) {
        let mut model = Model::new();
        let tol = Tolerance::default();
        let points = boxed(&mut model, origin, extent, &tol);
        let shell = model.shells.keys().next().unwrap();
        prop_assert!(audit_shell(&model, shell, &tol).all_valid());

        let arb = ArbSolid::from_shell(&model, shell, &tol).unwrap();
        prop_assert_eq!(arb.vertices, 8);
        for p in &points {
            prop_assert!(arb.points.iter().any(|q| Point3d::from_array(*q).distance_to(p) < 1e-9));
        }
    }

    // -----------------------------------------------------------------------
    // 2. A nudged three-plane corner is solved back onto its planes
    // -----------------------------------------------------------------------

    #[test]
    fn three_plane_corner_returns_to_corner(
        origin in arb_origin(),
        extent in arb_extent(),
        nudge in arb_nudge(),
        which in 0usize..8,
    ) {
        let mut model = Model::new();
        let config = KernelConfig::default();
        let points = boxed(&mut model, origin, extent, &config.tolerance);
        let shell = model.shells.keys().next().unwrap();
        let v = model
            .shell_vertices(shell)
            .into_iter()
            .find(|&v| model.vertices[v].point.distance_to(&points[which]) < 1e-9)
            .unwrap();
        let (nx, ny, nz) = nudge;
        let p = points[which];
        model.vertices[v].point = Point3d::new(p.x + nx, p.y + ny, p.z + nz);

        solve_vertex(&mut model, v, &config).unwrap();
        prop_assert!(model.vertices[v].point.distance_to(&p) <= config.tolerance.dist);
        for face in model.vertex_faces(v) {
            prop_assert!(model.faces[face].plane.contains(&model.vertices[v].point, &config.tolerance));
        }
    }

    // -----------------------------------------------------------------------
    // 3. Orientation repair flips exactly the damaged faces and is idempotent
    // -----------------------------------------------------------------------

    #[test]
    fn normal_fix_is_idempotent(extent in arb_extent(), mask in 0u8..64) {
        let mut model = Model::new();
        let config = KernelConfig::default();
        let (dx, dy, dz) = extent;
        let (_, shell) =
            make_box_shell(&mut model, Point3d::ORIGIN, Point3d::new(dx, dy, dz), &config.tolerance).unwrap();
        for (i, face) in model.shell_faces(shell).into_iter().enumerate() {
            if mask & (1 << i) != 0 {
                flip_face(&mut model, face);
            }
        }

        let first = fix_shell_normals(&mut model, shell, &config).unwrap();
        prop_assert_eq!(first.flipped, mask.count_ones() as usize);
        prop_assert!(audit_shell(&model, shell, &config.tolerance).all_valid());
        let second = fix_shell_normals(&mut model, shell, &config).unwrap();
        prop_assert_eq!(second.flipped, 0);
    }

    // -----------------------------------------------------------------------
    // 4. Decomposition partitions the faces of disjoint boxes
    // -----------------------------------------------------------------------

    #[test]
    fn decomposition_partitions_disjoint_boxes(count in 1usize..5, gap in 0.5f64..10.0) {
        let mut model = Model::new();
        let tol = Tolerance::default();
        let mut shells = Vec::new();
        for i in 0..count {
            let x = i as f64 * (1.0 + gap);
            let (_, s) =
                make_box_shell(&mut model, Point3d::new(x, 0.0, 0.0), Point3d::new(x + 1.0, 1.0, 1.0), &tol).unwrap();
            shells.push(s);
        }
        for &s in &shells[1..] {
            join_shells(&mut model, shells[0], s);
        }

        let parts = decompose_shell(&mut model, shells[0], &tol);
        prop_assert_eq!(parts.len(), count);
        prop_assert_eq!(parts[0], shells[0]);
        for &part in &parts {
            prop_assert_eq!(model.shell_faces(part).len(), 6);
            prop_assert!(audit_shell(&model, part, &tol).all_valid());
        }
    }

    // -----------------------------------------------------------------------
    // 5. Decimating a flat grid keeps it flat, valid and bounded
    // -----------------------------------------------------------------------

    #[test]
    fn decimation_keeps_flat_grid_safe(nx in 2usize..6, ny in 2usize..6, cell in 0.1f64..5.0) {
        let mut model = Model::new();
        let config = KernelConfig::default();
        let (_, shell) = make_grid(&mut model, nx, ny, cell, &config.tolerance).unwrap();
        let free_before = model.shell_free_edges(shell).len();

        let collapsed = decimate_shell(&mut model, shell, &config);
        prop_assert_eq!(model.shell_faces(shell).len(), 2 * nx * ny - 2 * collapsed);
        prop_assert_eq!(model.shell_free_edges(shell).len(), free_before);
        for face in model.shell_faces(shell) {
            prop_assert!(model.faces[face].plane.normal.z > 0.999);
        }
        prop_assert!(audit_shell(&model, shell, &config.tolerance).all_valid());
    }

    // -----------------------------------------------------------------------
    // 6. Faceted frustums are recognized with their radii
    // -----------------------------------------------------------------------

    #[test]
    fn frustum_recognized_as_tgc(
        n in 5usize..32,
        r_base in 0.5f64..10.0,
        r_top in 0.5f64..10.0,
        height in 0.5f64..20.0,
    ) {
        let mut model = Model::new();
        let tol = Tolerance::default();
        let (_, shell) = make_frustum(&mut model, n, r_base, r_top, height, &tol).unwrap();

        let tgc = TgcSolid::from_shell(&model, shell, &tol).unwrap();
        prop_assert!((tgc.base_radius() - r_base).abs() < 1e-6);
        prop_assert!((tgc.top_radius() - r_top).abs() < 1e-6);
        let expected = if (r_base - r_top).abs() <= tol.dist { TgcForm::Rcc } else { TgcForm::Trc };
        prop_assert_eq!(tgc.form, expected);
    }

    // -----------------------------------------------------------------------
    // 7. Every collapse on a bumpy grid stays within distance and never flips
    // -----------------------------------------------------------------------

    #[test]
    fn collapses_on_bumpy_grid_respect_limits(
        heights in prop::collection::vec(-1.0f64..1.0, 36),
        amplitude in 0.0001f64..0.5,
        max_distance in 0.0001f64..1.0,
        angle in 5.0f64..=180.0,
    ) {
        let mut model = Model::new();
        let tol = Tolerance::default();
        let params = CollapseParams::new(max_distance, angle);
        let (_, shell) = make_grid(&mut model, 5, 5, 1.0, &tol).unwrap();
        for (v, h) in model.shell_vertices(shell).into_iter().zip(&heights) {
            model.vertices[v].point.z = h * amplitude;
        }
        for face in model.shell_faces(shell) {
            model.faces[face].plane = face_plane_from_loops(&model, face).unwrap();
        }

        for _ in 0..params.max_sweeps {
            let mut changed = false;
            for edge in model.shell_edges(shell) {
                if !model.edges.contains_key(edge) {
                    continue;
                }
                let Some(candidate) = choose_collapse(&model, edge, &params, &tol) else {
                    continue;
                };
                let target = model.vertices[candidate.to].point;
                let removed = model.edge_faces(edge);
                let moved: Vec<(FaceId, Vec3)> = model
                    .vertex_faces(candidate.from)
                    .into_iter()
                    .filter(|f| !removed.contains(f))
                    .map(|f| (f, triangle_normal(&model, f)))
                    .collect();
                prop_assert!(candidate.deviation <= params.max_distance);
                for &(face, _) in &moved {
                    let plane = model.faces[face].plane;
                    prop_assert!(plane.distance(&target).abs() <= params.max_distance + 1e-12);
                }

                prop_assert_eq!(collapse_edge(&mut model, edge, &params, &tol), Some(candidate.to));
                for (face, before) in moved {
                    prop_assert!(model.faces.contains_key(face));
                    let after = triangle_normal(&model, face);
                    prop_assert!(before.dot(&after) > 0.0);
                    prop_assert!(before.cos_angle(&after) >= params.min_normal_cosine() - 1e-9);
                }
                changed = true;
            }
            if !changed {
                break;
            }
        }
        prop_assert!(audit_shell(&model, shell, &tol).radial_valid);
    }
}
