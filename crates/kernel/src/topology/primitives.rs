//! Construction of common closed and open shells.
//!
//! Every builder creates faces with outward winding and glues shared edges,
//! so the result satisfies the graph invariants.

use std::collections::HashMap;

use tracing::{info, instrument};

use super::euler::{glue_faces, make_face, make_region, make_vertex};
use super::model::*;
use crate::error::KernelError;
use crate::geometry::point::Point3d;
use crate::Tolerance;

/// Face table of an ARB8 in point order: bottom, top, then the four sides.
pub const ARB8_FACES: [[usize; 4]; 6] = [
    [0, 3, 2, 1],
    [4, 5, 6, 7],
    [0, 1, 5, 4],
    [1, 2, 6, 5],
    [2, 3, 7, 6],
    [3, 0, 4, 7],
];

/// Create faces over existing vertices and glue them.
pub fn make_faces(
    model: &mut Model,
    shell: ShellId,
    verts: &[VertexId],
    faces: &[Vec<usize>],
    tol: &Tolerance,
) -> Result<Vec<FaceId>, KernelError> {
    let mut out = Vec::with_capacity(faces.len());
    for face in faces {
        let loop_verts: Vec<VertexId> = face.iter().map(|&i| verts[i]).collect();
        out.push(make_face(model, shell, &loop_verts)?);
    }
    glue_faces(model, &out, tol);
    let region = model.shells[shell].region;
    model.rebound_region(region);
    Ok(out)
}

/// Polyhedron in `shell` from a point list and per-face point indices.
#[instrument(skip_all, fields(points = points.len(), faces = faces.len()))]
pub fn make_polyhedron(
    model: &mut Model,
    shell: ShellId,
    points: &[Point3d],
    faces: &[Vec<usize>],
    tol: &Tolerance,
) -> Result<Vec<FaceId>, KernelError> {
    let verts: Vec<VertexId> = points.iter().map(|&p| make_vertex(model, p)).collect();
    make_faces(model, shell, &verts, faces, tol)
}

/// Eight-point hexahedron in a new region, faces per [`ARB8_FACES`].
pub fn make_arb8(
    model: &mut Model,
    points: &[Point3d; 8],
    tol: &Tolerance,
) -> Result<(RegionId, ShellId), KernelError> {
    let (region, shell) = make_region(model);
    let faces: Vec<Vec<usize>> = ARB8_FACES.iter().map(|f| f.to_vec()).collect();
    make_polyhedron(model, shell, points, &faces, tol)?;
    Ok((region, shell))
}

/// Axis-aligned box between two corners, in a new region.
#[instrument(skip(model, tol))]
pub fn make_box_shell(
    model: &mut Model,
    min: Point3d,
    max: Point3d,
    tol: &Tolerance,
) -> Result<(RegionId, ShellId), KernelError> {
    info!(min = ?[min.x, min.y, min.z], max = ?[max.x, max.y, max.z], "creating box shell");
    let (x0, y0, z0) = (min.x, min.y, min.z);
    let (x1, y1, z1) = (max.x, max.y, max.z);
    let points = [
        Point3d::new(x0, y0, z0),
        Point3d::new(x1, y0, z0),
        Point3d::new(x1, y1, z0),
        Point3d::new(x0, y1, z0),
        Point3d::new(x0, y0, z1),
        Point3d::new(x1, y0, z1),
        Point3d::new(x1, y1, z1),
        Point3d::new(x0, y1, z1),
    ];
    make_arb8(model, &points, tol)
}

/// Tetrahedron on four points, wound so the first three face away from the fourth.
pub fn make_tetrahedron(
    model: &mut Model,
    points: &[Point3d; 4],
    tol: &Tolerance,
) -> Result<(RegionId, ShellId), KernelError> {
    let [a, b, c, d] = *points;
    let below = (b - a).cross(&(c - a)).dot(&(d - a)) > 0.0;
    let faces: Vec<Vec<usize>> = if below {
        vec![vec![0, 2, 1], vec![0, 1, 3], vec![1, 2, 3], vec![2, 0, 3]]
    } else {
        vec![vec![0, 1, 2], vec![0, 3, 1], vec![1, 3, 2], vec![2, 3, 0]]
    };
    let (region, shell) = make_region(model);
    make_polyhedron(model, shell, points, &faces, tol)?;
    Ok((region, shell))
}

/// Two unit cubes side by side in one shell, each with its own face on `x = 1`.
///
/// The shell is non-manifold along the four contact edges.
pub fn make_glued_cubes(model: &mut Model, tol: &Tolerance) -> Result<(RegionId, ShellId), KernelError> {
    let (region, shell) = make_region(model);
    let mut points: Vec<Point3d> = [
        (0.0, 0.0, 0.0),
        (1.0, 0.0, 0.0),
        (1.0, 1.0, 0.0),
        (0.0, 1.0, 0.0),
        (0.0, 0.0, 1.0),
        (1.0, 0.0, 1.0),
        (1.0, 1.0, 1.0),
        (0.0, 1.0, 1.0),
    ]
    .iter()
    .map(|&(x, y, z)| Point3d::new(x, y, z))
    .collect();
    points.extend([
        Point3d::new(2.0, 0.0, 0.0),
        Point3d::new(2.0, 1.0, 0.0),
        Point3d::new(2.0, 0.0, 1.0),
        Point3d::new(2.0, 1.0, 1.0),
    ]);
    let second = [1, 8, 9, 2, 5, 10, 11, 6];
    let mut faces: Vec<Vec<usize>> = ARB8_FACES.iter().map(|f| f.to_vec()).collect();
    faces.extend(ARB8_FACES.iter().map(|f| f.iter().map(|&i| second[i]).collect()));
    make_polyhedron(model, shell, &points, &faces, tol)?;
    Ok((region, shell))
}

/// Frustum of an `n`-gon: base radius `r_base` at `z = 0`, top radius `r_top` at `z = height`.
pub fn make_frustum(
    model: &mut Model,
    n: usize,
    r_base: f64,
    r_top: f64,
    height: f64,
    tol: &Tolerance,
) -> Result<(RegionId, ShellId), KernelError> {
    let (region, shell) = make_region(model);
    let mut points = Vec::with_capacity(2 * n);
    for (radius, z) in [(r_base, 0.0), (r_top, height)] {
        for i in 0..n {
            let t = std::f64::consts::TAU * i as f64 / n as f64;
            points.push(Point3d::new(radius * t.cos(), radius * t.sin(), z));
        }
    }
    let mut faces: Vec<Vec<usize>> = vec![(0..n).rev().collect(), (n..2 * n).collect()];
    for i in 0..n {
        let j = (i + 1) % n;
        faces.push(vec![i, j, n + j, n + i]);
    }
    make_polyhedron(model, shell, &points, &faces, tol)?;
    Ok((region, shell))
}

/// Closed cube of side `size` at the origin, each side split into an
/// `n x n` grid of triangle pairs.
pub fn make_subdivided_box(
    model: &mut Model,
    n: usize,
    size: f64,
    tol: &Tolerance,
) -> Result<(RegionId, ShellId), KernelError> {
    let (region, shell) = make_region(model);
    let m = n as i64;
    // (origin, u, v) per side with u x v outward.
    let sides: [([i64; 3], [i64; 3], [i64; 3]); 6] = [
        ([0, 0, 0], [0, 1, 0], [1, 0, 0]),
        ([0, 0, m], [1, 0, 0], [0, 1, 0]),
        ([0, 0, 0], [1, 0, 0], [0, 0, 1]),
        ([0, m, 0], [0, 0, 1], [1, 0, 0]),
        ([0, 0, 0], [0, 0, 1], [0, 1, 0]),
        ([m, 0, 0], [0, 1, 0], [0, 0, 1]),
    ];
    let scale = size / n as f64;
    let mut lattice: HashMap<[i64; 3], VertexId> = HashMap::new();
    let mut vertex_at = |model: &mut Model, p: [i64; 3]| {
        *lattice.entry(p).or_insert_with(|| {
            make_vertex(
                model,
                Point3d::new(p[0] as f64 * scale, p[1] as f64 * scale, p[2] as f64 * scale),
            )
        })
    };
    let mut created = Vec::new();
    for (origin, u, v) in sides {
        let at = |a: i64, b: i64| -> [i64; 3] {
            [
                origin[0] + a * u[0] + b * v[0],
                origin[1] + a * u[1] + b * v[1],
                origin[2] + a * u[2] + b * v[2],
            ]
        };
        for a in 0..m {
            for b in 0..m {
                let p00 = vertex_at(model, at(a, b));
                let p10 = vertex_at(model, at(a + 1, b));
                let p11 = vertex_at(model, at(a + 1, b + 1));
                let p01 = vertex_at(model, at(a, b + 1));
                created.push(make_face(model, shell, &[p00, p10, p11])?);
                created.push(make_face(model, shell, &[p00, p11, p01])?);
            }
        }
    }
    glue_faces(model, &created, tol);
    model.rebound_region(region);
    Ok((region, shell))
}

/// Open triangulated grid of `nx x ny` cells of side `cell` in the plane `z = 0`.
pub fn make_grid(
    model: &mut Model,
    nx: usize,
    ny: usize,
    cell: f64,
    tol: &Tolerance,
) -> Result<(RegionId, ShellId), KernelError> {
    let (region, shell) = make_region(model);
    let mut points = Vec::with_capacity((nx + 1) * (ny + 1));
    for j in 0..=ny {
        for i in 0..=nx {
            points.push(Point3d::new(i as f64 * cell, j as f64 * cell, 0.0));
        }
    }
    let id = |i: usize, j: usize| j * (nx + 1) + i;
    let mut faces = Vec::with_capacity(2 * nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            faces.push(vec![id(i, j), id(i + 1, j), id(i + 1, j + 1)]);
            faces.push(vec![id(i, j), id(i + 1, j + 1), id(i, j + 1)]);
        }
    }
    make_polyhedron(model, shell, &points, &faces, tol)?;
    Ok((region, shell))
}
