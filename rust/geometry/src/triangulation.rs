// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Face triangulation utilities
//!
//! Host edge loops are not trusted for connectivity: every face is
//! re-triangulated from its boundary loops. Loops are projected onto the
//! face plane and triangulated with earcutr; each resulting triangle is
//! wound to agree with the face normal.

use nalgebra::{Point2, Point3, Vector3};

use crate::{Error, Result};

/// Check if a polygon is convex (all cross products have same sign)
#[inline]
fn is_convex(points: &[Point2<f64>]) -> bool {
    if points.len() < 3 {
        return false;
    }

    let n = points.len();
    let mut sign = 0i8;

    for i in 0..n {
        let p0 = &points[i];
        let p1 = &points[(i + 1) % n];
        let p2 = &points[(i + 2) % n];

        let cross = (p1.x - p0.x) * (p2.y - p1.y) - (p1.y - p0.y) * (p2.x - p1.x);

        if cross.abs() > 1e-10 {
            let current_sign = if cross > 0.0 { 1i8 } else { -1i8 };
            if sign == 0 {
                sign = current_sign;
            } else if sign != current_sign {
                return false;
            }
        }
    }

    true
}

/// Simple fan triangulation for convex polygons
#[inline]
fn fan_triangulate(n: usize) -> Vec<usize> {
    let mut indices = Vec::with_capacity((n - 2) * 3);
    for i in 1..n - 1 {
        indices.push(0);
        indices.push(i);
        indices.push(i + 1);
    }
    indices
}

/// Triangulate a simple polygon (no holes)
/// Returns triangle indices into the input points
pub fn triangulate_polygon(points: &[Point2<f64>]) -> Result<Vec<usize>> {
    let n = points.len();

    if n < 3 {
        return Err(Error::TriangulationError(
            "Need at least 3 points to triangulate".to_string(),
        ));
    }

    if n == 3 {
        return Ok(vec![0, 1, 2]);
    }

    // Convex rings up to octagons fan out from the first vertex. Concave
    // quads are left to earcut, a fan could fold over the reflex corner.
    if n <= 8 && is_convex(points) {
        return Ok(fan_triangulate(n));
    }

    let mut vertices = Vec::with_capacity(n * 2);
    for p in points {
        vertices.push(p.x);
        vertices.push(p.y);
    }

    earcutr::earcut(&vertices, &[], 2).map_err(|e| Error::TriangulationError(format!("{:?}", e)))
}

/// Triangulate a polygon with holes
/// Returns triangle indices into the combined vertex array (outer + all holes)
pub fn triangulate_polygon_with_holes(
    outer: &[Point2<f64>],
    holes: &[Vec<Point2<f64>>],
) -> Result<Vec<usize>> {
    if outer.len() < 3 {
        return Err(Error::TriangulationError(
            "Need at least 3 points in outer boundary".to_string(),
        ));
    }

    // Callers drop holes with fewer than 3 points before projecting, so the
    // combined vertex array stays aligned with the index output.
    if holes.is_empty() {
        return triangulate_polygon(outer);
    }
    if let Some(h) = holes.iter().find(|h| h.len() < 3) {
        return Err(Error::TriangulationError(format!(
            "Hole has {} points, need at least 3",
            h.len()
        )));
    }

    let total_points: usize = outer.len() + holes.iter().map(|h| h.len()).sum::<usize>();
    let mut vertices = Vec::with_capacity(total_points * 2);

    for p in outer {
        vertices.push(p.x);
        vertices.push(p.y);
    }

    let mut hole_indices = Vec::with_capacity(holes.len());
    for hole in holes {
        hole_indices.push(vertices.len() / 2);
        for p in hole {
            vertices.push(p.x);
            vertices.push(p.y);
        }
    }

    earcutr::earcut(&vertices, &hole_indices, 2)
        .map_err(|e| Error::TriangulationError(format!("{:?}", e)))
}

/// Project 3D points onto a 2D plane defined by a normal
/// Returns 2D points and the coordinate system (u_axis, v_axis, origin)
///
/// The basis satisfies `u_axis × v_axis = normal`, so a counter-clockwise
/// 2D ring is counter-clockwise around the normal in 3D.
pub fn project_to_2d(
    points_3d: &[Point3<f64>],
    normal: &Vector3<f64>,
) -> (Vec<Point2<f64>>, Vector3<f64>, Vector3<f64>, Point3<f64>) {
    if points_3d.is_empty() {
        return (
            Vec::new(),
            Vector3::zeros(),
            Vector3::zeros(),
            Point3::origin(),
        );
    }

    let origin = points_3d[0];

    // Reference axis least parallel to the normal for a stable cross product
    let abs_x = normal.x.abs();
    let abs_y = normal.y.abs();
    let abs_z = normal.z.abs();

    let reference = if abs_x <= abs_y && abs_x <= abs_z {
        Vector3::new(1.0, 0.0, 0.0)
    } else if abs_y <= abs_z {
        Vector3::new(0.0, 1.0, 0.0)
    } else {
        Vector3::new(0.0, 0.0, 1.0)
    };

    let u_axis = normal.cross(&reference).normalize();
    let v_axis = normal.cross(&u_axis).normalize();

    let points_2d = project_to_2d_with_basis(points_3d, &u_axis, &v_axis, &origin);

    (points_2d, u_axis, v_axis, origin)
}

/// Project 3D points using an existing coordinate system
/// This ensures multiple sets of points use the same 2D space
#[inline]
pub fn project_to_2d_with_basis(
    points_3d: &[Point3<f64>],
    u_axis: &Vector3<f64>,
    v_axis: &Vector3<f64>,
    origin: &Point3<f64>,
) -> Vec<Point2<f64>> {
    points_3d
        .iter()
        .map(|p| {
            let v = p - origin;
            Point2::new(v.dot(u_axis), v.dot(v_axis))
        })
        .collect()
}

/// Calculate the normal of a polygon from its vertices using Newell's
/// method. Returns +Z for degenerate input.
pub fn calculate_polygon_normal(points: &[Point3<f64>]) -> Vector3<f64> {
    let n = points.len();

    if n < 3 {
        return Vector3::new(0.0, 0.0, 1.0);
    }

    if n == 3 {
        let normal = (points[1] - points[0]).cross(&(points[2] - points[0]));
        let len = normal.norm();
        if len > 1e-10 {
            return normal / len;
        }
        return Vector3::new(0.0, 0.0, 1.0);
    }

    let mut normal = Vector3::<f64>::zeros();

    for i in 0..n {
        let current = &points[i];
        let next = &points[(i + 1) % n];

        normal.x += (current.y - next.y) * (current.z + next.z);
        normal.y += (current.z - next.z) * (current.x + next.x);
        normal.z += (current.x - next.x) * (current.y + next.y);
    }

    let len = normal.norm();
    if len > 1e-10 {
        normal / len
    } else {
        Vector3::new(0.0, 0.0, 1.0)
    }
}

/// Remove a duplicated closing point and consecutive points closer than
/// `tolerance`.
pub fn sanitize_loop(points: &[Point3<f64>], tolerance: f64) -> Vec<Point3<f64>> {
    let mut cleaned: Vec<Point3<f64>> = Vec::with_capacity(points.len());

    for p in points {
        match cleaned.last() {
            Some(last) if (p - last).norm() < tolerance => {}
            _ => cleaned.push(*p),
        }
    }

    while cleaned.len() > 1 {
        let (first, last) = (cleaned[0], cleaned[cleaned.len() - 1]);
        if (last - first).norm() < tolerance {
            cleaned.pop();
        } else {
            break;
        }
    }

    cleaned
}

/// Triangulate a face given as boundary loops (outer first, then holes).
///
/// Returns triangles in 3D, each wound to agree with the outer loop's
/// normal. Holes with fewer than 3 distinct points are dropped; an outer
/// loop with fewer than 3 distinct points is a [`Error::DegenerateFace`].
pub fn triangulate_face(loops: &[Vec<Point3<f64>>], tolerance: f64) -> Result<Vec<[Point3<f64>; 3]>> {
    let Some(outer_raw) = loops.first() else {
        return Err(Error::DegenerateFace(0));
    };

    let outer = sanitize_loop(outer_raw, tolerance);
    if outer.len() < 3 {
        return Err(Error::DegenerateFace(outer.len()));
    }

    let holes: Vec<Vec<Point3<f64>>> = loops[1..]
        .iter()
        .map(|l| sanitize_loop(l, tolerance))
        .filter(|l| l.len() >= 3)
        .collect();

    let normal = calculate_polygon_normal(&outer);

    if outer.len() == 3 && holes.is_empty() {
        return Ok(vec![[outer[0], outer[1], outer[2]]]);
    }

    let (outer_2d, u_axis, v_axis, origin) = project_to_2d(&outer, &normal);
    let holes_2d: Vec<Vec<Point2<f64>>> = holes
        .iter()
        .map(|h| project_to_2d_with_basis(h, &u_axis, &v_axis, &origin))
        .collect();

    let indices = triangulate_polygon_with_holes(&outer_2d, &holes_2d)?;

    let all_points: Vec<Point3<f64>> = outer
        .iter()
        .chain(holes.iter().flatten())
        .copied()
        .collect();

    let mut triangles = Vec::with_capacity(indices.len() / 3);
    for tri in indices.chunks_exact(3) {
        let (a, b, c) = (all_points[tri[0]], all_points[tri[1]], all_points[tri[2]]);
        if (b - a).cross(&(c - a)).dot(&normal) < 0.0 {
            triangles.push([a, c, b]);
        } else {
            triangles.push([a, b, c]);
        }
    }

    Ok(triangles)
}

/// Smallest internal angle of a triangle, in degrees. Zero when any edge
/// has zero length.
pub fn min_angle_degrees(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    fn angle(at: &Point3<f64>, p: &Point3<f64>, q: &Point3<f64>) -> f64 {
        let u = p - at;
        let v = q - at;
        let denom = u.norm() * v.norm();
        if denom <= f64::EPSILON {
            return 0.0;
        }
        (u.dot(&v) / denom).clamp(-1.0, 1.0).acos()
    }

    let min = angle(a, b, c).min(angle(b, c, a)).min(angle(c, a, b));
    min.to_degrees()
}
