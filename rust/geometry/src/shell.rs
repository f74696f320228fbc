// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Closed shell input model.
//!
//! This is the boundary the host application hands over for a room: a set of
//! solids, each a set of faces, each a set of boundary loops of points in
//! native modelling units. The first loop of a face is its outer boundary,
//! the remaining loops are holes.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::triangulation::triangulate_face;
use crate::{Error, Result};

/// One planar or near-planar face bounded by one or more loops.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub loops: Vec<Vec<[f64; 3]>>,
}

impl Face {
    /// Face with a single outer loop.
    pub fn from_points(points: &[Point3<f64>]) -> Self {
        Self {
            loops: vec![points.iter().map(|p| [p.x, p.y, p.z]).collect()],
        }
    }

    /// Loops converted to points.
    pub fn loop_points(&self) -> Vec<Vec<Point3<f64>>> {
        self.loops
            .iter()
            .map(|l| l.iter().map(|c| Point3::new(c[0], c[1], c[2])).collect())
            .collect()
    }
}

/// A solid component of a closed shell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Solid {
    /// Volume reported by the host, in cubic native units. When absent the
    /// signed volume is computed from the triangulated faces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    pub faces: Vec<Face>,
}

impl Solid {
    pub fn new(faces: Vec<Face>) -> Self {
        Self {
            volume: None,
            faces,
        }
    }

    /// Triangulate every face and resolve the solid's volume: the host value
    /// when present, otherwise the signed volume enclosed by the triangles
    /// (negative for inward-facing shells). Faces whose outer loop collapses
    /// below three points are counted and left out.
    pub fn triangulate(&self, tolerance: f64) -> Result<TriangulatedSolid> {
        let mut triangles = Vec::new();
        let mut degenerate_faces = 0;

        for face in &self.faces {
            match triangulate_face(&face.loop_points(), tolerance) {
                Ok(mut tris) => triangles.append(&mut tris),
                Err(Error::DegenerateFace(points)) => {
                    tracing::debug!(points, "skipping degenerate face");
                    degenerate_faces += 1;
                }
                Err(e) => return Err(e),
            }
        }

        let volume = self.volume.unwrap_or_else(|| signed_volume(&triangles));
        Ok(TriangulatedSolid {
            triangles,
            degenerate_faces,
            volume,
        })
    }
}

/// Triangles of a solid in face order, before deduplication.
#[derive(Debug, Clone)]
pub struct TriangulatedSolid {
    pub triangles: Vec<[Point3<f64>; 3]>,
    pub degenerate_faces: usize,
    pub volume: f64,
}

/// Closed boundary of a room: the solids returned by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClosedShell {
    pub solids: Vec<Solid>,
}

impl ClosedShell {
    pub fn new(solids: Vec<Solid>) -> Self {
        Self { solids }
    }

    pub fn face_count(&self) -> usize {
        self.solids.iter().map(|s| s.faces.len()).sum()
    }
}

/// Signed volume enclosed by a triangle soup, summed as tetrahedra against
/// the origin. Positive when triangles wind counter-clockwise seen from
/// outside.
pub fn signed_volume(triangles: &[[Point3<f64>; 3]]) -> f64 {
    let sum: f64 = triangles
        .iter()
        .map(|[p0, p1, p2]| p0.coords.dot(&p1.coords.cross(&p2.coords)))
        .sum();
    sum / 6.0
}

/// Axis-aligned box between `min` and `max` with outward-facing quads.
/// Handy for host adapters and tests.
pub fn box_solid(min: Point3<f64>, max: Point3<f64>) -> Solid {
    let p = |x: f64, y: f64, z: f64| Point3::new(x, y, z);
    let (a, b) = (min, max);
    let quads = [
        // bottom, top
        [p(a.x, a.y, a.z), p(a.x, b.y, a.z), p(b.x, b.y, a.z), p(b.x, a.y, a.z)],
        [p(a.x, a.y, b.z), p(b.x, a.y, b.z), p(b.x, b.y, b.z), p(a.x, b.y, b.z)],
        // front, back
        [p(a.x, a.y, a.z), p(b.x, a.y, a.z), p(b.x, a.y, b.z), p(a.x, a.y, b.z)],
        [p(a.x, b.y, a.z), p(a.x, b.y, b.z), p(b.x, b.y, b.z), p(b.x, b.y, a.z)],
        // left, right
        [p(a.x, a.y, a.z), p(a.x, a.y, b.z), p(a.x, b.y, b.z), p(a.x, b.y, a.z)],
        [p(b.x, a.y, a.z), p(b.x, b.y, a.z), p(b.x, b.y, b.z), p(b.x, a.y, b.z)],
    ];
    Solid::new(quads.iter().map(|q| Face::from_points(q)).collect())
}
