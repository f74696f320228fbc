// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh data structures

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::dedup::VertexId;

/// Host material (or graphics style) element id attached to triangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaterialId(pub i64);

/// Triangle referencing three distinct canonical vertices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriangleFace {
    pub vertices: [VertexId; 3],
    pub material: Option<MaterialId>,
}

impl TriangleFace {
    #[inline]
    pub fn new(vertices: [VertexId; 3], material: Option<MaterialId>) -> Self {
        Self { vertices, material }
    }

    /// Reverse the winding in place
    #[inline]
    pub fn flip(&mut self) {
        self.vertices.swap(1, 2);
    }

    /// Directed edges in winding order
    #[inline]
    pub fn edges(&self) -> [(VertexId, VertexId); 3] {
        let [a, b, c] = self.vertices;
        [(a, b), (b, c), (c, a)]
    }
}

/// How a face set was finally built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShellKind {
    /// Closed, consistently oriented, outward-facing manifold
    Solid,
    /// General triangle mesh produced by the fallback
    Mesh,
}

/// One connected face set of a mesh
#[derive(Debug, Clone, PartialEq)]
pub struct FaceSet {
    pub kind: ShellKind,
    pub triangles: Vec<TriangleFace>,
}

impl FaceSet {
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }
}

/// Triangle mesh of one room
///
/// Vertices are listed in the order accepted triangles first reference
/// them; every triangle index is below `vertices.len()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Point3<f64>>,
    pub shells: Vec<FaceSet>,
}

impl Mesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Get vertex count
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get triangle count across all face sets
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.shells.iter().map(FaceSet::triangle_count).sum()
    }

    /// Check if mesh is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triangle_count() == 0
    }

    /// All triangles in face-set order
    pub fn triangles(&self) -> impl Iterator<Item = &TriangleFace> {
        self.shells.iter().flat_map(|s| s.triangles.iter())
    }

    /// Signed volume enclosed by all triangles
    pub fn signed_volume(&self) -> f64 {
        let sum: f64 = self
            .triangles()
            .map(|t| {
                let [a, b, c] = t.vertices.map(|v| self.vertices[v as usize].coords);
                a.dot(&b.cross(&c))
            })
            .sum();
        sum / 6.0
    }
}
