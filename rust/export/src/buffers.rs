// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared coordinate and index buffers for one export
//!
//! Every room mesh is appended to the same pair of buffers. Coordinates are
//! whole millimetres, three per vertex; indices are `u16`, three per
//! triangle, offset by the number of vertices already stored. Each append
//! hands back the half-open ranges it occupies. Ranges never overlap and
//! follow append order.

use std::ops::Range;

use room_volume_geometry::{MaterialId, Mesh};
use thiserror::Error;

use crate::units::{IntPoint3, LengthUnit};

/// Reasons an append is refused. The buffers are left untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BufferError {
    #[error("vertex index {index} exceeds the 16-bit index limit {limit}")]
    IndexOverflow { index: usize, limit: usize },

    #[error("coordinate {value} does not fit a 32-bit millimetre value")]
    CoordinateOverflow { value: f64 },

    #[error("triangle refers to vertex {index} but the mesh has {vertex_count} vertices")]
    DanglingIndex { index: u32, vertex_count: usize },
}

/// Where one appended mesh landed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Range into the coordinate buffer (three values per vertex)
    pub coordinates: Range<usize>,
    /// Range into the index buffer (three values per triangle)
    pub indices: Range<usize>,
    pub min: IntPoint3,
    pub max: IntPoint3,
    pub material: Option<MaterialId>,
}

impl Segment {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.coordinates.len() / 3
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Append-only coordinate and index buffers
#[derive(Debug, Clone, Default)]
pub struct MeshBuffers {
    unit: LengthUnit,
    coordinates: Vec<i32>,
    indices: Vec<u16>,
}

impl MeshBuffers {
    pub fn new(unit: LengthUnit) -> Self {
        Self {
            unit,
            coordinates: Vec::new(),
            indices: Vec::new(),
        }
    }

    /// Append a mesh. Every check runs before the buffers are touched, so a
    /// failed append changes nothing.
    pub fn append(
        &mut self,
        mesh: &Mesh,
        material: Option<MaterialId>,
    ) -> Result<Segment, BufferError> {
        let base = self.vertex_count();
        let vertex_count = mesh.vertex_count();

        let mut indices = Vec::with_capacity(mesh.triangle_count() * 3);
        for tri in mesh.triangles() {
            for &v in &tri.vertices {
                if v as usize >= vertex_count {
                    return Err(BufferError::DanglingIndex {
                        index: v,
                        vertex_count,
                    });
                }
                let index = base + v as usize;
                let index = u16::try_from(index).map_err(|_| BufferError::IndexOverflow {
                    index,
                    limit: u16::MAX as usize,
                })?;
                indices.push(index);
            }
        }

        let mut coordinates = Vec::with_capacity(vertex_count * 3);
        let mut bounds: Option<(IntPoint3, IntPoint3)> = None;
        for p in &mesh.vertices {
            let q = IntPoint3::quantize(p, self.unit).ok_or_else(|| {
                let value = [p.x, p.y, p.z]
                    .into_iter()
                    .find(|&c| self.unit.quantize(c).is_none())
                    .unwrap_or(f64::NAN);
                BufferError::CoordinateOverflow { value }
            })?;
            coordinates.extend_from_slice(&[q.x, q.y, q.z]);
            bounds = Some(match bounds {
                Some((min, max)) => (min.min(q), max.max(q)),
                None => (q, q),
            });
        }
        let (min, max) = bounds.unwrap_or_default();

        let coordinates_begin = self.coordinates.len();
        let indices_begin = self.indices.len();
        self.coordinates.extend_from_slice(&coordinates);
        self.indices.extend_from_slice(&indices);

        Ok(Segment {
            coordinates: coordinates_begin..self.coordinates.len(),
            indices: indices_begin..self.indices.len(),
            min,
            max,
            material,
        })
    }

    #[inline]
    pub fn unit(&self) -> LengthUnit {
        self.unit
    }

    /// Coordinates in millimetres, `x, y, z` per vertex
    #[inline]
    pub fn coordinates(&self) -> &[i32] {
        &self.coordinates
    }

    #[inline]
    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.coordinates.len() / 3
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty() && self.indices.is_empty()
    }
}
