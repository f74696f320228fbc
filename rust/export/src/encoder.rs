// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Binary mesh blob and text manifest
//!
//! Blob layout (little-endian, no header):
//! - all coordinates as `f32` millimetres, `x, y, z` per vertex
//! - then all triangle indices as `u16`, three per triangle
//!
//! The manifest is the only place lengths are recorded. Its first line is the
//! room count, followed by one comma-separated line per room:
//!
//! ```text
//! ElementId,UniqueId,RoomName,Min,Max,CoordinatesBegin,CoordinatesCount,TriangleVertexIndicesBegin,TriangleVertexIndexCount
//! ```

use std::fmt;
use std::ops::Range;

use serde::Serialize;

use crate::buffers::{MeshBuffers, Segment};
use crate::units::IntPoint3;

/// Manifest entry for one exported room
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomRecord {
    pub element_id: i64,
    pub unique_id: String,
    pub name: String,
    pub min: IntPoint3,
    pub max: IntPoint3,
    pub coordinates_begin: usize,
    pub coordinates_count: usize,
    pub indices_begin: usize,
    pub indices_count: usize,
}

impl RoomRecord {
    pub fn new(element_id: i64, unique_id: &str, name: &str, segment: &Segment) -> Self {
        Self {
            element_id,
            unique_id: unique_id.to_string(),
            name: name.to_string(),
            min: segment.min,
            max: segment.max,
            coordinates_begin: segment.coordinates.start,
            coordinates_count: segment.coordinates.len(),
            indices_begin: segment.indices.start,
            indices_count: segment.indices.len(),
        }
    }

    #[inline]
    pub fn coordinates(&self) -> Range<usize> {
        self.coordinates_begin..self.coordinates_begin + self.coordinates_count
    }

    #[inline]
    pub fn indices(&self) -> Range<usize> {
        self.indices_begin..self.indices_begin + self.indices_count
    }
}

impl fmt::Display for RoomRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{},{},{},{}",
            self.element_id,
            self.unique_id,
            self.name,
            self.min,
            self.max,
            self.coordinates_begin,
            self.coordinates_count,
            self.indices_begin,
            self.indices_count
        )
    }
}

/// Encoded artifacts of one export
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncodedExport {
    pub manifest: String,
    pub blob: Vec<u8>,
}

/// `""` for one, `"s"` otherwise
#[inline]
pub fn plural_suffix(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Serialize the buffers and room records.
pub fn encode(buffers: &MeshBuffers, records: &[RoomRecord]) -> EncodedExport {
    EncodedExport {
        manifest: encode_manifest(records),
        blob: encode_blob(buffers),
    }
}

pub fn encode_manifest(records: &[RoomRecord]) -> String {
    let mut manifest = format!("{} room{}\n", records.len(), plural_suffix(records.len()));
    for record in records {
        manifest.push_str(&record.to_string());
        manifest.push('\n');
    }
    manifest
}

pub fn encode_blob(buffers: &MeshBuffers) -> Vec<u8> {
    let coordinates = buffers.coordinates();
    let indices = buffers.indices();
    let mut blob = Vec::with_capacity(coordinates.len() * 4 + indices.len() * 2);

    for &c in coordinates {
        blob.extend_from_slice(&(c as f32).to_le_bytes());
    }
    for &i in indices {
        blob.extend_from_slice(&i.to_le_bytes());
    }

    blob
}

/// Byte layout of a blob, recovered from manifest records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlobLayout {
    pub coordinate_count: usize,
    pub index_count: usize,
}

impl BlobLayout {
    pub fn for_records(records: &[RoomRecord]) -> Self {
        Self {
            coordinate_count: records.iter().map(|r| r.coordinates().end).max().unwrap_or(0),
            index_count: records.iter().map(|r| r.indices().end).max().unwrap_or(0),
        }
    }

    /// Byte offset where the index stream starts
    #[inline]
    pub fn index_offset(&self) -> usize {
        self.coordinate_count * 4
    }

    /// Total blob length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.index_offset() + self.index_count * 2
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn coordinate_bytes(&self, record: &RoomRecord) -> Range<usize> {
        let r = record.coordinates();
        r.start * 4..r.end * 4
    }

    pub fn index_bytes(&self, record: &RoomRecord) -> Range<usize> {
        let r = record.indices();
        self.index_offset() + r.start * 2..self.index_offset() + r.end * 2
    }

    /// A room's coordinates read back from `blob`
    pub fn read_coordinates(&self, blob: &[u8], record: &RoomRecord) -> Option<Vec<f32>> {
        let bytes = blob.get(self.coordinate_bytes(record))?;
        Some(
            bytes
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
        )
    }

    /// A room's indices read back from `blob`
    pub fn read_indices(&self, blob: &[u8], record: &RoomRecord) -> Option<Vec<u16>> {
        let bytes = blob.get(self.index_bytes(record))?;
        Some(
            bytes
                .chunks_exact(2)
                .map(|b| u16::from_le_bytes([b[0], b[1]]))
                .collect(),
        )
    }
}
