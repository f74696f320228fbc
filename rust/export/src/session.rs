// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Export session: rooms in, manifest, blob and display shapes out.
//!
//! Room meshes may be built on the rayon pool, but they are consumed in room
//! order, so buffer ranges are the same as in a sequential run. A room that
//! cannot be built or whose parameters cannot be projected is skipped with a
//! [`Diagnostic`]. A room that does not fit the buffers ends the session.

use std::fs;
use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;
use room_volume_geometry::{build_mesh, BuildOptions, BuildResult};
use serde::Serialize;

use crate::buffers::MeshBuffers;
use crate::config::ExportConfig;
use crate::encoder::{encode, EncodedExport, RoomRecord};
use crate::error::{Error, Result};
use crate::properties;
use crate::room::{DisplayShape, Room};

pub const MANIFEST_FILE: &str = "manifest.txt";
pub const BLOB_FILE: &str = "rooms.bin";
pub const SHAPES_FILE: &str = "shapes.json";

/// What happened to a room that was skipped or degraded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// No solid with positive volume; skipped
    NoGeometry,
    /// Mesh could not be built; skipped
    BuildFailed,
    /// Exported, but at least one face set is a plain mesh
    FallbackMesh,
    /// Parameters could not be projected; skipped
    ProjectionFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub element_id: i64,
    pub unique_id: String,
    pub name: String,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    fn new(room: &Room, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            element_id: room.element_id,
            unique_id: room.unique_id.clone(),
            name: room.name.clone(),
            kind,
            message: message.into(),
        }
    }
}

/// Session counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportStats {
    pub rooms_total: usize,
    pub rooms_exported: usize,
    pub rooms_skipped: usize,
    pub vertices: usize,
    pub triangles: usize,
    pub points_merged: usize,
    pub triangles_rejected: usize,
    pub build_time_ms: u64,
}

/// Everything produced by one export
#[derive(Debug, Clone)]
pub struct ExportOutput {
    pub encoded: EncodedExport,
    pub records: Vec<RoomRecord>,
    pub shapes: Vec<DisplayShape>,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: ExportStats,
}

impl ExportOutput {
    /// Write the manifest, blob and display shapes into `dir`, creating it
    /// if needed.
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        fs::write(dir.join(MANIFEST_FILE), &self.encoded.manifest)?;
        fs::write(dir.join(BLOB_FILE), &self.encoded.blob)?;
        fs::write(dir.join(SHAPES_FILE), serde_json::to_vec_pretty(&self.shapes)?)?;

        tracing::info!(
            dir = %dir.display(),
            manifest_bytes = self.encoded.manifest.len(),
            blob_bytes = self.encoded.blob.len(),
            "Wrote export artifacts"
        );
        Ok(())
    }
}

/// One export over the rooms of a model
pub struct ExportSession {
    config: ExportConfig,
    options: BuildOptions,
    buffers: MeshBuffers,
    records: Vec<RoomRecord>,
    shapes: Vec<DisplayShape>,
    diagnostics: Vec<Diagnostic>,
    stats: ExportStats,
}

impl ExportSession {
    pub fn new(config: ExportConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            options: config.build_options(),
            buffers: MeshBuffers::new(config.unit),
            records: Vec::new(),
            shapes: Vec::new(),
            diagnostics: Vec::new(),
            stats: ExportStats::default(),
            config,
        })
    }

    /// Process rooms in order. Fails only on capacity or serialization
    /// errors; the session should then be dropped.
    pub fn process(&mut self, rooms: &[Room]) -> Result<()> {
        tracing::info!(
            rooms = rooms.len(),
            parallel = self.config.parallel,
            "Starting room export"
        );

        let build_start = Instant::now();
        let options = &self.options;
        let built: Vec<_> = if self.config.parallel {
            rooms
                .par_iter()
                .map(|room| build_mesh(&room.shell, options))
                .collect()
        } else {
            rooms
                .iter()
                .map(|room| build_mesh(&room.shell, options))
                .collect()
        };
        self.stats.build_time_ms += build_start.elapsed().as_millis() as u64;

        for (room, result) in rooms.iter().zip(built) {
            self.stats.rooms_total += 1;
            if self.process_room(room, result)? {
                self.stats.rooms_exported += 1;
            } else {
                self.stats.rooms_skipped += 1;
            }
        }
        Ok(())
    }

    /// Returns whether the room was exported.
    fn process_room(
        &mut self,
        room: &Room,
        built: room_volume_geometry::Result<BuildResult>,
    ) -> Result<bool> {
        let result = match built {
            Ok(result) => result,
            Err(room_volume_geometry::Error::NoPositiveVolume) => {
                tracing::warn!(element_id = room.element_id, name = %room.name, "Room has no volume, skipping");
                self.diagnostics.push(Diagnostic::new(
                    room,
                    DiagnosticKind::NoGeometry,
                    "no solid with positive volume",
                ));
                return Ok(false);
            }
            Err(e) => {
                tracing::warn!(element_id = room.element_id, name = %room.name, error = %e, "Room mesh failed, skipping");
                self.diagnostics
                    .push(Diagnostic::new(room, DiagnosticKind::BuildFailed, e.to_string()));
                return Ok(false);
            }
        };

        let json = match properties::project(&room.parameters) {
            Ok(json) => json,
            Err(e @ Error::UnsupportedStorage { .. }) => {
                tracing::warn!(element_id = room.element_id, name = %room.name, error = %e, "Room parameters failed, skipping");
                self.diagnostics.push(Diagnostic::new(
                    room,
                    DiagnosticKind::ProjectionFailed,
                    e.to_string(),
                ));
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        let segment = self
            .buffers
            .append(&result.mesh, self.config.material)
            .map_err(|source| Error::Capacity {
                element_id: room.element_id,
                unique_id: room.unique_id.clone(),
                source,
            })?;

        if result.stats.fallback_sets > 0 {
            tracing::warn!(
                element_id = room.element_id,
                name = %room.name,
                face_sets = result.stats.fallback_sets,
                "Room exported as open mesh"
            );
            self.diagnostics.push(Diagnostic::new(
                room,
                DiagnosticKind::FallbackMesh,
                format!("{} face set(s) are not closed solids", result.stats.fallback_sets),
            ));
        }

        tracing::debug!(
            element_id = room.element_id,
            name = %room.name,
            vertices = segment.vertex_count(),
            triangles = segment.triangle_count(),
            merged = result.stats.points_merged,
            "Exported room"
        );

        self.stats.vertices += segment.vertex_count();
        self.stats.triangles += segment.triangle_count();
        self.stats.points_merged += result.stats.points_merged;
        self.stats.triangles_rejected +=
            result.stats.triangles_collapsed + result.stats.triangles_sliver;

        self.records.push(RoomRecord::new(
            room.element_id,
            &room.unique_id,
            &room.name,
            &segment,
        ));
        self.shapes.push(DisplayShape::new(
            room,
            &result.mesh,
            &self.config.application_id,
            json,
        ));
        Ok(true)
    }

    #[inline]
    pub fn buffers(&self) -> &MeshBuffers {
        &self.buffers
    }

    #[inline]
    pub fn records(&self) -> &[RoomRecord] {
        &self.records
    }

    #[inline]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Encode the buffers and hand everything over.
    pub fn finish(self) -> ExportOutput {
        let encoded = encode(&self.buffers, &self.records);

        tracing::info!(
            rooms = self.stats.rooms_total,
            exported = self.stats.rooms_exported,
            skipped = self.stats.rooms_skipped,
            vertices = self.stats.vertices,
            triangles = self.stats.triangles,
            build_time_ms = self.stats.build_time_ms,
            "Room export complete"
        );

        ExportOutput {
            encoded,
            records: self.records,
            shapes: self.shapes,
            diagnostics: self.diagnostics,
            stats: self.stats,
        }
    }
}

/// Run a whole export in one call.
pub fn export_rooms(rooms: &[Room], config: ExportConfig) -> Result<ExportOutput> {
    let mut session = ExportSession::new(config)?;
    session.process(rooms)?;
    Ok(session.finish())
}
