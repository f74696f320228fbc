// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Rooms as handed over by the host, and the display shapes produced for them.

use std::io::Read;

use room_volume_geometry::{ClosedShell, MaterialId, Mesh, ShellKind};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::properties::Parameter;
use crate::units::LengthUnit;

/// A room of the building model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub element_id: i64,
    pub unique_id: String,
    pub name: String,
    #[serde(default)]
    pub shell: ClosedShell,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

/// A model's rooms plus the context they were exported from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomDocument {
    /// Id of the application that created the document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    /// Length unit of all shell coordinates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<LengthUnit>,
    pub rooms: Vec<Room>,
}

impl RoomDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Category the display shapes are filed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShapeCategory {
    #[default]
    GenericModel,
}

/// One face set of a display shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayFaceSet {
    pub kind: ShellKind,
    pub triangles: Vec<[u32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<MaterialId>,
}

/// Display-only shape standing in for a room's volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayShape {
    pub name: String,
    pub category: ShapeCategory,
    /// Application that created the shape
    pub application_id: String,
    /// Unique id of the room the shape represents
    pub application_data_id: String,
    pub element_id: i64,
    /// Vertices in native units
    pub vertices: Vec<[f64; 3]>,
    pub face_sets: Vec<DisplayFaceSet>,
    /// Parameter dictionary as one-line JSON, stored in the comments slot
    pub properties: String,
}

impl DisplayShape {
    pub const NAME_PREFIX: &'static str = "Room volume for ";

    pub fn new(room: &Room, mesh: &Mesh, application_id: &str, properties: String) -> Self {
        Self {
            name: format!("{}{}", Self::NAME_PREFIX, room.name),
            category: ShapeCategory::GenericModel,
            application_id: application_id.to_string(),
            application_data_id: room.unique_id.clone(),
            element_id: room.element_id,
            vertices: mesh.vertices.iter().map(|p| [p.x, p.y, p.z]).collect(),
            face_sets: mesh
                .shells
                .iter()
                .map(|set| DisplayFaceSet {
                    kind: set.kind,
                    triangles: set.triangles.iter().map(|t| t.vertices).collect(),
                    material: set.triangles.first().and_then(|t| t.material),
                })
                .collect(),
            properties,
        }
    }
}
