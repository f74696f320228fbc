// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Room Volume Export
//!
//! Accumulates room meshes into shared millimetre/`u16` buffers, encodes them
//! as a compact binary blob with a text manifest, and projects room
//! parameters into a JSON dictionary for the display shape of each room.
//!
//! ```no_run
//! use room_volume_export::{export_rooms, ExportConfig, RoomDocument};
//!
//! let doc = RoomDocument::from_json(&std::fs::read_to_string("model.json")?)?;
//! let output = export_rooms(&doc.rooms, ExportConfig::from_env())?;
//! output.write_to(std::path::Path::new("out"))?;
//! # Ok::<(), room_volume_export::Error>(())
//! ```

pub mod buffers;
pub mod config;
pub mod encoder;
pub mod error;
pub mod properties;
pub mod room;
pub mod session;
pub mod units;

pub use buffers::{BufferError, MeshBuffers, Segment};
pub use config::ExportConfig;
pub use encoder::{encode, BlobLayout, EncodedExport, RoomRecord};
pub use error::{Error, Result};
pub use properties::{project, Parameter, ParameterValue};
pub use room::{DisplayFaceSet, DisplayShape, Room, RoomDocument, ShapeCategory};
pub use session::{export_rooms, Diagnostic, DiagnosticKind, ExportOutput, ExportSession, ExportStats};
pub use units::{IntPoint3, LengthUnit};
