// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::buffers::BufferError;

/// Result type for export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while exporting rooms
#[derive(Error, Debug)]
pub enum Error {
    #[error("Parameter '{parameter}' has no supported storage type")]
    UnsupportedStorage { parameter: String },

    #[error("Room {element_id} ({unique_id}) does not fit the export buffers: {source}")]
    Capacity {
        element_id: i64,
        unique_id: String,
        #[source]
        source: BufferError,
    },

    #[error("Geometry error: {0}")]
    Geometry(#[from] room_volume_geometry::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
