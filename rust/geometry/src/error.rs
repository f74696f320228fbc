// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::builder::StrictFailure;

/// Result type for geometry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rebuilding a room shell
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Triangulation failed: {0}")]
    TriangulationError(String),

    #[error("Degenerate face: outer loop has {0} distinct points, need at least 3")]
    DegenerateFace(usize),

    #[error("Shell has no solid with positive volume")]
    NoPositiveVolume,

    #[error("Face set {0} has no triangles left after clean-up")]
    EmptyFaceSet(usize),

    #[error("Face set {set} is not a closed solid and fallback is disabled: {reason}")]
    StrictBuildAborted { set: usize, reason: StrictFailure },

    #[error("Invalid build options: {0}")]
    InvalidOptions(String),
}
