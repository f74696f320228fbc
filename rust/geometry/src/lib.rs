// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Room Volume Geometry
//!
//! Turns the closed shell of a room into an indexed triangle mesh: faces are
//! triangulated with earcutr, near-duplicate points are merged under a
//! tolerance and each solid is rebuilt as a closed solid or, failing that, a
//! plain mesh.

pub mod builder;
pub mod dedup;
pub mod error;
pub mod mesh;
pub mod shell;
pub mod triangulation;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point2, Point3, Vector3};

pub use builder::{
    build_mesh, BuildFallback, BuildOptions, BuildResult, BuildState, BuildStats, BuildTarget,
    ShellBuilder, StrictFailure,
};
pub use dedup::{CanonicalPoint, PointDeduplicator, VertexId};
pub use error::{Error, Result};
pub use mesh::{FaceSet, MaterialId, Mesh, ShellKind, TriangleFace};
pub use shell::{box_solid, signed_volume, ClosedShell, Face, Solid};
pub use triangulation::{triangulate_face, triangulate_polygon};
