// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shell to mesh conversion.
//!
//! Each solid of a closed shell with positive volume becomes one face set.
//! Its faces are triangulated, every triangle vertex is canonicalized through
//! a [`PointDeduplicator`] shared by the whole shell, and triangles that
//! collapse or turn into slivers are dropped. Each face set then runs through
//! a small state machine:
//!
//! ```text
//! Unbuilt ──► StrictAttempted ──ok──► Built(Solid)
//!    │              │
//!    │ (Mesh)       └─fail─► FallbackAttempted ──► Built(Mesh) | Failed
//!    └─────────────────────► FallbackAttempted
//! ```
//!
//! The strict attempt requires every undirected edge to be shared by exactly
//! two triangles and makes neighbouring windings agree. Each connected
//! component then faces outward, unless it lies inside another component:
//! cavities face inward so the enclosed volume is outer minus inner. The
//! fallback keeps the accepted triangles exactly as they came in.

use std::collections::VecDeque;

use nalgebra::Point3;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use thiserror::Error as ThisError;

use crate::dedup::{search_radius, PointDeduplicator, VertexId, DEFAULT_HASH_DECIMALS, DEFAULT_TOLERANCE};
use crate::mesh::{FaceSet, MaterialId, Mesh, ShellKind, TriangleFace};
use crate::shell::{signed_volume, ClosedShell};
use crate::triangulation::min_angle_degrees;
use crate::{Error, Result};

/// Triangles with a smaller interior angle are discarded.
pub const DEFAULT_MIN_ANGLE_DEGREES: f64 = 3.0;

/// Solids at or below this volume (cubic native units) are skipped.
pub const DEFAULT_MIN_SOLID_VOLUME: f64 = 1e-9;

/// What a face set should become
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildTarget {
    /// A closed solid; on failure `BuildOptions::fallback` decides
    #[default]
    Solid,
    /// A closed solid if possible, otherwise always a mesh
    AnyGeometry,
    /// A plain mesh, no strict attempt
    Mesh,
}

/// What to do when a face set cannot be closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildFallback {
    #[default]
    Mesh,
    Abort,
}

/// Options for [`build_mesh`]
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
    /// Point comparison tolerance in native units
    pub tolerance: f64,
    /// Decimal places of the deduplication bucket key
    pub hash_decimals: u32,
    pub min_angle_degrees: f64,
    pub min_solid_volume: f64,
    pub target: BuildTarget,
    pub fallback: BuildFallback,
    /// Material attached to every emitted triangle
    pub material: Option<MaterialId>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            hash_decimals: DEFAULT_HASH_DECIMALS,
            min_angle_degrees: DEFAULT_MIN_ANGLE_DEGREES,
            min_solid_volume: DEFAULT_MIN_SOLID_VOLUME,
            target: BuildTarget::default(),
            fallback: BuildFallback::default(),
            material: None,
        }
    }
}

impl BuildOptions {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..60.0).contains(&self.min_angle_degrees) {
            return Err(Error::InvalidOptions(format!(
                "min_angle_degrees must be in [0, 60), got {}",
                self.min_angle_degrees
            )));
        }
        if !self.min_solid_volume.is_finite() || self.min_solid_volume < 0.0 {
            return Err(Error::InvalidOptions(format!(
                "min_solid_volume must be non-negative, got {}",
                self.min_solid_volume
            )));
        }
        let radius = search_radius(self.tolerance, self.hash_decimals)?;
        if radius > 1 {
            tracing::debug!(
                tolerance = self.tolerance,
                hash_decimals = self.hash_decimals,
                radius,
                "point buckets are narrower than the tolerance, widening the neighbour search"
            );
        }
        Ok(())
    }

    /// Whether a strict failure should fall through to the mesh fallback.
    fn falls_back(&self) -> bool {
        match self.target {
            BuildTarget::Solid => self.fallback == BuildFallback::Mesh,
            BuildTarget::AnyGeometry | BuildTarget::Mesh => true,
        }
    }
}

/// Why a face set is not a closed, orientable solid
#[derive(ThisError, Debug, Clone, PartialEq)]
pub enum StrictFailure {
    #[error("no triangles")]
    Empty,

    #[error("edge {a}-{b} is used by a single triangle")]
    OpenEdge { a: VertexId, b: VertexId },

    #[error("edge {a}-{b} is shared by {count} triangles")]
    NonManifoldEdge {
        a: VertexId,
        b: VertexId,
        count: usize,
    },

    #[error("triangle windings cannot be made consistent")]
    NonOrientable,

    #[error("component {component} encloses no volume")]
    ZeroVolume { component: usize },
}

/// State of one face set's build
#[derive(Debug, Clone, PartialEq)]
pub enum BuildState {
    Unbuilt,
    /// `failure` is `None` when the strict attempt succeeded
    StrictAttempted { failure: Option<StrictFailure> },
    FallbackAttempted { succeeded: bool },
    Built(ShellKind),
    Failed(Error),
}

impl BuildState {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, BuildState::Built(_) | BuildState::Failed(_))
    }
}

/// Drives one face set through [`BuildState`].
pub struct ShellBuilder<'a> {
    index: usize,
    triangles: Vec<TriangleFace>,
    positions: &'a [Point3<f64>],
    options: &'a BuildOptions,
    state: BuildState,
}

impl<'a> ShellBuilder<'a> {
    /// `index` identifies the face set in errors. Triangle vertices index
    /// into `positions`.
    pub fn new(
        index: usize,
        triangles: Vec<TriangleFace>,
        positions: &'a [Point3<f64>],
        options: &'a BuildOptions,
    ) -> Self {
        Self {
            index,
            triangles,
            positions,
            options,
            state: BuildState::Unbuilt,
        }
    }

    #[inline]
    pub fn state(&self) -> &BuildState {
        &self.state
    }

    /// Advance one transition. Terminal states stay put.
    pub fn step(&mut self) -> &BuildState {
        let next = match &self.state {
            BuildState::Unbuilt => {
                if self.options.target == BuildTarget::Mesh {
                    BuildState::FallbackAttempted {
                        succeeded: !self.triangles.is_empty(),
                    }
                } else {
                    let failure =
                        close_strict(&mut self.triangles, self.positions, self.options.tolerance)
                            .err();
                    BuildState::StrictAttempted { failure }
                }
            }
            BuildState::StrictAttempted { failure: None } => BuildState::Built(ShellKind::Solid),
            BuildState::StrictAttempted {
                failure: Some(reason),
            } => {
                if self.options.falls_back() {
                    tracing::debug!(set = self.index, %reason, "strict build failed, using mesh");
                    BuildState::FallbackAttempted {
                        succeeded: !self.triangles.is_empty(),
                    }
                } else {
                    BuildState::Failed(Error::StrictBuildAborted {
                        set: self.index,
                        reason: reason.clone(),
                    })
                }
            }
            BuildState::FallbackAttempted { succeeded: true } => BuildState::Built(ShellKind::Mesh),
            BuildState::FallbackAttempted { succeeded: false } => {
                BuildState::Failed(Error::EmptyFaceSet(self.index))
            }
            BuildState::Built(_) | BuildState::Failed(_) => return &self.state,
        };
        self.state = next;
        &self.state
    }

    /// Step until a terminal state and hand back the face set.
    pub fn run(mut self) -> Result<FaceSet> {
        while !self.state.is_terminal() {
            self.step();
        }
        match self.state {
            BuildState::Built(kind) => Ok(FaceSet {
                kind,
                triangles: self.triangles,
            }),
            BuildState::Failed(e) => Err(e),
            _ => Err(Error::EmptyFaceSet(self.index)),
        }
    }
}

/// Check closure, propagate orientation and fix the sign of each
/// component: outer shells face outward, cavities inward. Triangles are
/// only touched on success.
fn close_strict(
    triangles: &mut [TriangleFace],
    positions: &[Point3<f64>],
    tolerance: f64,
) -> std::result::Result<(), StrictFailure> {
    if triangles.is_empty() {
        return Err(StrictFailure::Empty);
    }

    // Undirected edge -> (triangle, runs min->max)
    let mut edges: FxHashMap<(VertexId, VertexId), SmallVec<[(usize, bool); 2]>> =
        FxHashMap::default();
    for (t, tri) in triangles.iter().enumerate() {
        for (a, b) in tri.edges() {
            let key = (a.min(b), a.max(b));
            edges.entry(key).or_default().push((t, a < b));
        }
    }

    for tri in triangles.iter() {
        for (a, b) in tri.edges() {
            let key = (a.min(b), a.max(b));
            match edges[&key].len() {
                2 => {}
                1 => return Err(StrictFailure::OpenEdge { a: key.0, b: key.1 }),
                count => {
                    return Err(StrictFailure::NonManifoldEdge {
                        a: key.0,
                        b: key.1,
                        count,
                    })
                }
            }
        }
    }

    // Breadth-first orientation: a shared edge must run in opposite
    // directions in its two triangles.
    let mut flips: Vec<Option<bool>> = vec![None; triangles.len()];
    let mut components: Vec<Vec<usize>> = Vec::new();
    let mut queue = VecDeque::new();

    for seed in 0..triangles.len() {
        if flips[seed].is_some() {
            continue;
        }
        flips[seed] = Some(false);
        queue.push_back(seed);
        let mut component = Vec::new();

        while let Some(t) = queue.pop_front() {
            component.push(t);
            let flipped = flips[t].unwrap_or(false);
            for (a, b) in triangles[t].edges() {
                let key = (a.min(b), a.max(b));
                let forward = (a < b) != flipped;
                for &(n, n_forward) in &edges[&key] {
                    if n == t {
                        continue;
                    }
                    let required = n_forward == forward;
                    match flips[n] {
                        Some(existing) if existing != required => {
                            return Err(StrictFailure::NonOrientable)
                        }
                        Some(_) => {}
                        None => {
                            flips[n] = Some(required);
                            queue.push_back(n);
                        }
                    }
                }
            }
        }
        components.push(component);
    }

    // Oriented copy of each component's triangles
    let oriented: Vec<Vec<[Point3<f64>; 3]>> = components
        .iter()
        .map(|component| {
            component
                .iter()
                .map(|&t| {
                    let [a, b, c] = triangles[t].vertices.map(|v| positions[v as usize]);
                    if flips[t] == Some(true) {
                        [a, c, b]
                    } else {
                        [a, b, c]
                    }
                })
                .collect()
        })
        .collect();

    let min_volume = tolerance.powi(3);
    let volumes: Vec<f64> = oriented.iter().map(|tris| signed_volume(tris)).collect();
    if let Some(index) = volumes.iter().position(|v| v.abs() <= min_volume) {
        return Err(StrictFailure::ZeroVolume { component: index });
    }

    // A component nested inside an odd number of others bounds a cavity
    // and must face inward; all others face outward.
    let vertex_sets: Vec<FxHashSet<VertexId>> = components
        .iter()
        .map(|component| {
            component
                .iter()
                .flat_map(|&t| triangles[t].vertices)
                .collect()
        })
        .collect();

    let mut invert = vec![false; triangles.len()];
    for (i, component) in components.iter().enumerate() {
        let depth = (0..components.len())
            .filter(|&j| j != i)
            .filter(|&j| {
                vertex_sets[i]
                    .iter()
                    .find(|v| !vertex_sets[j].contains(*v))
                    .is_some_and(|&v| winding_number(&oriented[j], &positions[v as usize]).abs() > 0.5)
            })
            .count();
        let cavity = depth % 2 == 1;

        if (volumes[i] < 0.0) != cavity {
            tracing::debug!(component = i, volume = volumes[i], cavity, "reorienting component");
            for &t in component {
                invert[t] = true;
            }
        }
    }

    for (t, tri) in triangles.iter_mut().enumerate() {
        if flips[t].unwrap_or(false) != invert[t] {
            tri.flip();
        }
    }
    Ok(())
}

/// Generalized winding number of a closed triangle set around `p`: about
/// ±1 inside, 0 outside.
fn winding_number(triangles: &[[Point3<f64>; 3]], p: &Point3<f64>) -> f64 {
    let total: f64 = triangles
        .iter()
        .map(|[a, b, c]| {
            let (a, b, c) = (a - p, b - p, c - p);
            let (la, lb, lc) = (a.norm(), b.norm(), c.norm());
            let numerator = a.dot(&b.cross(&c));
            let denominator = la * lb * lc + a.dot(&b) * lc + b.dot(&c) * la + c.dot(&a) * lb;
            2.0 * numerator.atan2(denominator)
        })
        .sum();
    total / (4.0 * std::f64::consts::PI)
}

/// Counters collected while building a mesh
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub solids_skipped: usize,
    pub faces_degenerate: usize,
    pub triangles_accepted: usize,
    pub triangles_collapsed: usize,
    pub triangles_sliver: usize,
    pub points_merged: usize,
    pub fallback_sets: usize,
}

/// Mesh of one room plus what happened on the way
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub mesh: Mesh,
    pub stats: BuildStats,
}

/// Build a triangle mesh from a room's closed shell.
///
/// Fails when no solid has positive volume, or when any face set ends in
/// [`BuildState::Failed`]; in both cases nothing partial is returned.
pub fn build_mesh(shell: &ClosedShell, options: &BuildOptions) -> Result<BuildResult> {
    options.validate()?;
    let mut dedup = PointDeduplicator::new(options.tolerance, options.hash_decimals)?;
    let mut stats = BuildStats::default();
    let mut sets: Vec<Vec<TriangleFace>> = Vec::new();

    for (index, solid) in shell.solids.iter().enumerate() {
        let triangulated = solid.triangulate(options.tolerance)?;
        stats.faces_degenerate += triangulated.degenerate_faces;

        if !(triangulated.volume > options.min_solid_volume) {
            tracing::debug!(solid = index, volume = triangulated.volume, "skipping solid");
            stats.solids_skipped += 1;
            continue;
        }

        let mut accepted = Vec::with_capacity(triangulated.triangles.len());
        for [a, b, c] in triangulated.triangles {
            let ids = [
                dedup.canonicalize(a),
                dedup.canonicalize(b),
                dedup.canonicalize(c),
            ];
            if ids[0] == ids[1] || ids[1] == ids[2] || ids[0] == ids[2] {
                stats.triangles_collapsed += 1;
                continue;
            }
            let [pa, pb, pc] = ids.map(|id| dedup.point(id).point);
            if min_angle_degrees(&pa, &pb, &pc) < options.min_angle_degrees {
                stats.triangles_sliver += 1;
                continue;
            }
            accepted.push(TriangleFace::new(ids, options.material));
        }
        stats.triangles_accepted += accepted.len();
        sets.push(accepted);
    }

    if sets.is_empty() {
        return Err(Error::NoPositiveVolume);
    }
    stats.points_merged = dedup.merged_count();

    let positions: Vec<Point3<f64>> = dedup.points().iter().map(|c| c.point).collect();
    let mut shells = Vec::with_capacity(sets.len());
    for (index, triangles) in sets.into_iter().enumerate() {
        let set = ShellBuilder::new(index, triangles, &positions, options).run()?;
        if set.kind == ShellKind::Mesh && options.target != BuildTarget::Mesh {
            stats.fallback_sets += 1;
        }
        shells.push(set);
    }

    let mesh = compact(&positions, shells);
    tracing::debug!(
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        merged = stats.points_merged,
        slivers = stats.triangles_sliver,
        "built room mesh"
    );
    Ok(BuildResult { mesh, stats })
}

/// Keep only referenced vertices, numbered in first-use order.
fn compact(positions: &[Point3<f64>], mut shells: Vec<FaceSet>) -> Mesh {
    let mut remap: Vec<Option<VertexId>> = vec![None; positions.len()];
    let mut vertices = Vec::new();

    for set in &mut shells {
        for tri in &mut set.triangles {
            for v in &mut tri.vertices {
                let old = *v as usize;
                *v = *remap[old].get_or_insert_with(|| {
                    vertices.push(positions[old]);
                    (vertices.len() - 1) as VertexId
                });
            }
        }
    }

    Mesh { vertices, shells }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{box_solid, Face, Solid};
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64, z: f64) -> Point3<f64> {
        Point3::new(x, y, z)
    }

    fn unit_box() -> Solid {
        box_solid(p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0))
    }

    /// Every undirected edge used twice and every directed edge once.
    fn assert_closed_and_consistent(set: &FaceSet) {
        let mut undirected: FxHashMap<(u32, u32), usize> = FxHashMap::default();
        let mut directed: FxHashMap<(u32, u32), usize> = FxHashMap::default();
        for t in &set.triangles {
            for (a, b) in t.edges() {
                *undirected.entry((a.min(b), a.max(b))).or_default() += 1;
                *directed.entry((a, b)).or_default() += 1;
            }
        }
        assert!(undirected.values().all(|&n| n == 2));
        assert!(directed.values().all(|&n| n == 1));
    }

    #[test]
    fn cuboid_with_near_duplicates_closes() {
        // Twelve triangle faces; two corner occurrences are nudged within tolerance
        let c = [
            p(0.0, 0.0, 0.0),
            p(2.0, 0.0, 0.0),
            p(2.0, 3.0, 0.0),
            p(0.0, 3.0, 0.0),
            p(0.0, 0.0, 1.0),
            p(2.0, 0.0, 1.0),
            p(2.0, 3.0, 1.0),
            p(0.0, 3.0, 1.0),
        ];
        let tris: [[usize; 3]; 12] = [
            [0, 3, 2],
            [0, 2, 1],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [3, 7, 6],
            [3, 6, 2],
            [0, 4, 7],
            [0, 7, 3],
            [1, 2, 6],
            [1, 6, 5],
        ];
        let mut faces: Vec<Face> = tris
            .iter()
            .map(|t| Face::from_points(&[c[t[0]], c[t[1]], c[t[2]]]))
            .collect();
        faces[5].loops[0][2][0] += 0.0004;
        faces[11].loops[0][1][1] -= 0.0007;

        let result = build_mesh(&ClosedShell::new(vec![Solid::new(faces)]), &BuildOptions::default()).unwrap();

        assert_eq!(result.mesh.vertex_count(), 8);
        assert_eq!(result.mesh.triangle_count(), 12);
        assert_eq!(result.stats.points_merged, 36 - 8);
        assert_eq!(result.mesh.shells.len(), 1);
        assert_eq!(result.mesh.shells[0].kind, ShellKind::Solid);
        assert_closed_and_consistent(&result.mesh.shells[0]);
        assert_relative_eq!(result.mesh.signed_volume(), 6.0, epsilon = 1e-2);
    }

    #[test]
    fn every_index_refers_to_an_emitted_vertex() {
        let shell = ClosedShell::new(vec![
            unit_box(),
            box_solid(p(3.0, 0.0, 0.0), p(4.0, 2.0, 1.0)),
        ]);
        let mesh = build_mesh(&shell, &BuildOptions::default()).unwrap().mesh;

        assert_eq!(mesh.shells.len(), 2);
        assert_eq!(mesh.vertex_count(), 16);
        assert!(mesh
            .triangles()
            .all(|t| t.vertices.iter().all(|&v| (v as usize) < mesh.vertex_count())));
        // First-use numbering
        assert_eq!(mesh.shells[0].triangles[0].vertices[0], 0);
    }

    #[test]
    fn reversed_face_is_reoriented() {
        let mut solid = unit_box();
        solid.faces[2].loops[0].reverse();
        let result = build_mesh(&ClosedShell::new(vec![solid]), &BuildOptions::default()).unwrap();

        assert_eq!(result.mesh.shells[0].kind, ShellKind::Solid);
        assert_closed_and_consistent(&result.mesh.shells[0]);
        assert_relative_eq!(result.mesh.signed_volume(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn inward_shell_with_host_volume_is_turned_outward() {
        let mut solid = unit_box();
        for face in &mut solid.faces {
            face.loops[0].reverse();
        }
        solid.volume = Some(1.0);
        let result = build_mesh(&ClosedShell::new(vec![solid]), &BuildOptions::default()).unwrap();

        assert_eq!(result.mesh.shells[0].kind, ShellKind::Solid);
        assert_relative_eq!(result.mesh.signed_volume(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn inward_shell_without_host_volume_is_skipped() {
        let mut solid = unit_box();
        for face in &mut solid.faces {
            face.loops[0].reverse();
        }
        let err = build_mesh(&ClosedShell::new(vec![solid]), &BuildOptions::default()).unwrap_err();
        assert_eq!(err, Error::NoPositiveVolume);
    }

    fn reversed(mut solid: Solid) -> Solid {
        for face in &mut solid.faces {
            face.loops[0].reverse();
        }
        solid
    }

    fn solid_of(parts: Vec<Solid>) -> Solid {
        Solid::new(parts.into_iter().flat_map(|s| s.faces).collect())
    }

    #[test]
    fn cavity_faces_inward() {
        let outer = box_solid(p(0.0, 0.0, 0.0), p(4.0, 4.0, 4.0));
        let inner = box_solid(p(1.0, 1.0, 1.0), p(2.0, 2.0, 2.0));

        // Cavity given inward, as the host reports it, and given outward
        for cavity in [reversed(inner.clone()), inner] {
            let shell = ClosedShell::new(vec![solid_of(vec![outer.clone(), cavity])]);
            let result = build_mesh(&shell, &BuildOptions::default()).unwrap();

            assert_eq!(result.mesh.shells.len(), 1);
            assert_eq!(result.mesh.shells[0].kind, ShellKind::Solid);
            assert_closed_and_consistent(&result.mesh.shells[0]);
            assert_relative_eq!(result.mesh.signed_volume(), 63.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn separate_components_all_face_outward() {
        let big = box_solid(p(0.0, 0.0, 0.0), p(2.0, 2.0, 2.0));
        let small = reversed(box_solid(p(5.0, 0.0, 0.0), p(6.0, 1.0, 1.0)));
        let shell = ClosedShell::new(vec![solid_of(vec![big, small])]);

        let result = build_mesh(&shell, &BuildOptions::default()).unwrap();
        assert_eq!(result.mesh.shells[0].kind, ShellKind::Solid);
        assert_relative_eq!(result.mesh.signed_volume(), 9.0, epsilon = 1e-9);
    }

    #[test]
    fn zero_volume_solids_are_skipped() {
        let mut flat = unit_box();
        flat.volume = Some(0.0);
        let err = build_mesh(&ClosedShell::new(vec![flat.clone()]), &BuildOptions::default()).unwrap_err();
        assert_eq!(err, Error::NoPositiveVolume);

        let result = build_mesh(
            &ClosedShell::new(vec![flat, box_solid(p(5.0, 5.0, 5.0), p(6.0, 6.0, 6.0))]),
            &BuildOptions::default(),
        )
        .unwrap();
        assert_eq!(result.stats.solids_skipped, 1);
        assert_eq!(result.mesh.shells.len(), 1);
    }

    #[test]
    fn open_shell_falls_back_to_mesh() {
        let mut solid = unit_box();
        solid.faces.remove(1);
        solid.volume = Some(1.0);
        let result = build_mesh(&ClosedShell::new(vec![solid]), &BuildOptions::default()).unwrap();

        assert_eq!(result.mesh.shells[0].kind, ShellKind::Mesh);
        assert_eq!(result.mesh.triangle_count(), result.stats.triangles_accepted);
        assert_eq!(result.mesh.triangle_count(), 10);
        assert_eq!(result.stats.fallback_sets, 1);
    }

    #[test]
    fn open_shell_with_abort_fails() {
        let mut solid = unit_box();
        solid.faces.remove(1);
        solid.volume = Some(1.0);
        let options = BuildOptions {
            fallback: BuildFallback::Abort,
            ..Default::default()
        };
        let err = build_mesh(&ClosedShell::new(vec![solid.clone()]), &options).unwrap_err();
        assert!(matches!(
            err,
            Error::StrictBuildAborted {
                set: 0,
                reason: StrictFailure::OpenEdge { .. }
            }
        ));

        // AnyGeometry ignores the abort setting
        let options = BuildOptions {
            target: BuildTarget::AnyGeometry,
            ..options
        };
        let result = build_mesh(&ClosedShell::new(vec![solid]), &options).unwrap();
        assert_eq!(result.mesh.shells[0].kind, ShellKind::Mesh);
    }

    #[test]
    fn mesh_target_skips_strict_attempt() {
        let options = BuildOptions {
            target: BuildTarget::Mesh,
            ..Default::default()
        };
        let result = build_mesh(&ClosedShell::new(vec![unit_box()]), &options).unwrap();
        assert_eq!(result.mesh.shells[0].kind, ShellKind::Mesh);
        assert_eq!(result.stats.fallback_sets, 0);
    }

    #[test]
    fn collapsed_and_sliver_triangles_are_dropped() {
        let faces = vec![
            Face::from_points(&[p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0)]),
            // Both x-axis points snap to the origin
            Face::from_points(&[p(0.0025, 0.0, 0.0), p(-0.0025, 0.0, 0.0), p(0.0, 0.0, 1.0)]),
            // About 0.6 degrees at the apex
            Face::from_points(&[p(0.0, 0.0, 2.0), p(10.0, 0.0, 2.0), p(10.0, 0.1, 2.0)]),
        ];
        let mut solid = Solid::new(faces);
        solid.volume = Some(1.0);
        let result = build_mesh(&ClosedShell::new(vec![solid]), &BuildOptions::default()).unwrap();

        assert_eq!(result.stats.triangles_collapsed, 1);
        assert_eq!(result.stats.triangles_sliver, 1);
        assert_eq!(result.mesh.triangle_count(), 1);
        assert_eq!(result.mesh.vertex_count(), 3);
    }

    #[test]
    fn material_is_attached_to_triangles() {
        let options = BuildOptions {
            material: Some(MaterialId(42)),
            ..Default::default()
        };
        let mesh = build_mesh(&ClosedShell::new(vec![unit_box()]), &options).unwrap().mesh;
        assert!(mesh.triangles().all(|t| t.material == Some(MaterialId(42))));
    }

    #[test]
    fn build_is_deterministic() {
        let shell = ClosedShell::new(vec![
            unit_box(),
            box_solid(p(0.5, 0.5, 1.0), p(1.5, 1.5, 2.0)),
        ]);
        let a = build_mesh(&shell, &BuildOptions::default()).unwrap();
        let b = build_mesh(&shell, &BuildOptions::default()).unwrap();
        assert_eq!(a.mesh, b.mesh);
        assert_eq!(a.stats, b.stats);
    }

    #[test]
    fn state_machine_transitions() {
        let positions = [p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0), p(0.0, 0.0, 1.0)];
        let tetra: Vec<TriangleFace> = [[0, 2, 1], [0, 1, 3], [1, 2, 3], [0, 3, 2]]
            .into_iter()
            .map(|v| TriangleFace::new(v, None))
            .collect();
        let options = BuildOptions::default();

        let mut closed = ShellBuilder::new(0, tetra.clone(), &positions, &options);
        assert_eq!(closed.state(), &BuildState::Unbuilt);
        assert_eq!(closed.step(), &BuildState::StrictAttempted { failure: None });
        assert_eq!(closed.step(), &BuildState::Built(ShellKind::Solid));
        assert!(closed.state().is_terminal());
        assert_eq!(closed.step(), &BuildState::Built(ShellKind::Solid));

        let mut open = ShellBuilder::new(0, tetra[..3].to_vec(), &positions, &options);
        assert!(matches!(
            open.step(),
            BuildState::StrictAttempted {
                failure: Some(StrictFailure::OpenEdge { .. })
            }
        ));
        assert_eq!(open.step(), &BuildState::FallbackAttempted { succeeded: true });
        assert_eq!(open.step(), &BuildState::Built(ShellKind::Mesh));

        let mut empty = ShellBuilder::new(3, Vec::new(), &positions, &options);
        assert_eq!(
            empty.step(),
            &BuildState::StrictAttempted {
                failure: Some(StrictFailure::Empty)
            }
        );
        assert_eq!(empty.step(), &BuildState::FallbackAttempted { succeeded: false });
        assert!(!empty.state().is_terminal());
        assert_eq!(empty.step(), &BuildState::Failed(Error::EmptyFaceSet(3)));
        assert!(empty.state().is_terminal());
    }

    #[test]
    fn non_manifold_edge_is_reported() {
        let positions = [
            p(0.0, 0.0, 0.0),
            p(1.0, 0.0, 0.0),
            p(0.0, 1.0, 0.0),
            p(0.0, -1.0, 0.0),
            p(0.0, 0.0, 1.0),
        ];
        let fan: Vec<TriangleFace> = [[0, 1, 2], [1, 0, 3], [0, 1, 4]]
            .into_iter()
            .map(|v| TriangleFace::new(v, None))
            .collect();
        let options = BuildOptions::default();
        let mut builder = ShellBuilder::new(0, fan, &positions, &options);
        assert_eq!(
            builder.step(),
            &BuildState::StrictAttempted {
                failure: Some(StrictFailure::NonManifoldEdge { a: 0, b: 1, count: 3 })
            }
        );
    }

    #[test]
    fn rejects_bad_options() {
        let options = BuildOptions {
            min_angle_degrees: 75.0,
            ..Default::default()
        };
        assert!(matches!(
            build_mesh(&ClosedShell::new(vec![unit_box()]), &options),
            Err(Error::InvalidOptions(_))
        ));

        // Millimetre tolerance on hundredth buckets would scan 92 buckets a side
        let options = BuildOptions {
            tolerance: 0.9144,
            hash_decimals: 2,
            ..Default::default()
        };
        assert!(matches!(options.validate(), Err(Error::InvalidOptions(_))));
    }

    #[test]
    fn millimetre_cuboid_merges_nudged_corners() {
        let mut solid = box_solid(p(0.0, 0.0, 0.0), p(1200.0, 900.0, 750.0));
        solid.faces[2].loops[0][1][0] += 0.5;
        solid.faces[5].loops[0][2][2] -= 0.5;
        let options = BuildOptions {
            tolerance: 0.9144,
            hash_decimals: 0,
            ..Default::default()
        };

        let result = build_mesh(&ClosedShell::new(vec![solid]), &options).unwrap();
        assert_eq!(result.mesh.vertex_count(), 8);
        assert_eq!(result.stats.fallback_sets, 0);
        assert_eq!(result.mesh.shells[0].kind, ShellKind::Solid);
        assert_closed_and_consistent(&result.mesh.shells[0]);
    }
}
