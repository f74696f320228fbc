// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tolerance-based point canonicalization.
//!
//! Points are bucketed by their coordinates rounded to a fixed number of
//! decimal places. A lookup visits every bucket within `ceil(tolerance /
//! width)` steps on each axis (the 26 direct neighbours when the buckets are
//! at least as wide as the tolerance), confirms candidates with an exact
//! distance test and returns the earliest inserted match. The first point to
//! arrive in a cluster stays its representative for the rest of the pass.
//!
//! Equality under a tolerance is not transitive: `a ~ b` and `b ~ c` do not
//! imply `a ~ c`, so a chain of near-duplicates can drift. This is accepted.

use nalgebra::Point3;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::{Error, Result};

/// Default comparison tolerance in feet: 0.003 ft is roughly 0.9 mm.
pub const DEFAULT_TOLERANCE: f64 = 0.003;

/// Default number of decimal places used for the bucket key.
pub const DEFAULT_HASH_DECIMALS: u32 = 2;

/// Widest neighbourhood, in buckets per direction, a lookup may scan.
pub const MAX_SEARCH_RADIUS: i64 = 4;

/// Buckets to scan in each direction so that every point within
/// `tolerance` is found, given buckets `10^-hash_decimals` wide.
pub fn search_radius(tolerance: f64, hash_decimals: u32) -> Result<i64> {
    if !tolerance.is_finite() || tolerance <= 0.0 {
        return Err(Error::InvalidOptions(format!(
            "tolerance must be positive, got {}",
            tolerance
        )));
    }
    if hash_decimals > 12 {
        return Err(Error::InvalidOptions(format!(
            "hash_decimals must be at most 12, got {}",
            hash_decimals
        )));
    }

    let radius = ((tolerance * 10f64.powi(hash_decimals as i32)).ceil() as i64).max(1);
    if radius > MAX_SEARCH_RADIUS {
        return Err(Error::InvalidOptions(format!(
            "hash buckets of 1e-{} are too narrow for tolerance {}, use fewer decimals",
            hash_decimals, tolerance
        )));
    }
    Ok(radius)
}

/// Index of a canonical point in the order it was first inserted.
pub type VertexId = u32;

/// A representative point and how many submitted points collapsed onto it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanonicalPoint {
    pub point: Point3<f64>,
    /// 1 on insertion, incremented for every merged duplicate.
    pub occurrences: u32,
}

type BucketKey = (i64, i64, i64);

/// Canonicalizes near-duplicate points within one mesh-building pass.
#[derive(Debug)]
pub struct PointDeduplicator {
    tolerance: f64,
    scale: f64,
    radius: i64,
    buckets: FxHashMap<BucketKey, SmallVec<[VertexId; 2]>>,
    points: Vec<CanonicalPoint>,
    merged: usize,
}

impl PointDeduplicator {
    /// Creates a deduplicator comparing with `tolerance` and bucketing by
    /// coordinates rounded to `hash_decimals` decimal places.
    pub fn new(tolerance: f64, hash_decimals: u32) -> Result<Self> {
        let radius = search_radius(tolerance, hash_decimals)?;
        let scale = 10f64.powi(hash_decimals as i32);

        Ok(Self {
            tolerance,
            scale,
            radius,
            buckets: FxHashMap::default(),
            points: Vec::new(),
            merged: 0,
        })
    }

    /// Returns the canonical vertex for `p`, inserting `p` as a new
    /// representative when no earlier point lies within tolerance.
    pub fn canonicalize(&mut self, p: Point3<f64>) -> VertexId {
        let key = self.bucket_key(&p);

        if let Some(existing) = self.find_near(key, &p) {
            let canonical = &mut self.points[existing as usize];
            canonical.occurrences += 1;
            self.merged += 1;
            tracing::trace!(
                x = p.x,
                y = p.y,
                z = p.z,
                distance = (canonical.point - p).norm(),
                canonical = existing,
                "merged near-duplicate vertex"
            );
            return existing;
        }

        let id = self.points.len() as VertexId;
        self.points.push(CanonicalPoint {
            point: p,
            occurrences: 1,
        });
        self.buckets.entry(key).or_default().push(id);
        id
    }

    /// Canonical point for a vertex id returned by [`Self::canonicalize`].
    #[inline]
    pub fn point(&self, id: VertexId) -> &CanonicalPoint {
        &self.points[id as usize]
    }

    /// All canonical points in insertion order.
    #[inline]
    pub fn points(&self) -> &[CanonicalPoint] {
        &self.points
    }

    /// Number of distinct canonical points.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of submitted points that were merged onto an earlier one.
    #[inline]
    pub fn merged_count(&self) -> usize {
        self.merged
    }

    #[inline]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    fn find_near(&self, (kx, ky, kz): BucketKey, p: &Point3<f64>) -> Option<VertexId> {
        let tol_sq = self.tolerance * self.tolerance;
        let mut best: Option<VertexId> = None;

        let r = self.radius;
        for dx in -r..=r {
            for dy in -r..=r {
                for dz in -r..=r {
                    let Some(ids) = self.buckets.get(&(kx + dx, ky + dy, kz + dz)) else {
                        continue;
                    };
                    for &id in ids {
                        let q = &self.points[id as usize].point;
                        let dist_sq = (q - p).norm_squared();
                        // Strict: points exactly at the tolerance stay distinct
                        if dist_sq < tol_sq && best.map_or(true, |b| id < b) {
                            best = Some(id);
                        }
                    }
                }
            }
        }

        best
    }

    #[inline]
    fn bucket_key(&self, p: &Point3<f64>) -> BucketKey {
        (
            (p.x * self.scale).round() as i64,
            (p.y * self.scale).round() as i64,
            (p.z * self.scale).round() as i64,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dedup() -> PointDeduplicator {
        PointDeduplicator::new(DEFAULT_TOLERANCE, DEFAULT_HASH_DECIMALS).unwrap()
    }

    #[test]
    fn near_duplicate_maps_to_first_inserted() {
        let mut d = dedup();
        let a = d.canonicalize(Point3::new(1.0, 2.0, 3.0));
        let b = d.canonicalize(Point3::new(1.001, 2.0, 3.0));

        assert_eq!(a, b);
        assert_eq!(d.len(), 1);
        assert_eq!(d.point(a).point, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(d.point(a).occurrences, 2);
        assert_eq!(d.merged_count(), 1);
    }

    #[test]
    fn distant_points_stay_distinct() {
        let mut d = dedup();
        let a = d.canonicalize(Point3::new(0.0, 0.0, 0.0));
        let b = d.canonicalize(Point3::new(0.01, 0.0, 0.0));
        assert_ne!(a, b);
        assert_eq!(d.len(), 2);
    }

    #[test]
    fn neighbouring_bucket_is_searched() {
        // 0.0049 and 0.0051 round into different 0.01 buckets
        let mut d = dedup();
        let a = d.canonicalize(Point3::new(0.0049, 0.0, 0.0));
        let b = d.canonicalize(Point3::new(0.0051, 0.0, 0.0));
        assert_eq!(a, b);
    }

    #[test]
    fn first_write_wins_over_nearest() {
        let mut d = dedup();
        let first = d.canonicalize(Point3::new(0.0, 0.0, 0.0));
        let second = d.canonicalize(Point3::new(0.005, 0.0, 0.0));
        assert_ne!(first, second);

        // Closer to `second` but still within tolerance of `first`
        let third = d.canonicalize(Point3::new(0.0029, 0.0, 0.0));
        assert_eq!(third, first);
    }

    #[test]
    fn chain_of_near_duplicates_is_not_transitive() {
        let mut d = dedup();
        let a = d.canonicalize(Point3::new(0.0, 0.0, 0.0));
        let b = d.canonicalize(Point3::new(0.002, 0.0, 0.0));
        assert_eq!(a, b);
        // Within tolerance of the submitted 0.002 but not of the canonical 0.0
        let c = d.canonicalize(Point3::new(0.004, 0.0, 0.0));
        assert_ne!(a, c);
    }

    #[test]
    fn exactly_at_tolerance_is_distinct_and_repeatable() {
        for _ in 0..3 {
            let mut d = PointDeduplicator::new(0.5, 0).unwrap();
            let a = d.canonicalize(Point3::new(0.0, 0.0, 0.0));
            let b = d.canonicalize(Point3::new(0.5, 0.0, 0.0));
            assert_ne!(a, b);
            assert_eq!(d.len(), 2);
        }
    }

    #[test]
    fn narrow_buckets_widen_the_search() {
        // Bucket width 0.001 against tolerance 0.003: the pair sits three
        // buckets apart and is still merged.
        let mut d = PointDeduplicator::new(DEFAULT_TOLERANCE, 3).unwrap();
        let a = d.canonicalize(Point3::new(0.0, 0.0, 0.0));
        let b = d.canonicalize(Point3::new(0.0029, 0.0, 0.0));
        let c = d.canonicalize(Point3::new(0.0031, 0.0, 0.0));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn millimetre_tolerance_with_hundredth_buckets() {
        // 0.9144 mm tolerance on 0.01 mm buckets needs 92 buckets per side
        assert!(PointDeduplicator::new(0.9144, 2).is_err());

        let mut d = PointDeduplicator::new(0.9144, 0).unwrap();
        let a = d.canonicalize(Point3::new(1000.0, 0.0, 0.0));
        let b = d.canonicalize(Point3::new(1000.5, 0.4, 0.0));
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_invalid_tolerance() {
        assert!(PointDeduplicator::new(0.0, 2).is_err());
        assert!(PointDeduplicator::new(f64::NAN, 2).is_err());
        assert!(PointDeduplicator::new(0.1, 20).is_err());
    }
}
