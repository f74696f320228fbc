// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Export configuration loaded from environment variables.

use room_volume_geometry::builder::{DEFAULT_MIN_ANGLE_DEGREES, DEFAULT_MIN_SOLID_VOLUME};
use room_volume_geometry::{BuildFallback, BuildOptions, BuildTarget, MaterialId};

use crate::error::{Error, Result};
use crate::units::LengthUnit;

/// Default point tolerance: 0.003 ft
pub const DEFAULT_TOLERANCE_MM: f64 = 0.9144;

/// Application id stamped on display shapes when none is configured
pub const DEFAULT_APPLICATION_ID: &str = "room-volume-export";

/// Export configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    /// Length unit of the incoming geometry.
    pub unit: LengthUnit,
    /// Point merge tolerance in millimetres.
    pub tolerance_mm: f64,
    /// Decimal places (in native units) of the point hash key. `None`
    /// picks a bucket width of a few millimetres for `unit`.
    pub hash_decimals: Option<u32>,
    /// Triangles with a smaller angle are rejected.
    pub min_angle_degrees: f64,
    /// Solids at or below this volume, in cubic native units, are skipped.
    pub min_solid_volume: f64,
    pub target: BuildTarget,
    pub fallback: BuildFallback,
    /// Build room meshes on the rayon pool.
    pub parallel: bool,
    pub application_id: String,
    /// Material attached to every exported triangle.
    pub material: Option<MaterialId>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            unit: LengthUnit::Feet,
            tolerance_mm: DEFAULT_TOLERANCE_MM,
            hash_decimals: None,
            min_angle_degrees: DEFAULT_MIN_ANGLE_DEGREES,
            min_solid_volume: DEFAULT_MIN_SOLID_VOLUME,
            target: BuildTarget::Solid,
            fallback: BuildFallback::Mesh,
            parallel: true,
            application_id: DEFAULT_APPLICATION_ID.into(),
            material: None,
        }
    }
}

impl ExportConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup. Unset keys keep their
    /// defaults; unparsable values are logged and replaced by the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            unit: parse_var(&lookup, "ROOM_VOLUME_UNIT", defaults.unit, |s| s.parse().ok()),
            tolerance_mm: parse_var(&lookup, "ROOM_VOLUME_TOLERANCE_MM", defaults.tolerance_mm, |s| {
                s.parse().ok().filter(|v: &f64| v.is_finite() && *v > 0.0)
            }),
            hash_decimals: parse_var(&lookup, "ROOM_VOLUME_HASH_DECIMALS", defaults.hash_decimals, |s| {
                s.parse().ok().filter(|v: &u32| *v <= 12).map(Some)
            }),
            min_angle_degrees: parse_var(
                &lookup,
                "ROOM_VOLUME_MIN_ANGLE_DEG",
                defaults.min_angle_degrees,
                |s| s.parse().ok().filter(|v: &f64| (0.0..60.0).contains(v)),
            ),
            min_solid_volume: defaults.min_solid_volume,
            target: parse_var(&lookup, "ROOM_VOLUME_TARGET", defaults.target, |s| {
                match s.to_ascii_lowercase().as_str() {
                    "solid" => Some(BuildTarget::Solid),
                    "any" | "any_geometry" => Some(BuildTarget::AnyGeometry),
                    "mesh" => Some(BuildTarget::Mesh),
                    _ => None,
                }
            }),
            fallback: parse_var(&lookup, "ROOM_VOLUME_FALLBACK", defaults.fallback, |s| {
                match s.to_ascii_lowercase().as_str() {
                    "mesh" => Some(BuildFallback::Mesh),
                    "abort" => Some(BuildFallback::Abort),
                    _ => None,
                }
            }),
            parallel: parse_var(&lookup, "ROOM_VOLUME_PARALLEL", defaults.parallel, |s| {
                match s.to_ascii_lowercase().as_str() {
                    "1" | "true" | "yes" | "on" => Some(true),
                    "0" | "false" | "no" | "off" => Some(false),
                    _ => None,
                }
            }),
            application_id: lookup("ROOM_VOLUME_APPLICATION_ID")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.application_id),
            material: defaults.material,
        }
    }

    /// Point tolerance in native units
    #[inline]
    pub fn tolerance(&self) -> f64 {
        self.unit.from_millimetres(self.tolerance_mm)
    }

    /// Hash decimals in effect for the configured unit
    #[inline]
    pub fn hash_decimals(&self) -> u32 {
        self.hash_decimals
            .unwrap_or_else(|| self.unit.default_hash_decimals())
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            tolerance: self.tolerance(),
            hash_decimals: self.hash_decimals(),
            min_angle_degrees: self.min_angle_degrees,
            min_solid_volume: self.min_solid_volume,
            target: self.target,
            fallback: self.fallback,
            material: self.material,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.tolerance_mm.is_finite() || self.tolerance_mm <= 0.0 {
            return Err(Error::Config(format!(
                "tolerance must be positive, got {} mm",
                self.tolerance_mm
            )));
        }
        if self.application_id.is_empty() {
            return Err(Error::Config("application id must not be empty".into()));
        }
        self.build_options().validate()?;
        Ok(())
    }
}

fn parse_var<T: std::fmt::Debug>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
    parse: impl FnOnce(&str) -> Option<T>,
) -> T {
    let Some(raw) = lookup(key) else {
        return default;
    };
    match parse(raw.trim()) {
        Some(value) => value,
        None => {
            tracing::warn!(key, value = %raw, default = ?default, "invalid configuration value, using default");
            default
        }
    }
}
