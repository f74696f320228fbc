// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Length units and millimetre quantization
//!
//! Host geometry arrives in the model's native length unit. The exported
//! buffers hold whole millimetres.

use std::fmt;
use std::str::FromStr;

use room_volume_geometry::Point3;
use serde::{Deserialize, Serialize};

/// Native length unit of the incoming geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthUnit {
    #[default]
    Feet,
    Inches,
    Metres,
    Millimetres,
}

impl LengthUnit {
    /// Millimetres in one unit
    #[inline]
    pub fn millimetres_per_unit(self) -> f64 {
        match self {
            LengthUnit::Feet => 304.8,
            LengthUnit::Inches => 25.4,
            LengthUnit::Metres => 1000.0,
            LengthUnit::Millimetres => 1.0,
        }
    }

    #[inline]
    pub fn to_millimetres(self, value: f64) -> f64 {
        value * self.millimetres_per_unit()
    }

    #[inline]
    pub fn from_millimetres(self, value: f64) -> f64 {
        value / self.millimetres_per_unit()
    }

    /// Point hash decimals giving buckets of 1 to 3 mm, no narrower than
    /// the default merge tolerance.
    #[inline]
    pub fn default_hash_decimals(self) -> u32 {
        match self {
            LengthUnit::Feet => 2,
            LengthUnit::Inches => 1,
            LengthUnit::Metres => 3,
            LengthUnit::Millimetres => 0,
        }
    }

    /// Whole millimetres, rounding half away from zero. `None` when the
    /// value does not fit an `i32` or is not finite.
    pub fn quantize(self, value: f64) -> Option<i32> {
        let mm = self.to_millimetres(value).round();
        if mm.is_finite() && mm >= i32::MIN as f64 && mm <= i32::MAX as f64 {
            Some(mm as i32)
        } else {
            None
        }
    }
}

impl FromStr for LengthUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ft" | "feet" | "foot" => Ok(LengthUnit::Feet),
            "in" | "inch" | "inches" => Ok(LengthUnit::Inches),
            "m" | "metre" | "metres" | "meter" | "meters" => Ok(LengthUnit::Metres),
            "mm" | "millimetre" | "millimetres" | "millimeter" | "millimeters" => {
                Ok(LengthUnit::Millimetres)
            }
            other => Err(format!("unknown length unit '{}'", other)),
        }
    }
}

/// Integer point in millimetres
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct IntPoint3 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl IntPoint3 {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Quantize a native-unit point. `None` if any coordinate overflows.
    pub fn quantize(p: &Point3<f64>, unit: LengthUnit) -> Option<Self> {
        Some(Self {
            x: unit.quantize(p.x)?,
            y: unit.quantize(p.y)?,
            z: unit.quantize(p.z)?,
        })
    }

    pub fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    pub fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }
}

impl fmt::Display for IntPoint3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn feet_round_half_away_from_zero() {
        assert_eq!(LengthUnit::Feet.quantize(1.0), Some(305));
        assert_eq!(LengthUnit::Feet.quantize(-1.0), Some(-305));
        assert_eq!(LengthUnit::Millimetres.quantize(2.5), Some(3));
        assert_eq!(LengthUnit::Millimetres.quantize(-2.5), Some(-3));
        assert_eq!(LengthUnit::Metres.quantize(0.0004), Some(0));
    }

    #[test]
    fn out_of_range_is_none() {
        assert_eq!(LengthUnit::Metres.quantize(3.0e6), None);
        assert_eq!(LengthUnit::Feet.quantize(f64::NAN), None);
        assert_eq!(LengthUnit::Millimetres.quantize(i32::MAX as f64), Some(i32::MAX));
    }

    #[test]
    fn tolerance_conversion() {
        assert_relative_eq!(LengthUnit::Feet.from_millimetres(0.9144), 0.003, epsilon = 1e-12);
    }

    #[test]
    fn default_buckets_cover_default_tolerance() {
        for unit in [
            LengthUnit::Feet,
            LengthUnit::Inches,
            LengthUnit::Metres,
            LengthUnit::Millimetres,
        ] {
            let width = unit.to_millimetres(10f64.powi(-(unit.default_hash_decimals() as i32)));
            assert!(width >= 0.9144 && width <= 3.05, "{:?}: {}", unit, width);
        }
    }

    #[test]
    fn parse_units() {
        assert_eq!("Feet".parse::<LengthUnit>(), Ok(LengthUnit::Feet));
        assert_eq!("mm".parse::<LengthUnit>(), Ok(LengthUnit::Millimetres));
        assert!("furlong".parse::<LengthUnit>().is_err());
    }

    #[test]
    fn point_display_and_bounds() {
        let a = IntPoint3::new(1, -2, 3);
        let b = IntPoint3::new(-1, 5, 0);
        assert_eq!(a.to_string(), "(1,-2,3)");
        assert_eq!(a.min(b), IntPoint3::new(-1, -2, 0));
        assert_eq!(a.max(b), IntPoint3::new(1, 5, 3));
        assert_eq!(
            IntPoint3::quantize(&Point3::new(1.0, 2.0, 0.5), LengthUnit::Feet),
            Some(IntPoint3::new(305, 610, 152))
        );
    }
}
