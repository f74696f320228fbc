// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Room parameters as a flat JSON dictionary
//!
//! Each parameter becomes a key `"{name}({tag})"`, the tag naming its
//! storage: `r` real, `n` integer, `s` string, `e` element reference. Two
//! parameters landing on the same key with different values are kept
//! side by side, joined with `" | "`. Keys come out in ascending byte order,
//! so the text only depends on the set of parameters.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Separator between distinct values sharing a key
pub const COLLISION_SEPARATOR: &str = " | ";

/// Storage of a host parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Real(f64),
    Integer(i64),
    /// `None` when the host has no string set
    String(Option<String>),
    ElementId(i64),
    /// Parameter without usable storage
    None,
}

impl ParameterValue {
    /// One-letter storage tag used in keys
    pub fn tag(&self) -> Option<char> {
        match self {
            ParameterValue::Real(_) => Some('r'),
            ParameterValue::Integer(_) => Some('n'),
            ParameterValue::String(_) => Some('s'),
            ParameterValue::ElementId(_) => Some('e'),
            ParameterValue::None => None,
        }
    }

    pub fn format(&self) -> Option<String> {
        match self {
            ParameterValue::Real(v) => Some(format_real(*v)),
            ParameterValue::Integer(v) | ParameterValue::ElementId(v) => Some(v.to_string()),
            ParameterValue::String(s) => Some(s.clone().unwrap_or_default()),
            ParameterValue::None => None,
        }
    }
}

/// A named host parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawParameter", into = "RawParameter")]
pub struct Parameter {
    pub name: String,
    pub value: ParameterValue,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: ParameterValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn key(&self) -> Result<String> {
        let tag = self.value.tag().ok_or_else(|| self.unsupported())?;
        Ok(format!("{}({})", self.name, tag))
    }

    pub fn formatted_value(&self) -> Result<String> {
        self.value.format().ok_or_else(|| self.unsupported())
    }

    fn unsupported(&self) -> Error {
        Error::UnsupportedStorage {
            parameter: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum StorageKind {
    Real,
    Integer,
    String,
    ElementId,
    None,
}

/// Wire shape: `{"name": .., "kind": .., "value": ..}`
#[derive(Serialize, Deserialize)]
struct RawParameter {
    name: String,
    kind: StorageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<serde_json::Value>,
}

impl TryFrom<RawParameter> for Parameter {
    type Error = String;

    fn try_from(raw: RawParameter) -> std::result::Result<Self, Self::Error> {
        let mismatch = |expected: &str| {
            format!(
                "parameter '{}': expected {} value, got {:?}",
                raw.name, expected, raw.value
            )
        };
        let value = match raw.kind {
            StorageKind::Real => ParameterValue::Real(
                raw.value
                    .as_ref()
                    .and_then(|v| v.as_f64())
                    .ok_or_else(|| mismatch("a number"))?,
            ),
            StorageKind::Integer => ParameterValue::Integer(
                raw.value
                    .as_ref()
                    .and_then(|v| v.as_i64())
                    .ok_or_else(|| mismatch("an integer"))?,
            ),
            StorageKind::ElementId => ParameterValue::ElementId(
                raw.value
                    .as_ref()
                    .and_then(|v| v.as_i64())
                    .ok_or_else(|| mismatch("an integer"))?,
            ),
            StorageKind::String => match &raw.value {
                None | Some(serde_json::Value::Null) => ParameterValue::String(None),
                Some(serde_json::Value::String(s)) => ParameterValue::String(Some(s.clone())),
                Some(_) => return Err(mismatch("a string")),
            },
            StorageKind::None => ParameterValue::None,
        };
        Ok(Parameter {
            name: raw.name,
            value,
        })
    }
}

impl From<Parameter> for RawParameter {
    fn from(p: Parameter) -> Self {
        let (kind, value) = match p.value {
            ParameterValue::Real(v) => (StorageKind::Real, Some(serde_json::Value::from(v))),
            ParameterValue::Integer(v) => (StorageKind::Integer, Some(serde_json::Value::from(v))),
            ParameterValue::String(s) => (StorageKind::String, s.map(serde_json::Value::from)),
            ParameterValue::ElementId(v) => {
                (StorageKind::ElementId, Some(serde_json::Value::from(v)))
            }
            ParameterValue::None => (StorageKind::None, None),
        };
        RawParameter {
            name: p.name,
            kind,
            value,
        }
    }
}

/// Format a real with at most two decimals and no trailing zeros, rounding
/// half away from zero.
pub fn format_real(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let rounded = (value * 100.0).round() / 100.0;
    let text = format!("{:.2}", rounded);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

/// Collect parameters into a key → distinct values map.
pub fn collect(parameters: &[Parameter]) -> Result<BTreeMap<String, BTreeSet<String>>> {
    let mut dict: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for p in parameters {
        let key = p.key()?;
        let value = p.formatted_value()?;
        let values = dict.entry(key).or_default();
        if !values.is_empty() && !values.contains(&value) {
            tracing::trace!(parameter = %p.name, %value, "parameter key collision");
        }
        values.insert(value);
    }
    Ok(dict)
}

/// Project parameters into the one-line JSON dictionary
/// `{"k" : "v", "k2" : "v2"}`.
///
/// A parameter with [`ParameterValue::None`] storage fails the whole
/// projection with [`Error::UnsupportedStorage`] naming it.
pub fn project(parameters: &[Parameter]) -> Result<String> {
    let dict = collect(parameters)?;

    let mut entries = Vec::with_capacity(dict.len());
    for (key, values) in &dict {
        let joined = values
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(COLLISION_SEPARATOR);
        entries.push(format!(
            "{} : {}",
            serde_json::to_string(key)?,
            serde_json::to_string(&joined)?
        ));
    }

    Ok(format!("{{{}}}", entries.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn real(name: &str, v: f64) -> Parameter {
        Parameter::new(name, ParameterValue::Real(v))
    }

    #[test]
    fn real_formatting() {
        assert_eq!(format_real(12.0), "12");
        assert_eq!(format_real(12.5), "12.5");
        assert_eq!(format_real(12.345678), "12.35");
        assert_eq!(format_real(0.125), "0.13");
        assert_eq!(format_real(-0.125), "-0.13");
        assert_eq!(format_real(-0.001), "0");
        assert_eq!(format_real(0.0), "0");
        assert_eq!(format_real(1234567.891), "1234567.89");
    }

    #[test]
    fn collision_keeps_both_values() {
        let params = vec![real("Area", 12.34), real("Area", 12.35)];
        assert_eq!(project(&params).unwrap(), r#"{"Area(r)" : "12.34 | 12.35"}"#);
    }

    #[test]
    fn collision_is_order_independent() {
        let a = vec![real("Area", 12.35), real("Area", 12.34), real("Area", 12.35)];
        let b = vec![real("Area", 12.34), real("Area", 12.35)];
        assert_eq!(project(&a).unwrap(), project(&b).unwrap());
    }

    #[test]
    fn identical_duplicates_collapse() {
        let params = vec![real("Area", 12.341), real("Area", 12.339)];
        assert_eq!(project(&params).unwrap(), r#"{"Area(r)" : "12.34"}"#);
    }

    #[test]
    fn keys_sorted_and_tagged() {
        let params = vec![
            Parameter::new("Name", ParameterValue::String(Some("Office".into()))),
            Parameter::new("Level", ParameterValue::ElementId(311)),
            Parameter::new("Number", ParameterValue::Integer(101)),
            Parameter::new("Comments", ParameterValue::String(None)),
            real("Area", 20.0),
        ];
        assert_eq!(
            project(&params).unwrap(),
            r#"{"Area(r)" : "20", "Comments(s)" : "", "Level(e)" : "311", "Name(s)" : "Office", "Number(n)" : "101"}"#
        );
    }

    #[test]
    fn same_name_different_storage_are_separate_keys() {
        let params = vec![
            real("Height", 3.0),
            Parameter::new("Height", ParameterValue::String(Some("3 ft".into()))),
        ];
        assert_eq!(
            project(&params).unwrap(),
            r#"{"Height(r)" : "3", "Height(s)" : "3 ft"}"#
        );
    }

    #[test]
    fn strings_are_escaped() {
        let params = vec![Parameter::new(
            "Say \"hi\"",
            ParameterValue::String(Some("a\\b\nc".into())),
        )];
        let json = project(&params).unwrap();
        assert_eq!(json, r#"{"Say \"hi\"(s)" : "a\\b\nc"}"#);
        // Still valid JSON
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["Say \"hi\"(s)"], "a\\b\nc");
    }

    #[test]
    fn empty_parameter_list() {
        assert_eq!(project(&[]).unwrap(), "{}");
    }

    #[test]
    fn none_storage_is_an_error() {
        let params = vec![real("Area", 1.0), Parameter::new("Broken", ParameterValue::None)];
        match project(&params) {
            Err(Error::UnsupportedStorage { parameter }) => assert_eq!(parameter, "Broken"),
            other => panic!("expected unsupported storage, got {:?}", other),
        }
    }

    #[test]
    fn parameters_deserialize_from_tagged_json() {
        let json = r#"[
            {"name": "Area", "kind": "real", "value": 12.5},
            {"name": "Number", "kind": "integer", "value": 3},
            {"name": "Comments", "kind": "string"},
            {"name": "Level", "kind": "element_id", "value": 311},
            {"name": "Odd", "kind": "none"}
        ]"#;
        let params: Vec<Parameter> = serde_json::from_str(json).unwrap();
        assert_eq!(params[0].value, ParameterValue::Real(12.5));
        assert_eq!(params[1].value, ParameterValue::Integer(3));
        assert_eq!(params[2].value, ParameterValue::String(None));
        assert_eq!(params[3].value, ParameterValue::ElementId(311));
        assert_eq!(params[4].value, ParameterValue::None);

        let bad = r#"{"name": "Area", "kind": "real", "value": "wide"}"#;
        assert!(serde_json::from_str::<Parameter>(bad).is_err());
    }
}
