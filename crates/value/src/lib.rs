//! Typed values carried by a single column of a [`Point`](../common docs).
//!
//! The cache's schema only ever distinguishes three column types, so the
//! value representation stays intentionally small rather than growing into a
//! general-purpose JSON value type.

use std::fmt;

use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value as JsonValue;

/// One of the three column types a [`Schema`](../common) column can declare.
#[cfg_attr(any(test, feature = "testing"), derive(proptest_derive::Arbitrary))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    #[serde(rename = "INT")]
    Int,
    #[serde(rename = "REAL")]
    Real,
    #[serde(rename = "TEXT")]
    Text,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ColumnType::Int => "INT",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        };
        write!(f, "{s}")
    }
}

/// A single typed column value within a point.
#[derive(Clone, Debug, PartialEq)]
pub enum PointValue {
    Int(i64),
    Real(f64),
    Text(String),
}

impl PointValue {
    pub fn column_type(&self) -> ColumnType {
        match self {
            PointValue::Int(_) => ColumnType::Int,
            PointValue::Real(_) => ColumnType::Real,
            PointValue::Text(_) => ColumnType::Text,
        }
    }

    /// Coerce to a number for the purposes of averaging. Non-numeric values
    /// (including malformed numeric JSON) contribute zero rather than
    /// failing the whole downsample, matching the lenient accumulation the
    /// cache has always done for non-numeric columns.
    pub fn as_numeric(&self) -> f64 {
        match self {
            PointValue::Int(i) => *i as f64,
            PointValue::Real(r) => *r,
            PointValue::Text(_) => 0.0,
        }
    }

    /// Build a value of `ty` from an averaged sum. Returns `None` for
    /// `ColumnType::Text`, which is never produced by averaging.
    pub fn from_numeric_average(ty: ColumnType, avg: f64) -> Option<Self> {
        match ty {
            ColumnType::Int => Some(PointValue::Int(avg.trunc() as i64)),
            ColumnType::Real => Some(PointValue::Real(avg)),
            ColumnType::Text => None,
        }
    }

    /// Coerce a raw JSON value into the declared column type. Unparseable
    /// values degrade to the type's zero value rather than erroring, the
    /// same tolerant coercion the point's numeric fields get during
    /// downsampling.
    pub fn from_json(ty: ColumnType, value: &JsonValue) -> Self {
        match ty {
            ColumnType::Int => PointValue::Int(
                value
                    .as_i64()
                    .or_else(|| value.as_f64().map(|f| f as i64))
                    .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
                    .unwrap_or(0),
            ),
            ColumnType::Real => PointValue::Real(
                value
                    .as_f64()
                    .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
                    .unwrap_or(0.0),
            ),
            ColumnType::Text => {
                PointValue::Text(value.as_str().map(str::to_owned).unwrap_or_default())
            },
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            PointValue::Int(i) => JsonValue::from(*i),
            PointValue::Real(r) => JsonValue::from(*r),
            PointValue::Text(s) => JsonValue::from(s.clone()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PointValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn numeric_coercion_degrades_instead_of_failing() {
        assert_eq!(PointValue::from_json(ColumnType::Int, &json!("not a number")).as_numeric(), 0.0);
        assert_eq!(PointValue::from_json(ColumnType::Real, &json!(null)).as_numeric(), 0.0);
    }

    #[test]
    fn int_from_json_accepts_numeric_strings() {
        assert_eq!(PointValue::from_json(ColumnType::Int, &json!("42")), PointValue::Int(42));
        assert_eq!(PointValue::from_json(ColumnType::Real, &json!("1.5")), PointValue::Real(1.5));
    }

    #[test]
    fn average_truncates_for_int_columns() {
        let v = PointValue::from_numeric_average(ColumnType::Int, 3.9).unwrap();
        assert_eq!(v, PointValue::Int(3));
        let v = PointValue::from_numeric_average(ColumnType::Int, -3.9).unwrap();
        assert_eq!(v, PointValue::Int(-3));
    }

    #[test]
    fn text_columns_never_come_from_averaging() {
        assert_eq!(PointValue::from_numeric_average(ColumnType::Text, 1.0), None);
    }
}
