use std::collections::BTreeMap;

use serde_json::{
    Map,
    Value as JsonValue,
};
use value::PointValue;

use crate::schema::Schema;

/// An ordered mapping from column name to value. Fields are kept in column
/// name order (a deliberate choice over insertion order) so the TEXT/JSON
/// rendering of a point is deterministic regardless of how it was built.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Point {
    fields: BTreeMap<String, PointValue>,
}

impl Point {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: PointValue) {
        self.fields.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&PointValue> {
        self.fields.get(column)
    }

    pub fn date_key<'a>(&'a self, schema: &Schema) -> Option<&'a str> {
        self.get(&schema.date_key_column).and_then(PointValue::as_text)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PointValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn from_json(obj: &Map<String, JsonValue>, schema: &Schema) -> Self {
        let mut point = Point::new();
        for (name, ty) in &schema.columns {
            if let Some(v) = obj.get(name) {
                point.insert(name.clone(), PointValue::from_json(*ty, v));
            }
        }
        point
    }

    pub fn to_json(&self) -> Map<String, JsonValue> {
        self.fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()
    }

    /// Build the projection of this point onto `metrics`, always including
    /// the date-key column. Assumes every name in `metrics` is a valid
    /// column -- callers reject unknown metrics up front (see
    /// [`PointBatch::project`]).
    fn project(&self, schema: &Schema, metrics: &[String]) -> Point {
        let mut out = Point::new();
        if let Some(v) = self.get(&schema.date_key_column) {
            out.insert(schema.date_key_column.clone(), v.clone());
        }
        for m in metrics {
            if let Some(v) = self.get(m) {
                out.insert(m.clone(), v.clone());
            }
        }
        out
    }
}

/// `(start_date, end_date, points)`. `points` is not asserted to be sorted;
/// callers that need date-key order call [`PointBatch::sort_by_date_key`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointBatch {
    pub start_date: String,
    pub end_date: String,
    pub points: Vec<Point>,
}

impl PointBatch {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(start_date: impl Into<String>, end_date: impl Into<String>, points: Vec<Point>) -> Self {
        Self {
            start_date: start_date.into(),
            end_date: end_date.into(),
            points,
        }
    }

    pub fn sort_by_date_key(&mut self, schema: &Schema) {
        self.points.sort_by(|a, b| a.date_key(schema).cmp(&b.date_key(schema)));
    }

    /// Project every point onto `metrics` (empty or `["*"]` means "all
    /// columns"). An unknown metric name yields the empty batch, per the
    /// CacheStore query contract.
    pub fn project(&self, schema: &Schema, metrics: &[String]) -> PointBatch {
        let include_all = metrics.is_empty() || (metrics.len() == 1 && metrics[0] == "*");
        if include_all {
            return self.clone();
        }
        if metrics.iter().any(|m| !schema.columns.contains_key(m)) {
            return PointBatch::empty();
        }
        let points = self.points.iter().map(|p| p.project(schema, metrics)).collect();
        PointBatch::new(self.start_date.clone(), self.end_date.clone(), points)
    }

    pub fn to_json_points(&self) -> Vec<JsonValue> {
        self.points.iter().map(|p| JsonValue::Object(p.to_json())).collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn schema() -> Schema {
        Schema::parse(r#"{"table":"t","date_key_column":"date","columns":{"date":"TEXT","hr":"INT","label":"TEXT"}}"#).unwrap()
    }

    #[test]
    fn project_all_keeps_everything() {
        let schema = schema();
        let obj = json!({"date": "2020-01-01 00:00Z", "hr": 70, "label": "x"}).as_object().unwrap().clone();
        let p = Point::from_json(&obj, &schema);
        let batch = PointBatch::new("s", "e", vec![p.clone()]);
        assert_eq!(batch.project(&schema, &[]).points[0], p);
        assert_eq!(batch.project(&schema, &["*".to_string()]).points[0], p);
    }

    #[test]
    fn project_subset_always_includes_date_key() {
        let schema = schema();
        let obj = json!({"date": "2020-01-01 00:00Z", "hr": 70, "label": "x"}).as_object().unwrap().clone();
        let p = Point::from_json(&obj, &schema);
        let batch = PointBatch::new("s", "e", vec![p]);
        let projected = batch.project(&schema, &["hr".to_string()]);
        let point = &projected.points[0];
        assert!(point.get("date").is_some());
        assert!(point.get("hr").is_some());
        assert!(point.get("label").is_none());
    }

    #[test]
    fn unknown_metric_yields_empty_batch() {
        let schema = schema();
        let batch = PointBatch::new("s", "e", vec![Point::new()]);
        let projected = batch.project(&schema, &["nonexistent".to_string()]);
        assert!(projected.points.is_empty());
        assert_eq!(projected.start_date, "");
    }

    #[test]
    fn fields_kept_in_column_order_regardless_of_insertion() {
        let mut p = Point::new();
        p.insert("zzz", PointValue::Int(1));
        p.insert("aaa", PointValue::Int(2));
        let names: Vec<&str> = p.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["aaa", "zzz"]);
    }
}
