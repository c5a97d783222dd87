//! Per-level in-memory storage tables for a single cache instance: one table
//! per downsampling level, plus an optional raw table.

use std::collections::BTreeMap;

use common::{
    DownsamplingLevel,
    Point,
    PointBatch,
    Schema,
    TimeCodec,
};
use errors::ErrorMetadata;
use parking_lot::RwLock;

/// Identifies one of a cache instance's storage tables.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Table {
    Raw,
    /// 1-indexed, matching the order `downsamplingLevels` was declared in.
    Level(usize),
}

struct LevelTable {
    points: RwLock<BTreeMap<String, Point>>,
}

impl LevelTable {
    fn new() -> Self {
        Self { points: RwLock::new(BTreeMap::new()) }
    }

    /// Inserts every point in `batch`, keyed by its date-key value.
    /// Mirrors `INSERT OR IGNORE`: a date key already present keeps its
    /// existing value.
    fn insert(&self, schema: &Schema, batch: &PointBatch) {
        let mut points = self.points.write();
        for point in &batch.points {
            let Some(key) = point.date_key(schema) else {
                tracing::warn!("dropping point with no date-key value during insert");
                continue;
            };
            points.entry(key.to_string()).or_insert_with(|| point.clone());
        }
    }

    fn query(&self, start: &str, end: &str) -> Vec<Point> {
        let points = self.points.read();
        points.range(start.to_string()..=end.to_string()).map(|(_, p)| p.clone()).collect()
    }

    fn len(&self) -> usize {
        self.points.read().len()
    }
}

/// Holds one [`LevelTable`] per downsampling level (1-indexed) plus an
/// optional raw table, all scoped to a single `Schema`.
pub struct CacheStore {
    schema: Schema,
    levels: Vec<DownsamplingLevel>,
    raw: Option<LevelTable>,
    tables: Vec<LevelTable>,
}

impl CacheStore {
    pub fn new(schema: Schema, cache_raw_data: bool, levels: Vec<DownsamplingLevel>) -> Self {
        let tables = levels.iter().map(|_| LevelTable::new()).collect();
        Self { schema, levels, raw: cache_raw_data.then(LevelTable::new), tables }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn levels(&self) -> &[DownsamplingLevel] {
        &self.levels
    }

    pub fn has_raw_table(&self) -> bool {
        self.raw.is_some()
    }

    fn table(&self, table: Table) -> Option<&LevelTable> {
        match table {
            Table::Raw => self.raw.as_ref(),
            Table::Level(level) => self.tables.get(level.checked_sub(1)?),
        }
    }

    pub fn insert(&self, table: Table, batch: &PointBatch) -> anyhow::Result<()> {
        let Some(t) = self.table(table) else {
            return Err(ErrorMetadata::storage_error(format!("no such cache table: {table:?}")).into());
        };
        t.insert(&self.schema, batch);
        Ok(())
    }

    pub fn table_len(&self, table: Table) -> usize {
        self.table(table).map(LevelTable::len).unwrap_or(0)
    }

    /// Reads `[start, end]` out of `table`, projected onto `metrics` (empty
    /// or `["*"]` means every column).
    pub fn query(&self, table: Table, start: &str, end: &str, metrics: &[String]) -> PointBatch {
        let Some(t) = self.table(table) else {
            return PointBatch::empty();
        };
        let points = t.query(start, end);
        let batch = PointBatch::new(start, end, points);
        batch.project(&self.schema, metrics)
    }

    /// The approximate point count a request for `[start, end]` would see
    /// if served out of `level`, i.e. `level.num_of_points * (duration /
    /// level.duration)`, truncated toward zero.
    pub fn duration_num_points(&self, start: &str, end: &str, level: usize) -> i64 {
        let Some(l) = self.levels.get(level.wrapping_sub(1)) else {
            return 0;
        };
        if l.duration_secs == 0 {
            return 0;
        }
        let put_duration = (TimeCodec::parse_to_epoch(end) - TimeCodec::parse_to_epoch(start)) as f64;
        (l.num_of_points as f64 * (put_duration / l.duration_secs as f64)) as i64
    }

    /// Picks the table whose natural point density would satisfy a request
    /// for `num_of_points` over `[start, end]`: the first downsampling level
    /// whose computed point count matches exactly, falling back to the raw
    /// table if one is cached, or `None` if nothing can serve the request.
    pub fn select_table(&self, start: &str, end: &str, num_of_points: i64) -> Option<Table> {
        for level in 1..=self.levels.len() {
            if self.duration_num_points(start, end, level) == num_of_points {
                return Some(Table::Level(level));
            }
        }
        self.raw.as_ref().map(|_| Table::Raw)
    }
}

#[cfg(test)]
mod tests {
    use common::PointValue;
    use pretty_assertions::assert_eq;

    use super::*;

    fn schema() -> Schema {
        Schema::parse(r#"{"table":"t","date_key_column":"date","columns":{"date":"TEXT","hr":"INT"}}"#).unwrap()
    }

    fn point(date: &str, hr: i64) -> Point {
        let mut p = Point::new();
        p.insert("date", PointValue::Text(date.to_string()));
        p.insert("hr", PointValue::Int(hr));
        p
    }

    #[test]
    fn insert_then_query_round_trips() {
        let store = CacheStore::new(schema(), true, vec![]);
        let batch = PointBatch::new("2020-01-01 00:00Z", "2020-01-01 00:02Z", vec![
            point("2020-01-01 00:00Z", 1),
            point("2020-01-01 00:01Z", 2),
        ]);
        store.insert(Table::Raw, &batch).unwrap();
        let out = store.query(Table::Raw, "2020-01-01 00:00Z", "2020-01-01 00:02Z", &[]);
        assert_eq!(out.points.len(), 2);
    }

    #[test]
    fn duplicate_date_keys_are_ignored_not_overwritten() {
        let store = CacheStore::new(schema(), true, vec![]);
        let batch = PointBatch::new("s", "e", vec![point("2020-01-01 00:00Z", 1)]);
        store.insert(Table::Raw, &batch).unwrap();
        let batch2 = PointBatch::new("s", "e", vec![point("2020-01-01 00:00Z", 999)]);
        store.insert(Table::Raw, &batch2).unwrap();
        let out = store.query(Table::Raw, "2020-01-01 00:00Z", "2020-01-01 00:00Z", &[]);
        assert_eq!(out.points[0].get("hr"), Some(&PointValue::Int(1)));
    }

    #[test]
    fn select_table_matches_level_by_computed_point_count() {
        let levels = vec![DownsamplingLevel { duration_secs: 60, num_of_points: 60 }];
        let store = CacheStore::new(schema(), false, levels);
        // One hour spans 60 level-durations, so the level naturally holds
        // 60 * (3600/60) = 3600 points for this range.
        let table = store.select_table("2020-01-01 00:00Z", "2020-01-01 01:00Z", 3600);
        assert_eq!(table, Some(Table::Level(1)));
    }

    #[test]
    fn select_table_falls_back_to_raw_when_no_level_matches() {
        let store = CacheStore::new(schema(), true, vec![]);
        let table = store.select_table("2020-01-01 00:00Z", "2020-01-01 01:00Z", 12345);
        assert_eq!(table, Some(Table::Raw));
    }

    #[test]
    fn select_table_is_none_without_raw_fallback() {
        let store = CacheStore::new(schema(), false, vec![]);
        assert_eq!(store.select_table("2020-01-01 00:00Z", "2020-01-01 01:00Z", 12345), None);
    }
}
