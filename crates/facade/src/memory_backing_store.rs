//! A reference, in-memory [`BackingStore`] implementation. The persistent
//! store itself is out of scope (spec.md §1) -- this exists only so the
//! facade can be exercised end to end without a real database, the way the
//! teacher's `sqlite`/`postgres` crates each implement `common::persistence::
//! Persistence` against a real backend and a `TestPersistence` implements it
//! in memory for tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use common::{
    BackingStore,
    Point,
    PointBatch,
    Schema,
};
use parking_lot::RwLock;

pub struct MemoryBackingStore {
    rows: RwLock<BTreeMap<String, Point>>,
}

impl MemoryBackingStore {
    pub fn new() -> Self {
        Self { rows: RwLock::new(BTreeMap::new()) }
    }
}

#[async_trait]
impl BackingStore for MemoryBackingStore {
    /// Upserts every point in `batch` keyed by its date-key value, the
    /// durable store's put semantics -- unlike the cache tables' insert
    /// (which ignores a date key it already has), a later `put` for the same
    /// timestamp overwrites the earlier one.
    async fn put(&self, schema: &Schema, batch: &PointBatch) -> anyhow::Result<()> {
        let mut rows = self.rows.write();
        for point in &batch.points {
            let Some(key) = point.date_key(schema) else {
                tracing::warn!("dropping point with no date-key value on put");
                continue;
            };
            rows.insert(key.to_string(), point.clone());
        }
        Ok(())
    }

    async fn get(&self, schema: &Schema, start: &str, end: &str, metrics: &[String]) -> anyhow::Result<PointBatch> {
        let rows = self.rows.read();
        let points = rows.range(start.to_string()..=end.to_string()).map(|(_, p)| p.clone()).collect();
        let batch = PointBatch::new(start, end, points);
        Ok(batch.project(schema, metrics))
    }
}
