use async_trait::async_trait;

use crate::point::PointBatch;
use crate::schema::Schema;

/// The durable store backing a cache instance. Opaque to the cache: it only
/// ever sees whole `PointBatch`es in and out, keyed by the schema's date-key
/// column, and never has to know how `BackingStore` persists them.
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Persists `batch`, merging with whatever is already stored for
    /// overlapping date keys.
    async fn put(&self, schema: &Schema, batch: &PointBatch) -> anyhow::Result<()>;

    /// Fetches every point with a date key in `[start, end]`, projected onto
    /// `metrics` (empty means all columns).
    async fn get(&self, schema: &Schema, start: &str, end: &str, metrics: &[String]) -> anyhow::Result<PointBatch>;
}
