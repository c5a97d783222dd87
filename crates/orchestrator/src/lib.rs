//! The prefetch orchestrator: turns a single "make sure the cache covers
//! `[start, end]`" request into concrete fetch/downsample/write work against
//! the sub-intervals the cache doesn't have yet, then atomically publishes
//! the widened coverage.
//!
//! Two locks guard the orchestrator's state, matching the concurrency model
//! the cache promises its callers:
//!
//! - `populate_lock` (`tokio::sync::Mutex`, async-aware) serializes whole
//!   populate operations end to end, and is also taken by a re-`init` so it
//!   waits out anything in flight. Held across the `.await` points in
//!   [`Orchestrator::populate`].
//! - `interval_set_lock` (`parking_lot::Mutex`, synchronous) protects the
//!   published [`IntervalSet`]; taken only for the snapshot-read and the
//!   swap-publish, never across I/O.

use std::sync::Arc;

use cache_store::{
    CacheStore,
    Table,
};
use common::{
    BackingStore,
    CacheSetup,
    IntervalSet,
    PointBatch,
    Schema,
    TimeCodec,
};
use errors::ErrorMetadata;
use futures::future::try_join_all;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex as AsyncMutex;

/// A level-exact cache hit, or a raw-table fallback that may still need
/// further downsampling by the caller.
pub struct CachedResponse {
    pub batch: PointBatch,
    pub is_raw_fallback: bool,
}

pub struct Orchestrator {
    schema: Schema,
    cache_setup: CacheSetup,
    backing_store: Arc<dyn BackingStore>,
    cache_store: Arc<CacheStore>,
    interval_set: SyncMutex<IntervalSet>,
    populate_lock: Arc<AsyncMutex<()>>,
}

impl Orchestrator {
    pub fn new(
        schema: Schema,
        cache_setup: CacheSetup,
        backing_store: Arc<dyn BackingStore>,
        populate_lock: Arc<AsyncMutex<()>>,
    ) -> Self {
        let cache_store =
            CacheStore::new(schema.clone(), cache_setup.cache_raw_data, cache_setup.downsampling_levels.clone());
        Self {
            schema,
            cache_setup,
            backing_store,
            cache_store: Arc::new(cache_store),
            interval_set: SyncMutex::new(IntervalSet::new()),
            populate_lock,
        }
    }

    pub fn cache_store(&self) -> &CacheStore {
        &self.cache_store
    }

    /// True if the published `IntervalSet` covers `[start, end]`. Used by the
    /// Facade's lookup path; never blocks on a populate.
    pub fn covers(&self, start: &str, end: &str) -> bool {
        self.interval_set.lock().covers(start, end)
    }

    /// The cache's best existing answer for `(start, end, num_of_points)`:
    /// the first downsampling level whose natural point density matches
    /// `num_of_points` exactly, or the raw table if one is kept and nothing
    /// matches exactly, gated on coverage. `None` means "ask the backing
    /// store".
    pub fn lookup(&self, start: &str, end: &str, num_of_points: i64) -> Option<CachedResponse> {
        if !self.covers(start, end) {
            return None;
        }
        let all_metrics = self.schema.all_metrics();
        let table = self.cache_store.select_table(start, end, num_of_points)?;
        let batch = self.cache_store.query(table, start, end, &all_metrics);
        Some(CachedResponse { batch, is_raw_fallback: matches!(table, Table::Raw) })
    }

    /// Widens `[start, end]` by the configured `fetch_behind`/`fetch_ahead`
    /// multiples of its own duration, fetches whatever sub-intervals of the
    /// widened range aren't already covered, downsamples each into every
    /// configured level (plus the raw table, if kept), and publishes the
    /// widened coverage. A no-op if the widened range is already covered.
    pub async fn populate(&self, start: &str, end: &str) -> anyhow::Result<()> {
        if start.is_empty() || end.is_empty() || !TimeCodec::is_valid(start) || !TimeCodec::is_valid(end) {
            return Err(ErrorMetadata::invalid_time(format!("populate range [{start}, {end}] does not parse")).into());
        }
        let duration = TimeCodec::parse_to_epoch(end) - TimeCodec::parse_to_epoch(start);
        let wide_start = TimeCodec::offset(start, -(self.cache_setup.fetch_behind * duration));
        let wide_end = TimeCodec::offset(end, self.cache_setup.fetch_ahead * duration);
        if wide_start.is_empty() || wide_end.is_empty() {
            return Err(ErrorMetadata::invalid_time("widened populate range does not parse").into());
        }

        let _guard = self.populate_lock.lock().await;

        let working_copy = self.interval_set.lock().clone();
        if working_copy.covers(&wide_start, &wide_end) {
            tracing::debug!(wide_start, wide_end, "populate: already covered, nothing to fetch");
            return Ok(());
        }
        let missing = working_copy.difference(&wide_start, &wide_end);

        tracing::debug!(wide_start, wide_end, missing = missing.len(), "populate: fetching missing sub-intervals");
        let fetches = missing.iter().map(|(ms, me)| self.fetch_and_write(ms, me));
        try_join_all(fetches).await?;

        let mut published = self.interval_set.lock();
        published.insert_merge(&wide_start, &wide_end);
        tracing::debug!(wide_start, wide_end, "populate: published widened coverage");
        Ok(())
    }

    /// Fetches one missing sub-interval from the backing store and writes it
    /// into every cache table (raw, if kept, and every downsampling level) as
    /// independent concurrent tasks, each downsampling and inserting on its
    /// own blocking thread.
    async fn fetch_and_write(&self, ms: &str, me: &str) -> anyhow::Result<()> {
        let all_metrics = self.schema.all_metrics();
        let mut batch = self.backing_store.get(&self.schema, ms, me, &all_metrics).await?;
        batch.sort_by_date_key(&self.schema);

        let mut writes = Vec::new();
        if self.cache_setup.cache_raw_data {
            let cache_store = Arc::clone(&self.cache_store);
            let batch = batch.clone();
            writes.push(tokio::task::spawn_blocking(move || cache_store.insert(Table::Raw, &batch)));
        }
        for level in 1..=self.cache_store.levels().len() {
            let n = self.cache_store.duration_num_points(ms, me, level);
            let schema = self.schema.clone();
            let filter = self.cache_setup.downsampling_filter;
            let cache_store = Arc::clone(&self.cache_store);
            let batch = batch.clone();
            writes.push(tokio::task::spawn_blocking(move || {
                let downsampled = downsampler::downsample(&schema, &batch, n, filter);
                cache_store.insert(Table::Level(level), &downsampled)
            }));
        }

        try_join_all(writes).await?.into_iter().collect::<anyhow::Result<()>>().map_err(|e| {
            tracing::warn!(error = %e, ms, me, "populate: write failed, coverage will not be published");
            e
        })
    }
}
