//! The single public entry point over the prefetch cache: `init`, `addData`,
//! `getData`, all JSON-string-valued at the boundary (spec.md §4.6, §6).
//!
//! No global singletons (spec.md §9's redesign note) -- a `Facade` owns its
//! `BackingStore`, `CacheStore` (inside the `Orchestrator`), `Downsampler`
//! (a free function, stateless), and `IntervalSet` (also inside the
//! `Orchestrator`), and a re-`init` rebuilds all of them from scratch.

mod memory_backing_store;
mod params;

use std::sync::Arc;

use common::{
    CacheSetup,
    Query,
    Schema,
};
use errors::ErrorMetadata;
use orchestrator::Orchestrator;
use params::AddDataParams;
use serde_json::json;
use tokio::sync::{
    Mutex as AsyncMutex,
    RwLock,
};

pub use memory_backing_store::MemoryBackingStore;

const EMPTY_RESPONSE: &str = r#"{"startDate":"","endDate":"","points":[]}"#;

struct Instance {
    schema: Schema,
    cache_setup: CacheSetup,
    backing_store: Arc<dyn common::BackingStore>,
    orchestrator: Arc<Orchestrator>,
}

/// The cache instance. Safe to call from multiple threads/tasks
/// concurrently: `init`, `addData`, and `getData` all take `&self`.
pub struct Facade {
    state: RwLock<Option<Arc<Instance>>>,
    populate_lock: Arc<AsyncMutex<()>>,
    tasks: AsyncMutex<tokio::task::JoinSet<()>>,
}

impl Facade {
    pub fn new() -> Self {
        Self { state: RwLock::new(None), populate_lock: Arc::new(AsyncMutex::new(())), tasks: AsyncMutex::new(tokio::task::JoinSet::new()) }
    }

    /// Rebuilds the cache's backing store, cache tables, and interval set
    /// from scratch. Only `clean=true` is supported -- the cache has no
    /// persistent form to resume from (spec.md §3's Lifecycles note), so
    /// `clean=false` is rejected rather than silently treated as a clean
    /// init. Waits out any populate already in flight before swapping state,
    /// via the same `populate_lock` the orchestrator holds across a populate.
    pub async fn init(&self, cache_setup: &str, data_schema: &str, _database_path: &str, clean: bool) -> bool {
        match self.try_init(cache_setup, data_schema, clean).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "init failed");
                false
            },
        }
    }

    async fn try_init(&self, cache_setup: &str, data_schema: &str, clean: bool) -> anyhow::Result<()> {
        if !clean {
            return Err(ErrorMetadata::not_initialized(
                "init(clean=false) is not supported; the cache is memory-resident and always starts empty",
            )
            .into());
        }
        let schema = Schema::parse(data_schema)?;
        let cache_setup = CacheSetup::parse(cache_setup)?;
        let backing_store: Arc<dyn common::BackingStore> = Arc::new(MemoryBackingStore::new());

        // Serializes against any populate currently running; a populate that
        // hasn't yet reached its own lock acquisition will simply run after
        // we release it, against its own already-captured `Orchestrator`.
        let _guard = self.populate_lock.lock().await;
        let orchestrator =
            Arc::new(Orchestrator::new(schema.clone(), cache_setup.clone(), backing_store.clone(), self.populate_lock.clone()));
        *self.state.write().await = Some(Arc::new(Instance { schema, cache_setup, backing_store, orchestrator }));
        Ok(())
    }

    pub async fn add_data(&self, json: &str) -> bool {
        match self.try_add_data(json).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "addData failed");
                false
            },
        }
    }

    async fn try_add_data(&self, json: &str) -> anyhow::Result<()> {
        let instance = self.instance().await?;
        let params = AddDataParams::parse(json)?;
        let batch = params.into_batch(&instance.schema)?;
        instance.backing_store.put(&instance.schema, &batch).await
    }

    pub async fn get_data(&self, json: &str) -> String {
        match self.try_get_data(json).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "getData failed");
                EMPTY_RESPONSE.to_string()
            },
        }
    }

    async fn try_get_data(&self, json: &str) -> anyhow::Result<String> {
        let instance = self.instance().await?;
        let query = Query::parse(json)?;

        if instance.cache_setup.use_cache {
            self.spawn_populate(&instance, query.start_date.clone(), query.end_date.clone()).await;
        }

        if !query.wants_downsampling() {
            return Ok(json!({"startDate": query.start_date, "endDate": query.end_date, "points": []}).to_string());
        }

        let batch = self.answer(&instance, &query).await?;
        let projected = batch.project(&instance.schema, &query.metrics);
        Ok(json!({
            "startDate": projected.start_date,
            "endDate": projected.end_date,
            "points": projected.to_json_points(),
        })
        .to_string())
    }

    /// Dispatches a detached populate for `[start, end]` and forgets about
    /// it -- `getData` never blocks on cache warming (spec.md §5). The
    /// handle is kept in a `JoinSet` purely so a later `shutdown` can drain
    /// outstanding background work; nothing on the `getData` path waits on
    /// it.
    async fn spawn_populate(&self, instance: &Arc<Instance>, start: String, end: String) {
        let orchestrator = instance.orchestrator.clone();
        self.tasks.lock().await.spawn(async move {
            if let Err(e) = orchestrator.populate(&start, &end).await {
                tracing::warn!(error = %e, start, end, "populate failed; interval set left unchanged");
            }
        });
    }

    /// The `getData` serving policy (spec.md §4.4): a level-exact cache hit
    /// returns as is; a raw-table fallback or an outright miss may still
    /// need a downsampling pass down to `numOfPoints`.
    async fn answer(&self, instance: &Arc<Instance>, query: &Query) -> anyhow::Result<common::PointBatch> {
        if let Some(cached) = instance.orchestrator.lookup(&query.start_date, &query.end_date, query.num_of_points) {
            if !cached.is_raw_fallback {
                return Ok(cached.batch);
            }
            return Ok(self.downsample_if_needed(instance, cached.batch, query.num_of_points));
        }
        let all_metrics = instance.schema.all_metrics();
        let mut batch =
            instance.backing_store.get(&instance.schema, &query.start_date, &query.end_date, &all_metrics).await?;
        batch.sort_by_date_key(&instance.schema);
        Ok(self.downsample_if_needed(instance, batch, query.num_of_points))
    }

    fn downsample_if_needed(&self, instance: &Arc<Instance>, batch: common::PointBatch, n: i64) -> common::PointBatch {
        if batch.points.len() as i64 > n {
            downsampler::downsample(&instance.schema, &batch, n, instance.cache_setup.downsampling_filter)
        } else {
            batch
        }
    }

    async fn instance(&self) -> anyhow::Result<Arc<Instance>> {
        self.state.read().await.clone().ok_or_else(|| ErrorMetadata::not_initialized("facade has not been init'ed").into())
    }

    /// Awaits every detached populate spawned so far. Not on any request
    /// path; callers tearing down a `Facade` for good can use this to avoid
    /// leaking background tasks, per the teardown note in spec.md §9.
    pub async fn shutdown(&self) {
        let mut tasks = self.tasks.lock().await;
        while tasks.join_next().await.is_some() {}
    }
}

impl Default for Facade {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use common::TimeCodec;
    use pretty_assertions::assert_eq;

    use super::*;

    fn schema_json() -> &'static str {
        r#"{"table":"readings","date_key_column":"date","columns":{"date":"TEXT","heart_rate":"INT"}}"#
    }

    fn point_json(date: &str, hr: i64) -> serde_json::Value {
        json!({"date": date, "heart_rate": hr})
    }

    #[tokio::test]
    async fn scenario_1_query_before_any_data_is_empty() {
        let facade = Facade::new();
        assert!(facade.init("", schema_json(), "", true).await);
        let resp = facade
            .get_data(r#"{"startDate":"2015-03-03 00:00Z","endDate":"2015-03-03 23:59Z","numOfPoints":1000}"#)
            .await;
        let parsed: serde_json::Value = serde_json::from_str(&resp).unwrap();
        assert_eq!(parsed["points"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn scenario_2_put_then_get_round_trips_without_cache() {
        let facade = Facade::new();
        assert!(facade.init("", schema_json(), "", true).await);
        let add = json!({
            "startDate": "2015-03-03 00:00Z",
            "endDate": "2015-03-03 00:00Z",
            "points": [point_json("2015-03-03 00:00Z", 70)],
        });
        assert!(facade.add_data(&add.to_string()).await);
        let resp = facade
            .get_data(r#"{"startDate":"2015-03-03 00:00Z","endDate":"2015-03-03 23:59Z","numOfPoints":1000}"#)
            .await;
        let parsed: serde_json::Value = serde_json::from_str(&resp).unwrap();
        assert_eq!(parsed["points"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn scenario_3_served_from_cache_with_raw_and_levels_configured() {
        let facade = Facade::new();
        let setup = json!({
            "useCache": true,
            "cacheRawData": true,
            "downsamplingLevels": [{"duration": 3600, "numOfPoints": 24}, {"duration": 60, "numOfPoints": 1440}],
        });
        assert!(facade.init(&setup.to_string(), schema_json(), "", true).await);
        let add = json!({
            "startDate": "2015-03-03 00:00Z",
            "endDate": "2015-03-03 00:00Z",
            "points": [point_json("2015-03-03 00:00Z", 70)],
        });
        assert!(facade.add_data(&add.to_string()).await);
        let resp = facade
            .get_data(r#"{"startDate":"2015-03-03 00:00Z","endDate":"2015-03-03 23:59Z","numOfPoints":1000}"#)
            .await;
        // The populate is fire-and-forget; drain it before asserting on cache state.
        facade.shutdown().await;
        let resp2 = facade
            .get_data(r#"{"startDate":"2015-03-03 00:00Z","endDate":"2015-03-03 23:59Z","numOfPoints":1000}"#)
            .await;
        let parsed: serde_json::Value = serde_json::from_str(&resp2).unwrap();
        assert_eq!(parsed["points"].as_array().unwrap().len(), 1);
        let _ = resp;
    }

    #[tokio::test]
    async fn scenario_4_projects_onto_requested_metrics_and_stays_within_budget() {
        let facade = Facade::new();
        assert!(facade.init("", schema_json(), "", true).await);
        let points: Vec<_> =
            (0..1440).map(|i| point_json(&TimeCodec::format_from_epoch(i * 60), i)).collect();
        let add = json!({"startDate": TimeCodec::format_from_epoch(0), "endDate": TimeCodec::format_from_epoch(1439 * 60), "points": points});
        assert!(facade.add_data(&add.to_string()).await);
        let query = json!({
            "startDate": TimeCodec::format_from_epoch(0),
            "endDate": TimeCodec::format_from_epoch(1439 * 60),
            "numOfPoints": 100,
            "metrics": ["heart_rate"],
        });
        let resp = facade.get_data(&query.to_string()).await;
        let parsed: serde_json::Value = serde_json::from_str(&resp).unwrap();
        let points = parsed["points"].as_array().unwrap();
        assert!(points.len() <= 101);
        for p in points {
            let obj = p.as_object().unwrap();
            assert!(obj.contains_key("date"));
            assert!(obj.contains_key("heart_rate"));
            assert_eq!(obj.len(), 2);
        }
    }

    #[tokio::test]
    async fn malformed_query_yields_empty_response_not_an_error() {
        let facade = Facade::new();
        assert!(facade.init("", schema_json(), "", true).await);
        let resp = facade.get_data("not json").await;
        assert_eq!(resp, EMPTY_RESPONSE);
    }

    #[tokio::test]
    async fn init_with_clean_false_is_rejected() {
        let facade = Facade::new();
        assert!(!facade.init("", schema_json(), "", false).await);
    }

    #[tokio::test]
    async fn get_data_before_init_is_empty_response() {
        let facade = Facade::new();
        let resp = facade.get_data(r#"{"startDate":"a","endDate":"b","numOfPoints":10}"#).await;
        assert_eq!(resp, EMPTY_RESPONSE);
    }

    #[tokio::test]
    async fn non_positive_num_of_points_returns_raw_window_without_error() {
        let facade = Facade::new();
        assert!(facade.init("", schema_json(), "", true).await);
        let resp = facade
            .get_data(r#"{"startDate":"2015-03-03 00:00Z","endDate":"2015-03-03 23:59Z","numOfPoints":0}"#)
            .await;
        let parsed: serde_json::Value = serde_json::from_str(&resp).unwrap();
        assert_eq!(parsed["startDate"], "2015-03-03 00:00Z");
        assert_eq!(parsed["points"].as_array().unwrap().len(), 0);
    }
}
