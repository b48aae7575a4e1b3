//! Engine wiring.
//!
//! [`ContentEngine`] owns one instance of every service and exposes the
//! caller-facing operations. Nothing here is global: two engines in one
//! process share nothing.

use crate::batch::{BatchResult, BatcherStats, GroupedDispatcher, RequestBatcher};
use crate::cache::{
    CacheBackend, CacheConfig, CacheManager, CacheStats, MemoryCache, NullCache, QueryCache,
    QueryKind, ResponseCache,
};
use crate::config::EngineConfig;
use crate::cost::{CostStats, CostTracker};
use crate::generation::{GenerationBackend, OpenAiBackend, PromptBuilder};
use crate::runtime::{TaskScheduler, Trigger};
use crate::schedule::{
    RunOutcome, ScheduleDefinition, ScheduleRunner, ScheduleStatus, StaticTopics, TopicSource,
};
use crate::store::{ContentCounts, ContentFilter, ContentRecord, ContentStore, InMemoryStore};
use crate::types::{GeneratedResult, GenerationRequest};
use crate::Result;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const RESPONSE_SWEEP_TASK: &str = "response-cache-sweep";
const QUERY_SWEEP_TASK: &str = "query-cache-sweep";

/// Snapshot of every component's counters.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub cost: CostStats,
    pub batcher: BatcherStats,
    pub response_cache: CacheStats,
    pub query_cache: CacheStats,
    pub schedules: ScheduleStatus,
    /// Names of the recurring tasks currently registered.
    pub tasks: Vec<String>,
    pub backend: String,
    pub store: String,
}

/// Builder for [`ContentEngine`]. Every collaborator has a default derived
/// from the configuration.
pub struct EngineBuilder {
    config: EngineConfig,
    backend: Option<Arc<dyn GenerationBackend>>,
    store: Option<Arc<dyn ContentStore>>,
    topics: Option<Arc<dyn TopicSource>>,
    prompts: PromptBuilder,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            backend: None,
            store: None,
            topics: None,
            prompts: PromptBuilder::new(),
        }
    }

    /// Use a custom generation backend instead of the HTTP client.
    pub fn with_backend(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ContentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_topics(mut self, topics: Arc<dyn TopicSource>) -> Self {
        self.topics = Some(topics);
        self
    }

    pub fn with_prompt_builder(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn build(self) -> Result<ContentEngine> {
        let config = self.config;
        config.validate()?;

        let backend: Arc<dyn GenerationBackend> = match self.backend {
            Some(b) => b,
            None => Arc::new(OpenAiBackend::new(
                &config.backend.base_url,
                config.backend.model.clone(),
                config.backend.api_key(),
                config.backend.timeout(),
            )?),
        };
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryStore::new()) as Arc<dyn ContentStore>);
        let topics = self.topics.unwrap_or_else(|| {
            Arc::new(StaticTopics::new(config.topics.iter().cloned())) as Arc<dyn TopicSource>
        });

        let response_cache = Arc::new(ResponseCache::new(
            CacheManager::new(
                CacheConfig::new()
                    .with_enabled(config.cache.enabled)
                    .with_key_prefix("response"),
                cache_backend(config.cache.enabled, config.cache.max_entries),
            ),
            config.cache.ttls.clone(),
        ));
        let query_cache = Arc::new(QueryCache::new(
            CacheManager::new(
                CacheConfig::new()
                    .with_enabled(config.query_cache.enabled)
                    .with_key_prefix("query"),
                cache_backend(config.query_cache.enabled, config.query_cache.max_entries),
            ),
            config.query_cache.ttls.clone(),
        ));

        let cost = Arc::new(CostTracker::new(config.pricing.clone()));
        let dispatcher = Arc::new(
            GroupedDispatcher::new(backend, response_cache.clone(), cost.clone())
                .with_prompt_builder(self.prompts),
        );
        let batcher = Arc::new(RequestBatcher::new(config.batch.clone(), dispatcher));
        let scheduler = Arc::new(TaskScheduler::new());
        let runner = Arc::new(ScheduleRunner::new(
            store.clone(),
            batcher.clone(),
            query_cache.clone(),
            topics,
            scheduler.clone(),
        ));

        Ok(ContentEngine {
            config,
            scheduler,
            response_cache,
            query_cache,
            cost,
            batcher,
            store,
            runner,
            started: AtomicBool::new(false),
        })
    }
}

fn cache_backend(enabled: bool, max_entries: usize) -> Box<dyn CacheBackend> {
    if enabled {
        Box::new(MemoryCache::new(max_entries))
    } else {
        Box::new(NullCache::new())
    }
}

/// The batched generation engine.
pub struct ContentEngine {
    config: EngineConfig,
    scheduler: Arc<TaskScheduler>,
    response_cache: Arc<ResponseCache>,
    query_cache: Arc<QueryCache>,
    cost: Arc<CostTracker>,
    batcher: Arc<RequestBatcher>,
    store: Arc<dyn ContentStore>,
    runner: Arc<ScheduleRunner>,
    started: AtomicBool,
}

impl ContentEngine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Install the flush timer, the cache sweeps and every active schedule.
    /// Must run inside a tokio runtime. Returns the number of schedules
    /// installed; calling it again re-installs everything once.
    pub async fn start(&self) -> Result<usize> {
        self.batcher.install_timer(&self.scheduler);

        let cache = self.response_cache.clone();
        self.scheduler.schedule(
            RESPONSE_SWEEP_TASK,
            Trigger::Every(Duration::from_secs(self.config.cache.sweep_interval_secs)),
            move || {
                let cache = cache.clone();
                async move {
                    let removed = cache.sweep().await;
                    debug!(removed, "response cache swept");
                }
            },
        );
        let queries = self.query_cache.clone();
        self.scheduler.schedule(
            QUERY_SWEEP_TASK,
            Trigger::Every(Duration::from_secs(
                self.config.query_cache.sweep_interval_secs,
            )),
            move || {
                let queries = queries.clone();
                async move {
                    let removed = queries.sweep().await;
                    debug!(removed, "query cache swept");
                }
            },
        );

        let installed = self.runner.initialize(self.config.schedules.clone()).await?;
        self.started.store(true, Ordering::SeqCst);
        info!(
            installed,
            tasks = self.scheduler.len(),
            "content engine started"
        );
        Ok(installed)
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Queue a request; see [`RequestBatcher::enqueue`].
    pub async fn enqueue(&self, request: GenerationRequest) -> Result<String> {
        self.batcher.enqueue(request).await
    }

    /// Queue a request and wait for its result.
    pub async fn submit(&self, request: GenerationRequest) -> Result<GeneratedResult> {
        self.batcher.submit(request).await
    }

    /// Flush the pending queue now.
    pub async fn process_batch(&self) -> Option<BatchResult> {
        self.batcher.process_batch().await
    }

    pub async fn stats(&self) -> EngineStats {
        EngineStats {
            cost: self.cost.stats(),
            batcher: self.batcher.stats(),
            response_cache: self.response_cache.stats().await,
            query_cache: self.query_cache.stats().await,
            schedules: self.runner.status(),
            tasks: self.scheduler.names(),
            backend: self.batcher.backend_name().to_string(),
            store: self.store.name().to_string(),
        }
    }

    pub fn cost_stats(&self) -> CostStats {
        self.cost.stats()
    }

    pub fn reset_costs(&self) {
        self.cost.reset()
    }

    pub async fn clear_response_cache(&self) {
        self.response_cache.clear().await
    }

    pub async fn update_schedule(&self, definition: ScheduleDefinition) -> Result<()> {
        self.runner.update_schedule(definition).await
    }

    pub fn remove_schedule(&self, schedule_id: &str) -> bool {
        self.runner.remove_schedule(schedule_id)
    }

    pub async fn run_schedule_now(&self, schedule_id: &str) -> Result<RunOutcome> {
        self.runner.run_now(schedule_id).await
    }

    pub fn schedule_status(&self) -> ScheduleStatus {
        self.runner.status()
    }

    /// Content listing through the query cache.
    pub async fn list_content(&self, filter: &ContentFilter) -> Result<Vec<ContentRecord>> {
        let params = serde_json::to_value(filter)?;
        let store = self.store.clone();
        let filter = filter.clone();
        self.query_cache
            .get_or_load(QueryKind::ContentListing, &params, || async move {
                store.list_content(&filter).await
            })
            .await
    }

    /// Dashboard counts through the query cache.
    pub async fn content_counts(&self) -> Result<ContentCounts> {
        let store = self.store.clone();
        self.query_cache
            .get_or_load(
                QueryKind::DashboardStats,
                &serde_json::Value::Null,
                || async move { store.content_counts().await },
            )
            .await
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    /// Cancel every recurring task. Queued requests stay queued and can still
    /// be flushed with [`process_batch`](Self::process_batch).
    pub fn shutdown(&self) {
        self.runner.shutdown();
        self.scheduler.shutdown();
        self.started.store(false, Ordering::SeqCst);
        info!("content engine shut down");
    }
}
