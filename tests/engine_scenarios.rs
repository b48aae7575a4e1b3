//! End-to-end engine behavior with an in-process backend.

use async_trait::async_trait;
use content_forge::generation::{GenerationBackend, Prompt, PromptBuilder};
use content_forge::schedule::{
    GenerationDefaults, Recurrence, RunOutcome, ScheduleDefinition, ScheduleState, WordRange,
};
use content_forge::store::{ContentFilter, ContentStatus, ContentStore, InMemoryStore};
use content_forge::types::{ContentKind, GenerationRequest};
use content_forge::{ContentEngine, EngineConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

const POST: &str = "# A Practical Guide\n\nThis guide explains the topic in plain words. It covers the basics first.\n\n## Getting started\n\nRead the overview. Then try a small example on your own.";

/// Answers every prompt with a short post; fails prompts mentioning "explode".
struct ScriptedBackend {
    calls: AtomicUsize,
}

impl ScriptedBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate(&self, prompt: &Prompt) -> content_forge::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if prompt.user.contains("explode") {
            return Err(content_forge::Error::backend("connection reset", true));
        }
        Ok(POST.to_string())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Blocks every call until the test releases it.
struct GatedBackend {
    entered: Notify,
    release: Semaphore,
    calls: AtomicUsize,
}

#[async_trait]
impl GenerationBackend for GatedBackend {
    async fn generate(&self, _prompt: &Prompt) -> content_forge::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        let permit = self
            .release
            .acquire()
            .await
            .map_err(|e| content_forge::Error::backend(e.to_string(), false))?;
        permit.forget();
        Ok(POST.to_string())
    }

    fn name(&self) -> &str {
        "gated"
    }
}

fn engine_with(backend: Arc<dyn GenerationBackend>, config: EngineConfig) -> ContentEngine {
    ContentEngine::builder(config)
        .with_backend(backend)
        .build()
        .unwrap()
}

fn long_form(topic: &str) -> GenerationRequest {
    GenerationRequest::new(ContentKind::LongForm, topic).with_keywords(["guide"])
}

#[tokio::test]
async fn scenario_a_long_form_generation() {
    let engine = engine_with(ScriptedBackend::new(), EngineConfig::default());
    engine.enqueue(long_form("X")).await.unwrap();
    let batch = engine.process_batch().await.unwrap();

    let result = &batch.results[0];
    assert!(!result.text.is_empty());
    assert!(result.analysis.word_count > 0);
    assert!(result.estimated_cost.value > 0.0);
    assert!(!result.is_fallback());
}

#[tokio::test]
async fn scenario_b_repeat_within_ttl_is_free() {
    let engine = engine_with(ScriptedBackend::new(), EngineConfig::default());

    engine.enqueue(long_form("X")).await.unwrap();
    let first = engine.process_batch().await.unwrap();
    let before = engine.cost_stats();

    engine.enqueue(long_form("x ")).await.unwrap();
    let second = engine.process_batch().await.unwrap();
    let after = engine.cost_stats();

    assert!(first.results[0].estimated_cost.value > 0.0);
    assert_eq!(second.results[0].estimated_cost.value, 0.0);
    assert!(second.results[0].is_cached());
    assert_eq!(after.cached_requests, before.cached_requests + 1);
    assert_eq!(
        second.optimization_savings.value,
        first.results[0].estimated_cost.value
    );
}

#[tokio::test]
async fn scenario_c_approval_required_persists_draft() {
    let store = Arc::new(InMemoryStore::new());
    let engine = ContentEngine::builder(EngineConfig::default())
        .with_backend(ScriptedBackend::new())
        .with_store(store.clone())
        .build()
        .unwrap();

    let mut defaults = GenerationDefaults::default();
    defaults.topics = vec!["Validator Economics".into()];
    defaults.preferred_categories = vec!["Staking".into()];
    let schedule = ScheduleDefinition::new("daily-staking", "Daily staking", Recurrence::Daily)
        .with_defaults(defaults)
        .with_publish(false, true);
    engine.update_schedule(schedule).await.unwrap();

    let outcome = engine.run_schedule_now("daily-staking").await.unwrap();
    assert_eq!(outcome, RunOutcome::Drafted);

    let records = engine.list_content(&ContentFilter::new()).await.unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.status, ContentStatus::Draft);
    assert!(record.published_at.is_none());
    assert_eq!(record.title, "A Practical Guide");
    assert_eq!(record.slug, "a-practical-guide");
    assert_eq!(record.headings, vec!["Getting started".to_string()]);
    assert_eq!(record.category.as_deref(), Some("Staking"));
    assert_eq!(record.schedule_id.as_deref(), Some("daily-staking"));

    let length = record.request["length"].as_u64().unwrap();
    assert!((800..=1200).contains(&length));

    let stats = engine.store().load_schedules().await.unwrap()[0].stats.clone();
    assert_eq!(stats.runs_attempted, 1);
    assert_eq!(stats.posts_generated, 1);
    assert_eq!(stats.posts_published, 0);
    assert!(stats.next_run_at.is_some());
    engine.shutdown();
}

#[tokio::test]
async fn scenario_d_failure_is_isolated_to_its_item() {
    let engine = engine_with(ScriptedBackend::new(), EngineConfig::default());
    let topics = ["alpha", "explode", "gamma"];
    for topic in topics {
        engine.enqueue(long_form(topic)).await.unwrap();
    }
    let batch = engine.process_batch().await.unwrap();

    assert_eq!(batch.len(), topics.len());
    assert!(!batch.results[0].is_fallback());
    assert!(batch.results[1].is_fallback());
    assert!(batch.results[1].text.contains("temporarily unavailable"));
    assert!(!batch.results[2].is_fallback());
    assert_eq!(batch.fallbacks, 1);
}

#[tokio::test]
async fn batch_of_exactly_max_size_flushes_immediately() {
    let backend = ScriptedBackend::new();
    let engine = engine_with(backend.clone(), EngineConfig::default());
    for i in 0..10 {
        engine.enqueue(long_form(&format!("topic {i}"))).await.unwrap();
    }
    let stats = engine.stats().await;
    assert_eq!(stats.batcher.size_flushes, 1);
    assert_eq!(stats.batcher.last_batch_size, 10);
    assert_eq!(stats.batcher.queue_size, 0);
    assert_eq!(backend.calls(), 10);
}

#[tokio::test]
async fn batch_below_max_size_waits() {
    let backend = ScriptedBackend::new();
    let engine = engine_with(backend.clone(), EngineConfig::default());
    for i in 0..9 {
        engine.enqueue(long_form(&format!("topic {i}"))).await.unwrap();
    }
    let stats = engine.stats().await;
    assert_eq!(stats.batcher.size_flushes, 0);
    assert_eq!(stats.batcher.queue_size, 9);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn timer_flushes_a_partial_batch() {
    let mut config = EngineConfig::default();
    config.batch.flush_interval_ms = 50;
    let backend = ScriptedBackend::new();
    let engine = engine_with(backend.clone(), config);
    engine.start().await.unwrap();

    let result = engine.submit(long_form("timer")).await.unwrap();
    assert!(!result.is_fallback());
    let stats = engine.stats().await;
    assert_eq!(stats.batcher.timer_flushes, 1);
    assert_eq!(stats.batcher.last_batch_size, 1);
    engine.shutdown();
}

#[tokio::test]
async fn at_most_one_flush_runs_at_a_time() {
    let backend = Arc::new(GatedBackend {
        entered: Notify::new(),
        release: Semaphore::new(0),
        calls: AtomicUsize::new(0),
    });
    let mut config = EngineConfig::default();
    config.batch.max_batch_size = 2;
    let engine = Arc::new(engine_with(backend.clone(), config));

    engine.enqueue(long_form("one")).await.unwrap();
    let first_flush = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.enqueue(long_form("two")).await })
    };
    backend.entered.notified().await;
    assert!(engine.stats().await.batcher.flush_in_progress);

    // both triggers arrive while the first flush is still running
    assert!(engine.process_batch().await.is_none());
    engine.enqueue(long_form("three")).await.unwrap();
    engine.enqueue(long_form("four")).await.unwrap();
    let stats = engine.stats().await;
    assert_eq!(stats.batcher.size_flushes, 1);
    assert_eq!(stats.batcher.manual_flushes, 0);
    assert_eq!(stats.batcher.queue_size, 2);

    backend.release.add_permits(16);
    first_flush.await.unwrap().unwrap();
    assert_eq!(backend.calls.load(Ordering::SeqCst), 2);

    let second = engine.process_batch().await.unwrap();
    assert_eq!(second.len(), 2);
    let stats = engine.stats().await;
    assert_eq!(stats.batcher.manual_flushes, 1);
    assert!(!stats.batcher.flush_in_progress);
}

#[tokio::test(start_paused = true)]
async fn timer_tick_during_size_flush_is_skipped() {
    let backend = Arc::new(GatedBackend {
        entered: Notify::new(),
        release: Semaphore::new(0),
        calls: AtomicUsize::new(0),
    });
    let mut config = EngineConfig::default();
    config.batch.max_batch_size = 2;
    let engine = Arc::new(engine_with(backend.clone(), config));
    engine.start().await.unwrap();

    engine.enqueue(long_form("one")).await.unwrap();
    let size_flush = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.enqueue(long_form("two")).await })
    };
    backend.entered.notified().await;
    engine.enqueue(long_form("three")).await.unwrap();

    // the 5s timer fires while the size flush holds the gate
    tokio::time::sleep(Duration::from_secs(6)).await;
    let stats = engine.stats().await.batcher;
    assert_eq!(stats.size_flushes, 1);
    assert_eq!(stats.timer_flushes, 0);
    assert_eq!(stats.queue_size, 1);
    assert!(stats.flush_in_progress);

    backend.release.add_permits(16);
    size_flush.await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;
    let stats = engine.stats().await.batcher;
    assert_eq!(stats.timer_flushes, 1);
    assert_eq!(stats.last_batch_size, 1);
    assert_eq!(stats.queue_size, 0);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    engine.shutdown();
}

#[tokio::test]
async fn cost_counters_are_monotonic() {
    let engine = engine_with(ScriptedBackend::new(), EngineConfig::default());
    let topics = ["a", "b", "a", "c", "b"];
    let mut last_cost = 0.0;
    for topic in topics {
        engine.enqueue(long_form(topic)).await.unwrap();
        engine.process_batch().await.unwrap();
        let cost = engine.cost_stats().estimated_cost.value;
        assert!(cost >= last_cost);
        last_cost = cost;
    }
    let stats = engine.cost_stats();
    assert_eq!(stats.total_requests, 5);
    assert_eq!(stats.cached_requests, 2);
    assert!((stats.cache_hit_ratio - 0.4).abs() < 1e-9);

    engine.reset_costs();
    assert_eq!(engine.cost_stats().total_requests, 0);
}

#[tokio::test(start_paused = true)]
async fn cached_result_expires_after_ttl() {
    let backend = ScriptedBackend::new();
    let engine = engine_with(backend.clone(), EngineConfig::default());

    engine.enqueue(long_form("ttl")).await.unwrap();
    engine.process_batch().await.unwrap();

    tokio::time::advance(Duration::from_secs(1799)).await;
    engine.enqueue(long_form("ttl")).await.unwrap();
    assert_eq!(engine.process_batch().await.unwrap().cache_hits, 1);

    tokio::time::advance(Duration::from_secs(1)).await;
    engine.enqueue(long_form("ttl")).await.unwrap();
    assert_eq!(engine.process_batch().await.unwrap().cache_hits, 0);
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn scheduled_fallback_counts_as_failed_run() {
    let engine = engine_with(ScriptedBackend::new(), EngineConfig::default());

    let mut defaults = GenerationDefaults::default();
    defaults.topics = vec!["explode".into()];
    defaults.word_range = Some(WordRange { min: 500, max: 500 });
    engine
        .update_schedule(
            ScheduleDefinition::new("broken", "Broken", Recurrence::Weekly)
                .with_defaults(defaults)
                .with_publish(true, false),
        )
        .await
        .unwrap();

    assert_eq!(
        engine.run_schedule_now("broken").await.unwrap(),
        RunOutcome::Failed
    );
    assert!(engine.list_content(&ContentFilter::new()).await.unwrap().is_empty());

    let status = engine.schedule_status();
    assert_eq!(status.states.get("broken"), Some(&ScheduleState::Idle));
    let stats = engine.store().load_schedules().await.unwrap()[0].stats.clone();
    assert_eq!((stats.runs_attempted, stats.runs_failed), (1, 1));
    engine.shutdown();
}

#[tokio::test]
async fn auto_publish_persists_published_and_refreshes_listing() {
    let mut config = EngineConfig::default();
    config.topics = vec!["Liquid Staking".into()];
    let engine = engine_with(ScriptedBackend::new(), config);

    // prime the listing cache
    assert!(engine.list_content(&ContentFilter::new()).await.unwrap().is_empty());
    assert_eq!(engine.content_counts().await.unwrap().total, 0);

    engine
        .update_schedule(
            ScheduleDefinition::new("auto", "Auto", Recurrence::Monthly).with_publish(true, false),
        )
        .await
        .unwrap();
    assert_eq!(
        engine.run_schedule_now("auto").await.unwrap(),
        RunOutcome::Published
    );

    let records = engine.list_content(&ContentFilter::new()).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, ContentStatus::Published);
    assert!(records[0].published_at.is_some());
    assert_eq!(engine.content_counts().await.unwrap().published, 1);
    engine.shutdown();
}

#[tokio::test]
async fn schedule_updates_never_duplicate_and_deactivation_parks() {
    let engine = engine_with(ScriptedBackend::new(), EngineConfig::default());
    let def = ScheduleDefinition::new("s1", "S1", Recurrence::Daily);

    engine.update_schedule(def.clone()).await.unwrap();
    engine
        .update_schedule(def.clone().with_active(true))
        .await
        .unwrap();
    let status = engine.schedule_status();
    assert_eq!(status.active_schedules, vec!["s1".to_string()]);
    assert_eq!(status.states.len(), 1);
    assert_eq!(engine.stats().await.tasks, vec!["schedule:s1".to_string()]);

    engine.update_schedule(def.with_active(false)).await.unwrap();
    assert!(engine.stats().await.tasks.is_empty());
    let status = engine.schedule_status();
    assert!(status.active_schedules.is_empty());
    assert_eq!(status.states.get("s1"), Some(&ScheduleState::Disabled));
    assert!(engine.run_schedule_now("s1").await.is_err());

    assert!(engine.remove_schedule("s1"));
    assert!(engine.schedule_status().states.is_empty());
    // the stored row is kept
    assert_eq!(engine.store().load_schedules().await.unwrap().len(), 1);
}

#[tokio::test]
async fn start_installs_configured_schedules() {
    let mut config = EngineConfig::default();
    config.schedules = vec![
        ScheduleDefinition::new("on", "On", Recurrence::from("0 6 * * 1-5")),
        ScheduleDefinition::new("off", "Off", Recurrence::Weekly).with_active(false),
        ScheduleDefinition::new("bad", "Bad", Recurrence::from("every full moon")),
    ];
    let engine = engine_with(ScriptedBackend::new(), config);

    let installed = engine.start().await.unwrap();
    assert_eq!(installed, 2);
    let status = engine.schedule_status();
    assert!(status.initialized);
    assert_eq!(status.active_schedules, vec!["bad".to_string(), "on".to_string()]);
    assert_eq!(status.states.get("off"), Some(&ScheduleState::Disabled));

    engine.shutdown();
    assert!(!engine.schedule_status().initialized);
}

#[tokio::test]
async fn run_now_completes_with_default_batch_size_before_start() {
    let engine = engine_with(ScriptedBackend::new(), EngineConfig::default());
    let mut defaults = GenerationDefaults::default();
    defaults.topics = vec!["X".into()];
    engine
        .update_schedule(
            ScheduleDefinition::new("s", "S", Recurrence::Daily).with_defaults(defaults),
        )
        .await
        .unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(3), engine.run_schedule_now("s"))
        .await
        .expect("run finishes without a flush timer")
        .unwrap();
    assert_eq!(outcome, RunOutcome::Drafted);
    assert_eq!(
        engine.schedule_status().states.get("s"),
        Some(&ScheduleState::Idle)
    );
    let stats = engine.stats().await.batcher;
    assert_eq!(stats.manual_flushes, 1);
    assert_eq!(stats.queue_size, 0);
    engine.shutdown();
}

#[tokio::test]
async fn abandoned_run_returns_schedule_to_idle() {
    let backend = Arc::new(GatedBackend {
        entered: Notify::new(),
        release: Semaphore::new(0),
        calls: AtomicUsize::new(0),
    });
    let engine = engine_with(backend.clone(), EngineConfig::default());
    let mut defaults = GenerationDefaults::default();
    defaults.topics = vec!["X".into()];
    engine
        .update_schedule(
            ScheduleDefinition::new("s", "S", Recurrence::Daily).with_defaults(defaults),
        )
        .await
        .unwrap();

    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), engine.run_schedule_now("s")).await;
    assert!(abandoned.is_err());
    assert_eq!(
        engine.schedule_status().states.get("s"),
        Some(&ScheduleState::Idle)
    );
    assert!(!engine.stats().await.batcher.flush_in_progress);

    backend.release.add_permits(16);
    assert_eq!(
        engine.run_schedule_now("s").await.unwrap(),
        RunOutcome::Drafted
    );
    let stats = engine.store().load_schedules().await.unwrap()[0].stats.clone();
    assert_eq!(stats.runs_attempted, 1);
    engine.shutdown();
}

#[tokio::test(start_paused = true)]
async fn edited_schedule_fires_once_per_slot() {
    let engine = engine_with(ScriptedBackend::new(), EngineConfig::default());
    let mut defaults = GenerationDefaults::default();
    defaults.topics = vec!["Minutely".into()];
    let def = ScheduleDefinition::new("m", "Minutely", Recurrence::from("* * * * *"))
        .with_defaults(defaults);

    let now = chrono::Utc::now();
    let first = (def.recurrence.resolve().next_after(now).unwrap() - now)
        .to_std()
        .unwrap();
    engine.update_schedule(def.clone()).await.unwrap();
    let mut edited = def;
    edited.name = "Minutely (edited)".into();
    engine.update_schedule(edited).await.unwrap();

    tokio::time::sleep(first + Duration::from_secs(1)).await;
    let runs = engine.store().load_schedules().await.unwrap()[0].stats.runs_attempted;
    assert_eq!(runs, 1);

    tokio::time::sleep(Duration::from_secs(60)).await;
    let runs = engine.store().load_schedules().await.unwrap()[0].stats.runs_attempted;
    assert_eq!(runs, 2);
    assert_eq!(
        engine.list_content(&ContentFilter::new()).await.unwrap().len(),
        2
    );
    engine.shutdown();
}

/// Keeps every system prompt it receives.
struct RecordingBackend {
    systems: std::sync::Mutex<Vec<String>>,
}

#[async_trait]
impl GenerationBackend for RecordingBackend {
    async fn generate(&self, prompt: &Prompt) -> content_forge::Result<String> {
        self.systems.lock().unwrap().push(prompt.system.clone());
        Ok(POST.to_string())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

#[tokio::test]
async fn brand_context_reaches_every_prompt() {
    let backend = Arc::new(RecordingBackend {
        systems: std::sync::Mutex::new(Vec::new()),
    });
    let engine = ContentEngine::builder(EngineConfig::default())
        .with_backend(backend.clone())
        .with_prompt_builder(PromptBuilder::new().with_brand_context("Always cite the docs."))
        .build()
        .unwrap();

    engine.enqueue(long_form("one")).await.unwrap();
    engine
        .enqueue(GenerationRequest::new(ContentKind::Outline, "two"))
        .await
        .unwrap();
    engine.process_batch().await.unwrap();

    let systems = backend.systems.lock().unwrap();
    assert_eq!(systems.len(), 2);
    assert!(systems.iter().all(|s| s.ends_with("Always cite the docs.")));
}
