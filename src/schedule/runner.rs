//! Schedule runner: one recurring task per active schedule.

use super::definition::{RunOutcome, ScheduleDefinition, ScheduleState};
use super::topics::TopicSource;
use crate::batch::RequestBatcher;
use crate::cache::{QueryCache, QueryKind};
use crate::runtime::{TaskScheduler, Trigger};
use crate::store::{ContentRecord, ContentStatus, ContentStore};
use crate::types::GenerationRequest;
use crate::Result;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, error, info, warn};

/// Word count used when a schedule has no word range.
pub const DEFAULT_LENGTH: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleStatus {
    pub initialized: bool,
    pub active_schedules: Vec<String>,
    pub states: BTreeMap<String, ScheduleState>,
}

struct Slot {
    definition: ScheduleDefinition,
    state: ScheduleState,
}

/// Drives every [`ScheduleDefinition`] through
/// `Idle -> Triggered -> Running -> Idle`, with `Disabled` parked.
///
/// Each active schedule is a named task on the shared [`TaskScheduler`], so
/// installing a schedule twice replaces its timer instead of duplicating it.
pub struct ScheduleRunner {
    store: Arc<dyn ContentStore>,
    batcher: Arc<RequestBatcher>,
    query_cache: Arc<QueryCache>,
    topics: Arc<dyn TopicSource>,
    scheduler: Arc<TaskScheduler>,
    slots: Mutex<BTreeMap<String, Slot>>,
    initialized: AtomicBool,
}

fn task_name(schedule_id: &str) -> String {
    format!("schedule:{}", schedule_id)
}

impl ScheduleRunner {
    pub fn new(
        store: Arc<dyn ContentStore>,
        batcher: Arc<RequestBatcher>,
        query_cache: Arc<QueryCache>,
        topics: Arc<dyn TopicSource>,
        scheduler: Arc<TaskScheduler>,
    ) -> Self {
        Self {
            store,
            batcher,
            query_cache,
            topics,
            scheduler,
            slots: Mutex::new(BTreeMap::new()),
            initialized: AtomicBool::new(false),
        }
    }

    /// Persist `configured` schedules, then load every stored schedule and
    /// install the active ones. Stored run statistics survive a configured
    /// definition with the same id. Returns the number installed.
    pub async fn initialize(self: &Arc<Self>, configured: Vec<ScheduleDefinition>) -> Result<usize> {
        let stored: BTreeMap<String, ScheduleDefinition> = self
            .store
            .load_schedules()
            .await?
            .into_iter()
            .map(|d| (d.id.clone(), d))
            .collect();

        for mut def in configured {
            if let Some(existing) = stored.get(&def.id) {
                def.stats = existing.stats.clone();
            }
            self.store.upsert_schedule(&def).await?;
        }

        let mut installed = 0;
        for def in self.store.load_schedules().await? {
            if self.activate(def).await? {
                installed += 1;
            }
        }
        self.initialized.store(true, Ordering::SeqCst);
        info!(installed, "schedule runner initialized");
        Ok(installed)
    }

    /// Replace a schedule definition. The old timer is cancelled before the
    /// new one is installed; an inactive definition is parked as `Disabled`.
    pub async fn update_schedule(self: &Arc<Self>, mut definition: ScheduleDefinition) -> Result<()> {
        self.scheduler.cancel(&task_name(&definition.id));
        if let Some(current) = self.lock().get(&definition.id) {
            definition.stats = current.definition.stats.clone();
        }
        self.store.upsert_schedule(&definition).await?;
        self.activate(definition).await?;
        Ok(())
    }

    /// Stop and forget a schedule. The stored row is kept.
    pub fn remove_schedule(&self, schedule_id: &str) -> bool {
        let cancelled = self.scheduler.cancel(&task_name(schedule_id));
        let removed = self.lock().remove(schedule_id).is_some();
        if removed {
            info!(schedule_id, "schedule removed");
        }
        cancelled || removed
    }

    pub fn status(&self) -> ScheduleStatus {
        let slots = self.lock();
        ScheduleStatus {
            initialized: self.initialized.load(Ordering::SeqCst),
            active_schedules: slots
                .iter()
                .filter(|(_, s)| s.state != ScheduleState::Disabled)
                .map(|(id, _)| id.clone())
                .collect(),
            states: slots.iter().map(|(id, s)| (id.clone(), s.state)).collect(),
        }
    }

    pub fn definition(&self, schedule_id: &str) -> Option<ScheduleDefinition> {
        self.lock().get(schedule_id).map(|s| s.definition.clone())
    }

    /// Cancel every schedule timer.
    pub fn shutdown(&self) {
        let ids: Vec<String> = self.lock().keys().cloned().collect();
        for id in &ids {
            self.scheduler.cancel(&task_name(id));
        }
        self.initialized.store(false, Ordering::SeqCst);
        info!(schedules = ids.len(), "schedule runner shut down");
    }

    /// Run a schedule once, outside its timer. The generation request is
    /// flushed immediately rather than waiting for a batch trigger.
    ///
    /// The schedule returns to `Idle` even when this future is dropped
    /// mid-run; run statistics are only recorded for runs that finish.
    pub async fn run_now(&self, schedule_id: &str) -> Result<RunOutcome> {
        let definition = self.begin_run(schedule_id)?;
        let _running = RunningGuard {
            runner: self,
            schedule_id,
        };
        let started_at = Utc::now();

        let outcome = match self.produce(&definition, started_at).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(schedule_id, error = %e, "scheduled run failed");
                RunOutcome::Failed
            }
        };

        self.finish_run(&definition, outcome, started_at).await;
        Ok(outcome)
    }

    /// Record `definition`, install its timer when active. Returns whether a
    /// timer was installed.
    async fn activate(self: &Arc<Self>, mut definition: ScheduleDefinition) -> Result<bool> {
        let id = definition.id.clone();
        if !definition.active {
            self.scheduler.cancel(&task_name(&id));
            self.lock().insert(
                id.clone(),
                Slot {
                    definition,
                    state: ScheduleState::Disabled,
                },
            );
            debug!(schedule_id = %id, "schedule disabled");
            return Ok(false);
        }

        let cron = definition.recurrence.resolve();
        definition.stats.next_run_at = cron.next_after(Utc::now());
        self.store
            .record_schedule_run(&id, &definition.stats)
            .await?;
        self.lock().insert(
            id.clone(),
            Slot {
                definition: definition.clone(),
                state: ScheduleState::Idle,
            },
        );

        let weak: Weak<Self> = Arc::downgrade(self);
        let job_id = id.clone();
        self.scheduler.schedule(task_name(&id), Trigger::Cron(cron), move || {
            let weak = weak.clone();
            let id = job_id.clone();
            async move {
                if let Some(runner) = weak.upgrade() {
                    runner.set_state(&id, ScheduleState::Triggered);
                    if let Err(e) = runner.run_now(&id).await {
                        warn!(schedule_id = %id, error = %e, "scheduled run skipped");
                    }
                }
            }
        });
        info!(
            schedule_id = %id,
            rule = %definition.recurrence,
            next_run = ?definition.stats.next_run_at,
            "schedule installed"
        );
        Ok(true)
    }

    fn begin_run(&self, schedule_id: &str) -> Result<ScheduleDefinition> {
        let mut slots = self.lock();
        let slot = slots.get_mut(schedule_id).ok_or_else(|| {
            crate::Error::runtime_with_context(
                "unknown schedule",
                crate::ErrorContext::new()
                    .with_field_path("schedule_id")
                    .with_details(schedule_id.to_string()),
            )
        })?;
        match slot.state {
            ScheduleState::Running => Err(crate::Error::runtime_with_context(
                "schedule is already running",
                crate::ErrorContext::new().with_details(schedule_id.to_string()),
            )),
            ScheduleState::Disabled => Err(crate::Error::runtime_with_context(
                "schedule is disabled",
                crate::ErrorContext::new().with_details(schedule_id.to_string()),
            )),
            _ => {
                slot.state = ScheduleState::Running;
                Ok(slot.definition.clone())
            }
        }
    }

    /// Generate and persist one post. A fallback result is a failed run and
    /// is not persisted.
    async fn produce(&self, def: &ScheduleDefinition, now: DateTime<Utc>) -> Result<RunOutcome> {
        let topic = match pick_own_topic(def) {
            Some(t) => t,
            None => self.topics.pick(&def.id).await.ok_or_else(|| {
                crate::Error::runtime_with_context(
                    "no topic available",
                    crate::ErrorContext::new().with_source(def.id.clone()),
                )
            })?,
        };
        let request = build_request(def, topic);
        info!(schedule_id = %def.id, request_id = %request.id, topic = %request.topic, "scheduled run started");

        let result = self.batcher.submit_now(request.clone()).await?;
        if let Some(reason) = result.fallback_reason() {
            warn!(schedule_id = %def.id, reason, "generation fell back; nothing persisted");
            return Ok(RunOutcome::Failed);
        }

        let status = if def.publish.publishes_directly() {
            ContentStatus::Published
        } else {
            ContentStatus::Draft
        };
        let record = ContentRecord::from_result(&request, &result, status, now)
            .with_category(pick_category(def))
            .with_schedule(def.id.clone());
        self.store.insert_content(&record).await?;
        info!(schedule_id = %def.id, slug = %record.slug, %status, "content persisted");

        Ok(match status {
            ContentStatus::Published => RunOutcome::Published,
            ContentStatus::Draft => RunOutcome::Drafted,
        })
    }

    async fn finish_run(&self, def: &ScheduleDefinition, outcome: RunOutcome, at: DateTime<Utc>) {
        let stats = {
            let mut slots = self.lock();
            let mut stats = slots
                .get(&def.id)
                .map(|s| s.definition.stats.clone())
                .unwrap_or_else(|| def.stats.clone());
            stats.apply(outcome, at);
            stats.next_run_at = def.recurrence.resolve().next_after(Utc::now());
            if let Some(slot) = slots.get_mut(&def.id) {
                slot.definition.stats = stats.clone();
                if slot.state == ScheduleState::Running {
                    slot.state = ScheduleState::Idle;
                }
            }
            stats
        };

        if let Err(e) = self.store.record_schedule_run(&def.id, &stats).await {
            error!(schedule_id = %def.id, error = %e, "failed to persist run statistics");
        }
        if outcome != RunOutcome::Failed {
            self.query_cache.invalidate_kind(QueryKind::ContentListing).await;
            self.query_cache.invalidate_kind(QueryKind::DashboardStats).await;
        }
        info!(
            schedule_id = %def.id,
            ?outcome,
            runs = stats.runs_attempted,
            next_run = ?stats.next_run_at,
            "scheduled run finished"
        );
    }

    fn set_state(&self, schedule_id: &str, state: ScheduleState) {
        if let Some(slot) = self.lock().get_mut(schedule_id) {
            if slot.state == ScheduleState::Idle {
                slot.state = state;
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Slot>> {
        match self.slots.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Puts a schedule left in `Running` (or `Triggered`) back to `Idle`.
struct RunningGuard<'a> {
    runner: &'a ScheduleRunner,
    schedule_id: &'a str,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        if let Some(slot) = self.runner.lock().get_mut(self.schedule_id) {
            if matches!(slot.state, ScheduleState::Running | ScheduleState::Triggered) {
                warn!(schedule_id = self.schedule_id, "scheduled run abandoned before finishing");
                slot.state = ScheduleState::Idle;
            }
        }
    }
}

fn pick_own_topic(def: &ScheduleDefinition) -> Option<String> {
    def.defaults
        .topics
        .choose(&mut rand::thread_rng())
        .cloned()
}

fn pick_category(def: &ScheduleDefinition) -> Option<String> {
    def.defaults
        .preferred_categories
        .choose(&mut rand::thread_rng())
        .cloned()
}

/// Request from the schedule defaults, length uniform in the word range.
fn build_request(def: &ScheduleDefinition, topic: String) -> GenerationRequest {
    let d = &def.defaults;
    let length = match d.word_range {
        Some(range) => {
            let (lo, hi) = (range.min.min(range.max), range.min.max(range.max));
            rand::thread_rng().gen_range(lo..=hi).max(1)
        }
        None => DEFAULT_LENGTH,
    };
    GenerationRequest::new(d.kind, topic)
        .with_keywords(d.keywords.iter().cloned())
        .with_tone(d.tone.clone())
        .with_audience(d.audience.clone())
        .with_length(length)
}
