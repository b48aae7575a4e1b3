//! Request batcher with size and timer flush triggers.

use super::collector::{BatchCollector, BatchConfig, BatchItem};
use super::dispatcher::{BatchResult, GroupedDispatcher};
use crate::runtime::{TaskScheduler, Trigger};
use crate::types::{GeneratedResult, GenerationRequest};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{oneshot, Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tracing::{debug, info};

/// Name of the recurring flush task on the [`TaskScheduler`].
pub const FLUSH_TASK: &str = "batch-flush";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushReason {
    /// The queue reached `max_batch_size` during an enqueue.
    Size,
    /// The flush timer fired with a non-empty queue.
    Timer,
    /// An operator or caller asked for it.
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatcherStats {
    pub queue_size: usize,
    /// How long the oldest queued request has been waiting.
    pub oldest_wait_ms: Option<u64>,
    pub flush_in_progress: bool,
    pub size_flushes: u64,
    pub timer_flushes: u64,
    pub manual_flushes: u64,
    pub last_batch_size: usize,
    pub total_enqueued: u64,
    pub max_batch_size: usize,
    pub flush_interval_ms: u64,
}

struct Pending {
    request: GenerationRequest,
    reply: Option<oneshot::Sender<GeneratedResult>>,
}

#[derive(Default)]
struct FlushCounters {
    size: AtomicU64,
    timer: AtomicU64,
    manual: AtomicU64,
    last_batch_size: AtomicU64,
    enqueued: AtomicU64,
}

/// Clears the in-progress flag when a flush ends, including when the
/// flushing future is dropped.
struct InProgress<'a>(&'a AtomicBool);

impl<'a> InProgress<'a> {
    fn set(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Queues generation requests and hands them to the dispatcher in batches.
///
/// At most one flush runs at a time: size, timer and manual triggers take
/// the flush gate with `try_lock` and are a no-op when it is held. Items left
/// behind stay queued for the next trigger. [`submit_now`](Self::submit_now)
/// is the one caller that waits for the gate instead.
pub struct RequestBatcher {
    config: BatchConfig,
    queue: BatchCollector<Pending>,
    dispatcher: Arc<GroupedDispatcher>,
    flush_gate: AsyncMutex<()>,
    in_progress: AtomicBool,
    counters: FlushCounters,
}

impl RequestBatcher {
    pub fn new(config: BatchConfig, dispatcher: Arc<GroupedDispatcher>) -> Self {
        Self {
            queue: BatchCollector::new(config.max_batch_size),
            config,
            dispatcher,
            flush_gate: AsyncMutex::new(()),
            in_progress: AtomicBool::new(false),
            counters: FlushCounters::default(),
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Queue `request` and return its id. When the queue reaches the batch
    /// size, the flush runs before this returns.
    pub async fn enqueue(&self, request: GenerationRequest) -> Result<String> {
        let id = request.id.clone();
        self.push(request, None).await?;
        Ok(id)
    }

    /// Queue `request` and wait for the flush that processes it.
    pub async fn submit(&self, request: GenerationRequest) -> Result<GeneratedResult> {
        let id = request.id.clone();
        let (tx, rx) = oneshot::channel();
        self.push(request, Some(tx)).await?;
        rx.await.map_err(|_| {
            crate::Error::runtime_with_context(
                "request dropped before it was processed",
                crate::ErrorContext::new()
                    .with_source("batcher")
                    .with_details(id),
            )
        })
    }

    async fn push(
        &self,
        request: GenerationRequest,
        reply: Option<oneshot::Sender<GeneratedResult>>,
    ) -> Result<()> {
        request.validate()?;
        let id = request.id.clone();
        let added = self
            .queue
            .add(BatchItem::new(id.clone(), Pending { request, reply }));
        self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        debug!(request_id = %id, queue_size = added.count(), "request enqueued");
        if added.should_flush() {
            self.flush(FlushReason::Size).await;
        }
        Ok(())
    }

    /// Flush now. Same rules as the automatic triggers.
    pub async fn process_batch(&self) -> Option<BatchResult> {
        self.flush(FlushReason::Manual).await
    }

    /// Take up to `max_batch_size` items and process them. Returns `None`
    /// without touching the queue when another flush holds the gate or the
    /// queue is empty.
    pub async fn flush(&self, reason: FlushReason) -> Option<BatchResult> {
        let gate = match self.flush_gate.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!(?reason, "flush already in progress; skipped");
                return None;
            }
        };
        self.flush_locked(gate, reason).await
    }

    async fn flush_locked(
        &self,
        _gate: AsyncMutexGuard<'_, ()>,
        reason: FlushReason,
    ) -> Option<BatchResult> {
        let items = self.queue.take(self.config.max_batch_size);
        if items.is_empty() {
            return None;
        }
        let _in_progress = InProgress::set(&self.in_progress);

        let (requests, replies): (Vec<_>, Vec<_>) = items
            .into_iter()
            .map(|item| (item.data.request, item.data.reply))
            .unzip();
        info!(batch_size = requests.len(), ?reason, "flushing batch");
        self.counters
            .last_batch_size
            .store(requests.len() as u64, Ordering::Relaxed);
        let by_reason = match reason {
            FlushReason::Size => &self.counters.size,
            FlushReason::Timer => &self.counters.timer,
            FlushReason::Manual => &self.counters.manual,
        };
        by_reason.fetch_add(1, Ordering::Relaxed);

        let batch = self.dispatcher.process(&requests).await;

        for (reply, result) in replies.into_iter().zip(batch.results.iter()) {
            if let Some(tx) = reply {
                // a submitter that stopped waiting is not an error
                let _ = tx.send(result.clone());
            }
        }
        Some(batch)
    }

    /// Queue `request` and flush without waiting for a size or timer
    /// trigger. A flush already running is waited for, not skipped, so this
    /// also works when no timer is installed.
    pub async fn submit_now(&self, request: GenerationRequest) -> Result<GeneratedResult> {
        let id = request.id.clone();
        let (tx, mut rx) = oneshot::channel();
        self.push(request, Some(tx)).await?;
        loop {
            tokio::select! {
                biased;
                reply = &mut rx => {
                    return reply.map_err(|_| {
                        crate::Error::runtime_with_context(
                            "request dropped before it was processed",
                            crate::ErrorContext::new()
                                .with_source("batcher")
                                .with_details(id.clone()),
                        )
                    });
                }
                _ = async {
                    let gate = self.flush_gate.lock().await;
                    self.flush_locked(gate, FlushReason::Manual).await
                } => {}
            }
        }
    }

    /// Register the recurring timer flush. Replaces any earlier registration.
    pub fn install_timer(self: &Arc<Self>, scheduler: &TaskScheduler) {
        let weak: Weak<Self> = Arc::downgrade(self);
        scheduler.schedule(
            FLUSH_TASK,
            Trigger::Every(self.config.flush_interval()),
            move || {
                let weak = weak.clone();
                async move {
                    if let Some(batcher) = weak.upgrade() {
                        if !batcher.queue.is_empty() {
                            batcher.flush(FlushReason::Timer).await;
                        }
                    }
                }
            },
        );
    }

    pub fn backend_name(&self) -> &str {
        self.dispatcher.backend_name()
    }

    pub fn queue_size(&self) -> usize {
        self.queue.len()
    }

    pub fn stats(&self) -> BatcherStats {
        BatcherStats {
            queue_size: self.queue.len(),
            oldest_wait_ms: self.queue.oldest_wait().map(|d| d.as_millis() as u64),
            flush_in_progress: self.in_progress.load(Ordering::SeqCst),
            size_flushes: self.counters.size.load(Ordering::Relaxed),
            timer_flushes: self.counters.timer.load(Ordering::Relaxed),
            manual_flushes: self.counters.manual.load(Ordering::Relaxed),
            last_batch_size: self.counters.last_batch_size.load(Ordering::Relaxed) as usize,
            total_enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            max_batch_size: self.config.max_batch_size,
            flush_interval_ms: self.config.flush_interval_ms,
        }
    }
}

impl Drop for RequestBatcher {
    fn drop(&mut self) {
        let left = self.queue.clear();
        if !left.is_empty() {
            debug!(dropped = left.len(), "batcher dropped with queued requests");
        }
    }
}
