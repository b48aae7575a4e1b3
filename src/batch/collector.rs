//! Pending queue.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Queue length that triggers an immediate flush.
    pub max_batch_size: usize,
    /// Period of the flush timer.
    pub flush_interval_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 10,
            flush_interval_ms: 5000,
        }
    }
}

impl BatchConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_max_batch_size(mut self, s: usize) -> Self {
        self.max_batch_size = s;
        self
    }
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval_ms = interval.as_millis() as u64;
        self
    }
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

#[derive(Debug)]
pub struct BatchItem<T> {
    pub data: T,
    pub added_at: Instant,
    pub request_id: String,
}

impl<T> BatchItem<T> {
    pub fn new(request_id: impl Into<String>, data: T) -> Self {
        Self {
            data,
            added_at: Instant::now(),
            request_id: request_id.into(),
        }
    }
}

/// FIFO queue of pending items. Every operation takes the lock once, so a
/// push and a take never interleave.
pub struct BatchCollector<T> {
    max_batch_size: usize,
    items: Mutex<VecDeque<BatchItem<T>>>,
}

impl<T> BatchCollector<T> {
    pub fn new(max_batch_size: usize) -> Self {
        Self {
            max_batch_size: max_batch_size.max(1),
            items: Mutex::new(VecDeque::new()),
        }
    }

    pub fn add(&self, item: BatchItem<T>) -> BatchAddResult {
        let mut items = self.lock();
        items.push_back(item);
        let count = items.len();
        if count >= self.max_batch_size {
            BatchAddResult::ShouldFlush { count }
        } else {
            BatchAddResult::Added { count }
        }
    }

    /// Remove up to `max` items from the front.
    pub fn take(&self, max: usize) -> Vec<BatchItem<T>> {
        let mut items = self.lock();
        let n = max.min(items.len());
        items.drain(..n).collect()
    }

    /// How long the oldest pending item has been waiting.
    pub fn oldest_wait(&self) -> Option<Duration> {
        self.lock().front().map(|i| i.added_at.elapsed())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn clear(&self) -> Vec<BatchItem<T>> {
        self.lock().drain(..).collect()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<BatchItem<T>>> {
        // a push or drain either happened or it did not; the deque stays valid
        match self.items.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchAddResult {
    Added { count: usize },
    ShouldFlush { count: usize },
}

impl BatchAddResult {
    pub fn should_flush(&self) -> bool {
        matches!(self, BatchAddResult::ShouldFlush { .. })
    }
    pub fn count(&self) -> usize {
        match self {
            BatchAddResult::Added { count } | BatchAddResult::ShouldFlush { count } => *count,
        }
    }
}
