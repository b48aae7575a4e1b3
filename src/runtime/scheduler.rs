//! Named recurring tasks.

use crate::schedule::CronExpression;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// When a recurring task fires.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    /// Fixed period; the first run happens one period after registration.
    Every(Duration),
    /// Wall-clock cron expression, evaluated in UTC.
    Cron(CronExpression),
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Every(d) => write!(f, "every {:?}", d),
            Trigger::Cron(c) => write!(f, "cron '{}'", c),
        }
    }
}

/// UTC time that advances with the tokio clock, so cron tasks follow paused
/// and advanced time in tests.
struct WallClock {
    wall: DateTime<Utc>,
    start: tokio::time::Instant,
}

impl WallClock {
    fn start() -> Self {
        Self {
            wall: Utc::now(),
            start: tokio::time::Instant::now(),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.start.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.wall + elapsed
    }
}

struct TaskHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
    trigger: Trigger,
}

/// Registry of named recurring tasks.
///
/// At most one task exists per name: registering a name that is already
/// taken cancels the previous task first. A task awaits its job before
/// waiting for the next tick, so one task never overlaps itself.
pub struct TaskScheduler {
    root: CancellationToken,
    tasks: Mutex<HashMap<String, TaskHandle>>,
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Register `job` under `name`. Must be called within a tokio runtime.
    pub fn schedule<F, Fut>(&self, name: impl Into<String>, trigger: Trigger, job: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let token = self.root.child_token();
        let task_token = token.clone();
        let task_name = name.clone();
        let task_trigger = trigger.clone();

        let mut tasks = self.lock();
        if let Some(previous) = tasks.remove(&name) {
            previous.token.cancel();
            debug!(task = %name, "replaced recurring task");
        }

        let handle = tokio::spawn(async move {
            match task_trigger {
                Trigger::Every(period) => {
                    let start = tokio::time::Instant::now() + period;
                    let mut interval = tokio::time::interval_at(start, period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        tokio::select! {
                            _ = task_token.cancelled() => break,
                            _ = interval.tick() => job().await,
                        }
                    }
                }
                Trigger::Cron(cron) => {
                    let clock = WallClock::start();
                    let mut fired: Option<DateTime<Utc>> = None;
                    loop {
                        let now = clock.now();
                        // never fire the same slot twice
                        let from = fired.map_or(now, |f| f.max(now));
                        let Some(next) = cron.next_after(from) else {
                            info!(task = %task_name, "cron expression has no future runs; stopping");
                            break;
                        };
                        let delay = (next - now).to_std().unwrap_or(Duration::ZERO);
                        tokio::select! {
                            _ = task_token.cancelled() => break,
                            _ = tokio::time::sleep(delay) => {
                                fired = Some(next);
                                job().await;
                            }
                        }
                    }
                }
            }
            debug!(task = %task_name, "recurring task stopped");
        });

        tasks.insert(
            name,
            TaskHandle {
                token,
                handle,
                trigger,
            },
        );
    }

    /// Stop the task registered under `name`. Returns whether one existed.
    pub fn cancel(&self, name: &str) -> bool {
        match self.lock().remove(name) {
            Some(task) => {
                task.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, name: &str) -> bool {
        self.lock()
            .get(name)
            .map(|t| !t.handle.is_finished())
            .unwrap_or(false)
    }

    pub fn trigger_of(&self, name: &str) -> Option<Trigger> {
        self.lock().get(name).map(|t| t.trigger.clone())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancel every task. A job that is mid-run finishes its current run.
    pub fn shutdown(&self) {
        self.root.cancel();
        let drained: Vec<String> = self.lock().drain().map(|(name, _)| name).collect();
        info!(tasks = drained.len(), "task scheduler shut down");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, TaskHandle>> {
        // the map holds no invariant a panicking holder could break
        match self.tasks.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_job(counter: &Arc<AtomicUsize>) -> impl Fn() -> futures::future::Ready<()> + Send + Sync + 'static {
        let counter = counter.clone();
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_fires_after_each_period() {
        let scheduler = TaskScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        scheduler.schedule("tick", Trigger::Every(Duration::from_secs(5)), counting_job(&count));

        tokio::time::sleep(Duration::from_millis(4900)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reregistering_replaces_the_task() {
        let scheduler = TaskScheduler::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        scheduler.schedule("job", Trigger::Every(Duration::from_secs(1)), counting_job(&first));
        scheduler.schedule("job", Trigger::Every(Duration::from_secs(1)), counting_job(&second));
        assert_eq!(scheduler.len(), 1);

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cron_fires_once_per_slot() {
        let scheduler = TaskScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let cron = CronExpression::parse("* * * * *").unwrap();
        let now = Utc::now();
        let first = (cron.next_after(now).unwrap() - now).to_std().unwrap();
        scheduler.schedule("minutely", Trigger::Cron(cron.clone()), counting_job(&count));
        scheduler.schedule("minutely", Trigger::Cron(cron), counting_job(&count));

        tokio::time::sleep(first + Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
        scheduler.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_and_shutdown() {
        let scheduler = TaskScheduler::new();
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        scheduler.schedule("a", Trigger::Every(Duration::from_secs(1)), counting_job(&a));
        scheduler.schedule("b", Trigger::Every(Duration::from_secs(1)), counting_job(&b));
        assert_eq!(scheduler.names(), vec!["a".to_string(), "b".to_string()]);

        assert!(scheduler.cancel("a"));
        assert!(!scheduler.cancel("a"));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(a.load(Ordering::SeqCst), 0);
        assert_eq!(b.load(Ordering::SeqCst), 1);

        scheduler.shutdown();
        assert!(scheduler.is_empty());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_job_never_overlaps_itself() {
        let scheduler = TaskScheduler::new();
        let running = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let (r, m) = (running.clone(), max_seen.clone());
        scheduler.schedule("slow", Trigger::Every(Duration::from_secs(1)), move || {
            let (r, m) = (r.clone(), m.clone());
            async move {
                let now = r.fetch_add(1, Ordering::SeqCst) + 1;
                m.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(3)).await;
                r.fetch_sub(1, Ordering::SeqCst);
            }
        });
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }
}
