//! 调度模块：按周期规则自动生成并持久化内容。
//!
//! # Schedule Module
//!
//! Operator-defined schedules periodically turn their default parameters
//! into a generation request, push it through the batcher and persist the
//! result as a draft or published post.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ScheduleDefinition`] | Name, activation, recurrence, defaults, publish policy, stats |
//! | [`Recurrence`] | `daily`, `weekly`, `bi-weekly`, `monthly` or a raw cron expression |
//! | [`CronExpression`] | Five-field cron rule resolved to UTC timestamps |
//! | [`ScheduleRunner`] | Installs one timer per active schedule and executes runs |
//! | [`TopicSource`] | Picks the topic of the next run |
//!
//! ## Example
//!
//! ```rust
//! use content_forge::schedule::Recurrence;
//! use chrono::{TimeZone, Utc};
//!
//! let cron = Recurrence::from("weekly").resolve();
//! let after = Utc.with_ymd_and_hms(2024, 3, 6, 12, 0, 0).unwrap(); // a Wednesday
//! let next = cron.next_after(after).unwrap();
//! assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 11, 9, 0, 0).unwrap());
//! ```

mod cron;
mod definition;
mod recurrence;
mod runner;
mod topics;

pub use cron::CronExpression;
pub use definition::{
    GenerationDefaults, PublishPolicy, RunOutcome, RunStats, ScheduleDefinition, ScheduleState,
    WordRange,
};
pub use recurrence::{Recurrence, BI_WEEKLY, DAILY, MONTHLY, WEEKLY};
pub use runner::{ScheduleRunner, ScheduleStatus, DEFAULT_LENGTH};
pub use topics::{StaticTopics, TopicSource, BUILTIN_TOPICS};
