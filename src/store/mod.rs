//! 存储模块：内容记录与调度定义的持久化接口。
//!
//! # Store Module
//!
//! The engine consumes a handful of relational operations; everything else
//! about the schema belongs to the surrounding application.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ContentStore`] | Trait for the relational store |
//! | [`InMemoryStore`] | Default, process-local implementation |
//! | `PostgresStore` | `sqlx` implementation (feature `postgres`) |
//! | [`ContentRecord`] | A persisted piece of content |

mod memory;
#[cfg(feature = "postgres")]
mod postgres;
mod record;

pub use memory::InMemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;
pub use record::{slugify, ContentCounts, ContentFilter, ContentRecord, ContentStatus};

use crate::schedule::{RunStats, ScheduleDefinition};
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn insert_content(&self, record: &ContentRecord) -> Result<()>;

    /// Newest first.
    async fn list_content(&self, filter: &ContentFilter) -> Result<Vec<ContentRecord>>;

    async fn content_counts(&self) -> Result<ContentCounts>;

    /// Every stored schedule, active or not.
    async fn load_schedules(&self) -> Result<Vec<ScheduleDefinition>>;

    async fn upsert_schedule(&self, definition: &ScheduleDefinition) -> Result<()>;

    /// Overwrite the run statistics of an existing schedule.
    async fn record_schedule_run(&self, schedule_id: &str, stats: &RunStats) -> Result<()>;

    fn name(&self) -> &'static str;
}
