//! In-memory content store.

use super::record::{ContentCounts, ContentFilter, ContentRecord, ContentStatus};
use super::ContentStore;
use crate::schedule::{RunStats, ScheduleDefinition};
use crate::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Tables {
    content: Vec<ContentRecord>,
    schedules: BTreeMap<String, ScheduleDefinition>,
}

/// Process-local [`ContentStore`]. Contents are lost on restart.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed schedule definitions, replacing any with the same id.
    pub fn with_schedules(self, schedules: impl IntoIterator<Item = ScheduleDefinition>) -> Self {
        if let Ok(mut tables) = self.tables.lock() {
            for def in schedules {
                tables.schedules.insert(def.id.clone(), def);
            }
        }
        self
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| {
            crate::Error::store_with_context(
                "in-memory store lock poisoned",
                crate::ErrorContext::new().with_source("memory"),
            )
        })
    }
}

#[async_trait]
impl ContentStore for InMemoryStore {
    async fn insert_content(&self, record: &ContentRecord) -> Result<()> {
        let mut tables = self.tables()?;
        if tables.content.iter().any(|r| r.id == record.id) {
            return Err(crate::Error::store_with_context(
                "duplicate content id",
                crate::ErrorContext::new()
                    .with_field_path("id")
                    .with_details(record.id.clone()),
            ));
        }
        tables.content.push(record.clone());
        Ok(())
    }

    async fn list_content(&self, filter: &ContentFilter) -> Result<Vec<ContentRecord>> {
        let tables = self.tables()?;
        // newest first; insertion order breaks ties
        let mut rows: Vec<ContentRecord> = tables
            .content
            .iter()
            .rev()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn content_counts(&self) -> Result<ContentCounts> {
        let tables = self.tables()?;
        let mut counts = ContentCounts::default();
        for record in &tables.content {
            counts.total += 1;
            match record.status {
                ContentStatus::Draft => counts.drafts += 1,
                ContentStatus::Published => counts.published += 1,
            }
        }
        Ok(counts)
    }

    async fn load_schedules(&self) -> Result<Vec<ScheduleDefinition>> {
        Ok(self.tables()?.schedules.values().cloned().collect())
    }

    async fn upsert_schedule(&self, definition: &ScheduleDefinition) -> Result<()> {
        self.tables()?
            .schedules
            .insert(definition.id.clone(), definition.clone());
        Ok(())
    }

    async fn record_schedule_run(&self, schedule_id: &str, stats: &RunStats) -> Result<()> {
        let mut tables = self.tables()?;
        match tables.schedules.get_mut(schedule_id) {
            Some(def) => {
                def.stats = stats.clone();
                Ok(())
            }
            None => Err(crate::Error::store_with_context(
                "unknown schedule",
                crate::ErrorContext::new()
                    .with_field_path("schedule_id")
                    .with_details(schedule_id.to_string()),
            )),
        }
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
