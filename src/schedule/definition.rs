//! Schedule definitions and their run statistics.

use super::recurrence::Recurrence;
use crate::types::ContentKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Inclusive word-count range for generated posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WordRange {
    pub min: u32,
    pub max: u32,
}

impl Default for WordRange {
    fn default() -> Self {
        Self { min: 800, max: 1200 }
    }
}

/// Parameters every generated request of a schedule starts from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationDefaults {
    pub kind: ContentKind,
    pub tone: String,
    pub audience: String,
    /// `None` means a fixed 1000 words.
    pub word_range: Option<WordRange>,
    pub keywords: Vec<String>,
    pub preferred_categories: Vec<String>,
    /// Schedule-specific topic pool; empty uses the engine's topic source.
    pub topics: Vec<String>,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            kind: ContentKind::LongForm,
            tone: "professional".to_string(),
            audience: "general".to_string(),
            word_range: Some(WordRange::default()),
            keywords: Vec::new(),
            preferred_categories: Vec::new(),
            topics: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishPolicy {
    pub auto_publish: bool,
    pub requires_approval: bool,
}

impl PublishPolicy {
    /// Content is published directly only when auto-publishing without an
    /// approval step.
    pub fn publishes_directly(&self) -> bool {
        self.auto_publish && !self.requires_approval
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunStats {
    pub runs_attempted: u64,
    pub runs_failed: u64,
    pub posts_generated: u64,
    pub posts_published: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
}

/// Outcome of one run, applied to [`RunStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Published,
    Drafted,
    Failed,
}

impl RunStats {
    pub fn apply(&mut self, outcome: RunOutcome, at: DateTime<Utc>) {
        self.runs_attempted += 1;
        self.last_run_at = Some(at);
        match outcome {
            RunOutcome::Published => {
                self.posts_generated += 1;
                self.posts_published += 1;
            }
            RunOutcome::Drafted => self.posts_generated += 1,
            RunOutcome::Failed => self.runs_failed += 1,
        }
    }
}

/// A named recurring content job, edited by an operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDefinition {
    pub id: String,
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub recurrence: Recurrence,
    #[serde(default)]
    pub defaults: GenerationDefaults,
    #[serde(default)]
    pub publish: PublishPolicy,
    #[serde(default)]
    pub stats: RunStats,
}

fn default_active() -> bool {
    true
}

impl ScheduleDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>, recurrence: Recurrence) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            active: true,
            recurrence,
            defaults: GenerationDefaults::default(),
            publish: PublishPolicy::default(),
            stats: RunStats::default(),
        }
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn with_defaults(mut self, defaults: GenerationDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_publish(mut self, auto_publish: bool, requires_approval: bool) -> Self {
        self.publish = PublishPolicy {
            auto_publish,
            requires_approval,
        };
        self
    }
}

/// Lifecycle of one schedule inside the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleState {
    Idle,
    Triggered,
    Running,
    Disabled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_policy() {
        assert!(PublishPolicy { auto_publish: true, requires_approval: false }.publishes_directly());
        assert!(!PublishPolicy { auto_publish: true, requires_approval: true }.publishes_directly());
        assert!(!PublishPolicy { auto_publish: false, requires_approval: false }.publishes_directly());
    }

    #[test]
    fn test_run_stats_apply() {
        let mut stats = RunStats::default();
        let now = Utc::now();
        stats.apply(RunOutcome::Published, now);
        stats.apply(RunOutcome::Drafted, now);
        stats.apply(RunOutcome::Failed, now);
        assert_eq!(stats.runs_attempted, 3);
        assert_eq!(stats.runs_failed, 1);
        assert_eq!(stats.posts_generated, 2);
        assert_eq!(stats.posts_published, 1);
        assert_eq!(stats.last_run_at, Some(now));
    }

    #[test]
    fn test_definition_from_yaml_uses_defaults() {
        let def: ScheduleDefinition = serde_yaml::from_str(
            "id: weekly-defi\nname: Weekly DeFi\nrecurrence: weekly\npublish:\n  auto_publish: true\n",
        )
        .unwrap();
        assert!(def.active);
        assert_eq!(def.recurrence, Recurrence::Weekly);
        assert_eq!(def.defaults.word_range, Some(WordRange { min: 800, max: 1200 }));
        assert!(def.publish.publishes_directly());
    }
}
