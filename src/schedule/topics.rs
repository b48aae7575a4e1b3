//! Topic selection for scheduled runs.

use async_trait::async_trait;
use rand::seq::SliceRandom;

/// Used when neither the schedule nor the configured pool has topics.
pub const BUILTIN_TOPICS: [&str; 5] = [
    "DeFi Yield Farming Strategies",
    "NFT Market Analysis",
    "Layer 2 Solutions Comparison",
    "Crypto Tax Planning Guide",
    "Blockchain Security Best Practices",
];

#[async_trait]
pub trait TopicSource: Send + Sync {
    /// Pick a topic for the next run of `schedule_id`.
    async fn pick(&self, schedule_id: &str) -> Option<String>;
}

/// Uniform choice from a fixed pool.
#[derive(Debug, Clone, Default)]
pub struct StaticTopics {
    pool: Vec<String>,
}

impl StaticTopics {
    pub fn new<I, S>(pool: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pool: pool
                .into_iter()
                .map(Into::into)
                .filter(|t: &String| !t.trim().is_empty())
                .collect(),
        }
    }

    pub fn builtin() -> Self {
        Self::new(BUILTIN_TOPICS)
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn choose(&self) -> Option<String> {
        self.pool.choose(&mut rand::thread_rng()).cloned()
    }
}

#[async_trait]
impl TopicSource for StaticTopics {
    async fn pick(&self, _schedule_id: &str) -> Option<String> {
        if self.pool.is_empty() {
            return BUILTIN_TOPICS
                .choose(&mut rand::thread_rng())
                .map(|t| t.to_string());
        }
        self.choose()
    }
}
