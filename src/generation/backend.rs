//! Generation backend seam.

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Everything a backend needs for one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    /// Output token budget.
    pub max_tokens: u32,
    pub temperature: f32,
    /// Ask the backend for a JSON object response when it supports it.
    pub json_response: bool,
}

impl Prompt {
    /// System and user text together, for token estimation.
    pub fn full_text(&self) -> String {
        format!("{}\n{}", self.system, self.user)
    }
}

/// An external text generator.
///
/// Any error returned here is turned into a fallback result by the
/// dispatcher; implementations should not retry internally.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, prompt: &Prompt) -> Result<String>;

    fn name(&self) -> &str;
}
