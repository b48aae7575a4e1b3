//! OpenAI-compatible chat-completions backend.

use super::backend::{GenerationBackend, Prompt};
use crate::transport::HttpTransport;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

pub struct OpenAiBackend {
    transport: HttpTransport,
    model: String,
}

impl OpenAiBackend {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            transport: HttpTransport::new(base_url, api_key, timeout)?,
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, prompt: &Prompt) -> serde_json::Value {
        let mut body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user},
            ],
            "max_tokens": prompt.max_tokens,
            "temperature": prompt.temperature,
        });
        if prompt.json_response {
            body["response_format"] = json!({"type": "json_object"});
        }
        body
    }
}

/// Quota and server-side failures may clear up; auth and request errors won't.
fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn error_message(body: &serde_json::Value) -> String {
    body.pointer("/error/message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| match body {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let (status, body) = self
            .transport
            .post_json("/chat/completions", &self.request_body(prompt))
            .await?;

        if !status.is_success() {
            return Err(Error::backend(
                format!("{} returned {}: {}", self.model, status, error_message(&body)),
                is_retryable_status(status),
            ));
        }

        let content = body
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .unwrap_or_default()
            .to_string();
        if content.trim().is_empty() {
            return Err(Error::backend(
                format!("{} returned an empty completion", self.model),
                true,
            ));
        }
        debug!(
            model = %self.model,
            chars = content.len(),
            "completion received"
        );
        Ok(content)
    }

    fn name(&self) -> &str {
        "openai"
    }
}
