use crate::Result;
use reqwest::{Proxy, StatusCode};
use std::env;
use std::time::Duration;
use url::Url;

/// Thin JSON-over-HTTP client with bearer auth and pooled connections.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/')).map_err(|e| {
            crate::Error::configuration_with_context(
                format!("invalid backend url '{}': {}", base_url, e),
                crate::ErrorContext::new().with_field_path("backend.base_url"),
            )
        })?;

        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(
                env::var("CONTENT_FORGE_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(8),
            )
            .pool_idle_timeout(Some(Duration::from_secs(90)));

        if let Ok(proxy_url) = env::var("CONTENT_FORGE_PROXY_URL") {
            if let Ok(proxy) = Proxy::all(&proxy_url) {
                builder = builder.proxy(proxy);
            }
        }

        let client = builder
            .build()
            .map_err(|e| crate::Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// POST `body` to `path` and return the status with the parsed JSON body.
    /// Non-2xx statuses are returned, not raised; callers classify them.
    pub async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<(StatusCode, serde_json::Value)> {
        let mut request = self.client.post(self.endpoint(path)).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| crate::Error::Transport(TransportError::Http(e)))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| crate::Error::Transport(TransportError::Http(e)))?;
        // error bodies are not always JSON
        let json = serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text));
        Ok((status, json))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_base_url() {
        let err = HttpTransport::new("not a url", None, Duration::from_secs(5))
            .err()
            .unwrap();
        assert!(matches!(err, crate::Error::Configuration { .. }));
    }

    #[test]
    fn test_endpoint_joins_paths() {
        let t = HttpTransport::new("https://api.example.com/v1/", None, Duration::from_secs(5))
            .unwrap();
        assert_eq!(
            t.endpoint("/chat/completions"),
            "https://api.example.com/v1/chat/completions"
        );
    }
}
