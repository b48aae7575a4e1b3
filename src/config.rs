//! Engine configuration.
//!
//! Every section has defaults, so an empty YAML document is a valid
//! configuration. Environment variables override file values:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `CONTENT_FORGE_MAX_BATCH_SIZE` | `batch.max_batch_size` |
//! | `CONTENT_FORGE_BATCH_INTERVAL_MS` | `batch.flush_interval_ms` |
//! | `CONTENT_FORGE_CACHE_MAX_ENTRIES` | `cache.max_entries` |
//! | `CONTENT_FORGE_CACHE_SWEEP_SECS` | `cache.sweep_interval_secs` |
//! | `CONTENT_FORGE_BACKEND_URL` | `backend.base_url` |
//! | `CONTENT_FORGE_MODEL` | `backend.model` |
//! | `CONTENT_FORGE_HTTP_TIMEOUT_SECS` | `backend.timeout_secs` |
//!
//! The API key itself is never stored in the file; it is read from the
//! variable named by `backend.api_key_env`.

use crate::batch::BatchConfig;
use crate::cache::{QueryTtls, ResponseTtls};
use crate::schedule::ScheduleDefinition;
use crate::tokens::ModelPricing;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub enabled: bool,
    pub max_entries: usize,
    pub sweep_interval_secs: u64,
    pub ttls: ResponseTtls,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 1000,
            // ten minutes
            sweep_interval_secs: 600,
            ttls: ResponseTtls::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryCacheSection {
    pub enabled: bool,
    pub max_entries: usize,
    pub sweep_interval_secs: u64,
    pub ttls: QueryTtls,
}

impl Default for QueryCacheSection {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 500,
            sweep_interval_secs: 600,
            ttls: QueryTtls::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            timeout_secs: 60,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub batch: BatchConfig,
    pub cache: CacheSection,
    pub query_cache: QueryCacheSection,
    pub backend: BackendConfig,
    pub pricing: ModelPricing,
    /// Fallback topic pool for schedules without their own topics.
    pub topics: Vec<String>,
    pub schedules: Vec<ScheduleDefinition>,
}

impl EngineConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read config file: {}", e),
                ErrorContext::new().with_source(path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&text)
    }

    /// Apply `CONTENT_FORGE_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any variable lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = parsed(&lookup, "CONTENT_FORGE_MAX_BATCH_SIZE")? {
            self.batch.max_batch_size = v;
        }
        if let Some(v) = parsed(&lookup, "CONTENT_FORGE_BATCH_INTERVAL_MS")? {
            self.batch.flush_interval_ms = v;
        }
        if let Some(v) = parsed(&lookup, "CONTENT_FORGE_CACHE_MAX_ENTRIES")? {
            self.cache.max_entries = v;
        }
        if let Some(v) = parsed(&lookup, "CONTENT_FORGE_CACHE_SWEEP_SECS")? {
            self.cache.sweep_interval_secs = v;
        }
        if let Some(v) = lookup("CONTENT_FORGE_BACKEND_URL") {
            self.backend.base_url = v;
        }
        if let Some(v) = lookup("CONTENT_FORGE_MODEL") {
            if let Some(pricing) = ModelPricing::for_model(&v) {
                self.pricing = pricing;
            }
            self.backend.model = v;
        }
        if let Some(v) = parsed(&lookup, "CONTENT_FORGE_HTTP_TIMEOUT_SECS")? {
            self.backend.timeout_secs = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch.max_batch_size == 0 {
            return Err(invalid("batch.max_batch_size", "must be at least 1"));
        }
        if self.batch.flush_interval_ms == 0 {
            return Err(invalid("batch.flush_interval_ms", "must be greater than 0"));
        }
        if self.cache.sweep_interval_secs == 0 {
            return Err(invalid("cache.sweep_interval_secs", "must be greater than 0"));
        }
        if self.query_cache.sweep_interval_secs == 0 {
            return Err(invalid(
                "query_cache.sweep_interval_secs",
                "must be greater than 0",
            ));
        }
        url::Url::parse(&self.backend.base_url)
            .map_err(|e| invalid("backend.base_url", &e.to_string()))?;
        if self.backend.timeout_secs == 0 {
            return Err(invalid("backend.timeout_secs", "must be greater than 0"));
        }

        let mut seen = std::collections::HashSet::new();
        for (i, schedule) in self.schedules.iter().enumerate() {
            if schedule.id.trim().is_empty() {
                return Err(invalid(&format!("schedules[{}].id", i), "must not be empty"));
            }
            if !seen.insert(schedule.id.as_str()) {
                return Err(invalid(
                    &format!("schedules[{}].id", i),
                    &format!("duplicate schedule id '{}'", schedule.id),
                ));
            }
            if let Some(range) = schedule.defaults.word_range {
                if range.min > range.max {
                    return Err(invalid(
                        &format!("schedules[{}].defaults.word_range", i),
                        &format!("min {} exceeds max {}", range.min, range.max),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid value '{}': {}", raw, e),
                ErrorContext::new().with_field_path(name).with_source("env"),
            )
        }),
    }
}

fn invalid(field: &str, details: &str) -> Error {
    Error::configuration_with_context(
        format!("invalid {}", field),
        ErrorContext::new()
            .with_field_path(field)
            .with_details(details)
            .with_source("config"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Recurrence;
    use std::collections::HashMap;

    #[test]
    fn test_empty_yaml_is_default() {
        let config = EngineConfig::from_yaml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.batch.max_batch_size, 10);
        assert_eq!(config.batch.flush_interval_ms, 5000);
        assert_eq!(config.cache.sweep_interval_secs, 600);
        assert_eq!(config.pricing.input_cost_per_1k, 0.005);
        config.validate().unwrap();
    }

    #[test]
    fn test_yaml_sections() {
        let yaml = r#"
batch:
  max_batch_size: 4
cache:
  ttls:
    optimization_secs: 60
backend:
  model: gpt-4o-mini
topics: ["Restaking", "MEV"]
schedules:
  - id: daily-defi
    name: Daily DeFi
    recurrence: daily
    defaults:
      word_range: { min: 500, max: 700 }
      preferred_categories: [DeFi]
    publish:
      auto_publish: false
      requires_approval: true
"#;
        let config = EngineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.batch.max_batch_size, 4);
        assert_eq!(config.batch.flush_interval_ms, 5000);
        assert_eq!(config.cache.ttls.optimization_secs, 60);
        assert_eq!(config.cache.ttls.long_form_secs, 1800);
        assert_eq!(config.topics.len(), 2);
        assert_eq!(config.schedules[0].recurrence, Recurrence::Daily);
        assert!(!config.schedules[0].publish.publishes_directly());
        config.validate().unwrap();
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("CONTENT_FORGE_MAX_BATCH_SIZE", "25"),
            ("CONTENT_FORGE_BATCH_INTERVAL_MS", "750"),
            ("CONTENT_FORGE_MODEL", "gpt-4o-mini"),
            ("CONTENT_FORGE_BACKEND_URL", "http://localhost:8080/v1"),
        ]
        .into_iter()
        .collect();
        let mut config = EngineConfig::default();
        config
            .apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.batch.max_batch_size, 25);
        assert_eq!(config.batch.flush_interval_ms, 750);
        assert_eq!(config.backend.model, "gpt-4o-mini");
        assert_eq!(config.pricing.model, "gpt-4o-mini");
        assert_eq!(config.backend.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_bad_override_names_the_variable() {
        let mut config = EngineConfig::default();
        let err = config
            .apply_overrides(|k| (k == "CONTENT_FORGE_MAX_BATCH_SIZE").then(|| "ten".to_string()))
            .unwrap_err();
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("CONTENT_FORGE_MAX_BATCH_SIZE")
        );
    }

    #[test]
    fn test_validation_failures() {
        let mut config = EngineConfig::default();
        config.batch.max_batch_size = 0;
        assert!(matches!(config.validate(), Err(Error::Configuration { .. })));

        let mut config = EngineConfig::default();
        let mut def = ScheduleDefinition::new("a", "A", Recurrence::Daily);
        def.defaults.word_range = Some(crate::schedule::WordRange { min: 900, max: 100 });
        config.schedules.push(def);
        let err = config.validate().unwrap_err();
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("schedules[0].defaults.word_range")
        );

        let mut config = EngineConfig::default();
        config.backend.base_url = "not a url".into();
        assert!(config.validate().is_err());
    }
}
