//! Cache manager.

use super::backend::CacheBackend;
use super::key::Fingerprint;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub default_ttl: Duration,
    pub enabled: bool,
    pub max_entry_size: usize,
    pub key_prefix: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(3600),
            enabled: true,
            max_entry_size: 10 * 1024 * 1024,
            key_prefix: None,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub errors: u64,
    pub evictions: u64,
    pub purged: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
    purged: AtomicU64,
}

impl AtomicStats {
    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            evictions: 0,
            purged: self.purged.load(Ordering::Relaxed),
            entries: 0,
        }
    }
}

/// Typed, fail-open front for a [`CacheBackend`].
///
/// Nothing here returns an error: a cache is never the source of truth, so
/// backend or (de)serialization failures are counted, logged at debug level
/// and reported as a miss.
pub struct CacheManager {
    config: CacheConfig,
    backend: Box<dyn CacheBackend>,
    stats: Arc<AtomicStats>,
}

impl CacheManager {
    pub fn new(config: CacheConfig, backend: Box<dyn CacheBackend>) -> Self {
        Self {
            config,
            backend,
            stats: Arc::new(AtomicStats::default()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &Fingerprint) -> Option<T> {
        if !self.config.enabled {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        let storage_key = self.storage_key(key);
        match self.backend.get(&storage_key).await {
            Ok(Some(data)) => match serde_json::from_slice(&data) {
                Ok(val) => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %key.short(), backend = self.backend.name(), "cache hit");
                    Some(val)
                }
                Err(e) => {
                    self.stats.errors.fetch_add(1, Ordering::Relaxed);
                    self.stats.misses.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %key.short(), error = %e, "cached payload undecodable; treating as miss");
                    None
                }
            },
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key.short(), error = %e, "cache read failed; treating as miss");
                None
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &Fingerprint, value: &T) {
        self.set_with_ttl(key, value, self.config.default_ttl).await
    }

    pub async fn set_with_ttl<T: Serialize>(&self, key: &Fingerprint, value: &T, ttl: Duration) {
        if !self.config.enabled || ttl.is_zero() {
            return;
        }
        let data = match serde_json::to_vec(value) {
            Ok(d) => d,
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key.short(), error = %e, "cache payload unserializable; skipped");
                return;
            }
        };
        if data.len() > self.config.max_entry_size {
            debug!(key = %key.short(), size = data.len(), "cache payload too large; skipped");
            return;
        }
        let storage_key = self.storage_key(key);
        match self.backend.set(&storage_key, &data, ttl).await {
            Ok(()) => {
                self.stats.sets.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key.short(), error = %e, "cache write failed");
            }
        }
    }

    pub async fn delete(&self, key: &Fingerprint) -> bool {
        let storage_key = self.storage_key(key);
        match self.backend.delete(&storage_key).await {
            Ok(d) => {
                if d {
                    self.stats.deletes.fetch_add(1, Ordering::Relaxed);
                }
                d
            }
            Err(_) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Remove every entry stored under `namespace`.
    pub async fn delete_namespace(&self, namespace: &str) -> usize {
        let prefix = match self.config.key_prefix {
            Some(ref p) => format!("{}:{}:", p, namespace),
            None => format!("{}:", namespace),
        };
        match self.backend.delete_prefix(&prefix).await {
            Ok(n) => {
                self.stats.deletes.fetch_add(n as u64, Ordering::Relaxed);
                n
            }
            Err(_) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                0
            }
        }
    }

    pub async fn clear(&self) {
        if self.backend.clear().await.is_err() {
            self.stats.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Sweep expired entries. Called by the recurring sweep task.
    pub async fn purge_expired(&self) -> usize {
        match self.backend.purge_expired().await {
            Ok(n) => {
                self.stats.purged.fetch_add(n as u64, Ordering::Relaxed);
                n
            }
            Err(_) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                0
            }
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let mut stats = self.stats.to_stats();
        stats.evictions = self.backend.evictions();
        stats.entries = self.backend.len().await.unwrap_or(0);
        stats
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    fn storage_key(&self, key: &Fingerprint) -> String {
        if let Some(ref p) = self.config.key_prefix {
            format!("{}:{}", p, key.storage_key())
        } else {
            key.storage_key()
        }
    }
}
