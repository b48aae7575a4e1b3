//! Cache backend implementations.

use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone)]
struct CacheEntry {
    data: Vec<u8>,
    created_at: Instant,
    ttl: Duration,
    last_accessed: Instant,
}

impl CacheEntry {
    fn new(data: Vec<u8>, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            data,
            created_at: now,
            ttl,
            last_accessed: now,
        }
    }
    fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= self.ttl
    }
}

/// Storage behind a [`CacheManager`](super::CacheManager).
///
/// Keys are already-prefixed storage keys. Errors are reported, but the
/// manager above treats every error as a miss.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<bool>;
    /// Remove every key starting with `prefix`; returns how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize>;
    async fn clear(&self) -> Result<()>;
    async fn len(&self) -> Result<usize>;
    /// Drop expired entries; returns how many were removed.
    async fn purge_expired(&self) -> Result<usize>;
    fn evictions(&self) -> u64 {
        0
    }
    fn name(&self) -> &'static str;
}

fn poisoned() -> Error {
    Error::runtime_with_context(
        "cache lock poisoned",
        ErrorContext::new().with_source("memory_cache"),
    )
}

/// In-memory cache with TTL expiry and least-recently-used eviction.
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    max_entries: usize,
    evictions: AtomicU64,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            max_entries: max_entries.max(1),
            evictions: AtomicU64::new(0),
        }
    }

    fn evict_if_needed(&self, entries: &mut HashMap<String, CacheEntry>) {
        let now = Instant::now();
        entries.retain(|_, e| !e.is_expired_at(now));
        while entries.len() >= self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.last_accessed)
                .map(|(k, _)| k.clone());
            if let Some(k) = oldest {
                entries.remove(&k);
                self.evictions.fetch_add(1, Ordering::Relaxed);
            } else {
                break;
            }
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let now = Instant::now();
        if let Some(entry) = entries.get_mut(key) {
            if entry.is_expired_at(now) {
                entries.remove(key);
                return Ok(None);
            }
            entry.last_accessed = now;
            return Ok(Some(entry.data.clone()));
        }
        Ok(None)
    }
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        if !entries.contains_key(key) {
            self.evict_if_needed(&mut entries);
        }
        entries.insert(key.to_string(), CacheEntry::new(value.to_vec(), ttl));
        Ok(())
    }
    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self
            .entries
            .write()
            .map_err(|_| poisoned())?
            .remove(key)
            .is_some())
    }
    async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        Ok(before - entries.len())
    }
    async fn clear(&self) -> Result<()> {
        self.entries.write().map_err(|_| poisoned())?.clear();
        Ok(())
    }
    async fn len(&self) -> Result<usize> {
        let now = Instant::now();
        Ok(self
            .entries
            .read()
            .map_err(|_| poisoned())?
            .values()
            .filter(|e| !e.is_expired_at(now))
            .count())
    }
    async fn purge_expired(&self) -> Result<usize> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired_at(now));
        Ok(before - entries.len())
    }
    fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Backend that stores nothing; used when caching is disabled.
pub struct NullCache;
impl NullCache {
    pub fn new() -> Self {
        Self
    }
}
impl Default for NullCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for NullCache {
    async fn get(&self, _: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
    async fn set(&self, _: &str, _: &[u8], _: Duration) -> Result<()> {
        Ok(())
    }
    async fn delete(&self, _: &str) -> Result<bool> {
        Ok(false)
    }
    async fn delete_prefix(&self, _: &str) -> Result<usize> {
        Ok(0)
    }
    async fn clear(&self) -> Result<()> {
        Ok(())
    }
    async fn len(&self) -> Result<usize> {
        Ok(0)
    }
    async fn purge_expired(&self) -> Result<usize> {
        Ok(0)
    }
    fn name(&self) -> &'static str {
        "null"
    }
}
