//! Read-query cache.
//!
//! Same fingerprint + TTL scheme as the response cache, placed in front of
//! aggregation queries against the content store. Each query kind has its own
//! TTL: aggregates that change slowly live longer than live listings.

use super::key::{Fingerprint, FingerprintGenerator};
use super::manager::{CacheManager, CacheStats};
use crate::Result;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryKind {
    DashboardStats,
    ContentListing,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::DashboardStats => "dashboard-stats",
            QueryKind::ContentListing => "content-listing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryTtls {
    pub dashboard_stats_secs: u64,
    pub content_listing_secs: u64,
}

impl Default for QueryTtls {
    fn default() -> Self {
        Self {
            dashboard_stats_secs: 300,
            content_listing_secs: 30,
        }
    }
}

impl QueryTtls {
    pub fn for_kind(&self, kind: QueryKind) -> Duration {
        Duration::from_secs(match kind {
            QueryKind::DashboardStats => self.dashboard_stats_secs,
            QueryKind::ContentListing => self.content_listing_secs,
        })
    }
}

pub struct QueryCache {
    manager: CacheManager,
    fingerprints: FingerprintGenerator,
    ttls: QueryTtls,
}

impl QueryCache {
    pub fn new(manager: CacheManager, ttls: QueryTtls) -> Self {
        Self {
            manager,
            fingerprints: FingerprintGenerator::new(),
            ttls,
        }
    }

    pub fn fingerprint(&self, kind: QueryKind, params: &serde_json::Value) -> Fingerprint {
        self.fingerprints.for_query(kind.as_str(), params)
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        kind: QueryKind,
        params: &serde_json::Value,
    ) -> Option<T> {
        self.manager.get(&self.fingerprint(kind, params)).await
    }

    pub async fn put<T: Serialize>(&self, kind: QueryKind, params: &serde_json::Value, value: &T) {
        let fp = self.fingerprint(kind, params);
        self.manager
            .set_with_ttl(&fp, value, self.ttls.for_kind(kind))
            .await
    }

    /// Return the cached value for `(kind, params)` or run `loader` and cache
    /// what it returns. Loader errors are returned and nothing is cached.
    pub async fn get_or_load<T, F, Fut>(
        &self,
        kind: QueryKind,
        params: &serde_json::Value,
        loader: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let fp = self.fingerprint(kind, params);
        if let Some(hit) = self.manager.get(&fp).await {
            return Ok(hit);
        }
        debug!(query = kind.as_str(), "query cache miss; loading");
        let value = loader().await?;
        self.manager
            .set_with_ttl(&fp, &value, self.ttls.for_kind(kind))
            .await;
        Ok(value)
    }

    pub async fn invalidate_kind(&self, kind: QueryKind) -> usize {
        self.manager.delete_namespace(kind.as_str()).await
    }

    pub async fn clear(&self) {
        self.manager.clear().await
    }

    pub async fn sweep(&self) -> usize {
        self.manager.purge_expired().await
    }

    pub async fn stats(&self) -> CacheStats {
        self.manager.stats().await
    }
}
