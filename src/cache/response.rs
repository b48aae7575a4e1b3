//! Generation response cache.

use super::key::{Fingerprint, FingerprintGenerator};
use super::manager::{CacheManager, CacheStats};
use crate::types::{ContentKind, GeneratedResult, GenerationRequest};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Time-to-live per request kind, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseTtls {
    pub long_form_secs: u64,
    pub short_form_secs: u64,
    pub optimization_secs: u64,
    pub title_variants_secs: u64,
    pub outline_secs: u64,
}

impl Default for ResponseTtls {
    fn default() -> Self {
        Self {
            long_form_secs: 30 * 60,
            short_form_secs: 30 * 60,
            // optimization of a given text is stable for longer
            optimization_secs: 2 * 60 * 60,
            title_variants_secs: 60 * 60,
            outline_secs: 30 * 60,
        }
    }
}

impl ResponseTtls {
    pub fn for_kind(&self, kind: ContentKind) -> Duration {
        let secs = match kind {
            ContentKind::LongForm => self.long_form_secs,
            ContentKind::ShortForm => self.short_form_secs,
            ContentKind::Optimization => self.optimization_secs,
            ContentKind::TitleVariants => self.title_variants_secs,
            ContentKind::Outline => self.outline_secs,
        };
        Duration::from_secs(secs)
    }
}

/// Fingerprint-keyed store of [`GeneratedResult`]s.
///
/// Only the originally generated result is stored; hits are re-addressed to
/// the asking request by the dispatcher.
pub struct ResponseCache {
    manager: CacheManager,
    fingerprints: FingerprintGenerator,
    ttls: ResponseTtls,
}

impl ResponseCache {
    pub fn new(manager: CacheManager, ttls: ResponseTtls) -> Self {
        Self {
            manager,
            fingerprints: FingerprintGenerator::new(),
            ttls,
        }
    }

    pub fn fingerprint(&self, request: &GenerationRequest) -> Fingerprint {
        self.fingerprints.for_request(request)
    }

    pub fn ttl_for(&self, kind: ContentKind) -> Duration {
        self.ttls.for_kind(kind)
    }

    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<GeneratedResult> {
        self.manager.get(fingerprint).await
    }

    pub async fn put(&self, fingerprint: &Fingerprint, result: &GeneratedResult, ttl: Duration) {
        self.manager.set_with_ttl(fingerprint, result, ttl).await
    }

    pub async fn invalidate(&self, fingerprint: &Fingerprint) -> bool {
        self.manager.delete(fingerprint).await
    }

    /// Drop every cached result of one kind.
    pub async fn invalidate_kind(&self, kind: ContentKind) -> usize {
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
