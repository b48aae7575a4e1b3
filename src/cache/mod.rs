//! 缓存模块：按请求指纹缓存生成结果与查询结果，带 TTL 过期与后台清理。
//!
//! # Cache Module
//!
//! Fingerprint-keyed, time-boxed caching for generation responses and for
//! read-heavy store queries.
//!
//! ## Overview
//!
//! A cache is never a source of truth. Every failure below the
//! [`CacheManager`] (lock poisoning, undecodable payloads, a failing backend)
//! is counted, logged and reported as a miss.
//!
//! Expiry is checked on read (`now - created >= ttl` is absent) and by a
//! recurring sweep that the engine installs on its task scheduler, so memory
//! stays bounded even for keys that are never read again.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`FingerprintGenerator`] | Normalized sha256 digests of requests and query params |
//! | [`CacheManager`] | Typed, fail-open front with hit/miss statistics |
//! | [`CacheBackend`] | Trait for storage backends |
//! | [`MemoryCache`] | In-memory TTL cache with LRU eviction |
//! | [`NullCache`] | No-op backend used when caching is disabled |
//! | [`ResponseCache`] | Generated results, TTL per request kind |
//! | [`QueryCache`] | Store query results, TTL per query kind |
//!
//! ## Example
//!
//! ```rust
//! use content_forge::cache::{CacheConfig, CacheManager, MemoryCache, ResponseCache, ResponseTtls};
//! use content_forge::types::{ContentKind, GenerationRequest};
//!
//! let manager = CacheManager::new(CacheConfig::new(), Box::new(MemoryCache::new(1000)));
//! let cache = ResponseCache::new(manager, ResponseTtls::default());
//!
//! let a = GenerationRequest::new(ContentKind::LongForm, "Layer 2 Rollups");
//! let b = GenerationRequest::new(ContentKind::LongForm, "  layer 2   rollups ");
//! assert_eq!(cache.fingerprint(&a), cache.fingerprint(&b));
//! ```

mod backend;
mod key;
mod manager;
mod query;
mod response;

pub use backend::{CacheBackend, MemoryCache, NullCache};
pub use key::{Fingerprint, FingerprintGenerator};
pub use manager::{CacheConfig, CacheManager, CacheStats};
pub use query::{QueryCache, QueryKind, QueryTtls};
pub use response::{ResponseCache, ResponseTtls};
