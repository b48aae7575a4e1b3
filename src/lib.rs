//! # content-forge
//!
//! 批量 AI 内容生成引擎：请求批处理、响应缓存、成本追踪与定时发布。
//!
//! Batched content-generation engine that sits between callers (route
//! handlers, cron jobs) and an external text-generation backend.
//!
//! ## Overview
//!
//! Requests are queued by a [`batch::RequestBatcher`] and flushed in batches
//! when the queue fills up or a timer fires. A [`batch::GroupedDispatcher`]
//! groups each batch by `(kind, tone, audience)`, answers repeated requests
//! from a fingerprint-keyed [`cache::ResponseCache`], and accounts every call
//! in a [`cost::CostTracker`]. Operator-defined schedules drive the same path
//! on a cron rule and persist the results through a [`store::ContentStore`].
//!
//! ## Core Guarantees
//!
//! - **At most one flush**: a flush that finds another in progress is a no-op
//! - **Fail-open caching**: cache failures are misses, never errors
//! - **Batch isolation**: one failing request becomes a fallback result; the rest of the batch proceeds
//! - **No duplicate timers**: re-installing a schedule cancels its previous timer first
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use content_forge::{ContentEngine, EngineConfig};
//! use content_forge::types::{ContentKind, GenerationRequest};
//!
//! #[tokio::main]
//! async fn main() -> content_forge::Result<()> {
//!     let mut config = EngineConfig::from_path("content-forge.yaml")?;
//!     config.apply_env()?;
//!
//!     let engine = ContentEngine::builder(config).build()?;
//!     engine.start().await?;
//!
//!     let request = GenerationRequest::new(ContentKind::LongForm, "Layer 2 rollups")
//!         .with_keywords(["rollups", "scaling"]);
//!     let result = engine.submit(request).await?;
//!     println!("{} words, cost {}", result.analysis.word_count, result.estimated_cost);
//!
//!     engine.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`types`] | Requests, results, payloads and estimates |
//! | [`batch`] | Request queue, flush triggers and grouped dispatch |
//! | [`cache`] | Response and query caches with TTL expiry |
//! | [`cost`] | Request, token and cost counters |
//! | [`generation`] | Prompts, backends, output parsing and text analysis |
//! | [`schedule`] | Schedule definitions, recurrence rules and the runner |
//! | [`runtime`] | Named recurring tasks |
//! | [`store`] | Content and schedule persistence |
//! | [`tokens`] | Token estimation and pricing |
//! | [`transport`] | HTTP transport for the generation backend |
//! | [`config`] | YAML and environment configuration |

pub mod batch;
pub mod cache;
pub mod config;
pub mod cost;
pub mod engine;
pub mod generation;
pub mod runtime;
pub mod schedule;
pub mod store;
pub mod tokens;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use config::EngineConfig;
pub use engine::{ContentEngine, EngineBuilder, EngineStats};
pub use types::{ContentKind, GeneratedResult, GenerationRequest};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
