//! 请求批处理模块：收集生成请求，按大小或定时器触发批量分组处理。
//!
//! # Request Batching Module
//!
//! Generation requests are queued and processed in batches to amortize
//! backend round trips and to let equivalent requests share cache entries.
//!
//! ## Overview
//!
//! A flush is triggered by whichever comes first:
//! - the queue reaching `max_batch_size` (the flush runs before `enqueue` returns)
//! - the recurring flush timer firing with a non-empty queue
//!
//! A flush takes up to `max_batch_size` requests in FIFO order. Only one
//! flush runs at a time; a trigger that arrives during a flush does nothing.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`RequestBatcher`] | Queue, flush triggers and result delivery |
//! | [`GroupedDispatcher`] | Groups a batch by `(kind, tone, audience)` and processes it |
//! | [`BatchCollector`] | Lock-protected FIFO queue |
//! | [`BatchConfig`] | Batch size and flush interval |
//! | [`BatchResult`] | Results, cost, cache hits and savings of one batch |
//!
//! ## Example
//!
//! ```rust
//! use content_forge::batch::BatchConfig;
//! use std::time::Duration;
//!
//! let config = BatchConfig::new()
//!     .with_max_batch_size(20)
//!     .with_flush_interval(Duration::from_secs(2));
//! assert_eq!(config.flush_interval_ms, 2000);
//! ```

mod batcher;
mod collector;
mod dispatcher;

pub use batcher::{BatcherStats, FlushReason, RequestBatcher, FLUSH_TASK};
pub use collector::{BatchAddResult, BatchCollector, BatchConfig, BatchItem};
pub use dispatcher::{BatchResult, GroupedDispatcher};
