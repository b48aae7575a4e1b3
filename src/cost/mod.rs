//! 成本追踪模块：累计请求量、Token 用量、估算费用与缓存命中率。
//!
//! # Cost Tracking Module
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CostTracker`] | Monotonic request/token/cost counters |
//! | [`CostStats`] | Snapshot with hit ratio and optimization level |
//! | [`OptimizationLevel`] | High / medium / low bucket of the hit ratio |
//!
//! ```rust
//! use content_forge::cost::{CostTracker, OptimizationLevel};
//!
//! let tracker = CostTracker::default();
//! tracker.record(120, 900);
//! tracker.record_cache_hit(0.014);
//! let stats = tracker.stats();
//! assert_eq!(stats.total_requests, 2);
//! assert_eq!(stats.optimization_level, OptimizationLevel::High);
//! ```

mod tracker;

pub use tracker::{CostStats, CostTracker, OptimizationLevel};
