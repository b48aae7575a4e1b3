//! Token 计数与成本估算模块：为生成请求估算 Token 数量与费用。
//!
//! # Token Counting and Cost Estimation Module
//!
//! Prompt and response sizes are not reported by every backend, so cost is
//! estimated from text length and a fixed price table.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`TokenCounter`] | Trait for token counting implementations |
//! | [`CharacterEstimator`] | Character-based approximation (4 chars ≈ 1 token) |
//! | [`ModelPricing`] | Per-1k-token input/output prices |
//! | [`CostEstimate`] | Cost breakdown for one call |
//!
//! ## Example
//!
//! ```rust
//! use content_forge::tokens::{CharacterEstimator, ModelPricing, TokenCounter};
//!
//! let counter = CharacterEstimator::new();
//! let input = counter.count("Write a blog post about validator economics.");
//! let estimate = ModelPricing::gpt_4o().calculate_cost(input as u32, 1500);
//! assert!(estimate.total_cost > 0.0);
//! ```

mod counter;
mod pricing;

pub use counter::{CharacterEstimator, TokenCounter};
pub use pricing::{CostEstimate, ModelPricing};
