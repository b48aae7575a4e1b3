//! 类型系统模块：定义内容生成引擎的核心数据类型。
//!
//! # Types Module
//!
//! This module defines the request and result types that flow through the
//! batcher, the dispatcher and the schedule runner.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`GenerationRequest`] | Immutable description of one piece of content to generate |
//! | [`ContentKind`] | Closed set of request kinds (long-form, short-form, ...) |
//! | [`GeneratedResult`] | Produced text plus analysis, cost and origin |
//! | [`ContentPayload`] | Kind-specific structured view of the produced text |
//! | [`ResultOrigin`] | Whether a result was generated, served from cache, or a fallback |
//! | [`Estimate`] | Heuristic value, kept distinct from measured data |
//!
//! ## Submodules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`request`] | Generation requests and the similarity group key |
//! | [`result`] | Generated results, payload variants and content analysis |
//! | [`estimate`] | The `Estimate<T>` wrapper |
//!
//! ## Example
//!
//! ```rust
//! use content_forge::types::{ContentKind, GenerationRequest};
//!
//! let request = GenerationRequest::new(ContentKind::LongForm, "Layer 2 rollups")
//!     .with_keywords(["rollups", "scaling"])
//!     .with_audience("developers")
//!     .with_tone("technical")
//!     .with_length(1200);
//! assert_eq!(request.keywords.len(), 2);
//! ```

pub mod estimate;
pub mod request;
pub mod result;

pub use estimate::{Estimate, EstimateBasis};
pub use request::{ContentKind, GenerationRequest, GroupKey};
pub use result::{ContentAnalysis, ContentPayload, GeneratedResult, ResultOrigin};
