//! 内容生成模块：提示词构建、后端调用、响应解析与文本分析。
//!
//! # Generation Module
//!
//! Everything between a [`GenerationRequest`](crate::types::GenerationRequest)
//! and a finished piece of text.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`GenerationBackend`] | Trait for external text generators |
//! | [`OpenAiBackend`] | OpenAI-compatible chat-completions client |
//! | [`PromptBuilder`] | Kind-specific prompts, token budget and temperature |
//! | [`ContentAnalyzer`] | Word count, readability, SEO score, keyword density |
//! | [`parse`] / [`fallback`] | Structured payloads from raw output, placeholders on failure |
//!
//! ## Example
//!
//! ```rust
//! use content_forge::generation::{parse, ContentAnalyzer, PromptBuilder};
//! use content_forge::types::{ContentKind, GenerationRequest};
//!
//! let request = GenerationRequest::new(ContentKind::Outline, "Zero-knowledge proofs");
//! let prompt = PromptBuilder::new().build(&request);
//! assert_eq!(prompt.max_tokens, 150);
//!
//! let parsed = parse(ContentKind::Outline, "1. What is a ZKP\n2. Use cases\n3. Limits");
//! let analysis = ContentAnalyzer::new().analyze(&parsed.text, &request);
//! assert!(analysis.word_count > 0);
//! ```

pub mod analysis;
mod backend;
mod openai;
pub mod prompt;
mod response;

pub use analysis::ContentAnalyzer;
pub use backend::{GenerationBackend, Prompt};
pub use openai::OpenAiBackend;
pub use prompt::PromptBuilder;
pub use response::{fallback, parse, ParsedContent, OPTIMIZATION_FALLBACK_ADVICE};
