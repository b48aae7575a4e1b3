//! Prompt construction per request kind.

use super::backend::Prompt;
use crate::types::{ContentKind, GenerationRequest};

const SEO_REQUIREMENTS: &str = "SEO Requirements:
- Include target keywords naturally throughout the content
- Use proper heading structure (H1, H2, H3)
- Ensure good keyword density (1-3%)
- Optimize for readability and user engagement";

/// Builds kind-specific prompts with a token budget and temperature.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    brand_context: Option<String>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extra context appended to every system prompt.
    pub fn with_brand_context(mut self, context: impl Into<String>) -> Self {
        self.brand_context = Some(context.into());
        self
    }

    pub fn build(&self, request: &GenerationRequest) -> Prompt {
        let mut system = system_prompt(request.kind).to_string();
        if let Some(ref ctx) = self.brand_context {
            system.push_str("\n\n");
            system.push_str(ctx);
        }
        Prompt {
            system,
            user: user_prompt(request),
            max_tokens: max_tokens(request.kind, request.length),
            temperature: temperature(request.kind),
            json_response: matches!(
                request.kind,
                ContentKind::LongForm | ContentKind::Optimization | ContentKind::TitleVariants
            ),
        }
    }
}

/// Base output budget per kind, raised to 1.5 tokens per requested word.
pub fn max_tokens(kind: ContentKind, length: Option<u32>) -> u32 {
    let base = match kind {
        ContentKind::LongForm => 2000,
        ContentKind::ShortForm => 300,
        ContentKind::Optimization => 2000,
        ContentKind::TitleVariants => 100,
        ContentKind::Outline => 150,
    };
    match length {
        Some(words) => base.max((f64::from(words) * 1.5).ceil() as u32),
        None => base,
    }
}

pub fn temperature(kind: ContentKind) -> f32 {
    match kind {
        ContentKind::LongForm => 0.7,
        ContentKind::ShortForm => 0.8,
        ContentKind::Optimization => 0.3,
        ContentKind::TitleVariants => 0.8,
        ContentKind::Outline => 0.6,
    }
}

fn system_prompt(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::LongForm => "You are an expert content writer and SEO specialist. Create high-quality, engaging blog content that provides genuine value to readers. Always return valid JSON.",
        ContentKind::ShortForm => "Create a social media post (max 280 characters).",
        ContentKind::Optimization => "You are an SEO and readability editor. Improve content while preserving its original intent and voice. Always return valid JSON.",
        ContentKind::TitleVariants => "You are a headline writing expert. Create compelling, SEO-optimized titles. Always return valid JSON.",
        ContentKind::Outline => "Create a brief blog outline with 3-5 main points, one per line.",
    }
}

fn user_prompt(request: &GenerationRequest) -> String {
    let mut prompt = match request.kind {
        ContentKind::LongForm => format!(
            "Write a comprehensive, SEO-optimized blog post about \"{}\".",
            request.topic
        ),
        ContentKind::ShortForm => {
            format!("Create engaging social media content about \"{}\".", request.topic)
        }
        ContentKind::Optimization => format!(
            "Optimize the following content for SEO and readability.\n\nORIGINAL CONTENT:\n{}",
            request.topic
        ),
        ContentKind::TitleVariants => format!(
            "Generate 5 compelling title variations for a blog post about \"{}\". Keep titles under 60 characters.",
            request.topic
        ),
        ContentKind::Outline => format!("Create an outline for a blog post about \"{}\".", request.topic),
    };

    if !request.keywords.is_empty() {
        prompt.push_str(&format!("\nTarget keywords: {}", request.keywords.join(", ")));
    }
    if let Some(ref audience) = request.audience {
        prompt.push_str(&format!("\nTarget audience: {}", audience));
    }
    if let Some(words) = request.length {
        prompt.push_str(&format!("\nTarget word count: {}", words));
    }
    if let Some(ref tone) = request.tone {
        prompt.push_str(&format!("\nTone: {}", tone));
    }

    match request.kind {
        ContentKind::LongForm => {
            prompt.push_str("\n\n");
            prompt.push_str(SEO_REQUIREMENTS);
            prompt.push_str(
                "\n\nRespond with JSON: {\"title\": \"...\", \"excerpt\": \"...\", \"content\": \"full post in markdown\"}",
            );
        }
        ContentKind::Optimization => prompt.push_str(
            "\n\nRespond with JSON: {\"optimizedContent\": \"...\", \"seoImprovements\": [\"...\"], \"readabilityImprovements\": [\"...\"], \"overallScore\": 85}",
        ),
        ContentKind::TitleVariants => {
            prompt.push_str("\n\nRespond with JSON: {\"titles\": [\"Title 1\", \"Title 2\"]}")
        }
        _ => {}
    }
    prompt
}
