//! Generation requests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of request kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentKind {
    /// Blog post or article.
    LongForm,
    /// Social post, meta description and similar short copy.
    ShortForm,
    /// Rewrite of existing content for SEO and readability.
    Optimization,
    /// Alternative titles for a topic.
    TitleVariants,
    /// Section outline for a future post.
    Outline,
}

impl ContentKind {
    pub const ALL: [ContentKind; 5] = [
        ContentKind::LongForm,
        ContentKind::ShortForm,
        ContentKind::Optimization,
        ContentKind::TitleVariants,
        ContentKind::Outline,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::LongForm => "long-form",
            ContentKind::ShortForm => "short-form",
            ContentKind::Optimization => "optimization",
            ContentKind::TitleVariants => "title-variants",
            ContentKind::Outline => "outline",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        ContentKind::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| {
                crate::Error::validation_with_context(
                    format!("unknown content kind '{}'", s),
                    crate::ErrorContext::new()
                        .with_field_path("kind")
                        .with_details("expected one of long-form, short-form, optimization, title-variants, outline"),
                )
            })
    }
}

/// One piece of content to generate. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub id: String,
    pub kind: ContentKind,
    /// Topic, or the source text for [`ContentKind::Optimization`].
    pub topic: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    /// Desired length in words.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
}

impl GenerationRequest {
    pub fn new(kind: ContentKind, topic: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            topic: topic.into(),
            keywords: Vec::new(),
            audience: None,
            length: None,
            tone: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_length(mut self, words: u32) -> Self {
        self.length = Some(words);
        self
    }

    pub fn with_tone(mut self, tone: impl Into<String>) -> Self {
        self.tone = Some(tone.into());
        self
    }

    /// Similarity key used by the dispatcher to group requests.
    pub fn group_key(&self) -> GroupKey {
        GroupKey {
            kind: self.kind,
            tone: normalize_tag(self.tone.as_deref(), "default"),
            audience: normalize_tag(self.audience.as_deref(), "general"),
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.topic.trim().is_empty() {
            return Err(crate::Error::validation_with_context(
                "topic must not be empty",
                crate::ErrorContext::new()
                    .with_field_path("topic")
                    .with_source(self.id.clone()),
            ));
        }
        if self.length == Some(0) {
            return Err(crate::Error::validation_with_context(
                "length must be positive when set",
                crate::ErrorContext::new()
                    .with_field_path("length")
                    .with_source(self.id.clone()),
            ));
        }
        Ok(())
    }
}

fn normalize_tag(tag: Option<&str>, default: &str) -> String {
    match tag.map(str::trim) {
        Some(t) if !t.is_empty() => t.to_lowercase(),
        _ => default.to_string(),
    }
}

/// `(kind, tone, audience)` with tone/audience case-folded and defaulted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub kind: ContentKind,
    pub tone: String,
    pub audience: String,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.kind, self.tone, self.audience)
    }
}
