//! Generated results.

use super::estimate::Estimate;
use super::request::ContentKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Where a result came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum ResultOrigin {
    Generated,
    Cached,
    /// Placeholder produced because the backend call failed.
    Fallback { reason: String },
}

/// Kind-specific structured view of the produced text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ContentPayload {
    LongForm {
        title: Option<String>,
        excerpt: Option<String>,
        body: String,
        headings: Vec<String>,
    },
    ShortForm {
        text: String,
        hashtags: Vec<String>,
        characters: usize,
    },
    Optimization {
        optimized: String,
        seo_improvements: Vec<String>,
        readability_improvements: Vec<String>,
        overall_score: Option<Estimate<u8>>,
    },
    TitleVariants {
        titles: Vec<String>,
    },
    Outline {
        sections: Vec<String>,
    },
}

impl ContentPayload {
    pub fn kind(&self) -> ContentKind {
        match self {
            ContentPayload::LongForm { .. } => ContentKind::LongForm,
            ContentPayload::ShortForm { .. } => ContentKind::ShortForm,
            ContentPayload::Optimization { .. } => ContentKind::Optimization,
            ContentPayload::TitleVariants { .. } => ContentKind::TitleVariants,
            ContentPayload::Outline { .. } => ContentKind::Outline,
        }
    }

    /// Best available title for the content.
    pub fn title(&self) -> Option<&str> {
        match self {
            ContentPayload::LongForm { title, .. } => title.as_deref(),
            ContentPayload::TitleVariants { titles } => titles.first().map(String::as_str),
            ContentPayload::Outline { sections } => sections.first().map(String::as_str),
            _ => None,
        }
    }
}

/// Derived metadata for a piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentAnalysis {
    pub word_count: usize,
    /// Flesch reading ease clamped to 0..=100.
    pub readability: Estimate<f64>,
    pub seo_score: Estimate<u8>,
    /// Keyword -> occurrences per hundred words.
    pub keyword_density: BTreeMap<String, f64>,
    pub suggestions: Vec<String>,
}

/// Outcome for one request. Created once and never mutated; serving from
/// cache or regenerating produces a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedResult {
    pub request_id: String,
    pub kind: ContentKind,
    pub text: String,
    pub payload: ContentPayload,
    pub analysis: ContentAnalysis,
    pub estimated_cost: Estimate<f64>,
    pub generation_time_ms: u64,
    #[serde(flatten)]
    pub origin: ResultOrigin,
}

impl GeneratedResult {
    pub fn is_fallback(&self) -> bool {
        matches!(self.origin, ResultOrigin::Fallback { .. })
    }

    pub fn is_cached(&self) -> bool {
        matches!(self.origin, ResultOrigin::Cached)
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        match &self.origin {
            ResultOrigin::Fallback { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn generation_time(&self) -> Duration {
        Duration::from_millis(self.generation_time_ms)
    }

    /// A copy of a cached result re-addressed to `request_id`, at zero cost.
    pub fn served_from_cache(&self, request_id: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            request_id: request_id.into(),
            kind: self.kind,
            text: self.text.clone(),
            payload: self.payload.clone(),
            analysis: self.analysis.clone(),
            estimated_cost: Estimate::zero_cost(),
            generation_time_ms: elapsed.as_millis() as u64,
            origin: ResultOrigin::Cached,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GeneratedResult {
        GeneratedResult {
            request_id: "req-1".into(),
            kind: ContentKind::TitleVariants,
            text: "One\nTwo".into(),
            payload: ContentPayload::TitleVariants {
                titles: vec!["One".into(), "Two".into()],
            },
            analysis: ContentAnalysis {
                word_count: 2,
                readability: Estimate::heuristic(80.0),
                seo_score: Estimate::heuristic(50),
                keyword_density: BTreeMap::new(),
                suggestions: vec![],
            },
            estimated_cost: Estimate::priced(0.0012),
            generation_time_ms: 840,
            origin: ResultOrigin::Generated,
        }
    }

    #[test]
    fn test_served_from_cache_is_free_and_readdressed() {
        let original = sample();
        let cached = original.served_from_cache("req-2", Duration::from_millis(1));
        assert_eq!(cached.request_id, "req-2");
        assert_eq!(cached.estimated_cost.value, 0.0);
        assert!(cached.is_cached());
        assert_eq!(cached.text, original.text);
        // the source value is untouched
        assert_eq!(original.estimated_cost.value, 0.0012);
        assert_eq!(original.origin, ResultOrigin::Generated);
    }

    #[test]
    fn test_origin_is_flattened_in_json() {
        let mut r = sample();
        r.origin = ResultOrigin::Fallback {
            reason: "quota exceeded".into(),
        };
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["origin"], "fallback");
        assert_eq!(json["reason"], "quota exceeded");
        assert_eq!(json["payload"]["kind"], "title-variants");

        let back: GeneratedResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.fallback_reason(), Some("quota exceeded"));
    }

    #[test]
    fn test_payload_title() {
        assert_eq!(sample().payload.title(), Some("One"));
        let p = ContentPayload::ShortForm {
            text: "hi".into(),
            hashtags: vec![],
            characters: 2,
        };
        assert_eq!(p.title(), None);
        assert_eq!(p.kind(), ContentKind::ShortForm);
    }
}
