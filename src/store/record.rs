//! Persisted content rows.

use crate::types::{ContentPayload, GeneratedResult, GenerationRequest};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

static NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    Draft,
    Published,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Draft => "draft",
            ContentStatus::Published => "published",
        }
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(ContentStatus::Draft),
            "published" => Ok(ContentStatus::Published),
            other => Err(crate::Error::store_with_context(
                format!("unknown content status '{}'", other),
                crate::ErrorContext::new().with_field_path("status"),
            )),
        }
    }
}

/// One persisted piece of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub body: String,
    /// Section headings of long-form content, in document order.
    #[serde(default)]
    pub headings: Vec<String>,
    pub keywords: Vec<String>,
    pub tone: Option<String>,
    pub audience: Option<String>,
    pub readability: f64,
    pub seo_score: u8,
    pub recommendations: Vec<String>,
    pub status: ContentStatus,
    pub category: Option<String>,
    pub schedule_id: Option<String>,
    /// The request that produced this content, as JSON.
    pub request: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl ContentRecord {
    /// Build a record from a generated result. The title falls back to the
    /// request topic when the payload carries none.
    pub fn from_result(
        request: &GenerationRequest,
        result: &GeneratedResult,
        status: ContentStatus,
        now: DateTime<Utc>,
    ) -> Self {
        let title = result
            .payload
            .title()
            .map(str::to_string)
            .unwrap_or_else(|| request.topic.clone());
        let (excerpt, headings) = match &result.payload {
            ContentPayload::LongForm {
                excerpt, headings, ..
            } => (excerpt.clone(), headings.clone()),
            _ => (None, Vec::new()),
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            slug: slugify(&title),
            title,
            excerpt,
            body: result.text.clone(),
            headings,
            keywords: request.keywords.clone(),
            tone: request.tone.clone(),
            audience: request.audience.clone(),
            readability: *result.analysis.readability.value(),
            seo_score: *result.analysis.seo_score.value(),
            recommendations: result.analysis.suggestions.clone(),
            status,
            category: None,
            schedule_id: None,
            request: serde_json::to_value(request).unwrap_or(serde_json::Value::Null),
            created_at: now,
            published_at: (status == ContentStatus::Published).then_some(now),
        }
    }

    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }

    pub fn with_schedule(mut self, schedule_id: impl Into<String>) -> Self {
        self.schedule_id = Some(schedule_id.into());
        self
    }
}

/// Lowercase, runs of non-alphanumerics collapsed to `-`, no leading or
/// trailing dashes.
pub fn slugify(title: &str) -> String {
    let lower = title.to_lowercase();
    NON_SLUG.replace_all(&lower, "-").trim_matches('-').to_string()
}

/// Listing filter. Serializable so it can key the query cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFilter {
    pub status: Option<ContentStatus>,
    pub schedule_id: Option<String>,
    pub limit: Option<usize>,
}

impl ContentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: ContentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_schedule(mut self, schedule_id: impl Into<String>) -> Self {
        self.schedule_id = Some(schedule_id.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &ContentRecord) -> bool {
        self.status.map_or(true, |s| record.status == s)
            && self
                .schedule_id
                .as_deref()
                .map_or(true, |id| record.schedule_id.as_deref() == Some(id))
    }
}

/// Aggregate counts for dashboards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentCounts {
    pub total: u64,
    pub drafts: u64,
    pub published: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentAnalysis, ContentKind, Estimate, ResultOrigin};
    use std::collections::BTreeMap;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("DeFi Yield Farming: 2024 Guide!"), "defi-yield-farming-2024-guide");
        assert_eq!(slugify("  --Layer 2 -- Rollups--  "), "layer-2-rollups");
        assert_eq!(slugify("???"), "");
    }

    fn long_form(headings: Vec<String>) -> GeneratedResult {
        GeneratedResult {
            request_id: "req-1".into(),
            kind: ContentKind::LongForm,
            text: "# Guide\n\n## Setup\n\nInstall it.\n\n## Usage\n\nRun it.".into(),
            payload: ContentPayload::LongForm {
                title: Some("Guide".into()),
                excerpt: Some("Install it.".into()),
                body: "Install it.\n\nRun it.".into(),
                headings,
            },
            analysis: ContentAnalysis {
                word_count: 4,
                readability: Estimate::heuristic(70.0),
                seo_score: Estimate::heuristic(40),
                keyword_density: BTreeMap::new(),
                suggestions: vec![],
            },
            estimated_cost: Estimate::priced(0.001),
            generation_time_ms: 10,
            origin: ResultOrigin::Generated,
        }
    }

    #[test]
    fn test_record_carries_heading_structure() {
        let request = GenerationRequest::new(ContentKind::LongForm, "guides");
        let result = long_form(vec!["Setup".into(), "Usage".into()]);
        let record = ContentRecord::from_result(&request, &result, ContentStatus::Draft, Utc::now());
        assert_eq!(record.title, "Guide");
        assert_eq!(record.slug, "guide");
        assert_eq!(record.excerpt.as_deref(), Some("Install it."));
        assert_eq!(record.headings, vec!["Setup".to_string(), "Usage".to_string()]);
        assert!(record.published_at.is_none());
    }

    #[test]
    fn test_record_without_headings_deserializes() {
        let request = GenerationRequest::new(ContentKind::LongForm, "guides");
        let record =
            ContentRecord::from_result(&request, &long_form(vec![]), ContentStatus::Published, Utc::now());
        let mut json = serde_json::to_value(&record).unwrap();
        json.as_object_mut().unwrap().remove("headings");
        let back: ContentRecord = serde_json::from_value(json).unwrap();
        assert!(back.headings.is_empty());
        assert_eq!(back.published_at, Some(back.created_at));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("Published".parse::<ContentStatus>().unwrap(), ContentStatus::Published);
        assert!("archived".parse::<ContentStatus>().is_err());
    }
}
