//! Backend output parsing and deterministic fallbacks.
//!
//! Parsing never fails: output that does not have the expected shape is kept
//! as raw text inside the kind's payload.

use crate::types::{ContentKind, ContentPayload, Estimate, GenerationRequest};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

static LIST_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:[-*•]|\d+[.)]|[A-Za-z][.)]|[IVXivx]+[.)])\s+").expect("static regex")
});

static HASHTAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"#[A-Za-z0-9_]+").expect("static regex"));

const EXCERPT_CHARS: usize = 200;

/// Improvement list attached to a failed optimization.
pub const OPTIMIZATION_FALLBACK_ADVICE: [&str; 3] = [
    "Add relevant keywords",
    "Optimize title tags",
    "Improve meta description",
];

/// Parsed backend output: the text to analyze plus its structured view.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedContent {
    pub text: String,
    pub payload: ContentPayload,
}

pub fn parse(kind: ContentKind, raw: &str) -> ParsedContent {
    let cleaned = strip_code_fence(raw);
    match kind {
        ContentKind::LongForm => parse_long_form(cleaned),
        ContentKind::ShortForm => parse_short_form(cleaned),
        ContentKind::Optimization => parse_optimization(cleaned),
        ContentKind::TitleVariants => {
            let titles = parse_list(cleaned, "titles");
            ParsedContent {
                text: titles.join("\n"),
                payload: ContentPayload::TitleVariants { titles },
            }
        }
        ContentKind::Outline => {
            let sections = parse_list(cleaned, "sections");
            ParsedContent {
                text: sections.join("\n"),
                payload: ContentPayload::Outline { sections },
            }
        }
    }
}

/// Deterministic placeholder for a request whose backend call failed.
pub fn fallback(request: &GenerationRequest) -> ParsedContent {
    let topic = request.topic.trim();
    match request.kind {
        ContentKind::LongForm => {
            let body = format!(
                "# {}\n\nContent generation temporarily unavailable. Please try again.",
                topic
            );
            ParsedContent {
                payload: ContentPayload::LongForm {
                    title: Some(topic.to_string()),
                    excerpt: None,
                    body: body.clone(),
                    headings: Vec::new(),
                },
                text: body,
            }
        }
        ContentKind::ShortForm => {
            let text = format!("More on {} coming soon.", topic);
            ParsedContent {
                payload: ContentPayload::ShortForm {
                    characters: text.chars().count(),
                    text: text.clone(),
                    hashtags: Vec::new(),
                },
                text,
            }
        }
        ContentKind::Optimization => ParsedContent {
            text: request.topic.clone(),
            payload: ContentPayload::Optimization {
                optimized: request.topic.clone(),
                seo_improvements: OPTIMIZATION_FALLBACK_ADVICE
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                readability_improvements: Vec::new(),
                overall_score: None,
            },
        },
        ContentKind::TitleVariants => {
            let title = format!("Engaging Content About {}", topic);
            ParsedContent {
                text: title.clone(),
                payload: ContentPayload::TitleVariants {
                    titles: vec![title],
                },
            }
        }
        ContentKind::Outline => {
            let sections: Vec<String> = ["Introduction", "Main Content", "Key Points", "Conclusion"]
                .iter()
                .map(|s| s.to_string())
                .collect();
            ParsedContent {
                text: sections.join("\n"),
                payload: ContentPayload::Outline { sections },
            }
        }
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        // drop the info string (```json) up to the first newline
        let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
        return body.trim_end().trim_end_matches("```").trim();
    }
    trimmed
}

#[derive(Deserialize)]
struct LongFormJson {
    title: Option<String>,
    excerpt: Option<String>,
    content: Option<String>,
}

fn parse_long_form(text: &str) -> ParsedContent {
    if let Ok(LongFormJson {
        title,
        excerpt,
        content: Some(body),
    }) = serde_json::from_str::<LongFormJson>(text)
    {
        let headings = markdown_headings(&body);
        let title = title.or_else(|| markdown_title(&body));
        let excerpt = excerpt.or_else(|| first_paragraph(&body));
        return ParsedContent {
            text: body.clone(),
            payload: ContentPayload::LongForm {
                title,
                excerpt,
                body,
                headings,
            },
        };
    }
    ParsedContent {
        text: text.to_string(),
        payload: ContentPayload::LongForm {
            title: markdown_title(text),
            excerpt: first_paragraph(text),
            body: text.to_string(),
            headings: markdown_headings(text),
        },
    }
}

fn parse_short_form(text: &str) -> ParsedContent {
    let text = text.trim_matches('"').trim().to_string();
    let hashtags = HASHTAG
        .find_iter(&text)
        .map(|m| m.as_str().to_string())
        .collect();
    ParsedContent {
        payload: ContentPayload::ShortForm {
            characters: text.chars().count(),
            text: text.clone(),
            hashtags,
        },
        text,
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptimizationJson {
    optimized_content: Option<String>,
    #[serde(default)]
    seo_improvements: Vec<String>,
    #[serde(default)]
    readability_improvements: Vec<String>,
    overall_score: Option<f64>,
}

fn parse_optimization(text: &str) -> ParsedContent {
    match serde_json::from_str::<OptimizationJson>(text) {
        Ok(OptimizationJson {
            optimized_content: Some(optimized),
            seo_improvements,
            readability_improvements,
            overall_score,
        }) => ParsedContent {
            text: optimized.clone(),
            payload: ContentPayload::Optimization {
                optimized,
                seo_improvements,
                readability_improvements,
                overall_score: overall_score
                    .map(|s| Estimate::heuristic(s.clamp(0.0, 100.0).round() as u8)),
            },
        },
        _ => ParsedContent {
            text: text.to_string(),
            payload: ContentPayload::Optimization {
                optimized: text.to_string(),
                seo_improvements: Vec::new(),
                readability_improvements: Vec::new(),
                overall_score: None,
            },
        },
    }
}

/// A JSON array (of strings or `{title}` objects), a JSON object holding such
/// an array under `field`, or one item per line.
fn parse_list(text: &str, field: &str) -> Vec<String> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(text) {
        let array = match &value {
            serde_json::Value::Array(items) => Some(items),
            serde_json::Value::Object(map) => map.get(field).and_then(|v| v.as_array()),
            _ => None,
        };
        if let Some(items) = array {
            let list: Vec<String> = items
                .iter()
                .filter_map(|item| match item {
                    serde_json::Value::String(s) => Some(s.trim().to_string()),
                    serde_json::Value::Object(o) => o
                        .get("title")
                        .and_then(|t| t.as_str())
                        .map(|t| t.trim().to_string()),
                    _ => None,
                })
                .filter(|s| !s.is_empty())
                .collect();
            if !list.is_empty() {
                return list;
            }
        }
    }
    text.lines()
        .map(|line| {
            let line = line.trim().trim_start_matches('#').trim();
            LIST_MARKER
                .replace(line, "")
                .trim()
                .trim_matches('"')
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

fn markdown_title(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find_map(|l| l.strip_prefix("# "))
        .map(|t| t.trim().to_string())
}

fn markdown_headings(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| l.starts_with("##"))
        .map(|l| l.trim_start_matches('#').trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

fn first_paragraph(text: &str) -> Option<String> {
    let para = text
        .split("\n\n")
        .map(str::trim)
        .find(|p| !p.is_empty() && !p.starts_with('#'))?;
    let flat = para.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_CHARS {
        Some(flat)
    } else {
        let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
        Some(format!("{}...", cut.trim_end()))
    }
}
