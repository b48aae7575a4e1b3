//! Text heuristics: word count, readability, SEO score, keyword density.

use crate::types::{ContentAnalysis, Estimate, GenerationRequest};
use std::collections::BTreeMap;

/// Neutral SEO score when no keywords were requested.
const BASE_SEO_SCORE: u8 = 50;

#[derive(Debug, Clone, Default)]
pub struct ContentAnalyzer;

impl ContentAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, text: &str, request: &GenerationRequest) -> ContentAnalysis {
        let word_count = word_count(text);
        let keyword_density = keyword_density(text, &request.keywords);
        let seo_score = seo_score(text, &request.keywords);
        ContentAnalysis {
            word_count,
            readability: Estimate::heuristic(readability(text)),
            seo_score: if request.keywords.is_empty() {
                Estimate::default_value(seo_score)
            } else {
                Estimate::heuristic(seo_score)
            },
            suggestions: suggestions(text, request, &keyword_density, word_count),
            keyword_density,
        }
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Flesch reading ease, clamped to `0..=100`. Zero for text without a
/// sentence terminator.
pub fn readability(text: &str) -> f64 {
    let sentences = text
        .split(|c| matches!(c, '.' | '!' | '?'))
        .count()
        .saturating_sub(1);
    let words: Vec<&str> = text.split_whitespace().collect();
    if sentences == 0 || words.is_empty() {
        return 0.0;
    }
    let syllables: usize = words.iter().map(|w| syllables(w)).sum();
    let wps = words.len() as f64 / sentences as f64;
    let spw = syllables as f64 / words.len() as f64;
    (206.835 - 1.015 * wps - 84.6 * spw).clamp(0.0, 100.0)
}

/// Vowel groups in a word, at least one for any word with letters.
fn syllables(word: &str) -> usize {
    let mut count = 0;
    let mut in_group = false;
    let mut letters = 0;
    for c in word.chars().filter(|c| c.is_ascii_alphabetic()) {
        letters += 1;
        let vowel = matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
        if vowel && !in_group {
            count += 1;
        }
        in_group = vowel;
    }
    if letters > 0 {
        count.max(1)
    } else {
        0
    }
}

/// +20 per keyword present, +15 for headings, +15 above 300 words; capped at 100.
pub fn seo_score(text: &str, keywords: &[String]) -> u8 {
    if keywords.is_empty() {
        return BASE_SEO_SCORE;
    }
    let lower = text.to_lowercase();
    let mut score: u32 = keywords
        .iter()
        .filter(|k| !k.trim().is_empty() && lower.contains(&k.trim().to_lowercase()))
        .count() as u32
        * 20;
    if has_headings(text) {
        score += 15;
    }
    if word_count(text) > 300 {
        score += 15;
    }
    score.min(100) as u8
}

fn has_headings(text: &str) -> bool {
    text.contains('#') || text.contains("<h")
}

/// Occurrences per hundred words. Multi-word keywords match as phrases.
pub fn keyword_density(text: &str, keywords: &[String]) -> BTreeMap<String, f64> {
    let words: Vec<String> = text
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .collect();
    let total = words.len();
    keywords
        .iter()
        .filter(|k| !k.trim().is_empty())
        .map(|keyword| {
            let phrase: Vec<String> = keyword
                .split_whitespace()
                .map(|w| w.to_lowercase())
                .collect();
            let count = if phrase.len() > total {
                0
            } else {
                words
                    .windows(phrase.len())
                    .filter(|window| *window == phrase.as_slice())
                    .count()
            };
            let density = if total > 0 {
                count as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            (keyword.clone(), density)
        })
        .collect()
}

fn suggestions(
    text: &str,
    request: &GenerationRequest,
    density: &BTreeMap<String, f64>,
    word_count: usize,
) -> Vec<String> {
    let mut out = Vec::new();
    for (keyword, d) in density {
        if *d < 1.0 {
            out.push(format!("Increase density of keyword \"{}\"", keyword));
        } else if *d > 3.0 {
            out.push(format!("Reduce density of keyword \"{}\"", keyword));
        }
    }
    if let Some(target) = request.length {
        let target = f64::from(target);
        if (word_count as f64 - target).abs() > target * 0.2 {
            out.push(format!(
                "Adjust word count (current: {}, target: {})",
                word_count, target
            ));
        }
    }
    if !has_headings(text) {
        out.push("Add heading structure for better SEO".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentKind, EstimateBasis};

    #[test]
    fn test_readability_is_clamped() {
        assert_eq!(readability(""), 0.0);
        assert_eq!(readability("no terminator here"), 0.0);
        let easy = readability("The cat sat. The dog ran. We all had fun.");
        assert!(easy > 90.0 && easy <= 100.0);
        let hard = readability(
            "Institutionalization of decentralized interoperability necessitates comprehensive organizational reconceptualization.",
        );
        assert_eq!(hard, 0.0);
    }

    #[test]
    fn test_syllables() {
        assert_eq!(syllables("cat"), 1);
        assert_eq!(syllables("rollup"), 2);
        assert_eq!(syllables("42"), 0);
        assert_eq!(syllables("rhythm"), 1);
    }

    #[test]
    fn test_seo_score_rules() {
        let kws = vec!["staking".to_string(), "yield".to_string()];
        assert_eq!(seo_score("anything", &[]), 50);
        assert_eq!(seo_score("Staking basics", &kws), 20);
        assert_eq!(seo_score("# Staking and yield", &kws), 55);
        let long = format!("# staking yield {}", "word ".repeat(400));
        assert_eq!(seo_score(&long, &kws), 70);
        let many: Vec<String> = (0..6).map(|i| format!("k{}", i)).collect();
        let text = format!("# k0 k1 k2 k3 k4 k5 {}", "w ".repeat(301));
        assert_eq!(seo_score(&text, &many), 100);
    }

    #[test]
    fn test_keyword_density_counts_phrases() {
        let text = "Layer two rollups scale. Layer two is cheap. Rollups win";
        let d = keyword_density(text, &["layer two".to_string(), "rollups".to_string()]);
        assert!((d["layer two"] - 2.0 / 10.0 * 100.0).abs() < 1e-9);
        assert!((d["rollups"] - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_analyze_builds_suggestions() {
        let req = GenerationRequest::new(ContentKind::LongForm, "x")
            .with_keywords(["defi"])
            .with_length(1000);
        let analysis = ContentAnalyzer::new().analyze("A short plain text about markets.", &req);
        assert_eq!(analysis.word_count, 6);
        assert_eq!(analysis.seo_score.basis, EstimateBasis::Heuristic);
        assert!(analysis
            .suggestions
            .iter()
            .any(|s| s == "Increase density of keyword \"defi\""));
        assert!(analysis.suggestions.iter().any(|s| s.starts_with("Adjust word count")));
        assert!(analysis
            .suggestions
            .iter()
            .any(|s| s == "Add heading structure for better SEO"));
    }
}
