//! Fingerprint generation.

use crate::types::GenerationRequest;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Normalized, stable cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub hash: String,
    /// Human-readable namespace (request kind or query kind), used for logs
    /// and prefix invalidation.
    pub namespace: Option<String>,
}

impl Fingerprint {
    pub fn new(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            namespace: None,
        }
    }
    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = Some(ns.into());
        self
    }
    pub fn as_str(&self) -> &str {
        &self.hash
    }
    /// Storage key: `namespace:hash` when namespaced.
    pub fn storage_key(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}:{}", ns, self.hash),
            None => self.hash.clone(),
        }
    }
    pub fn short(&self) -> &str {
        &self.hash[..12.min(self.hash.len())]
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}

impl From<&str> for Fingerprint {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
impl From<String> for Fingerprint {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Builds fingerprints from requests and query parameters.
///
/// Text fields are trimmed, case-folded and whitespace-collapsed; keyword
/// lists are sorted and de-duplicated so ordering artifacts do not split the
/// cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct FingerprintGenerator;

impl FingerprintGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn for_request(&self, request: &GenerationRequest) -> Fingerprint {
        let mut parts: BTreeMap<&str, String> = BTreeMap::new();
        parts.insert("kind", request.kind.as_str().to_string());
        parts.insert("topic", normalize(&request.topic));

        let mut keywords: Vec<String> = request
            .keywords
            .iter()
            .map(|k| normalize(k))
            .filter(|k| !k.is_empty())
            .collect();
        keywords.sort();
        keywords.dedup();
        parts.insert("keywords", keywords.join("\u{1f}"));

        if let Some(a) = request.audience.as_deref().map(normalize) {
            if !a.is_empty() {
                parts.insert("audience", a);
            }
        }
        if let Some(len) = request.length {
            parts.insert("length", len.to_string());
        }
        Fingerprint::new(self.digest(&parts)).with_namespace(request.kind.as_str())
    }

    /// Fingerprint for a read query. `params` is canonicalized through
    /// `serde_json::Value`, whose object keys are ordered.
    pub fn for_query(&self, namespace: &str, params: &serde_json::Value) -> Fingerprint {
        let mut parts: BTreeMap<&str, String> = BTreeMap::new();
        parts.insert("namespace", namespace.to_string());
        parts.insert("params", canonical_params(params));
        Fingerprint::new(self.digest(&parts)).with_namespace(namespace)
    }

    fn digest(&self, parts: &BTreeMap<&str, String>) -> String {
        let mut hasher = Sha256::new();
        for (k, v) in parts {
            // length-prefixed so "a|b" + "c" never collides with "a" + "b|c"
            hasher.update((k.len() as u64).to_le_bytes());
            hasher.update(k.as_bytes());
            hasher.update((v.len() as u64).to_le_bytes());
            hasher.update(v.as_bytes());
        }
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

fn canonical_params(params: &serde_json::Value) -> String {
    match params {
        serde_json::Value::String(s) => normalize(s),
        serde_json::Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(canonical_params).collect();
            format!("[{}]", inner.join(","))
        }
        serde_json::Value::Object(map) => {
            let mut entries: Vec<(String, String)> = map
                .iter()
                .map(|(k, v)| (normalize(k), canonical_params(v)))
                .collect();
            entries.sort();
            let inner: Vec<String> = entries
                .into_iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            format!("{{{}}}", inner.join(","))
        }
        other => other.to_string(),
    }
}
