//! Grouped dispatch of a flushed batch.

use crate::cache::ResponseCache;
use crate::cost::CostTracker;
use crate::generation::{fallback, parse, ContentAnalyzer, GenerationBackend, PromptBuilder};
use crate::tokens::{CharacterEstimator, TokenCounter};
use crate::types::{
    Estimate, GeneratedResult, GenerationRequest, GroupKey, ResultOrigin,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of one processed batch. `results[i]` answers `requests[i]`.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub results: Vec<GeneratedResult>,
    pub total_cost: Estimate<f64>,
    pub total_time_ms: u64,
    pub cache_hits: usize,
    pub fallbacks: usize,
    /// Cost the cache hits would have incurred if generated again.
    pub optimization_savings: Estimate<f64>,
}

impl BatchResult {
    pub fn total_time(&self) -> Duration {
        Duration::from_millis(self.total_time_ms)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

enum Outcome {
    Generated(GeneratedResult),
    Cached { result: GeneratedResult, saved: f64 },
    Fallback(GeneratedResult),
}

/// Processes a batch group by group, one request at a time.
///
/// Groups are keyed by `(kind, tone, audience)` and visited in the order
/// their key first appears. A failing request becomes a fallback result and
/// never aborts the rest of the batch.
pub struct GroupedDispatcher {
    backend: Arc<dyn GenerationBackend>,
    cache: Arc<ResponseCache>,
    cost: Arc<CostTracker>,
    prompts: PromptBuilder,
    analyzer: ContentAnalyzer,
    counter: CharacterEstimator,
}

impl GroupedDispatcher {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        cache: Arc<ResponseCache>,
        cost: Arc<CostTracker>,
    ) -> Self {
        Self {
            backend,
            cache,
            cost,
            prompts: PromptBuilder::new(),
            analyzer: ContentAnalyzer::new(),
            counter: CharacterEstimator::new(),
        }
    }

    pub fn with_prompt_builder(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub async fn process(&self, requests: &[GenerationRequest]) -> BatchResult {
        let started = Instant::now();
        let groups = group_in_order(requests);
        debug!(
            batch_size = requests.len(),
            groups = groups.len(),
            "dispatching batch"
        );

        let mut slots: Vec<Option<GeneratedResult>> = vec![None; requests.len()];
        let mut total_cost = 0.0;
        let mut savings = 0.0;
        let mut cache_hits = 0;
        let mut fallbacks = 0;

        for (key, indices) in &groups {
            debug!(group = %key, size = indices.len(), "processing group");
            for &i in indices {
                let result = match self.process_one(&requests[i]).await {
                    Outcome::Generated(r) => {
                        total_cost += r.estimated_cost.value;
                        r
                    }
                    Outcome::Cached { result, saved } => {
                        cache_hits += 1;
                        savings += saved;
                        result
                    }
                    Outcome::Fallback(r) => {
                        fallbacks += 1;
                        r
                    }
                };
                slots[i] = Some(result);
            }
        }

        let result = BatchResult {
            results: slots.into_iter().flatten().collect(),
            total_cost: Estimate::priced(total_cost),
            total_time_ms: started.elapsed().as_millis() as u64,
            cache_hits,
            fallbacks,
            optimization_savings: Estimate::priced(savings),
        };
        info!(
            batch_size = result.len(),
            cache_hits,
            fallbacks,
            total_cost,
            "batch processed"
        );
        result
    }

    async fn process_one(&self, request: &GenerationRequest) -> Outcome {
        let started = Instant::now();
        let fingerprint = self.cache.fingerprint(request);

        if let Some(cached) = self.cache.get(&fingerprint).await {
            let saved = cached.estimated_cost.value;
            self.cost.record_cache_hit(saved);
            debug!(request_id = %request.id, key = %fingerprint.short(), "served from cache");
            return Outcome::Cached {
                result: cached.served_from_cache(request.id.clone(), started.elapsed()),
                saved,
            };
        }

        match self.generate(request, started).await {
            Ok(result) => {
                self.cache
                    .put(&fingerprint, &result, self.cache.ttl_for(request.kind))
                    .await;
                Outcome::Generated(result)
            }
            Err(e) => {
                self.cost.record_failure();
                warn!(request_id = %request.id, kind = %request.kind, error = %e, "generation failed; using fallback");
                Outcome::Fallback(self.fallback_result(request, e.to_string(), started))
            }
        }
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        started: Instant,
    ) -> crate::Result<GeneratedResult> {
        request.validate()?;
        let prompt = self.prompts.build(request);
        let raw = self.backend.generate(&prompt).await?;

        let parsed = parse(request.kind, &raw);
        let analysis = self.analyzer.analyze(&parsed.text, request);
        let input_tokens = self.counter.count(&prompt.full_text()) as u32;
        let output_tokens = self.counter.count(&raw) as u32;
        let cost = self.cost.record(input_tokens, output_tokens);

        Ok(GeneratedResult {
            request_id: request.id.clone(),
            kind: request.kind,
            text: parsed.text,
            payload: parsed.payload,
            analysis,
            estimated_cost: Estimate::priced(cost.total_cost),
            generation_time_ms: started.elapsed().as_millis() as u64,
            origin: ResultOrigin::Generated,
        })
    }

    fn fallback_result(
        &self,
        request: &GenerationRequest,
        reason: String,
        started: Instant,
    ) -> GeneratedResult {
        let parsed = fallback(request);
        let analysis = self.analyzer.analyze(&parsed.text, request);
        GeneratedResult {
            request_id: request.id.clone(),
            kind: request.kind,
            text: parsed.text,
            payload: parsed.payload,
            analysis,
            estimated_cost: Estimate::zero_cost(),
            generation_time_ms: started.elapsed().as_millis() as u64,
            origin: ResultOrigin::Fallback { reason },
        }
    }
}

/// Indices of `requests` per group key, groups in first-seen order.
fn group_in_order(requests: &[GenerationRequest]) -> Vec<(GroupKey, Vec<usize>)> {
    let mut groups: Vec<(GroupKey, Vec<usize>)> = Vec::new();
    for (i, request) in requests.iter().enumerate() {
        let key = request.group_key();
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(i),
            None => groups.push((key, vec![i])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, CacheManager, MemoryCache, ResponseTtls};
    use crate::generation::Prompt;
    use crate::types::ContentKind;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Echoes the prompt's first user line; fails for topics containing "boom".
    struct EchoBackend {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GenerationBackend for EchoBackend {
        async fn generate(&self, prompt: &Prompt) -> crate::Result<String> {
            self.seen.lock().unwrap().push(prompt.user.clone());
            if prompt.user.contains("boom") {
                return Err(crate::Error::backend("upstream 503", true));
            }
            Ok("First point about the topic.\nSecond point, explained simply.".to_string())
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    fn dispatcher() -> (GroupedDispatcher, Arc<EchoBackend>, Arc<CostTracker>) {
        let backend = Arc::new(EchoBackend {
            seen: Mutex::new(Vec::new()),
        });
        let cache = Arc::new(ResponseCache::new(
            CacheManager::new(CacheConfig::new(), Box::new(MemoryCache::new(100))),
            ResponseTtls::default(),
        ));
        let cost = Arc::new(CostTracker::default());
        let d = GroupedDispatcher::new(backend.clone(), cache, cost.clone());
        (d, backend, cost)
    }

    #[test]
    fn test_groups_follow_first_appearance() {
        let reqs = vec![
            GenerationRequest::new(ContentKind::Outline, "a"),
            GenerationRequest::new(ContentKind::ShortForm, "b"),
            GenerationRequest::new(ContentKind::Outline, "c"),
            GenerationRequest::new(ContentKind::Outline, "d").with_tone("casual"),
        ];
        let groups = group_in_order(&reqs);
        let indices: Vec<Vec<usize>> = groups.into_iter().map(|(_, v)| v).collect();
        assert_eq!(indices, vec![vec![0, 2], vec![1], vec![3]]);
    }

    #[tokio::test]
    async fn test_results_keep_input_order_and_groups_run_grouped() {
        let (d, backend, _) = dispatcher();
        let reqs = vec![
            GenerationRequest::new(ContentKind::Outline, "alpha"),
            GenerationRequest::new(ContentKind::ShortForm, "beta"),
            GenerationRequest::new(ContentKind::Outline, "gamma"),
        ];
        let batch = d.process(&reqs).await;

        let ids: Vec<&str> = batch.results.iter().map(|r| r.request_id.as_str()).collect();
        assert_eq!(ids, reqs.iter().map(|r| r.id.as_str()).collect::<Vec<_>>());

        let seen = backend.seen.lock().unwrap().clone();
        assert!(seen[0].contains("alpha"));
        assert!(seen[1].contains("gamma"));
        assert!(seen[2].contains("beta"));
    }

    #[tokio::test]
    async fn test_failure_becomes_fallback_and_batch_continues() {
        let (d, _, cost) = dispatcher();
        let reqs = vec![
            GenerationRequest::new(ContentKind::TitleVariants, "boom"),
            GenerationRequest::new(ContentKind::TitleVariants, "fine"),
        ];
        let batch = d.process(&reqs).await;
        assert_eq!(batch.len(), 2);
        assert!(batch.results[0].is_fallback());
        assert_eq!(batch.results[0].estimated_cost.value, 0.0);
        assert!(batch.results[0]
            .fallback_reason()
            .is_some_and(|r| r.contains("upstream 503")));
        assert!(!batch.results[1].is_fallback());
        assert_eq!(batch.fallbacks, 1);
        assert_eq!(cost.stats().failed_requests, 1);
    }

    #[tokio::test]
    async fn test_cache_hit_is_free_and_counts_savings() {
        let (d, backend, cost) = dispatcher();
        let first = GenerationRequest::new(ContentKind::Outline, "Restaking");
        let second = GenerationRequest::new(ContentKind::Outline, "restaking ");

        let a = d.process(std::slice::from_ref(&first)).await;
        let b = d.process(std::slice::from_ref(&second)).await;

        assert!(a.total_cost.value > 0.0);
        assert_eq!(b.cache_hits, 1);
        assert_eq!(b.total_cost.value, 0.0);
        assert!(b.results[0].is_cached());
        assert_eq!(b.results[0].request_id, second.id);
        assert_eq!(b.optimization_savings.value, a.total_cost.value);
        assert_eq!(backend.seen.lock().unwrap().len(), 1);

        let stats = cost.stats();
        assert_eq!((stats.total_requests, stats.cached_requests), (2, 1));
    }

    #[tokio::test]
    async fn test_invalid_request_is_a_fallback() {
        let (d, backend, _) = dispatcher();
        let batch = d
            .process(&[GenerationRequest::new(ContentKind::ShortForm, "   ")])
            .await;
        assert!(batch.results[0].is_fallback());
        assert!(backend.seen.lock().unwrap().is_empty());
    }
}
