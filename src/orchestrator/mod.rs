//! C8 — Research Orchestrator (spec §4.8). Fans a topic out across every
//! configured `ResearchBackend`, fuses the per-backend ranked lists with
//! reciprocal rank fusion, deduplicates near-identical hits, reorders for
//! source diversity, and hands the survivors to the Source Intelligence
//! cache. The only error this module ever raises is
//! `PipelineError::AllSourcesFailed` — everything else degrades to "fewer
//! results than hoped for," recorded in `backend_stats`.

pub mod rrf;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::time::sleep;

use crate::backends::{HealthStatus, ResearchBackend};
use crate::core::types::{Backend, BackendStat, SearchResult, SerpRow};
use crate::dedup::MinHashSignature;
use crate::error::PipelineError;
use crate::source_cache::SourceCache;
use crate::store::Store;
use crate::textutil::tokenize;

/// Per-topic wall-clock budget; on exhaustion the fan-out proceeds with
/// whichever backends have already answered (spec §4.8 step 2).
pub const LATENCY_BUDGET: Duration = Duration::from_secs(90);
/// Per-topic cost budget; backends are admitted to the fan-out in
/// `Backend::DIVERSITY_ORDER` until admitting the next one would exceed it.
pub const COST_BUDGET_USD: f64 = 0.02;
/// Drop an entry already covered by a higher-ranked near-duplicate (spec
/// §4.8 step 5).
pub const NEAR_DUPLICATE_THRESHOLD: f32 = 0.85;

pub struct OrchestratorOutcome {
    pub results: Vec<SearchResult>,
    pub backend_stats: HashMap<String, BackendStat>,
    pub cost_usd: f64,
}

pub struct ResearchOrchestrator {
    backends: Vec<Arc<dyn ResearchBackend>>,
    min_successful_backends: usize,
}

impl ResearchOrchestrator {
    pub fn new(backends: Vec<Arc<dyn ResearchBackend>>, min_successful_backends: usize) -> Self {
        Self {
            backends,
            min_successful_backends,
        }
    }

    /// Three query variants, one per horizon family (spec §4.8 step 1).
    /// Backends outside `{depth, breadth, trends}` reuse the breadth
    /// variant — it is the most general of the three, and matches
    /// `CuratedBackend`/`NewsApiBackend`'s own recency-leaning nature.
    pub fn build_queries(topic_title: &str) -> HashMap<&'static str, String> {
        let mut queries = HashMap::new();
        queries.insert("depth", format!("{topic_title} in-depth analysis research report"));
        queries.insert("breadth", format!("{topic_title} latest news"));
        queries.insert("trends", format!("{topic_title} trending emerging 2026"));
        queries
    }

    fn query_for(&self, backend: &dyn ResearchBackend, queries: &HashMap<&'static str, String>) -> String {
        match backend.horizon() {
            crate::core::types::Horizon::Depth => queries["depth"].clone(),
            crate::core::types::Horizon::Trends => queries["trends"].clone(),
            _ => queries["breadth"].clone(),
        }
    }

    /// Admits backends in `Backend::DIVERSITY_ORDER` (a stable, documented
    /// order) until the next one would exceed the cost budget. A backend not
    /// reachable via that order at all (custom configurations) is appended
    /// last, same rule.
    fn admit_within_budget(&self) -> (Vec<Arc<dyn ResearchBackend>>, f64) {
        let mut ordered: Vec<&Arc<dyn ResearchBackend>> = Vec::with_capacity(self.backends.len());
        for name in Backend::DIVERSITY_ORDER.iter().map(|b| b.as_str()) {
            ordered.extend(self.backends.iter().filter(|b| b.name() == name));
        }
        for backend in &self.backends {
            if !ordered.iter().any(|b| Arc::ptr_eq(*b, backend)) {
                ordered.push(backend);
            }
        }

        let mut admitted = Vec::new();
        let mut cost = 0.0;
        for backend in ordered {
            let next_cost = cost + backend.cost_per_query();
            if !admitted.is_empty() && next_cost > COST_BUDGET_USD {
                continue;
            }
            admitted.push(backend.clone());
            cost = next_cost;
        }
        (admitted, cost)
    }

    pub async fn research_topic(
        &self,
        store: &Store,
        topic_id: &str,
        topic_title: &str,
        max_results_per_backend: usize,
    ) -> Result<OrchestratorOutcome, PipelineError> {
        let queries = Self::build_queries(topic_title);
        let (admitted, _budgeted_cost) = self.admit_within_budget();

        if admitted.is_empty() {
            return Err(PipelineError::AllSourcesFailed {
                failed_backends: self.backends.iter().map(|b| b.name().to_string()).collect(),
            });
        }

        // Consult the source cache before issuing a paid backend's fetch
        // (spec §4.10 "Contract for the orchestrator"): a topic already
        // covered by enough fresh cached sources skips the paid call and
        // reuses the cached entries instead.
        let cache = SourceCache::new(store);
        let cached_sources = cache.fresh_sources_for_topic(topic_id).unwrap_or_default();
        let cache_covers_topic = cached_sources.len() >= max_results_per_backend;

        let mut per_backend_raw: Vec<(&'static str, Backend, Vec<SearchResult>)> = Vec::new();
        let mut backend_stats: HashMap<String, BackendStat> = HashMap::new();
        let mut cost_usd = 0.0;

        let mut in_flight = FuturesUnordered::new();
        for backend in &admitted {
            if cache_covers_topic && backend.cost_per_query() > 0.0 {
                let kind = backend_kind_for_name(backend.name());
                let results: Vec<SearchResult> = cached_sources
                    .iter()
                    .take(max_results_per_backend)
                    .map(|s| SearchResult {
                        url: s.url.clone(),
                        title: s.title.clone(),
                        snippet: s.content_preview.clone(),
                        content: None,
                        published_date: s.published_at,
                        backend: kind,
                        score: Some(s.quality_score),
                        domain: s.domain.clone(),
                    })
                    .collect();
                backend_stats.insert(
                    backend.name().to_string(),
                    BackendStat { success: true, count: results.len(), latency_ms: 0 },
                );
                per_backend_raw.push((backend.name(), kind, results));
                continue;
            }
            cost_usd += backend.cost_per_query();
            let backend = Arc::clone(backend);
            let query = self.query_for(backend.as_ref(), &queries);
            in_flight.push(async move {
                let start = Instant::now();
                let results = backend.search(&query, max_results_per_backend).await;
                let health = backend.health_check().await;
                (backend.name(), backend.horizon(), results, start.elapsed(), health)
            });
        }

        let deadline = sleep(LATENCY_BUDGET);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                biased;
                item = in_flight.next() => {
                    match item {
                        Some((name, _horizon, results, elapsed, health)) => {
                            let backend_kind = backend_kind_for_name(name);
                            let succeeded = !results.is_empty() || health != HealthStatus::Failed;
                            backend_stats.insert(
                                name.to_string(),
                                BackendStat { success: succeeded, count: results.len(), latency_ms: elapsed.as_millis() as u64 },
                            );
                            per_backend_raw.push((name, backend_kind, results));
                        }
                        None => break,
                    }
                }
                _ = &mut deadline => {
                    tracing::warn!(
                        topic_id,
                        completed = per_backend_raw.len(),
                        admitted = admitted.len(),
                        "orchestrator: latency budget exceeded, proceeding with best-so-far"
                    );
                    break;
                }
            }
        }

        let succeeded_count = backend_stats.values().filter(|s| s.success).count();
        if succeeded_count < self.min_successful_backends {
            let failed_backends = backend_stats
                .iter()
                .filter(|(_, s)| !s.success)
                .map(|(name, _)| name.clone())
                .collect();
            return Err(PipelineError::AllSourcesFailed { failed_backends });
        }

        let per_backend: Vec<(Backend, Vec<SearchResult>)> = per_backend_raw
            .into_iter()
            .map(|(_, kind, results)| (kind, results))
            .collect();

        let fused = rrf::fuse(per_backend);
        let deduped = deduplicate_near_identical(fused);
        let ordered = diversity_interleave(deduped);

        for result in &ordered {
            let body = result.content.as_deref().unwrap_or(&result.snippet);
            if let Err(e) = cache.save_source(&result.url, &result.title, body, topic_id) {
                tracing::warn!(error = %e, url = %result.url, "orchestrator: failed to persist source");
            }
        }

        let rows: Vec<SerpRow> = ordered
            .iter()
            .enumerate()
            .map(|(i, r)| SerpRow {
                position: i as u32 + 1,
                url: r.url.clone(),
                title: r.title.clone(),
                snippet: r.snippet.clone(),
                domain: r.domain.clone(),
            })
            .collect();
        if let Err(e) = store.save_serp_results(topic_id, &queries["breadth"], &rows) {
            tracing::warn!(error = %e, topic_id, "orchestrator: failed to persist SERP snapshot");
        }

        Ok(OrchestratorOutcome {
            results: ordered,
            backend_stats,
            cost_usd,
        })
    }
}

/// Maps a backend's `name()` to its `Backend` enum value — used for RRF
/// grouping and diversity bucketing, independent of what each individual
/// `SearchResult.backend` field says (a backend returning zero results still
/// needs to be grouped correctly for the fan-out-wide diversity order).
fn backend_kind_for_name(name: &str) -> Backend {
    match name {
        "searxng" => Backend::Searxng,
        "gemini" => Backend::Gemini,
        "rss" => Backend::Rss,
        "thenewsapi" => Backend::Thenewsapi,
        _ => Backend::Tavily,
    }
}

fn deduplicate_near_identical(fused: Vec<rrf::FusedResult>) -> Vec<(Backend, SearchResult, f32)> {
    let mut kept: Vec<(Backend, SearchResult, f32, MinHashSignature)> = Vec::new();
    for entry in fused {
        let text = format!("{} {}", entry.result.title, entry.result.snippet);
        let signature = MinHashSignature::compute(&tokenize(&text));
        let is_near_duplicate = kept
            .iter()
            .any(|(_, _, _, kept_sig)| kept_sig.estimated_jaccard(&signature) >= NEAR_DUPLICATE_THRESHOLD);
        if is_near_duplicate {
            continue;
        }
        let backend = entry.result.backend;
        kept.push((backend, entry.result, entry.rrf_score, signature));
    }
    kept.into_iter().map(|(b, r, s, _)| (b, r, s)).collect()
}

/// Round-robin interleave in `Backend::DIVERSITY_ORDER`, each backend's
/// bucket internally still sorted by RRF score (spec §4.8 step 6).
fn diversity_interleave(deduped: Vec<(Backend, SearchResult, f32)>) -> Vec<SearchResult> {
    let mut buckets: HashMap<Backend, Vec<SearchResult>> = HashMap::new();
    for (backend, result, _score) in deduped {
        buckets.entry(backend).or_default().push(result);
    }

    let mut ordered = Vec::new();
    loop {
        let mut advanced = false;
        for backend in Backend::DIVERSITY_ORDER {
            if let Some(bucket) = buckets.get_mut(&backend) {
                if !bucket.is_empty() {
                    ordered.push(bucket.remove(0));
                    advanced = true;
                }
            }
        }
        if !advanced {
            break;
        }
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::ResearchBackend;
    use crate::core::types::Horizon;
    use async_trait::async_trait;

    struct StubBackend {
        name: &'static str,
        horizon: Horizon,
        results: Vec<SearchResult>,
        cost: f64,
        healthy: bool,
    }

    #[async_trait]
    impl ResearchBackend for StubBackend {
        fn name(&self) -> &'static str {
            self.name
        }
        fn horizon(&self) -> Horizon {
            self.horizon
        }
        fn cost_per_query(&self) -> f64 {
            self.cost
        }
        fn supports_citations(&self) -> bool {
            false
        }
        async fn search(&self, _query: &str, _max_results: usize) -> Vec<SearchResult> {
            self.results.clone()
        }
        async fn health_check(&self) -> HealthStatus {
            if self.healthy {
                HealthStatus::Ok
            } else {
                HealthStatus::Failed
            }
        }
    }

    /// `topic` seeds both title and snippet so two results about genuinely
    /// different subjects never collide under MinHash dedup.
    fn sample_result_about(url: &str, backend: Backend, topic: &str) -> SearchResult {
        SearchResult {
            url: url.to_string(),
            title: format!("deep dive into {topic} market dynamics"),
            snippet: format!("a detailed report covering {topic} developments this quarter"),
            content: None,
            published_date: None,
            backend,
            score: None,
            domain: "example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn all_backends_unhealthy_raises_all_sources_failed() {
        let store = Store::open_in_memory().unwrap();
        let backend: Arc<dyn ResearchBackend> = Arc::new(StubBackend {
            name: "tavily",
            horizon: Horizon::Depth,
            results: vec![],
            cost: 0.0,
            healthy: false,
        });
        let orchestrator = ResearchOrchestrator::new(vec![backend], 1);
        let err = orchestrator
            .research_topic(&store, "topic-1", "electric vehicles", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::AllSourcesFailed { .. }));
    }

    #[tokio::test]
    async fn healthy_backend_with_results_persists_sources_and_serp_snapshot() {
        let store = Store::open_in_memory().unwrap();
        let backend: Arc<dyn ResearchBackend> = Arc::new(StubBackend {
            name: "tavily",
            horizon: Horizon::Depth,
            results: vec![
                sample_result_about("https://a.example.com/x", Backend::Tavily, "battery chemistry"),
                sample_result_about("https://b.example.com/y", Backend::Tavily, "charging infrastructure"),
            ],
            cost: 0.0,
            healthy: true,
        });
        let orchestrator = ResearchOrchestrator::new(vec![backend], 1);
        let outcome = orchestrator
            .research_topic(&store, "topic-1", "electric vehicles", 5)
            .await
            .unwrap();
        assert_eq!(outcome.results.len(), 2);
        assert!(store.get_source("https://a.example.com/x").unwrap().is_some());
        assert!(store.get_latest_serp_snapshot("topic-1").unwrap().is_some());
    }

    #[tokio::test]
    async fn cached_topic_skips_paid_backend_and_keeps_cost_at_zero() {
        let store = Store::open_in_memory().unwrap();
        let cache = SourceCache::new(&store);
        for i in 0..5 {
            cache
                .save_source(
                    &format!("https://cached.example.com/{i}"),
                    "cached",
                    "battery chemistry breakthroughs",
                    "topic-1",
                )
                .unwrap();
        }
        let backend: Arc<dyn ResearchBackend> = Arc::new(StubBackend {
            name: "tavily",
            horizon: Horizon::Depth,
            results: vec![sample_result_about("https://live.example.com", Backend::Tavily, "should not be called")],
            cost: 0.01,
            healthy: true,
        });
        let orchestrator = ResearchOrchestrator::new(vec![backend], 1);
        let outcome = orchestrator
            .research_topic(&store, "topic-1", "electric vehicles", 5)
            .await
            .unwrap();
        assert_eq!(outcome.cost_usd, 0.0);
        assert!(outcome.results.iter().all(|r| r.url.starts_with("https://cached.example.com")));
    }

    #[test]
    fn diversity_interleave_alternates_backends() {
        let deduped = vec![
            (Backend::Tavily, sample_result_about("https://t1.com", Backend::Tavily, "solar power"), 1.0),
            (Backend::Tavily, sample_result_about("https://t2.com", Backend::Tavily, "wind turbines"), 0.9),
            (Backend::Searxng, sample_result_about("https://s1.com", Backend::Searxng, "grid storage"), 0.8),
        ];
        let ordered = diversity_interleave(deduped);
        assert_eq!(ordered[0].url, "https://t1.com");
        assert_eq!(ordered[1].url, "https://s1.com");
        assert_eq!(ordered[2].url, "https://t2.com");
    }
}
