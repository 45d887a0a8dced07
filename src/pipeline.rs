//! Pipeline driver (spec §2, §7): wires the document store, deduplicator,
//! collectors, clusterer, validator, research orchestrator, reranker, and
//! synthesizer into a single run, producing a `RunResult`. Control flow
//! follows spec §2's chain: collectors -> dedup -> store -> clusterer ->
//! validator -> {orchestrator over backends, using the source cache} ->
//! reranker -> synthesizer (using cross-topic context) -> store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;

use crate::backends::breadth::SearxngBackend;
use crate::backends::breaking::NewsApiBackend as BreakingNewsApiBackend;
use crate::backends::curated::CuratedBackend;
use crate::backends::depth::TavilyBackend;
use crate::backends::trends::GeminiBackend;
use crate::backends::ResearchBackend;
use crate::cluster::cluster_documents;
use crate::collectors::autocomplete::AutocompleteCollector;
use crate::collectors::feed_discovery::FeedDiscoveryCollector;
use crate::collectors::newsapi::NewsApiCollector;
use crate::collectors::reddit::RedditCollector;
use crate::collectors::rss::RssCollector;
use crate::collectors::trends::TrendsCollector;
use crate::collectors::Collector;
use crate::core::config::MarketConfig;
use crate::core::types::{Document, ResearchReport, Topic, TopicRunStatus, TopicSource};
use crate::dedup::{Deduplicator, MinHashSignature};
use crate::llm::LlmProvider;
use crate::orchestrator::ResearchOrchestrator;
use crate::ratelimit::{HostGovernor, DEFAULT_COLLECTOR_CONCURRENCY};
use crate::reranker::{CascadedReranker, LocalityTarget};
use crate::source_cache::SourceCache;
use crate::store::{InsertOutcome, Store};
use crate::synthesizer::cross_topic::build_cross_topic_context;
use crate::synthesizer::{ContentSynthesizer, SourceInput};
use crate::textutil::tokenize;
use crate::validator::{TopicCandidate, TopicValidator, ValidatorWeights};

const MAX_RESULTS_PER_BACKEND: usize = 10;
const RERANKER_TOP_SOURCES: usize = 8;
const VALIDATOR_THRESHOLD: f32 = 0.2;
const VALIDATOR_TOP_N: usize = 20;
/// Default per-host rate for collector-owned HTTP hosts without a bespoke
/// constant of their own (RSS/Reddit/autocomplete each pass their own).
const DEFAULT_HOST_RATE: f64 = 4.0;

/// Aggregate statistics for one run (spec §7 "a run always produces ... a
/// result object with ... aggregate statistics").
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub documents_collected: usize,
    pub documents_inserted: usize,
    pub duplicates_dropped: usize,
    pub topics_discovered: usize,
    pub topics_validated: usize,
    pub topics_researched: usize,
    pub total_cost_usd: f64,
    /// backend name -> (successes, attempts), summed across every topic
    /// researched this run.
    pub backend_success_counts: HashMap<String, (u32, u32)>,
}

#[derive(Debug, Clone)]
pub struct TopicOutcome {
    pub topic_id: String,
    pub title: String,
    pub status: TopicRunStatus,
}

#[derive(Debug, Clone)]
pub struct RunResult {
    pub topics: Vec<TopicOutcome>,
    pub stats: RunStats,
}

/// Holds every long-lived piece a run needs; built once, reused across runs
/// (the HTTP client, host governor, and dedup state are meant to persist —
/// re-running the same process twice in a day should see dedup and the
/// source cache already warm).
pub struct Pipeline {
    store: Arc<Store>,
    config: MarketConfig,
    dedup: Deduplicator,
    collectors: Vec<Box<dyn Collector>>,
    orchestrator: ResearchOrchestrator,
    reranker: CascadedReranker,
    validator: TopicValidator,
    llm: Arc<dyn LlmProvider>,
}

impl Pipeline {
    /// Builds the shared `reqwest::Client` every collector/backend clones,
    /// with connect/read timeouts from `HTTP_TIMEOUT_SECS`/
    /// `HTTP_CONNECT_TIMEOUT_SECS` (defaults 30s/10s), exactly as the
    /// teacher's `main.rs` does.
    fn build_http_client() -> anyhow::Result<reqwest::Client> {
        let http_timeout = std::env::var("HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);
        let connect_timeout = std::env::var("HTTP_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(10);
        Ok(reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(http_timeout))
            .connect_timeout(std::time::Duration::from_secs(connect_timeout))
            .build()?)
    }

    pub fn new(store: Arc<Store>, config: MarketConfig, llm: Arc<dyn LlmProvider>) -> anyhow::Result<Self> {
        let client = Self::build_http_client()?;
        let governor = Arc::new(HostGovernor::new(DEFAULT_HOST_RATE, DEFAULT_COLLECTOR_CONCURRENCY));

        let collectors: Vec<Box<dyn Collector>> = vec![
            Box::new(RssCollector::new(client.clone(), store.clone(), governor.clone())),
            Box::new(RedditCollector::new(client.clone(), governor.clone())),
            Box::new(TrendsCollector::new(llm.clone())),
            Box::new(AutocompleteCollector::new(client.clone(), governor.clone())),
            Box::new(NewsApiCollector::new(client.clone(), governor.clone())),
            Box::new(FeedDiscoveryCollector::new(client.clone(), llm.clone(), governor.clone())),
        ];

        let backends: Vec<Arc<dyn ResearchBackend>> = vec![
            Arc::new(TavilyBackend::new(client.clone(), governor.clone())),
            Arc::new(SearxngBackend::new(client.clone(), governor.clone())),
            Arc::new(GeminiBackend::new(llm.clone())),
            Arc::new(CuratedBackend::new(
                client.clone(),
                governor.clone(),
                config.collectors.custom_feeds.clone(),
            )),
            Arc::new(BreakingNewsApiBackend::new(client.clone(), governor.clone())),
        ];
        let orchestrator =
            ResearchOrchestrator::new(backends, config.deep_research.min_successful_backends);

        let reranker = CascadedReranker::with_fallback(
            config.reranker.stage1_threshold,
            config.reranker.stage2_threshold,
            config.reranker.stage3_final_count,
        );

        let validator = TopicValidator::new(ValidatorWeights::default());

        Ok(Self {
            store,
            config,
            dedup: Deduplicator::new(),
            collectors,
            orchestrator,
            reranker,
            validator,
            llm,
        })
    }

    /// Runs every collector, keeps only genuinely new documents, and persists
    /// them. Collectors never raise — a failing one just contributes an
    /// empty vec (spec §4.4).
    async fn collect_and_store(&self) -> (usize, usize, usize) {
        let futures = self.collectors.iter().map(|c| c.collect(&self.config));
        let collected: Vec<Vec<Document>> = join_all(futures).await;
        let all_docs: Vec<Document> = collected.into_iter().flatten().collect();
        let total = all_docs.len();

        let deduped = self.dedup.deduplicate(all_docs);
        let mut inserted = 0;
        for doc in &deduped {
            match self.store.insert_document(doc) {
                Ok(InsertOutcome::Inserted) => inserted += 1,
                Ok(InsertOutcome::DuplicateCanonicalUrl) => {}
                Err(e) => tracing::warn!(error = %e, doc_id = doc.id, "pipeline: failed to store document"),
            }
        }
        let duplicates = total.saturating_sub(deduped.len());
        (total, inserted, duplicates)
    }

    /// Clusters this market's language corpus, scores candidates through the
    /// validator, and upserts the survivors as `Topic`s.
    fn discover_and_validate_topics(&self) -> Vec<Topic> {
        let docs = self
            .store
            .get_documents_by_language(&self.config.language, None)
            .unwrap_or_default();
        let clusters = cluster_documents(&docs, &self.config.seed_keywords);
        let doc_by_id: HashMap<&str, &Document> =
            docs.iter().map(|d| (d.id.as_str(), d)).collect();

        let existing = self.store.researched_topic_minhashes().unwrap_or_default();

        let candidates: Vec<TopicCandidate> = clusters
            .iter()
            .map(|cluster| {
                let members: Vec<&Document> = cluster
                    .document_ids
                    .iter()
                    .filter_map(|id| doc_by_id.get(id.as_str()).copied())
                    .collect();
                let surfaced_by = members
                    .iter()
                    .map(|d| collector_family(&d.source).to_string())
                    .collect();
                let now = Utc::now();
                let age_days = members
                    .iter()
                    .map(|d| (now - d.fetched_at).num_seconds() as f32 / 86_400.0)
                    .fold(f32::MAX, f32::min)
                    .max(0.0);
                let source_kind = dominant_topic_source(&members);
                TopicCandidate {
                    title: cluster.representative_title.clone(),
                    surfaced_by,
                    age_days: if age_days.is_finite() { age_days } else { 0.0 },
                    source_kind,
                    autocomplete_position: None,
                    autocomplete_query_len: None,
                    minhash: MinHashSignature::compute(&tokenize(&cluster.representative_title)),
                }
            })
            .collect();

        let scored = self.validator.filter_topics(
            candidates,
            &self.config.seed_keywords,
            &existing,
            VALIDATOR_THRESHOLD,
            VALIDATOR_TOP_N,
        );

        let now = Utc::now();
        let mut topics = Vec::with_capacity(scored.len());
        for s in scored {
            let topic = Topic {
                id: uuid::Uuid::new_v4().to_string(),
                title: s.candidate.title.clone(),
                description: String::new(),
                cluster_label: s.candidate.title.clone(),
                source: s.candidate.source_kind,
                source_url: String::new(),
                language: self.config.language.clone(),
                domain: self.config.domain.clone(),
                market: self.config.market.clone(),
                demand_score: s.volume,
                opportunity_score: s.diversity,
                fit_score: s.relevance,
                novelty_score: s.novelty,
                priority_score: s.total_score,
                competitors: vec![],
                content_gaps: vec![],
                keywords: HashMap::new(),
                research_report: None,
                hero_image_url: None,
                supporting_images: vec![],
                discovered_at: now,
                updated_at: now,
                published_at: None,
            };
            if let Err(e) = self.store.upsert_topic(&topic) {
                tracing::warn!(error = %e, topic = topic.title, "pipeline: failed to upsert topic");
                continue;
            }
            topics.push(topic);
        }
        topics
    }

    /// Researches, reranks, and synthesizes an article for one topic.
    /// Never propagates an error — every failure maps to a `TopicRunStatus`.
    async fn research_topic(&self, topic: &Topic, stats: &mut RunStats) -> TopicRunStatus {
        let outcome = match self
            .orchestrator
            .research_topic(&self.store, &topic.id, &topic.title, MAX_RESULTS_PER_BACKEND)
            .await
        {
            Ok(o) => o,
            Err(e) => {
                tracing::warn!(error = %e, topic = topic.title, "pipeline: research failed");
                return TopicRunStatus::ResearchFailed;
            }
        };
        stats.total_cost_usd += outcome.cost_usd;
        for (name, stat) in &outcome.backend_stats {
            let entry = stats.backend_success_counts.entry(name.clone()).or_insert((0, 0));
            entry.1 += 1;
            if stat.success {
                entry.0 += 1;
            }
        }

        let locality = LocalityTarget {
            market: self.config.market.clone(),
            language: self.config.language.clone(),
        };
        let reranked = self
            .reranker
            .rerank(&outcome.results, &topic.title, &locality)
            .await;

        let cache = SourceCache::new(&self.store);
        let sources: Vec<SourceInput> = reranked
            .iter()
            .take(RERANKER_TOP_SOURCES)
            .map(|r| {
                let snippet = cache
                    .get(&r.result.url)
                    .ok()
                    .flatten()
                    .map(|s| s.content_preview)
                    .unwrap_or_else(|| r.result.snippet.clone());
                SourceInput {
                    url: r.result.url.clone(),
                    title: r.result.title.clone(),
                    snippet,
                    raw_html: None,
                }
            })
            .collect();

        let cross_topic = build_cross_topic_context(&self.store, &topic.id, &self.config.language, None)
            .unwrap_or_default();
        let cross_topic_text = cross_topic.to_prompt_context();
        let cross_topic_arg = (!cross_topic_text.is_empty()).then_some(cross_topic_text.as_str());

        let synthesizer = ContentSynthesizer::new(
            self.llm.as_ref(),
            self.config.synthesizer.strategy,
            self.config.synthesizer.max_article_words,
        );
        let synthesis = synthesizer.synthesize(&sources, &topic.title, cross_topic_arg).await;
        stats.total_cost_usd += synthesis.cost_usd;

        let report = ResearchReport {
            topic_id: topic.id.clone(),
            query: topic.title.clone(),
            article_markdown: synthesis.article_markdown.clone().unwrap_or_default(),
            citations: synthesis.citations.clone(),
            backend_stats: outcome.backend_stats,
            cost_usd: outcome.cost_usd + synthesis.cost_usd,
            generated_at: Utc::now(),
        };
        if let Err(e) = self.store.save_research_report(&topic.id, &report) {
            tracing::warn!(error = %e, topic = topic.title, "pipeline: failed to persist research report");
        }

        if synthesis.article_markdown.is_some() {
            TopicRunStatus::Researched
        } else {
            TopicRunStatus::SynthesisFailed
        }
    }

    /// Runs one full pass: collect, discover topics, research + synthesize
    /// every topic that clears the validator.
    pub async fn run_once(&self) -> RunResult {
        let (collected, inserted, duplicates) = self.collect_and_store().await;
        let topics = self.discover_and_validate_topics();

        let mut stats = RunStats {
            documents_collected: collected,
            documents_inserted: inserted,
            duplicates_dropped: duplicates,
            topics_discovered: topics.len(),
            topics_validated: topics.len(),
            ..Default::default()
        };

        let mut outcomes = Vec::with_capacity(topics.len());
        for topic in &topics {
            let status = self.research_topic(topic, &mut stats).await;
            if status == TopicRunStatus::Researched {
                stats.topics_researched += 1;
            }
            outcomes.push(TopicOutcome {
                topic_id: topic.id.clone(),
                title: topic.title.clone(),
                status,
            });
        }

        RunResult { topics: outcomes, stats }
    }
}

/// `"rss_example_com"` -> `"rss"`; tags without an underscore (`"reddit"`,
/// `"trends"`) pass through unchanged.
fn collector_family(source: &str) -> &str {
    source.split('_').next().unwrap_or(source)
}

/// The collector family surfacing the most members of a cluster decides its
/// `TopicSource` (spec §4.1's `source` field). Ties favor the first family
/// encountered, i.e. iteration order of the cluster's member documents.
fn dominant_topic_source(members: &[&Document]) -> TopicSource {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for d in members {
        *counts.entry(collector_family(&d.source)).or_insert(0) += 1;
    }
    let dominant = counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(family, _)| family)
        .unwrap_or("rss");
    match dominant {
        "reddit" => TopicSource::Reddit,
        "trends" => TopicSource::Trends,
        "autocomplete" => TopicSource::Autocomplete,
        _ => TopicSource::Rss,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_family_strips_host_suffix() {
        assert_eq!(collector_family("rss_example_com"), "rss");
        assert_eq!(collector_family("reddit"), "reddit");
    }

    #[test]
    fn dominant_topic_source_picks_majority_family() {
        let mut a = sample_doc("reddit");
        let mut b = sample_doc("reddit");
        let c = sample_doc("rss_example_com");
        a.id = "a".into();
        b.id = "b".into();
        let members = vec![&a, &b, &c];
        assert_eq!(dominant_topic_source(&members), TopicSource::Reddit);
    }

    fn sample_doc(source: &str) -> Document {
        Document {
            id: "x".into(),
            source: source.into(),
            source_url: "https://example.com".into(),
            canonical_url: "https://example.com".into(),
            title: "t".into(),
            content: "c".into(),
            summary: "s".into(),
            language: "en".into(),
            domain: "tech".into(),
            market: "US".into(),
            vertical: "".into(),
            content_hash: "h".into(),
            published_at: None,
            fetched_at: Utc::now(),
            author: None,
            entities: vec![],
            keywords: vec![],
            reliability_score: 0.5,
            paywall: false,
            status: crate::core::types::DocumentStatus::New,
        }
    }
}
