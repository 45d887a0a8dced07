//! CURATED backend — RSS queries turned into SearchResult-shaped records
//! (spec §4.7). Delegates the actual fetch/parse to the RSS collector
//! (spec §4.4) against a fixed feed list configured at construction, then
//! filters the resulting Documents by token overlap with the query.

use std::sync::Arc;

use async_trait::async_trait;

use crate::collectors::{rss::RssCollector, Collector};
use crate::core::config::MarketConfig;
use crate::core::types::{Backend, Horizon, SearchResult};
use crate::ratelimit::HostGovernor;
use crate::store::Store;
use crate::textutil::tokenize;

use super::{domain_of, HealthStatus, ResearchBackend};

pub const COST_PER_QUERY: f64 = 0.0;

pub struct CuratedBackend {
    rss: RssCollector,
    feeds: Vec<String>,
    probe_config: MarketConfig,
}

impl CuratedBackend {
    pub fn new(client: reqwest::Client, governor: Arc<HostGovernor>, feeds: Vec<String>) -> Self {
        let store = Arc::new(Store::open_in_memory().expect("in-memory store never fails to open"));
        let mut probe_config = MarketConfig {
            domain: "research".into(),
            market: "global".into(),
            language: "en".into(),
            vertical: String::new(),
            seed_keywords: vec![],
            competitor_urls: vec![],
            collectors: Default::default(),
            scheduling: Default::default(),
            reranker: Default::default(),
            synthesizer: Default::default(),
            deep_research: Default::default(),
        };
        probe_config.collectors.rss_enabled = true;
        probe_config.collectors.custom_feeds = feeds.clone();

        Self {
            rss: RssCollector::new(client, store, governor),
            feeds,
            probe_config,
        }
    }
}

#[async_trait]
impl ResearchBackend for CuratedBackend {
    fn name(&self) -> &'static str {
        "rss"
    }

    fn horizon(&self) -> Horizon {
        Horizon::Curated
    }

    fn cost_per_query(&self) -> f64 {
        COST_PER_QUERY
    }

    fn supports_citations(&self) -> bool {
        false
    }

    async fn search(&self, query: &str, max_results: usize) -> Vec<SearchResult> {
        if self.feeds.is_empty() {
            return vec![];
        }
        let query_tokens: std::collections::HashSet<String> = tokenize(query).into_iter().collect();
        if query_tokens.is_empty() {
            return vec![];
        }

        let mut docs = self.rss.collect(&self.probe_config).await;
        docs.retain(|d| {
            let doc_tokens: std::collections::HashSet<String> =
                tokenize(&format!("{} {}", d.title, d.content)).into_iter().collect();
            !query_tokens.is_disjoint(&doc_tokens)
        });
        docs.sort_by(|a, b| b.published_at.cmp(&a.published_at));

        docs.into_iter()
            .take(max_results)
            .map(|d| SearchResult {
                domain: domain_of(&d.source_url),
                url: d.source_url,
                title: d.title,
                snippet: d.summary,
                content: Some(d.content),
                published_date: d.published_at,
                backend: Backend::Rss,
                score: None,
            })
            .collect()
    }

    async fn health_check(&self) -> HealthStatus {
        if self.feeds.is_empty() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Ok
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_feed_list_yields_empty_results_and_degraded_health() {
        let backend = CuratedBackend::new(reqwest::Client::new(), Arc::new(HostGovernor::new(10.0, 4)), vec![]);
        assert!(backend.search("electric vehicles", 10).await.is_empty());
        assert_eq!(backend.health_check().await, HealthStatus::Degraded);
    }
}
