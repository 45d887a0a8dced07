//! DEPTH backend — authoritative/academic search, paid per call (spec §4.7).
//! Wraps the Tavily search API, the teacher's closest paid-provider shape
//! (`tools::search::engines::*` hit free SERPs by scraping; this one calls a
//! JSON API directly, so the HTTP plumbing follows `collectors::newsapi`
//! instead).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::collectors::HealthTracker;
use crate::core::types::{Backend, Horizon, SearchResult};
use crate::ratelimit::HostGovernor;

use super::{domain_of, HealthStatus, ResearchBackend};

const FETCH_TIMEOUT: Duration = Duration::from_secs(20);
pub const TAVILY_HOST: &str = "api.tavily.com";
pub const TAVILY_KEY_ENV: &str = "TAVILY_API_KEY";
/// Paid per call (spec §4.7, §4.8 cost budget default $0.02/topic fan-out).
pub const COST_PER_QUERY: f64 = 0.01;

#[derive(Debug, Deserialize, Default)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: Option<f32>,
    #[serde(default)]
    published_date: Option<String>,
}

pub struct TavilyBackend {
    client: reqwest::Client,
    governor: Arc<HostGovernor>,
    health: HealthTracker,
}

impl TavilyBackend {
    pub fn new(client: reqwest::Client, governor: Arc<HostGovernor>) -> Self {
        Self {
            client,
            governor,
            health: HealthTracker::new(),
        }
    }
}

#[async_trait]
impl ResearchBackend for TavilyBackend {
    fn name(&self) -> &'static str {
        "tavily"
    }

    fn horizon(&self) -> Horizon {
        Horizon::Depth
    }

    fn cost_per_query(&self) -> f64 {
        COST_PER_QUERY
    }

    fn supports_citations(&self) -> bool {
        true
    }

    async fn search(&self, query: &str, max_results: usize) -> Vec<SearchResult> {
        let Ok(api_key) = std::env::var(TAVILY_KEY_ENV) else {
            tracing::debug!("tavily backend: no API key configured, skipping");
            return vec![];
        };
        if self.health.should_skip(TAVILY_HOST) {
            return vec![];
        }

        self.governor.acquire(TAVILY_HOST).await;

        let body = serde_json::json!({
            "api_key": api_key,
            "query": query,
            "search_depth": "advanced",
            "max_results": max_results,
        });

        let request = self
            .client
            .post(format!("https://{TAVILY_HOST}/search"))
            .json(&body)
            .send();

        let result = crate::ratelimit::with_timeout(FETCH_TIMEOUT, request).await;
        let parsed = match result {
            Some(Ok(resp)) if resp.status().is_success() => resp.json::<TavilyResponse>().await,
            Some(Ok(resp)) => {
                tracing::warn!(status = %resp.status(), "tavily backend: non-success response");
                self.health.record_failure(TAVILY_HOST);
                return vec![];
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "tavily backend: request failed");
                self.health.record_failure(TAVILY_HOST);
                return vec![];
            }
            None => {
                self.health.record_failure(TAVILY_HOST);
                return vec![];
            }
        };

        match parsed {
            Ok(parsed) => {
                self.health.record_success(TAVILY_HOST);
                parsed
                    .results
                    .into_iter()
                    .take(max_results)
                    .map(|r| SearchResult {
                        domain: domain_of(&r.url),
                        url: r.url,
                        title: r.title,
                        snippet: r.content,
                        content: None,
                        published_date: r
                            .published_date
                            .as_deref()
                            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                            .map(|d| d.with_timezone(&chrono::Utc)),
                        backend: Backend::Tavily,
                        score: r.score,
                    })
                    .collect()
            }
            Err(e) => {
                tracing::warn!(error = %e, "tavily backend: parse failed");
                self.health.record_failure(TAVILY_HOST);
                vec![]
            }
        }
    }

    async fn health_check(&self) -> HealthStatus {
        if std::env::var(TAVILY_KEY_ENV).is_err() {
            return HealthStatus::Failed;
        }
        if self.health.should_skip(TAVILY_HOST) {
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
    async fn search_without_api_key_returns_empty() {
        std::env::remove_var(TAVILY_KEY_ENV);
        let backend = TavilyBackend::new(reqwest::Client::new(), Arc::new(HostGovernor::new(10.0, 4)));
        let results = backend.search("electric vehicles", 5).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn health_check_fails_without_api_key() {
        std::env::remove_var(TAVILY_KEY_ENV);
        let backend = TavilyBackend::new(reqwest::Client::new(), Arc::new(HostGovernor::new(10.0, 4)));
        assert_eq!(backend.health_check().await, HealthStatus::Failed);
    }
}
