//! BREADTH backend — free metasearch over many engines, tracking which
//! engines actually responded (spec §4.7). Backed by a SearXNG instance's
//! JSON API; the teacher's `tools::search::InternalSearchService` runs the
//! same "many engines, union the results" idea by scraping each engine
//! directly — here one HTTP call does the fan-out server-side.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::collectors::HealthTracker;
use crate::core::types::{Backend, Horizon, SearchResult};
use crate::ratelimit::HostGovernor;

use super::{domain_of, HealthStatus, ResearchBackend};

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
pub const SEARXNG_BASE_URL_ENV: &str = "SEARXNG_BASE_URL";
const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const COST_PER_QUERY: f64 = 0.0;

#[derive(Debug, Deserialize, Default)]
struct SearxngResponse {
    #[serde(default)]
    results: Vec<SearxngResult>,
    #[serde(default)]
    unresponsive_engines: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SearxngResult {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: Option<f32>,
    #[serde(default, rename = "publishedDate")]
    published_date: Option<String>,
    #[serde(default)]
    engine: Option<String>,
    #[serde(default)]
    engines: Vec<String>,
}

pub struct SearxngBackend {
    client: reqwest::Client,
    governor: Arc<HostGovernor>,
    health: HealthTracker,
    base_url: String,
}

impl SearxngBackend {
    pub fn new(client: reqwest::Client, governor: Arc<HostGovernor>) -> Self {
        let base_url =
            std::env::var(SEARXNG_BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self {
            client,
            governor,
            health: HealthTracker::new(),
            base_url,
        }
    }

    fn host(&self) -> String {
        url::Url::parse(&self.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| self.base_url.clone())
    }
}

#[async_trait]
impl ResearchBackend for SearxngBackend {
    fn name(&self) -> &'static str {
        "searxng"
    }

    fn horizon(&self) -> Horizon {
        Horizon::Breadth
    }

    fn cost_per_query(&self) -> f64 {
        COST_PER_QUERY
    }

    fn supports_citations(&self) -> bool {
        false
    }

    async fn search(&self, query: &str, max_results: usize) -> Vec<SearchResult> {
        let host = self.host();
        if self.health.should_skip(&host) {
            return vec![];
        }
        self.governor.acquire(&host).await;

        let Ok(url) = url::Url::parse_with_params(
            &format!("{}/search", self.base_url.trim_end_matches('/')),
            &[("q", query), ("format", "json")],
        ) else {
            return vec![];
        };

        let request = self.client.get(url).send();
        let result = crate::ratelimit::with_timeout(FETCH_TIMEOUT, request).await;
        let parsed = match result {
            Some(Ok(resp)) if resp.status().is_success() => resp.json::<SearxngResponse>().await,
            Some(Ok(resp)) => {
                tracing::warn!(status = %resp.status(), "searxng backend: non-success response");
                self.health.record_failure(&host);
                return vec![];
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "searxng backend: request failed");
                self.health.record_failure(&host);
                return vec![];
            }
            None => {
                self.health.record_failure(&host);
                return vec![];
            }
        };

        match parsed {
            Ok(parsed) => {
                self.health.record_success(&host);
                let mut engines_seen: HashSet<String> = HashSet::new();
                let out = parsed
                    .results
                    .into_iter()
                    .take(max_results)
                    .map(|r| {
                        if let Some(e) = &r.engine {
                            engines_seen.insert(e.clone());
                        }
                        for e in &r.engines {
                            engines_seen.insert(e.clone());
                        }
                        SearchResult {
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
                            backend: Backend::Searxng,
                            score: r.score,
                        }
                    })
                    .collect::<Vec<_>>();
                tracing::debug!(
                    engines = engines_seen.len(),
                    unresponsive = parsed.unresponsive_engines.len(),
                    "searxng backend: engines responded"
                );
                out
            }
            Err(e) => {
                tracing::warn!(error = %e, "searxng backend: parse failed");
                self.health.record_failure(&host);
                vec![]
            }
        }
    }

    async fn health_check(&self) -> HealthStatus {
        if self.health.should_skip(&self.host()) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Ok
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base_url_used_when_env_absent() {
        std::env::remove_var(SEARXNG_BASE_URL_ENV);
        let backend = SearxngBackend::new(reqwest::Client::new(), Arc::new(HostGovernor::new(10.0, 4)));
        assert_eq!(backend.base_url, DEFAULT_BASE_URL);
    }
}
