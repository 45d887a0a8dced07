//! BREAKING backend — real-time news API with date-window filtering (spec
//! §4.7). Same provider as `collectors::newsapi`, called directly with the
//! query instead of the configured seed keywords.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use crate::collectors::HealthTracker;
use crate::collectors::newsapi::{NEWSAPI_HOST, NEWSAPI_KEY_ENV};
use crate::core::types::{Backend, Horizon, SearchResult};
use crate::ratelimit::HostGovernor;

use super::{domain_of, HealthStatus, ResearchBackend};

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_WINDOW_HOURS: i64 = 24;
pub const COST_PER_QUERY: f64 = 0.0;

#[derive(Debug, Deserialize, Default)]
struct NewsApiResponse {
    #[serde(default)]
    data: Vec<NewsApiArticle>,
}

#[derive(Debug, Deserialize)]
struct NewsApiArticle {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    snippet: String,
    url: String,
    #[serde(default)]
    published_at: Option<String>,
}

pub struct NewsApiBackend {
    client: reqwest::Client,
    governor: Arc<HostGovernor>,
    health: HealthTracker,
    window_hours: i64,
}

impl NewsApiBackend {
    pub fn new(client: reqwest::Client, governor: Arc<HostGovernor>) -> Self {
        Self {
            client,
            governor,
            health: HealthTracker::new(),
            window_hours: DEFAULT_WINDOW_HOURS,
        }
    }
}

#[async_trait]
impl ResearchBackend for NewsApiBackend {
    fn name(&self) -> &'static str {
        "thenewsapi"
    }

    fn horizon(&self) -> Horizon {
        Horizon::Breaking
    }

    fn cost_per_query(&self) -> f64 {
        COST_PER_QUERY
    }

    fn supports_citations(&self) -> bool {
        false
    }

    async fn search(&self, query: &str, max_results: usize) -> Vec<SearchResult> {
        let Ok(api_key) = std::env::var(NEWSAPI_KEY_ENV) else {
            tracing::debug!("thenewsapi backend: no API key configured, skipping");
            return vec![];
        };
        if self.health.should_skip(NEWSAPI_HOST) {
            return vec![];
        }
        self.governor.acquire(NEWSAPI_HOST).await;

        let since = Utc::now() - chrono::Duration::hours(self.window_hours);
        let Ok(url) = url::Url::parse_with_params(
            &format!("https://{NEWSAPI_HOST}/v1/news/all"),
            &[
                ("api_token", api_key.as_str()),
                ("search", query),
                ("published_after", since.to_rfc3339().as_str()),
                ("limit", max_results.to_string().as_str()),
            ],
        ) else {
            return vec![];
        };

        let request = self.client.get(url).send();
        let result = crate::ratelimit::with_timeout(FETCH_TIMEOUT, request).await;
        let parsed = match result {
            Some(Ok(resp)) if resp.status().is_success() => resp.json::<NewsApiResponse>().await,
            Some(Ok(resp)) => {
                tracing::warn!(status = %resp.status(), "thenewsapi backend: non-success response");
                self.health.record_failure(NEWSAPI_HOST);
                return vec![];
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "thenewsapi backend: request failed");
                self.health.record_failure(NEWSAPI_HOST);
                return vec![];
            }
            None => {
                self.health.record_failure(NEWSAPI_HOST);
                return vec![];
            }
        };

        match parsed {
            Ok(parsed) => {
                self.health.record_success(NEWSAPI_HOST);
                parsed
                    .data
                    .into_iter()
                    .take(max_results)
                    .map(|a| {
                        let snippet = if !a.description.is_empty() {
                            a.description
                        } else {
                            a.snippet
                        };
                        SearchResult {
                            domain: domain_of(&a.url),
                            url: a.url,
                            title: a.title,
                            snippet,
                            content: None,
                            published_date: a
                                .published_at
                                .as_deref()
                                .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                                .map(|d| d.with_timezone(&Utc)),
                            backend: Backend::Thenewsapi,
                            score: None,
                        }
                    })
                    .collect()
            }
            Err(e) => {
                tracing::warn!(error = %e, "thenewsapi backend: parse failed");
                self.health.record_failure(NEWSAPI_HOST);
                vec![]
            }
        }
    }

    async fn health_check(&self) -> HealthStatus {
        if std::env::var(NEWSAPI_KEY_ENV).is_err() {
            return HealthStatus::Failed;
        }
        if self.health.should_skip(NEWSAPI_HOST) {
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
        std::env::remove_var(NEWSAPI_KEY_ENV);
        let backend = NewsApiBackend::new(reqwest::Client::new(), Arc::new(HostGovernor::new(10.0, 4)));
        assert!(backend.search("electric vehicles", 5).await.is_empty());
    }
}
