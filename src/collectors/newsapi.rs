//! News-API collector (spec §4.4): queries a news aggregator with keywords,
//! language, and a date window; breaking-news window defaults to 24h.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use crate::core::config::MarketConfig;
use crate::core::types::Document;
use crate::ratelimit::HostGovernor;

use super::{health::HealthTracker, Collector};

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_BREAKING_WINDOW_HOURS: i64 = 24;
pub const NEWSAPI_HOST: &str = "api.thenewsapi.com";
pub const NEWSAPI_KEY_ENV: &str = "NEWSAPI_KEY";

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
    #[serde(default)]
    source: String,
}

pub struct NewsApiCollector {
    client: reqwest::Client,
    governor: Arc<HostGovernor>,
    health: HealthTracker,
    window_hours: i64,
}

impl NewsApiCollector {
    pub fn new(client: reqwest::Client, governor: Arc<HostGovernor>) -> Self {
        Self {
            client,
            governor,
            health: HealthTracker::new(),
            window_hours: DEFAULT_BREAKING_WINDOW_HOURS,
        }
    }

    pub fn with_window_hours(mut self, hours: i64) -> Self {
        self.window_hours = hours;
        self
    }

    async fn fetch(&self, config: &MarketConfig) -> Option<Vec<NewsApiArticle>> {
        let Ok(api_key) = std::env::var(NEWSAPI_KEY_ENV) else {
            tracing::debug!("newsapi collector: no API key configured, skipping");
            return None;
        };

        self.governor.acquire(NEWSAPI_HOST).await;
        let since = Utc::now() - chrono::Duration::hours(self.window_hours);

        let url = url::Url::parse_with_params(
            &format!("https://{NEWSAPI_HOST}/v1/news/all"),
            &[
                ("api_token", api_key.as_str()),
                ("search", config.seed_keywords.join(" OR ").as_str()),
                ("language", config.language.as_str()),
                ("published_after", since.to_rfc3339().as_str()),
            ],
        )
        .ok()?;

        let result = crate::ratelimit::with_timeout(FETCH_TIMEOUT, self.client.get(url).send()).await;
        match result {
            Some(Ok(resp)) if resp.status().is_success() => {
                match resp.json::<NewsApiResponse>().await {
                    Ok(parsed) => {
                        self.health.record_success(NEWSAPI_HOST);
                        Some(parsed.data)
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "newsapi collector: parse failed");
                        self.health.record_failure(NEWSAPI_HOST);
                        None
                    }
                }
            }
            _ => {
                self.health.record_failure(NEWSAPI_HOST);
                None
            }
        }
    }
}

#[async_trait]
impl Collector for NewsApiCollector {
    fn name(&self) -> &'static str {
        "newsapi"
    }

    async fn collect(&self, config: &MarketConfig) -> Vec<Document> {
        if self.health.should_skip(NEWSAPI_HOST) {
            return vec![];
        }
        let _permit = self.governor.concurrency_slot().await;
        let Some(articles) = self.fetch(config).await else {
            return vec![];
        };

        articles
            .into_iter()
            .map(|a| {
                let published_at = a
                    .published_at
                    .as_deref()
                    .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                    .map(|d| d.with_timezone(&Utc));
                let summary = if !a.description.is_empty() {
                    a.description.clone()
                } else {
                    a.snippet.clone()
                };
                super::build_document(
                    config,
                    format!("newsapi_{}", a.source),
                    a.url,
                    a.title,
                    format!("{}\n\n{}", summary, a.snippet),
                    summary,
                    published_at,
                    None,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_window_is_24_hours() {
        assert_eq!(DEFAULT_BREAKING_WINDOW_HOURS, 24);
    }
}
