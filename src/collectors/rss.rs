//! RSS/Atom collector (spec §4.4). Parses RSS 1.0/2.0/Atom via `feed-rs`,
//! sends conditional-GET headers from a 30-day feed cache, and falls back to
//! the feed's summary when full-article extraction fails.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use url::Url;

use crate::core::config::MarketConfig;
use crate::core::types::Document;
use crate::ratelimit::{HostGovernor, RSS_HOST_RATE};
use crate::store::Store;

use super::{extract::extract_article_text, health::HealthTracker, Collector};

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

pub struct RssCollector {
    client: reqwest::Client,
    store: Arc<Store>,
    governor: Arc<HostGovernor>,
    health: HealthTracker,
}

impl RssCollector {
    pub fn new(client: reqwest::Client, store: Arc<Store>, governor: Arc<HostGovernor>) -> Self {
        Self {
            client,
            store,
            governor,
            health: HealthTracker::new(),
        }
    }

    async fn fetch_feed(&self, feed_url: &str) -> FeedFetchOutcome {
        let host = Url::parse(feed_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| feed_url.to_string());
        self.governor.acquire(&host).await;

        let cached = self.store.get_feed_cache(feed_url).unwrap_or(None);

        let mut req = self.client.get(feed_url);
        if let Some(cache) = &cached {
            if let Some(etag) = &cache.etag {
                req = req.header(IF_NONE_MATCH, etag);
            }
            if let Some(lm) = &cache.last_modified {
                req = req.header(IF_MODIFIED_SINCE, lm);
            }
        }

        let result = crate::ratelimit::with_timeout(FETCH_TIMEOUT, req.send()).await;
        match result {
            None => {
                self.health.record_failure(feed_url);
                FeedFetchOutcome::Failed
            }
            Some(Err(e)) => {
                tracing::warn!(feed_url, error = %e, "rss fetch failed");
                self.health.record_failure(feed_url);
                FeedFetchOutcome::Failed
            }
            Some(Ok(resp)) => {
                if resp.status().as_u16() == 304 {
                    self.health.record_success(feed_url);
                    return FeedFetchOutcome::NotModified;
                }
                if !resp.status().is_success() {
                    self.health.record_failure(feed_url);
                    return FeedFetchOutcome::Failed;
                }
                let etag = resp
                    .headers()
                    .get(ETAG)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let last_modified = resp
                    .headers()
                    .get(LAST_MODIFIED)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                match resp.bytes().await {
                    Ok(body) => {
                        self.health.record_success(feed_url);
                        let _ = self.store.save_feed_cache(
                            feed_url,
                            etag.as_deref(),
                            last_modified.as_deref(),
                        );
                        FeedFetchOutcome::Body(body.to_vec())
                    }
                    Err(e) => {
                        tracing::warn!(feed_url, error = %e, "rss body read failed");
                        self.health.record_failure(feed_url);
                        FeedFetchOutcome::Failed
                    }
                }
            }
        }
    }

    async fn collect_one_feed(&self, feed_url: &str, config: &MarketConfig) -> Vec<Document> {
        if self.health.should_skip(feed_url) {
            tracing::debug!(feed_url, "skipping feed: backing off after repeated failures");
            return vec![];
        }

        let body = match self.fetch_feed(feed_url).await {
            FeedFetchOutcome::NotModified | FeedFetchOutcome::Failed => return vec![],
            FeedFetchOutcome::Body(b) => b,
        };

        let feed = match feed_rs::parser::parse(body.as_slice()) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(feed_url, error = %e, "feed parse failed");
                self.health.record_failure(feed_url);
                return vec![];
            }
        };

        let host = Url::parse(feed_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".into());
        let source_tag = format!("rss_{}", host.replace('.', "_"));

        let mut docs = Vec::with_capacity(feed.entries.len());
        for entry in feed.entries {
            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default();
            if link.is_empty() {
                continue;
            }
            let title = entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "(untitled)".into());
            let summary = entry
                .summary
                .map(|s| s.content)
                .unwrap_or_default();
            let published_at = entry.published.or(entry.updated);

            let full_text = match self.fetch_article_html(&link).await {
                Some(html) => extract_article_text(&html, &link),
                None => None,
            };
            let content = full_text.unwrap_or_else(|| summary.clone());
            let author = entry.authors.first().map(|a| a.name.clone());

            docs.push(super::build_document(
                config,
                source_tag.clone(),
                link,
                title,
                content,
                summary,
                published_at,
                author,
            ));
        }
        docs
    }

    async fn fetch_article_html(&self, url: &str) -> Option<String> {
        let host = Url::parse(url).ok()?.host_str()?.to_string();
        self.governor.acquire(&host).await;
        let result = crate::ratelimit::with_timeout(FETCH_TIMEOUT, self.client.get(url).send()).await;
        match result {
            Some(Ok(resp)) if resp.status().is_success() => resp.text().await.ok(),
            _ => None,
        }
    }
}

enum FeedFetchOutcome {
    Body(Vec<u8>),
    NotModified,
    Failed,
}

#[async_trait]
impl Collector for RssCollector {
    fn name(&self) -> &'static str {
        "rss"
    }

    async fn collect(&self, config: &MarketConfig) -> Vec<Document> {
        if !config.collectors.rss_enabled {
            return vec![];
        }
        let feeds = config.collectors.custom_feeds.clone();
        let _permit = self.governor.concurrency_slot().await;
        let mut docs = Vec::new();
        for feed_url in &feeds {
            docs.extend(self.collect_one_feed(feed_url, config).await);
        }
        docs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rss_host_rate_matches_spec() {
        assert_eq!(RSS_HOST_RATE, 2.0);
    }
}
