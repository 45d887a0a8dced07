//! Reddit collector (spec §4.4): public JSON listing endpoints, sort modes
//! `hot|new|top|rising`, up to N top-level comments per post appended to the
//! document content, quality-filtered by score and content length.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;

use crate::core::config::MarketConfig;
use crate::core::types::Document;
use crate::ratelimit::{HostGovernor, REDDIT_HOST_RATE};

use super::{health::HealthTracker, Collector};

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_COMMENT_LIMIT: usize = 5;
const DEFAULT_MIN_SCORE: i64 = 5;
const DEFAULT_MIN_LEN: usize = 80;

#[derive(Debug, Clone, Copy)]
pub enum SortMode {
    Hot,
    New,
    Top,
    Rising,
}

impl SortMode {
    fn as_str(&self) -> &'static str {
        match self {
            SortMode::Hot => "hot",
            SortMode::New => "new",
            SortMode::Top => "top",
            SortMode::Rising => "rising",
        }
    }
}

pub struct RedditCollector {
    client: reqwest::Client,
    governor: Arc<HostGovernor>,
    health: HealthTracker,
    sort: SortMode,
    time_filter: Option<&'static str>,
    comment_limit: usize,
    min_score: i64,
    min_len: usize,
}

impl RedditCollector {
    pub fn new(client: reqwest::Client, governor: Arc<HostGovernor>) -> Self {
        Self {
            client,
            governor,
            health: HealthTracker::new(),
            sort: SortMode::Hot,
            time_filter: None,
            comment_limit: DEFAULT_COMMENT_LIMIT,
            min_score: DEFAULT_MIN_SCORE,
            min_len: DEFAULT_MIN_LEN,
        }
    }

    pub fn with_sort(mut self, sort: SortMode, time_filter: Option<&'static str>) -> Self {
        self.sort = sort;
        self.time_filter = time_filter;
        self
    }

    async fn fetch_json(&self, url: &str) -> Option<serde_json::Value> {
        self.governor.acquire("reddit.com").await;
        let req = self
            .client
            .get(url)
            .header("User-Agent", "topicscout/0.1 (research agent)");
        let result = crate::ratelimit::with_timeout(FETCH_TIMEOUT, req.send()).await;
        match result {
            Some(Ok(resp)) if resp.status().is_success() => resp.json().await.ok(),
            _ => None,
        }
    }

    async fn collect_subreddit(&self, subreddit: &str, config: &MarketConfig) -> Vec<Document> {
        if self.health.should_skip(subreddit) {
            return vec![];
        }

        let mut url = format!(
            "https://www.reddit.com/r/{}/{}.json?limit=25",
            subreddit,
            self.sort.as_str()
        );
        if let Some(t) = self.time_filter {
            url.push_str(&format!("&t={t}"));
        }

        let Some(listing) = self.fetch_json(&url).await else {
            self.health.record_failure(subreddit);
            return vec![];
        };
        self.health.record_success(subreddit);

        let posts = listing["data"]["children"].as_array().cloned().unwrap_or_default();
        let mut docs = Vec::new();

        for child in posts {
            let post: RedditPost = match serde_json::from_value(child["data"].clone()) {
                Ok(p) => p,
                Err(_) => continue,
            };
            if post.score < self.min_score {
                continue;
            }
            let body = if !post.selftext.is_empty() {
                post.selftext.clone()
            } else {
                post.title.clone()
            };
            if body.len() < self.min_len {
                continue;
            }

            let comments = self
                .fetch_top_comments(subreddit, &post.id)
                .await
                .unwrap_or_default();
            let mut content = body.clone();
            if !comments.is_empty() {
                content.push_str("\n\n--- top comments ---\n");
                content.push_str(&comments.join("\n\n"));
            }

            let published_at = Utc.timestamp_opt(post.created_utc as i64, 0).single();
            let permalink = format!("https://www.reddit.com{}", post.permalink);

            docs.push(super::build_document(
                config,
                format!("reddit_{subreddit}"),
                permalink,
                post.title,
                content,
                body,
                published_at,
                Some(post.author),
            ));
        }
        docs
    }

    async fn fetch_top_comments(&self, subreddit: &str, post_id: &str) -> Option<Vec<String>> {
        let url = format!(
            "https://www.reddit.com/r/{subreddit}/comments/{post_id}.json?limit={}",
            self.comment_limit
        );
        let value = self.fetch_json(&url).await?;
        let comments_listing = value.as_array()?.get(1)?;
        let children = comments_listing["data"]["children"].as_array()?;

        let mut out = Vec::new();
        for child in children {
            let kind = child["kind"].as_str().unwrap_or_default();
            if kind != "t1" {
                continue;
            }
            let body = child["data"]["body"].as_str().unwrap_or_default();
            let author = child["data"]["author"].as_str().unwrap_or_default();
            if body.is_empty() || body == "[deleted]" || body == "[removed]" || author == "[deleted]" {
                continue;
            }
            out.push(body.to_string());
            if out.len() >= self.comment_limit {
                break;
            }
        }
        Some(out)
    }
}

#[derive(Debug, Deserialize)]
struct RedditPost {
    id: String,
    title: String,
    #[serde(default)]
    selftext: String,
    score: i64,
    author: String,
    permalink: String,
    created_utc: f64,
}

#[async_trait]
impl Collector for RedditCollector {
    fn name(&self) -> &'static str {
        "reddit"
    }

    async fn collect(&self, config: &MarketConfig) -> Vec<Document> {
        if !config.collectors.reddit_enabled {
            return vec![];
        }
        let _permit = self.governor.concurrency_slot().await;
        let mut docs = Vec::new();
        for subreddit in &config.collectors.reddit_subreddits {
            docs.extend(self.collect_subreddit(subreddit, config).await);
        }
        docs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reddit_host_rate_matches_spec() {
        assert_eq!(REDDIT_HOST_RATE, 1.0);
    }
}
