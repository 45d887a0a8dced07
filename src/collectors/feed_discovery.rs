//! Feed discovery collector (spec §4.4): two stages — (1) static/OPML feeds
//! from config, (2) LLM keyword expansion -> grounded-search URL candidates
//! -> feed auto-discovery link probing, each host under a hard 10s timeout.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::core::config::MarketConfig;
use crate::core::types::Document;
use crate::llm::{self, LlmProvider};
use crate::ratelimit::{HostGovernor, FEED_DISCOVERY_TIMEOUT};

use super::{rss::RssCollector, Collector};

pub struct FeedDiscoveryCollector {
    client: reqwest::Client,
    provider: Arc<dyn LlmProvider>,
    governor: Arc<HostGovernor>,
}

impl FeedDiscoveryCollector {
    pub fn new(
        client: reqwest::Client,
        provider: Arc<dyn LlmProvider>,
        governor: Arc<HostGovernor>,
    ) -> Self {
        Self {
            client,
            provider,
            governor,
        }
    }

    /// Stage 2a: ask the LLM (grounded) for candidate host URLs matching
    /// `"<keyword>" rss OR feed`. Returns whatever `grounding_metadata`
    /// offers — sources when present, otherwise bare query strings are
    /// useless for this stage and are dropped (spec §9 open question: the
    /// sources field may be absent).
    async fn discover_candidate_hosts(&self, seed: &str) -> Vec<String> {
        let prompt = format!("\"{seed}\" rss OR feed");
        match llm::generate_with_deadline(self.provider.as_ref(), &prompt, None, true).await {
            Ok(resp) => resp
                .grounding_metadata
                .and_then(|g| g.sources)
                .unwrap_or_default(),
            Err(e) => {
                tracing::debug!(seed, error = %e, "feed discovery: grounded search failed");
                vec![]
            }
        }
    }

    /// Stage 2b: visit a host and probe for `<link rel="alternate">` feed
    /// auto-discovery tags, under a hard per-host deadline.
    async fn probe_feed_links(&self, page_url: &str) -> Vec<String> {
        let Ok(parsed) = url::Url::parse(page_url) else {
            return vec![];
        };
        let Some(host) = parsed.host_str().map(str::to_string) else {
            return vec![];
        };
        self.governor.acquire(&host).await;

        let fetch = self.client.get(page_url).send();
        let result = crate::ratelimit::with_timeout(FEED_DISCOVERY_TIMEOUT, fetch).await;
        let Some(Ok(resp)) = result else {
            return vec![];
        };
        if !resp.status().is_success() {
            return vec![];
        }
        let Ok(body) = resp.text().await else {
            return vec![];
        };

        let document = Html::parse_document(&body);
        let Ok(selector) = Selector::parse(
            r#"link[type="application/rss+xml"], link[type="application/atom+xml"]"#,
        ) else {
            return vec![];
        };

        document
            .select(&selector)
            .filter_map(|el| el.value().attr("href"))
            .filter_map(|href| parsed.join(href).ok())
            .map(|u| u.to_string())
            .collect()
    }
}

#[async_trait]
impl Collector for FeedDiscoveryCollector {
    fn name(&self) -> &'static str {
        "feed_discovery"
    }

    async fn collect(&self, config: &MarketConfig) -> Vec<Document> {
        let _permit = self.governor.concurrency_slot().await;

        // Stage 1: static feeds declared directly in config.
        let mut feed_urls: Vec<String> = config.collectors.custom_feeds.clone();

        // Stage 2: keyword expansion -> candidate hosts -> auto-discovery probe.
        for seed in &config.seed_keywords {
            let hosts = self.discover_candidate_hosts(seed).await;
            for host_url in hosts {
                let discovered = self.probe_feed_links(&host_url).await;
                feed_urls.extend(discovered);
            }
        }
        feed_urls.sort();
        feed_urls.dedup();

        if feed_urls.is_empty() {
            return vec![];
        }

        // Hand the discovered feed list to the RSS collector's fetch/parse
        // pipeline rather than duplicating it — discovery's job is finding
        // feeds, not parsing them twice.
        let mut discovery_config = config.clone();
        discovery_config.collectors.custom_feeds = feed_urls;
        let rss = RssCollector::new(self.client.clone(), store_noop(), self.governor.clone());
        rss.collect(&discovery_config).await
    }
}

/// `RssCollector` needs a `Store` handle for its feed cache; feed discovery
/// runs conditional-GET-free (it only probes for link tags, doesn't rely on
/// 304 caching), so an ephemeral in-memory store is enough here.
fn store_noop() -> Arc<crate::store::Store> {
    Arc::new(crate::store::Store::open_in_memory().expect("in-memory store never fails to open"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_link_selector_matches_rss_and_atom() {
        let html = Html::parse_document(
            r#"<html><head>
                <link rel="alternate" type="application/rss+xml" href="/feed.xml">
                <link rel="alternate" type="application/atom+xml" href="/atom.xml">
               </head></html>"#,
        );
        let selector = Selector::parse(
            r#"link[type="application/rss+xml"], link[type="application/atom+xml"]"#,
        )
        .unwrap();
        let hrefs: Vec<&str> = html
            .select(&selector)
            .filter_map(|el| el.value().attr("href"))
            .collect();
        assert_eq!(hrefs, vec!["/feed.xml", "/atom.xml"]);
    }
}
