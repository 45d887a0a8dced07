//! Trends collector (spec §4.4): grounded search via an LLM backend
//! returning keyword-trend phrases. No scraping — the LLM provider is the
//! only external call.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::core::config::MarketConfig;
use crate::core::types::Document;
use crate::llm::{self, LlmProvider};

use super::Collector;

pub struct TrendsCollector {
    provider: Arc<dyn LlmProvider>,
}

impl TrendsCollector {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    fn build_prompt(config: &MarketConfig) -> String {
        format!(
            "List 10 currently trending search phrases for the \"{}\" vertical in the \"{}\" \
             market, language {}. Seed keywords: {}. Respond as a JSON array of short phrase \
             strings, most trending first.",
            config.vertical,
            config.market,
            config.language,
            config.seed_keywords.join(", "),
        )
    }
}

#[async_trait]
impl Collector for TrendsCollector {
    fn name(&self) -> &'static str {
        "trends"
    }

    async fn collect(&self, config: &MarketConfig) -> Vec<Document> {
        if !config.collectors.trends_enabled {
            return vec![];
        }

        let prompt = Self::build_prompt(config);
        let response =
            match llm::generate_with_deadline(self.provider.as_ref(), &prompt, None, true).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(error = %e, "trends collector: llm call failed");
                    return vec![];
                }
            };

        let phrases: Vec<String> = match llm::extract_json(&response.content) {
            Some(serde_json::Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => {
                tracing::warn!("trends collector: could not parse LLM response as a JSON array");
                vec![]
            }
        };

        phrases
            .into_iter()
            .map(|phrase| {
                super::build_document(
                    config,
                    "trends".to_string(),
                    format!("trends://{}", phrase.replace(' ', "-")),
                    phrase.clone(),
                    phrase.clone(),
                    phrase,
                    Some(Utc::now()),
                    None,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{CollectorsConfig, MarketConfig};
    use crate::llm::FallbackLlmProvider;

    fn config() -> MarketConfig {
        MarketConfig {
            domain: "ev".into(),
            market: "Germany".into(),
            language: "de".into(),
            vertical: "automotive".into(),
            seed_keywords: vec!["electric vehicles".into()],
            competitor_urls: vec![],
            collectors: CollectorsConfig {
                trends_enabled: true,
                ..Default::default()
            },
            scheduling: Default::default(),
            reranker: Default::default(),
            synthesizer: Default::default(),
            deep_research: Default::default(),
        }
    }

    #[tokio::test]
    async fn disabled_returns_empty() {
        let mut cfg = config();
        cfg.collectors.trends_enabled = false;
        let collector = TrendsCollector::new(Arc::new(FallbackLlmProvider));
        assert!(collector.collect(&cfg).await.is_empty());
    }

    #[tokio::test]
    async fn fallback_provider_never_panics() {
        let collector = TrendsCollector::new(Arc::new(FallbackLlmProvider));
        // The fallback echoes the prompt rather than a phrase array, so this
        // exercises the "could not parse as array" degradation path.
        let docs = collector.collect(&config()).await;
        assert!(docs.is_empty());
    }
}
