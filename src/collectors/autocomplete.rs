//! Autocomplete collector (spec §4.4): three expansion strategies per seed
//! keyword (alphabet, question prefixes, prepositions), deduplicated, with
//! a 30-day response cache.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use moka::future::Cache;

use crate::core::config::MarketConfig;
use crate::core::types::Document;
use crate::ratelimit::{HostGovernor, AUTOCOMPLETE_HOST_RATE};

use super::Collector;

const ALPHABET: &[char] = &[
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's',
    't', 'u', 'v', 'w', 'x', 'y', 'z',
];
const QUESTION_PREFIXES: &[&str] = &["what", "how", "why", "when", "where", "who"];
const PREPOSITIONS: &[&str] = &["for", "with", "without", "near", "vs", "versus"];

const FETCH_TIMEOUT: Duration = Duration::from_secs(5);
const CACHE_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 30);

pub struct AutocompleteCollector {
    client: reqwest::Client,
    governor: Arc<HostGovernor>,
    cache: Cache<String, Vec<String>>,
}

impl AutocompleteCollector {
    pub fn new(client: reqwest::Client, governor: Arc<HostGovernor>) -> Self {
        Self {
            client,
            governor,
            cache: Cache::builder()
                .max_capacity(50_000)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    fn queries_for(seed: &str) -> Vec<String> {
        let mut queries = Vec::with_capacity(38);
        for c in ALPHABET {
            queries.push(format!("{seed} {c}"));
        }
        for p in QUESTION_PREFIXES {
            queries.push(format!("{p} {seed}"));
        }
        for p in PREPOSITIONS {
            queries.push(format!("{seed} {p}"));
        }
        queries
    }

    async fn suggestions_for(&self, query: &str, language: &str) -> Vec<String> {
        if let Some(cached) = self.cache.get(query).await {
            return cached;
        }

        self.governor.acquire("suggestqueries.google.com").await;
        let url = url::Url::parse_with_params(
            "https://suggestqueries.google.com/complete/search",
            &[("client", "firefox"), ("hl", language), ("q", query)],
        );
        let Ok(url) = url else { return vec![] };
        let req = self.client.get(url);
        let result = crate::ratelimit::with_timeout(FETCH_TIMEOUT, req.send()).await;

        let suggestions = match result {
            Some(Ok(resp)) if resp.status().is_success() => {
                match resp.json::<serde_json::Value>().await {
                    Ok(serde_json::Value::Array(arr)) if arr.len() > 1 => arr[1]
                        .as_array()
                        .map(|items| {
                            items
                                .iter()
                                .filter_map(|v| v.as_str().map(str::to_string))
                                .collect()
                        })
                        .unwrap_or_default(),
                    _ => vec![],
                }
            }
            _ => vec![],
        };

        self.cache.insert(query.to_string(), suggestions.clone()).await;
        suggestions
    }
}

#[async_trait]
impl Collector for AutocompleteCollector {
    fn name(&self) -> &'static str {
        "autocomplete"
    }

    async fn collect(&self, config: &MarketConfig) -> Vec<Document> {
        if !config.collectors.autocomplete_enabled {
            return vec![];
        }
        let _permit = self.governor.concurrency_slot().await;

        let mut seen = std::collections::HashSet::new();
        let mut docs = Vec::new();

        for seed in &config.seed_keywords {
            let mut per_seed_suggestions: Vec<String> = Vec::new();
            for (position, q) in Self::queries_for(seed).into_iter().enumerate() {
                let results = self.suggestions_for(&q, &config.language).await;
                for suggestion in results {
                    if !seen.insert(suggestion.clone()) {
                        continue;
                    }
                    per_seed_suggestions.push(suggestion.clone());
                    docs.push(autocomplete_document(config, &suggestion, position));
                }
            }
        }
        docs
    }
}

fn autocomplete_document(config: &MarketConfig, suggestion: &str, position: usize) -> Document {
    super::build_document(
        config,
        "autocomplete".to_string(),
        format!("autocomplete://{}#{position}", suggestion.replace(' ', "-")),
        suggestion.to_string(),
        suggestion.to_string(),
        suggestion.to_string(),
        Some(Utc::now()),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queries_for_seed_has_at_most_38_entries() {
        let queries = AutocompleteCollector::queries_for("electric vehicles");
        assert_eq!(queries.len(), 26 + 6 + 6);
    }

    #[test]
    fn alphabet_strategy_covers_full_alphabet() {
        let queries = AutocompleteCollector::queries_for("ev");
        assert!(queries.contains(&"ev a".to_string()));
        assert!(queries.contains(&"ev z".to_string()));
    }

    #[test]
    fn question_and_preposition_strategies_present() {
        let queries = AutocompleteCollector::queries_for("ev");
        assert!(queries.contains(&"how ev".to_string()));
        assert!(queries.contains(&"ev versus".to_string()));
    }
}
