//! C9 — Cascaded Reranker (spec §4.9). Three stages, each narrowing the
//! pool: lexical BM25 (CPU-only), a "lite" semantic pass behind an
//! `EmbeddingProvider`-shaped external contract, then a full semantic pass
//! combined with six SEO metrics into one weighted score.
//!
//! Stages 2 and 3 are both external-LLM-provider territory per spec §1
//! (out of scope) — a deterministic lexical fallback backs
//! `EmbeddingProvider` so the cascade is always exercisable without a live
//! provider configured, mirroring the teacher's `FallbackLlmProvider`
//! pattern in `llm.rs`.

pub mod bm25;

use std::collections::HashMap;
use std::collections::HashSet;

use async_trait::async_trait;

use crate::core::types::SearchResult;
use crate::dedup::MinHashSignature;
use crate::source_cache::domain_authority;
use crate::textutil::{jaccard, tokenize};

pub const STAGE1_KEEP: usize = 60;
pub const STAGE2_KEEP: usize = 35;

/// A semantic-similarity contract (spec §4.9 "small embedding reranker
/// API" / "full semantic"). One trait backs both the lite (stage 2) and
/// full (stage 3) passes — in a live deployment they'd be two differently
/// configured providers; at this layer they're the same contract.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Similarity between `query` and `text`, in `[0,1]`.
    async fn similarity(&self, query: &str, text: &str) -> f32;
}

/// Deterministic fallback: Jaccard similarity over tokenized text. Used
/// when no embedding provider is configured, and in tests.
pub struct LexicalEmbeddingProvider;

#[async_trait]
impl EmbeddingProvider for LexicalEmbeddingProvider {
    async fn similarity(&self, query: &str, text: &str) -> f32 {
        let q: HashSet<String> = tokenize(query).into_iter().collect();
        let t: HashSet<String> = tokenize(text).into_iter().collect();
        jaccard(&q, &t)
    }
}

/// Locality target built from `MarketConfig.market`/`.language`, which
/// `core::config::load_market_config` already resolves through
/// `coerce_locality` at load time (spec §4.9 — must accept both flat-map
/// and nested-market-config shapes).
#[derive(Debug, Clone, Default)]
pub struct LocalityTarget {
    pub market: String,
    pub language: String,
}

/// Country names/abbreviations mapped to the TLD a result's domain would
/// carry if hosted locally — a small, curated table, not exhaustive.
const MARKET_TLDS: &[(&str, &str)] = &[
    ("germany", "de"),
    ("deutschland", "de"),
    ("united states", "us"),
    ("usa", "us"),
    ("united kingdom", "uk"),
    ("uk", "uk"),
    ("france", "fr"),
    ("spain", "es"),
    ("italy", "it"),
    ("canada", "ca"),
    ("australia", "au"),
    ("japan", "jp"),
    ("netherlands", "nl"),
    ("austria", "at"),
    ("switzerland", "ch"),
    ("brazil", "br"),
    ("mexico", "mx"),
];

fn market_tld(market: &str) -> Option<&'static str> {
    let m = market.to_lowercase();
    MARKET_TLDS.iter().find(|(name, _)| *name == m).map(|(_, tld)| *tld)
}

/// `0.6` for a domain-TLD match against the configured market, `0.4` for a
/// language-stopword-density match against the configured language
/// (reuses the same `tokenize_filtered` stop lists the clusterer/store
/// use); summed, clamped to `[0,1]`.
fn locality(result: &SearchResult, target: &LocalityTarget) -> f32 {
    let mut score = 0.0f32;
    if let Some(tld) = market_tld(&target.market) {
        if result.domain.to_lowercase().ends_with(&format!(".{tld}")) {
            score += 0.6;
        }
    }
    if !target.language.is_empty() {
        let text = format!("{} {}", result.title, result.snippet);
        let all = tokenize(&text);
        if !all.is_empty() {
            let target_kept = crate::textutil::tokenize_filtered(&text, &target.language).len();
            let en_kept = crate::textutil::tokenize_filtered(&text, "en").len();
            if target.language != "en" && target_kept <= en_kept {
                score += 0.4;
            } else if target.language == "en" {
                score += 0.4;
            }
        }
    }
    score.clamp(0.0, 1.0)
}

fn freshness(result: &SearchResult) -> f32 {
    let Some(published) = result.published_date else {
        return 0.5;
    };
    let age_days = (chrono::Utc::now() - published).num_seconds() as f32 / 86_400.0;
    (-age_days.max(0.0) / 30.0).exp()
}

#[derive(Debug, Clone)]
pub struct RerankedResult {
    pub result: SearchResult,
    pub relevance: f32,
    pub novelty: f32,
    pub authority: f32,
    pub freshness: f32,
    pub diversity: f32,
    pub locality: f32,
    pub total_score: f32,
}

pub struct CascadedReranker {
    pub stage1_threshold: f32,
    pub stage2_threshold: f32,
    pub stage3_final_count: usize,
    lite: std::sync::Arc<dyn EmbeddingProvider>,
    full: std::sync::Arc<dyn EmbeddingProvider>,
}

impl CascadedReranker {
    pub fn new(
        stage1_threshold: f32,
        stage2_threshold: f32,
        stage3_final_count: usize,
        lite: std::sync::Arc<dyn EmbeddingProvider>,
        full: std::sync::Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            stage1_threshold,
            stage2_threshold,
            stage3_final_count,
            lite,
            full,
        }
    }

    pub fn with_fallback(stage1_threshold: f32, stage2_threshold: f32, stage3_final_count: usize) -> Self {
        let fallback = std::sync::Arc::new(LexicalEmbeddingProvider);
        Self::new(stage1_threshold, stage2_threshold, stage3_final_count, fallback.clone(), fallback)
    }

    /// Stage 1: BM25 over title+snippet vs `query`. CPU-only; keeps up to
    /// `STAGE1_KEEP` above `stage1_threshold`, sorted descending.
    fn stage1_lexical(&self, results: &[SearchResult], query: &str) -> Vec<(SearchResult, f32)> {
        let docs: Vec<Vec<String>> = results
            .iter()
            .map(|r| tokenize(&format!("{} {}", r.title, r.snippet)))
            .collect();
        let query_tokens = tokenize(query);
        let scores = bm25::score_corpus(&docs, &query_tokens);

        let mut scored: Vec<(SearchResult, f32)> = results
            .iter()
            .cloned()
            .zip(scores)
            .filter(|(_, s)| *s >= self.stage1_threshold)
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(STAGE1_KEEP);
        scored
    }

    /// Stage 2: lite semantic pass. Keeps up to `STAGE2_KEEP` above
    /// `stage2_threshold`, then reinjects stage1 survivors that were
    /// dropped (below threshold or past the cap) whose domain is absent
    /// from the kept set — diversity takes priority over a strict cutoff
    /// here (spec §4.9 step 2).
    async fn stage2_lite_semantic(
        &self,
        stage1: Vec<(SearchResult, f32)>,
        query: &str,
    ) -> Vec<(SearchResult, f32)> {
        let mut scored = Vec::with_capacity(stage1.len());
        for (result, _bm25_score) in stage1 {
            let text = format!("{} {}", result.title, result.snippet);
            let sim = self.lite.similarity(query, &text).await;
            scored.push((result, sim));
        }
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let (mut kept, dropped): (Vec<_>, Vec<_>) =
            scored.into_iter().partition(|(_, s)| *s >= self.stage2_threshold);
        kept.truncate(STAGE2_KEEP);

        let kept_domains: HashSet<String> = kept.iter().map(|(r, _)| r.domain.clone()).collect();
        for (result, score) in dropped {
            if !kept_domains.contains(&result.domain) {
                kept.push((result, score));
            }
        }
        kept
    }

    /// Stage 3: full semantic + 6 SEO metrics, greedily accepted in
    /// descending preliminary order so novelty can be measured against
    /// already-accepted items (spec §4.9 step 3), then re-sorted by the
    /// final weighted total.
    async fn stage3_final(
        &self,
        stage2: Vec<(SearchResult, f32)>,
        query: &str,
        target: &LocalityTarget,
    ) -> Vec<RerankedResult> {
        let mut prelim: Vec<(SearchResult, f32, f32, f32, f32)> = Vec::with_capacity(stage2.len());
        for (result, _lite_score) in stage2 {
            let text = format!("{} {}", result.title, result.snippet);
            let relevance = self.full.similarity(query, &text).await;
            let authority = domain_authority(&result.domain);
            let fresh = freshness(&result);
            let local = locality(&result, target);
            prelim.push((result, relevance, authority, fresh, local));
        }
        // Preliminary order: everything but novelty and diversity, which
        // depend on what's already accepted.
        prelim.sort_by(|a, b| {
            let pa = 0.30 * a.1 + 0.20 * a.2 + 0.15 * a.3 + 0.05 * a.4;
            let pb = 0.30 * b.1 + 0.20 * b.2 + 0.15 * b.3 + 0.05 * b.4;
            pb.partial_cmp(&pa).unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut accepted_sigs: Vec<MinHashSignature> = Vec::new();
        let mut domain_counts: HashMap<String, u32> = HashMap::new();
        let mut accepted: Vec<RerankedResult> = Vec::new();

        for (result, relevance, authority, fresh, local) in prelim {
            if accepted.len() >= self.stage3_final_count {
                break;
            }
            let text = format!("{} {}", result.title, result.snippet);
            let sig = MinHashSignature::compute(&tokenize(&text));
            let max_sim = accepted_sigs
                .iter()
                .map(|s| s.estimated_jaccard(&sig))
                .fold(0.0f32, f32::max);
            let novelty = (1.0 - max_sim).clamp(0.0, 1.0);

            let occurrences = domain_counts.get(&result.domain).copied().unwrap_or(0);
            let diversity = 1.0 / (1.0 + occurrences as f32);

            let total_score = 0.30 * relevance
                + 0.25 * novelty
                + 0.20 * authority
                + 0.15 * fresh
                + 0.05 * diversity
                + 0.05 * local;

            *domain_counts.entry(result.domain.clone()).or_insert(0) += 1;
            accepted_sigs.push(sig);
            accepted.push(RerankedResult {
                result,
                relevance,
                novelty,
                authority,
                freshness: fresh,
                diversity,
                locality: local,
                total_score,
            });
        }

        accepted.sort_by(|a, b| b.total_score.partial_cmp(&a.total_score).unwrap_or(std::cmp::Ordering::Equal));
        accepted
    }

    pub async fn rerank(
        &self,
        results: &[SearchResult],
        query: &str,
        target: &LocalityTarget,
    ) -> Vec<RerankedResult> {
        let stage1 = self.stage1_lexical(results, query);
        let stage2 = self.stage2_lite_semantic(stage1, query).await;
        self.stage3_final(stage2, query, target).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Backend;

    fn result(url: &str, domain: &str, title: &str, snippet: &str) -> SearchResult {
        SearchResult {
            url: url.into(),
            title: title.into(),
            snippet: snippet.into(),
            content: None,
            published_date: Some(chrono::Utc::now()),
            backend: Backend::Tavily,
            score: None,
            domain: domain.into(),
        }
    }

    #[tokio::test]
    async fn cascade_keeps_relevant_results_and_drops_unrelated() {
        let reranker = CascadedReranker::with_fallback(0.0, 0.0, 10);
        let results = vec![
            result("https://a.com/1", "a.com", "Electric vehicle battery costs", "battery prices fall sharply"),
            result("https://b.com/1", "b.com", "Sourdough bread guide", "baking tips for beginners"),
        ];
        let out = reranker
            .rerank(&results, "electric vehicle battery", &LocalityTarget::default())
            .await;
        assert!(!out.is_empty());
        assert_eq!(out[0].result.url, "https://a.com/1");
    }

    #[tokio::test]
    async fn gov_domain_scores_higher_authority_than_unknown() {
        let reranker = CascadedReranker::with_fallback(0.0, 0.0, 10);
        let results = vec![
            result("https://epa.gov/x", "epa.gov", "climate policy report", "climate policy analysis"),
            result("https://random-blog.io/x", "random-blog.io", "climate policy report", "climate policy analysis"),
        ];
        let out = reranker
            .rerank(&results, "climate policy", &LocalityTarget::default())
            .await;
        let gov = out.iter().find(|r| r.result.domain == "epa.gov").unwrap();
        let blog = out.iter().find(|r| r.result.domain == "random-blog.io").unwrap();
        assert!(gov.authority > blog.authority);
    }

    #[tokio::test]
    async fn stage3_caps_at_final_count() {
        let reranker = CascadedReranker::with_fallback(0.0, 0.0, 2);
        let results = vec![
            result("https://a.com/1", "a.com", "rust async runtime", "tokio scheduler internals"),
            result("https://b.com/1", "b.com", "rust async runtime", "tokio scheduler internals deep dive"),
            result("https://c.com/1", "c.com", "rust async runtime", "tokio scheduler internals explained"),
        ];
        let out = reranker.rerank(&results, "rust async runtime", &LocalityTarget::default()).await;
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn locality_rewards_matching_tld() {
        let target = LocalityTarget { market: "Germany".into(), language: "de".into() };
        let de_result = result("https://spiegel.de/x", "spiegel.de", "title", "snippet");
        let us_result = result("https://cnn.com/x", "cnn.com", "title", "snippet");
        assert!(locality(&de_result, &target) > locality(&us_result, &target));
    }
}
