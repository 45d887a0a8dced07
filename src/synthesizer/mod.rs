//! C11 — Content Synthesizer (spec §4.11). Given the reranker's top
//! sources and the topic query: extract clean text, BM25-prefilter
//! passages, ask an LLM to pick the best few per source, then synthesize
//! a cited markdown article. C12 (cross-topic context) is a sibling
//! module, appended to the synthesis prompt when available.

pub mod cross_topic;

use std::collections::HashMap;
use std::time::Instant;

use serde_json::json;

use crate::collectors::extract::extract_article_text;
use crate::core::config::SynthesisStrategy;
use crate::core::types::BackendStat;
use crate::llm::{generate_with_deadline, extract_json, LlmProvider};
use crate::reranker::bm25;
use crate::textutil::tokenize;

/// Approximate per-topic cost of the `bm25_llm` strategy (spec §4.11).
pub const COST_BM25_LLM: f64 = 0.0019;
/// Approximate per-topic cost of the `llm_only` strategy.
pub const COST_LLM_ONLY: f64 = 0.0038;

const PASSAGES_PER_SOURCE: usize = 3;
const BM25_PREFILTER_KEEP: usize = 10;
const LLM_ONLY_PARAGRAPH_CAP: usize = 30;

/// One source handed to the synthesizer — the reranker's `SearchResult`
/// plus whatever raw HTML was fetched for it (if any; a fetch failure or
/// an un-fetched snippet-only result is `None`).
#[derive(Debug, Clone)]
pub struct SourceInput {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub raw_html: Option<String>,
}

pub struct SynthesisOutcome {
    /// `None` when the synthesis LLM call failed or timed out (spec
    /// §4.11 guardrail) — the reranker's source list survives regardless.
    pub article_markdown: Option<String>,
    /// Citation index (0-based position -> URL), matches `[Source N]`
    /// tokens with `N = index + 1`.
    pub citations: Vec<String>,
    pub cost_usd: f64,
    pub backend_stats: HashMap<String, BackendStat>,
}

pub struct ContentSynthesizer<'a> {
    llm: &'a dyn LlmProvider,
    strategy: SynthesisStrategy,
    max_article_words: usize,
}

impl<'a> ContentSynthesizer<'a> {
    pub fn new(llm: &'a dyn LlmProvider, strategy: SynthesisStrategy, max_article_words: usize) -> Self {
        Self { llm, strategy, max_article_words }
    }

    /// Best-effort clean text for one source: readability extraction from
    /// `raw_html` when present, falling back to the snippet (spec §4.11
    /// step 1, §4.4 "on extraction failure, falls back to ... summary").
    fn extract_text(source: &SourceInput) -> String {
        source
            .raw_html
            .as_deref()
            .and_then(|html| extract_article_text(html, &source.url))
            .unwrap_or_else(|| source.snippet.clone())
    }

    fn paragraphs(text: &str) -> Vec<String> {
        text.split("\n\n")
            .map(|p| p.trim())
            .filter(|p| p.split_whitespace().count() >= 5)
            .map(|p| p.to_string())
            .collect()
    }

    /// Stage 1 (BM25) + stage 2 (LLM selection) per source, per spec §4.11
    /// steps 2-3. Returns up to `PASSAGES_PER_SOURCE` passages per source,
    /// plus an optional cross-call cost/latency record.
    async fn select_passages(
        &self,
        source: &SourceInput,
        query: &str,
    ) -> (Vec<String>, BackendStat) {
        let text = Self::extract_text(source);
        let mut paragraphs = Self::paragraphs(&text);
        if paragraphs.is_empty() {
            paragraphs.push(text);
        }

        let candidates: Vec<String> = match self.strategy {
            SynthesisStrategy::Bm25Llm => {
                let docs: Vec<Vec<String>> = paragraphs.iter().map(|p| tokenize(p)).collect();
                let scores = bm25::score_corpus(&docs, &tokenize(query));
                let mut scored: Vec<(String, f32)> = paragraphs.into_iter().zip(scores).collect();
                scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
                scored.truncate(BM25_PREFILTER_KEEP);
                scored.into_iter().map(|(p, _)| p).collect()
            }
            SynthesisStrategy::LlmOnly => {
                paragraphs.truncate(LLM_ONLY_PARAGRAPH_CAP);
                paragraphs
            }
        };

        if candidates.len() <= PASSAGES_PER_SOURCE {
            return (candidates, BackendStat { success: true, count: 0, latency_ms: 0 });
        }

        let numbered: String = candidates
            .iter()
            .enumerate()
            .map(|(i, p)| format!("[{i}] {p}"))
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = format!(
            "Query: {query}\n\nFrom the numbered passages below, pick the {PASSAGES_PER_SOURCE} \
             most relevant to the query. Respond as JSON: {{\"indices\": [..]}}\n\n{numbered}"
        );
        let schema = json!({
            "type": "object",
            "properties": { "indices": { "type": "array", "items": { "type": "integer" } } },
            "required": ["indices"]
        });

        let start = Instant::now();
        match generate_with_deadline(self.llm, &prompt, Some(&schema), false).await {
            Ok(response) => {
                let indices: Vec<usize> = extract_json(&response.content)
                    .and_then(|v| v.get("indices").cloned())
                    .and_then(|v| v.as_array().cloned())
                    .map(|arr| arr.iter().filter_map(|n| n.as_u64()).map(|n| n as usize).collect())
                    .unwrap_or_default();
                let selected: Vec<String> = indices
                    .into_iter()
                    .take(PASSAGES_PER_SOURCE)
                    .filter_map(|i| candidates.get(i).cloned())
                    .collect();
                let selected = if selected.is_empty() {
                    candidates.into_iter().take(PASSAGES_PER_SOURCE).collect()
                } else {
                    selected
                };
                (selected, BackendStat { success: true, count: 1, latency_ms: start.elapsed().as_millis() as u64 })
            }
            Err(e) => {
                tracing::warn!(error = %e, url = source.url, "synthesizer: passage selection failed, falling back to top BM25 passages");
                (
                    candidates.into_iter().take(PASSAGES_PER_SOURCE).collect(),
                    BackendStat { success: false, count: 0, latency_ms: start.elapsed().as_millis() as u64 },
                )
            }
        }
    }

    /// Full pipeline (spec §4.11 steps 1-5). `cross_topic_context`, when
    /// present, is appended to the synthesis prompt as additional context
    /// (C12).
    pub async fn synthesize(
        &self,
        sources: &[SourceInput],
        query: &str,
        cross_topic_context: Option<&str>,
    ) -> SynthesisOutcome {
        let mut backend_stats = HashMap::new();
        let mut per_source_passages: Vec<(String, Vec<String>)> = Vec::new();
        for (i, source) in sources.iter().enumerate() {
            let (passages, stat) = self.select_passages(source, query).await;
            backend_stats.insert(format!("passage_select_{i}"), stat);
            per_source_passages.push((source.url.clone(), passages));
        }

        let citations: Vec<String> = sources.iter().map(|s| s.url.clone()).collect();
        let cost_usd = match self.strategy {
            SynthesisStrategy::Bm25Llm => COST_BM25_LLM,
            SynthesisStrategy::LlmOnly => COST_LLM_ONLY,
        };

        if per_source_passages.iter().all(|(_, p)| p.is_empty()) {
            return SynthesisOutcome { article_markdown: None, citations, cost_usd: 0.0, backend_stats };
        }

        let mut prompt = format!(
            "Write a markdown research article of at most {} words about: {query}\n\n\
             Cite sources inline using the form [Source N], where N matches the numbered \
             list below. Every [Source N] you write must correspond to one of these numbers.\n\n",
            self.max_article_words
        );
        for (i, (_url, passages)) in per_source_passages.iter().enumerate() {
            prompt.push_str(&format!("Source {}:\n", i + 1));
            for p in passages {
                prompt.push_str(&format!("- {p}\n"));
            }
        }
        if let Some(context) = cross_topic_context {
            prompt.push_str("\nRelated-topic context (do not cite, for background only):\n");
            prompt.push_str(context);
        }

        let start = Instant::now();
        match generate_with_deadline(self.llm, &prompt, None, false).await {
            Ok(response) => {
                backend_stats.insert(
                    "synthesis".to_string(),
                    BackendStat { success: true, count: 1, latency_ms: start.elapsed().as_millis() as u64 },
                );
                SynthesisOutcome {
                    article_markdown: Some(response.content),
                    citations,
                    cost_usd,
                    backend_stats,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "synthesizer: article synthesis failed, keeping reranker output without an article");
                backend_stats.insert(
                    "synthesis".to_string(),
                    BackendStat { success: false, count: 0, latency_ms: start.elapsed().as_millis() as u64 },
                );
                SynthesisOutcome { article_markdown: None, citations, cost_usd: 0.0, backend_stats }
            }
        }
    }
}

/// Every `[Source N]` token in `article` has `N` within `1..=citation_count`
/// (spec §8 testable property). Used by callers that want to validate an
/// LLM's output before persisting it.
pub fn citations_in_range(article: &str, citation_count: usize) -> bool {
    let re = regex::Regex::new(r"\[Source (\d+)\]").unwrap();
    re.captures_iter(article).all(|c| {
        c[1].parse::<usize>()
            .map(|n| n >= 1 && n <= citation_count)
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, LlmResponse};
    use async_trait::async_trait;

    struct StubLlm {
        passage_response: &'static str,
        article_response: &'static str,
    }

    #[async_trait]
    impl LlmProvider for StubLlm {
        async fn generate(
            &self,
            prompt: &str,
            _schema: Option<&serde_json::Value>,
            _grounding: bool,
        ) -> Result<LlmResponse, LlmError> {
            let content = if prompt.contains("Respond as JSON") {
                self.passage_response.to_string()
            } else {
                self.article_response.to_string()
            };
            Ok(LlmResponse { content, tokens: 10, grounding_metadata: None })
        }
    }

    fn many_paragraph_source() -> SourceInput {
        let html = (0..15)
            .map(|i| format!("<p>paragraph number {i} discussing electric vehicle battery chemistry in detail today</p>"))
            .collect::<Vec<_>>()
            .join("");
        SourceInput {
            url: "https://example.com/a".into(),
            title: "EV batteries".into(),
            snippet: "short snippet".into(),
            raw_html: Some(format!("<html><body><article>{html}</article></body></html>")),
        }
    }

    #[tokio::test]
    async fn synthesize_produces_article_with_valid_citations() {
        let llm = StubLlm {
            passage_response: r#"{"indices": [0, 1, 2]}"#,
            article_response: "EV batteries are improving. [Source 1] reports cost declines.",
        };
        let synthesizer = ContentSynthesizer::new(&llm, SynthesisStrategy::Bm25Llm, 2000);
        let sources = vec![many_paragraph_source()];
        let outcome = synthesizer.synthesize(&sources, "electric vehicle batteries", None).await;
        assert!(outcome.article_markdown.is_some());
        assert_eq!(outcome.citations.len(), 1);
        assert!(citations_in_range(outcome.article_markdown.as_ref().unwrap(), outcome.citations.len()));
    }

    #[tokio::test]
    async fn llm_failure_leaves_citations_without_article() {
        struct FailingLlm;
        #[async_trait]
        impl LlmProvider for FailingLlm {
            async fn generate(
                &self,
                _prompt: &str,
                _schema: Option<&serde_json::Value>,
                _grounding: bool,
            ) -> Result<LlmResponse, LlmError> {
                Err(LlmError::Other { detail: "boom".into(), retryable: false })
            }
        }
        let llm = FailingLlm;
        let synthesizer = ContentSynthesizer::new(&llm, SynthesisStrategy::Bm25Llm, 2000);
        let sources = vec![many_paragraph_source()];
        let outcome = synthesizer.synthesize(&sources, "electric vehicle batteries", None).await;
        assert!(outcome.article_markdown.is_none());
        assert_eq!(outcome.citations.len(), 1);
    }

    #[test]
    fn citations_in_range_rejects_out_of_bounds_reference() {
        assert!(!citations_in_range("see [Source 3]", 2));
        assert!(citations_in_range("see [Source 1] and [Source 2]", 2));
    }
}
