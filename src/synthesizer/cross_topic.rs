//! C12 — Cross-Topic Synthesizer (spec §4.12). Pure CPU: looks up related
//! topics with a stored report via [`Store::find_related_topics`], extracts
//! frequency-based keywords from each, and produces a small context block
//! appended to the content synthesizer's prompt.

use std::collections::HashMap;

use crate::error::StoreError;
use crate::store::Store;
use crate::textutil::tokenize_filtered;

const DEFAULT_MAX_RELATED: usize = 3;
const KEYWORDS_PER_TOPIC: usize = 8;

#[derive(Debug, Clone)]
pub struct RelatedTopic {
    pub topic_id: String,
    pub title: String,
    pub similarity: f32,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CrossTopicContext {
    pub related_topics: Vec<RelatedTopic>,
    pub common_themes: Vec<String>,
    pub unique_angles: Vec<String>,
    pub suggested_internal_links: Vec<String>,
}

impl CrossTopicContext {
    /// Rendered as plain text for the synthesizer's prompt (spec §4.12
    /// "appended to the synthesis prompt as additional context").
    pub fn to_prompt_context(&self) -> String {
        if self.related_topics.is_empty() {
            return String::new();
        }
        let mut out = String::new();
        out.push_str("Related topics already covered:\n");
        for rt in &self.related_topics {
            out.push_str(&format!("- {} (keywords: {})\n", rt.title, rt.keywords.join(", ")));
        }
        if !self.common_themes.is_empty() {
            out.push_str(&format!("Common themes to acknowledge briefly: {}\n", self.common_themes.join(", ")));
        }
        if !self.unique_angles.is_empty() {
            out.push_str(&format!("Angles to emphasize as new: {}\n", self.unique_angles.join(", ")));
        }
        out
    }
}

/// Frequency-ranked, stopword-filtered keywords from `text` (spec §4.12
/// "frequency-based").
fn top_keywords(text: &str, language: &str, limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    for token in tokenize_filtered(text, language) {
        *counts.entry(token).or_insert(0) += 1;
    }
    let mut ranked: Vec<(String, u32)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(limit).map(|(k, _)| k).collect()
}

/// Builds the cross-topic context for `topic_id`. Returns an empty
/// context (not an error) when there are no related topics with a stored
/// report (spec §8 boundary behavior).
pub fn build_cross_topic_context(
    store: &Store,
    topic_id: &str,
    language: &str,
    max_related: Option<usize>,
) -> Result<CrossTopicContext, StoreError> {
    let limit = max_related.unwrap_or(DEFAULT_MAX_RELATED);
    let related = store.find_related_topics(topic_id, limit, 0.2)?;

    let mut related_topics = Vec::with_capacity(related.len());
    for (topic, similarity) in related {
        let report = store.get_research_report(&topic.id)?;
        let text = report
            .map(|r| r.article_markdown)
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| topic.title.clone());
        let keywords = top_keywords(&text, language, KEYWORDS_PER_TOPIC);
        related_topics.push(RelatedTopic { topic_id: topic.id, title: topic.title, similarity, keywords });
    }

    if related_topics.is_empty() {
        return Ok(CrossTopicContext::default());
    }

    let mut keyword_topic_count: HashMap<String, u32> = HashMap::new();
    for rt in &related_topics {
        for kw in &rt.keywords {
            *keyword_topic_count.entry(kw.clone()).or_insert(0) += 1;
        }
    }
    let common_themes: Vec<String> = keyword_topic_count
        .iter()
        .filter(|(_, count)| **count >= 2)
        .map(|(k, _)| k.clone())
        .collect();

    let mut unique_angles: Vec<String> = Vec::new();
    for rt in &related_topics {
        for kw in &rt.keywords {
            if keyword_topic_count.get(kw).copied().unwrap_or(0) < 2 && !unique_angles.contains(kw) {
                unique_angles.push(kw.clone());
            }
        }
    }

    let suggested_internal_links: Vec<String> = related_topics.iter().map(|rt| rt.title.clone()).collect();

    Ok(CrossTopicContext { related_topics, common_themes, unique_angles, suggested_internal_links })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ResearchReport, Topic, TopicSource};
    use chrono::Utc;
    use std::collections::HashMap as Map;

    fn sample_topic(id: &str, title: &str) -> Topic {
        Topic {
            id: id.into(),
            title: title.into(),
            description: "".into(),
            cluster_label: "".into(),
            source: TopicSource::Rss,
            source_url: "".into(),
            language: "en".into(),
            domain: "ev".into(),
            market: "US".into(),
            demand_score: 0.5,
            opportunity_score: 0.5,
            fit_score: 0.5,
            novelty_score: 0.5,
            priority_score: 0.5,
            competitors: vec![],
            content_gaps: vec![],
            keywords: Map::new(),
            research_report: None,
            hero_image_url: None,
            supporting_images: vec![],
            discovered_at: Utc::now(),
            updated_at: Utc::now(),
            published_at: None,
        }
    }

    #[test]
    fn no_related_topics_yields_empty_context() {
        let store = Store::open_in_memory().unwrap();
        let topic = sample_topic("t1", "Electric vehicles in 2026");
        store.upsert_topic(&topic).unwrap();
        let ctx = build_cross_topic_context(&store, "t1", "en", None).unwrap();
        assert!(ctx.related_topics.is_empty());
        assert!(ctx.suggested_internal_links.is_empty());
    }

    #[test]
    fn related_topic_with_report_contributes_keywords() {
        let store = Store::open_in_memory().unwrap();
        let target = sample_topic("t1", "Electric vehicle battery costs falling");
        let related = sample_topic("t2", "Electric vehicle battery supply chain");
        store.upsert_topic(&target).unwrap();
        store.upsert_topic(&related).unwrap();
        store
            .save_research_report(
                "t2",
                &ResearchReport {
                    topic_id: "t2".into(),
                    query: "electric vehicle battery".into(),
                    article_markdown: "battery battery supply chain lithium lithium cobalt mining".into(),
                    citations: vec![],
                    backend_stats: Map::new(),
                    cost_usd: 0.0,
                    generated_at: Utc::now(),
                },
            )
            .unwrap();

        let ctx = build_cross_topic_context(&store, "t1", "en", None).unwrap();
        assert_eq!(ctx.related_topics.len(), 1);
        assert!(ctx.related_topics[0].keywords.contains(&"battery".to_string()));
        assert!(!ctx.suggested_internal_links.is_empty());
    }
}
