//! C6 — Topic Validator. Five weighted metrics per candidate topic (spec
//! §4.6), each clamped to `[0,1]`; a single bad metric degrades to 0 rather
//! than aborting the batch.

use std::collections::HashSet;
use std::cmp::Ordering;

use crate::core::types::TopicSource;
use crate::dedup::MinHashSignature;
use crate::error::PipelineError;
use crate::textutil::tokenize;

#[derive(Debug, Clone, Copy)]
pub struct ValidatorWeights {
    pub relevance: f32,
    pub diversity: f32,
    pub freshness: f32,
    pub volume: f32,
    pub novelty: f32,
}

impl Default for ValidatorWeights {
    fn default() -> Self {
        Self {
            relevance: 0.30,
            diversity: 0.25,
            freshness: 0.20,
            volume: 0.15,
            novelty: 0.10,
        }
    }
}

impl ValidatorWeights {
    /// Weights must sum to 1.0, validated at construction (spec §4.6, §8).
    pub fn new(
        relevance: f32,
        diversity: f32,
        freshness: f32,
        volume: f32,
        novelty: f32,
    ) -> Result<Self, PipelineError> {
        let sum = relevance + diversity + freshness + volume + novelty;
        if (sum - 1.0).abs() > 1e-4 {
            return Err(PipelineError::ConfigError(format!(
                "validator weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(Self {
            relevance,
            diversity,
            freshness,
            volume,
            novelty,
        })
    }
}

/// An unvalidated candidate topic, built from the clusterer's output plus
/// provenance (which collectors surfaced it, how old it is, and — for
/// autocomplete-sourced candidates — its SERP position and query length).
#[derive(Debug, Clone)]
pub struct TopicCandidate {
    pub title: String,
    pub surfaced_by: HashSet<String>,
    pub age_days: f32,
    pub source_kind: TopicSource,
    pub autocomplete_position: Option<usize>,
    pub autocomplete_query_len: Option<usize>,
    pub minhash: MinHashSignature,
}

#[derive(Debug, Clone)]
pub struct ScoredTopic {
    pub candidate: TopicCandidate,
    pub relevance: f32,
    pub diversity: f32,
    pub freshness: f32,
    pub volume: f32,
    pub novelty: f32,
    pub total_score: f32,
}

pub struct TopicValidator {
    weights: ValidatorWeights,
}

impl TopicValidator {
    pub fn new(weights: ValidatorWeights) -> Self {
        Self { weights }
    }

    fn relevance(&self, candidate: &TopicCandidate, seed_keywords: &[String]) -> f32 {
        let title_tokens: HashSet<String> = tokenize(&candidate.title).into_iter().collect();
        let seed_tokens: HashSet<String> = seed_keywords
            .iter()
            .flat_map(|k| tokenize(k))
            .collect();
        crate::textutil::jaccard(&title_tokens, &seed_tokens)
    }

    fn diversity(&self, candidate: &TopicCandidate) -> f32 {
        (candidate.surfaced_by.len() as f32 / 5.0).clamp(0.0, 1.0)
    }

    fn freshness(&self, candidate: &TopicCandidate) -> f32 {
        0.5f32.powf(candidate.age_days.max(0.0) / 7.0)
    }

    fn volume(&self, candidate: &TopicCandidate) -> f32 {
        if candidate.source_kind != TopicSource::Autocomplete {
            return 0.5;
        }
        let Some(position) = candidate.autocomplete_position else {
            return 0.5;
        };
        let query_len = candidate.autocomplete_query_len.unwrap_or(0) as f32;
        let position_term = 1.0 - ((position.saturating_sub(1)) as f32 / 10.0);
        let length_term = (query_len / 50.0).min(1.0);
        (0.7 * position_term.max(0.0) + 0.3 * length_term).clamp(0.0, 1.0)
    }

    fn novelty(&self, candidate: &TopicCandidate, existing_researched: &[MinHashSignature]) -> f32 {
        let max_sim = existing_researched
            .iter()
            .map(|sig| candidate.minhash.estimated_jaccard(sig))
            .fold(0.0f32, f32::max);
        (1.0 - max_sim).clamp(0.0, 1.0)
    }

    /// Scores and filters candidates. Returns topics with `total_score >=
    /// threshold`, sorted descending by total score, ties broken by
    /// relevance then freshness, truncated to `top_n`.
    pub fn filter_topics(
        &self,
        candidates: Vec<TopicCandidate>,
        seed_keywords: &[String],
        existing_researched: &[MinHashSignature],
        threshold: f32,
        top_n: usize,
    ) -> Vec<ScoredTopic> {
        let mut scored: Vec<ScoredTopic> = candidates
            .into_iter()
            .map(|candidate| {
                let relevance = self.relevance(&candidate, seed_keywords);
                let diversity = self.diversity(&candidate);
                let freshness = self.freshness(&candidate);
                let volume = self.volume(&candidate);
                let novelty = self.novelty(&candidate, existing_researched);
                let total_score = self.weights.relevance * relevance
                    + self.weights.diversity * diversity
                    + self.weights.freshness * freshness
                    + self.weights.volume * volume
                    + self.weights.novelty * novelty;
                ScoredTopic {
                    candidate,
                    relevance,
                    diversity,
                    freshness,
                    volume,
                    novelty,
                    total_score,
                }
            })
            .filter(|s| s.total_score >= threshold)
            .collect();

        scored.sort_by(|a, b| {
            b.total_score
                .partial_cmp(&a.total_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.relevance.partial_cmp(&a.relevance).unwrap_or(Ordering::Equal))
                .then_with(|| b.freshness.partial_cmp(&a.freshness).unwrap_or(Ordering::Equal))
        });
        scored.truncate(top_n);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(title: &str, collectors: &[&str], age_days: f32) -> TopicCandidate {
        TopicCandidate {
            title: title.to_string(),
            surfaced_by: collectors.iter().map(|s| s.to_string()).collect(),
            age_days,
            source_kind: TopicSource::Rss,
            autocomplete_position: None,
            autocomplete_query_len: None,
            minhash: MinHashSignature::compute(&tokenize(title)),
        }
    }

    #[test]
    fn default_weights_sum_to_one() {
        let w = ValidatorWeights::default();
        let sum = w.relevance + w.diversity + w.freshness + w.volume + w.novelty;
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_weights_not_summing_to_one() {
        assert!(ValidatorWeights::new(0.5, 0.5, 0.5, 0.0, 0.0).is_err());
    }

    #[test]
    fn filters_off_topic_candidates_by_threshold() {
        let validator = TopicValidator::new(ValidatorWeights::default());
        let seed_keywords = vec!["electric vehicle".to_string(), "battery".to_string()];

        let candidates = vec![
            candidate("Electric vehicle battery costs fall", &["rss", "reddit"], 1.0),
            candidate("Electric vehicle charging network expands", &["rss"], 2.0),
            candidate("Battery supply chain shifts", &["rss", "reddit", "trends"], 3.0),
            candidate("EV tax credit changes", &["rss"], 1.0),
            candidate("Fashion week trends for 2026", &["rss"], 1.0),
            candidate("Sourdough bread baking guide", &["rss"], 1.0),
        ];

        let scored = validator.filter_topics(candidates, &seed_keywords, &[], 0.15, 20);
        assert_eq!(scored.len(), 4);
        assert!(scored.iter().all(|s| s.candidate.title.to_lowercase().contains("electric")
            || s.candidate.title.to_lowercase().contains("battery")
            || s.candidate.title.to_lowercase().contains("ev")));
    }

    #[test]
    fn freshness_decays_by_half_every_seven_days() {
        let validator = TopicValidator::new(ValidatorWeights::default());
        let fresh = candidate("x", &[], 0.0);
        let week_old = candidate("x", &[], 7.0);
        assert!((validator.freshness(&fresh) - 1.0).abs() < 1e-6);
        assert!((validator.freshness(&week_old) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn novelty_is_one_when_no_existing_topics() {
        let validator = TopicValidator::new(ValidatorWeights::default());
        let c = candidate("Electric vehicles", &[], 0.0);
        assert_eq!(validator.novelty(&c, &[]), 1.0);
    }
}
