//! C10 — Source Intelligence Cache. Keyed by URL, backed by
//! `store::sources` (spec §4.10). Owns the E-E-A-T quality score formula and
//! the staleness rule; the orchestrator (C8) consults it before issuing a
//! paid backend fetch.

mod eeat;

pub use eeat::{domain_authority, publication_type, quality_score};

use chrono::Utc;

use crate::core::types::Source;
use crate::error::StoreError;
use crate::store::Store;

/// `now - last_fetched_at > 7 days` (spec §4.10).
pub const STALENESS_DAYS: i64 = 7;

pub struct SourceCache<'a> {
    store: &'a Store,
}

impl<'a> SourceCache<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// True if `url` has a non-stale cached entry — the orchestrator skips
    /// the paid fetch in that case (spec §4.10 "Contract for the
    /// orchestrator").
    pub fn has_fresh(&self, url: &str) -> Result<bool, StoreError> {
        Ok(self
            .store
            .get_source(url)?
            .is_some_and(|s| !is_stale(&s)))
    }

    pub fn get(&self, url: &str) -> Result<Option<Source>, StoreError> {
        self.store.get_source(url)
    }

    /// Fresh sources already cached for `topic_id`, most recently fetched
    /// first — the orchestrator's paid-backend skip reads this before
    /// admitting a backend with `cost_per_query() > 0.0`.
    pub fn fresh_sources_for_topic(&self, topic_id: &str) -> Result<Vec<Source>, StoreError> {
        let mut sources = self.store.get_fresh_sources_for_topic(topic_id)?;
        sources.sort_by(|a, b| b.last_fetched_at.cmp(&a.last_fetched_at));
        Ok(sources)
    }

    /// `save_source(url, title, content, topic_id)` (spec §4.10): insert or
    /// update-in-place, recomputing `quality_score` and clearing
    /// `is_stale` each time.
    pub fn save_source(
        &self,
        url: &str,
        title: &str,
        content: &str,
        topic_id: &str,
    ) -> Result<Source, StoreError> {
        let now = Utc::now();
        let domain = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        // Plain char-capping with a `truncated` flag, matching the teacher's
        // `batch_scrape` truncation (`data.clean_content = ...chars().take(max)`,
        // `data.truncated = true`) rather than a word-boundary trim.
        let content_preview: String = content.chars().take(500).collect();
        let truncated = content.chars().count() > 500;

        let mut source = match self.store.get_source(url)? {
            Some(mut existing) => {
                existing.fetch_count += 1;
                if !existing.topic_ids.iter().any(|t| t == topic_id) {
                    existing.topic_ids.push(topic_id.to_string());
                    existing.usage_count += 1;
                }
                existing.last_fetched_at = now;
                existing.title = title.to_string();
                existing.content_preview = content_preview;
                existing.truncated = truncated;
                existing
            }
            None => Source {
                url: url.to_string(),
                domain,
                title: title.to_string(),
                content_preview,
                first_fetched_at: now,
                last_fetched_at: now,
                fetch_count: 1,
                topic_ids: vec![topic_id.to_string()],
                usage_count: 1,
                quality_score: 0.5,
                e_e_a_t_signals: Default::default(),
                author: None,
                published_at: None,
                is_stale: false,
                truncated,
            },
        };

        let score = eeat::quality_score(&source);
        source.quality_score = score;
        source.e_e_a_t_signals.insert("domain_authority".into(), eeat::domain_authority(&source.domain));
        source
            .e_e_a_t_signals
            .insert("publication_type".into(), eeat::publication_type(&source.url));
        source.e_e_a_t_signals.insert("freshness".into(), eeat::freshness(&source));
        source
            .e_e_a_t_signals
            .insert("usage_popularity".into(), eeat::usage_popularity(source.usage_count));
        source.is_stale = false;

        self.store.put_source(&source)?;
        Ok(source)
    }
}

pub fn is_stale(source: &Source) -> bool {
    (Utc::now() - source.last_fetched_at) > chrono::Duration::days(STALENESS_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_save_inserts_with_usage_count_one() {
        let store = Store::open_in_memory().unwrap();
        let cache = SourceCache::new(&store);
        let source = cache
            .save_source("https://example.com/a", "Title", "some article body", "topic-1")
            .unwrap();
        assert_eq!(source.fetch_count, 1);
        assert_eq!(source.usage_count, 1);
        assert_eq!(source.topic_ids, vec!["topic-1".to_string()]);
        assert!(!source.is_stale);
    }

    #[test]
    fn repeat_save_same_topic_does_not_inflate_usage_count() {
        let store = Store::open_in_memory().unwrap();
        let cache = SourceCache::new(&store);
        cache.save_source("https://example.com/a", "Title", "body", "topic-1").unwrap();
        let second = cache.save_source("https://example.com/a", "Title", "body", "topic-1").unwrap();
        assert_eq!(second.fetch_count, 2);
        assert_eq!(second.usage_count, 1);
        assert_eq!(second.topic_ids.len(), 1);
    }

    #[test]
    fn save_with_new_topic_increments_usage_and_dedupes_topic_ids() {
        let store = Store::open_in_memory().unwrap();
        let cache = SourceCache::new(&store);
        cache.save_source("https://example.com/a", "Title", "body", "topic-1").unwrap();
        let second = cache.save_source("https://example.com/a", "Title", "body", "topic-2").unwrap();
        assert_eq!(second.usage_count, 2);
        assert_eq!(second.topic_ids.len(), 2);
    }

    #[test]
    fn gov_domain_gets_top_authority_score() {
        let store = Store::open_in_memory().unwrap();
        let cache = SourceCache::new(&store);
        let source = cache
            .save_source("https://epa.gov/report", "Report", "body text", "topic-1")
            .unwrap();
        assert!(source.quality_score > 0.8);
    }
}
