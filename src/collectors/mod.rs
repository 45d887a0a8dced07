//! C4 — Collectors. Uniform `collect(config) -> [Document]` contract (spec
//! §4.4): collectors never raise externally; errors are logged and degrade
//! to an empty or partial result.

pub mod autocomplete;
pub mod extract;
pub mod feed_discovery;
mod health;
pub mod newsapi;
pub mod reddit;
pub mod rss;
pub mod trends;

pub use health::HealthTracker;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::core::config::MarketConfig;
use crate::core::types::{Document, DocumentStatus};
use crate::dedup;

/// Every collector implements this; the orchestrating pipeline driver holds
/// a `Vec<Box<dyn Collector>>` built from the enabled flags in
/// `MarketConfig.collectors` (spec §6).
#[async_trait]
pub trait Collector: Send + Sync {
    /// Tag prefix used as `Document.source`, e.g. `"rss"`, `"reddit"`.
    fn name(&self) -> &'static str;

    async fn collect(&self, config: &MarketConfig) -> Vec<Document>;
}

/// Shared Document constructor so every collector stamps market/domain/
/// vertical/language consistently and computes `content_hash` the same way
/// the deduplicator expects.
pub fn build_document(
    config: &MarketConfig,
    source: String,
    source_url: String,
    title: String,
    content: String,
    summary: String,
    published_at: Option<chrono::DateTime<Utc>>,
    author: Option<String>,
) -> Document {
    let canonical_url = dedup::canonicalize(&source_url);
    let content_hash = crate::dedup::Deduplicator::compute_content_hash(&content);
    Document {
        id: Uuid::new_v4().to_string(),
        source,
        source_url,
        canonical_url,
        title,
        content,
        summary,
        language: config.language.clone(),
        domain: config.domain.clone(),
        market: config.market.clone(),
        vertical: config.vertical.clone(),
        content_hash,
        published_at,
        fetched_at: Utc::now(),
        author,
        entities: vec![],
        keywords: vec![],
        reliability_score: 0.5,
        paywall: false,
        status: DocumentStatus::New,
    }
}
