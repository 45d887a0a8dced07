//! C7 — Research Backends. Five backends behind one contract (spec §4.7):
//! `search(query, max_results) -> [SearchResult]`. Every backend absorbs its
//! own exceptions — a failure degrades to an empty vec plus a logged
//! `BackendError`, never a propagated panic or `Err` (mirrors the teacher's
//! per-engine `run_engine` pattern in `tools::search::mod`, generalized from
//! "one function per SERP scrape" to a trait object per backend).

pub mod breadth;
pub mod breaking;
pub mod curated;
pub mod depth;
pub mod trends;

use async_trait::async_trait;

use crate::core::types::{Horizon, SearchResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Ok,
    Degraded,
    Failed,
}

/// Uniform contract every research backend implements (spec §4.7). `search`
/// never returns an `Err` — callers (the orchestrator) treat an empty vec as
/// "this backend had nothing this round," recorded in run statistics.
#[async_trait]
pub trait ResearchBackend: Send + Sync {
    fn name(&self) -> &'static str;
    fn horizon(&self) -> Horizon;
    fn cost_per_query(&self) -> f64;
    fn supports_citations(&self) -> bool;

    async fn search(&self, query: &str, max_results: usize) -> Vec<SearchResult>;

    async fn health_check(&self) -> HealthStatus;
}

pub(crate) fn domain_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}
