//! Reciprocal Rank Fusion (spec §4.8 step 4): `rrf_score = Σ 1/(k + rank_i)`
//! over the backends that returned a given URL, `k=60`.

use std::collections::HashMap;

use crate::core::types::{Backend, SearchResult};

pub const RRF_K: f32 = 60.0;

pub struct FusedResult {
    pub result: SearchResult,
    pub rrf_score: f32,
    pub surfaced_by: Vec<Backend>,
}

/// Fuses per-backend ranked lists into one list ordered by `rrf_score` desc.
/// Each backend's list is assumed already ranked best-first. The first
/// `SearchResult` seen for a URL (by backend traversal order) becomes that
/// URL's representative record; later sightings only contribute score and
/// provenance.
pub fn fuse(per_backend: Vec<(Backend, Vec<SearchResult>)>) -> Vec<FusedResult> {
    struct Entry {
        result: SearchResult,
        rrf_score: f32,
        surfaced_by: Vec<Backend>,
    }

    let mut by_url: HashMap<String, Entry> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for (backend, results) in per_backend {
        for (rank, result) in results.into_iter().enumerate() {
            let key = result.url.clone();
            let contribution = 1.0 / (RRF_K + rank as f32 + 1.0);
            match by_url.get_mut(&key) {
                Some(entry) => {
                    entry.rrf_score += contribution;
                    entry.surfaced_by.push(backend);
                }
                None => {
                    order.push(key.clone());
                    by_url.insert(
                        key,
                        Entry {
                            result,
                            rrf_score: contribution,
                            surfaced_by: vec![backend],
                        },
                    );
                }
            }
        }
    }

    let mut fused: Vec<FusedResult> = order
        .into_iter()
        .filter_map(|url| by_url.remove(&url))
        .map(|e| FusedResult {
            result: e.result,
            rrf_score: e.rrf_score,
            surfaced_by: e.surfaced_by,
        })
        .collect();

    fused.sort_by(|a, b| b.rrf_score.partial_cmp(&a.rrf_score).unwrap_or(std::cmp::Ordering::Equal));
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(url: &str) -> SearchResult {
        SearchResult {
            url: url.to_string(),
            title: url.to_string(),
            snippet: String::new(),
            content: None,
            published_date: None,
            backend: Backend::Tavily,
            score: None,
            domain: String::new(),
        }
    }

    #[test]
    fn url_surfaced_by_multiple_backends_outranks_single_backend_hit() {
        let per_backend = vec![
            (Backend::Tavily, vec![result("https://a.com"), result("https://b.com")]),
            (Backend::Searxng, vec![result("https://a.com"), result("https://c.com")]),
        ];
        let fused = fuse(per_backend);
        assert_eq!(fused[0].result.url, "https://a.com");
        assert_eq!(fused[0].surfaced_by.len(), 2);
    }

    #[test]
    fn unique_url_count_never_exceeds_raw_total() {
        let per_backend = vec![
            (Backend::Tavily, vec![result("https://a.com"), result("https://b.com")]),
            (Backend::Searxng, vec![result("https://a.com")]),
        ];
        let raw_total: usize = per_backend.iter().map(|(_, r)| r.len()).sum();
        let fused = fuse(per_backend);
        assert!(fused.len() <= raw_total);
        assert_eq!(fused.len(), 2);
    }
}
