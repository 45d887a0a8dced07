//! C2 — Deduplicator. Two-level filter: URL canonicalization + content hash
//! (exact duplicates), then MinHash/LSH (near duplicates, spec §4.2).
//!
//! Dedup state is process-wide, mutated under a write lock and read under a
//! read lock (spec §5) — `RwLock`, not `Mutex`, so concurrent readers (e.g.
//! two collectors checking `is_duplicate` at once) never block each other.

mod minhash;
mod url_canon;

pub use minhash::MinHashSignature;
pub use url_canon::canonicalize;

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use sha2::{Digest, Sha256};

use crate::core::types::Document;
use crate::textutil::tokenize;

/// MinHash-estimated Jaccard >= this implies near-duplicate (spec §4.2).
pub const NEAR_DUPLICATE_THRESHOLD: f32 = 0.7;

struct DedupState {
    canonical_urls: HashSet<String>,
    content_hashes: HashSet<String>,
    /// LSH band index: band key -> signatures sharing that band.
    lsh_bands: HashMap<u64, Vec<usize>>,
    signatures: Vec<MinHashSignature>,
}

pub struct Deduplicator {
    state: RwLock<DedupState>,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new()
    }
}

impl Deduplicator {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(DedupState {
                canonical_urls: HashSet::new(),
                content_hashes: HashSet::new(),
                lsh_bands: HashMap::new(),
                signatures: Vec::new(),
            }),
        }
    }

    /// Deterministic SHA-256 over whitespace-collapsed, case-folded content.
    pub fn compute_content_hash(content: &str) -> String {
        let normalized = content
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Alias for `canonicalize`, exposed for collectors (spec §4.2).
    pub fn get_canonical_url(&self, url: &str) -> String {
        canonicalize(url)
    }

    /// True if `canonical_url` or `content_hash` matches a known document, or
    /// MinHash/LSH finds a neighbor with estimated Jaccard >= threshold.
    pub fn is_duplicate(&self, doc: &Document) -> bool {
        let state = self.state.read().expect("dedup rwlock poisoned");
        let canonical = canonicalize(&doc.canonical_url);
        if state.canonical_urls.contains(&canonical) {
            return true;
        }
        let hash = Self::compute_content_hash(&doc.content);
        if state.content_hashes.contains(&hash) {
            return true;
        }

        let sig = MinHashSignature::compute(&tokenize(&format!("{} {}", doc.title, doc.content)));
        let mut candidates = HashSet::new();
        for key in sig.band_keys() {
            if let Some(idxs) = state.lsh_bands.get(&key) {
                candidates.extend(idxs.iter().copied());
            }
        }
        candidates
            .into_iter()
            .filter_map(|i| state.signatures.get(i))
            .any(|existing| sig.estimated_jaccard(existing) >= NEAR_DUPLICATE_THRESHOLD)
    }

    /// Registers canonical URL, content hash, and MinHash signature.
    pub fn add(&self, doc: &Document) {
        let mut state = self.state.write().expect("dedup rwlock poisoned");
        let canonical = canonicalize(&doc.canonical_url);
        let hash = Self::compute_content_hash(&doc.content);
        let sig = MinHashSignature::compute(&tokenize(&format!("{} {}", doc.title, doc.content)));

        let idx = state.signatures.len();
        for key in sig.band_keys() {
            state.lsh_bands.entry(key).or_default().push(idx);
        }
        state.signatures.push(sig);
        state.canonical_urls.insert(canonical);
        state.content_hashes.insert(hash);
    }

    /// Filters a batch, registering every kept document as it goes so later
    /// items in the same batch are checked against earlier ones too. Logs
    /// the batch dup rate.
    pub fn deduplicate(&self, docs: Vec<Document>) -> Vec<Document> {
        let total = docs.len();
        let mut kept = Vec::with_capacity(total);
        for doc in docs {
            if self.is_duplicate(&doc) {
                continue;
            }
            self.add(&doc);
            kept.push(doc);
        }
        let dup_rate = if total == 0 {
            0.0
        } else {
            1.0 - (kept.len() as f32 / total as f32)
        };
        tracing::info!(
            total,
            kept = kept.len(),
            dup_rate = format!("{:.2}", dup_rate),
            "deduplicate batch"
        );
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DocumentStatus;
    use chrono::Utc;

    fn doc(url: &str, title: &str, content: &str) -> Document {
        Document {
            id: uuid::Uuid::new_v4().to_string(),
            source: "rss_test".into(),
            source_url: url.into(),
            canonical_url: url.into(),
            title: title.into(),
            content: content.into(),
            summary: String::new(),
            language: "en".into(),
            domain: "test".into(),
            market: "US".into(),
            vertical: "tech".into(),
            content_hash: String::new(),
            published_at: Some(Utc::now()),
            fetched_at: Utc::now(),
            author: None,
            entities: vec![],
            keywords: vec![],
            reliability_score: 0.5,
            paywall: false,
            status: DocumentStatus::New,
        }
    }

    #[test]
    fn content_hash_is_deterministic() {
        let a = Deduplicator::compute_content_hash("Hello   World\n\n");
        let b = Deduplicator::compute_content_hash("hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn exact_url_duplicate_detected() {
        let dedup = Deduplicator::new();
        let d1 = doc("https://a.com/story", "Title One", "Some unique body text here.");
        dedup.add(&d1);
        let d2 = doc("https://a.com/story", "Different title", "Different body entirely.");
        assert!(dedup.is_duplicate(&d2));
    }

    #[test]
    fn near_duplicate_across_hosts_detected() {
        let dedup = Deduplicator::new();
        let body = "Electric vehicle sales surged across Germany this quarter as battery costs fell and charging infrastructure expanded nationwide";
        let d1 = doc("https://siteA.com/ev-story", "EV sales surge", body);
        let d2 = doc("https://siteB.com/ev-story-copy", "EV sales surge (copy)", body);

        assert!(!dedup.is_duplicate(&d1));
        dedup.add(&d1);
        assert!(dedup.is_duplicate(&d2));
    }

    #[test]
    fn deduplicate_batch_keeps_one_of_near_duplicate_pair() {
        let dedup = Deduplicator::new();
        let body = "Electric vehicle sales surged across Germany this quarter as battery costs fell and charging infrastructure expanded nationwide";
        let d1 = doc("https://siteA.com/ev-story", "EV sales surge", body);
        let d2 = doc("https://siteB.com/ev-story-copy", "EV sales surge copy", body);
        let kept = dedup.deduplicate(vec![d1, d2]);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn unrelated_documents_both_kept() {
        let dedup = Deduplicator::new();
        let d1 = doc("https://a.com/1", "Electric vehicles in 2026", "EV market analysis and battery trends");
        let d2 = doc("https://a.com/2", "Sourdough baking tips", "How to bake sourdough bread at home");
        let kept = dedup.deduplicate(vec![d1, d2]);
        assert_eq!(kept.len(), 2);
    }
}
