//! TF-IDF vectorization over document titles + first 500 chars of content
//! (spec §4.5).

use std::collections::HashMap;

use crate::textutil::tokenize;

pub const CONTENT_PREFIX_CHARS: usize = 500;

pub type SparseVector = HashMap<String, f32>;

/// Builds TF-IDF vectors for a corpus: term frequency within each document
/// times inverse document frequency across the corpus (`ln(N / (1+df)) + 1`,
/// the classic smoothed IDF so a term present in every document doesn't
/// collapse to exactly zero weight).
pub fn vectorize(titles_and_content: &[(String, String)]) -> Vec<SparseVector> {
    let n = titles_and_content.len();
    let doc_tokens: Vec<Vec<String>> = titles_and_content
        .iter()
        .map(|(title, content)| {
            let truncated: String = content.chars().take(CONTENT_PREFIX_CHARS).collect();
            let mut tokens = tokenize(title);
            tokens.extend(tokenize(&truncated));
            tokens
        })
        .collect();

    let mut doc_freq: HashMap<String, usize> = HashMap::new();
    for tokens in &doc_tokens {
        let unique: std::collections::HashSet<&String> = tokens.iter().collect();
        for t in unique {
            *doc_freq.entry(t.clone()).or_insert(0) += 1;
        }
    }

    doc_tokens
        .iter()
        .map(|tokens| {
            let mut tf: HashMap<String, f32> = HashMap::new();
            for t in tokens {
                *tf.entry(t.clone()).or_insert(0.0) += 1.0;
            }
            let total = tokens.len().max(1) as f32;
            tf.into_iter()
                .map(|(term, count)| {
                    let df = *doc_freq.get(&term).unwrap_or(&1) as f32;
                    let idf = ((n as f32) / (1.0 + df)).ln() + 1.0;
                    (term, (count / total) * idf)
                })
                .collect()
        })
        .collect()
}

pub fn norm(v: &SparseVector) -> f32 {
    v.values().map(|x| x * x).sum::<f32>().sqrt()
}

pub fn cosine_similarity(a: &SparseVector, b: &SparseVector) -> f32 {
    let (smaller, larger) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f32 = smaller
        .iter()
        .filter_map(|(term, weight)| larger.get(term).map(|w2| weight * w2))
        .sum();
    let denom = norm(a) * norm(b);
    if denom == 0.0 {
        0.0
    } else {
        (dot / denom).clamp(-1.0, 1.0)
    }
}

pub fn cosine_distance(a: &SparseVector, b: &SparseVector) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Top-N discriminative tokens by TF-IDF weight, for cluster labeling.
pub fn top_terms(vectors: &[&SparseVector], n: usize) -> Vec<String> {
    let mut combined: HashMap<String, f32> = HashMap::new();
    for v in vectors {
        for (term, weight) in v.iter() {
            *combined.entry(term.clone()).or_insert(0.0) += weight;
        }
    }
    let mut terms: Vec<(String, f32)> = combined.into_iter().collect();
    terms.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
    terms.into_iter().take(n).map(|(t, _)| t).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_documents_have_cosine_similarity_one() {
        let docs = vec![
            ("Electric vehicles surge".to_string(), "battery demand rises".to_string()),
            ("Electric vehicles surge".to_string(), "battery demand rises".to_string()),
        ];
        let vecs = vectorize(&docs);
        assert!((cosine_similarity(&vecs[0], &vecs[1]) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn unrelated_documents_have_low_similarity() {
        let docs = vec![
            ("Electric vehicles and battery chemistry".to_string(), "".to_string()),
            ("Sourdough bread baking techniques".to_string(), "".to_string()),
        ];
        let vecs = vectorize(&docs);
        assert!(cosine_similarity(&vecs[0], &vecs[1]) < 0.3);
    }
}
