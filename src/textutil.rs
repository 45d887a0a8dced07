//! Shared tokenization helpers used by the clusterer, validator, store
//! (related-topic similarity), and reranker. Generalizes the teacher's
//! `Reranker::tokenize` (lowercase, alnum-split, length-filtered) into a
//! stopword-aware version needed once title-similarity crosses languages.

use std::collections::HashSet;

/// Lowercase, alphanumeric-split, drops tokens of length <= 2 — the
/// teacher's `nlp::rerank::Reranker::tokenize` rule, unchanged.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| s.len() > 2)
        .map(|s| s.to_string())
        .collect()
}

/// English + German stop words (spec §4.1 "language-aware stop lists for
/// English + German at minimum"). Small, curated, not exhaustive.
fn stopwords(language: &str) -> &'static [&'static str] {
    match language {
        "de" => &[
            "der", "die", "das", "und", "oder", "ein", "eine", "einen", "mit", "von", "f\u{fc}r",
            "auf", "ist", "sind", "nicht", "den", "dem", "des", "bei", "aus", "wie", "was", "wird",
            "werden", "auch", "nach", "vor", "zum", "zur", "noch", "neue", "neuer", "neues",
        ],
        _ => &[
            "the", "and", "for", "with", "from", "that", "this", "are", "was", "were", "will",
            "has", "have", "had", "not", "but", "you", "your", "into", "what", "how", "why",
            "new", "more", "about", "its", "his", "her", "they", "them",
        ],
    }
}

/// Tokenize and drop stopwords for `language`. Unknown languages fall back
/// to the English list.
pub fn tokenize_filtered(text: &str, language: &str) -> HashSet<String> {
    let stop: HashSet<&str> = stopwords(language).iter().copied().collect();
    tokenize(text)
        .into_iter()
        .filter(|t| !stop.contains(t.as_str()))
        .collect()
}

/// Jaccard similarity between two token sets: |A∩B| / |A∪B|, 0.0 when both
/// are empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f32;
    let union = a.union(b).count() as f32;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_filters_short_tokens() {
        let t = tokenize("Go is a PL, not Rust!");
        assert!(!t.contains(&"is".to_string()));
        assert!(!t.contains(&"a".to_string()));
        assert!(t.contains(&"rust".to_string()));
    }

    #[test]
    fn tokenize_filtered_drops_stopwords() {
        let en = tokenize_filtered("The future of electric vehicles", "en");
        assert!(!en.contains("the"));
        assert!(en.contains("future"));
        assert!(en.contains("electric"));

        let de = tokenize_filtered("Die Zukunft der Elektroautos", "de");
        assert!(!de.contains("der"));
        assert!(de.contains("zukunft"));
    }

    #[test]
    fn jaccard_identical_sets_is_one() {
        let a: HashSet<String> = ["rust", "async"].iter().map(|s| s.to_string()).collect();
        assert_eq!(jaccard(&a, &a.clone()), 1.0);
    }

    #[test]
    fn jaccard_disjoint_sets_is_zero() {
        let a: HashSet<String> = ["rust"].iter().map(|s| s.to_string()).collect();
        let b: HashSet<String> = ["python"].iter().map(|s| s.to_string()).collect();
        assert_eq!(jaccard(&a, &b), 0.0);
    }
}
