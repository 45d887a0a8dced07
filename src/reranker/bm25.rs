//! Classic BM25 lexical scoring, shared by the reranker's stage 1 (spec
//! §4.9) and the content synthesizer's passage pre-filter (spec §4.11).
//! Pure arithmetic over pre-tokenized documents — no crate in the teacher
//! or pack does BM25 for this shape of data, so it's hand-rolled like the
//! validator's metrics.

const K1: f32 = 1.2;
const B: f32 = 0.75;

/// Scores every document in `docs` against `query`, given a shared corpus
/// (document frequency and average length computed over all of `docs`).
/// Returns one score per input document, same order.
pub fn score_corpus(docs: &[Vec<String>], query: &[String]) -> Vec<f32> {
    if docs.is_empty() {
        return vec![];
    }
    let n = docs.len() as f32;
    let avgdl = docs.iter().map(|d| d.len()).sum::<usize>() as f32 / n;

    let mut doc_freq: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for doc in docs {
        let unique: std::collections::HashSet<&str> = doc.iter().map(|s| s.as_str()).collect();
        for term in unique {
            *doc_freq.entry(term).or_insert(0) += 1;
        }
    }

    docs.iter()
        .map(|doc| score_one(doc, query, &doc_freq, n, avgdl))
        .collect()
}

fn score_one(
    doc: &[String],
    query: &[String],
    doc_freq: &std::collections::HashMap<&str, usize>,
    n: f32,
    avgdl: f32,
) -> f32 {
    if doc.is_empty() {
        return 0.0;
    }
    let dl = doc.len() as f32;
    let mut term_freq: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for term in doc {
        *term_freq.entry(term.as_str()).or_insert(0) += 1;
    }

    let mut score = 0.0f32;
    for q in query {
        let Some(&tf) = term_freq.get(q.as_str()) else {
            continue;
        };
        let df = doc_freq.get(q.as_str()).copied().unwrap_or(0) as f32;
        let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
        let tf = tf as f32;
        let denom = tf + K1 * (1.0 - B + B * dl / avgdl.max(1.0));
        score += idf * (tf * (K1 + 1.0)) / denom.max(1e-6);
    }
    score.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::textutil::tokenize;

    #[test]
    fn ranks_matching_document_above_unrelated_one() {
        let docs = vec![
            tokenize("electric vehicle battery costs fall sharply this quarter"),
            tokenize("sourdough bread baking guide for beginners"),
        ];
        let query = tokenize("electric vehicle battery");
        let scores = score_corpus(&docs, &query);
        assert!(scores[0] > scores[1]);
        assert!(scores[1] == 0.0);
    }

    #[test]
    fn empty_corpus_yields_empty_scores() {
        assert!(score_corpus(&[], &tokenize("anything")).is_empty());
    }
}
