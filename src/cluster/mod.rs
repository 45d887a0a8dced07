//! C5 — Topic Clusterer. TF-IDF + density-based clustering
//! (`min_cluster_size=3`, cosine distance), grouping same-language Documents
//! into topic candidates (spec §4.5).

mod tfidf;

use uuid::Uuid;

use crate::core::types::{Document, TopicCluster};

pub const MIN_CLUSTER_SIZE: usize = 3;
/// Cosine-distance neighborhood radius. Chosen so documents sharing most of
/// their discriminative vocabulary (cosine similarity >= ~0.5) are
/// considered density-connected — an HDBSCAN-style `eps` fixed rather than
/// learned, since the source left the exact value unspecified.
pub const EPS: f32 = 0.5;

/// Clusters `docs` (expected to share one language). Noise points become
/// singleton clusters only when their title contains one of `seed_keywords`
/// (case-insensitive substring); otherwise they're discarded (spec §4.5,
/// §9 open question).
pub fn cluster_documents(docs: &[Document], seed_keywords: &[String]) -> Vec<TopicCluster> {
    if docs.is_empty() {
        return vec![];
    }

    let pairs: Vec<(String, String)> = docs
        .iter()
        .map(|d| (d.title.clone(), d.content.clone()))
        .collect();
    let vectors = tfidf::vectorize(&pairs);

    let n = docs.len();
    let mut visited = vec![false; n];
    let mut assigned = vec![false; n];
    let mut clusters: Vec<Vec<usize>> = Vec::new();

    for i in 0..n {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        let neighbors = region_query(i, &vectors);
        if neighbors.len() + 1 < MIN_CLUSTER_SIZE {
            continue; // provisional noise; singleton handling happens below
        }

        let mut cluster = vec![i];
        assigned[i] = true;
        let mut queue = neighbors;
        let mut qi = 0;
        while qi < queue.len() {
            let j = queue[qi];
            qi += 1;
            if !visited[j] {
                visited[j] = true;
                let j_neighbors = region_query(j, &vectors);
                if j_neighbors.len() + 1 >= MIN_CLUSTER_SIZE {
                    for k in j_neighbors {
                        if !queue.contains(&k) {
                            queue.push(k);
                        }
                    }
                }
            }
            if !assigned[j] {
                assigned[j] = true;
                cluster.push(j);
            }
        }
        cluster.sort_unstable();
        clusters.push(cluster);
    }

    let mut out: Vec<TopicCluster> = clusters
        .into_iter()
        .map(|idxs| build_cluster(docs, &vectors, &idxs))
        .collect();

    // Noise points: singleton clusters only when matching a seed keyword.
    for i in 0..n {
        if assigned[i] {
            continue;
        }
        let title_lower = docs[i].title.to_lowercase();
        let matches_seed = seed_keywords
            .iter()
            .any(|kw| !kw.is_empty() && title_lower.contains(&kw.to_lowercase()));
        if matches_seed {
            out.push(build_cluster(docs, &vectors, &[i]));
        }
    }

    out
}

fn region_query(i: usize, vectors: &[tfidf::SparseVector]) -> Vec<usize> {
    (0..vectors.len())
        .filter(|&j| j != i && tfidf::cosine_distance(&vectors[i], &vectors[j]) <= EPS)
        .collect()
}

fn build_cluster(docs: &[Document], vectors: &[tfidf::SparseVector], idxs: &[usize]) -> TopicCluster {
    let representative_idx = *idxs
        .iter()
        .max_by(|&&a, &&b| {
            tfidf::norm(&vectors[a])
                .partial_cmp(&tfidf::norm(&vectors[b]))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(&idxs[0]);

    let cluster_vectors: Vec<&tfidf::SparseVector> = idxs.iter().map(|&i| &vectors[i]).collect();
    let label = tfidf::top_terms(&cluster_vectors, 3).join(" ");

    TopicCluster {
        cluster_id: Uuid::new_v4().to_string(),
        label,
        representative_title: docs[representative_idx].title.clone(),
        document_ids: idxs.iter().map(|&i| docs[i].id.clone()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DocumentStatus;
    use chrono::Utc;

    fn doc(id: &str, title: &str, content: &str) -> Document {
        Document {
            id: id.into(),
            source: "rss_test".into(),
            source_url: format!("https://example.com/{id}"),
            canonical_url: format!("https://example.com/{id}"),
            title: title.into(),
            content: content.into(),
            summary: String::new(),
            language: "en".into(),
            domain: "tech".into(),
            market: "US".into(),
            vertical: "auto".into(),
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
    fn groups_three_similar_documents_into_one_cluster() {
        let docs = vec![
            doc("1", "Electric vehicle battery costs fall", "battery prices electric vehicle market demand"),
            doc("2", "Electric vehicle battery prices drop", "battery prices electric vehicle market demand surge"),
            doc("3", "EV battery cost decline continues", "battery prices electric vehicle market demand falling"),
            doc("4", "Sourdough bread baking at home", "flour water yeast fermentation technique"),
        ];
        let clusters = cluster_documents(&docs, &[]);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].document_ids.len(), 3);
    }

    #[test]
    fn noise_point_kept_only_if_matches_seed_keyword() {
        let docs = vec![
            doc("1", "Electric vehicle battery costs fall", "battery prices electric vehicle demand"),
            doc("2", "Sourdough starter tips", "flour water yeast technique"),
        ];
        let clusters = cluster_documents(&docs, &["electric vehicle".to_string()]);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].representative_title, "Electric vehicle battery costs fall");
    }

    #[test]
    fn deterministic_given_same_input() {
        let docs = vec![
            doc("1", "Electric vehicle battery costs fall", "battery prices electric vehicle market demand"),
            doc("2", "Electric vehicle battery prices drop", "battery prices electric vehicle market demand surge"),
            doc("3", "EV battery cost decline continues", "battery prices electric vehicle market demand falling"),
        ];
        let a = cluster_documents(&docs, &[]);
        let b = cluster_documents(&docs, &[]);
        assert_eq!(a.len(), b.len());
        assert_eq!(a[0].document_ids, b[0].document_ids);
    }
}
