//! End-to-end scenarios from spec §8, exercised directly against the store,
//! deduplicator, and validator (no network — collectors/backends are
//! unit-tested in their own modules).

use std::collections::HashSet;

use chrono::Utc;
use topicscout::core::types::{Document, DocumentStatus, TopicSource};
use topicscout::dedup::{Deduplicator, MinHashSignature};
use topicscout::store::{InsertOutcome, Store};
use topicscout::validator::{TopicCandidate, TopicValidator, ValidatorWeights};

fn doc(canonical_url: &str, title: &str, content: &str) -> Document {
    Document {
        id: uuid::Uuid::new_v4().to_string(),
        source: "rss_example".into(),
        source_url: canonical_url.into(),
        canonical_url: canonical_url.into(),
        title: title.into(),
        content: content.into(),
        summary: content.chars().take(80).collect(),
        language: "en".into(),
        domain: "tech".into(),
        market: "US".into(),
        vertical: "".into(),
        content_hash: Deduplicator::compute_content_hash(content),
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

/// Scenario 1: single-feed happy path — 3 entries collect into 3 stored
/// documents with zero duplicates.
#[test]
fn single_feed_happy_path_stores_three_distinct_documents() {
    let store = Store::open_in_memory().unwrap();
    let dedup = Deduplicator::new();

    let docs = vec![
        doc("https://example.com/a", "Rust async runtimes compared", "body one"),
        doc("https://example.com/b", "GC pauses in modern JVMs", "body two"),
        doc("https://example.com/c", "WASM on the edge in 2026", "body three"),
    ];

    let deduped = dedup.deduplicate(docs);
    assert_eq!(deduped.len(), 3);

    let mut inserted = 0;
    for d in &deduped {
        if store.insert_document(d).unwrap() == InsertOutcome::Inserted {
            inserted += 1;
        }
    }
    assert_eq!(inserted, 3);

    let stored = store.get_documents_by_language("en", None).unwrap();
    assert_eq!(stored.len(), 3);
}

/// Scenario 3: near-duplicate — same story via two hosts, different
/// canonical URLs but identical content, is caught by the content-hash path
/// and `deduplicate` keeps exactly one.
#[test]
fn near_duplicate_same_content_different_host_collapses_to_one() {
    let shared_content = "Breaking: a major cloud provider announced a new region today.";
    let d1 = doc("https://host-a.example.com/story", "Cloud region announced", shared_content);
    let d2 = doc("https://host-b.example.com/story-copy", "Cloud region announced", shared_content);

    let probe = Deduplicator::new();
    probe.add(&d1);
    assert!(probe.is_duplicate(&d2));

    let dedup = Deduplicator::new();
    let merged = dedup.deduplicate(vec![d1, d2]);
    assert_eq!(merged.len(), 1);
}

/// Round-trip invariants from spec §8: canonicalization and content hashing
/// are idempotent.
#[test]
fn canonicalize_and_hash_are_idempotent() {
    let url = "HTTP://WWW.Example.com/path/?utm_source=x&b=2&a=1#frag";
    let once = Deduplicator::new().get_canonical_url(url);
    let twice = Deduplicator::new().get_canonical_url(&once);
    assert_eq!(once, twice);

    let content = "Some   content\nwith   odd\twhitespace.";
    assert_eq!(
        Deduplicator::compute_content_hash(content),
        Deduplicator::compute_content_hash(content)
    );
}

/// Scenario 4: validator filtering — 4 seed-related candidates survive a
/// 0.5 threshold, 2 off-topic candidates (Fashion, Cooking) do not.
#[test]
fn validator_filters_off_topic_candidates() {
    let validator = TopicValidator::new(ValidatorWeights::default());
    let seed_keywords = vec!["rust".to_string(), "async".to_string(), "runtime".to_string()];
    let existing: Vec<MinHashSignature> = vec![];

    let make = |title: &str, collectors: &[&str]| TopicCandidate {
        title: title.to_string(),
        surfaced_by: collectors.iter().map(|s| s.to_string()).collect::<HashSet<_>>(),
        age_days: 1.0,
        source_kind: TopicSource::Rss,
        autocomplete_position: None,
        autocomplete_query_len: None,
        minhash: MinHashSignature::compute(&topicscout::textutil::tokenize(title)),
    };

    let candidates = vec![
        make("rust async runtime performance", &["rss", "reddit"]),
        make("rust async runtime benchmarks", &["rss"]),
        make("rust async runtime ecosystem", &["rss", "reddit", "trends"]),
        make("rust async runtime internals", &["rss"]),
        make("fall fashion trends 2026", &["rss"]),
        make("easy weeknight cooking recipes", &["rss"]),
    ];

    let scored = validator.filter_topics(candidates, &seed_keywords, &existing, 0.5, 20);

    assert_eq!(scored.len(), 4);
    for s in &scored {
        assert!(
            !s.candidate.title.to_lowercase().contains("fashion")
                && !s.candidate.title.to_lowercase().contains("cooking")
        );
    }
    // Sorted descending by total score.
    for pair in scored.windows(2) {
        assert!(pair[0].total_score >= pair[1].total_score);
    }
}

/// Validator weight construction-time check (spec §8).
#[test]
fn validator_weights_must_sum_to_one() {
    assert!(ValidatorWeights::new(0.3, 0.25, 0.2, 0.15, 0.10).is_ok());
    assert!(ValidatorWeights::new(0.5, 0.25, 0.2, 0.15, 0.10).is_err());
}

/// Priority invariant from spec §8: `priority_score in [0,1]` maps to an
/// integer `priority in 1..=10`.
#[test]
fn topic_priority_stays_within_bounds() {
    use topicscout::core::types::Topic;
    use std::collections::HashMap;

    let mut topic = Topic {
        id: "t1".into(),
        title: "x".into(),
        description: "".into(),
        cluster_label: "x".into(),
        source: TopicSource::Rss,
        source_url: "".into(),
        language: "en".into(),
        domain: "tech".into(),
        market: "US".into(),
        demand_score: 0.0,
        opportunity_score: 0.0,
        fit_score: 0.0,
        novelty_score: 0.0,
        priority_score: 0.0,
        competitors: vec![],
        content_gaps: vec![],
        keywords: HashMap::new(),
        research_report: None,
        hero_image_url: None,
        supporting_images: vec![],
        discovered_at: Utc::now(),
        updated_at: Utc::now(),
        published_at: None,
    };

    topic.priority_score = 0.0;
    assert_eq!(topic.priority(), 1);
    topic.priority_score = 1.0;
    assert_eq!(topic.priority(), 10);
    topic.priority_score = 0.5;
    assert!((1..=10).contains(&topic.priority()));
}
