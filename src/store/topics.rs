use std::collections::HashMap;

use rusqlite::{params, Connection};

use crate::core::types::{Topic, TopicSource};
use crate::dedup::MinHashSignature;
use crate::error::StoreError;
use crate::textutil;

use super::Store;

impl Store {
    /// MinHash signatures of every topic with a stored report — feeds the
    /// validator's novelty metric (spec §4.6).
    pub fn researched_topic_minhashes(&self) -> Result<Vec<MinHashSignature>, StoreError> {
        self.with_read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT t.title FROM topics t
                 INNER JOIN research_reports r ON r.topic_id = t.id",
            )?;
            let titles = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut sigs = Vec::new();
            for title in titles {
                let title = title?;
                sigs.push(MinHashSignature::compute(&textutil::tokenize(&title)));
            }
            Ok(sigs)
        })
    }

    /// Creates the topic if `id` is new; otherwise overwrites only the
    /// scored fields (demand/opportunity/fit/novelty/priority + updated_at),
    /// per spec §4.1.
    pub fn upsert_topic(&self, topic: &Topic) -> Result<(), StoreError> {
        self.with_write(|conn| {
            let exists: bool = conn.query_row(
                "SELECT 1 FROM topics WHERE id = ?1",
                params![topic.id],
                |_| Ok(true),
            ).unwrap_or(false);

            if exists {
                conn.execute(
                    "UPDATE topics SET
                        demand_score = ?2, opportunity_score = ?3, fit_score = ?4,
                        novelty_score = ?5, priority_score = ?6, updated_at = ?7
                     WHERE id = ?1",
                    params![
                        topic.id,
                        topic.demand_score,
                        topic.opportunity_score,
                        topic.fit_score,
                        topic.novelty_score,
                        topic.priority_score,
                        topic.updated_at.to_rfc3339(),
                    ],
                )?;
            } else {
                insert_topic(conn, topic)?;
            }
            Ok(())
        })
    }

    pub fn get_topic(&self, id: &str) -> Result<Option<Topic>, StoreError> {
        self.with_read(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM topics WHERE id = ?1")?;
            let mut rows = stmt.query(params![id])?;
            if let Some(row) = rows.next()? {
                Ok(row_to_topic(row).ok())
            } else {
                Ok(None)
            }
        })
    }

    /// Topics with a stored report, similarity = Jaccard over tokenized,
    /// stop-word-filtered titles (spec §4.1).
    pub fn find_related_topics(
        &self,
        topic_id: &str,
        limit: usize,
        min_sim: f32,
    ) -> Result<Vec<(Topic, f32)>, StoreError> {
        self.with_read(|conn| {
            let Some(target) = query_topic(conn, topic_id)? else {
                return Ok(vec![]);
            };
            let target_tokens = textutil::tokenize_filtered(&target.title, &target.language);

            let mut stmt = conn.prepare(
                "SELECT t.* FROM topics t
                 INNER JOIN research_reports r ON r.topic_id = t.id
                 WHERE t.id != ?1",
            )?;
            let mut rows = stmt.query(params![topic_id])?;

            let mut scored: Vec<(Topic, f32)> = Vec::new();
            while let Some(row) = rows.next()? {
                let Ok(candidate) = row_to_topic(row) else {
                    continue;
                };
                let cand_tokens =
                    textutil::tokenize_filtered(&candidate.title, &candidate.language);
                let sim = textutil::jaccard(&target_tokens, &cand_tokens);
                if sim >= min_sim {
                    scored.push((candidate, sim));
                }
            }
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            scored.truncate(limit);
            Ok(scored)
        })
    }
}

fn insert_topic(conn: &Connection, topic: &Topic) -> rusqlite::Result<()> {
    let competitors_json = serde_json::to_string(&topic.competitors).unwrap_or_else(|_| "[]".into());
    let content_gaps_json =
        serde_json::to_string(&topic.content_gaps).unwrap_or_else(|_| "[]".into());
    let keywords_json = serde_json::to_string(&topic.keywords).unwrap_or_else(|_| "{}".into());
    let supporting_images_json =
        serde_json::to_string(&topic.supporting_images).unwrap_or_else(|_| "[]".into());

    conn.execute(
        "INSERT INTO topics (
            id, title, description, cluster_label, source, source_url, language,
            domain, market, demand_score, opportunity_score, fit_score, novelty_score,
            priority_score, competitors_json, content_gaps_json, keywords_json,
            hero_image_url, supporting_images_json, discovered_at, updated_at, published_at
        ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22)",
        params![
            topic.id,
            topic.title,
            topic.description,
            topic.cluster_label,
            topic.source.as_str(),
            topic.source_url,
            topic.language,
            topic.domain,
            topic.market,
            topic.demand_score,
            topic.opportunity_score,
            topic.fit_score,
            topic.novelty_score,
            topic.priority_score,
            competitors_json,
            content_gaps_json,
            keywords_json,
            topic.hero_image_url,
            supporting_images_json,
            topic.discovered_at.to_rfc3339(),
            topic.updated_at.to_rfc3339(),
            topic.published_at.map(|d| d.to_rfc3339()),
        ],
    )?;
    Ok(())
}

fn parse_topic_source(s: &str) -> TopicSource {
    match s {
        "REDDIT" => TopicSource::Reddit,
        "TRENDS" => TopicSource::Trends,
        "AUTOCOMPLETE" => TopicSource::Autocomplete,
        "COMPETITOR" => TopicSource::Competitor,
        "MANUAL" => TopicSource::Manual,
        _ => TopicSource::Rss,
    }
}

fn query_topic(conn: &Connection, id: &str) -> rusqlite::Result<Option<Topic>> {
    let mut stmt = conn.prepare("SELECT * FROM topics WHERE id = ?1")?;
    let mut rows = stmt.query(params![id])?;
    if let Some(row) = rows.next()? {
        Ok(row_to_topic(row).ok())
    } else {
        Ok(None)
    }
}

fn row_to_topic(row: &rusqlite::Row) -> Result<Topic, serde_json::Error> {
    let competitors_json: String = row.get("competitors_json").unwrap_or_default();
    let content_gaps_json: String = row.get("content_gaps_json").unwrap_or_default();
    let keywords_json: String = row.get("keywords_json").unwrap_or_default();
    let supporting_images_json: String = row.get("supporting_images_json").unwrap_or_default();
    let source: String = row.get("source").unwrap_or_default();
    let published_at: Option<String> = row.get("published_at").unwrap_or(None);
    let discovered_at: String = row.get("discovered_at").unwrap_or_default();
    let updated_at: String = row.get("updated_at").unwrap_or_default();

    Ok(Topic {
        id: row.get("id").unwrap_or_default(),
        title: row.get("title").unwrap_or_default(),
        description: row.get("description").unwrap_or_default(),
        cluster_label: row.get("cluster_label").unwrap_or_default(),
        source: parse_topic_source(&source),
        source_url: row.get("source_url").unwrap_or_default(),
        language: row.get("language").unwrap_or_default(),
        domain: row.get("domain").unwrap_or_default(),
        market: row.get("market").unwrap_or_default(),
        demand_score: row.get("demand_score").unwrap_or_default(),
        opportunity_score: row.get("opportunity_score").unwrap_or_default(),
        fit_score: row.get("fit_score").unwrap_or_default(),
        novelty_score: row.get("novelty_score").unwrap_or_default(),
        priority_score: row.get("priority_score").unwrap_or_default(),
        competitors: serde_json::from_str(&competitors_json)?,
        content_gaps: serde_json::from_str(&content_gaps_json)?,
        keywords: serde_json::from_str::<HashMap<String, f32>>(&keywords_json)?,
        research_report: None,
        hero_image_url: row.get("hero_image_url").unwrap_or(None),
        supporting_images: serde_json::from_str(&supporting_images_json)?,
        discovered_at: chrono::DateTime::parse_from_rfc3339(&discovered_at)
            .map(|d| d.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
        updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
            .map(|d| d.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
        published_at: published_at
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
            .map(|d| d.with_timezone(&chrono::Utc)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_topic(id: &str, title: &str) -> Topic {
        Topic {
            id: id.into(),
            title: title.into(),
            description: "".into(),
            cluster_label: "".into(),
            source: TopicSource::Rss,
            source_url: "".into(),
            language: "en".into(),
            domain: "tech".into(),
            market: "US".into(),
            demand_score: 0.5,
            opportunity_score: 0.5,
            fit_score: 0.5,
            novelty_score: 0.5,
            priority_score: 0.5,
            competitors: vec![],
            content_gaps: vec![],
            keywords: HashMap::new(),
            research_report: None,
            hero_image_url: None,
            supporting_images: vec![],
            discovered_at: Utc::now(),
            updated_at: Utc::now(),
            published_at: None,
        }
    }

    #[test]
    fn upsert_creates_then_overwrites_scores_only() {
        let store = Store::open_in_memory().unwrap();
        let mut t = sample_topic("t1", "Electric Vehicles in 2026");
        store.upsert_topic(&t).unwrap();

        t.title = "Should not overwrite title".into();
        t.priority_score = 0.9;
        store.upsert_topic(&t).unwrap();

        let reloaded = store.get_topic("t1").unwrap().unwrap();
        assert_eq!(reloaded.title, "Electric Vehicles in 2026");
        assert_eq!(reloaded.priority_score, 0.9);
    }
}
