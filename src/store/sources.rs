use std::collections::HashMap;

use rusqlite::params;

use crate::core::types::Source;
use crate::error::StoreError;

use super::Store;

impl Store {
    pub fn get_source(&self, url: &str) -> Result<Option<Source>, StoreError> {
        self.with_read(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM sources WHERE url = ?1")?;
            let mut rows = stmt.query(params![url])?;
            if let Some(row) = rows.next()? {
                Ok(Some(row_to_source(row)))
            } else {
                Ok(None)
            }
        })
    }

    /// Full replace — the source-intelligence cache (C10) computes the next
    /// state (fetch_count, quality_score, ...) and writes it back whole.
    pub fn put_source(&self, source: &Source) -> Result<(), StoreError> {
        let topic_ids_json = serde_json::to_string(&source.topic_ids).unwrap_or_else(|_| "[]".into());
        let eeat_json =
            serde_json::to_string(&source.e_e_a_t_signals).unwrap_or_else(|_| "{}".into());

        self.with_write(|conn| {
            conn.execute(
                "INSERT INTO sources (
                    url, domain, title, content_preview, first_fetched_at, last_fetched_at,
                    fetch_count, topic_ids_json, usage_count, quality_score, e_e_a_t_json,
                    author, published_at, is_stale, truncated
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)
                ON CONFLICT(url) DO UPDATE SET
                    domain = excluded.domain,
                    title = excluded.title,
                    content_preview = excluded.content_preview,
                    last_fetched_at = excluded.last_fetched_at,
                    fetch_count = excluded.fetch_count,
                    topic_ids_json = excluded.topic_ids_json,
                    usage_count = excluded.usage_count,
                    quality_score = excluded.quality_score,
                    e_e_a_t_json = excluded.e_e_a_t_json,
                    author = excluded.author,
                    published_at = excluded.published_at,
                    is_stale = excluded.is_stale,
                    truncated = excluded.truncated",
                params![
                    source.url,
                    source.domain,
                    source.title,
                    source.content_preview,
                    source.first_fetched_at.to_rfc3339(),
                    source.last_fetched_at.to_rfc3339(),
                    source.fetch_count,
                    topic_ids_json,
                    source.usage_count,
                    source.quality_score,
                    eeat_json,
                    source.author,
                    source.published_at.map(|d| d.to_rfc3339()),
                    source.is_stale as i64,
                    source.truncated as i64,
                ],
            )?;
            Ok(())
        })
    }

    /// Fresh (non-stale) cached sources already tagged with `topic_id` —
    /// used by the orchestrator to decide whether a paid backend's fetch
    /// can be skipped this round.
    pub fn get_fresh_sources_for_topic(&self, topic_id: &str) -> Result<Vec<Source>, StoreError> {
        let pattern = format!("%\"{topic_id}\"%");
        self.with_read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM sources WHERE topic_ids_json LIKE ?1 AND is_stale = 0",
            )?;
            let rows = stmt.query_map(params![pattern], |row| Ok(row_to_source(row)))?;
            rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
        })
    }

    pub fn count_sources(&self) -> Result<usize, StoreError> {
        self.with_read(|conn| {
            conn.query_row("SELECT COUNT(*) FROM sources", [], |r| r.get::<_, i64>(0))
                .map(|n| n as usize)
        })
    }
}

fn row_to_source(row: &rusqlite::Row) -> Source {
    let topic_ids_json: String = row.get("topic_ids_json").unwrap_or_default();
    let eeat_json: String = row.get("e_e_a_t_json").unwrap_or_default();
    let first_fetched_at: String = row.get("first_fetched_at").unwrap_or_default();
    let last_fetched_at: String = row.get("last_fetched_at").unwrap_or_default();
    let published_at: Option<String> = row.get("published_at").unwrap_or(None);

    Source {
        url: row.get("url").unwrap_or_default(),
        domain: row.get("domain").unwrap_or_default(),
        title: row.get("title").unwrap_or_default(),
        content_preview: row.get("content_preview").unwrap_or_default(),
        first_fetched_at: chrono::DateTime::parse_from_rfc3339(&first_fetched_at)
            .map(|d| d.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
        last_fetched_at: chrono::DateTime::parse_from_rfc3339(&last_fetched_at)
            .map(|d| d.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
        fetch_count: row.get("fetch_count").unwrap_or(0),
        topic_ids: serde_json::from_str(&topic_ids_json).unwrap_or_default(),
        usage_count: row.get("usage_count").unwrap_or(0),
        quality_score: row.get("quality_score").unwrap_or(0.5),
        e_e_a_t_signals: serde_json::from_str::<HashMap<String, f32>>(&eeat_json)
            .unwrap_or_default(),
        author: row.get("author").unwrap_or(None),
        published_at: published_at
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
            .map(|d| d.with_timezone(&chrono::Utc)),
        is_stale: row.get::<_, i64>("is_stale").unwrap_or(0) != 0,
        truncated: row.get::<_, i64>("truncated").unwrap_or(0) != 0,
    }
}
