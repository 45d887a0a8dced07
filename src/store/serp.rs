use rusqlite::params;

use crate::core::types::{SerpRow, SerpSnapshot};
use crate::error::StoreError;

use super::Store;

impl Store {
    /// Snapshots are append-only.
    pub fn save_serp_results(
        &self,
        topic_id: &str,
        query: &str,
        rows: &[SerpRow],
    ) -> Result<(), StoreError> {
        let rows_json = serde_json::to_string(rows).unwrap_or_else(|_| "[]".into());
        self.with_write(|conn| {
            conn.execute(
                "INSERT INTO serp_results (topic_id, search_query, searched_at, rows_json)
                 VALUES (?1,?2,?3,?4)",
                params![topic_id, query, chrono::Utc::now().to_rfc3339(), rows_json],
            )?;
            Ok(())
        })
    }

    /// "Latest" = max `searched_at`.
    pub fn get_latest_serp_snapshot(
        &self,
        topic_id: &str,
    ) -> Result<Option<SerpSnapshot>, StoreError> {
        self.with_read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT search_query, searched_at, rows_json FROM serp_results
                 WHERE topic_id = ?1 ORDER BY searched_at DESC LIMIT 1",
            )?;
            let mut rows = stmt.query(params![topic_id])?;
            if let Some(row) = rows.next()? {
                Ok(Some(row_to_snapshot(topic_id, row)))
            } else {
                Ok(None)
            }
        })
    }

    pub fn get_serp_history(
        &self,
        topic_id: &str,
        limit: usize,
    ) -> Result<Vec<SerpSnapshot>, StoreError> {
        self.with_read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT search_query, searched_at, rows_json FROM serp_results
                 WHERE topic_id = ?1 ORDER BY searched_at DESC LIMIT ?2",
            )?;
            let mut rows = stmt.query(params![topic_id, limit as i64])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                out.push(row_to_snapshot(topic_id, row));
            }
            Ok(out)
        })
    }
}

fn row_to_snapshot(topic_id: &str, row: &rusqlite::Row) -> SerpSnapshot {
    let search_query: String = row.get("search_query").unwrap_or_default();
    let searched_at: String = row.get("searched_at").unwrap_or_default();
    let rows_json: String = row.get("rows_json").unwrap_or_default();
    let rows: Vec<SerpRow> = serde_json::from_str(&rows_json).unwrap_or_default();
    SerpSnapshot {
        topic_id: topic_id.to_string(),
        search_query,
        searched_at: chrono::DateTime::parse_from_rfc3339(&searched_at)
            .map(|d| d.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
        rows,
    }
}
