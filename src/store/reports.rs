use std::collections::HashMap;

use rusqlite::params;

use crate::core::types::{BackendStat, ResearchReport};
use crate::error::StoreError;

use super::Store;

impl Store {
    /// One report per topic; saving again overwrites (spec §4.1).
    pub fn save_research_report(
        &self,
        topic_id: &str,
        report: &ResearchReport,
    ) -> Result<(), StoreError> {
        let citations_json = serde_json::to_string(&report.citations).unwrap_or_else(|_| "[]".into());
        let backend_stats_json =
            serde_json::to_string(&report.backend_stats).unwrap_or_else(|_| "{}".into());

        self.with_write(|conn| {
            conn.execute(
                "INSERT INTO research_reports (
                    topic_id, query, article_markdown, citations_json,
                    backend_stats_json, cost_usd, generated_at
                ) VALUES (?1,?2,?3,?4,?5,?6,?7)
                ON CONFLICT(topic_id) DO UPDATE SET
                    query = excluded.query,
                    article_markdown = excluded.article_markdown,
                    citations_json = excluded.citations_json,
                    backend_stats_json = excluded.backend_stats_json,
                    cost_usd = excluded.cost_usd,
                    generated_at = excluded.generated_at",
                params![
                    topic_id,
                    report.query,
                    report.article_markdown,
                    citations_json,
                    backend_stats_json,
                    report.cost_usd,
                    report.generated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_research_report(
        &self,
        topic_id: &str,
    ) -> Result<Option<ResearchReport>, StoreError> {
        self.with_read(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM research_reports WHERE topic_id = ?1")?;
            let mut rows = stmt.query(params![topic_id])?;
            if let Some(row) = rows.next()? {
                let citations_json: String = row.get("citations_json")?;
                let backend_stats_json: String = row.get("backend_stats_json")?;
                let generated_at: String = row.get("generated_at")?;
                let citations: Vec<String> =
                    serde_json::from_str(&citations_json).unwrap_or_default();
                let backend_stats: HashMap<String, BackendStat> =
                    serde_json::from_str(&backend_stats_json).unwrap_or_default();
                Ok(Some(ResearchReport {
                    topic_id: row.get("topic_id")?,
                    query: row.get("query")?,
                    article_markdown: row.get("article_markdown")?,
                    citations,
                    backend_stats,
                    cost_usd: row.get("cost_usd")?,
                    generated_at: chrono::DateTime::parse_from_rfc3339(&generated_at)
                        .map(|d| d.with_timezone(&chrono::Utc))
                        .unwrap_or_else(|_| chrono::Utc::now()),
                }))
            } else {
                Ok(None)
            }
        })
    }
}
