use rusqlite::{params, Connection};

use crate::core::types::{Document, DocumentStatus};
use crate::error::StoreError;

use super::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    DuplicateCanonicalUrl,
}

impl Store {
    /// `insert_document` never errors on a uniqueness conflict — the spec
    /// treats `DuplicateCanonicalUrl` as a success signal from the store, not
    /// an error (spec §4.1, §7).
    pub fn insert_document(&self, doc: &Document) -> Result<InsertOutcome, StoreError> {
        self.with_write(|conn| insert_document_tx(conn, doc))
    }

    pub fn get_documents_by_language(
        &self,
        language: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, StoreError> {
        self.with_read(|conn| {
            let sql = match limit {
                Some(_) => "SELECT * FROM documents WHERE language = ?1 ORDER BY rowid ASC LIMIT ?2",
                None => "SELECT * FROM documents WHERE language = ?1 ORDER BY rowid ASC",
            };
            let mut stmt = conn.prepare(sql)?;
            let rows = if let Some(n) = limit {
                stmt.query_map(params![language, n as i64], row_to_document)?
            } else {
                stmt.query_map(params![language], row_to_document)?
            };
            let mut out = Vec::new();
            for r in rows {
                match r {
                    Ok(Some(doc)) => out.push(doc),
                    Ok(None) => {} // corrupted row, logged in row_to_document
                    Err(e) => return Err(e),
                }
            }
            Ok(out)
        })
    }

    pub fn get_document(&self, id: &str) -> Result<Option<Document>, StoreError> {
        self.with_read(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM documents WHERE id = ?1")?;
            let mut rows = stmt.query(params![id])?;
            if let Some(row) = rows.next()? {
                Ok(row_to_document(row)?)
            } else {
                Ok(None)
            }
        })
    }

    pub fn get_document_by_canonical_url(
        &self,
        canonical_url: &str,
    ) -> Result<Option<Document>, StoreError> {
        self.with_read(|conn| {
            let mut stmt =
                conn.prepare("SELECT * FROM documents WHERE canonical_url = ?1")?;
            let mut rows = stmt.query(params![canonical_url])?;
            if let Some(row) = rows.next()? {
                Ok(row_to_document(row)?)
            } else {
                Ok(None)
            }
        })
    }
}

fn insert_document_tx(conn: &Connection, doc: &Document) -> rusqlite::Result<InsertOutcome> {
    let entities_json = serde_json::to_string(&doc.entities).unwrap_or_else(|_| "[]".into());
    let keywords_json = serde_json::to_string(&doc.keywords).unwrap_or_else(|_| "[]".into());

    let result = conn.execute(
        "INSERT INTO documents (
            id, source, source_url, canonical_url, title, content, summary,
            language, domain, market, vertical, content_hash, published_at,
            fetched_at, author, entities_json, keywords_json,
            reliability_score, paywall, status
        ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20)",
        params![
            doc.id,
            doc.source,
            doc.source_url,
            doc.canonical_url,
            doc.title,
            doc.content,
            doc.summary,
            doc.language,
            doc.domain,
            doc.market,
            doc.vertical,
            doc.content_hash,
            doc.published_at.map(|d| d.to_rfc3339()),
            doc.fetched_at.to_rfc3339(),
            doc.author,
            entities_json,
            keywords_json,
            doc.reliability_score,
            doc.paywall as i64,
            doc.status.as_str(),
        ],
    );

    match result {
        Ok(_) => {
            conn.execute(
                "INSERT INTO documents_fts (doc_id, title, content, summary) VALUES (?1,?2,?3,?4)",
                params![doc.id, doc.title, doc.content, doc.summary],
            )?;
            Ok(InsertOutcome::Inserted)
        }
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Ok(InsertOutcome::DuplicateCanonicalUrl)
        }
        Err(e) => Err(e),
    }
}

/// Returns `Ok(None)` (not an error) for a corrupted row — readers skip and
/// log rather than abort the batch (spec §4.1 failure semantics).
fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<Option<Document>> {
    let id: String = row.get("id")?;
    let entities_json: String = row.get("entities_json")?;
    let keywords_json: String = row.get("keywords_json")?;

    let entities: Vec<String> = match serde_json::from_str(&entities_json) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(row_id = %id, error = %e, "corrupted entities_json column, skipping row");
            return Ok(None);
        }
    };
    let keywords: Vec<String> = match serde_json::from_str(&keywords_json) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(row_id = %id, error = %e, "corrupted keywords_json column, skipping row");
            return Ok(None);
        }
    };

    let published_at: Option<String> = row.get("published_at")?;
    let fetched_at: String = row.get("fetched_at")?;
    let status: String = row.get("status")?;

    Ok(Some(Document {
        id,
        source: row.get("source")?,
        source_url: row.get("source_url")?,
        canonical_url: row.get("canonical_url")?,
        title: row.get("title")?,
        content: row.get("content")?,
        summary: row.get("summary")?,
        language: row.get("language")?,
        domain: row.get("domain")?,
        market: row.get("market")?,
        vertical: row.get("vertical")?,
        content_hash: row.get("content_hash")?,
        published_at: published_at.and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok().map(|d| d.with_timezone(&chrono::Utc))),
        fetched_at: chrono::DateTime::parse_from_rfc3339(&fetched_at)
            .map(|d| d.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
        author: row.get("author")?,
        entities,
        keywords,
        reliability_score: row.get("reliability_score")?,
        paywall: row.get::<_, i64>("paywall")? != 0,
        status: DocumentStatus::parse(&status),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DocumentStatus;
    use chrono::Utc;

    fn sample_doc(canonical_url: &str) -> Document {
        Document {
            id: uuid::Uuid::new_v4().to_string(),
            source: "rss_example".into(),
            source_url: canonical_url.into(),
            canonical_url: canonical_url.into(),
            title: "Example title".into(),
            content: "Example content body".into(),
            summary: "Example summary".into(),
            language: "en".into(),
            domain: "example".into(),
            market: "US".into(),
            vertical: "tech".into(),
            content_hash: "hash".into(),
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
    fn insert_then_duplicate() {
        let store = Store::open_in_memory().unwrap();
        let doc = sample_doc("https://example.com/a");
        assert_eq!(
            store.insert_document(&doc).unwrap(),
            InsertOutcome::Inserted
        );
        let mut dup = sample_doc("https://example.com/a");
        dup.id = uuid::Uuid::new_v4().to_string();
        assert_eq!(
            store.insert_document(&dup).unwrap(),
            InsertOutcome::DuplicateCanonicalUrl
        );
    }

    #[test]
    fn get_documents_by_language_is_insertion_order_stable() {
        let store = Store::open_in_memory().unwrap();
        for i in 0..3 {
            let mut d = sample_doc(&format!("https://example.com/{i}"));
            d.language = "de".into();
            store.insert_document(&d).unwrap();
        }
        let docs = store.get_documents_by_language("de", None).unwrap();
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].canonical_url, "https://example.com/0");
        assert_eq!(docs[2].canonical_url, "https://example.com/2");
    }
}
