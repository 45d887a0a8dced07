use rusqlite::params;

use crate::error::StoreError;

use super::Store;

/// 30-day conditional-GET cache for the RSS collector (spec §4.4), stored so
/// it survives process restarts rather than held in an in-memory `moka`
/// cache like the teacher's ephemeral scrape/search caches.
#[derive(Debug, Clone, Default)]
pub struct FeedCacheEntry {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl Store {
    pub fn get_feed_cache(&self, feed_url: &str) -> Result<Option<FeedCacheEntry>, StoreError> {
        self.with_read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT etag, last_modified, expires_at FROM feed_cache WHERE feed_url = ?1",
            )?;
            let mut rows = stmt.query(params![feed_url])?;
            if let Some(row) = rows.next()? {
                let expires_at: String = row.get("expires_at")?;
                let expired = chrono::DateTime::parse_from_rfc3339(&expires_at)
                    .map(|d| d.with_timezone(&chrono::Utc) < chrono::Utc::now())
                    .unwrap_or(true);
                if expired {
                    return Ok(None);
                }
                Ok(Some(FeedCacheEntry {
                    etag: row.get("etag")?,
                    last_modified: row.get("last_modified")?,
                }))
            } else {
                Ok(None)
            }
        })
    }

    pub fn save_feed_cache(
        &self,
        feed_url: &str,
        etag: Option<&str>,
        last_modified: Option<&str>,
    ) -> Result<(), StoreError> {
        let expires_at = chrono::Utc::now() + chrono::Duration::days(30);
        self.with_write(|conn| {
            conn.execute(
                "INSERT INTO feed_cache (feed_url, etag, last_modified, expires_at)
                 VALUES (?1,?2,?3,?4)
                 ON CONFLICT(feed_url) DO UPDATE SET
                    etag = excluded.etag,
                    last_modified = excluded.last_modified,
                    expires_at = excluded.expires_at",
                params![feed_url, etag, last_modified, expires_at.to_rfc3339()],
            )?;
            Ok(())
        })
    }
}
