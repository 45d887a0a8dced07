use rusqlite::params;

use crate::core::types::DeadLetter;
use crate::error::StoreError;

use super::Store;

impl Store {
    pub fn write_dead_letter(&self, task_name: &str, error: &str) -> Result<(), StoreError> {
        self.with_write(|conn| {
            conn.execute(
                "INSERT INTO dead_letter_queue (task_name, error, timestamp) VALUES (?1,?2,?3)",
                params![task_name, error, chrono::Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
    }

    /// Operator inspection surface (SPEC_FULL §3): rows preserved until
    /// explicitly requeued.
    pub fn list_dead_letters(&self) -> Result<Vec<(i64, DeadLetter)>, StoreError> {
        self.with_read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, task_name, error, timestamp FROM dead_letter_queue
                 WHERE requeued = 0 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                let timestamp: String = row.get("timestamp")?;
                Ok((
                    row.get::<_, i64>("id")?,
                    DeadLetter {
                        task_name: row.get("task_name")?,
                        error: row.get("error")?,
                        timestamp: chrono::DateTime::parse_from_rfc3339(&timestamp)
                            .map(|d| d.with_timezone(&chrono::Utc))
                            .unwrap_or_else(|_| chrono::Utc::now()),
                    },
                ))
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
    }

    /// Marks a dead-letter row as requeued (operator intervention, spec §5).
    pub fn requeue_dead_letter(&self, id: i64) -> Result<(), StoreError> {
        self.with_write(|conn| {
            conn.execute(
                "UPDATE dead_letter_queue SET requeued = 1 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dlq_round_trip() {
        let store = Store::open_in_memory().unwrap();
        store.write_dead_letter("sync_notion", "timeout").unwrap();
        let pending = store.list_dead_letters().unwrap();
        assert_eq!(pending.len(), 1);
        store.requeue_dead_letter(pending[0].0).unwrap();
        assert!(store.list_dead_letters().unwrap().is_empty());
    }
}
