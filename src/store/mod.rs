//! C1 — Document Store. SQLite-backed persistence for documents, topics,
//! sources, SERP snapshots, research reports, and the dead-letter queue,
//! behind a single connection-acquisition primitive (spec §4.1).
//!
//! File-backed stores run in WAL mode: each operation opens its own
//! connection (cheap under WAL, and lets readers proceed while a writer
//! holds the write lock). The `:memory:` test path keeps one connection
//! alive for the store's lifetime, since a fresh `:memory:` connection would
//! be a different, empty database.

mod dlq;
mod documents;
mod feed_cache;
mod reports;
mod schema;
mod serp;
mod sources;
mod topics;

pub use documents::InsertOutcome;
pub use feed_cache::FeedCacheEntry;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::error::StoreError;

enum Backing {
    File(PathBuf),
    Memory(Arc<Mutex<Connection>>),
}

pub struct Store {
    backing: Backing,
    /// Serializes writers; file-backed readers bypass this entirely.
    write_lock: Arc<Mutex<()>>,
}

impl Store {
    /// Open (creating if absent) a file-backed store at `path`, in WAL mode.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                let _ = std::fs::create_dir_all(parent);
            }
        }
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        schema::apply_migrations(&conn)?;
        Ok(Self {
            backing: Backing::File(path),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Open an in-memory store (tests) — one shared connection for the
    /// store's lifetime (spec's "single get-connection primitive").
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        schema::apply_migrations(&conn)?;
        Ok(Self {
            backing: Backing::Memory(Arc::new(Mutex::new(conn))),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn with_read<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        match &self.backing {
            Backing::File(path) => {
                let conn = Connection::open(path)?;
                conn.pragma_update(None, "journal_mode", "WAL")?;
                Ok(f(&conn)?)
            }
            Backing::Memory(shared) => {
                let conn = shared.lock().expect("store mutex poisoned");
                Ok(f(&conn)?)
            }
        }
    }

    fn with_write<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let _guard = self.write_lock.lock().expect("store write lock poisoned");
        match &self.backing {
            Backing::File(path) => {
                let conn = Connection::open(path)?;
                conn.pragma_update(None, "journal_mode", "WAL")?;
                Ok(f(&conn)?)
            }
            Backing::Memory(shared) => {
                let conn = shared.lock().expect("store mutex poisoned");
                Ok(f(&conn)?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_in_memory_and_applies_migrations() {
        let store = Store::open_in_memory().unwrap();
        let version = store.with_read(|c| schema::current_version(c)).unwrap();
        assert_eq!(version, 1);
    }
}
