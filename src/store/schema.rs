//! Forward-only schema migrations. Each entry is applied exactly once and
//! recorded in `schema_migrations`, mirroring the teacher's preference for an
//! explicit, auditable startup step over an ORM-managed schema.

pub const MIGRATIONS: &[(i64, &str)] = &[
    (
        1,
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id              TEXT PRIMARY KEY,
            source          TEXT NOT NULL,
            source_url      TEXT NOT NULL,
            canonical_url   TEXT NOT NULL UNIQUE,
            title           TEXT NOT NULL,
            content         TEXT NOT NULL,
            summary         TEXT NOT NULL,
            language        TEXT NOT NULL,
            domain          TEXT NOT NULL,
            market          TEXT NOT NULL,
            vertical        TEXT NOT NULL,
            content_hash    TEXT NOT NULL,
            published_at    TEXT,
            fetched_at      TEXT NOT NULL,
            author          TEXT,
            entities_json   TEXT NOT NULL DEFAULT '[]',
            keywords_json   TEXT NOT NULL DEFAULT '[]',
            reliability_score REAL NOT NULL DEFAULT 0.5,
            paywall         INTEGER NOT NULL DEFAULT 0,
            status          TEXT NOT NULL DEFAULT 'new',
            rowid_seq       INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_documents_language ON documents(language);
        CREATE INDEX IF NOT EXISTS idx_documents_content_hash ON documents(content_hash);

        CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts USING fts5(
            doc_id UNINDEXED, title, content, summary
        );

        CREATE TABLE IF NOT EXISTS topics (
            id               TEXT PRIMARY KEY,
            title            TEXT NOT NULL,
            description      TEXT NOT NULL,
            cluster_label    TEXT NOT NULL,
            source           TEXT NOT NULL,
            source_url       TEXT NOT NULL,
            language         TEXT NOT NULL,
            domain           TEXT NOT NULL,
            market           TEXT NOT NULL,
            demand_score     REAL NOT NULL DEFAULT 0,
            opportunity_score REAL NOT NULL DEFAULT 0,
            fit_score        REAL NOT NULL DEFAULT 0,
            novelty_score    REAL NOT NULL DEFAULT 0,
            priority_score   REAL NOT NULL DEFAULT 0,
            competitors_json TEXT NOT NULL DEFAULT '[]',
            content_gaps_json TEXT NOT NULL DEFAULT '[]',
            keywords_json    TEXT NOT NULL DEFAULT '{}',
            hero_image_url   TEXT,
            supporting_images_json TEXT NOT NULL DEFAULT '[]',
            discovered_at    TEXT NOT NULL,
            updated_at       TEXT NOT NULL,
            published_at     TEXT
        );

        CREATE TABLE IF NOT EXISTS sources (
            url               TEXT PRIMARY KEY,
            domain            TEXT NOT NULL,
            title             TEXT NOT NULL,
            content_preview   TEXT NOT NULL,
            first_fetched_at  TEXT NOT NULL,
            last_fetched_at   TEXT NOT NULL,
            fetch_count       INTEGER NOT NULL DEFAULT 1,
            topic_ids_json    TEXT NOT NULL DEFAULT '[]',
            usage_count       INTEGER NOT NULL DEFAULT 0,
            quality_score     REAL NOT NULL DEFAULT 0.5,
            e_e_a_t_json      TEXT NOT NULL DEFAULT '{}',
            author            TEXT,
            published_at      TEXT,
            is_stale          INTEGER NOT NULL DEFAULT 0,
            truncated         INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS serp_results (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            topic_id     TEXT NOT NULL,
            search_query TEXT NOT NULL,
            searched_at  TEXT NOT NULL,
            rows_json    TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_serp_topic ON serp_results(topic_id);

        CREATE TABLE IF NOT EXISTS research_reports (
            topic_id            TEXT PRIMARY KEY,
            query               TEXT NOT NULL,
            article_markdown    TEXT NOT NULL,
            citations_json      TEXT NOT NULL,
            backend_stats_json  TEXT NOT NULL,
            cost_usd            REAL NOT NULL DEFAULT 0,
            generated_at        TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS dead_letter_queue (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            task_name  TEXT NOT NULL,
            error      TEXT NOT NULL,
            timestamp  TEXT NOT NULL,
            requeued   INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS feed_cache (
            feed_url      TEXT PRIMARY KEY,
            etag          TEXT,
            last_modified TEXT,
            expires_at    TEXT NOT NULL
        );
        "#,
    ),
];

pub fn current_version(conn: &rusqlite::Connection) -> rusqlite::Result<i64> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (version INTEGER PRIMARY KEY, applied_at TEXT NOT NULL)",
        [],
    )?;
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )
}

pub fn apply_migrations(conn: &rusqlite::Connection) -> anyhow::Result<()> {
    let applied = current_version(conn)?;
    for (version, sql) in MIGRATIONS {
        if *version <= applied {
            continue;
        }
        conn.execute_batch(sql)?;
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![version, chrono::Utc::now().to_rfc3339()],
        )?;
        tracing::info!(version, "applied store migration");
    }
    Ok(())
}
