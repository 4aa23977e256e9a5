//! SQL DDL for the local profile store.
//!
//! Defines `profile_entries`, its FTS5 mirror `profile_fts`, and `schema_meta`.
//! All DDL uses `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

/// Schema version 1.
const SCHEMA_SQL: &str = r#"
-- Append-only profile entries
CREATE TABLE IF NOT EXISTS profile_entries (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    role TEXT NOT NULL CHECK(role IN ('user','assistant','system-summary')),
    text TEXT NOT NULL,
    created_at TEXT NOT NULL,
    -- JSON array, e.g. ["daily_summary"]
    tags TEXT NOT NULL DEFAULT '[]'
);

CREATE INDEX IF NOT EXISTS idx_entries_user ON profile_entries(user_id);
CREATE INDEX IF NOT EXISTS idx_entries_created ON profile_entries(created_at);

-- Full-text search (BM25)
CREATE VIRTUAL TABLE IF NOT EXISTS profile_fts USING fts5(
    text,
    id UNINDEXED,
    content='profile_entries',
    content_rowid='rowid'
);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}
