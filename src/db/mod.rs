pub mod version;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

/// Open (or create) the profile database at the given path with the schema
/// initialized.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    // The chat path and the scheduler write concurrently.
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.busy_timeout(std::time::Duration::from_millis(5000))?;

    schema::init_schema(&conn).context("failed to initialize schema")?;
    version::check_schema_version(&conn)?;

    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open an in-memory database with the full schema, for tests and dry runs.
pub fn open_memory_database() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    schema::init_schema(&conn).context("failed to initialize schema")?;
    version::check_schema_version(&conn)?;
    Ok(conn)
}

/// Summary of database state for `alter doctor`.
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub schema_version: u32,
    pub entry_count: i64,
    pub summary_count: i64,
    pub integrity_ok: bool,
    pub integrity_details: String,
}

/// Run `PRAGMA integrity_check` and gather row counts.
pub fn check_database_health(conn: &Connection) -> Result<HealthReport> {
    let schema_version = version::get_schema_version(conn)?;
    let entry_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM profile_entries", [], |row| row.get(0))?;
    let summary_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM profile_entries WHERE role = 'system-summary'",
        [],
        |row| row.get(0),
    )?;
    let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;

    Ok(HealthReport {
        schema_version,
        entry_count,
        summary_count,
        integrity_ok: integrity == "ok",
        integrity_details: integrity,
    })
}
