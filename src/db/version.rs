//! Schema version tracking.
//!
//! The version lives in `schema_meta`. Version 1 is the only layout so far, so
//! opening a database just refuses one written by a newer build.

use anyhow::{bail, Result};
use rusqlite::Connection;

/// The schema version that the current binary expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Get the current schema version from the database.
pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().unwrap_or(0))
        },
    )
}

/// Fail when the stored schema is not one this build can read.
pub fn check_schema_version(conn: &Connection) -> Result<()> {
    let version = get_schema_version(conn)?;
    tracing::debug!(schema_version = version, expected = CURRENT_SCHEMA_VERSION, "checking schema");

    if version != CURRENT_SCHEMA_VERSION {
        bail!(
            "database schema v{version} is not supported by this build (expects v{CURRENT_SCHEMA_VERSION})"
        );
    }
    Ok(())
}
