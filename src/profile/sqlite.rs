//! SQLite profile backend: BM25 keyword relevance, topped up with recent entries.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use super::{ProfileEntry, ProfileStore};
use crate::text::fts_or_query;

pub struct SqliteProfileStore {
    db: Arc<Mutex<Connection>>,
    user_id: String,
}

impl SqliteProfileStore {
    pub fn new(conn: Connection, user_id: &str) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            user_id: user_id.to_string(),
        }
    }

    /// Run a closure against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &str) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let user_id = self.user_id.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = db
                .lock()
                .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
            f(&mut conn, &user_id)
        })
        .await
        .context("db task failed")?
    }
}

#[async_trait]
impl ProfileStore for SqliteProfileStore {
    async fn append(&self, entry: &ProfileEntry) -> Result<()> {
        let entry = entry.clone();
        self.with_conn(move |conn, user_id| insert_entry(conn, user_id, &entry))
            .await
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ProfileEntry>> {
        let query = query.to_string();
        self.with_conn(move |conn, user_id| {
            let mut results = fts_search(conn, user_id, &query, limit)?;
            if results.len() < limit {
                let seen: HashSet<String> = results.iter().map(|e| e.id.clone()).collect();
                let fill = recent_entries(conn, user_id, limit + seen.len())?;
                results.extend(
                    fill.into_iter()
                        .filter(|e| !seen.contains(&e.id))
                        .take(limit - results.len()),
                );
            }
            Ok(results)
        })
        .await
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ProfileEntry>> {
        self.with_conn(move |conn, user_id| recent_entries(conn, user_id, limit))
            .await
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

/// Insert the entry and sync its FTS5 row inside one transaction.
pub fn insert_entry(conn: &mut Connection, user_id: &str, entry: &ProfileEntry) -> Result<()> {
    let tx = conn.transaction()?;
    let tags = serde_json::to_string(&entry.tags)?;
    let created_at = entry.timestamp.with_timezone(&Utc).to_rfc3339();

    tx.execute(
        "INSERT INTO profile_entries (id, user_id, role, text, created_at, tags) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![entry.id, user_id, entry.role.as_str(), entry.text, created_at, tags],
    )?;
    let rowid = tx.last_insert_rowid();
    tx.execute(
        "INSERT INTO profile_fts (rowid, text, id) VALUES (?1, ?2, ?3)",
        params![rowid, entry.text, entry.id],
    )?;

    tx.commit()?;
    Ok(())
}

/// Look up one entry by id.
pub fn get_entry(conn: &Connection, id: &str) -> Result<Option<ProfileEntry>> {
    let row = conn
        .query_row(
            "SELECT id, role, text, created_at, tags FROM profile_entries WHERE id = ?1",
            params![id],
            row_to_raw,
        )
        .optional()?;
    row.map(raw_to_entry).transpose()
}

type RawRow = (String, String, String, String, String);

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn raw_to_entry((id, role, text, created_at, tags): RawRow) -> Result<ProfileEntry> {
    let timestamp = DateTime::parse_from_rfc3339(&created_at)
        .with_context(|| format!("bad timestamp on entry {id}"))?
        .with_timezone(&Local);
    Ok(ProfileEntry {
        id,
        role: role.parse().map_err(anyhow::Error::msg)?,
        text,
        timestamp,
        tags: serde_json::from_str(&tags).unwrap_or_default(),
    })
}

/// FTS5 BM25 keyword search; terms are OR-ed so partial matches still rank.
fn fts_search(
    conn: &Connection,
    user_id: &str,
    query: &str,
    limit: usize,
) -> Result<Vec<ProfileEntry>> {
    let escaped = fts_or_query(query);
    if escaped.is_empty() {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare(
        "SELECT e.id, e.role, e.text, e.created_at, e.tags \
         FROM profile_fts JOIN profile_entries e ON e.rowid = profile_fts.rowid \
         WHERE profile_fts MATCH ?1 AND e.user_id = ?2 \
         ORDER BY bm25(profile_fts) LIMIT ?3",
    )?;
    let rows = stmt
        .query_map(params![escaped, user_id, limit as i64], row_to_raw)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(raw_to_entry).collect()
}

fn recent_entries(conn: &Connection, user_id: &str, limit: usize) -> Result<Vec<ProfileEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, role, text, created_at, tags FROM profile_entries \
         WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![user_id, limit as i64], row_to_raw)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(raw_to_entry).collect()
}
