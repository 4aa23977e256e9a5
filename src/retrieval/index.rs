//! The document index: every readable file under the docs directory, split into
//! paragraph-bounded chunks and indexed with FTS5 in a private in-memory database.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::text::fts_or_query;

/// A retrieved passage.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Path relative to the docs directory.
    pub source: String,
    pub text: String,
}

pub struct DocumentIndex {
    conn: Mutex<Connection>,
    documents: usize,
    chunks: usize,
}

impl DocumentIndex {
    /// Build a complete index over `dir`.
    ///
    /// Returns `Ok(None)` when the directory holds no indexable text.
    pub fn build(dir: &Path, chunk_chars: usize) -> Result<Option<Self>> {
        let files = collect_files(dir)?;
        if files.is_empty() {
            return Ok(None);
        }

        let conn = Connection::open_in_memory().context("failed to open index database")?;
        conn.execute_batch(
            "CREATE VIRTUAL TABLE chunks USING fts5(text, source UNINDEXED);",
        )?;

        let mut documents = 0;
        let mut chunks = 0;
        for path in &files {
            let bytes = match std::fs::read(path) {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "skipping unreadable document");
                    continue;
                }
            };
            let Ok(text) = String::from_utf8(bytes) else {
                tracing::warn!(file = %path.display(), "skipping non-UTF-8 document");
                continue;
            };

            let source = path
                .strip_prefix(dir)
                .unwrap_or(path)
                .to_string_lossy()
                .into_owned();
            let pieces = split_chunks(&text, chunk_chars);
            if pieces.is_empty() {
                continue;
            }
            for piece in &pieces {
                conn.execute(
                    "INSERT INTO chunks (text, source) VALUES (?1, ?2)",
                    params![piece, source],
                )?;
            }
            documents += 1;
            chunks += pieces.len();
        }

        if chunks == 0 {
            return Ok(None);
        }

        tracing::info!(documents, chunks, dir = %dir.display(), "document index built");
        Ok(Some(Self {
            conn: Mutex::new(conn),
            documents,
            chunks,
        }))
    }

    pub fn documents(&self) -> usize {
        self.documents
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }

    /// BM25-ranked chunks matching any term of `question`.
    pub fn search(&self, question: &str, top_k: usize) -> Result<Vec<Chunk>> {
        let escaped = fts_or_query(question);
        if escaped.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("index lock poisoned: {e}"))?;
        let mut stmt = conn.prepare(
            "SELECT source, text FROM chunks WHERE chunks MATCH ?1 ORDER BY rank LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![escaped, top_k as i64], |row| {
                Ok(Chunk {
                    source: row.get(0)?,
                    text: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// All regular, non-hidden files under `dir`, recursively, in a stable order.
pub fn collect_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let entries = std::fs::read_dir(&current)
            .with_context(|| format!("failed to read directory {}", current.display()))?;
        for entry in entries {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Split text on blank lines and pack paragraphs into chunks of at most
/// `max_chars` characters. Oversized paragraphs are cut on character boundaries.
pub fn split_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let para_len = paragraph.chars().count();

        if current_len > 0 && current_len + 2 + para_len > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if para_len > max_chars {
            let chars: Vec<char> = paragraph.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        if current_len > 0 {
            current.push_str("\n\n");
            current_len += 2;
        }
        current.push_str(paragraph);
        current_len += para_len;
    }

    if current_len > 0 {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn split_packs_paragraphs() {
        let text = "alpha\n\nbeta\n\n\n\ngamma";
        assert_eq!(split_chunks(text, 100), vec!["alpha\n\nbeta\n\ngamma"]);
        assert_eq!(split_chunks(text, 12), vec!["alpha\n\nbeta", "gamma"]);
    }

    #[test]
    fn split_cuts_oversized_paragraphs() {
        let chunks = split_chunks("abcdefghij", 4);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
        assert!(split_chunks("  \n\n  ", 10).is_empty());
    }

    #[test]
    fn empty_dir_builds_nothing() {
        let tmp = TempDir::new().unwrap();
        assert!(DocumentIndex::build(tmp.path(), 1000).unwrap().is_none());
    }

    #[test]
    fn hidden_and_binary_files_are_skipped() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(".DS_Store"), "ignored text").unwrap();
        std::fs::write(tmp.path().join("blob.bin"), [0xff, 0xfe, 0x00, 0x80]).unwrap();
        assert!(DocumentIndex::build(tmp.path(), 1000).unwrap().is_none());
    }

    #[test]
    fn recursive_build_and_search() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("notes").join("music");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("erhu.md"), "Erhu scales: practice D major slowly.").unwrap();
        std::fs::write(tmp.path().join("poker.txt"), "Poker: fold weak hands early.").unwrap();

        let index = DocumentIndex::build(tmp.path(), 1000).unwrap().unwrap();
        assert_eq!(index.documents(), 2);
        assert_eq!(index.chunks(), 2);

        let hits = index.search("how should I practice erhu?", 3).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].source.ends_with("erhu.md"));
        assert!(index.search("chess", 3).unwrap().is_empty());
    }
}
