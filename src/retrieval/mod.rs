//! Document retrieval for the chat prompt.
//!
//! The augmenter owns a [`DocumentIndex`] built from every file in the docs
//! directory. Rebuilds happen off-lock on the blocking pool and the finished
//! index is swapped in whole, so readers see either the old or the new index.
//! Queries never fail: anything that goes wrong yields an empty context.

pub mod index;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub use index::{Chunk, DocumentIndex};

use crate::config::RetrievalConfig;
use crate::model::{ChatMessage, ChatOptions, ModelProvider};

const ANSWER_PROMPT: &str = "Context information is below.\n\
---------------------\n\
{context}\n\
---------------------\n\
Given the context information and not prior knowledge, answer the query.\n\
Query: {question}\n\
Answer: ";

pub struct RetrievalAugmenter {
    docs_dir: PathBuf,
    top_k: usize,
    chunk_chars: usize,
    model: Arc<dyn ModelProvider>,
    options: ChatOptions,
    index: Mutex<Option<Arc<DocumentIndex>>>,
    build_lock: tokio::sync::Mutex<()>,
}

impl RetrievalAugmenter {
    pub fn new(
        config: &RetrievalConfig,
        docs_dir: PathBuf,
        model: Arc<dyn ModelProvider>,
        options: ChatOptions,
    ) -> Self {
        Self {
            docs_dir,
            top_k: config.top_k.max(1),
            chunk_chars: config.chunk_chars,
            model,
            options,
            index: Mutex::new(None),
            build_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn docs_dir(&self) -> &Path {
        &self.docs_dir
    }

    /// (Re)build the index from the docs directory, creating it if missing.
    pub async fn build(&self) -> Result<()> {
        let _guard = self.build_lock.lock().await;

        tokio::fs::create_dir_all(&self.docs_dir)
            .await
            .with_context(|| format!("failed to create docs dir {}", self.docs_dir.display()))?;

        let dir = self.docs_dir.clone();
        let chunk_chars = self.chunk_chars;
        let built = tokio::task::spawn_blocking(move || DocumentIndex::build(&dir, chunk_chars))
            .await
            .context("index build task failed")??;

        if built.is_none() {
            tracing::info!(dir = %self.docs_dir.display(), "no documents, retrieval disabled");
        }
        self.swap(built.map(Arc::new))
    }

    fn swap(&self, next: Option<Arc<DocumentIndex>>) -> Result<()> {
        let mut slot = self
            .index
            .lock()
            .map_err(|e| anyhow::anyhow!("index lock poisoned: {e}"))?;
        *slot = next;
        Ok(())
    }

    fn current(&self) -> Option<Arc<DocumentIndex>> {
        self.index.lock().ok().and_then(|slot| slot.clone())
    }

    pub fn is_ready(&self) -> bool {
        self.current().is_some()
    }

    /// Number of indexed documents; zero when there is no index.
    pub fn document_count(&self) -> usize {
        self.current().map(|i| i.documents()).unwrap_or(0)
    }

    /// Context text for `question`, or `""` when there is nothing to add.
    pub async fn query(&self, question: &str) -> String {
        match self.try_query(question).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(error = %e, "retrieval query failed");
                String::new()
            }
        }
    }

    async fn try_query(&self, question: &str) -> Result<String> {
        let Some(index) = self.current() else {
            return Ok(String::new());
        };

        let top_k = self.top_k;
        let q = question.to_string();
        let chunks = tokio::task::spawn_blocking(move || index.search(&q, top_k))
            .await
            .context("index search task failed")??;
        if chunks.is_empty() {
            return Ok(String::new());
        }
        tracing::debug!(hits = chunks.len(), "retrieved document chunks");

        let context = chunks
            .iter()
            .map(|c| format!("source: {}\n{}", c.source, c.text))
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = ANSWER_PROMPT
            .replace("{context}", &context)
            .replace("{question}", question);

        let answer = self
            .model
            .chat(&[ChatMessage::user(prompt)], &self.options)
            .await?;
        Ok(answer.trim().to_string())
    }

    /// Copy a file into the docs directory and rebuild.
    pub async fn upload(&self, path: &Path) -> Result<PathBuf> {
        let name = path
            .file_name()
            .with_context(|| format!("not a file path: {}", path.display()))?;
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        self.store_upload(&name.to_string_lossy(), &bytes).await
    }

    /// Write uploaded bytes under `name` in the docs directory and rebuild.
    pub async fn store_upload(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let file_name = Path::new(name)
            .file_name()
            .filter(|n| !n.to_string_lossy().starts_with('.'))
            .with_context(|| format!("invalid document name: {name}"))?;

        tokio::fs::create_dir_all(&self.docs_dir).await?;
        let dest = self.docs_dir.join(file_name);
        tokio::fs::write(&dest, bytes)
            .await
            .with_context(|| format!("failed to write {}", dest.display()))?;
        tracing::info!(file = %dest.display(), "document uploaded");

        self.build().await?;
        Ok(dest)
    }
}
