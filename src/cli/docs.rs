use anyhow::{Context, Result};
use std::path::Path;

use crate::context::AppContext;

/// Copy a document into the docs directory and rebuild the index.
pub async fn add(ctx: &AppContext, path: &Path) -> Result<()> {
    let rag = ctx
        .retrieval
        .as_ref()
        .context("retrieval is disabled (set retrieval.enabled = true)")?;

    let dest = rag.upload(path).await?;
    println!("Added {}", dest.display());
    println!("{} document(s) indexed from {}", rag.document_count(), rag.docs_dir().display());
    Ok(())
}
