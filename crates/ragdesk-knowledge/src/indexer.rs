//! Write side of the vector store.
//!
//! Walks a root directory, extracts text, chunks it, embeds the chunks in
//! batches and appends them to the store. Each document is handled on its
//! own: a failure is logged and the walk moves on.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ragdesk_core::access::normalize_role;
use ragdesk_core::config::IndexConfig;
use ragdesk_core::error::{RagDeskError, Result};
use ragdesk_core::traits::Embedder;
use serde::Serialize;
use walkdir::WalkDir;

use crate::chunker::{Chunk, Chunker};
use crate::extract::{DocumentKind, extract_text};
use crate::store::{NewRecord, VectorStore};

/// Summary of one indexing run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexReport {
    pub documents_seen: usize,
    pub documents_indexed: usize,
    pub chunks_added: usize,
    /// `(path, error)` for every skipped document.
    pub failures: Vec<(String, String)>,
}

/// Department of a file: the first directory under `root`, lowercased.
/// Files directly under `root` (or outside it) fall back to `fallback`.
pub fn department_for(root: &Path, path: &Path, fallback: &str) -> String {
    let Ok(rel) = path.strip_prefix(root) else {
        return fallback.to_string();
    };
    let mut components = rel.components();
    let first = components.next();
    // A bare filename has no department directory.
    if components.next().is_none() {
        return fallback.to_string();
    }
    first
        .and_then(|c| c.as_os_str().to_str())
        .map(normalize_role)
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

pub struct Indexer {
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
    batch_size: usize,
    fallback_department: String,
}

impl Indexer {
    pub fn new(
        store: Arc<VectorStore>,
        embedder: Arc<dyn Embedder>,
        config: &IndexConfig,
        batch_size: usize,
        fallback_department: &str,
    ) -> Self {
        Self {
            store,
            embedder,
            chunker: Chunker::from_config(config),
            batch_size: batch_size.max(1),
            fallback_department: fallback_department.to_string(),
        }
    }

    /// Index every markdown and text document under `root`.
    ///
    /// Files are visited in sorted order so ids are reproducible for a
    /// given tree. Running this twice appends a second copy of every chunk.
    pub async fn index_directory(&self, root: &Path) -> Result<IndexReport> {
        if !root.is_dir() {
            return Err(RagDeskError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("document root not found: {}", root.display()),
            )));
        }

        let files: Vec<PathBuf> = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(e) => Some(e),
                Err(e) => {
                    tracing::warn!("⚠️ Skipping unreadable entry: {e}");
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| DocumentKind::from_path(p).is_indexable())
            .collect();

        let mut report = IndexReport {
            documents_seen: files.len(),
            ..Default::default()
        };

        if files.is_empty() {
            tracing::info!("📂 No documents under {}, nothing to index", root.display());
            return Ok(report);
        }

        for path in &files {
            match self.index_file(root, path).await {
                Ok(0) => {}
                Ok(n) => {
                    report.documents_indexed += 1;
                    report.chunks_added += n;
                }
                Err(e) => {
                    tracing::warn!("⚠️ Failed to index {}: {e}", path.display());
                    report.failures.push((path.display().to_string(), e.to_string()));
                }
            }
        }

        tracing::info!(
            "✅ Indexed {} chunks from {}/{} documents under {}",
            report.chunks_added,
            report.documents_indexed,
            report.documents_seen,
            root.display()
        );
        Ok(report)
    }

    /// Index a single document and return the number of chunks added.
    pub async fn index_file(&self, root: &Path, path: &Path) -> Result<usize> {
        let text = extract_text(path)?;
        let department = department_for(root, path, &self.fallback_department);
        let source = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        let chunks = self.chunker.chunk_document(&text, &department, &source);
        if chunks.is_empty() {
            tracing::info!("📄 {} produced no chunks, skipped", path.display());
            return Ok(0);
        }

        let added = self.add_chunks(&chunks).await?;
        tracing::debug!("📄 {source} [{department}] → {added} chunks");
        Ok(added)
    }

    /// Embed chunks in batches, then append them in one store write.
    async fn add_chunks(&self, chunks: &[Chunk]) -> Result<usize> {
        let mut records = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(RagDeskError::Embedding(format!(
                    "{} returned {} vectors for {} texts",
                    self.embedder.name(),
                    vectors.len(),
                    batch.len()
                )));
            }
            records.extend(batch.iter().zip(vectors).map(|(chunk, embedding)| NewRecord {
                text: chunk.text.clone(),
                department: chunk.department.clone(),
                source: chunk.source.clone(),
                embedding,
            }));
        }
        let ids = self.store.add(&records)?;
        Ok(ids.len())
    }
}
