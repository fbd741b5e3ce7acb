//! In-memory document index
//!
//! Documents are chunked on ingest and ranked with BM25 at query time.
//! Reads take a shared lock, so many workflow runs can search at once.

use crate::bm25::{normalize, term_frequencies, tokenize, Bm25Params, CorpusStats};
use crate::chunker::{chunk_text, ChunkingConfig};
use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use switchyard_common::collaborators::{Document, Retriever};
use switchyard_common::config::RetrievalConfig;
use switchyard_common::errors::{AppError, Result};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Hex characters of the content hash used as document id
const DOC_ID_LEN: usize = 16;

struct IndexedChunk {
    id: String,
    doc_id: String,
    index: usize,
    content: String,
    frequencies: HashMap<String, usize>,
    len: usize,
    metadata: BTreeMap<String, serde_json::Value>,
}

#[derive(Default)]
struct IndexInner {
    chunks: Vec<IndexedChunk>,
    doc_freq: HashMap<String, usize>,
    total_len: usize,
}

impl IndexInner {
    fn insert(&mut self, chunk: IndexedChunk) {
        for term in chunk.frequencies.keys() {
            *self.doc_freq.entry(term.clone()).or_insert(0) += 1;
        }
        self.total_len += chunk.len;
        self.chunks.push(chunk);
    }

    fn remove(&mut self, doc_id: &str) -> usize {
        let (removed, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.chunks).into_iter().partition(|c| c.doc_id == doc_id);

        for chunk in &removed {
            for term in chunk.frequencies.keys() {
                if let Some(count) = self.doc_freq.get_mut(term) {
                    *count -= 1;
                    if *count == 0 {
                        self.doc_freq.remove(term);
                    }
                }
            }
            self.total_len -= chunk.len;
        }

        self.chunks = kept;
        removed.len()
    }

    fn document_count(&self) -> usize {
        let mut ids: Vec<&str> = self.chunks.iter().map(|c| c.doc_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }
}

/// Result of adding one document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestSummary {
    pub doc_id: String,
    pub chunks: usize,
}

/// Index statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub documents: usize,
    pub chunks: usize,
    pub terms: usize,
}

/// BM25 chunk index
pub struct DocumentIndex {
    inner: RwLock<IndexInner>,
    chunking: ChunkingConfig,
    params: Bm25Params,
    min_score: f32,
}

impl DocumentIndex {
    pub fn new(config: &RetrievalConfig) -> Self {
        Self {
            inner: RwLock::new(IndexInner::default()),
            chunking: ChunkingConfig {
                chunk_size: config.chunk_size,
                min_chunk_size: config.min_chunk_size,
            },
            params: Bm25Params::default(),
            min_score: config.min_score,
        }
    }

    /// Stable id derived from the content
    pub fn document_id(text: &str) -> String {
        let digest = hex::encode(Sha256::digest(text.as_bytes()));
        digest[..DOC_ID_LEN].to_string()
    }

    /// Chunk and index a document; re-adding the same text replaces it
    pub async fn add_document(
        &self,
        text: &str,
        metadata: BTreeMap<String, serde_json::Value>,
    ) -> Result<IngestSummary> {
        if text.trim().is_empty() {
            return Err(AppError::Validation {
                message: "Document text must not be empty".to_string(),
                field: Some("text".to_string()),
            });
        }

        let doc_id = Self::document_id(text);
        let pieces = chunk_text(text, &self.chunking);

        let mut inner = self.inner.write().await;
        let replaced = inner.remove(&doc_id);

        for piece in &pieces {
            let tokens = tokenize(&piece.content);
            let mut chunk_metadata = metadata.clone();
            chunk_metadata.insert("doc_id".to_string(), doc_id.clone().into());
            chunk_metadata.insert("chunk_index".to_string(), piece.index.into());

            inner.insert(IndexedChunk {
                id: format!("{}_{}", doc_id, piece.index),
                doc_id: doc_id.clone(),
                index: piece.index,
                content: piece.content.clone(),
                len: tokens.len(),
                frequencies: term_frequencies(&tokens),
                metadata: chunk_metadata,
            });
        }

        info!(
            doc_id = %doc_id,
            chunks = pieces.len(),
            replaced,
            "Document indexed"
        );

        Ok(IngestSummary {
            doc_id,
            chunks: pieces.len(),
        })
    }

    /// Chunks of one document in order
    pub async fn document_chunks(&self, doc_id: &str) -> Vec<Document> {
        let inner = self.inner.read().await;
        let mut chunks: Vec<&IndexedChunk> = inner.chunks.iter().filter(|c| c.doc_id == doc_id).collect();
        chunks.sort_by_key(|c| c.index);
        chunks.into_iter().map(|c| to_document(c, 1.0)).collect()
    }

    /// Remove every chunk of a document; false if it was not indexed
    pub async fn remove_document(&self, doc_id: &str) -> bool {
        let removed = self.inner.write().await.remove(doc_id);
        debug!(doc_id, removed, "Document removed");
        removed > 0
    }

    pub async fn stats(&self) -> IndexStats {
        let inner = self.inner.read().await;
        IndexStats {
            documents: inner.document_count(),
            chunks: inner.chunks.len(),
            terms: inner.doc_freq.len(),
        }
    }
}

fn to_document(chunk: &IndexedChunk, score: f32) -> Document {
    Document {
        id: chunk.id.clone(),
        content: chunk.content.clone(),
        score,
        metadata: chunk.metadata.clone(),
    }
}

#[async_trait]
impl Retriever for DocumentIndex {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Document>> {
        let mut terms = tokenize(query);
        terms.sort();
        terms.dedup();

        if terms.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let inner = self.inner.read().await;
        if inner.chunks.is_empty() {
            return Ok(Vec::new());
        }

        let corpus = CorpusStats {
            chunk_count: inner.chunks.len(),
            avg_len: inner.total_len as f32 / inner.chunks.len() as f32,
            doc_freq: &inner.doc_freq,
        };

        let mut scored: Vec<(f32, &IndexedChunk)> = inner
            .chunks
            .iter()
            .map(|chunk| {
                let raw = self.params.score(&terms, &chunk.frequencies, chunk.len, &corpus);
                (normalize(raw), chunk)
            })
            .filter(|(score, _)| *score > 0.0 && *score >= self.min_score)
            .collect();

        // Highest score first, chunk id breaks ties
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));
        scored.truncate(top_k);

        debug!(terms = terms.len(), hits = scored.len(), "Index searched");

        Ok(scored
            .into_iter()
            .map(|(score, chunk)| to_document(chunk, score))
            .collect())
    }
}
