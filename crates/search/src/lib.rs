//! Switchyard Search
//!
//! Document retrieval collaborator:
//! - Chunking of ingested text
//! - BM25 lexical ranking
//! - An in-memory index safe for concurrent reads

mod bm25;
mod chunker;
mod index;

pub use bm25::{tokenize, Bm25Params};
pub use chunker::{chunk_text, ChunkingConfig, TextChunk};
pub use index::{DocumentIndex, IndexStats, IngestSummary};
