//! Text chunking module
//!
//! Splits ingested text into chunks for indexing.

use text_splitter::{ChunkConfig, TextSplitter};
use tracing::debug;

/// Configuration for text chunking
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Minimum chunk size; smaller chunks are dropped unless nothing else remains
    pub min_chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            min_chunk_size: 100,
        }
    }
}

/// A text chunk with its position in the source
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// The chunk content
    pub content: String,
    /// Index of this chunk in the document
    pub index: usize,
    /// Start byte position in original text
    pub start_pos: usize,
    /// End byte position in original text
    pub end_pos: usize,
}

/// Split text into chunks
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<TextChunk> {
    let splitter = TextSplitter::new(ChunkConfig::new(config.chunk_size.max(1)));

    let pieces: Vec<(usize, &str)> = splitter.chunk_indices(text).collect();

    debug!(
        input_len = text.len(),
        chunk_count = pieces.len(),
        chunk_size = config.chunk_size,
        "Text chunked"
    );

    let mut result: Vec<TextChunk> = pieces
        .iter()
        .filter(|(_, piece)| piece.chars().count() >= config.min_chunk_size)
        .map(|(start, piece)| to_chunk(*start, piece))
        .collect();

    // Short documents still get one chunk
    if result.is_empty() {
        if let Some((start, piece)) = pieces.first() {
            result.push(to_chunk(*start, piece));
        }
    }

    for (i, chunk) in result.iter_mut().enumerate() {
        chunk.index = i;
    }

    result
}

fn to_chunk(start: usize, piece: &str) -> TextChunk {
    TextChunk {
        content: piece.to_string(),
        index: 0,
        start_pos: start,
        end_pos: start + piece.len(),
    }
}
