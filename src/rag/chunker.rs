//! Recursive character chunker.
//!
//! Text is cut on paragraph breaks first, then line breaks, then spaces, and
//! finally between single characters, until every piece fits `chunk_size`.
//! Pieces keep their trailing separator so that together they tile the
//! document. Pieces are then merged greedily into chunks, and each new chunk
//! starts with the trailing pieces of the previous one (at most
//! `chunk_overlap` characters).
//!
//! All sizes and offsets are in characters, not bytes.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::error::{RagError, RagResult};
use super::types::{file_type_of, Passage, SourceDocument};

const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Configuration for chunking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Characters shared between adjacent chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> RagResult<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be positive".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Half-open character range `[start, end)`.
type Span = (usize, usize);

#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> RagResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Split a document into passages, inferring the file type from `source_name`.
    pub fn split(&self, text: &str, source_name: &str) -> Vec<Passage> {
        self.split_typed(text, source_name, &file_type_of(source_name))
    }

    pub fn split_document(&self, document: &SourceDocument) -> Vec<Passage> {
        self.split_typed(&document.text, &document.source_name, &document.file_type)
    }

    pub fn split_documents(&self, documents: &[SourceDocument]) -> Vec<Passage> {
        let passages: Vec<Passage> = documents
            .iter()
            .flat_map(|doc| self.split_document(doc))
            .collect();
        tracing::debug!(
            "Split {} documents into {} passages",
            documents.len(),
            passages.len()
        );
        passages
    }

    fn split_typed(&self, text: &str, source_name: &str, file_type: &str) -> Vec<Passage> {
        let chars: Vec<char> = text.chars().collect();
        if chars.iter().all(|c| c.is_whitespace()) {
            return Vec::new();
        }

        let mut pieces = Vec::new();
        self.atomize(&chars, (0, chars.len()), 0, &mut pieces);

        self.merge(&pieces)
            .into_iter()
            .filter_map(|span| trim_span(&chars, span))
            .map(|(start, end)| {
                let text: String = chars[start..end].iter().collect();
                Passage::new(text, source_name, file_type, start)
            })
            .collect()
    }

    /// Cut `span` into contiguous pieces no longer than `chunk_size`.
    fn atomize(&self, chars: &[char], span: Span, level: usize, out: &mut Vec<Span>) {
        let (start, end) = span;
        if end - start <= self.config.chunk_size {
            out.push(span);
            return;
        }

        let Some(separator) = SEPARATORS.get(level) else {
            // Last resort: single characters.
            out.extend((start..end).map(|i| (i, i + 1)));
            return;
        };

        let separator: Vec<char> = separator.chars().collect();
        for part in split_keeping_separator(chars, span, &separator) {
            self.atomize(chars, part, level + 1, out);
        }
    }

    /// Greedily pack pieces into chunks with a trailing-piece overlap.
    fn merge(&self, pieces: &[Span]) -> Vec<Span> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut chunks = Vec::new();
        let mut window: VecDeque<Span> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = piece.1 - piece.0;

            if total + len > size {
                if let (Some(first), Some(last)) = (window.front(), window.back()) {
                    chunks.push((first.0, last.1));
                }
                while total > overlap || (total > 0 && total + len > size) {
                    match window.pop_front() {
                        Some((s, e)) => total -= e - s,
                        None => break,
                    }
                }
            }

            window.push_back(piece);
            total += len;
        }

        if let (Some(first), Some(last)) = (window.front(), window.back()) {
            chunks.push((first.0, last.1));
        }

        chunks
    }
}

/// Split `span` after every occurrence of `separator`. Concatenating the
/// returned spans yields `span` again.
fn split_keeping_separator(chars: &[char], span: Span, separator: &[char]) -> Vec<Span> {
    let (start, end) = span;
    let width = separator.len();
    let mut parts = Vec::new();
    let mut piece_start = start;
    let mut i = start;

    while i + width <= end {
        if chars[i..i + width] == *separator {
            parts.push((piece_start, i + width));
            piece_start = i + width;
            i += width;
        } else {
            i += 1;
        }
    }

    if piece_start < end {
        parts.push((piece_start, end));
    }

    parts
}

/// Shrink a span past surrounding whitespace; `None` if nothing is left.
fn trim_span(chars: &[char], (start, end): Span) -> Option<Span> {
    let lead = chars[start..end].iter().position(|c| !c.is_whitespace())?;
    let trail = chars[start..end]
        .iter()
        .rev()
        .position(|c| !c.is_whitespace())
        .unwrap_or(0);
    Some((start + lead, end - trail))
}
