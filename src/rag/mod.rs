//! RAG (Retrieval-Augmented Generation) core.
//!
//! This module provides:
//! - `Chunker`: Splits documents into overlapping passages
//! - `VectorIndex`: Exact cosine search with SQLite persistence
//! - `RAGContextBuilder`: Formats passages and recent dialogue into grounding context
//! - `ConversationMemory`: Bounded per-session turn history
//! - `RAGEngine`: Retrieve, assemble, generate, remember

pub mod chunker;
pub mod context_builder;
pub mod embedder;
pub mod engine;
pub mod error;
pub mod index;
pub mod loader;
pub mod memory;
pub mod persist;
pub mod types;

pub use chunker::{Chunker, ChunkingConfig};
pub use context_builder::{ContextBuilderConfig, RAGContextBuilder, NO_CONTEXT_MARKER};
pub use embedder::{Embedder, HashingEmbedder, OpenAiEmbedder};
pub use engine::{
    EngineStatus, InitOutcome, QueryResponse, RAGConfig, RAGEngine, SourceCitation,
};
pub use error::{ErrorKind, RagError, RagResult};
pub use index::{IndexEntry, VectorIndex};
pub use memory::{ConversationMemory, ConversationTurn, Role};
pub use types::{Passage, SearchResult, SourceDocument};
