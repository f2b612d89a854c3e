//! RAG Engine: retrieval, context assembly and generation per query.
//!
//! Owns the shared vector index and the external capabilities:
//! - Index lifecycle: build, ingest, load, save
//! - Queries: retrieve, assemble grounding context, generate, update memory
//!
//! Per-session memory is passed in by the caller; the engine never keeps
//! conversation state of its own.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use super::chunker::{Chunker, ChunkingConfig};
use super::context_builder::{build_system_prompt, ContextBuilderConfig, RAGContextBuilder};
use super::embedder::Embedder;
use super::error::{RagError, RagResult};
use super::index::VectorIndex;
use super::loader;
use super::memory::{ConversationMemory, ConversationTurn};
use super::types::{Passage, SearchResult, SourceDocument};
use crate::llm::Generator;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions about the user's documents.

Your role is to:
1. Answer questions based on the provided context from the documents
2. Say so honestly if the context does not contain the relevant information
3. Keep responses concise but informative

When answering:
- Always base your answers on the provided context
- If you're not sure, say \"I don't have enough information about that\"
- Suggest what information might be useful

Context from documents:
{context}";

const PREVIEW_ELLIPSIS: &str = "...";

/// Configuration for the RAG engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RAGConfig {
    pub chunking: ChunkingConfig,
    pub context: ContextBuilderConfig,
    /// Passages retrieved per query
    pub top_k: usize,
    /// Characters of passage text returned in source citations
    pub preview_chars: usize,
    /// Fixed instruction; `{context}` marks where grounding is inserted
    pub system_prompt: String,
}

impl Default for RAGConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            context: ContextBuilderConfig::default(),
            top_k: 4,
            preview_chars: 200,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    Uninitialized,
    Ready,
}

/// A retrieved passage as shown to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCitation {
    pub content: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceCitation>>,
}

/// What `initialize` ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Loaded(usize),
    Built(usize),
    NoDocuments,
}

pub struct RAGEngine {
    config: RAGConfig,
    chunker: Chunker,
    context_builder: RAGContextBuilder,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    /// `None` until an index has been built, loaded or installed.
    index: RwLock<Option<VectorIndex>>,
    /// Serialises index mutations together with their saves.
    lifecycle: Mutex<()>,
}

impl RAGEngine {
    pub fn new(
        config: RAGConfig,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> RagResult<Self> {
        if config.top_k == 0 {
            return Err(RagError::Config("top_k must be positive".to_string()));
        }
        let chunker = Chunker::new(config.chunking.clone())?;
        let context_builder = RAGContextBuilder::new(config.context.clone());

        Ok(Self {
            config,
            chunker,
            context_builder,
            embedder,
            generator,
            index: RwLock::new(None),
            lifecycle: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &RAGConfig {
        &self.config
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    pub async fn status(&self) -> EngineStatus {
        if self.index.read().await.is_some() {
            EngineStatus::Ready
        } else {
            EngineStatus::Uninitialized
        }
    }

    pub async fn passage_count(&self) -> usize {
        self.index.read().await.as_ref().map_or(0, VectorIndex::len)
    }

    // ========== Index lifecycle ==========
    //
    // Every mutation runs under `lifecycle`, so a startup build and an upload
    // never overwrite each other. The `*_locked` helpers assume it is held.

    /// Build a fresh index from `passages`, replacing any current one.
    pub async fn build_index(&self, passages: Vec<Passage>) -> RagResult<usize> {
        let _lifecycle = self.lifecycle.lock().await;
        let index = VectorIndex::build(passages, self.embedder.as_ref()).await?;
        let count = index.len();
        *self.index.write().await = Some(index);
        Ok(count)
    }

    /// Install a ready-made index.
    pub async fn install_index(&self, index: VectorIndex) {
        let _lifecycle = self.lifecycle.lock().await;
        tracing::info!("Installing index with {} passages", index.len());
        *self.index.write().await = Some(index);
    }

    /// Embed and add passages, creating the index if none exists yet.
    ///
    /// Embedding runs before the write lock is taken, so searches keep
    /// running while new passages are being embedded.
    pub async fn add_passages(&self, passages: Vec<Passage>) -> RagResult<usize> {
        let _lifecycle = self.lifecycle.lock().await;
        self.add_passages_locked(passages).await
    }

    /// Chunk documents and add the resulting passages.
    pub async fn ingest_documents(&self, documents: &[SourceDocument]) -> RagResult<usize> {
        let _lifecycle = self.lifecycle.lock().await;
        self.ingest_locked(documents).await
    }

    /// Ingest documents and persist the grown index as one step.
    pub async fn ingest_and_save(
        &self,
        documents: &[SourceDocument],
        path: &Path,
    ) -> RagResult<usize> {
        let _lifecycle = self.lifecycle.lock().await;
        let added = self.ingest_locked(documents).await?;
        self.save_locked(path).await?;
        Ok(added)
    }

    pub async fn load_index(&self, path: &Path) -> RagResult<usize> {
        let _lifecycle = self.lifecycle.lock().await;
        self.load_locked(path).await
    }

    pub async fn save_index(&self, path: &Path) -> RagResult<()> {
        let _lifecycle = self.lifecycle.lock().await;
        self.save_locked(path).await
    }

    pub fn index_exists(&self, path: &Path) -> bool {
        VectorIndex::exists(path)
    }

    /// Load the index at `path` or, failing that, build one from
    /// `documents_dir` and save it. With no documents the engine stays
    /// uninitialized.
    ///
    /// Passages already in memory are kept: the directory's passages are
    /// added to them rather than replacing them.
    pub async fn initialize(&self, path: &Path, documents_dir: &Path) -> RagResult<InitOutcome> {
        let _lifecycle = self.lifecycle.lock().await;

        if self.index_exists(path) {
            let count = self.load_locked(path).await?;
            return Ok(InitOutcome::Loaded(count));
        }

        let documents = match loader::load_directory(documents_dir) {
            Ok(docs) => docs,
            Err(RagError::NotFound(dir)) => {
                tracing::warn!("Documents directory {} does not exist", dir.display());
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let passages = self.chunker.split_documents(&documents);
        if passages.is_empty() {
            tracing::warn!("No documents to index; waiting for uploads");
            return Ok(InitOutcome::NoDocuments);
        }

        let count = self.add_passages_locked(passages).await?;
        self.save_locked(path).await?;
        Ok(InitOutcome::Built(count))
    }

    async fn add_passages_locked(&self, passages: Vec<Passage>) -> RagResult<usize> {
        if passages.is_empty() {
            return Err(RagError::EmptyInput("no passages to add".to_string()));
        }

        let expected = self.index.read().await.as_ref().and_then(VectorIndex::dimension);
        let entries = VectorIndex::embed_passages(passages, self.embedder.as_ref(), expected).await?;
        let added = entries.len();

        let mut guard = self.index.write().await;
        let index = guard.get_or_insert_with(VectorIndex::new);
        index.extend(entries)?;
        tracing::info!("Added {} passages (index now holds {})", added, index.len());
        Ok(added)
    }

    async fn ingest_locked(&self, documents: &[SourceDocument]) -> RagResult<usize> {
        let passages = self.chunker.split_documents(documents);
        if passages.is_empty() {
            return Err(RagError::EmptyInput(
                "documents contain no indexable text".to_string(),
            ));
        }
        self.add_passages_locked(passages).await
    }

    async fn load_locked(&self, path: &Path) -> RagResult<usize> {
        let index = VectorIndex::load(path).await?;
        let count = index.len();
        *self.index.write().await = Some(index);
        tracing::info!("Loaded index with {} passages from {}", count, path.display());
        Ok(count)
    }

    /// The read lock keeps writers out while the file is written.
    async fn save_locked(&self, path: &Path) -> RagResult<()> {
        let guard = self.index.read().await;
        let index = guard.as_ref().ok_or(RagError::NotReady)?;
        index.save(path).await
    }

    // ========== Queries ==========

    /// Answer `text` grounded in the index and the session's recent turns.
    pub async fn query(
        &self,
        memory: &mut ConversationMemory,
        text: &str,
        include_sources: bool,
    ) -> RagResult<QueryResponse> {
        let (answer, results) = self.answer(memory, text).await?;
        let sources = include_sources.then(|| self.citations(&results, false));
        Ok(QueryResponse { answer, sources })
    }

    /// Like [`query`](Self::query), with similarity scores on every source.
    pub async fn query_with_scores(
        &self,
        memory: &mut ConversationMemory,
        text: &str,
    ) -> RagResult<QueryResponse> {
        let (answer, results) = self.answer(memory, text).await?;
        Ok(QueryResponse {
            answer,
            sources: Some(self.citations(&results, true)),
        })
    }

    pub fn clear_history(&self, memory: &mut ConversationMemory) {
        memory.clear();
        tracing::debug!("Conversation history cleared");
    }

    async fn answer(
        &self,
        memory: &mut ConversationMemory,
        text: &str,
    ) -> RagResult<(String, Vec<SearchResult>)> {
        if text.trim().is_empty() {
            return Err(RagError::EmptyInput("question is empty".to_string()));
        }

        if self.index.read().await.is_none() {
            return Err(RagError::NotReady);
        }

        tracing::debug!(phase = "retrieving", top_k = self.config.top_k, "Searching index");
        let query = self
            .embedder
            .embed_one(text)
            .await
            .map_err(RagError::Embedding)?;
        let results = {
            let guard = self.index.read().await;
            let index = guard.as_ref().ok_or(RagError::NotReady)?;
            index.search_by_vector(&query, self.config.top_k)?
        };

        let tail = memory.tail(self.config.context.history_turns);
        let context = self.context_builder.assemble(&results, &tail);
        let system_prompt = build_system_prompt(&self.config.system_prompt, &context);

        // Recent turns already sit in the context transcript.
        tracing::debug!(
            phase = "generating",
            generator = self.generator.name(),
            passages = results.len(),
            "Invoking generator"
        );
        let answer = self
            .generator
            .complete(&system_prompt, text, &[])
            .await
            .map_err(RagError::Generation)?;

        memory.append(ConversationTurn::user(text));
        memory.append(ConversationTurn::assistant(answer.clone()));
        tracing::debug!(phase = "ready", "Query answered");

        Ok((answer, results))
    }

    fn citations(&self, results: &[SearchResult], with_scores: bool) -> Vec<SourceCitation> {
        results
            .iter()
            .map(|r| SourceCitation {
                content: preview(&r.passage.text, self.config.preview_chars),
                source: r.passage.source_name.clone(),
                relevance_score: with_scores.then_some(r.score),
            })
            .collect()
    }
}

/// First `max_chars` characters of `text`, with an ellipsis only when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &text[..cut], PREVIEW_ELLIPSIS),
        None => text.to_string(),
    }
}
