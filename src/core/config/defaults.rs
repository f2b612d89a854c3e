//! Typed application configuration and its defaults.
//!
//! Deserialized once at startup from the merged YAML; every section falls
//! back to the defaults below for missing keys.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::rag::engine::DEFAULT_SYSTEM_PROMPT;
use crate::rag::{ChunkingConfig, ContextBuilderConfig, RAGConfig};
use crate::session::SessionConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub sessions: SessionConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub index: IndexConfig,
}

impl AppConfig {
    /// Engine settings assembled from the chunking, retrieval and generation sections.
    pub fn rag_config(&self) -> RAGConfig {
        RAGConfig {
            chunking: self.chunking.clone(),
            context: ContextBuilderConfig {
                history_turns: self.retrieval.history_turns,
                max_context_chars: self.retrieval.max_context_chars,
            },
            top_k: self.retrieval.top_k,
            preview_chars: self.retrieval.preview_chars,
            system_prompt: self
                .generation
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub preview_chars: usize,
    pub history_turns: usize,
    pub max_context_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        let context = ContextBuilderConfig::default();
        Self {
            top_k: 4,
            preview_chars: 200,
            history_turns: context.history_turns,
            max_context_chars: context.max_context_chars,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    OpenAi,
    Hashing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Vector length of the hashing embedder
    pub dimension: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::OpenAi,
            base_url: "https://api.openai.com".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key: None,
            dimension: 384,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Replaces the built-in instruction; `{context}` marks the grounding slot
    pub system_prompt: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            temperature: 0.7,
            max_tokens: 1000,
            timeout_secs: 120,
            system_prompt: None,
        }
    }
}

/// Index and document locations; unset paths fall back to the data directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub path: Option<PathBuf>,
    pub documents_dir: Option<PathBuf>,
}
