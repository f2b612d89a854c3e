use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::core::config::{AppConfig, AppPaths, ConfigService, EmbeddingProvider};
use crate::llm::{Generator, OpenAiGenerator};
use crate::rag::{Embedder, HashingEmbedder, InitOutcome, OpenAiEmbedder, RAGEngine};
use crate::session::SessionStore;

pub mod error;

use error::InitializationError;

/// Application state shared across all routes and background tasks.
///
/// Contains references to:
/// - Configuration and paths
/// - The RAG engine (embedder, generator, shared index)
/// - Per-session conversation memory
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config_service: ConfigService,
    pub config: Arc<AppConfig>,
    pub engine: Arc<RAGEngine>,
    pub sessions: SessionStore,
    pub index_path: PathBuf,
    pub documents_dir: PathBuf,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// This process includes:
    /// 1. Setting up paths and loading configuration
    /// 2. Building the embedder and generator clients
    /// 3. Creating the engine and the session store
    ///
    /// The index itself is loaded or built later by
    /// [`spawn_index_initialization`](Self::spawn_index_initialization).
    pub async fn initialize() -> Result<Arc<Self>, InitializationError> {
        let paths = Arc::new(AppPaths::new());
        let config_service = ConfigService::new(paths.clone());
        let config = config_service
            .load_app_config()
            .map_err(|e| InitializationError::Config(e.into()))?;

        let embedder = build_embedder(&config)?;
        let generator = build_generator(&config)?;

        Self::with_components(paths, config_service, config, embedder, generator)
    }

    /// Wire state from already-built parts.
    pub fn with_components(
        paths: Arc<AppPaths>,
        config_service: ConfigService,
        config: AppConfig,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Result<Arc<Self>, InitializationError> {
        let engine = RAGEngine::new(config.rag_config(), embedder, generator)
            .map_err(|e| InitializationError::Rag(e.into()))?;
        let sessions = SessionStore::new(config.sessions.clone())
            .map_err(|e| InitializationError::Rag(e.into()))?;

        let index_path = config
            .index
            .path
            .clone()
            .unwrap_or_else(|| paths.index_dir.clone());
        let documents_dir = config
            .index
            .documents_dir
            .clone()
            .unwrap_or_else(|| paths.documents_dir.clone());

        Ok(Arc::new(AppState {
            paths,
            config_service,
            config: Arc::new(config),
            engine: Arc::new(engine),
            sessions,
            index_path,
            documents_dir,
        }))
    }

    /// Load or build the index in the background; queries answer
    /// "still preparing" until it is ready.
    pub fn spawn_index_initialization(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let state = self.clone();
        tokio::spawn(async move {
            match state
                .engine
                .initialize(&state.index_path, &state.documents_dir)
                .await
            {
                Ok(InitOutcome::Loaded(count)) => {
                    tracing::info!("Index ready: loaded {} passages", count)
                }
                Ok(InitOutcome::Built(count)) => {
                    tracing::info!("Index ready: built {} passages", count)
                }
                Ok(InitOutcome::NoDocuments) => tracing::warn!(
                    "No index yet; add documents to {} or upload them",
                    state.documents_dir.display()
                ),
                Err(e) => tracing::error!("Failed to initialize index: {}", e),
            }
        })
    }

    /// Periodically drop idle sessions.
    pub fn spawn_session_sweeper(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let sessions = self.sessions.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let purged = sessions.purge_expired().await;
                if purged > 0 {
                    tracing::debug!("Purged {} idle sessions", purged);
                }
            }
        })
    }
}

fn build_embedder(config: &AppConfig) -> Result<Arc<dyn Embedder>, InitializationError> {
    let embedding = &config.embedding;
    match embedding.provider {
        EmbeddingProvider::Hashing => Ok(Arc::new(HashingEmbedder::new(embedding.dimension))),
        EmbeddingProvider::OpenAi => {
            let embedder = OpenAiEmbedder::new(
                &embedding.base_url,
                &embedding.model,
                embedding.api_key.clone(),
                Duration::from_secs(embedding.timeout_secs),
            )
            .map_err(InitializationError::Embedder)?;
            Ok(Arc::new(embedder))
        }
    }
}

fn build_generator(config: &AppConfig) -> Result<Arc<dyn Generator>, InitializationError> {
    let generation = &config.generation;
    let generator = OpenAiGenerator::new(
        &generation.base_url,
        &generation.model,
        generation.api_key.clone(),
        Duration::from_secs(generation.timeout_secs),
    )
    .map_err(InitializationError::Llm)?
    .with_sampling(Some(generation.temperature), Some(generation.max_tokens));
    Ok(Arc::new(generator))
}
