pub mod defaults;
pub mod paths;
pub mod service;
pub mod validation;

pub use defaults::{
    AppConfig, EmbeddingConfig, EmbeddingProvider, GenerationConfig, IndexConfig,
    RetrievalConfig, ServerConfig,
};
pub use paths::AppPaths;
pub use service::ConfigService;
pub use validation::ConfigError;
