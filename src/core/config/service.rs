use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::defaults::AppConfig;
use super::paths::AppPaths;
use super::validation::{validate_config, ConfigError};

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 12] = [
    "api_key",
    "secret",
    "password",
    "_token",
    "token_",
    "credential",
    "private_key",
    "auth_",
    "_auth",
    "access_key",
    "access_token",
    "bearer",
];

const SENSITIVE_WHITELIST: [&str; 3] = ["max_tokens", "token_count", "tokens"];

/// Environment variables that override config values, as (variable, path).
const ENV_OVERRIDES: [(&str, &[&str]); 10] = [
    ("DOCCHAT_API_KEY", &["embedding", "api_key"]),
    ("DOCCHAT_API_KEY", &["generation", "api_key"]),
    ("DOCCHAT_EMBEDDING_API_KEY", &["embedding", "api_key"]),
    ("DOCCHAT_GENERATION_API_KEY", &["generation", "api_key"]),
    ("DOCCHAT_EMBEDDING_BASE_URL", &["embedding", "base_url"]),
    ("DOCCHAT_GENERATION_BASE_URL", &["generation", "base_url"]),
    ("DOCCHAT_EMBEDDING_MODEL", &["embedding", "model"]),
    ("DOCCHAT_GENERATION_MODEL", &["generation", "model"]),
    ("DOCCHAT_CHUNK_SIZE", &["chunking", "chunk_size"]),
    ("DOCCHAT_CHUNK_OVERLAP", &["chunking", "chunk_overlap"]),
];

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("DOCCHAT_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let user_config = self.paths.user_data_dir.join("config.yml");
        if user_config.exists() {
            return user_config;
        }

        self.paths.project_root.join("config.yml")
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.paths.secrets_path.clone()
    }

    /// Merged raw configuration: config.yml, then secrets.yaml, then environment.
    pub fn load_config(&self) -> Result<Value, ConfigError> {
        let public_config = load_yaml_file(&self.config_path())?;
        let secrets_config = load_yaml_file(&self.secrets_path())?;
        let mut merged = deep_merge(&public_config, &secrets_config);
        apply_env_overrides(&mut merged, |name| env::var(name).ok());
        Ok(merged)
    }

    /// Load, validate and deserialize the typed configuration.
    pub fn load_app_config(&self) -> Result<AppConfig, ConfigError> {
        let merged = self.load_config()?;
        parse_app_config(&merged)
    }

    pub fn redact_sensitive_values(&self, value: &Value) -> Value {
        redact_sensitive_values(value)
    }
}

pub fn parse_app_config(value: &Value) -> Result<AppConfig, ConfigError> {
    validate_config(value)?;
    serde_json::from_value(value.clone()).map_err(|e| ConfigError::new("root", e.to_string()))
}

fn load_yaml_file(path: &Path) -> Result<Value, ConfigError> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let location = path.display().to_string();
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::new(&location, e.to_string()))?;
    match serde_yaml::from_str::<Value>(&contents) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(Value::Null) => Ok(Value::Object(Map::new())),
        Ok(_) => Err(ConfigError::new(location, "expected a mapping at the top level")),
        Err(e) => Err(ConfigError::new(location, e.to_string())),
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn apply_env_overrides(config: &mut Value, lookup: impl Fn(&str) -> Option<String>) {
    for (name, path) in ENV_OVERRIDES {
        let Some(raw) = lookup(name).filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        // Numeric overrides stay numbers so validation sees the right type.
        let value = raw
            .parse::<u64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw));
        set_path(config, path, value);
    }
}

fn set_path(config: &mut Value, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = config;
    for key in parents {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };
        current = map
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Value::Object(map) = current {
        map.insert(last.to_string(), value);
    }
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    if SENSITIVE_WHITELIST
        .iter()
        .any(|allowed| *allowed == key_lower)
    {
        return false;
    }
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::core::config::defaults::EmbeddingProvider;

    #[test]
    fn deep_merge_merges_objects_and_overrides_scalars() {
        let base = json!({
            "a": 1,
            "b": { "c": 2, "d": 3 },
            "arr": [1, 2]
        });
        let override_value = json!({
            "b": { "c": 99 },
            "arr": [3],
            "e": "x"
        });

        let merged = deep_merge(&base, &override_value);

        assert_eq!(
            merged,
            json!({
                "a": 1,
                "b": { "c": 99, "d": 3 },
                "arr": [3],
                "e": "x"
            })
        );
    }

    #[test]
    fn redact_sensitive_values_replaces_secrets_only() {
        let input = json!({
            "generation": {
                "api_key": "sk-live",
                "max_tokens": 1000
            },
            "embedding": { "api_key": null }
        });

        let redacted = redact_sensitive_values(&input);

        assert_eq!(
            redacted,
            json!({
                "generation": {
                    "api_key": "****",
                    "max_tokens": 1000
                },
                "embedding": { "api_key": null }
            })
        );
    }

    #[test]
    fn env_overrides_win_and_keep_numbers_numeric() {
        let mut config = json!({ "generation": { "api_key": "from-file" } });
        apply_env_overrides(&mut config, |name| match name {
            "DOCCHAT_GENERATION_API_KEY" => Some("from-env".to_string()),
            "DOCCHAT_CHUNK_SIZE" => Some("500".to_string()),
            _ => None,
        });

        assert_eq!(config["generation"]["api_key"], "from-env");
        assert_eq!(config["chunking"]["chunk_size"], 500);
    }

    #[test]
    fn empty_config_yields_defaults() {
        let config = parse_app_config(&json!({})).unwrap();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.retrieval.preview_chars, 200);
        assert_eq!(config.sessions.memory_capacity, 10);
        assert_eq!(config.embedding.provider, EmbeddingProvider::OpenAi);
        assert_eq!(config.rag_config().top_k, 4);
    }

    #[test]
    fn yaml_files_merge_with_secrets() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = Arc::new(AppPaths::with_dirs(
            tmp.path().to_path_buf(),
            tmp.path().join("data"),
        ));
        fs::write(
            tmp.path().join("config.yml"),
            "retrieval:\n  top_k: 2\nembedding:\n  provider: hashing\n  dimension: 64\n",
        )
        .unwrap();
        fs::write(&paths.secrets_path, "generation:\n  api_key: sk-secret\n").unwrap();

        let service = ConfigService::new(paths);
        let raw = load_yaml_file(&service.paths().project_root.join("config.yml")).unwrap();
        let secrets = load_yaml_file(&service.secrets_path()).unwrap();
        let config = parse_app_config(&deep_merge(&raw, &secrets)).unwrap();

        assert_eq!(config.retrieval.top_k, 2);
        assert_eq!(config.embedding.provider, EmbeddingProvider::Hashing);
        assert_eq!(config.embedding.dimension, 64);
        assert_eq!(config.generation.api_key.as_deref(), Some("sk-secret"));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yml");
        fs::write(&path, "retrieval: [unclosed").unwrap();
        assert!(load_yaml_file(&path).is_err());
    }

    #[test]
    fn invalid_values_fail_validation() {
        let err = parse_app_config(&json!({"chunking": {"chunk_size": 10, "chunk_overlap": 20}}))
            .unwrap_err();
        assert_eq!(err.path, "chunking.chunk_overlap");
    }
}
