use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Invalid config at '{path}': {message}")]
pub struct ConfigError {
    pub path: String,
    pub message: String,
}

impl ConfigError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &Value) -> Result<(), ConfigError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 1, 65535)?;
        validate_string_array_field(
            server,
            "server.cors_allowed_origins",
            "cors_allowed_origins",
        )?;
    }

    if let Some(chunking) = expect_optional_object(root, "chunking")? {
        validate_u64_field(chunking, "chunking.chunk_size", "chunk_size", 1, 1_000_000)?;
        validate_u64_field(
            chunking,
            "chunking.chunk_overlap",
            "chunk_overlap",
            0,
            1_000_000,
        )?;
        let size = chunking.get("chunk_size").and_then(Value::as_u64).unwrap_or(1000);
        let overlap = chunking.get("chunk_overlap").and_then(Value::as_u64).unwrap_or(200);
        if overlap >= size {
            return Err(ConfigError::new(
                "chunking.chunk_overlap",
                format!("must be smaller than chunk_size ({})", size),
            ));
        }
    }

    if let Some(retrieval) = expect_optional_object(root, "retrieval")? {
        validate_u64_field(retrieval, "retrieval.top_k", "top_k", 1, 1_000)?;
        validate_u64_field(
            retrieval,
            "retrieval.preview_chars",
            "preview_chars",
            1,
            100_000,
        )?;
        validate_u64_field(
            retrieval,
            "retrieval.history_turns",
            "history_turns",
            0,
            1_000,
        )?;
        validate_u64_field(
            retrieval,
            "retrieval.max_context_chars",
            "max_context_chars",
            0,
            10_000_000,
        )?;
    }

    if let Some(sessions) = expect_optional_object(root, "sessions")? {
        validate_u64_field(
            sessions,
            "sessions.memory_capacity",
            "memory_capacity",
            1,
            10_000,
        )?;
        validate_u64_field(
            sessions,
            "sessions.idle_ttl_secs",
            "idle_ttl_secs",
            1,
            31_536_000,
        )?;
        validate_u64_field(
            sessions,
            "sessions.max_sessions",
            "max_sessions",
            1,
            10_000_000,
        )?;
    }

    if let Some(embedding) = expect_optional_object(root, "embedding")? {
        validate_enum_field(
            embedding,
            "embedding.provider",
            "provider",
            &["openai", "hashing"],
        )?;
        validate_optional_string_field(embedding, "embedding.base_url", "base_url")?;
        validate_optional_string_field(embedding, "embedding.model", "model")?;
        validate_u64_field(embedding, "embedding.dimension", "dimension", 1, 65_536)?;
        validate_u64_field(
            embedding,
            "embedding.timeout_secs",
            "timeout_secs",
            1,
            86_400,
        )?;
    }

    if let Some(generation) = expect_optional_object(root, "generation")? {
        validate_optional_string_field(generation, "generation.base_url", "base_url")?;
        validate_optional_string_field(generation, "generation.model", "model")?;
        validate_f64_field(
            generation,
            "generation.temperature",
            "temperature",
            0.0,
            2.0,
        )?;
        validate_u64_field(
            generation,
            "generation.max_tokens",
            "max_tokens",
            1,
            1_000_000,
        )?;
        validate_u64_field(
            generation,
            "generation.timeout_secs",
            "timeout_secs",
            1,
            86_400,
        )?;
        validate_optional_string_field(
            generation,
            "generation.system_prompt",
            "system_prompt",
        )?;
    }

    if let Some(index) = expect_optional_object(root, "index")? {
        validate_optional_string_field(index, "index.path", "path")?;
        validate_optional_string_field(index, "index.documents_dir", "documents_dir")?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ConfigError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(config_type_error(key, "object")),
        None => Ok(None),
    }
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ConfigError::new(
            path,
            format!("must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if number < min || number > max {
        return Err(ConfigError::new(
            path,
            format!("must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

fn validate_enum_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    allowed: &[&str],
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if !allowed.contains(&text) {
        return Err(ConfigError::new(
            path,
            format!("must be one of: {}", allowed.join(", ")),
        ));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() {
        return Ok(());
    }
    if value.as_str().is_none() {
        return Err(config_type_error(path, "string"));
    }
    Ok(())
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.trim().is_empty() {
            return Err(ConfigError::new(
                format!("{}[{}]", path, index),
                "value cannot be empty",
            ));
        }
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> ConfigError {
    ConfigError::new(path, format!("expected {}", expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_empty_and_partial_config() {
        assert!(validate_config(&json!({})).is_ok());
        assert!(validate_config(&json!({"retrieval": {"top_k": 8}})).is_ok());
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        let err = validate_config(&json!({
            "chunking": {"chunk_size": 100, "chunk_overlap": 100}
        }))
        .unwrap_err();
        assert_eq!(err.path, "chunking.chunk_overlap");
    }

    #[test]
    fn rejects_zero_top_k() {
        let err = validate_config(&json!({"retrieval": {"top_k": 0}})).unwrap_err();
        assert_eq!(err.path, "retrieval.top_k");
    }

    #[test]
    fn rejects_unknown_provider_and_wrong_types() {
        assert!(validate_config(&json!({"embedding": {"provider": "bert"}})).is_err());
        assert!(validate_config(&json!({"server": {"port": "eighty"}})).is_err());
        assert!(validate_config(&json!({"generation": "fast"})).is_err());
    }
}
