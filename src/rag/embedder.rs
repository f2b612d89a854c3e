//! Embedder trait: the opaque text-to-vector capability consumed by the index.
//!
//! Two adapters are provided:
//! - `OpenAiEmbedder`: any OpenAI-compatible `/v1/embeddings` endpoint
//!   (OpenAI, LM Studio, Ollama, llama.cpp server)
//! - `HashingEmbedder`: deterministic local feature hashing, for offline
//!   setups and tests

use std::sync::OnceLock;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// Maps text to fixed-length vectors.
///
/// Implementations must be deterministic: identical input yields identical
/// output, otherwise repeated searches against the same index drift.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// return the embedder name (e.g. "openai", "hashing")
    fn name(&self) -> &str;

    /// embed a batch; output order matches input order
    async fn embed(&self, inputs: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    /// embed a single text
    async fn embed_one(&self, input: &str) -> anyhow::Result<Vec<f32>> {
        let mut vectors = self.embed(&[input.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow::anyhow!("{} returned no embedding", self.name()))
    }
}

#[derive(Clone)]
pub struct OpenAiEmbedder {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: Client,
}

impl OpenAiEmbedder {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            client,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn name(&self) -> &str {
        "openai"
    }

    async fn embed(&self, inputs: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": inputs,
        });

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let res = req
            .send()
            .await
            .with_context(|| format!("embedding request to {} failed", url))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            anyhow::bail!("embedding endpoint returned {}: {}", status, text);
        }

        let payload: Value = res.json().await?;
        let embeddings = parse_embeddings(&payload)?;

        if embeddings.len() != inputs.len() {
            anyhow::bail!(
                "embedding endpoint returned {} vectors for {} inputs",
                embeddings.len(),
                inputs.len()
            );
        }

        Ok(embeddings)
    }
}

/// Extract `data[*].embedding`, honouring the `index` field when present so
/// out-of-order responses still line up with their inputs.
fn parse_embeddings(payload: &Value) -> anyhow::Result<Vec<Vec<f32>>> {
    let data = payload["data"]
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("embedding response has no data array"))?;

    let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let values = item["embedding"]
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("embedding item {} has no vector", position))?;
        let vector = values
            .iter()
            .map(|v| {
                v.as_f64().map(|f| f as f32).ok_or_else(|| {
                    anyhow::anyhow!("embedding item {} has a non-numeric element: {}", position, v)
                })
            })
            .collect::<anyhow::Result<Vec<f32>>>()?;
        let index = item["index"]
            .as_u64()
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, vector));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
}

/// Bag-of-words feature hashing into a fixed number of buckets.
///
/// Tokens are lowercased alphanumeric runs. Each token adds +1 or -1 to one
/// bucket chosen from its SHA-256 digest. No model download is needed, at
/// the cost of purely lexical similarity.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in tokens(text) {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u64::from_le_bytes([
                digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6],
                digest[7],
            ]) as usize
                % self.dimension;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    async fn embed(&self, inputs: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(inputs.iter().map(|text| self.embed_text(text)).collect())
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    let re = TOKEN.get_or_init(|| Regex::new(r"[\p{L}\p{N}]+").expect("static token regex"));
    re.find_iter(text).map(|m| m.as_str().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashing_embedder_is_deterministic() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.embed_one("Sick leave is 10 days.").await.unwrap();
        let b = embedder.embed_one("Sick leave is 10 days.").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn hashing_embedder_ignores_case_and_punctuation() {
        let embedder = HashingEmbedder::new(128);
        let a = embedder.embed_one("Annual LEAVE!").await.unwrap();
        let b = embedder.embed_one("annual leave").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn hashing_embedder_batch_preserves_order() {
        let embedder = HashingEmbedder::new(32);
        let inputs = vec!["alpha".to_string(), "beta".to_string()];
        let batch = embedder.embed(&inputs).await.unwrap();
        assert_eq!(batch[0], embedder.embed_one("alpha").await.unwrap());
        assert_eq!(batch[1], embedder.embed_one("beta").await.unwrap());
    }

    #[test]
    fn parse_embeddings_orders_by_index() {
        let payload = json!({
            "data": [
                {"index": 1, "embedding": [0.0, 1.0]},
                {"index": 0, "embedding": [1.0, 0.0]}
            ]
        });
        let parsed = parse_embeddings(&payload).unwrap();
        assert_eq!(parsed, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn parse_embeddings_rejects_non_numeric_elements() {
        let payload = json!({
            "data": [{"index": 0, "embedding": [0.5, "NaN", null]}]
        });
        let err = parse_embeddings(&payload).unwrap_err();
        assert!(err.to_string().contains("non-numeric"));
    }

    #[test]
    fn parse_embeddings_rejects_missing_data() {
        assert!(parse_embeddings(&json!({"error": "nope"})).is_err());
    }
}
