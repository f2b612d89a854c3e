use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::Generator;
use super::types::ChatRequest;
use crate::rag::memory::ConversationTurn;

/// Chat completions against any OpenAI-compatible server
/// (OpenAI, Groq, LM Studio, Ollama, llama.cpp).
#[derive(Clone)]
pub struct OpenAiGenerator {
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
    client: Client,
}

impl OpenAiGenerator {
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
            temperature: None,
            max_tokens: None,
            client,
        })
    }

    pub fn with_sampling(mut self, temperature: Option<f64>, max_tokens: Option<u32>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    fn request_body(&self, request: &ChatRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": request.messages,
            "stream": false,
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature { obj.insert("temperature".to_string(), json!(t)); }
            if let Some(t) = request.max_tokens { obj.insert("max_tokens".to_string(), json!(t)); }
        }

        body
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(
        &self,
        system_prompt: &str,
        user_message: &str,
        history: &[ConversationTurn],
    ) -> anyhow::Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let request = ChatRequest::from_parts(system_prompt, user_message, history)
            .with_sampling(self.temperature, self.max_tokens);
        let body = self.request_body(&request);

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let res = req
            .send()
            .await
            .with_context(|| format!("chat request to {} failed", url))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            anyhow::bail!("chat endpoint returned {}: {}", status, text);
        }

        let payload: Value = res.json().await?;
        extract_content(&payload)
    }
}

fn extract_content(payload: &Value) -> anyhow::Result<String> {
    payload["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("chat response has no message content"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_content_reads_first_choice() {
        let payload = json!({
            "choices": [{"message": {"role": "assistant", "content": "You get 10 sick days."}}]
        });
        assert_eq!(extract_content(&payload).unwrap(), "You get 10 sick days.");
    }

    #[test]
    fn extract_content_fails_without_choices() {
        assert!(extract_content(&json!({"error": {"message": "quota"}})).is_err());
    }

    #[test]
    fn request_body_includes_sampling_when_set() {
        let generator = OpenAiGenerator::new("http://localhost:1234/", "m", None, Duration::from_secs(5))
            .unwrap()
            .with_sampling(Some(0.2), Some(64));
        let request = ChatRequest::from_parts("sys", "hi", &[])
            .with_sampling(generator.temperature, generator.max_tokens);

        let body = generator.request_body(&request);
        assert_eq!(body["model"], "m");
        assert_eq!(body["temperature"], 0.2);
        assert_eq!(body["max_tokens"], 64);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(generator.base_url, "http://localhost:1234");
    }
}
