#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use docchat_backend::llm::Generator;
use docchat_backend::rag::{
    ConversationTurn, Embedder, Passage, RAGConfig, RAGEngine, SourceDocument,
};

const VOCABULARY: [&str; 6] = ["annual", "sick", "leave", "days", "remote", "work"];

/// Bag-of-words over a tiny fixed vocabulary; deterministic and collision-free.
pub struct KeywordEmbedder;

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn embed(&self, inputs: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(inputs.iter().map(|text| keyword_vector(text)).collect())
    }
}

pub fn keyword_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; VOCABULARY.len()];
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let token = token.to_lowercase();
        if let Some(pos) = VOCABULARY.iter().position(|word| *word == token) {
            vector[pos] += 1.0;
        }
    }
    vector
}

/// Keyword embedder that sleeps before embedding any text containing `slow_word`.
pub struct SlowEmbedder {
    pub slow_word: &'static str,
    pub delay: Duration,
}

#[async_trait]
impl Embedder for SlowEmbedder {
    fn name(&self) -> &str {
        "slow-keyword"
    }

    async fn embed(&self, inputs: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if inputs.iter().any(|text| text.contains(self.slow_word)) {
            tokio::time::sleep(self.delay).await;
        }
        Ok(inputs.iter().map(|text| keyword_vector(text)).collect())
    }
}

/// Keyword embedder that parks any text containing `gate_word` until released.
pub struct GatedEmbedder {
    pub gate_word: &'static str,
    pub entered: Notify,
    pub release: Notify,
}

impl GatedEmbedder {
    pub fn new(gate_word: &'static str) -> Self {
        Self {
            gate_word,
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl Embedder for GatedEmbedder {
    fn name(&self) -> &str {
        "gated-keyword"
    }

    async fn embed(&self, inputs: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if inputs.iter().any(|text| text.contains(self.gate_word)) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        Ok(inputs.iter().map(|text| keyword_vector(text)).collect())
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorCall {
    pub system_prompt: String,
    pub user_message: String,
    pub history_len: usize,
}

/// Records every call and answers from a script, or fails on demand.
#[derive(Default)]
pub struct ScriptedGenerator {
    calls: Mutex<Vec<GeneratorCall>>,
    fail: Mutex<bool>,
}

impl ScriptedGenerator {
    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn calls(&self) -> Vec<GeneratorCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_call(&self) -> GeneratorCall {
        self.calls().pop().expect("generator was never called")
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        system_prompt: &str,
        user_message: &str,
        history: &[ConversationTurn],
    ) -> anyhow::Result<String> {
        self.calls.lock().unwrap().push(GeneratorCall {
            system_prompt: system_prompt.to_string(),
            user_message: user_message.to_string(),
            history_len: history.len(),
        });
        if *self.fail.lock().unwrap() {
            anyhow::bail!("rate limit exceeded");
        }
        if system_prompt.contains("Sick leave is 10 days.") {
            Ok("You get 10 sick days.".to_string())
        } else {
            Ok("I don't have enough information about that".to_string())
        }
    }
}

pub fn leave_policy() -> Vec<SourceDocument> {
    vec![
        SourceDocument::new("Annual leave is 20 days.", "A"),
        SourceDocument::new("Sick leave is 10 days.", "B"),
    ]
}

pub fn engine_with(top_k: usize) -> (RAGEngine, Arc<ScriptedGenerator>) {
    let generator = Arc::new(ScriptedGenerator::default());
    let config = RAGConfig {
        top_k,
        ..Default::default()
    };
    let engine = RAGEngine::new(config, Arc::new(KeywordEmbedder), generator.clone()).unwrap();
    (engine, generator)
}

pub async fn ready_engine(top_k: usize) -> (RAGEngine, Arc<ScriptedGenerator>) {
    let (engine, generator) = engine_with(top_k);
    let passages: Vec<Passage> = engine.chunker().split_documents(&leave_policy());
    engine.build_index(passages).await.unwrap();
    (engine, generator)
}
