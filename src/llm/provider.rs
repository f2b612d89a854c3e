use async_trait::async_trait;

use crate::rag::memory::ConversationTurn;

/// The external text-generation capability.
///
/// Failures (network, quota, malformed responses) are returned as-is;
/// retrying is the implementation's business, never the caller's.
#[async_trait]
pub trait Generator: Send + Sync {
    /// return the generator name (e.g. "openai")
    fn name(&self) -> &str;

    /// chat completion (non-streaming)
    async fn complete(
        &self,
        system_prompt: &str,
        user_message: &str,
        history: &[ConversationTurn],
    ) -> anyhow::Result<String>;
}
