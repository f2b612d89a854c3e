//! RAG Context Builder.
//!
//! Turns search results and recent dialogue into the grounding context:
//! 1. Each passage becomes a `[Document i — source]` block, most relevant first
//! 2. Blocks are joined by a separator, within an optional character budget
//! 3. The recent conversation is appended as a labeled transcript

use serde::{Deserialize, Serialize};

use super::memory::ConversationTurn;
use super::types::SearchResult;

pub const NO_CONTEXT_MARKER: &str = "No relevant context found.";
const BLOCK_SEPARATOR: &str = "\n\n---\n\n";
const CONTEXT_PLACEHOLDER: &str = "{context}";

/// Configuration for context building.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextBuilderConfig {
    /// Number of most recent turns appended as transcript
    pub history_turns: usize,
    /// Maximum length of the document section in characters (0 = unlimited)
    pub max_context_chars: usize,
}

impl Default for ContextBuilderConfig {
    fn default() -> Self {
        Self {
            history_turns: 6,
            max_context_chars: 12_000,
        }
    }
}

/// RAG Context Builder.
#[derive(Debug, Clone, Default)]
pub struct RAGContextBuilder {
    config: ContextBuilderConfig,
}

impl RAGContextBuilder {
    pub fn new(config: ContextBuilderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ContextBuilderConfig {
        &self.config
    }

    /// Build the grounding context.
    ///
    /// Never returns an empty document section: with no results the
    /// [`NO_CONTEXT_MARKER`] takes its place.
    pub fn assemble(&self, results: &[SearchResult], conversation_tail: &[ConversationTurn]) -> String {
        let mut context = self.format_documents(results);

        let transcript = render_transcript(conversation_tail);
        if !transcript.is_empty() {
            context.push_str("\n\nRecent conversation:\n");
            context.push_str(&transcript);
        }

        context
    }

    fn format_documents(&self, results: &[SearchResult]) -> String {
        if results.is_empty() {
            return NO_CONTEXT_MARKER.to_string();
        }

        let budget = self.config.max_context_chars;
        let mut blocks: Vec<String> = Vec::with_capacity(results.len());
        let mut length = 0usize;

        for (i, result) in results.iter().enumerate() {
            let block = format!(
                "[Document {} — {}]\n{}",
                i + 1,
                result.passage.source_name,
                result.passage.text
            );
            let addition = block.chars().count()
                + if blocks.is_empty() { 0 } else { BLOCK_SEPARATOR.len() };

            // The most relevant block is always kept.
            if budget > 0 && !blocks.is_empty() && length + addition > budget {
                tracing::debug!(
                    "Context budget of {} chars reached, dropping {} of {} documents",
                    budget,
                    results.len() - i,
                    results.len()
                );
                break;
            }

            length += addition;
            blocks.push(block);
        }

        blocks.join(BLOCK_SEPARATOR)
    }
}

/// Render turns as `User: ...` / `Assistant: ...` lines, oldest first.
pub fn render_transcript(turns: &[ConversationTurn]) -> String {
    turns
        .iter()
        .map(|turn| format!("{}: {}\n", turn.role.label(), turn.content))
        .collect()
}

/// Insert `context` into the system instruction at `{context}`.
pub fn build_system_prompt(instruction: &str, context: &str) -> String {
    if instruction.contains(CONTEXT_PLACEHOLDER) {
        instruction.replace(CONTEXT_PLACEHOLDER, context)
    } else {
        format!("{}\n\n{}", instruction.trim_end(), context)
    }
}
