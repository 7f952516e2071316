//! Final answer generation
//!
//! The responder prepends one synthesized system instruction to the
//! caller's conversation and sends the result to the model exactly once.

use crate::error::AppResult;
use crate::llm::{FragmentStream, LlmClient, Message};
use std::sync::Arc;

/// System instruction used when no search context is available
pub const PLAIN_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant. Be concise, accurate, and friendly.";

/// System instruction that embeds web search results
pub fn search_system_prompt(search_context: &str) -> String {
    format!(
        "You are a helpful AI assistant with access to real-time web search results. \
         Use the search results below to answer the user's latest question accurately.\n\n\
         Search results:\n{}\n\n\
         Guidelines:\n\
         - Base your answer on the search results when they are relevant\n\
         - Cite sources by name or URL for facts taken from the results\n\
         - If the results are incomplete or do not answer the question, say so plainly \
         and answer as well as you can\n\
         - Be concise, accurate, and friendly",
        search_context
    )
}

/// Pick the system instruction for a turn
///
/// Any non-empty context selects the search template, including the
/// `Search failed: ...` text produced when the provider errored.
pub fn system_instruction(search_context: &str) -> String {
    if search_context.is_empty() {
        PLAIN_SYSTEM_PROMPT.to_string()
    } else {
        search_system_prompt(search_context)
    }
}

/// `[system instruction] + conversation`, in order
pub fn build_messages(conversation: &[Message], search_context: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(conversation.len() + 1);
    messages.push(Message::system(system_instruction(search_context)));
    messages.extend_from_slice(conversation);
    messages
}

#[derive(Clone)]
pub struct Responder {
    llm: Arc<dyn LlmClient>,
}

impl Responder {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    /// Buffered reply
    pub async fn respond(&self, conversation: &[Message], search_context: &str) -> AppResult<String> {
        let messages = build_messages(conversation, search_context);
        tracing::debug!(
            message_count = messages.len(),
            with_context = !search_context.is_empty(),
            "Requesting completion"
        );
        Ok(self.llm.complete(&messages).await?)
    }

    /// Streamed reply; fragments concatenate to what [`Responder::respond`] would return
    pub async fn respond_stream(
        &self,
        conversation: &[Message],
        search_context: &str,
    ) -> AppResult<FragmentStream> {
        let messages = build_messages(conversation, search_context);
        tracing::debug!(
            message_count = messages.len(),
            with_context = !search_context.is_empty(),
            "Requesting streamed completion"
        );
        Ok(self.llm.stream(&messages).await?)
    }
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder")
            .field("model", &self.llm.model())
            .finish()
    }
}
