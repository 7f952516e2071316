//! Language-model boundary
//!
//! [`Message`] is the role-tagged chat turn shared by the whole crate.
//! [`LlmClient`] abstracts the chat-completion provider so the router and
//! responder can be exercised against [`mock::ScriptedLlm`] in tests.

pub mod client;
pub mod mock;
pub mod sse;
pub mod types;

pub use client::ChatCompletionsClient;

use crate::error::ModelQueryError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Lazy sequence of text fragments produced by a streaming completion
pub type FragmentStream = BoxStream<'static, Result<String, ModelQueryError>>;

/// Author of a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One chat turn
///
/// Serialized as `{"role": "user", "content": "..."}`, the shape both the
/// browser client and OpenAI-compatible providers use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "content", rename_all = "lowercase")]
pub enum Message {
    System(String),
    User(String),
    Assistant(String),
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System(content.into())
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User(content.into())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant(content.into())
    }

    pub fn role(&self) -> Role {
        match self {
            Self::System(_) => Role::System,
            Self::User(_) => Role::User,
            Self::Assistant(_) => Role::Assistant,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::System(text) | Self::User(text) | Self::Assistant(text) => text,
        }
    }
}

/// Chat-completion provider
///
/// Implementations are stateless per call: each call sends exactly the
/// messages given, in order.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Return the full completion text
    async fn complete(&self, messages: &[Message]) -> Result<String, ModelQueryError>;

    /// Start a streaming completion
    ///
    /// Connection and HTTP-status failures are returned before the stream
    /// exists; failures after that arrive as `Err` items.
    async fn stream(&self, messages: &[Message]) -> Result<FragmentStream, ModelQueryError>;

    /// Model identifier, for logs and the health endpoint
    fn model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serializes_as_role_and_content() {
        let json = serde_json::to_value(Message::user("Hello")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "Hello"}));

        let json = serde_json::to_value(Message::system("Be brief")).unwrap();
        assert_eq!(json["role"], "system");
    }

    #[test]
    fn test_message_deserializes_from_role_and_content() {
        let msg: Message =
            serde_json::from_str(r#"{"role": "assistant", "content": "Hi there"}"#).unwrap();
        assert_eq!(msg, Message::assistant("Hi there"));
        assert_eq!(msg.role(), Role::Assistant);
        assert_eq!(msg.content(), "Hi there");
    }

    #[test]
    fn test_message_rejects_unknown_role() {
        let result = serde_json::from_str::<Message>(r#"{"role": "tool", "content": "x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_role_as_str() {
        assert_eq!(Role::System.as_str(), "system");
        assert_eq!(Role::User.as_str(), "user");
        assert_eq!(Role::Assistant.as_str(), "assistant");
    }
}
