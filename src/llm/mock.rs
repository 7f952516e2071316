//! Scripted in-memory model for tests and offline runs
//!
//! Each call, buffered or streamed, consumes the next scripted reply and
//! records the messages it was given.

use super::{FragmentStream, LlmClient, Message};
use crate::error::ModelQueryError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

const MOCK_ENDPOINT: &str = "mock://llm";

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(String),
}

#[derive(Debug, Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlm {
    /// Replies are consumed in order, one per call
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Reply::Text(r.into())).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a provider failure as the next reply
    pub fn then_fail(self, reason: impl Into<String>) -> Self {
        self.lock_replies().push_back(Reply::Fail(reason.into()));
        self
    }

    /// Every message list this model has been called with, in call order
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, VecDeque<Reply>> {
        self.replies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_reply(&self, messages: &[Message]) -> Result<String, ModelQueryError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(messages.to_vec());

        match self.lock_replies().pop_front() {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail(reason)) => Err(ModelQueryError::Request {
                endpoint: MOCK_ENDPOINT.to_string(),
                reason,
            }),
            None => Err(ModelQueryError::EmptyResponse {
                endpoint: MOCK_ENDPOINT.to_string(),
            }),
        }
    }
}

/// Split text into word-sized fragments that concatenate back to the input
pub fn fragments_of(text: &str) -> Vec<String> {
    text.split_inclusive(' ').map(str::to_string).collect()
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, messages: &[Message]) -> Result<String, ModelQueryError> {
        self.next_reply(messages)
    }

    async fn stream(&self, messages: &[Message]) -> Result<FragmentStream, ModelQueryError> {
        let text = self.next_reply(messages)?;
        let fragments: Vec<Result<String, ModelQueryError>> =
            fragments_of(&text).into_iter().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(fragments)))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}
