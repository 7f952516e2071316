//! Buffered chat endpoint
//!
//! Handles POST /chat: runs one full turn and returns the reply as JSON.

use crate::error::{AppError, AppResult};
use crate::handlers::{AppState, record_turn};
use crate::llm::Message;
use crate::middleware::RequestId;
use crate::pipeline::{AgentState, OutputMode};
use crate::router::Route;
use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::{Duration, Instant};

/// Maximum allowed message length in characters (100K chars)
pub const MAX_MESSAGE_LENGTH: usize = 100_000;

/// Conversation sent by the client
///
/// Validation is enforced during deserialization - invalid instances cannot exist.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    messages: Vec<Message>,
}

impl ChatRequest {
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

impl<'de> Deserialize<'de> for ChatRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RawChatRequest {
            messages: Vec<Message>,
        }

        let raw = RawChatRequest::deserialize(deserializer)?;

        let Some(last) = raw.messages.last() else {
            return Err(serde::de::Error::custom("messages cannot be empty"));
        };

        // System instructions are synthesized server-side only
        if raw.messages.iter().any(|m| matches!(m, Message::System(_))) {
            return Err(serde::de::Error::custom(
                "system messages are not accepted from clients",
            ));
        }

        match last {
            Message::User(text) if !text.trim().is_empty() => {}
            Message::User(_) => {
                return Err(serde::de::Error::custom(
                    "last user message cannot be empty or contain only whitespace",
                ));
            }
            _ => {
                return Err(serde::de::Error::custom(
                    "last message must come from the user",
                ));
            }
        }

        // Count Unicode characters, not bytes
        for (index, message) in raw.messages.iter().enumerate() {
            let char_count = message.content().chars().count();
            if char_count > MAX_MESSAGE_LENGTH {
                return Err(serde::de::Error::custom(format!(
                    "message {} exceeds maximum length of {} characters (got {})",
                    index, MAX_MESSAGE_LENGTH, char_count
                )));
            }
        }

        Ok(ChatRequest {
            messages: raw.messages,
        })
    }
}

/// Reply to a buffered turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatResponse {
    /// Assistant reply text
    pub content: String,
    /// Whether the router sent this turn through web search
    pub searched: bool,
}

/// Map a JSON body rejection to a 400 with the deserializer's message
pub(crate) fn parse_body(
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> AppResult<ChatRequest> {
    payload
        .map(|Json(request)| request)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

/// POST /chat
pub async fn handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> AppResult<Json<ChatResponse>> {
    let request = parse_body(payload)?;

    tracing::debug!(
        request_id = %request_id,
        message_count = request.messages().len(),
        "Received chat request"
    );

    let timeout_seconds = state.config().server.request_timeout_seconds;
    let start = Instant::now();

    let turn = state
        .pipeline()
        .run(AgentState::new(request.into_messages()));
    let result = match tokio::time::timeout(Duration::from_secs(timeout_seconds), turn).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(request_id = %request_id, timeout_seconds, "Chat turn timed out");
            Err(AppError::Timeout { timeout_seconds })
        }
    };

    let metrics = state.metrics();
    match result {
        Ok(final_state) => {
            let route = if final_state.needs_search {
                Route::Search
            } else {
                Route::Direct
            };
            record_turn(&metrics, Ok(route), OutputMode::Buffered, start.elapsed());

            tracing::info!(
                request_id = %request_id,
                route = route.as_str(),
                reply_length = final_state.reply().len(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Chat turn completed"
            );

            Ok(Json(ChatResponse {
                content: final_state.reply().to_string(),
                searched: final_state.needs_search,
            }))
        }
        Err(e) => {
            record_turn(&metrics, Err(()), OutputMode::Buffered, start.elapsed());
            Err(e)
        }
    }
}
