//! Streaming chat endpoint
//!
//! Handles POST /chat/stream. Validation failures are plain 400 responses;
//! once the event stream has started, failures arrive as an `error` event.
//! Every stream ends with `data: [DONE]`.

use crate::error::AppResult;
use crate::handlers::chat::{ChatRequest, parse_body};
use crate::handlers::{AppState, record_turn};
use crate::middleware::RequestId;
use crate::pipeline::{OutputMode, SEARCHING_INDICATOR, TurnEvent};
use crate::router::Route;
use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use std::time::Instant;

/// Terminal sentinel sent after the last event
pub const DONE_SENTINEL: &str = "[DONE]";

/// JSON payload of one SSE `data:` line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamPayload {
    /// Transient progress marker; clients show it but never store it
    Status { text: String },
    /// Piece of the assistant reply
    Delta { text: String },
    Error { message: String },
}

impl From<TurnEvent> for StreamPayload {
    fn from(event: TurnEvent) -> Self {
        match event {
            TurnEvent::Searching => Self::Status {
                text: SEARCHING_INDICATOR.to_string(),
            },
            TurnEvent::Fragment(text) => Self::Delta { text },
        }
    }
}

impl StreamPayload {
    fn into_event(self) -> Event {
        match serde_json::to_string(&self) {
            Ok(json) => Event::default().data(json),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode stream payload");
                Event::default().data(r#"{"type":"error","message":"encoding failure"}"#)
            }
        }
    }
}

/// POST /chat/stream
pub async fn handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let request = parse_body(payload)?;

    tracing::debug!(
        request_id = %request_id,
        message_count = request.messages().len(),
        "Received streaming chat request"
    );

    let mut turn = state.pipeline().stream(request.into_messages());
    let metrics = state.metrics();

    let events = async_stream::stream! {
        let start = Instant::now();
        let mut route = Route::Direct;
        let mut fragment_count = 0usize;
        let mut failed = false;

        while let Some(item) = turn.next().await {
            match item {
                Ok(event) => {
                    match &event {
                        TurnEvent::Searching => route = Route::Search,
                        TurnEvent::Fragment(_) => fragment_count += 1,
                    }
                    yield Ok::<Event, Infallible>(StreamPayload::from(event).into_event());
                }
                Err(e) => {
                    failed = true;
                    tracing::warn!(
                        request_id = %request_id,
                        error = %e,
                        fragment_count,
                        "Streaming turn failed"
                    );
                    yield Ok(StreamPayload::Error { message: e.to_string() }.into_event());
                    break;
                }
            }
        }

        let outcome = if failed { Err(()) } else { Ok(route) };
        record_turn(&metrics, outcome, OutputMode::Streamed, start.elapsed());

        tracing::info!(
            request_id = %request_id,
            route = route.as_str(),
            fragment_count,
            failed,
            duration_ms = start.elapsed().as_millis() as u64,
            "Streaming turn finished"
        );

        yield Ok(Event::default().data(DONE_SENTINEL));
    };

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
