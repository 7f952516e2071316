//! Streamed turn output

use crate::error::AppResult;
use futures::stream::{AbortHandle, Abortable, BoxStream, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

/// Marker shown to the user while the search step runs
pub const SEARCHING_INDICATOR: &str = "🔍 *Searching the web...*\n\n";

/// One item of a streamed turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// The search step is about to run
    Searching,
    /// A piece of the assistant's reply
    Fragment(String),
}

impl TurnEvent {
    /// Text a terminal or page should render for this event
    pub fn display_text(&self) -> &str {
        match self {
            Self::Searching => SEARCHING_INDICATOR,
            Self::Fragment(text) => text,
        }
    }

    pub fn fragment(&self) -> Option<&str> {
        match self {
            Self::Fragment(text) => Some(text),
            Self::Searching => None,
        }
    }
}

/// Remove the searching marker from rendered text before it is stored as history
pub fn strip_search_indicator(text: &str) -> String {
    text.replace(SEARCHING_INDICATOR, "")
}

/// Lazy, cancellable sequence of [`TurnEvent`]s
///
/// Nothing runs until the stream is polled. After [`AbortHandle::abort`] the
/// next poll returns `None`; dropping the stream drops the provider stream
/// with it.
pub struct TurnStream {
    inner: Abortable<BoxStream<'static, AppResult<TurnEvent>>>,
    handle: AbortHandle,
}

impl TurnStream {
    pub fn new(events: BoxStream<'static, AppResult<TurnEvent>>) -> Self {
        let (inner, handle) = futures::stream::abortable(events);
        Self { inner, handle }
    }

    /// Handle that can stop this stream from another task
    pub fn cancel_handle(&self) -> AbortHandle {
        self.handle.clone()
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_aborted()
    }
}

impl Stream for TurnStream {
    type Item = AppResult<TurnEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for TurnStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnStream")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
