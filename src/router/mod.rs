//! Query router
//!
//! Decides whether the latest user message needs a web search before the
//! model answers. The decision is delegated to the language model itself;
//! its reply is treated as untrusted text and reduced to a [`Route`] with a
//! single deterministic rule (see [`QueryRouter::parse_route`]).

mod prompt;

pub use prompt::{MAX_QUERY_CHARS, RouterPrompt, build_router_prompt};

use crate::error::AppResult;
use crate::llm::{LlmClient, Message};
use std::sync::Arc;

/// Outcome of the routing step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Fetch web results before answering
    Search,
    /// Answer from the model alone
    Direct,
}

impl Route {
    /// Label for logging and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Direct => "direct",
        }
    }

    pub fn needs_search(&self) -> bool {
        matches!(self, Self::Search)
    }
}

/// LLM-backed classifier
///
/// One model call per decision, no retries. Model failures propagate; an
/// unexpected reply never does.
#[derive(Clone)]
pub struct QueryRouter {
    llm: Arc<dyn LlmClient>,
    prompt: RouterPrompt,
}

impl QueryRouter {
    pub fn new(llm: Arc<dyn LlmClient>, prompt: RouterPrompt) -> Self {
        Self { llm, prompt }
    }

    /// Classify `latest_user_text` as [`Route::Search`] or [`Route::Direct`]
    pub async fn decide(&self, latest_user_text: &str) -> AppResult<Route> {
        let router_prompt = build_router_prompt(self.prompt, latest_user_text);

        tracing::debug!(
            prompt_style = self.prompt.as_str(),
            prompt_length = router_prompt.len(),
            user_prompt_length = latest_user_text.len(),
            "Built router prompt"
        );

        let reply = self.llm.complete(&[Message::user(router_prompt)]).await?;
        let route = Self::parse_route(&reply);

        tracing::info!(
            route = route.as_str(),
            reply_preview = %reply.chars().take(80).collect::<String>(),
            "Router decision"
        );

        Ok(route)
    }

    /// Reduce the model's reply to a route
    ///
    /// `Search` iff the reply contains "search" in any letter case, anywhere.
    /// Every other reply, including empty or off-topic text, is `Direct`.
    pub fn parse_route(reply: &str) -> Route {
        if reply.to_lowercase().contains("search") {
            Route::Search
        } else {
            Route::Direct
        }
    }
}

impl std::fmt::Debug for QueryRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryRouter")
            .field("model", &self.llm.model())
            .field("prompt", &self.prompt)
            .finish()
    }
}
