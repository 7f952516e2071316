//! Web search boundary and the search step
//!
//! [`SearchProvider`] wraps the remote search API. [`search_context`] is the
//! pipeline step built on top of it: it always produces context text and
//! never fails, so a broken search provider cannot prevent an answer.

pub mod mock;
pub mod tavily;

pub use tavily::TavilyClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Context text used when the provider returns nothing
pub const NO_RESULTS: &str = "No results found.";

/// Separator placed between formatted results
pub const RESULT_SEPARATOR: &str = "\n\n---\n\n";

/// Prefix of the context text produced when the provider fails
pub const SEARCH_FAILED_PREFIX: &str = "Search failed:";

/// One ranked search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

impl SearchResult {
    pub fn new(
        title: impl Into<String>,
        snippet: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            snippet: snippet.into(),
            url: url.into(),
        }
    }
}

/// Search provider failures (network, auth, quota, malformed payloads)
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("request to {endpoint} failed: {reason}")]
    Request { endpoint: String, reason: String },

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("could not decode response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Return at most `max_results` results, best first
    async fn search(&self, query: &str, max_results: usize)
    -> Result<Vec<SearchResult>, SearchError>;

    /// Short provider name for logs
    fn name(&self) -> &str;
}

/// Render results as one context block
///
/// Each result becomes `**{title}**\n{snippet}\nSource: {url}`; blocks are
/// joined with [`RESULT_SEPARATOR`]. An empty slice renders as [`NO_RESULTS`].
pub fn format_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return NO_RESULTS.to_string();
    }

    results
        .iter()
        .map(|r| format!("**{}**\n{}\nSource: {}", r.title, r.snippet, r.url))
        .collect::<Vec<_>>()
        .join(RESULT_SEPARATOR)
}

/// Run one search and turn the outcome into context text
///
/// Provider errors are logged and converted into `Search failed: {error}`.
pub async fn search_context(
    provider: &dyn SearchProvider,
    query: &str,
    max_results: usize,
) -> String {
    match provider.search(query, max_results).await {
        Ok(results) => {
            tracing::info!(
                provider = provider.name(),
                result_count = results.len(),
                "Search completed"
            );
            format_results(&results)
        }
        Err(e) => {
            tracing::warn!(
                provider = provider.name(),
                error = %e,
                "Search failed, continuing without results"
            );
            format!("{} {}", SEARCH_FAILED_PREFIX, e)
        }
    }
}
