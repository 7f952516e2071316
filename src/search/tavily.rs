//! Tavily web search client
//!
//! `POST {base_url}/search` with a bearer credential. Tavily calls the
//! snippet `content`; it is mapped onto [`SearchResult::snippet`].

use super::{SearchError, SearchProvider, SearchResult};
use crate::config::{ApiKey, SearchConfig};
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyHit>,
}

#[derive(Debug, Deserialize)]
struct TavilyHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl From<TavilyHit> for SearchResult {
    fn from(hit: TavilyHit) -> Self {
        SearchResult::new(hit.title, hit.content, hit.url)
    }
}

pub struct TavilyClient {
    http: reqwest::Client,
    api_key: ApiKey,
    endpoint: String,
}

impl std::fmt::Debug for TavilyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TavilyClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl TavilyClient {
    pub fn new(config: &SearchConfig, api_key: ApiKey) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds()))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            endpoint: format!("{}/search", config.base_url().trim_end_matches('/')),
        })
    }

    /// Credential read through `lookup`; fails eagerly when absent or a placeholder
    pub fn from_lookup<F>(config: &SearchConfig, lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = ApiKey::resolve(config.api_key_env(), config.api_key_placeholder(), lookup)?;
        Self::new(config, api_key)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SearchProvider for TavilyClient {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        tracing::debug!(
            endpoint = %self.endpoint,
            query_length = query.len(),
            max_results,
            "Sending search request"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose())
            .json(&TavilyRequest { query, max_results })
            .send()
            .await
            .map_err(|e| SearchError::Request {
                endpoint: self.endpoint.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let parsed: TavilyResponse = response.json().await.map_err(|e| SearchError::Decode {
            endpoint: self.endpoint.clone(),
            reason: e.to_string(),
        })?;

        Ok(parsed
            .results
            .into_iter()
            .take(max_results)
            .map(SearchResult::from)
            .collect())
    }

    fn name(&self) -> &str {
        "tavily"
    }
}
