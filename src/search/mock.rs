//! Fixed-result search provider for tests and offline runs

use super::{SearchError, SearchProvider, SearchResult};
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct StaticSearch {
    results: Vec<SearchResult>,
    failure: Option<String>,
    calls: Mutex<Vec<(String, usize)>>,
}

impl StaticSearch {
    pub fn new(results: Vec<SearchResult>) -> Self {
        Self {
            results,
            failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A provider whose every call fails with `reason`
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            results: Vec::new(),
            failure: Some(reason.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `(query, max_results)` for every call, in order
    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((query.to_string(), max_results));

        if let Some(reason) = &self.failure {
            return Err(SearchError::Request {
                endpoint: "mock://search".to_string(),
                reason: reason.clone(),
            });
        }

        Ok(self.results.iter().take(max_results).cloned().collect())
    }

    fn name(&self) -> &str {
        "static"
    }
}
