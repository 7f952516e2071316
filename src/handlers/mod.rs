//! HTTP request handlers for the chatroute API

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::metrics::Metrics;
use crate::middleware::request_id_middleware;
use crate::pipeline::{OutputMode, Pipeline};
use crate::router::Route;
use axum::routing::{get, post};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

pub mod chat;
pub mod health;
pub mod metrics;
pub mod stream;
pub mod ui;

/// Application state shared across all handlers
///
/// All fields are Arc'd (the pipeline internally) for cheap cloning across
/// Axum handlers. The server keeps no conversation state.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    pipeline: Pipeline,
    metrics: Arc<Metrics>,
}

impl AppState {
    /// Build the hosted clients from `config` and the process environment
    ///
    /// Fails before the server binds when a credential is missing.
    pub fn new(config: Arc<Config>) -> AppResult<Self> {
        let pipeline = Pipeline::from_config(&config)?;
        Self::with_pipeline(config, pipeline)
    }

    /// Use an already-assembled pipeline (scripted clients in tests)
    pub fn with_pipeline(config: Arc<Config>, pipeline: Pipeline) -> AppResult<Self> {
        let metrics = Metrics::new()
            .map_err(|e| AppError::Internal(format!("Failed to register metrics: {}", e)))?;

        Ok(Self {
            config,
            pipeline,
            metrics: Arc::new(metrics),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }
}

/// All routes with request-id and tracing layers applied
pub fn app(state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/", get(ui::handler))
        .route("/chat", post(chat::handler))
        .route("/chat/stream", post(stream::handler))
        .route("/health", get(health::handler))
        .route("/metrics", get(metrics::handler))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Record a finished turn; recording failures are logged and never fail the request
pub(crate) fn record_turn(
    metrics: &Metrics,
    outcome: Result<Route, ()>,
    mode: OutputMode,
    elapsed: Duration,
) {
    let recorded = match outcome {
        Ok(route) => metrics.record_turn(route, mode),
        Err(()) => metrics.record_failure(mode),
    }
    .and_then(|_| metrics.record_duration(mode, elapsed.as_secs_f64() * 1000.0));

    if let Err(e) = recorded {
        tracing::error!(
            error = %e,
            mode = mode.as_str(),
            "Metrics recording failed (non-fatal)"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedLlm;
    use crate::router::RouterPrompt;
    use crate::search::mock::StaticSearch;

    fn scripted_state() -> AppState {
        let pipeline = Pipeline::new(
            Arc::new(ScriptedLlm::default()),
            Arc::new(StaticSearch::new(Vec::new())),
            RouterPrompt::Terse,
            5,
        );
        AppState::with_pipeline(Arc::new(Config::default()), pipeline).unwrap()
    }

    #[test]
    fn test_appstate_new_fails_without_credentials() {
        // Pipeline::from_config reads the real environment; use the lookup path instead
        let err = Pipeline::from_lookup(&Config::default(), |_| None).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_appstate_is_clonable() {
        let state = scripted_state();
        let clone = state.clone();
        assert_eq!(clone.config().server.port, 8501);
        assert_eq!(clone.pipeline().model(), "scripted");
    }

    #[test]
    fn test_record_turn_counts_success_and_failure() {
        let state = scripted_state();
        let metrics = state.metrics();
        record_turn(&metrics, Ok(Route::Search), OutputMode::Buffered, Duration::from_millis(5));
        record_turn(&metrics, Err(()), OutputMode::Streamed, Duration::from_millis(5));

        assert_eq!(metrics.turns_count(Route::Search, OutputMode::Buffered), 1);
        assert_eq!(metrics.failures_count(OutputMode::Streamed), 1);
    }
}
