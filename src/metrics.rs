//! Prometheus metrics collection for chatroute
//!
//! This module tracks:
//! - Completed turns by route and output mode
//! - Failed turns by output mode
//! - Turn latency by output mode
//!
//! Metrics are exposed via the `/metrics` endpoint in Prometheus text format.
//! Label values come from [`Route`] and [`OutputMode`], so cardinality is
//! fixed at compile time (2 routes x 2 modes).

use crate::pipeline::OutputMode;
use crate::router::Route;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Metrics collector for chatroute
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    turns_total: IntCounterVec,
    turn_failures: IntCounterVec,
    turn_duration: HistogramVec,
}

impl Metrics {
    /// Create a new Metrics instance
    ///
    /// Registers all metrics with a new Prometheus registry.
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g., duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let turns_total = IntCounterVec::new(
            Opts::new(
                "chatroute_turns_total",
                "Completed chat turns by route and output mode",
            ),
            &["route", "mode"],
        )?;

        let turn_failures = IntCounterVec::new(
            Opts::new(
                "chatroute_turn_failures_total",
                "Chat turns that ended with an error, by output mode",
            ),
            &["mode"],
        )?;

        // Turns include up to three provider round trips
        let turn_duration = HistogramVec::new(
            HistogramOpts::new(
                "chatroute_turn_duration_ms",
                "End-to-end turn latency in milliseconds",
            )
            .buckets(vec![
                50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0, 60000.0,
            ]),
            &["mode"],
        )?;

        registry.register(Box::new(turns_total.clone()))?;
        registry.register(Box::new(turn_failures.clone()))?;
        registry.register(Box::new(turn_duration.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            turns_total,
            turn_failures,
            turn_duration,
        })
    }

    /// Count one completed turn
    pub fn record_turn(&self, route: Route, mode: OutputMode) -> Result<(), prometheus::Error> {
        self.turns_total
            .get_metric_with_label_values(&[route.as_str(), mode.as_str()])?
            .inc();
        Ok(())
    }

    /// Count one failed turn
    pub fn record_failure(&self, mode: OutputMode) -> Result<(), prometheus::Error> {
        self.turn_failures
            .get_metric_with_label_values(&[mode.as_str()])?
            .inc();
        Ok(())
    }

    /// Observe a turn's latency
    pub fn record_duration(&self, mode: OutputMode, duration_ms: f64) -> Result<(), prometheus::Error> {
        self.turn_duration
            .get_metric_with_label_values(&[mode.as_str()])?
            .observe(duration_ms);
        Ok(())
    }

    /// Number of completed turns recorded for `route` and `mode`
    pub fn turns_count(&self, route: Route, mode: OutputMode) -> u64 {
        self.turns_total
            .get_metric_with_label_values(&[route.as_str(), mode.as_str()])
            .map(|c| c.get())
            .unwrap_or(0)
    }

    pub fn failures_count(&self, mode: OutputMode) -> u64 {
        self.turn_failures
            .get_metric_with_label_values(&[mode.as_str()])
            .map(|c| c.get())
            .unwrap_or(0)
    }

    /// Encode every registered metric in Prometheus text format
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();

        tracing::debug!(
            metric_family_count = metric_families.len(),
            "Encoding metrics to Prometheus text format"
        );

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|e| {
                tracing::error!(error = %e, "Prometheus text encoder failed");
                e
            })?;

        String::from_utf8(buffer).map_err(|e| {
            prometheus::Error::Msg(format!("Metrics output is not valid UTF-8: {}", e))
        })
    }
}
