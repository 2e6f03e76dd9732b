//! # Prometheus Metrics
//!
//! Operational metrics for the ledger node, scraped at `/metrics` on the
//! configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] with
//! the `gemledger` prefix so they do not collide with any default global
//! registry consumers.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use gemledger_contracts::{LedgerError, LedgerResult, Receipt};

/// Metric handles for the node. Clones share the same underlying series.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Invocations by contract function and outcome (`ok` or an error code).
    pub invocations_total: IntCounterVec,
    /// Commits rejected by optimistic concurrency, including retried ones.
    pub commit_conflicts_total: IntCounter,
    /// World-state version after the latest commit.
    pub last_commit_version: IntGauge,
    pub invocation_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("gemledger".into()), None)?;

        let invocations_total = IntCounterVec::new(
            Opts::new("invocations_total", "Contract invocations by function and outcome"),
            &["function", "outcome"],
        )?;
        registry.register(Box::new(invocations_total.clone()))?;

        let commit_conflicts_total = IntCounter::new(
            "commit_conflicts_total",
            "Commits rejected because a read key changed underneath the transaction",
        )?;
        registry.register(Box::new(commit_conflicts_total.clone()))?;

        let last_commit_version = IntGauge::new(
            "last_commit_version",
            "World-state version of the latest commit",
        )?;
        registry.register(Box::new(last_commit_version.clone()))?;

        let invocation_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "invocation_latency_seconds",
                "Invocation latency including commit and retries",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 1.0]),
        )?;
        registry.register(Box::new(invocation_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            invocations_total,
            commit_conflicts_total,
            last_commit_version,
            invocation_latency_seconds,
        })
    }

    /// Record one finished invocation.
    ///
    /// `retries` is the number of runs beyond the first, each of which was
    /// caused by a conflict.
    pub fn record<T>(
        &self,
        function: &str,
        result: &LedgerResult<T>,
        retries: u32,
        elapsed: Duration,
    ) {
        let outcome = match result {
            Ok(_) => "ok",
            Err(e) => e.code(),
        };
        // Caller-chosen names must not mint new series.
        let function = match result {
            Err(LedgerError::UnknownFunction(_)) => "unknown",
            _ => function,
        };
        self.invocations_total.with_label_values(&[function, outcome]).inc();
        let final_conflict = matches!(result, Err(e) if e.is_retryable());
        self.commit_conflicts_total
            .inc_by(u64::from(retries) + u64::from(final_conflict));
        self.invocation_latency_seconds.observe(elapsed.as_secs_f64());
    }

    pub fn set_version(&self, version: u64) {
        self.last_commit_version.set(i64::try_from(version).unwrap_or(i64::MAX));
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Conflicting runs before the final outcome of a submission.
pub fn retries_for(result: &LedgerResult<Receipt>, max_attempts: u32) -> u32 {
    match result {
        Ok(receipt) => receipt.attempts.saturating_sub(1),
        Err(e) if e.is_retryable() => max_attempts.saturating_sub(1),
        Err(_) => 0,
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
