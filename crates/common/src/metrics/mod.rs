//! Metrics and observability utilities
//!
//! Records query, stage and collaborator metrics through the `metrics`
//! facade. No exporter is installed here; binaries decide where metrics go.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Switchyard metrics
pub const METRICS_PREFIX: &str = "switchyard";

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of processed queries"
    );

    describe_histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end query latency in seconds"
    );

    describe_counter!(
        format!("{}_stages_total", METRICS_PREFIX),
        Unit::Count,
        "Total workflow stage executions"
    );

    describe_histogram!(
        format!("{}_stage_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Workflow stage latency in seconds"
    );

    describe_counter!(
        format!("{}_collaborator_calls_total", METRICS_PREFIX),
        Unit::Count,
        "Total collaborator calls"
    );

    describe_histogram!(
        format!("{}_collaborator_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Collaborator call latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Helper to time one query end to end
pub struct QueryMetrics {
    start: Instant,
}

impl QueryMetrics {
    /// Start tracking a query
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Record query completion
    pub fn finish(self, route: &str, success: bool) -> u64 {
        let duration = self.start.elapsed();
        record_query(route, duration.as_secs_f64(), success);
        duration.as_millis() as u64
    }
}

/// Helper to record query metrics
pub fn record_query(route: &str, duration_secs: f64, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        "route" => route.to_string()
    )
    .record(duration_secs);
}

/// Helper to record stage metrics
pub fn record_stage(stage: &str, duration_secs: f64, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_stages_total", METRICS_PREFIX),
        "stage" => stage.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_stage_duration_seconds", METRICS_PREFIX),
        "stage" => stage.to_string()
    )
    .record(duration_secs);
}

/// Helper to record collaborator call metrics
pub fn record_collaborator(collaborator: &str, duration_secs: f64, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_collaborator_calls_total", METRICS_PREFIX),
        "collaborator" => collaborator.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_collaborator_duration_seconds", METRICS_PREFIX),
            "collaborator" => collaborator.to_string()
        )
        .record(duration_secs);
    }
}
