//! Prometheus metrics exposition
//!
//! The libraries emit through the `metrics` facade:
//!
//! - `denue_transport_requests_total` (counter): label `status`
//! - `denue_transport_retries_total` (counter)
//! - `denue_credentials_active` (gauge)
//! - `denue_credentials_retired_total` (counter)
//! - `denue_tasks_completed_total` (counter)
//! - `denue_task_failures_total` (counter): label `kind`
//!
//! A batch run has no scrape window, so the binary renders the registry to
//! a textfile once the run ends.

use std::path::Path;

use denue::RunSummary;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Record end-of-run totals as gauges.
pub fn record_summary(summary: &RunSummary) {
    metrics::gauge!("denue_run_tasks", "state" => "planned").set(summary.total as f64);
    metrics::gauge!("denue_run_tasks", "state" => "completed").set(summary.completed as f64);
    metrics::gauge!("denue_run_tasks", "state" => "failed").set(summary.failed as f64);
    metrics::gauge!("denue_run_cancelled").set(if summary.cancelled { 1.0 } else { 0.0 });
}

/// Write the Prometheus text exposition to `path`.
pub fn write_snapshot(handle: &PrometheusHandle, path: &Path) -> common::Result<()> {
    std::fs::write(path, handle.render()).map_err(|e| common::Error::io(path, e))
}
