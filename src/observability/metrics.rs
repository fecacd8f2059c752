//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define pipeline metrics (requests, lookups, rolls, batches)
//! - Expose Prometheus-compatible text via `GET /metrics`
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, route, status
//! - `http_request_duration_seconds` (histogram): latency distribution
//! - `die_list_requests_total`, `die_specifications_requested_total`,
//!   `die_specifications_loaded`: specification store
//! - `die_service_requests_total`, `die_service_request_duration_seconds`:
//!   engine lookups against the store
//! - `dice_rolls_total`, `dice_roll_value`: single rolls
//! - `batch_rolls_total`, `batch_roll_size`, `batch_roll_duration_seconds`,
//!   `batch_rolls_in_progress`: concurrent batches
//! - `frontend_requests_total`, `backend_requests_total`,
//!   `backend_request_duration_seconds`, `batch_roll_requests_total`: gateway
//!
//! # Design Decisions
//! - Call sites use these helpers, never raw metric names
//! - Without an installed recorder every helper is a no-op

use std::time::{Duration, Instant};

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
const LOOKUP_BUCKETS: &[f64] = &[0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0];
const ROLL_VALUE_BUCKETS: &[f64] = &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
const BATCH_SIZE_BUCKETS: &[f64] = &[1.0, 2.0, 3.0, 5.0, 10.0, 15.0, 20.0];
const BATCH_DURATION_BUCKETS: &[f64] = &[0.1, 0.25, 0.5, 0.75, 1.0, 1.5, 2.0, 3.0, 5.0];

/// Install the Prometheus recorder and return the handle used to render it.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full("http_request_duration_seconds".into()), LATENCY_BUCKETS)?
        .set_buckets_for_metric(Matcher::Full("die_service_request_duration_seconds".into()), LOOKUP_BUCKETS)?
        .set_buckets_for_metric(Matcher::Full("dice_roll_value".into()), ROLL_VALUE_BUCKETS)?
        .set_buckets_for_metric(Matcher::Full("batch_roll_size".into()), BATCH_SIZE_BUCKETS)?
        .set_buckets_for_metric(Matcher::Full("batch_roll_duration_seconds".into()), BATCH_DURATION_BUCKETS)?
        .set_buckets_for_metric(Matcher::Full("backend_request_duration_seconds".into()), BATCH_DURATION_BUCKETS)?
        .install_recorder()?;

    tracing::info!("Prometheus recorder installed");
    Ok(handle)
}

// --- HTTP ---

pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    let duration = start.elapsed().as_secs_f64();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_owned(),
        "route" => route.to_owned(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_owned(),
        "route" => route.to_owned()
    )
    .record(duration);
}

/// `die_type`/`identifier` label for dice that were never resolved. Caller
/// supplied names only become label values once they are known to exist.
pub const UNRESOLVED_DIE: &str = "unresolved";

// --- Specification store ---

pub fn record_spec_list() {
    metrics::counter!("die_list_requests_total").increment(1);
}

pub fn record_spec_requested(identifier: &str) {
    metrics::counter!("die_specifications_requested_total", "identifier" => identifier.to_owned()).increment(1);
}

pub fn record_specs_loaded(count: usize) {
    metrics::gauge!("die_specifications_loaded").set(count as f64);
}

// --- Roll engine ---

/// Record one outbound specification lookup and its outcome label.
pub fn record_lookup(identifier: &str, status: &'static str, duration: Duration) {
    metrics::counter!(
        "die_service_requests_total",
        "identifier" => identifier.to_owned(),
        "status" => status
    )
    .increment(1);
    metrics::histogram!("die_service_request_duration_seconds").record(duration.as_secs_f64());
}

/// Record a single roll. `value` is present only on success.
pub fn record_roll(die: &str, value: Option<u32>) {
    let result = if value.is_some() { "success" } else { "error" };
    metrics::counter!("dice_rolls_total", "die_type" => die.to_owned(), "result" => result).increment(1);
    if let Some(v) = value {
        metrics::histogram!("dice_roll_value", "die_type" => die.to_owned()).record(f64::from(v));
    }
}

pub fn record_batch(die: &str, success: bool, size: usize, duration: Duration) {
    let result = if success { "success" } else { "error" };
    metrics::counter!("batch_rolls_total", "die_type" => die.to_owned(), "result" => result).increment(1);
    metrics::histogram!("batch_roll_size").record(size as f64);
    metrics::histogram!("batch_roll_duration_seconds").record(duration.as_secs_f64());
}

/// Keeps `batch_rolls_in_progress` raised for the lifetime of a trial.
#[derive(Debug)]
pub struct TrialInProgress(());

impl TrialInProgress {
    pub fn enter() -> Self {
        metrics::gauge!("batch_rolls_in_progress").increment(1.0);
        Self(())
    }
}

impl Drop for TrialInProgress {
    fn drop(&mut self) {
        metrics::gauge!("batch_rolls_in_progress").decrement(1.0);
    }
}

// --- Gateway ---

pub fn record_frontend(die: &str, status: &'static str) {
    metrics::counter!("frontend_requests_total", "die_type" => die.to_owned(), "status" => status).increment(1);
}

/// Record a gateway → engine call. `status_code` is "timeout" or
/// "connection_error" when no response arrived.
pub fn record_backend(die: &str, status_code: String, duration: Duration) {
    metrics::counter!(
        "backend_requests_total",
        "die_type" => die.to_owned(),
        "status_code" => status_code
    )
    .increment(1);
    metrics::histogram!("backend_request_duration_seconds", "die_type" => die.to_owned())
        .record(duration.as_secs_f64());
}

pub fn record_batch_request(batch_size: usize) {
    metrics::counter!("batch_roll_requests_total", "batch_size" => batch_size.to_string()).increment(1);
}
