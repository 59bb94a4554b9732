//! Telemetry module for authbridge
//!
//! Prometheus counters for token issuance, configuration changes and HTTP
//! requests. Counters are registered with the default registry on first use.

use crate::{AuthBridgeError, Result};
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, Opts, TextEncoder};

struct Metrics {
    tokens_total: IntCounterVec,
    config_changes_total: IntCounterVec,
    http_requests_total: IntCounterVec,
}

impl Metrics {
    fn register() -> std::result::Result<Self, prometheus::Error> {
        let metrics = Self {
            tokens_total: IntCounterVec::new(
                Opts::new("authbridge_tokens_total", "Signed tokens requested"),
                &["operation", "outcome"],
            )?,
            config_changes_total: IntCounterVec::new(
                Opts::new(
                    "authbridge_config_changes_total",
                    "Auth configuration updates and reloads",
                ),
                &["operation", "outcome"],
            )?,
            http_requests_total: IntCounterVec::new(
                Opts::new(
                    "authbridge_http_requests_total",
                    "Total number of HTTP requests received",
                ),
                &["handler", "code"],
            )?,
        };

        prometheus::register(Box::new(metrics.tokens_total.clone()))?;
        prometheus::register(Box::new(metrics.config_changes_total.clone()))?;
        prometheus::register(Box::new(metrics.http_requests_total.clone()))?;

        Ok(metrics)
    }
}

static METRICS: Lazy<std::result::Result<Metrics, prometheus::Error>> = Lazy::new(Metrics::register);

fn metrics() -> Option<&'static Metrics> {
    match METRICS.as_ref() {
        Ok(metrics) => Some(metrics),
        Err(e) => {
            tracing::warn!("Metrics unavailable: {}", e);
            None
        }
    }
}

fn outcome<T>(result: &Result<T>) -> &'static str {
    if result.is_ok() { "success" } else { "failure" }
}

/// Record a token creation or refresh
pub fn record_token<T>(operation: &str, result: &Result<T>) {
    if let Some(m) = metrics() {
        m.tokens_total
            .with_label_values(&[operation, outcome(result)])
            .inc();
    }
}

/// Record a configuration update or reload
pub fn record_config_change<T>(operation: &str, result: &Result<T>) {
    if let Some(m) = metrics() {
        m.config_changes_total
            .with_label_values(&[operation, outcome(result)])
            .inc();
    }
}

/// Record HTTP request metric
pub fn record_http_request(handler: &str, status_code: u16) {
    if let Some(m) = metrics() {
        m.http_requests_total
            .with_label_values(&[handler, &status_code.to_string()])
            .inc();
    }
}

/// Get Prometheus metrics in text format
pub fn get_metrics() -> Result<String> {
    if let Err(e) = METRICS.as_ref() {
        return Err(AuthBridgeError::config(format!(
            "Failed to register metrics: {}",
            e
        )));
    }

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| AuthBridgeError::config(format!("Failed to encode metrics: {}", e)))?;

    String::from_utf8(buffer)
        .map_err(|e| AuthBridgeError::config(format!("Failed to convert metrics to UTF-8: {}", e)))
}
