//! Metrics definitions for the identity resolver.
//!
//! All metrics follow Prometheus naming conventions:
//! - `idr_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: 7 values max (GET, POST, PATCH, DELETE, PUT, HEAD, OPTIONS)
//! - `endpoint`: fixed route set, everything else is `/other`
//! - `status`: 3 values (success, error, timeout)
//! - `outcome`: bounded by `IdentityError` variants plus `resolved`
//! - `source`: 3 trust levels plus `none`
//! - `result`: hit, miss, expired
//! - `scope`: token, subject, all
//!
//! Token fingerprints and subjects are never used as labels.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("idr_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Upstream calls are bounded by the configured timeout (max 60s)
        .set_buckets_for_metric(
            Matcher::Prefix("idr_upstream_request".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000, 30.000,
            ],
        )
        .map_err(|e| format!("Failed to set upstream request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `idr_http_requests_total`, `idr_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("idr_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("idr_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Map a request path onto the fixed route set.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/metrics" => "/metrics",
        "/api/v1/me" => "/api/v1/me",
        "/api/v1/internal/me" => "/api/v1/internal/me",
        "/api/v1/auth/logout" => "/api/v1/auth/logout",
        "/api/v1/auth/sessions/reset" => "/api/v1/auth/sessions/reset",
        _ => "/other",
    }
}

// ============================================================================
// Resolution Metrics
// ============================================================================

/// Record the terminal outcome of one pipeline run.
///
/// Metric: `idr_identity_resolutions_total`
/// Labels: `outcome`, `source`
pub fn record_resolution(outcome: &'static str, source: &'static str) {
    counter!("idr_identity_resolutions_total",
        "outcome" => outcome,
        "source" => source
    )
    .increment(1);
}

/// Record a call to the upstream authority.
///
/// Metric: `idr_upstream_request_duration_seconds`
/// Labels: `status` (HTTP status code, or `error` / `timeout`)
pub fn record_upstream_request(status: &str, duration: Duration) {
    histogram!("idr_upstream_request_duration_seconds",
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a JWKS fetch attempt.
///
/// Metric: `idr_jwks_fetch_total`
/// Labels: `status` (success, error)
pub fn record_jwks_fetch(status: &'static str) {
    counter!("idr_jwks_fetch_total", "status" => status).increment(1);
}

// ============================================================================
// Cache Metrics
// ============================================================================

/// Metric: `idr_identity_cache_lookups_total`
/// Labels: `result` (hit, miss, expired)
pub fn record_cache_lookup(result: &'static str) {
    counter!("idr_identity_cache_lookups_total", "result" => result).increment(1);
}

/// Metric: `idr_identity_cache_entries`
pub fn set_cache_entries(count: usize) {
    gauge!("idr_identity_cache_entries").set(count as f64);
}

/// Metric: `idr_cache_invalidations_total`
/// Labels: `scope` (token, subject, all, expired)
pub fn record_cache_invalidation(scope: &'static str, removed: usize) {
    counter!("idr_cache_invalidations_total", "scope" => scope).increment(removed as u64);
}

// ============================================================================
// Tests
// ============================================================================
