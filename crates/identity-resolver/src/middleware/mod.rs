//! Middleware for the identity resolver.
//!
//! # Components
//!
//! - `auth` - Bearer token capture for identity routes
//! - `http_metrics` - HTTP request metrics (outermost layer)

pub mod auth;
pub mod http_metrics;

pub use auth::{bearer_token, capture_bearer, BearerToken};
pub use http_metrics::http_metrics_middleware;
