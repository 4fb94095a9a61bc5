//! Identity Resolver Library
//!
//! Resolves bearer tokens to a disclosed identity for the "who am I"
//! endpoints, with:
//!
//! - Local signature verification (JWKS or embedded public key)
//! - Confirmation and enrichment by the upstream identity authority
//! - A flagged, short-lived unverified decode while the authority is down
//! - A bounded per-token cache keyed by token fingerprint
//! - Per-endpoint field disclosure contracts
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> identity/pipeline.rs -> auth/*, cache/*, services/upstream.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Token verification and unverified decoding
//! - `cache` - Identity cache and invalidation handle
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `identity` - Resolution pipeline and disclosure contracts
//! - `middleware` - Bearer capture and HTTP metrics
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup
//! - `services` - Upstream authority client
//! - `tasks` - Background cache sweep

pub mod auth;
pub mod cache;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod observability;
pub mod routes;
pub mod services;
pub mod tasks;
