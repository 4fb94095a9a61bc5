//! Service layer for the identity resolver.
//!
//! This module contains clients for external systems.
//!
//! # Components
//!
//! - `upstream` - HTTP client for the upstream "who am I" authority

pub mod upstream;

pub use upstream::{HttpUpstreamAuthority, UpstreamAuthority, UpstreamError, UpstreamResponse};
