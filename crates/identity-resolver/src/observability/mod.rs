//! Observability module for the identity resolver.
//!
//! Provides metrics definitions and the recorder bootstrap.

pub mod metrics;
