//! Common utilities shared across the identity resolver crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (size limits, segment decoding, iat validation)
pub mod jwt;
