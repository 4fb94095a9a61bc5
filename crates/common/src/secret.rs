//! Secret types for keeping bearer tokens out of logs.
//!
//! Re-exports [`secrecy`] types. Every raw bearer token that crosses a
//! function boundary in the resolver is carried as a [`SecretString`], so a
//! derived `Debug` on any request or state struct stays safe to log.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct IncomingRequest {
//!     path: String,
//!     bearer: SecretString,
//! }
//!
//! let req = IncomingRequest {
//!     path: "/api/v1/me".to_string(),
//!     bearer: SecretString::from("eyJhbGciOi..."),
//! };
//!
//! // Debug output redacts the token.
//! assert!(!format!("{req:?}").contains("eyJhbGciOi"));
//!
//! // The raw value is only reachable through an explicit call.
//! let raw: &str = req.bearer.expose_secret();
//! assert!(raw.starts_with("eyJ"));
//! ```
//!
//! Call `expose_secret()` only where the raw value is consumed: hashing
//! into a cache fingerprint, signature verification, or the outgoing
//! `Authorization` header to the upstream authority.

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
