//! # Identity Resolver Test Utilities
//!
//! Shared test utilities for the identity resolver.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (fixed Ed25519 keys for reproducible tests)
//! - Test data builders (`TestTokenBuilder`)
//! - Server test harness (`TestIdentityServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use idr_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let keypair = TestKeypair::new(1, "key-1");
//!
//!     let token = TestTokenBuilder::new("alice")
//!         .email("alice@example.com")
//!         .role("admin")
//!         .sign(&keypair);
//! }
//! ```

pub mod crypto_fixtures;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use server_harness::*;
pub use token_builders::*;
