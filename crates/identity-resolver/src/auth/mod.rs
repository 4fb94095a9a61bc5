//! Token verification.
//!
//! - `claims` - Claim set shared by the verifier and the unverified decoder
//! - `jwks` - Process-wide JWKS cache keyed by URL
//! - `verifier` - Local signature verification against the configured trust source
//! - `unverified` - Signature-less decode for the degraded path

pub mod claims;
pub mod jwks;
pub mod unverified;
pub mod verifier;

pub use claims::IdentityClaims;
pub use jwks::JwksRegistry;
pub use unverified::UnverifiedDecoder;
pub use verifier::{TokenVerifier, VerificationError, VerifierSettings};
