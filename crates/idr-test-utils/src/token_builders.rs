//! Builder patterns for test data construction
//!
//! Provides a fluent API for creating identity tokens.

use crate::crypto_fixtures::TestKeypair;
use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

/// Builder for test identity tokens.
///
/// Defaults to a token issued now that expires in one hour.
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new("alice")
///     .email("alice@example.com")
///     .role("admin")
///     .expires_in(600)
///     .sign(&keypair);
/// ```
pub struct TestTokenBuilder {
    sub: String,
    exp: i64,
    iat: i64,
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    pub fn new(subject: &str) -> Self {
        let now = Utc::now();
        Self {
            sub: subject.to_string(),
            exp: (now + Duration::seconds(3600)).timestamp(),
            iat: now.timestamp(),
            claims: Map::new(),
        }
    }

    pub fn email(self, email: &str) -> Self {
        self.claim("email", json!(email))
    }

    pub fn role(self, role: &str) -> Self {
        self.claim("role", json!(role))
    }

    pub fn name(self, name: &str) -> Self {
        self.claim("name", json!(name))
    }

    pub fn issuer(self, iss: &str) -> Self {
        self.claim("iss", json!(iss))
    }

    pub fn audience(self, aud: &str) -> Self {
        self.claim("aud", json!(aud))
    }

    /// Add any other claim (`phone`, custom claims, ...).
    pub fn claim(mut self, key: &str, value: Value) -> Self {
        self.claims.insert(key.to_string(), value);
        self
    }

    /// Set expiration in seconds from now
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Set expiration as an absolute Unix timestamp
    pub fn expires_at(mut self, timestamp: i64) -> Self {
        self.exp = timestamp;
        self
    }

    /// Set issued-at timestamp
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = timestamp;
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        let mut claims = self.claims;
        claims.insert("sub".to_string(), json!(self.sub));
        claims.insert("exp".to_string(), json!(self.exp));
        claims.insert("iat".to_string(), json!(self.iat));
        Value::Object(claims)
    }

    /// Build and sign with the given keypair.
    pub fn sign(self, keypair: &TestKeypair) -> String {
        keypair.sign_json(&self.build())
    }
}
