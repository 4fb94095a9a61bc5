//! Bearer token capture for identity routes.
//!
//! Extracts the Bearer token from the Authorization header and stores it in
//! request extensions. Nothing is validated here: whether a token is
//! acceptable is decided by the resolution pipeline, and a missing token is
//! reported by the handler that needed one.

use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use common::secret::SecretString;
use std::sync::Arc;

/// Raw bearer credential of the current request.
#[derive(Clone)]
pub struct BearerToken(Arc<SecretString>);

impl BearerToken {
    pub fn secret(&self) -> &SecretString {
        &self.0
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken([REDACTED])")
    }
}

/// Read `Authorization: Bearer <token>`.
///
/// Returns `None` for a missing header, a non-Bearer scheme, or an empty
/// token.
pub fn bearer_token(headers: &HeaderMap) -> Option<SecretString> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(SecretString::from(token))
}

/// Middleware that stores the request's [`BearerToken`], if any, in request
/// extensions for downstream handlers.
pub async fn capture_bearer(mut req: Request, next: Next) -> Response {
    match bearer_token(req.headers()) {
        Some(token) => {
            req.extensions_mut().insert(BearerToken(Arc::new(token)));
        }
        None => {
            tracing::debug!(target: "idr.middleware.auth", "No usable Bearer credential");
        }
    }

    next.run(req).await
}
