//! Logout handlers.
//!
//! - `/api/v1/auth/logout`: the caller's token is known, so only its cache
//!   entry is dropped.
//! - `/api/v1/auth/sessions/reset`: no single token identifies what must go
//!   (password change, global sign-out), so the whole cache is cleared.
//!   Requires a verified identity; an unverified decode is never enough.

use crate::errors::IdentityError;
use crate::identity::PUBLIC;
use crate::middleware::BearerToken;
use crate::routes::AppState;
use axum::{extract::State, http::StatusCode, Extension};
use common::secret::ExposeSecret;
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /api/v1/auth/logout
///
/// Returns 204 whether or not an entry existed.
#[instrument(skip_all, name = "idr.handlers.logout")]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    bearer: Option<Extension<BearerToken>>,
) -> Result<StatusCode, IdentityError> {
    let Some(Extension(bearer)) = bearer else {
        return Err(IdentityError::MissingToken);
    };

    state
        .invalidator
        .invalidate_token(bearer.secret().expose_secret())
        .await;

    Ok(StatusCode::NO_CONTENT)
}

/// Handler for POST /api/v1/auth/sessions/reset
#[instrument(skip_all, name = "idr.handlers.sessions_reset")]
pub async fn reset_sessions(
    State(state): State<Arc<AppState>>,
    bearer: Option<Extension<BearerToken>>,
) -> Result<StatusCode, IdentityError> {
    let cancel = state.shutdown.child_token();
    let token = bearer.as_ref().map(|Extension(bearer)| bearer.secret());

    let resolution = state.pipeline.resolve(token, PUBLIC, &cancel).await?;
    if !resolution.identity.is_verified() {
        tracing::warn!(target: "idr.handlers.logout", "Session reset refused for unverified identity");
        return Err(IdentityError::Forbidden(
            "Verified identity required".to_string(),
        ));
    }

    state.invalidator.invalidate_all().await;

    Ok(StatusCode::NO_CONTENT)
}
