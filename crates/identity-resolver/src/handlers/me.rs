//! Current user handlers.
//!
//! Thin wrappers over the resolution pipeline. The handler picks the
//! disclosure contract; everything else is the pipeline's decision.

use crate::errors::IdentityError;
use crate::identity::{DisclosureContract, Resolution, SourceTrust, INTERNAL, PUBLIC};
use crate::middleware::BearerToken;
use crate::routes::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::instrument;

/// Response header reporting whether the identity came from cache.
pub const IDENTITY_CACHE_HEADER: &str = "x-identity-cache";

/// Response for the `/me` endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    /// Disclosed identity fields.
    pub user: Map<String, Value>,

    /// False only for the degraded unverified-decode path.
    pub verified: bool,

    pub source: SourceTrust,

    pub cache_hit: bool,
}

impl From<Resolution> for MeResponse {
    fn from(resolution: Resolution) -> Self {
        Self {
            verified: resolution.identity.is_verified(),
            source: resolution.identity.source(),
            user: resolution.identity.fields().clone(),
            cache_hit: resolution.cache_hit,
        }
    }
}

/// Handler for GET /api/v1/me
///
/// ## Response
///
/// ```json
/// {
///   "user": { "id": "u_123", "email": "a@example.com", "role": "patient" },
///   "verified": true,
///   "source": "upstream",
///   "cache_hit": false
/// }
/// ```
#[instrument(skip_all, name = "idr.handlers.me")]
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    bearer: Option<Extension<BearerToken>>,
) -> Result<Response, IdentityError> {
    resolve_with(&state, bearer, PUBLIC).await
}

/// Handler for GET /api/v1/internal/me
///
/// Same shape as `/api/v1/me`, disclosed under the internal contract
/// (adds `alg`, `iss`, `aud`, `kid`).
#[instrument(skip_all, name = "idr.handlers.internal_me")]
pub async fn get_internal_me(
    State(state): State<Arc<AppState>>,
    bearer: Option<Extension<BearerToken>>,
) -> Result<Response, IdentityError> {
    resolve_with(&state, bearer, INTERNAL).await
}

async fn resolve_with(
    state: &AppState,
    bearer: Option<Extension<BearerToken>>,
    contract: DisclosureContract,
) -> Result<Response, IdentityError> {
    let cancel = state.shutdown.child_token();
    let token = bearer.as_ref().map(|Extension(bearer)| bearer.secret());

    let resolution = state.pipeline.resolve(token, contract, &cancel).await?;

    let status = StatusCode::from_u16(resolution.status).unwrap_or(StatusCode::OK);
    let cache = if resolution.cache_hit { "hit" } else { "miss" };
    tracing::debug!(target: "idr.handlers.me", contract = contract.name(), cache, "Returning identity");

    Ok((
        status,
        [(IDENTITY_CACHE_HEADER, cache)],
        Json(MeResponse::from(resolution)),
    )
        .into_response())
}
