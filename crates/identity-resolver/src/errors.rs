//! Identity resolver error types.
//!
//! All errors map to stable HTTP status codes via the `IntoResponse` impl.
//! Messages returned to clients are generic so that neither verification
//! detail nor upstream internals leak. Actual causes are logged server-side
//! where they are detected.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Terminal outcome of an identity resolution or invalidation request.
///
/// Maps to HTTP status codes:
/// - MissingToken, SignatureInvalid, VerificationInconclusive: 401 Unauthorized
/// - UpstreamRejected: the authority's 401/403, verbatim
/// - UpstreamNotImplemented: 501 Not Implemented
/// - UpstreamUnavailable, DecodeFailed, Cancelled: 503 Service Unavailable
/// - UpstreamFailed: the authority's status (502 for an unusable body)
/// - Forbidden: 403 Forbidden
/// - Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Token signature is invalid")]
    SignatureInvalid,

    /// The token could not be verified and no fallback can vouch for it,
    /// e.g. the upstream is unreachable and the token has already expired.
    #[error("Token could not be verified")]
    VerificationInconclusive,

    #[error("Upstream authority rejected the token with status {0}")]
    UpstreamRejected(u16),

    #[error("Upstream authority does not implement the identity endpoint")]
    UpstreamNotImplemented,

    #[error("Upstream authority is unavailable")]
    UpstreamUnavailable,

    #[error("Token could not be decoded while upstream authority is unavailable")]
    DecodeFailed,

    #[error("Upstream authority failed with status {0}")]
    UpstreamFailed(u16),

    #[error("Resolution was cancelled")]
    Cancelled,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal server error")]
    Internal,
}

impl IdentityError {
    /// Returns the HTTP status code for this error (also used for metrics).
    pub fn status_code(&self) -> u16 {
        match self {
            IdentityError::MissingToken
            | IdentityError::SignatureInvalid
            | IdentityError::VerificationInconclusive => 401,
            IdentityError::UpstreamRejected(status) => *status,
            IdentityError::UpstreamNotImplemented => 501,
            IdentityError::UpstreamUnavailable
            | IdentityError::DecodeFailed
            | IdentityError::Cancelled => 503,
            IdentityError::UpstreamFailed(status) => *status,
            IdentityError::Forbidden(_) => 403,
            IdentityError::Internal => 500,
        }
    }

    /// Short label for metrics and logs.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            IdentityError::MissingToken => "missing_token",
            IdentityError::SignatureInvalid => "signature_invalid",
            IdentityError::VerificationInconclusive => "verification_inconclusive",
            IdentityError::UpstreamRejected(_) => "upstream_rejected",
            IdentityError::UpstreamNotImplemented => "upstream_not_implemented",
            IdentityError::UpstreamUnavailable => "upstream_unavailable",
            IdentityError::DecodeFailed => "decode_failed",
            IdentityError::UpstreamFailed(_) => "upstream_failed",
            IdentityError::Cancelled => "cancelled",
            IdentityError::Forbidden(_) => "forbidden",
            IdentityError::Internal => "internal",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for IdentityError {
    fn into_response(self) -> Response {
        let (code, message) = match &self {
            IdentityError::MissingToken => ("MISSING_TOKEN", "Missing bearer token".to_string()),
            IdentityError::SignatureInvalid | IdentityError::VerificationInconclusive => (
                "INVALID_TOKEN",
                "The access token is invalid or expired".to_string(),
            ),
            IdentityError::UpstreamRejected(_) => (
                "UPSTREAM_REJECTED",
                "The access token was rejected".to_string(),
            ),
            IdentityError::UpstreamNotImplemented => (
                "NOT_IMPLEMENTED",
                "Identity endpoint is not implemented upstream".to_string(),
            ),
            IdentityError::UpstreamUnavailable | IdentityError::DecodeFailed => (
                "UPSTREAM_UNAVAILABLE",
                "Identity service temporarily unavailable".to_string(),
            ),
            IdentityError::UpstreamFailed(status) => {
                tracing::warn!(target: "idr.errors", status = status, "Upstream failure surfaced to caller");
                ("UPSTREAM_ERROR", "Identity service error".to_string())
            }
            IdentityError::Cancelled => ("CANCELLED", "Request was cancelled".to_string()),
            IdentityError::Forbidden(reason) => ("FORBIDDEN", reason.clone()),
            IdentityError::Internal => (
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) =
                "Bearer realm=\"identity-resolver\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(IdentityError::MissingToken.status_code(), 401);
        assert_eq!(IdentityError::SignatureInvalid.status_code(), 401);
        assert_eq!(IdentityError::VerificationInconclusive.status_code(), 401);
        assert_eq!(IdentityError::UpstreamRejected(401).status_code(), 401);
        assert_eq!(IdentityError::UpstreamRejected(403).status_code(), 403);
        assert_eq!(IdentityError::UpstreamNotImplemented.status_code(), 501);
        assert_eq!(IdentityError::UpstreamUnavailable.status_code(), 503);
        assert_eq!(IdentityError::DecodeFailed.status_code(), 503);
        assert_eq!(IdentityError::UpstreamFailed(502).status_code(), 502);
        assert_eq!(IdentityError::Cancelled.status_code(), 503);
        assert_eq!(IdentityError::Forbidden("x".to_string()).status_code(), 403);
        assert_eq!(IdentityError::Internal.status_code(), 500);
    }

    #[tokio::test]
    async fn test_into_response_signature_invalid_is_generic() {
        let response = IdentityError::SignatureInvalid.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let www_auth = response.headers().get("WWW-Authenticate").unwrap();
        assert!(www_auth
            .to_str()
            .unwrap()
            .contains("Bearer realm=\"identity-resolver\""));

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "INVALID_TOKEN");
        assert_eq!(
            body_json["error"]["message"],
            "The access token is invalid or expired"
        );
    }

    #[tokio::test]
    async fn test_into_response_missing_token() {
        let response = IdentityError::MissingToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "MISSING_TOKEN");
    }

    #[tokio::test]
    async fn test_into_response_upstream_rejection_is_verbatim() {
        let response = IdentityError::UpstreamRejected(403).into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        // Not a 401, so no challenge header
        assert!(response.headers().get("WWW-Authenticate").is_none());

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "UPSTREAM_REJECTED");
    }

    #[tokio::test]
    async fn test_into_response_not_implemented() {
        let response = IdentityError::UpstreamNotImplemented.into_response();
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "NOT_IMPLEMENTED");
    }

    #[tokio::test]
    async fn test_into_response_decode_failed_reads_as_connectivity() {
        let response = IdentityError::DecodeFailed.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "UPSTREAM_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_into_response_upstream_failed_passes_status() {
        let response = IdentityError::UpstreamFailed(500).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "UPSTREAM_ERROR");
        assert_eq!(body_json["error"]["message"], "Identity service error");
    }

    #[tokio::test]
    async fn test_into_response_internal() {
        let response = IdentityError::Internal.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(body_json["error"]["message"], "An internal error occurred");
    }
}
