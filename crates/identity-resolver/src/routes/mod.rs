//! HTTP routes for the identity resolver.
//!
//! Defines the Axum router and application state.

use crate::cache::CacheInvalidator;
use crate::config::Config;
use crate::handlers;
use crate::identity::IdentityResolutionPipeline;
use crate::middleware::{capture_bearer, http_metrics_middleware};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Identity resolution pipeline (owns the cache handle for reads/writes).
    pub pipeline: Arc<IdentityResolutionPipeline>,

    /// Removal-only handle over the identity cache for logout flows.
    pub invalidator: CacheInvalidator,

    /// Process shutdown signal. Parent of every per-request cancellation token.
    pub shutdown: CancellationToken,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe (simple "OK") - public, unversioned
/// - `/metrics` - Prometheus metrics endpoint - public, unversioned
/// - `/api/v1/me` - Identity under the public contract
/// - `/api/v1/internal/me` - Identity under the internal contract
/// - `/api/v1/auth/logout` - Forget the caller's token
/// - `/api/v1/auth/sessions/reset` - Forget every cached identity
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    // Operational routes
    let public_routes = Router::new().route("/health", get(handlers::health_check));

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Identity routes (bearer token captured, never validated by middleware)
    let identity_routes = Router::new()
        .route("/api/v1/me", get(handlers::get_me))
        .route("/api/v1/internal/me", get(handlers::get_internal_me))
        .route("/api/v1/auth/logout", post(handlers::logout))
        .route("/api/v1/auth/sessions/reset", post(handlers::reset_sessions))
        .route_layer(middleware::from_fn(capture_bearer))
        .with_state(state);

    // Merge routes and apply global middleware layers
    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(identity_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::cache::{IdentityCache, TtlTiers};
    use crate::services::upstream::mock::MockUpstreamAuthority;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use tower::ServiceExt;

    #[test]
    fn test_app_state_is_clone() {
        // This test verifies that AppState implements Clone,
        // which is required for Axum's State extractor.
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    fn test_config() -> Config {
        let vars = HashMap::from([(
            "UPSTREAM_ME_URL".to_string(),
            "http://upstream.invalid/api/me".to_string(),
        )]);
        Config::from_vars(&vars).unwrap()
    }

    fn app(upstream: MockUpstreamAuthority) -> (Router, Arc<IdentityCache>) {
        let cache = Arc::new(IdentityCache::new());
        let pipeline = IdentityResolutionPipeline::new(
            cache.clone(),
            None,
            Arc::new(upstream),
            TtlTiers::default(),
            Duration::from_secs(2),
        );
        let state = Arc::new(AppState {
            config: test_config(),
            pipeline: Arc::new(pipeline),
            invalidator: CacheInvalidator::new(cache.clone()),
            shutdown: CancellationToken::new(),
        });
        let handle = PrometheusBuilder::new().build_recorder().handle();
        (build_routes(state, handle), cache)
    }

    fn request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_route() {
        let (app, _) = app(MockUpstreamAuthority::not_found());
        let response = app.oneshot(request("GET", "/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_me_miss_then_hit() {
        let (app, _) = app(MockUpstreamAuthority::identity(
            json!({"data": {"id": "u1", "email": "u1@example.com", "ssn": "x"}}),
        ));

        let first = app
            .clone()
            .oneshot(request("GET", "/api/v1/me", Some("opaque")))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers().get("x-identity-cache").unwrap(), "miss");
        let body = json_body(first).await;
        assert_eq!(body["user"], json!({"id": "u1", "email": "u1@example.com"}));
        assert_eq!(body["verified"], json!(true));
        assert_eq!(body["source"], json!("upstream"));
        assert_eq!(body["cache_hit"], json!(false));

        let second = app
            .oneshot(request("GET", "/api/v1/me", Some("opaque")))
            .await
            .unwrap();
        assert_eq!(second.headers().get("x-identity-cache").unwrap(), "hit");
        assert_eq!(json_body(second).await["cache_hit"], json!(true));
    }

    #[tokio::test]
    async fn test_me_without_token_is_401() {
        let (app, _) = app(MockUpstreamAuthority::identity(json!({"id": "u1"})));
        let response = app
            .oneshot(request("GET", "/api/v1/me", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key("www-authenticate"));
        assert_eq!(json_body(response).await["error"]["code"], "MISSING_TOKEN");
    }

    #[tokio::test]
    async fn test_upstream_rejection_passes_through() {
        let (app, _) = app(MockUpstreamAuthority::rejecting(403));
        let response = app
            .oneshot(request("GET", "/api/v1/internal/me", Some("revoked")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_logout_routes() {
        let (app, cache) = app(MockUpstreamAuthority::identity(json!({"id": "u1"})));

        for token in ["t1", "t2"] {
            app.clone()
                .oneshot(request("GET", "/api/v1/me", Some(token)))
                .await
                .unwrap();
        }
        assert_eq!(cache.stats().await.size, 2);

        let logout = app
            .clone()
            .oneshot(request("POST", "/api/v1/auth/logout", Some("t1")))
            .await
            .unwrap();
        assert_eq!(logout.status(), StatusCode::NO_CONTENT);
        assert_eq!(cache.stats().await.size, 1);

        let anonymous = app
            .clone()
            .oneshot(request("POST", "/api/v1/auth/logout", None))
            .await
            .unwrap();
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let reset = app
            .oneshot(request("POST", "/api/v1/auth/sessions/reset", Some("t2")))
            .await
            .unwrap();
        assert_eq!(reset.status(), StatusCode::NO_CONTENT);
        assert_eq!(cache.stats().await.size, 0);
    }

    #[tokio::test]
    async fn test_metrics_route_renders() {
        let (app, _) = app(MockUpstreamAuthority::not_found());
        let response = app
            .oneshot(request("GET", "/metrics", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
