//! Health and metrics endpoint integration tests.
//!
//! Tests the operational endpoints using the `TestIdentityServer` harness.

use idr_test_utils::TestIdentityServer;

const UNREACHABLE_UPSTREAM: &str = "http://127.0.0.1:1/api/me";

/// Liveness does not depend on the upstream authority.
#[tokio::test]
async fn test_health_endpoint_returns_ok() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn(UNREACHABLE_UPSTREAM).await?;

    let response = reqwest::get(format!("{}/health", server.url())).await?;

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await?, "OK");

    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_returns_text() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn(UNREACHABLE_UPSTREAM).await?;

    let response = reqwest::get(format!("{}/metrics", server.url())).await?;

    assert_eq!(response.status(), 200);

    Ok(())
}

/// Test that non-existent routes return 404.
#[tokio::test]
async fn test_unknown_route_returns_404() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn(UNREACHABLE_UPSTREAM).await?;

    let response = reqwest::get(format!("{}/api/v1/nonexistent", server.url())).await?;

    assert_eq!(response.status(), 404);

    Ok(())
}

#[tokio::test]
async fn test_logout_rejects_get() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn(UNREACHABLE_UPSTREAM).await?;

    let response = reqwest::get(format!("{}/api/v1/auth/logout", server.url())).await?;

    assert_eq!(response.status(), 405);

    Ok(())
}
