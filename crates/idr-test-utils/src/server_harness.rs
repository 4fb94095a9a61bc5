//! Test server harness for E2E testing
//!
//! Provides `TestIdentityServer` for spawning real identity resolver
//! instances in tests, wired to whatever upstream authority and key set the
//! test points it at (typically `wiremock` servers).

use identity_resolver::auth::{JwksRegistry, TokenVerifier};
use identity_resolver::cache::{CacheInvalidator, IdentityCache, TtlTiers};
use identity_resolver::config::Config;
use identity_resolver::identity::IdentityResolutionPipeline;
use identity_resolver::routes::{self, AppState};
use identity_resolver::services::HttpUpstreamAuthority;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Test harness for spawning the identity resolver in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_me_flow_e2e() -> Result<()> {
///     let upstream = MockServer::start().await;
///     let server = TestIdentityServer::spawn(&format!("{}/api/me", upstream.uri())).await?;
///
///     let response = reqwest::Client::new()
///         .get(format!("{}/api/v1/me", server.url()))
///         .bearer_auth("token")
///         .send()
///         .await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestIdentityServer {
    addr: SocketAddr,
    config: Config,
    cache: Arc<IdentityCache>,
    shutdown: CancellationToken,
    _handle: JoinHandle<()>,
}

impl TestIdentityServer {
    /// Spawn a server with no local trust source.
    pub async fn spawn(upstream_me_url: &str) -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(upstream_me_url, HashMap::new()).await
    }

    /// Spawn a server with extra configuration variables
    /// (`IDENTITY_JWKS_URL`, TTLs, ...).
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Use a Prometheus handle that is not installed globally
    /// - Start the HTTP server in the background
    pub async fn spawn_with_vars(
        upstream_me_url: &str,
        extra_vars: HashMap<String, String>,
    ) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("UPSTREAM_ME_URL".to_string(), upstream_me_url.to_string()),
            ("UPSTREAM_TIMEOUT_SECONDS".to_string(), "2".to_string()),
            ("JWKS_TIMEOUT_SECONDS".to_string(), "2".to_string()),
        ]);
        vars.extend(extra_vars);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let registry = Arc::new(JwksRegistry::new(config.jwks_timeout));
        let verifier = TokenVerifier::from_config(&config, registry)
            .map_err(|e| anyhow::anyhow!("Failed to create verifier: {}", e))?;
        let upstream =
            HttpUpstreamAuthority::new(config.upstream_me_url.clone(), config.upstream_timeout)
                .map_err(|e| anyhow::anyhow!("Failed to create upstream client: {}", e))?;

        let cache = Arc::new(IdentityCache::new());
        let pipeline = IdentityResolutionPipeline::new(
            cache.clone(),
            verifier,
            Arc::new(upstream),
            TtlTiers::from_config(&config),
            config.upstream_timeout,
        );

        let shutdown = CancellationToken::new();
        let state = Arc::new(AppState {
            config: config.clone(),
            pipeline: Arc::new(pipeline),
            invalidator: CacheInvalidator::new(cache.clone()),
            shutdown: shutdown.clone(),
        });

        // Global recorder may already be taken by another test in this process
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            cache,
            shutdown,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The server's identity cache, for asserting on entries directly.
    pub fn cache(&self) -> &Arc<IdentityCache> {
        &self.cache
    }
}

impl Drop for TestIdentityServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self._handle.abort();
    }
}
