//! Identity Resolver
//!
//! Entry point for the "who am I" service: resolves bearer tokens to a
//! disclosed identity through the local verifier, the upstream authority,
//! and the identity cache.

use identity_resolver::auth::{JwksRegistry, TokenVerifier};
use identity_resolver::cache::{CacheInvalidator, IdentityCache, TtlTiers};
use identity_resolver::config::Config;
use identity_resolver::identity::IdentityResolutionPipeline;
use identity_resolver::observability::metrics::init_metrics_recorder;
use identity_resolver::routes::{self, AppState};
use identity_resolver::services::HttpUpstreamAuthority;
use identity_resolver::tasks::start_cache_sweeper;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "identity_resolver=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Identity Resolver");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        local_trust = ?config.local_trust,
        jwt_clock_skew_seconds = config.jwt_clock_skew_seconds,
        "Configuration loaded successfully"
    );

    // Prometheus recorder must be installed before any metric is recorded
    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics: {}", e);
        e
    })?;

    // Process-wide collaborators, built once and injected
    let jwks_registry = Arc::new(JwksRegistry::new(config.jwks_timeout));
    let verifier = TokenVerifier::from_config(&config, jwks_registry).map_err(|e| {
        error!("Failed to initialize token verifier: {}", e);
        e
    })?;
    if verifier.is_none() {
        warn!("No local trust source configured, every cache miss goes upstream");
    }

    let upstream = HttpUpstreamAuthority::new(config.upstream_me_url.clone(), config.upstream_timeout)
        .map_err(|e| {
            error!("Failed to initialize upstream client: {}", e);
            e
        })?;

    let cache = Arc::new(IdentityCache::new());
    let pipeline = IdentityResolutionPipeline::new(
        cache.clone(),
        verifier,
        Arc::new(upstream),
        TtlTiers::from_config(&config),
        config.upstream_timeout,
    );

    let shutdown_token = CancellationToken::new();

    // Optional memory-hygiene sweep
    let sweeper_handle = config.cache_sweep_interval.map(|interval| {
        tokio::spawn(start_cache_sweeper(
            cache.clone(),
            interval,
            shutdown_token.child_token(),
        ))
    });

    // Parse bind address before moving config
    let bind_address = config.bind_address.clone();
    let drain_secs = config.drain_seconds;

    let state = Arc::new(AppState {
        config,
        pipeline: Arc::new(pipeline),
        invalidator: CacheInvalidator::new(cache),
        shutdown: shutdown_token.clone(),
    });

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Identity Resolver listening on {}", addr);

    // Start server with graceful shutdown support
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_token.clone(), drain_secs))
    .await?;

    shutdown_token.cancel();
    if let Some(handle) = sweeper_handle {
        if let Err(e) = handle.await {
            warn!("Cache sweeper did not stop cleanly: {}", e);
        }
    }

    info!("Identity Resolver shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
///
/// Returns when a shutdown signal is received and the drain period is
/// complete. Resolutions still waiting on the upstream authority after the
/// drain are cancelled.
async fn shutdown_signal(shutdown_token: CancellationToken, drain_secs: u64) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    if drain_secs > 0 {
        warn!("Draining connections for {} seconds...", drain_secs);
        tokio::time::sleep(Duration::from_secs(drain_secs)).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (IDR_DRAIN_SECONDS=0)");
    }

    shutdown_token.cancel();
}
