//! Cache sweeper background task.
//!
//! Periodically drops expired identity cache entries. Expiry is already
//! enforced at read time, so the sweep only bounds memory held by tokens
//! that are never presented again; it never changes what a lookup returns.
//!
//! # Graceful Shutdown
//!
//! The task supports graceful shutdown via a cancellation token. When the token
//! is cancelled, the task completes its current iteration and exits cleanly.

use crate::cache::IdentityCache;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Start the cache sweeper background task.
///
/// # Arguments
///
/// * `cache` - Shared identity cache
/// * `interval` - Time between sweeps
/// * `cancel_token` - Token for graceful shutdown
///
/// # Returns
///
/// Returns when the cancellation token is triggered.
#[instrument(skip_all, name = "idr.task.cache_sweeper")]
pub async fn start_cache_sweeper(
    cache: Arc<IdentityCache>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    info!(
        target: "idr.task.cache_sweeper",
        interval_secs = interval.as_secs(),
        "Starting cache sweeper task"
    );

    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately; nothing can have expired yet.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = cache.purge_expired().await;
                if removed > 0 {
                    debug!(
                        target: "idr.task.cache_sweeper",
                        removed,
                        "Purged expired identity cache entries"
                    );
                }
            }
            _ = cancel_token.cancelled() => {
                info!(
                    target: "idr.task.cache_sweeper",
                    "Cache sweeper task received shutdown signal, exiting"
                );
                break;
            }
        }
    }

    info!(target: "idr.task.cache_sweeper", "Cache sweeper task stopped");
}
