//! Process-wide JWKS registry.
//!
//! Fetches JSON Web Key Sets on demand and keeps them for the life of the
//! process, one entry per distinct JWKS URL. Sets do not expire. When a
//! token names a `kid` the cached set does not contain, the set is fetched
//! again, at most once per URL per [`MIN_REFRESH_INTERVAL`], so that
//! rotated keys are picked up without letting garbage `kid` values drive
//! unbounded traffic to the issuer. A failed fetch is throttled the same
//! way, so a dead endpoint costs one fetch timeout per window rather than
//! one per request.
//!
//! The registry is constructed once at startup and injected wherever a
//! verifier needs it.

use crate::observability::metrics::record_jwks_fetch;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::instrument;

/// Minimum time between two fetches of the same URL.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Default hard timeout for a single JWKS fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JwksError {
    /// The key set could not be fetched or parsed.
    #[error("Key set unavailable: {0}")]
    Unavailable(String),

    /// The key set is available but holds no usable key for the token.
    #[error("Signing key not found in key set")]
    KeyNotFound,
}

struct CachedKeySet {
    /// `None` until the first successful fetch.
    keys: Option<JwkSet>,
    /// Last fetch attempt, successful or not. Drives refetch throttling.
    last_attempt: Instant,
}

/// Registry of remote key sets keyed by URL.
pub struct JwksRegistry {
    http_client: reqwest::Client,
    fetch_timeout: Duration,
    min_refresh_interval: Duration,
    sets: RwLock<HashMap<String, CachedKeySet>>,
    /// Serializes fetches so concurrent misses do not stampede the issuer.
    refresh_lock: Mutex<()>,
}

impl JwksRegistry {
    pub fn new(fetch_timeout: Duration) -> Self {
        Self::with_refresh_interval(fetch_timeout, MIN_REFRESH_INTERVAL)
    }

    /// Create a registry with a custom refetch throttle.
    pub fn with_refresh_interval(fetch_timeout: Duration, min_refresh_interval: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "idr.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            http_client,
            fetch_timeout,
            min_refresh_interval,
            sets: RwLock::new(HashMap::new()),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Find the key for `kid` in the set published at `url`.
    ///
    /// A token without a `kid` matches only a set holding exactly one key.
    ///
    /// # Errors
    ///
    /// Returns `JwksError::Unavailable` if the set cannot be fetched.
    /// Returns `JwksError::KeyNotFound` if no key matches, including when a
    /// refetch is suppressed by the throttle.
    #[instrument(skip(self), fields(kid = ?kid))]
    pub async fn get_key(&self, url: &str, kid: Option<&str>) -> Result<Jwk, JwksError> {
        if let Some(lookup) = self.lookup_cached(url, kid).await {
            return lookup;
        }

        let _guard = self.refresh_lock.lock().await;

        // Another task may have refreshed while we waited
        if let Some(lookup) = self.lookup_cached(url, kid).await {
            return lookup;
        }

        self.refresh(url).await?;

        let sets = self.sets.read().await;
        match sets
            .get(url)
            .and_then(|cached| cached.keys.as_ref())
            .and_then(|keys| select_key(keys, kid))
        {
            Some(key) => Ok(key.clone()),
            None => {
                tracing::warn!(target: "idr.auth.jwks", kid = ?kid, "Key not found in JWKS after refresh");
                Err(JwksError::KeyNotFound)
            }
        }
    }

    /// Answer from the cache if possible.
    ///
    /// Returns `None` when a fetch is needed: nothing attempted yet, or the
    /// key is missing and the throttle window has passed.
    async fn lookup_cached(&self, url: &str, kid: Option<&str>) -> Option<Result<Jwk, JwksError>> {
        let sets = self.sets.read().await;
        let cached = sets.get(url)?;

        if let Some(key) = cached.keys.as_ref().and_then(|keys| select_key(keys, kid)) {
            tracing::debug!(target: "idr.auth.jwks", "JWKS cache hit");
            return Some(Ok(key.clone()));
        }

        if cached.last_attempt.elapsed() < self.min_refresh_interval {
            return Some(match cached.keys {
                Some(_) => {
                    tracing::debug!(target: "idr.auth.jwks", kid = ?kid, "Unknown kid, refetch throttled");
                    Err(JwksError::KeyNotFound)
                }
                None => {
                    tracing::debug!(target: "idr.auth.jwks", "Recent JWKS fetch failed, refetch throttled");
                    Err(JwksError::Unavailable("recent fetch failed".to_string()))
                }
            });
        }

        None
    }

    async fn refresh(&self, url: &str) -> Result<(), JwksError> {
        let result = self.fetch(url).await;

        let mut sets = self.sets.write().await;
        match result {
            Ok(keys) => {
                tracing::info!(
                    target: "idr.auth.jwks",
                    key_count = keys.keys.len(),
                    "JWKS cache refreshed"
                );
                record_jwks_fetch("success");
                sets.insert(
                    url.to_string(),
                    CachedKeySet {
                        keys: Some(keys),
                        last_attempt: Instant::now(),
                    },
                );
                Ok(())
            }
            Err(e) => {
                record_jwks_fetch("error");
                // Keep serving the previous set, if any, but throttle the next attempt
                sets
                    .entry(url.to_string())
                    .and_modify(|cached| cached.last_attempt = Instant::now())
                    .or_insert_with(|| CachedKeySet {
                        keys: None,
                        last_attempt: Instant::now(),
                    });
                Err(e)
            }
        }
    }

    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<JwkSet, JwksError> {
        tracing::debug!(target: "idr.auth.jwks", url = %url, "Fetching JWKS");

        let request = async {
            let response = self.http_client.get(url).send().await.map_err(|e| {
                tracing::error!(target: "idr.auth.jwks", error = %e, "Failed to fetch JWKS");
                JwksError::Unavailable("request failed".to_string())
            })?;

            if !response.status().is_success() {
                tracing::error!(
                    target: "idr.auth.jwks",
                    status = %response.status(),
                    "JWKS endpoint returned error"
                );
                return Err(JwksError::Unavailable(format!(
                    "status {}",
                    response.status().as_u16()
                )));
            }

            response.json::<JwkSet>().await.map_err(|e| {
                tracing::error!(target: "idr.auth.jwks", error = %e, "Failed to parse JWKS response");
                JwksError::Unavailable("invalid key set".to_string())
            })
        };

        tokio::time::timeout(self.fetch_timeout, request)
            .await
            .unwrap_or_else(|_| {
                tracing::error!(target: "idr.auth.jwks", "JWKS fetch timed out");
                Err(JwksError::Unavailable("timeout".to_string()))
            })
    }

    /// Number of URLs with a cached set.
    pub async fn cached_set_count(&self) -> usize {
        self.sets
            .read()
            .await
            .values()
            .filter(|cached| cached.keys.is_some())
            .count()
    }
}

fn select_key<'a>(keys: &'a JwkSet, kid: Option<&str>) -> Option<&'a Jwk> {
    match kid {
        Some(kid) => keys.find(kid),
        None => match keys.keys.as_slice() {
            [only] => Some(only),
            _ => None,
        },
    }
}
