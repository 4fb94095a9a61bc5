//! Per-token identity cache.
//!
//! Maps token fingerprints to disclosed identities for a short, bounded
//! time. The cache is an explicit service object: built once at startup,
//! shared by `Arc`, and written only by the resolution pipeline and the
//! [`CacheInvalidator`].
//!
//! # Lifetime rules
//!
//! - Every caller-supplied TTL is clamped to `[MIN_TTL, MAX_TTL]`
//! - An entry never outlives the token's own `exp`
//! - Expiry is checked on read; the optional sweeper only reclaims memory
//! - An entry is only served to the contract it was disclosed under

pub mod fingerprint;
pub mod invalidator;

pub use fingerprint::TokenFingerprint;
pub use invalidator::CacheInvalidator;

use crate::config::Config;
use crate::identity::disclosure::{DisclosedIdentity, DisclosureContract, SourceTrust};
use crate::observability::metrics::{
    record_cache_invalidation, record_cache_lookup, set_cache_entries,
};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Shortest lifetime any entry may be given.
pub const MIN_TTL: Duration = Duration::from_secs(5);

/// Longest lifetime any entry may be given.
pub const MAX_TTL: Duration = Duration::from_secs(300);

/// Clamp a TTL into `[MIN_TTL, MAX_TTL]`.
pub fn clamp_ttl(ttl: Duration) -> Duration {
    ttl.clamp(MIN_TTL, MAX_TTL)
}

/// Cache lifetime class, by how the identity was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlTier {
    /// Local signature verification.
    Default,
    /// Upstream authority confirmation.
    Upstream,
    /// Unverified decode during an upstream outage.
    Degraded,
}

/// Configured lifetimes for each tier.
#[derive(Debug, Clone, Copy)]
pub struct TtlTiers {
    default: Duration,
    upstream: Duration,
    degraded: Duration,
}

impl TtlTiers {
    pub fn new(default: Duration, upstream: Duration, degraded: Duration) -> Self {
        Self {
            default: clamp_ttl(default),
            upstream: clamp_ttl(upstream),
            degraded: clamp_ttl(degraded),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Duration::from_secs(config.cache_ttl_seconds),
            Duration::from_secs(config.cache_upstream_ttl_seconds),
            Duration::from_secs(config.cache_degraded_ttl_seconds),
        )
    }

    pub fn ttl(&self, tier: TtlTier) -> Duration {
        match tier {
            TtlTier::Default => self.default,
            TtlTier::Upstream => self.upstream,
            TtlTier::Degraded => self.degraded,
        }
    }
}

impl Default for TtlTiers {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(60),
            Duration::from_secs(30),
            Duration::from_secs(5),
        )
    }
}

/// One cached identity.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub fingerprint: TokenFingerprint,
    pub identity: DisclosedIdentity,
    pub contract: DisclosureContract,
    pub created_at: Instant,
    pub expires_at: Instant,
    pub source_trust: SourceTrust,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
}

/// Token-fingerprint keyed identity cache.
#[derive(Default)]
pub struct IdentityCache {
    entries: RwLock<HashMap<TokenFingerprint, CacheEntry>>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a live entry for `token` disclosed under `contract`.
    ///
    /// An entry under a different contract is a miss but stays in place.
    /// An expired entry is a miss and is evicted.
    pub async fn get(
        &self,
        token: &str,
        contract: DisclosureContract,
    ) -> Option<DisclosedIdentity> {
        let fingerprint = TokenFingerprint::of(token);
        let now = Instant::now();

        {
            let entries = self.entries.read().await;
            match entries.get(&fingerprint) {
                None => {
                    record_cache_lookup("miss");
                    return None;
                }
                Some(entry) if entry.contract != contract => {
                    tracing::debug!(target: "idr.cache", fp = %fingerprint, cached = entry.contract.name(), requested = contract.name(), "Cache entry under other contract");
                    record_cache_lookup("miss");
                    return None;
                }
                Some(entry) if !entry.is_expired(now) => {
                    tracing::debug!(target: "idr.cache", fp = %fingerprint, "Cache hit");
                    record_cache_lookup("hit");
                    return Some(entry.identity.clone());
                }
                Some(_) => {}
            }
        }

        // Expired. Re-check under the write lock so a fresh replacement
        // written in between is left alone.
        let mut entries = self.entries.write().await;
        if entries
            .get(&fingerprint)
            .is_some_and(|entry| entry.is_expired(Instant::now()))
        {
            entries.remove(&fingerprint);
            tracing::debug!(target: "idr.cache", fp = %fingerprint, "Evicted expired entry");
        }
        set_cache_entries(entries.len());
        record_cache_lookup("expired");
        None
    }

    /// Store `identity` for `token`, replacing any prior entry.
    ///
    /// The lifetime is `clamp(ttl)`, cut short by the token's `exp` when
    /// known. A token that is already expired is not stored.
    pub async fn put(
        &self,
        token: &str,
        contract: DisclosureContract,
        identity: DisclosedIdentity,
        ttl: Duration,
        exp: Option<i64>,
    ) {
        let fingerprint = TokenFingerprint::of(token);
        let mut lifetime = clamp_ttl(ttl);

        if let Some(exp) = exp {
            let remaining = exp.saturating_sub(chrono::Utc::now().timestamp());
            if remaining <= 0 {
                tracing::debug!(target: "idr.cache", fp = %fingerprint, "Token already expired, not caching");
                return;
            }
            lifetime = lifetime.min(Duration::from_secs(remaining.unsigned_abs()));
        }

        let created_at = Instant::now();
        let entry = CacheEntry {
            fingerprint: fingerprint.clone(),
            source_trust: identity.source(),
            identity,
            contract,
            created_at,
            expires_at: created_at + lifetime,
        };

        let mut entries = self.entries.write().await;
        entries.insert(fingerprint.clone(), entry);
        set_cache_entries(entries.len());

        tracing::debug!(
            target: "idr.cache",
            fp = %fingerprint,
            ttl_secs = lifetime.as_secs(),
            contract = contract.name(),
            "Cached identity"
        );
    }

    /// Remove the entry for one token. Returns whether one existed.
    pub async fn invalidate(&self, token: &str) -> bool {
        let fingerprint = TokenFingerprint::of(token);
        let mut entries = self.entries.write().await;
        let removed = entries.remove(&fingerprint).is_some();
        set_cache_entries(entries.len());
        record_cache_invalidation("token", usize::from(removed));
        removed
    }

    /// Remove every entry whose identity resolves to `subject`.
    pub async fn invalidate_subject(&self, subject: &str) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.identity.subject().as_deref() != Some(subject));
        let removed = before - entries.len();
        set_cache_entries(entries.len());
        record_cache_invalidation("subject", removed);
        removed
    }

    /// Remove everything. Returns the number of entries dropped.
    pub async fn clear(&self) -> usize {
        let mut entries = self.entries.write().await;
        let removed = entries.len();
        entries.clear();
        set_cache_entries(0);
        record_cache_invalidation("all", removed);
        removed
    }

    /// Drop expired entries. Does not change what `get` returns.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        set_cache_entries(entries.len());
        record_cache_invalidation("expired", removed);
        removed
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.read().await.len(),
        }
    }

    /// Time left on the entry for `token`, if it is live.
    pub async fn remaining_ttl(&self, token: &str) -> Option<Duration> {
        let fingerprint = TokenFingerprint::of(token);
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries
            .get(&fingerprint)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.expires_at.saturating_duration_since(now))
    }
}
