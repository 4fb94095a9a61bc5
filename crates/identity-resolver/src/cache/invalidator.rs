//! Write-restricted handle over the identity cache.
//!
//! Logout flows get a [`CacheInvalidator`], never the cache itself, so the
//! only cache writes outside the resolution pipeline are removals.

use crate::cache::IdentityCache;
use std::sync::Arc;

#[derive(Clone)]
pub struct CacheInvalidator {
    cache: Arc<IdentityCache>,
}

impl CacheInvalidator {
    pub fn new(cache: Arc<IdentityCache>) -> Self {
        Self { cache }
    }

    /// Forget one token. Other tokens, including the same subject's, stay cached.
    pub async fn invalidate_token(&self, token: &str) -> bool {
        let removed = self.cache.invalidate(token).await;
        tracing::info!(target: "idr.cache", removed, "Token invalidated");
        removed
    }

    /// Forget every cached token that resolved to `subject`.
    pub async fn invalidate_subject(&self, subject: &str) -> usize {
        let removed = self.cache.invalidate_subject(subject).await;
        tracing::info!(target: "idr.cache", removed, "Subject invalidated");
        removed
    }

    /// Forget everything.
    pub async fn invalidate_all(&self) -> usize {
        let removed = self.cache.clear().await;
        tracing::warn!(target: "idr.cache", removed, "Identity cache cleared");
        removed
    }
}
