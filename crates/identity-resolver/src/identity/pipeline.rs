//! Identity resolution pipeline.
//!
//! Resolves a bearer token to a [`DisclosedIdentity`] by walking an explicit
//! chain of stages:
//!
//! ```text
//! CacheCheck -> LocalVerify -> UpstreamVerify -> DegradedDecode -> Terminal
//! ```
//!
//! Each stage returns the next one. Only `Terminal` carries a result.
//!
//! # Fallback rules
//!
//! - A cache hit returns immediately. No verification, no network.
//! - An invalid signature is terminal. The upstream authority is never asked
//!   to vouch for a forged token.
//! - An inconclusive local check (wrong issuer, expired, unknown key, ...)
//!   moves on to the upstream authority.
//! - An upstream 401/403 is returned verbatim and is never replaced by a
//!   locally verified identity.
//! - Only a transport failure reaches the unverified decode, and its output is
//!   flagged unverified and cached at the shortest tier. A token whose
//!   decoded `exp` has passed is not served.
//! - A cancelled resolution writes nothing to the cache. Cancellation is
//!   observed while waiting on the key set as well as on the upstream.

use crate::auth::unverified::UnverifiedDecoder;
use crate::auth::verifier::{TokenVerifier, VerificationError};
use crate::cache::{IdentityCache, TokenFingerprint, TtlTier, TtlTiers};
use crate::errors::IdentityError;
use crate::identity::disclosure::{
    unwrap_container, DisclosedIdentity, DisclosureContract, SourceTrust,
};
use crate::observability::metrics::record_resolution;
use crate::services::upstream::{UpstreamAuthority, UpstreamError, UpstreamResponse};
use common::secret::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Successful resolution.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub identity: DisclosedIdentity,
    pub status: u16,
    pub cache_hit: bool,
}

/// Locally verified identity waiting for upstream enrichment.
struct LocalSubset {
    identity: DisclosedIdentity,
    exp: Option<i64>,
}

enum Stage {
    CacheCheck,
    LocalVerify,
    UpstreamVerify(Option<LocalSubset>),
    DegradedDecode,
    Terminal(Result<Resolution, IdentityError>),
}

impl Stage {
    fn resolved(identity: DisclosedIdentity, cache_hit: bool) -> Self {
        Stage::Terminal(Ok(Resolution {
            identity,
            status: 200,
            cache_hit,
        }))
    }

    fn failed(error: IdentityError) -> Self {
        Stage::Terminal(Err(error))
    }
}

/// Orchestrates cache, local verification, upstream confirmation, and the
/// degraded decode.
pub struct IdentityResolutionPipeline {
    cache: Arc<IdentityCache>,
    verifier: Option<TokenVerifier>,
    upstream: Arc<dyn UpstreamAuthority>,
    tiers: TtlTiers,
    upstream_timeout: Duration,
}

impl IdentityResolutionPipeline {
    pub fn new(
        cache: Arc<IdentityCache>,
        verifier: Option<TokenVerifier>,
        upstream: Arc<dyn UpstreamAuthority>,
        tiers: TtlTiers,
        upstream_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            verifier,
            upstream,
            tiers,
            upstream_timeout,
        }
    }

    pub fn cache(&self) -> &Arc<IdentityCache> {
        &self.cache
    }

    /// Resolve `token` to an identity disclosed under `contract`.
    ///
    /// # Errors
    ///
    /// - `MissingToken` when no (or an empty) token is given
    /// - `SignatureInvalid` when local verification proves forgery
    /// - `UpstreamRejected` / `UpstreamNotImplemented` / `UpstreamFailed` as
    ///   reported by the authority
    /// - `DecodeFailed` when the authority is unreachable and the token
    ///   cannot be decoded either
    /// - `UpstreamUnavailable` when the authority is unreachable and the
    ///   decoded token carries nothing to disclose
    /// - `VerificationInconclusive` when the authority is unreachable and
    ///   the decoded token has already expired
    /// - `Cancelled` when `cancel` fires first
    #[instrument(skip_all, fields(contract = contract.name()))]
    pub async fn resolve(
        &self,
        token: Option<&SecretString>,
        contract: DisclosureContract,
        cancel: &CancellationToken,
    ) -> Result<Resolution, IdentityError> {
        let token = match token {
            Some(token) if !token.expose_secret().trim().is_empty() => token,
            _ => {
                debug!(target: "idr.pipeline", "No bearer token");
                record_resolution(IdentityError::MissingToken.outcome_label(), "none");
                return Err(IdentityError::MissingToken);
            }
        };
        let fingerprint = TokenFingerprint::of(token.expose_secret());

        let mut stage = Stage::CacheCheck;
        loop {
            if cancel.is_cancelled() && !matches!(stage, Stage::Terminal(_)) {
                stage = Stage::failed(IdentityError::Cancelled);
            }

            stage = match stage {
                Stage::CacheCheck => self.check_cache(token, contract).await,
                Stage::LocalVerify => self.verify_locally(token, contract, cancel).await,
                Stage::UpstreamVerify(local) => {
                    self.verify_upstream(token, contract, local, cancel).await
                }
                Stage::DegradedDecode => self.decode_degraded(token, contract).await,
                Stage::Terminal(result) => {
                    match &result {
                        Ok(resolution) => {
                            let outcome = if resolution.cache_hit {
                                "cache_hit"
                            } else {
                                "resolved"
                            };
                            record_resolution(outcome, resolution.identity.source().as_str());
                            debug!(
                                target: "idr.pipeline",
                                fp = %fingerprint,
                                source = resolution.identity.source().as_str(),
                                cache_hit = resolution.cache_hit,
                                "Identity resolved"
                            );
                        }
                        Err(e) => {
                            record_resolution(e.outcome_label(), "none");
                            debug!(target: "idr.pipeline", fp = %fingerprint, outcome = e.outcome_label(), "Identity not resolved");
                        }
                    }
                    return result;
                }
            };
        }
    }

    async fn check_cache(&self, token: &SecretString, contract: DisclosureContract) -> Stage {
        match self.cache.get(token.expose_secret(), contract).await {
            Some(identity) => Stage::resolved(identity, true),
            None => Stage::LocalVerify,
        }
    }

    async fn verify_locally(
        &self,
        token: &SecretString,
        contract: DisclosureContract,
        cancel: &CancellationToken,
    ) -> Stage {
        let Some(verifier) = &self.verifier else {
            return Stage::UpstreamVerify(None);
        };

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!(target: "idr.pipeline", "Resolution cancelled during local verification");
                return Stage::failed(IdentityError::Cancelled);
            }
            outcome = verifier.verify(token.expose_secret()) => outcome,
        };

        match outcome {
            Err(VerificationError::SignatureInvalid) => {
                warn!(target: "idr.pipeline", "Token signature invalid, not consulting upstream");
                Stage::failed(IdentityError::SignatureInvalid)
            }
            Err(VerificationError::Inconclusive(reason)) => {
                debug!(target: "idr.pipeline", reason = %reason, "Local verification inconclusive");
                Stage::UpstreamVerify(None)
            }
            Ok(verified) => {
                let local = LocalSubset {
                    identity: contract
                        .disclose_claims(&verified.claims, SourceTrust::LocalSignature),
                    exp: verified.claims.exp,
                };

                if contract.enriches_from_upstream() {
                    Stage::UpstreamVerify(Some(local))
                } else {
                    self.serve_local(token, contract, local).await
                }
            }
        }
    }

    async fn verify_upstream(
        &self,
        token: &SecretString,
        contract: DisclosureContract,
        local: Option<LocalSubset>,
        cancel: &CancellationToken,
    ) -> Stage {
        let call = tokio::time::timeout(self.upstream_timeout, self.upstream.fetch_identity(token));

        let answer = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!(target: "idr.pipeline", "Resolution cancelled while awaiting upstream");
                return Stage::failed(IdentityError::Cancelled);
            }
            result = call => result.unwrap_or(Err(UpstreamError::Timeout)),
        };

        match answer {
            Err(e) => {
                warn!(target: "idr.pipeline", error = %e, "Upstream authority unavailable");
                match local {
                    Some(local) => self.serve_local(token, contract, local).await,
                    None => Stage::DegradedDecode,
                }
            }
            Ok(UpstreamResponse::NotFound) => {
                Stage::failed(IdentityError::UpstreamNotImplemented)
            }
            Ok(UpstreamResponse::Rejected {
                status,
                sessions_revoked,
            }) => {
                let subject = local.as_ref().and_then(|l| l.identity.subject());
                if sessions_revoked {
                    self.revoke_sessions(token, subject.as_deref()).await;
                } else {
                    self.cache.invalidate(token.expose_secret()).await;
                }
                Stage::failed(IdentityError::UpstreamRejected(status))
            }
            Ok(UpstreamResponse::Identity {
                body,
                sessions_revoked,
            }) => {
                let Some(fields) = unwrap_container(&body) else {
                    warn!(target: "idr.pipeline", "Upstream identity body is not an object");
                    return self.upstream_unusable(token, contract, local, 502).await;
                };

                let upstream = contract.disclose(fields, SourceTrust::Upstream);
                let identity = match &local {
                    Some(local) => upstream.merged_over(&local.identity),
                    None => upstream,
                };

                if sessions_revoked {
                    self.revoke_sessions(token, identity.subject().as_deref())
                        .await;
                } else {
                    let exp = local
                        .as_ref()
                        .and_then(|l| l.exp)
                        .or_else(|| UnverifiedDecoder::peek_exp(token.expose_secret()));
                    self.cache
                        .put(
                            token.expose_secret(),
                            contract,
                            identity.clone(),
                            self.tiers.ttl(TtlTier::Upstream),
                            exp,
                        )
                        .await;
                }

                Stage::resolved(identity, false)
            }
            Ok(UpstreamResponse::Failed(status)) => {
                self.upstream_unusable(token, contract, local, status).await
            }
        }
    }

    async fn decode_degraded(&self, token: &SecretString, contract: DisclosureContract) -> Stage {
        let Some(claims) = UnverifiedDecoder::decode(token.expose_secret()) else {
            return Stage::failed(IdentityError::DecodeFailed);
        };

        if claims
            .exp
            .is_some_and(|exp| exp <= chrono::Utc::now().timestamp())
        {
            debug!(target: "idr.pipeline", "Decoded token has expired");
            return Stage::failed(IdentityError::VerificationInconclusive);
        }

        let identity = contract.disclose_claims(&claims, SourceTrust::UnverifiedDecode);
        if identity.fields().is_empty() {
            debug!(target: "idr.pipeline", "Decoded token has no disclosable fields");
            return Stage::failed(IdentityError::UpstreamUnavailable);
        }

        warn!(target: "idr.pipeline", "Serving unverified identity while upstream is unavailable");
        self.cache
            .put(
                token.expose_secret(),
                contract,
                identity.clone(),
                self.tiers.ttl(TtlTier::Degraded),
                claims.exp,
            )
            .await;

        Stage::resolved(identity, false)
    }

    /// Upstream answered but not usefully: fall back to a signed local
    /// subset if there is one.
    async fn upstream_unusable(
        &self,
        token: &SecretString,
        contract: DisclosureContract,
        local: Option<LocalSubset>,
        status: u16,
    ) -> Stage {
        match local {
            Some(local) => {
                debug!(target: "idr.pipeline", status, "Serving locally verified identity");
                self.serve_local(token, contract, local).await
            }
            None => Stage::failed(IdentityError::UpstreamFailed(status)),
        }
    }

    async fn serve_local(
        &self,
        token: &SecretString,
        contract: DisclosureContract,
        local: LocalSubset,
    ) -> Stage {
        self.cache
            .put(
                token.expose_secret(),
                contract,
                local.identity.clone(),
                self.tiers.ttl(TtlTier::Default),
                local.exp,
            )
            .await;
        Stage::resolved(local.identity, false)
    }

    async fn revoke_sessions(&self, token: &SecretString, subject: Option<&str>) {
        info!(target: "idr.pipeline", "Upstream reported revoked sessions");
        self.cache.invalidate(token.expose_secret()).await;
        if let Some(subject) = subject {
            self.cache.invalidate_subject(subject).await;
        }
    }
}
