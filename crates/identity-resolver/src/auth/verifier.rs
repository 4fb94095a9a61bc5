//! Local cryptographic token verification.
//!
//! Verifies bearer tokens against either a remote JWKS (through the shared
//! [`JwksRegistry`]) or a single embedded PEM public key.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - The header algorithm must be on the allowlist before any key is touched,
//!   and is checked again on the decoded header after verification
//! - Symmetric algorithms and `none` never reach the allowlist (config rejects them)
//! - A key can only verify algorithms of its own family
//!
//! Failures are split in two. [`VerificationError::SignatureInvalid`] is
//! conclusive: the token was tampered with or signed by the wrong key, and
//! nothing else should be consulted. [`VerificationError::Inconclusive`]
//! covers everything that does not prove forgery (expired, wrong issuer,
//! unknown key, key set unreachable) and lets the caller ask the upstream
//! authority instead.

use crate::auth::claims::IdentityClaims;
use crate::auth::jwks::{JwksError, JwksRegistry};
use crate::config::{Config, LocalTrust};
use common::jwt::{check_token_size, validate_iat};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Header, Validation};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

/// Why local verification could not reach a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InconclusiveReason {
    Malformed,
    Expired,
    NotYetValid,
    IssuerMismatch,
    AudienceMismatch,
    MissingClaim,
    IatInFuture,
    UnknownKey,
    KeySetUnavailable,
    KeyUnusable,
}

impl InconclusiveReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            InconclusiveReason::Malformed => "malformed",
            InconclusiveReason::Expired => "expired",
            InconclusiveReason::NotYetValid => "not_yet_valid",
            InconclusiveReason::IssuerMismatch => "issuer_mismatch",
            InconclusiveReason::AudienceMismatch => "audience_mismatch",
            InconclusiveReason::MissingClaim => "missing_claim",
            InconclusiveReason::IatInFuture => "iat_in_future",
            InconclusiveReason::UnknownKey => "unknown_key",
            InconclusiveReason::KeySetUnavailable => "key_set_unavailable",
            InconclusiveReason::KeyUnusable => "key_unusable",
        }
    }
}

impl fmt::Display for InconclusiveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("Token signature is invalid")]
    SignatureInvalid,

    #[error("Token could not be verified locally ({0})")]
    Inconclusive(InconclusiveReason),
}

/// Errors building a verifier from configuration.
#[derive(Debug, Error)]
pub enum VerifierInitError {
    #[error("Public key PEM is not a supported RSA, EC, or Ed25519 public key")]
    UnsupportedKey,
}

/// A token whose signature and registered claims checked out.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub claims: IdentityClaims,
    pub header: Header,
}

/// Key families. An algorithm may only be verified by a key of its family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Rsa,
    Ec,
    Ed,
}

impl KeyFamily {
    /// Family of an asymmetric algorithm; `None` for HMAC.
    pub fn of_algorithm(alg: Algorithm) -> Option<Self> {
        match alg {
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => Some(KeyFamily::Rsa),
            Algorithm::ES256 | Algorithm::ES384 => Some(KeyFamily::Ec),
            Algorithm::EdDSA => Some(KeyFamily::Ed),
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => None,
        }
    }

    fn of_jwk(jwk: &Jwk) -> Option<Self> {
        match &jwk.algorithm {
            AlgorithmParameters::RSA(_) => Some(KeyFamily::Rsa),
            AlgorithmParameters::EllipticCurve(_) => Some(KeyFamily::Ec),
            AlgorithmParameters::OctetKeyPair(_) => Some(KeyFamily::Ed),
            AlgorithmParameters::OctetKey(_) => None,
        }
    }
}

/// Checks shared by every trust source.
#[derive(Debug, Clone)]
pub struct VerifierSettings {
    pub allowed_algorithms: Vec<Algorithm>,
    pub expected_issuer: Option<String>,
    pub expected_audience: Option<String>,
    pub clock_skew: Duration,
}

impl VerifierSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            allowed_algorithms: config.allowed_algorithms.clone(),
            expected_issuer: config.expected_issuer.clone(),
            expected_audience: config.expected_audience.clone(),
            clock_skew: Duration::from_secs(config.jwt_clock_skew_seconds.unsigned_abs()),
        }
    }
}

enum KeySource {
    Jwks {
        url: String,
        registry: Arc<JwksRegistry>,
    },
    Static {
        key: DecodingKey,
        family: KeyFamily,
    },
}

/// Local token verifier.
pub struct TokenVerifier {
    source: KeySource,
    settings: VerifierSettings,
}

impl TokenVerifier {
    /// Verifier backed by a remote key set.
    pub fn with_jwks(url: String, registry: Arc<JwksRegistry>, settings: VerifierSettings) -> Self {
        Self {
            source: KeySource::Jwks { url, registry },
            settings,
        }
    }

    /// Verifier backed by an embedded PEM public key.
    ///
    /// # Errors
    ///
    /// Returns `VerifierInitError::UnsupportedKey` if the PEM is not an RSA,
    /// EC, or Ed25519 public key.
    pub fn with_public_key_pem(
        pem: &str,
        settings: VerifierSettings,
    ) -> Result<Self, VerifierInitError> {
        let (key, family) = parse_public_key_pem(pem)?;
        tracing::info!(target: "idr.auth.verifier", family = ?family, "Loaded embedded public key");

        Ok(Self {
            source: KeySource::Static { key, family },
            settings,
        })
    }

    /// Build the verifier the configuration asks for, if any.
    pub fn from_config(
        config: &Config,
        registry: Arc<JwksRegistry>,
    ) -> Result<Option<Self>, VerifierInitError> {
        let settings = VerifierSettings::from_config(config);
        match &config.local_trust {
            LocalTrust::Disabled => Ok(None),
            LocalTrust::Jwks { url } => Ok(Some(Self::with_jwks(url.clone(), registry, settings))),
            LocalTrust::PublicKeyPem(pem) => Self::with_public_key_pem(pem, settings).map(Some),
        }
    }

    /// Verify a token's signature and registered claims.
    ///
    /// # Checks
    ///
    /// 1. Size check - reject tokens > 8KB before parsing
    /// 2. Header algorithm on the allowlist
    /// 3. Key lookup (JWKS by `kid`, or the embedded key) and family match
    /// 4. Signature, `exp`, `nbf`, and the configured `iss`/`aud`
    /// 5. Decoded header algorithm re-checked against the allowlist
    /// 6. `iat` within clock skew
    #[instrument(skip_all)]
    pub async fn verify(&self, token: &str) -> Result<VerifiedToken, VerificationError> {
        check_token_size(token).map_err(|e| {
            tracing::debug!(target: "idr.auth.verifier", error = ?e, "Token size check failed");
            VerificationError::Inconclusive(InconclusiveReason::Malformed)
        })?;

        let header = decode_header(token).map_err(|e| {
            tracing::debug!(target: "idr.auth.verifier", error = %e, "Token header could not be decoded");
            VerificationError::Inconclusive(InconclusiveReason::Malformed)
        })?;

        if !self.settings.allowed_algorithms.contains(&header.alg) {
            tracing::debug!(target: "idr.auth.verifier", alg = ?header.alg, "Token algorithm not allowed");
            return Err(VerificationError::SignatureInvalid);
        }

        let key = self.resolve_key(&header).await?;

        // One algorithm per validation: jsonwebtoken rejects mixed families
        let mut validation = Validation::new(header.alg);
        if let Some(issuer) = &self.settings.expected_issuer {
            validation.set_issuer(&[issuer]);
        }
        match &self.settings.expected_audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        validation.validate_nbf = true;

        let token_data = decode::<IdentityClaims>(token, &key, &validation).map_err(|e| {
            let mapped = map_jwt_error(e.kind());
            tracing::debug!(target: "idr.auth.verifier", error = %e, outcome = %mapped, "Token verification failed");
            mapped
        })?;

        if !self
            .settings
            .allowed_algorithms
            .contains(&token_data.header.alg)
        {
            return Err(VerificationError::SignatureInvalid);
        }

        if let Some(iat) = token_data.claims.iat {
            if let Err(e) = validate_iat(iat, self.settings.clock_skew) {
                tracing::debug!(target: "idr.auth.verifier", error = ?e, "Token iat validation failed");
                return Err(VerificationError::Inconclusive(
                    InconclusiveReason::IatInFuture,
                ));
            }
        }

        let claims = token_data.claims.with_header(
            Some(format!("{:?}", token_data.header.alg)),
            token_data.header.kid.clone(),
        );

        tracing::debug!(target: "idr.auth.verifier", "Token verified locally");
        Ok(VerifiedToken {
            claims,
            header: token_data.header,
        })
    }

    async fn resolve_key(&self, header: &Header) -> Result<DecodingKey, VerificationError> {
        let expected = KeyFamily::of_algorithm(header.alg);

        match &self.source {
            KeySource::Static { key, family } => {
                if expected != Some(*family) {
                    tracing::debug!(target: "idr.auth.verifier", alg = ?header.alg, key_family = ?family, "Algorithm does not match key family");
                    return Err(VerificationError::SignatureInvalid);
                }
                Ok(key.clone())
            }
            KeySource::Jwks { url, registry } => {
                let jwk = registry
                    .get_key(url, header.kid.as_deref())
                    .await
                    .map_err(|e| match e {
                        JwksError::KeyNotFound => {
                            VerificationError::Inconclusive(InconclusiveReason::UnknownKey)
                        }
                        JwksError::Unavailable(_) => {
                            VerificationError::Inconclusive(InconclusiveReason::KeySetUnavailable)
                        }
                    })?;

                if expected.is_none() || KeyFamily::of_jwk(&jwk) != expected {
                    tracing::debug!(target: "idr.auth.verifier", alg = ?header.alg, "Algorithm does not match JWK key type");
                    return Err(VerificationError::SignatureInvalid);
                }

                DecodingKey::from_jwk(&jwk).map_err(|e| {
                    tracing::warn!(target: "idr.auth.verifier", error = %e, "JWK could not be used as a decoding key");
                    VerificationError::Inconclusive(InconclusiveReason::KeyUnusable)
                })
            }
        }
    }
}

/// Parse a PEM public key, trying each supported family in turn.
fn parse_public_key_pem(pem: &str) -> Result<(DecodingKey, KeyFamily), VerifierInitError> {
    let bytes = pem.as_bytes();

    if let Ok(key) = DecodingKey::from_rsa_pem(bytes) {
        return Ok((key, KeyFamily::Rsa));
    }
    if let Ok(key) = DecodingKey::from_ec_pem(bytes) {
        return Ok((key, KeyFamily::Ec));
    }
    if let Ok(key) = DecodingKey::from_ed_pem(bytes) {
        return Ok((key, KeyFamily::Ed));
    }

    Err(VerifierInitError::UnsupportedKey)
}

fn map_jwt_error(kind: &ErrorKind) -> VerificationError {
    use InconclusiveReason as R;

    match kind {
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::MissingAlgorithm
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::Crypto(_) => VerificationError::SignatureInvalid,
        ErrorKind::InvalidEcdsaKey | ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidKeyFormat => {
            VerificationError::Inconclusive(R::KeyUnusable)
        }
        ErrorKind::ExpiredSignature => VerificationError::Inconclusive(R::Expired),
        ErrorKind::ImmatureSignature => VerificationError::Inconclusive(R::NotYetValid),
        ErrorKind::InvalidIssuer => VerificationError::Inconclusive(R::IssuerMismatch),
        ErrorKind::InvalidAudience => VerificationError::Inconclusive(R::AudienceMismatch),
        ErrorKind::MissingRequiredClaim(_) | ErrorKind::InvalidSubject => {
            VerificationError::Inconclusive(R::MissingClaim)
        }
        _ => VerificationError::Inconclusive(R::Malformed),
    }
}
