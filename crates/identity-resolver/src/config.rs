//! Identity resolver configuration.
//!
//! Configuration is loaded from environment variables and validated eagerly.
//! The resulting [`Config`] is immutable and shared by reference.

use crate::cache::clamp_ttl;
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use jsonwebtoken::Algorithm;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default upstream identity call timeout in seconds.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECONDS: u64 = 5;

/// Default JWKS fetch timeout in seconds.
pub const DEFAULT_JWKS_TIMEOUT_SECONDS: u64 = 5;

/// Upper bound for both outbound timeouts.
pub const MAX_OUTBOUND_TIMEOUT_SECONDS: u64 = 60;

/// Cache TTL for identities proven by a local signature.
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 60;

/// Cache TTL for identities confirmed by the upstream authority.
pub const DEFAULT_CACHE_UPSTREAM_TTL_SECONDS: u64 = 30;

/// Cache TTL for identities obtained by unverified decode.
pub const DEFAULT_CACHE_DEGRADED_TTL_SECONDS: u64 = 5;

/// Default drain period on shutdown.
pub const DEFAULT_DRAIN_SECONDS: u64 = 30;

/// Asymmetric algorithms accepted when `IDENTITY_JWT_ALGORITHMS` is unset.
pub const DEFAULT_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
    Algorithm::ES256,
    Algorithm::ES384,
    Algorithm::EdDSA,
];

/// Where locally verifiable keys come from.
#[derive(Clone, PartialEq, Eq)]
pub enum LocalTrust {
    /// No local verification; every cache miss goes to the upstream authority.
    Disabled,
    /// Remote JSON Web Key Set.
    Jwks { url: String },
    /// Embedded PEM-encoded public key (RSA, EC, or Ed25519).
    PublicKeyPem(String),
}

impl fmt::Debug for LocalTrust {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalTrust::Disabled => f.write_str("Disabled"),
            LocalTrust::Jwks { url } => f.debug_struct("Jwks").field("url", url).finish(),
            LocalTrust::PublicKeyPem(pem) => {
                write!(f, "PublicKeyPem([{} bytes])", pem.len())
            }
        }
    }
}

/// Identity resolver configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Upstream authority "who am I" endpoint.
    pub upstream_me_url: String,

    pub upstream_timeout: Duration,

    /// Local verification trust source.
    pub local_trust: LocalTrust,

    pub jwks_timeout: Duration,

    /// Algorithms accepted in the token header. Never contains HS* or none.
    pub allowed_algorithms: Vec<Algorithm>,

    pub expected_issuer: Option<String>,

    pub expected_audience: Option<String>,

    /// JWT clock skew tolerance in seconds for token validation.
    pub jwt_clock_skew_seconds: i64,

    /// TTL tiers in seconds. Clamped again by the cache on every write.
    pub cache_ttl_seconds: u64,
    pub cache_upstream_ttl_seconds: u64,
    pub cache_degraded_ttl_seconds: u64,

    /// Background sweep interval; `None` disables the sweeper.
    pub cache_sweep_interval: Option<Duration>,

    pub drain_seconds: u64,
}

/// Custom Debug implementation that keeps key material out of logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("upstream_me_url", &self.upstream_me_url)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("local_trust", &self.local_trust)
            .field("jwks_timeout", &self.jwks_timeout)
            .field("allowed_algorithms", &self.allowed_algorithms)
            .field("expected_issuer", &self.expected_issuer)
            .field("expected_audience", &self.expected_audience)
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("cache_ttl_seconds", &self.cache_ttl_seconds)
            .field(
                "cache_upstream_ttl_seconds",
                &self.cache_upstream_ttl_seconds,
            )
            .field(
                "cache_degraded_ttl_seconds",
                &self.cache_degraded_ttl_seconds,
            )
            .field("cache_sweep_interval", &self.cache_sweep_interval)
            .field("drain_seconds", &self.drain_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid timeout configuration: {0}")]
    InvalidTimeout(String),

    #[error("Invalid local trust configuration: {0}")]
    InvalidTrustSource(String),

    #[error("Invalid JWT algorithm configuration: {0}")]
    InvalidAlgorithm(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid cache TTL configuration: {0}")]
    InvalidCacheTtl(String),

    #[error("Invalid cache sweep interval configuration: {0}")]
    InvalidSweepInterval(String),

    #[error("Invalid drain configuration: {0}")]
    InvalidDrain(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let upstream_me_url = vars
            .get("UPSTREAM_ME_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("UPSTREAM_ME_URL".to_string()))?
            .clone();

        let upstream_timeout = Duration::from_secs(parse_timeout(
            vars,
            "UPSTREAM_TIMEOUT_SECONDS",
            DEFAULT_UPSTREAM_TIMEOUT_SECONDS,
        )?);

        let jwks_timeout = Duration::from_secs(parse_timeout(
            vars,
            "JWKS_TIMEOUT_SECONDS",
            DEFAULT_JWKS_TIMEOUT_SECONDS,
        )?);

        let local_trust = parse_local_trust(vars)?;

        let allowed_algorithms = match vars.get("IDENTITY_JWT_ALGORITHMS") {
            Some(list) => parse_algorithms(list)?,
            None => DEFAULT_ALGORITHMS.to_vec(),
        };

        let expected_issuer = non_empty(vars.get("IDENTITY_EXPECTED_ISSUER"));
        let expected_audience = non_empty(vars.get("IDENTITY_EXPECTED_AUDIENCE"));

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got {}",
                    value
                )));
            }

            if value > MAX_CLOCK_SKEW.as_secs() as i64 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW.as_secs() as i64
        };

        let cache_ttl_seconds =
            parse_ttl(vars, "IDENTITY_CACHE_TTL_SECONDS", DEFAULT_CACHE_TTL_SECONDS)?;
        let cache_upstream_ttl_seconds = parse_ttl(
            vars,
            "IDENTITY_CACHE_UPSTREAM_TTL_SECONDS",
            DEFAULT_CACHE_UPSTREAM_TTL_SECONDS,
        )?;
        let cache_degraded_ttl_seconds = parse_ttl(
            vars,
            "IDENTITY_CACHE_DEGRADED_TTL_SECONDS",
            DEFAULT_CACHE_DEGRADED_TTL_SECONDS,
        )?;
        validate_tier_order(
            cache_ttl_seconds,
            cache_upstream_ttl_seconds,
            cache_degraded_ttl_seconds,
        )?;

        let cache_sweep_interval = match vars.get("CACHE_SWEEP_INTERVAL_SECONDS") {
            Some(value_str) => {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidSweepInterval(format!(
                        "CACHE_SWEEP_INTERVAL_SECONDS must be a non-negative integer, got '{}': {}",
                        value_str, e
                    ))
                })?;
                (value > 0).then(|| Duration::from_secs(value))
            }
            None => None,
        };

        let drain_seconds = match vars.get("IDR_DRAIN_SECONDS") {
            Some(value_str) => value_str.parse().map_err(|e| {
                ConfigError::InvalidDrain(format!(
                    "IDR_DRAIN_SECONDS must be a non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?,
            None => DEFAULT_DRAIN_SECONDS,
        };

        Ok(Config {
            bind_address,
            upstream_me_url,
            upstream_timeout,
            local_trust,
            jwks_timeout,
            allowed_algorithms,
            expected_issuer,
            expected_audience,
            jwt_clock_skew_seconds,
            cache_ttl_seconds,
            cache_upstream_ttl_seconds,
            cache_degraded_ttl_seconds,
            cache_sweep_interval,
            drain_seconds,
        })
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_timeout(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidTimeout(format!(
            "{} must be a valid positive integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value == 0 || value > MAX_OUTBOUND_TIMEOUT_SECONDS {
        return Err(ConfigError::InvalidTimeout(format!(
            "{} must be between 1 and {} seconds, got {}",
            name, MAX_OUTBOUND_TIMEOUT_SECONDS, value
        )));
    }

    Ok(value)
}

/// TTLs only need to be integers here; range clamping is the cache's job.
fn parse_ttl(vars: &HashMap<String, String>, name: &str, default: u64) -> Result<u64, ConfigError> {
    match vars.get(name) {
        Some(value_str) => value_str.parse().map_err(|e| {
            ConfigError::InvalidCacheTtl(format!(
                "{} must be a non-negative integer, got '{}': {}",
                name, value_str, e
            ))
        }),
        None => Ok(default),
    }
}

/// Less-trusted tiers must not outlive more-trusted ones once clamped:
/// degraded <= upstream <= default.
fn validate_tier_order(default: u64, upstream: u64, degraded: u64) -> Result<(), ConfigError> {
    let [default, upstream, degraded] =
        [default, upstream, degraded].map(|secs| clamp_ttl(Duration::from_secs(secs)));

    if degraded > upstream || upstream > default {
        return Err(ConfigError::InvalidCacheTtl(format!(
            "cache TTLs must satisfy degraded <= upstream <= default, got degraded={}s upstream={}s default={}s",
            degraded.as_secs(),
            upstream.as_secs(),
            default.as_secs()
        )));
    }

    Ok(())
}

fn parse_local_trust(vars: &HashMap<String, String>) -> Result<LocalTrust, ConfigError> {
    let jwks_url = non_empty(vars.get("IDENTITY_JWKS_URL"));
    // Orchestrators often flatten multi-line values; accept literal "\n".
    let pem = non_empty(vars.get("IDENTITY_PUBLIC_KEY_PEM")).map(|p| p.replace("\\n", "\n"));

    match (jwks_url, pem) {
        (Some(_), Some(_)) => Err(ConfigError::InvalidTrustSource(
            "IDENTITY_JWKS_URL and IDENTITY_PUBLIC_KEY_PEM are mutually exclusive".to_string(),
        )),
        (Some(url), None) => Ok(LocalTrust::Jwks { url }),
        (None, Some(pem)) => {
            if !pem.contains("-----BEGIN") {
                return Err(ConfigError::InvalidTrustSource(
                    "IDENTITY_PUBLIC_KEY_PEM must be a PEM-encoded public key".to_string(),
                ));
            }
            Ok(LocalTrust::PublicKeyPem(pem))
        }
        (None, None) => Ok(LocalTrust::Disabled),
    }
}

fn parse_algorithms(list: &str) -> Result<Vec<Algorithm>, ConfigError> {
    let mut algorithms = Vec::new();

    for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if name.eq_ignore_ascii_case("none") || name.to_ascii_uppercase().starts_with("HS") {
            return Err(ConfigError::InvalidAlgorithm(format!(
                "symmetric or unsigned algorithm '{}' is not allowed",
                name
            )));
        }

        let algorithm = Algorithm::from_str(name).map_err(|_| {
            ConfigError::InvalidAlgorithm(format!("unknown JWT algorithm '{}'", name))
        })?;

        if !algorithms.contains(&algorithm) {
            algorithms.push(algorithm);
        }
    }

    if algorithms.is_empty() {
        return Err(ConfigError::InvalidAlgorithm(
            "IDENTITY_JWT_ALGORITHMS must list at least one algorithm".to_string(),
        ));
    }

    Ok(algorithms)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([(
            "UPSTREAM_ME_URL".to_string(),
            "http://auth.internal/api/me".to_string(),
        )])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert_eq!(config.upstream_me_url, "http://auth.internal/api/me");
        assert_eq!(config.upstream_timeout, Duration::from_secs(5));
        assert_eq!(config.jwks_timeout, Duration::from_secs(5));
        assert_eq!(config.local_trust, LocalTrust::Disabled);
        assert_eq!(config.allowed_algorithms, DEFAULT_ALGORITHMS.to_vec());
        assert!(config.expected_issuer.is_none());
        assert!(config.expected_audience.is_none());
        assert_eq!(
            config.jwt_clock_skew_seconds,
            DEFAULT_CLOCK_SKEW.as_secs() as i64
        );
        assert_eq!(config.cache_ttl_seconds, 60);
        assert_eq!(config.cache_upstream_ttl_seconds, 30);
        assert_eq!(config.cache_degraded_ttl_seconds, 5);
        assert!(config.cache_sweep_interval.is_none());
        assert_eq!(config.drain_seconds, 30);
    }

    #[test]
    fn test_from_vars_missing_upstream_url() {
        let result = Config::from_vars(&HashMap::new());
        assert!(
            matches!(result, Err(ConfigError::MissingEnvVar(ref v)) if v == "UPSTREAM_ME_URL")
        );
    }

    #[test]
    fn test_from_vars_with_custom_values() {
        let mut vars = base_vars();
        vars.insert("BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string());
        vars.insert("UPSTREAM_TIMEOUT_SECONDS".to_string(), "10".to_string());
        vars.insert(
            "IDENTITY_JWKS_URL".to_string(),
            "http://auth.internal/.well-known/jwks.json".to_string(),
        );
        vars.insert(
            "IDENTITY_EXPECTED_ISSUER".to_string(),
            "https://auth.example.com".to_string(),
        );
        vars.insert("IDENTITY_EXPECTED_AUDIENCE".to_string(), "web".to_string());
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "120".to_string());
        vars.insert("IDENTITY_CACHE_TTL_SECONDS".to_string(), "90".to_string());
        vars.insert("CACHE_SWEEP_INTERVAL_SECONDS".to_string(), "15".to_string());
        vars.insert("IDR_DRAIN_SECONDS".to_string(), "0".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.upstream_timeout, Duration::from_secs(10));
        assert_eq!(
            config.local_trust,
            LocalTrust::Jwks {
                url: "http://auth.internal/.well-known/jwks.json".to_string()
            }
        );
        assert_eq!(
            config.expected_issuer.as_deref(),
            Some("https://auth.example.com")
        );
        assert_eq!(config.expected_audience.as_deref(), Some("web"));
        assert_eq!(config.jwt_clock_skew_seconds, 120);
        assert_eq!(config.cache_ttl_seconds, 90);
        assert_eq!(config.cache_sweep_interval, Some(Duration::from_secs(15)));
        assert_eq!(config.drain_seconds, 0);
    }

    #[test]
    fn test_sweep_interval_zero_disables_sweeper() {
        let mut vars = base_vars();
        vars.insert("CACHE_SWEEP_INTERVAL_SECONDS".to_string(), "0".to_string());

        let config = Config::from_vars(&vars).unwrap();
        assert!(config.cache_sweep_interval.is_none());
    }

    #[test]
    fn test_jwks_and_pem_are_mutually_exclusive() {
        let mut vars = base_vars();
        vars.insert(
            "IDENTITY_JWKS_URL".to_string(),
            "http://auth/jwks".to_string(),
        );
        vars.insert(
            "IDENTITY_PUBLIC_KEY_PEM".to_string(),
            "-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----".to_string(),
        );

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidTrustSource(_))));
    }

    #[test]
    fn test_pem_with_escaped_newlines_is_unescaped() {
        let mut vars = base_vars();
        vars.insert(
            "IDENTITY_PUBLIC_KEY_PEM".to_string(),
            "-----BEGIN PUBLIC KEY-----\\nAAAA\\n-----END PUBLIC KEY-----".to_string(),
        );

        let config = Config::from_vars(&vars).unwrap();
        assert!(matches!(
            config.local_trust,
            LocalTrust::PublicKeyPem(ref pem) if pem.lines().count() == 3
        ));
    }

    #[test]
    fn test_pem_without_armor_rejected() {
        let mut vars = base_vars();
        vars.insert(
            "IDENTITY_PUBLIC_KEY_PEM".to_string(),
            "not-a-pem".to_string(),
        );

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidTrustSource(_))));
    }

    #[test]
    fn test_algorithm_list_parsed_and_deduplicated() {
        let mut vars = base_vars();
        vars.insert(
            "IDENTITY_JWT_ALGORITHMS".to_string(),
            "EdDSA, RS256,EdDSA".to_string(),
        );

        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(
            config.allowed_algorithms,
            vec![Algorithm::EdDSA, Algorithm::RS256]
        );
    }

    #[test]
    fn test_symmetric_and_none_algorithms_rejected() {
        for list in ["HS256", "RS256,HS512", "none", "NONE"] {
            let mut vars = base_vars();
            vars.insert("IDENTITY_JWT_ALGORITHMS".to_string(), list.to_string());

            let result = Config::from_vars(&vars);
            assert!(
                matches!(result, Err(ConfigError::InvalidAlgorithm(_))),
                "expected rejection for {}",
                list
            );
        }
    }

    #[test]
    fn test_unknown_or_empty_algorithm_list_rejected() {
        for list in ["RS999", " , "] {
            let mut vars = base_vars();
            vars.insert("IDENTITY_JWT_ALGORITHMS".to_string(), list.to_string());

            assert!(matches!(
                Config::from_vars(&vars),
                Err(ConfigError::InvalidAlgorithm(_))
            ));
        }
    }

    #[test]
    fn test_timeout_bounds() {
        for value in ["0", "61", "abc"] {
            let mut vars = base_vars();
            vars.insert("UPSTREAM_TIMEOUT_SECONDS".to_string(), value.to_string());
            assert!(matches!(
                Config::from_vars(&vars),
                Err(ConfigError::InvalidTimeout(_))
            ));
        }

        let mut vars = base_vars();
        vars.insert("JWKS_TIMEOUT_SECONDS".to_string(), "60".to_string());
        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.jwks_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_clock_skew_rejects_zero_negative_and_too_large() {
        for value in ["0", "-5", "601", "five"] {
            let mut vars = base_vars();
            vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), value.to_string());

            let result = Config::from_vars(&vars);
            assert!(matches!(result, Err(ConfigError::InvalidJwtClockSkew(_))));
        }
    }

    #[test]
    fn test_clock_skew_accepts_max_value() {
        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "600".to_string());

        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.jwt_clock_skew_seconds, 600);
    }

    #[test]
    fn test_cache_ttl_must_be_integer() {
        let mut vars = base_vars();
        vars.insert(
            "IDENTITY_CACHE_DEGRADED_TTL_SECONDS".to_string(),
            "1.5".to_string(),
        );

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidCacheTtl(_))));
    }

    #[test]
    fn test_degraded_tier_cannot_outlive_default_tier() {
        let mut vars = base_vars();
        vars.insert("IDENTITY_CACHE_TTL_SECONDS".to_string(), "10".to_string());
        vars.insert(
            "IDENTITY_CACHE_DEGRADED_TTL_SECONDS".to_string(),
            "300".to_string(),
        );

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidCacheTtl(_))));
    }

    #[test]
    fn test_upstream_tier_cannot_outlive_default_tier() {
        let mut vars = base_vars();
        vars.insert("IDENTITY_CACHE_TTL_SECONDS".to_string(), "20".to_string());
        vars.insert(
            "IDENTITY_CACHE_UPSTREAM_TTL_SECONDS".to_string(),
            "40".to_string(),
        );

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidCacheTtl(_))));
    }

    #[test]
    fn test_tier_order_is_checked_after_clamping() {
        // Both clamp up to the 5s floor, so the order holds
        let mut vars = base_vars();
        vars.insert(
            "IDENTITY_CACHE_UPSTREAM_TTL_SECONDS".to_string(),
            "1".to_string(),
        );
        vars.insert(
            "IDENTITY_CACHE_DEGRADED_TTL_SECONDS".to_string(),
            "3".to_string(),
        );

        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.cache_degraded_ttl_seconds, 3);

        let mut vars = base_vars();
        vars.insert("IDENTITY_CACHE_TTL_SECONDS".to_string(), "1000".to_string());
        vars.insert(
            "IDENTITY_CACHE_UPSTREAM_TTL_SECONDS".to_string(),
            "400".to_string(),
        );
        assert!(Config::from_vars(&vars).is_ok());
    }

    #[test]
    fn test_debug_hides_pem_contents() {
        let mut vars = base_vars();
        vars.insert(
            "IDENTITY_PUBLIC_KEY_PEM".to_string(),
            "-----BEGIN PUBLIC KEY-----\nMCowBQYDK2VwAyEA\n-----END PUBLIC KEY-----".to_string(),
        );

        let config = Config::from_vars(&vars).unwrap();
        let debug_str = format!("{:?}", config);

        assert!(!debug_str.contains("MCowBQYDK2VwAyEA"));
        assert!(debug_str.contains("PublicKeyPem"));
    }
}
