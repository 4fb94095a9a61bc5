//! Upstream identity authority client.
//!
//! The upstream authority is the system of record for "who am I". It is
//! asked with the caller's own bearer token and answers with a profile, a
//! rejection, or nothing useful. This module only classifies the answer;
//! what to do with it is the resolution pipeline's decision.
//!
//! # Security
//!
//! - The bearer token is carried as a `SecretString` and only exposed when
//!   building the `Authorization` header
//! - Timeouts prevent hanging connections
//! - Response bodies are never logged

use crate::errors::IdentityError;
use crate::observability::metrics::record_upstream_request;
use common::secret::{ExposeSecret, SecretString};
use reqwest::Client;
use serde_json::Value;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, instrument, warn};

/// Response header an authority sets when the caller's sessions were revoked.
pub const SESSIONS_REVOKED_HEADER: &str = "x-sessions-revoked";

/// Default connect timeout in seconds.
const UPSTREAM_CONNECT_TIMEOUT_SECS: u64 = 2;

/// Classified answer from the upstream authority.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamResponse {
    /// 200 with a JSON body (not necessarily an object).
    Identity { body: Value, sessions_revoked: bool },
    /// 404: the authority has no identity endpoint.
    NotFound,
    /// 401 or 403: the authority rejected the token.
    Rejected { status: u16, sessions_revoked: bool },
    /// Any other status, or a 200 whose body is not JSON (reported as 502).
    Failed(u16),
}

/// The authority could not be asked at all.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("Upstream authority unreachable: {0}")]
    Transport(String),

    #[error("Upstream authority timed out")]
    Timeout,
}

/// Trait for upstream authority operations (enables mocking).
#[async_trait::async_trait]
pub trait UpstreamAuthority: Send + Sync {
    /// Ask the authority who `token` belongs to.
    async fn fetch_identity(&self, token: &SecretString) -> Result<UpstreamResponse, UpstreamError>;
}

/// HTTP client for the upstream "who am I" endpoint.
#[derive(Clone)]
pub struct HttpUpstreamAuthority {
    client: Client,
    me_url: String,
}

impl HttpUpstreamAuthority {
    /// Create a new upstream client.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Internal` if the HTTP client cannot be built.
    pub fn new(me_url: String, timeout: Duration) -> Result<Self, IdentityError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(UPSTREAM_CONNECT_TIMEOUT_SECS).min(timeout))
            .build()
            .map_err(|e| {
                error!(target: "idr.services.upstream", error = %e, "Failed to build HTTP client");
                IdentityError::Internal
            })?;

        Ok(Self { client, me_url })
    }

    /// Map the authority's response onto [`UpstreamResponse`].
    async fn classify(response: reqwest::Response) -> UpstreamResponse {
        let status = response.status().as_u16();
        let sessions_revoked = response
            .headers()
            .get(SESSIONS_REVOKED_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));

        match status {
            200 => match response.json::<Value>().await {
                Ok(body) => UpstreamResponse::Identity {
                    body,
                    sessions_revoked,
                },
                Err(e) => {
                    warn!(target: "idr.services.upstream", error = %e, "Upstream returned unparseable identity body");
                    UpstreamResponse::Failed(502)
                }
            },
            404 => UpstreamResponse::NotFound,
            401 | 403 => UpstreamResponse::Rejected {
                status,
                sessions_revoked,
            },
            _ => {
                warn!(target: "idr.services.upstream", status, "Unexpected upstream response");
                UpstreamResponse::Failed(status)
            }
        }
    }
}

#[async_trait::async_trait]
impl UpstreamAuthority for HttpUpstreamAuthority {
    #[instrument(skip_all)]
    async fn fetch_identity(&self, token: &SecretString) -> Result<UpstreamResponse, UpstreamError> {
        let start = Instant::now();

        let response = self
            .client
            .get(&self.me_url)
            .header("Authorization", format!("Bearer {}", token.expose_secret()))
            .header("Accept", "application/json")
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                warn!(target: "idr.services.upstream", "Upstream request timed out");
                record_upstream_request("timeout", start.elapsed());
                return Err(UpstreamError::Timeout);
            }
            Err(e) => {
                warn!(target: "idr.services.upstream", error = %e, "Upstream request failed");
                record_upstream_request("error", start.elapsed());
                return Err(UpstreamError::Transport("request failed".to_string()));
            }
        };

        let status = response.status().as_u16();
        let classified = Self::classify(response).await;
        record_upstream_request(&status.to_string(), start.elapsed());

        Ok(classified)
    }
}

/// Mock upstream authority for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock authority that replays canned answers.
    pub struct MockUpstreamAuthority {
        /// Responses to return (cycles through them).
        responses: Vec<Result<UpstreamResponse, UpstreamError>>,
        /// Number of calls made.
        call_count: AtomicUsize,
        /// Artificial latency before answering.
        delay: Option<Duration>,
    }

    impl MockUpstreamAuthority {
        /// Create a mock that answers 200 with `body`.
        pub fn identity(body: Value) -> Self {
            Self::with_responses(vec![Ok(UpstreamResponse::Identity {
                body,
                sessions_revoked: false,
            })])
        }

        /// Create a mock that rejects with 401 or 403.
        pub fn rejecting(status: u16) -> Self {
            Self::with_responses(vec![Ok(UpstreamResponse::Rejected {
                status,
                sessions_revoked: false,
            })])
        }

        pub fn not_found() -> Self {
            Self::with_responses(vec![Ok(UpstreamResponse::NotFound)])
        }

        /// Create a mock that answers with an unexpected status.
        pub fn failing_status(status: u16) -> Self {
            Self::with_responses(vec![Ok(UpstreamResponse::Failed(status))])
        }

        /// Create a mock that cannot be reached.
        pub fn unreachable() -> Self {
            Self::with_responses(vec![Err(UpstreamError::Transport(
                "connection refused".to_string(),
            ))])
        }

        /// Create a mock that returns custom responses in sequence.
        pub fn with_responses(responses: Vec<Result<UpstreamResponse, UpstreamError>>) -> Self {
            Self {
                responses,
                call_count: AtomicUsize::new(0),
                delay: None,
            }
        }

        /// Delay every answer.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Get the number of calls made.
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl UpstreamAuthority for MockUpstreamAuthority {
        async fn fetch_identity(
            &self,
            _token: &SecretString,
        ) -> Result<UpstreamResponse, UpstreamError> {
            let count = self.call_count.fetch_add(1, Ordering::SeqCst);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            if self.responses.is_empty() {
                return Err(UpstreamError::Transport("no canned response".to_string()));
            }

            // Cycle through responses
            let idx = count % self.responses.len();
            self.responses
                .get(idx)
                .cloned()
                .unwrap_or(Err(UpstreamError::Transport("no canned response".to_string())))
        }
    }

}
