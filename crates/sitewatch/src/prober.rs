//! Probe execution.

use crate::types::{MonitoredTarget, ProbeOutcome};
use async_trait::async_trait;
use chrono::Utc;
use regex::bytes::Regex;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

/// Default per-attempt timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of body bytes inspected by pattern checks
pub const DEFAULT_BODY_LIMIT: usize = 64 * 1024;

/// Executes a single probe against a target
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe the target once. Failures are reported inside the outcome.
    async fn probe(&self, target: &MonitoredTarget) -> ProbeOutcome;

    /// Get the name of this prober
    fn name(&self) -> &str;
}

/// Reasons a body pattern could not be evaluated
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid regex pattern: {0}")]
    Invalid(#[from] regex::Error),

    #[error("failed to read response body: {0}")]
    BodyRead(#[from] reqwest::Error),

    #[error("timed out reading response body")]
    Timeout,
}

/// HTTP prober settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpProberConfig {
    /// Upper bound for one attempt, body read included
    pub timeout: Duration,

    /// Maximum body bytes read for pattern checks
    pub body_limit: usize,

    /// User-Agent header sent with every probe
    pub user_agent: Option<String>,
}

impl Default for HttpProberConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            body_limit: DEFAULT_BODY_LIMIT,
            user_agent: None,
        }
    }
}

/// HTTP GET prober with optional body pattern check
pub struct HttpProber {
    client: reqwest::Client,
    config: HttpProberConfig,
}

impl HttpProber {
    /// Create a new HTTP prober
    pub fn new(config: HttpProberConfig) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder().timeout(config.timeout);
        if let Some(ref user_agent) = config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    /// Settings this prober was built with
    pub fn config(&self) -> &HttpProberConfig {
        &self.config
    }

    async fn check_pattern(
        &self,
        response: reqwest::Response,
        pattern: &str,
        deadline: Instant,
    ) -> Result<bool, PatternError> {
        // An invalid pattern never costs a body read
        let regex = Regex::new(pattern)?;

        let body = timeout_at(deadline, read_capped(response, self.config.body_limit))
            .await
            .map_err(|_| PatternError::Timeout)??;

        Ok(regex.is_match(&body))
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, target: &MonitoredTarget) -> ProbeOutcome {
        let observed_at = Utc::now();
        let start = Instant::now();
        let deadline = start + self.config.timeout;

        let request = self.client.get(target.address.as_str());

        let response = match timeout_at(deadline, request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                let elapsed = start.elapsed();
                warn!(address = %target.address, error = %e, "Probe failed");
                return ProbeOutcome::failed(
                    &target.address,
                    observed_at,
                    elapsed,
                    format!("HTTP request failed: {}", e),
                );
            }
            Err(_) => {
                let elapsed = start.elapsed();
                warn!(address = %target.address, "Probe timed out");
                return ProbeOutcome::failed(
                    &target.address,
                    observed_at,
                    elapsed,
                    format!("HTTP request timed out after {:?}", self.config.timeout),
                );
            }
        };

        let elapsed = start.elapsed();
        let status = response.status().as_u16();
        let mut outcome = ProbeOutcome::responded(&target.address, observed_at, elapsed, status);

        if let Some(pattern) = target.pattern() {
            match self.check_pattern(response, pattern, deadline).await {
                Ok(matched) => outcome.pattern_match = Some(matched),
                Err(e) => {
                    warn!(address = %target.address, error = %e, "Pattern check failed");
                    outcome.failure = Some(format!("pattern check failed: {}", e));
                }
            }
        }

        debug!(
            address = %target.address,
            status,
            pattern_match = ?outcome.pattern_match,
            duration_ms = elapsed.as_millis(),
            "Probe completed"
        );

        outcome
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Compile `pattern` and test it against `body`.
pub fn match_body(pattern: &str, body: &[u8]) -> Result<bool, PatternError> {
    let regex = Regex::new(pattern)?;
    Ok(regex.is_match(body))
}

/// Read at most `limit` bytes of the body; the rest is never pulled off the wire.
async fn read_capped(
    mut response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, reqwest::Error> {
    let mut body = Vec::with_capacity(limit.min(8 * 1024));

    while body.len() < limit {
        let Some(chunk) = response.chunk().await? else {
            break;
        };
        let take = chunk.len().min(limit - body.len());
        body.extend_from_slice(&chunk[..take]);
    }

    Ok(body)
}
