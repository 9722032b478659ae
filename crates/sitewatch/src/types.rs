//! Target and probe outcome types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Target identifier as assigned by the target source
pub type TargetId = i64;

/// A monitored endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredTarget {
    /// Identifier assigned by the target source
    pub id: TargetId,

    /// URL probed with an HTTP GET
    pub address: String,

    /// Interval between probes
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Optional regular expression matched against the response body
    #[serde(default)]
    pub pattern: Option<String>,
}

impl MonitoredTarget {
    /// Create a target without a body pattern
    pub fn new(id: TargetId, address: impl Into<String>, interval: Duration) -> Self {
        Self {
            id,
            address: address.into(),
            interval,
            pattern: None,
        }
    }

    /// Attach a body pattern. An empty pattern is treated as no pattern.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        self.pattern = (!pattern.is_empty()).then_some(pattern);
        self
    }

    /// The configured pattern, if any and non-empty
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref().filter(|p| !p.is_empty())
    }
}

/// Result of one probe attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// Address that was probed
    pub address: String,

    /// Wall-clock time the attempt started
    pub observed_at: DateTime<Utc>,

    /// Time from attempt start until the transport phase resolved
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,

    /// HTTP status code, present when a response was received
    pub status: Option<u16>,

    /// Pattern match result, present when a pattern was configured and evaluated
    pub pattern_match: Option<bool>,

    /// Failure description when the probe did not complete normally
    pub failure: Option<String>,
}

impl ProbeOutcome {
    /// Create an outcome for a response that was received
    pub fn responded(
        address: impl Into<String>,
        observed_at: DateTime<Utc>,
        elapsed: Duration,
        status: u16,
    ) -> Self {
        Self {
            address: address.into(),
            observed_at,
            elapsed,
            status: Some(status),
            pattern_match: None,
            failure: None,
        }
    }

    /// Create an outcome for a request that failed before a response arrived
    pub fn failed(
        address: impl Into<String>,
        observed_at: DateTime<Utc>,
        elapsed: Duration,
        failure: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            observed_at,
            elapsed,
            status: None,
            pattern_match: None,
            failure: Some(failure.into()),
        }
    }

    /// True when the attempt produced a response and no failure
    pub fn is_success(&self) -> bool {
        self.status.is_some() && self.failure.is_none()
    }
}
