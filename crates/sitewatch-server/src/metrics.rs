//! Prometheus metrics for probe outcomes.

use async_trait::async_trait;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use sitewatch::{OutcomeSink, ProbeOutcome};
use std::sync::Arc;

/// Labels for per-target metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct TargetLabels {
    /// Probed address
    pub target: String,
}

/// Labels for probe result metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ProbeLabels {
    /// Probed address
    pub target: String,
    /// Result (ok, failed, pattern_mismatch, pattern_error)
    pub result: String,
}

/// Labels for HTTP response metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ResponseLabels {
    /// Probed address
    pub target: String,
    /// Status class (2xx, 3xx, 4xx, 5xx, other)
    pub class: String,
}

/// Metrics registry with all sitewatch metrics
pub struct MetricsRegistry {
    /// Prometheus registry
    pub registry: Registry,

    /// Probes by result
    probes_total: Family<ProbeLabels, Counter>,
    /// Time until the transport phase resolved
    probe_duration_seconds: Family<TargetLabels, Histogram>,
    /// Responses by status class
    http_responses_total: Family<ResponseLabels, Counter>,
    /// Failed sink writes
    sink_errors_total: Counter,
    /// Running target loops
    targets_active: Gauge,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    /// Create a new metrics registry
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let probes_total = Family::<ProbeLabels, Counter>::default();
        registry.register(
            "sitewatch_probes",
            "Total probes performed",
            probes_total.clone(),
        );

        // 5ms to ~41s
        let probe_duration_seconds = Family::<TargetLabels, Histogram>::new_with_constructor(|| {
            Histogram::new(exponential_buckets(0.005, 2.0, 14))
        });
        registry.register(
            "sitewatch_probe_duration_seconds",
            "Probe response time in seconds",
            probe_duration_seconds.clone(),
        );

        let http_responses_total = Family::<ResponseLabels, Counter>::default();
        registry.register(
            "sitewatch_http_responses",
            "HTTP responses received by status class",
            http_responses_total.clone(),
        );

        let sink_errors_total = Counter::default();
        registry.register(
            "sitewatch_sink_errors",
            "Probe outcomes that could not be stored",
            sink_errors_total.clone(),
        );

        let targets_active = Gauge::default();
        registry.register(
            "sitewatch_targets_active",
            "Number of running target loops",
            targets_active.clone(),
        );

        Self {
            registry,
            probes_total,
            probe_duration_seconds,
            http_responses_total,
            sink_errors_total,
            targets_active,
        }
    }

    /// Record one probe outcome
    pub fn record_outcome(&self, outcome: &ProbeOutcome) {
        self.probes_total
            .get_or_create(&ProbeLabels {
                target: outcome.address.clone(),
                result: outcome_result(outcome).to_string(),
            })
            .inc();

        self.probe_duration_seconds
            .get_or_create(&TargetLabels {
                target: outcome.address.clone(),
            })
            .observe(outcome.elapsed.as_secs_f64());

        if let Some(status) = outcome.status {
            self.http_responses_total
                .get_or_create(&ResponseLabels {
                    target: outcome.address.clone(),
                    class: status_class(status).to_string(),
                })
                .inc();
        }
    }

    /// Record a failed sink write
    pub fn record_sink_error(&self) {
        self.sink_errors_total.inc();
    }

    /// Update running target loop count
    pub fn set_targets_active(&self, count: usize) {
        self.targets_active.set(count as i64);
    }

    /// Encode the registry in Prometheus text format
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

/// Classify an outcome for the `result` label
fn outcome_result(outcome: &ProbeOutcome) -> &'static str {
    match (outcome.status, outcome.pattern_match, &outcome.failure) {
        (None, _, _) => "failed",
        (Some(_), _, Some(_)) => "pattern_error",
        (Some(_), Some(false), None) => "pattern_mismatch",
        (Some(_), _, None) => "ok",
    }
}

/// Map a status code to its class label
fn status_class(status: u16) -> &'static str {
    match status {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    }
}

/// Outcome sink decorator that records metrics before forwarding
pub struct InstrumentedSink {
    inner: Arc<dyn OutcomeSink>,
    metrics: Arc<MetricsRegistry>,
}

impl InstrumentedSink {
    /// Wrap `inner`
    pub fn new(inner: Arc<dyn OutcomeSink>, metrics: Arc<MetricsRegistry>) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl OutcomeSink for InstrumentedSink {
    async fn record(&self, outcome: &ProbeOutcome) -> common::Result<()> {
        self.metrics.record_outcome(outcome);

        let result = self.inner.record(outcome).await;
        if result.is_err() {
            self.metrics.record_sink_error();
        }
        result
    }
}
