//! Integration tests for server wiring and the metrics endpoint

use async_trait::async_trait;
use axum::{Router, routing::get};
use sitewatch::{MonitoredTarget, OutcomeSink, ProbeOutcome, StaticTargets, TargetSource};
use sitewatch_server::{
    Config, InstrumentedSink, MetricsRegistry, MetricsServer, ServerError, SitewatchServer,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct RecordingSink {
    outcomes: Mutex<Vec<ProbeOutcome>>,
}

#[async_trait]
impl OutcomeSink for RecordingSink {
    async fn record(&self, outcome: &ProbeOutcome) -> common::Result<()> {
        self.outcomes.lock().unwrap().push(outcome.clone());
        Ok(())
    }
}

/// Counts how often targets were requested
struct CountingSource {
    targets: Vec<MonitoredTarget>,
    calls: AtomicUsize,
}

#[async_trait]
impl TargetSource for CountingSource {
    async fn list_targets(&self) -> common::Result<Vec<MonitoredTarget>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.targets.clone())
    }
}

struct FailingSource;

#[async_trait]
impl TargetSource for FailingSource {
    async fn list_targets(&self) -> common::Result<Vec<MonitoredTarget>> {
        Err(common::Error::source("relation \"monitored_urls\" does not exist"))
    }
}

async fn serve_site() -> String {
    let app = Router::new().route("/", get(|| async { "Hi, my name is Test Server!" }));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/", addr)
}

fn config_without_metrics() -> Config {
    let mut config = Config::default();
    config.metrics.enabled = false;
    config.probe.timeout = Duration::from_secs(2);
    config
}

#[tokio::test]
async fn test_serve_probes_until_shutdown() {
    let url = serve_site().await;
    let source = Arc::new(StaticTargets(vec![
        MonitoredTarget::new(1, url.clone(), Duration::from_millis(200)).with_pattern("my name"),
    ]));
    let sink = Arc::new(RecordingSink::default());
    let shutdown = CancellationToken::new();

    let server = SitewatchServer::new(config_without_metrics());
    let handle = tokio::spawn(server.serve(source, sink.clone(), shutdown.clone()));

    tokio::time::sleep(Duration::from_millis(700)).await;
    shutdown.cancel();
    handle.await.unwrap().unwrap();

    let outcomes = sink.outcomes.lock().unwrap().clone();
    assert!(outcomes.len() >= 2, "got {} outcomes", outcomes.len());
    for outcome in &outcomes {
        assert_eq!(outcome.address, url);
        assert_eq!(outcome.status, Some(200));
        assert_eq!(outcome.pattern_match, Some(true));
    }

    // Nothing is recorded once serve has returned
    let count = outcomes.len();
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(sink.outcomes.lock().unwrap().len(), count);
}

#[tokio::test]
async fn test_serve_fails_when_source_fails() {
    let server = SitewatchServer::new(config_without_metrics());
    let result = server
        .serve(
            Arc::new(FailingSource),
            Arc::new(RecordingSink::default()),
            CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(ServerError::Scheduler(_))));
}

#[tokio::test]
async fn test_bad_metrics_address_fails_before_monitoring() {
    let url = serve_site().await;
    let source = Arc::new(CountingSource {
        targets: vec![MonitoredTarget::new(1, url, Duration::from_secs(1))],
        calls: AtomicUsize::new(0),
    });
    let sink = Arc::new(RecordingSink::default());

    let mut config = config_without_metrics();
    config.metrics.enabled = true;
    config.metrics.listen_addr = "not-an-addr".to_string();

    let result = SitewatchServer::new(config)
        .serve(source.clone(), sink.clone(), CancellationToken::new())
        .await;

    assert!(matches!(result, Err(ServerError::MetricsAddr(_))));
    // No loop was launched, so no probe could have been cut short
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(sink.outcomes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_metrics_endpoint_reports_outcomes() {
    let url = serve_site().await;
    let registry = Arc::new(MetricsRegistry::new());
    let sink = InstrumentedSink::new(Arc::new(RecordingSink::default()), registry.clone());

    let target = MonitoredTarget::new(1, url.clone(), Duration::from_secs(1));
    let prober = sitewatch::HttpProber::new(Default::default()).unwrap();
    let outcome = sitewatch::Prober::probe(&prober, &target).await;
    sink.record(&outcome).await.unwrap();
    registry.set_targets_active(1);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let cancel = CancellationToken::new();
    let server = MetricsServer::new(registry, addr);
    let handle = tokio::spawn(server.serve(listener, cancel.clone()));

    let client = reqwest::Client::new();
    let body = client
        .get(format!("http://{}/metrics", addr))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("sitewatch_probes_total"));
    assert!(body.contains(&format!(r#"target="{}""#, url)));
    assert!(body.contains(r#"class="2xx""#));
    assert!(body.contains("sitewatch_targets_active 1"));

    let health = client
        .get(format!("http://{}/healthz", addr))
        .send()
        .await
        .unwrap();
    assert!(health.status().is_success());
    assert_eq!(health.text().await.unwrap(), "ok");

    cancel.cancel();
    handle.await.unwrap().unwrap();
}
