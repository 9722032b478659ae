//! Main sitewatch server wiring.

use crate::config::Config;
use crate::http_server::MetricsServer;
use crate::metrics::{InstrumentedSink, MetricsRegistry};
use crate::store::PgStore;
use sitewatch::{HttpProber, OutcomeSink, Scheduler, SchedulerError, TargetSource};
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Errors that abort server startup
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Store(#[from] common::Error),

    #[error("Failed to build HTTP client: {0}")]
    Prober(String),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("Invalid metrics listen address: {0}")]
    MetricsAddr(#[from] std::net::AddrParseError),
}

/// Sitewatch server
pub struct SitewatchServer {
    config: Config,
}

impl SitewatchServer {
    /// Create a new server
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Connect to PostgreSQL and monitor until SIGINT or SIGTERM
    pub async fn run(self) -> Result<(), ServerError> {
        info!("Starting sitewatch server");

        let store = Arc::new(PgStore::connect(&self.config.database).await?);

        let shutdown = CancellationToken::new();
        let signal_token = shutdown.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            signal_token.cancel();
        });

        let result = self.serve(store.clone(), store.clone(), shutdown).await;
        store.close().await;
        result
    }

    /// Monitor targets from `source` until `shutdown` is cancelled
    ///
    /// Returns once every target loop has finished.
    pub async fn serve(
        self,
        source: Arc<dyn TargetSource>,
        sink: Arc<dyn OutcomeSink>,
        shutdown: CancellationToken,
    ) -> Result<(), ServerError> {
        let prober = HttpProber::new(self.config.to_prober_config())
            .map_err(|e| ServerError::Prober(e.to_string()))?;

        // Resolved before any loop is running
        let (sink, metrics) = if self.config.metrics.enabled {
            let listen_addr = self.config.metrics.socket_addr()?;
            let registry = Arc::new(MetricsRegistry::new());
            let sink: Arc<dyn OutcomeSink> =
                Arc::new(InstrumentedSink::new(sink, registry.clone()));
            (sink, Some((registry, listen_addr)))
        } else {
            info!("Metrics disabled");
            (sink, None)
        };

        let mut scheduler = Scheduler::new(source, Arc::new(prober), sink);
        scheduler.start(&shutdown).await?;

        let active = scheduler.active_loops();
        info!(targets = active, "Monitoring started");

        let metrics_handle = match metrics {
            Some((registry, listen_addr)) => {
                registry.set_targets_active(active);
                let server = MetricsServer::new(registry.clone(), listen_addr);
                let token = shutdown.clone();
                Some((
                    registry,
                    tokio::spawn(async move {
                        if let Err(e) = server.run(token).await {
                            warn!(error = %e, "Metrics server error");
                        }
                    }),
                ))
            }
            None => None,
        };

        shutdown.cancelled().await;
        info!("Shutdown requested, stopping target loops");
        scheduler.stop().await;

        if let Some((registry, handle)) = metrics_handle {
            registry.set_targets_active(0);
            if let Err(e) = handle.await {
                warn!(error = %e, "Metrics server task failed");
            }
        }

        info!("Sitewatch server stopped");
        Ok(())
    }
}

/// Wait for SIGINT or SIGTERM
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("SIGINT received, initiating graceful shutdown"),
        _ = terminate => info!("SIGTERM received, initiating graceful shutdown"),
    }
}
