//! Scheduler lifecycle: one target loop per monitored target.

use crate::prober::Prober;
use crate::store::{OutcomeSink, TargetSource};
use crate::target_loop::TargetLoop;
use crate::types::TargetId;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Scheduler lifecycle errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The target source could not produce a target list
    #[error(transparent)]
    Source(#[from] common::Error),

    /// A target cannot be scheduled because its interval is zero
    #[error("target {id} ({address}) has a zero interval")]
    InvalidInterval { id: TargetId, address: String },

    /// `start` was called while a previous run is still active
    #[error("scheduler is already running")]
    AlreadyRunning,
}

/// Runs one independent polling loop per target and stops them together.
///
/// Dropping a running scheduler aborts its loops without waiting for
/// in-flight probes; call [`Scheduler::stop`] for an orderly shutdown.
pub struct Scheduler {
    source: Arc<dyn TargetSource>,
    prober: Arc<dyn Prober>,
    sink: Arc<dyn OutcomeSink>,

    /// Cancellation scope of the current run, `None` when idle
    cancel: Option<CancellationToken>,

    /// Completion set for the current run's loops
    loops: JoinSet<()>,
}

impl Scheduler {
    /// Create a new scheduler
    pub fn new(
        source: Arc<dyn TargetSource>,
        prober: Arc<dyn Prober>,
        sink: Arc<dyn OutcomeSink>,
    ) -> Self {
        Self {
            source,
            prober,
            sink,
            cancel: None,
            loops: JoinSet::new(),
        }
    }

    /// Fetch the target list once and launch a loop for each target.
    ///
    /// Returns as soon as the loops are spawned. If the source fails or any
    /// target is unschedulable, nothing is launched. An empty target list is a
    /// valid, idle run. Loops stop when `parent` or the scheduler's own scope
    /// is cancelled.
    pub async fn start(&mut self, parent: &CancellationToken) -> Result<(), SchedulerError> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        let targets = self.source.list_targets().await?;

        if targets.is_empty() {
            info!("No targets to monitor");
            return Ok(());
        }

        if let Some(target) = targets.iter().find(|t| t.interval.is_zero()) {
            return Err(SchedulerError::InvalidInterval {
                id: target.id,
                address: target.address.clone(),
            });
        }

        let cancel = parent.child_token();

        for target in targets {
            let target_loop = TargetLoop::new(
                target,
                self.prober.clone(),
                self.sink.clone(),
                cancel.clone(),
            );
            self.loops.spawn(target_loop.run());
        }

        info!(targets = self.loops.len(), "Scheduler started");
        self.cancel = Some(cancel);

        Ok(())
    }

    /// Cancel every loop and wait until all of them have exited.
    ///
    /// In-flight probes are allowed to finish and their outcomes are recorded
    /// before this returns. Safe to call repeatedly, before `start`, or after
    /// a failed `start`.
    pub async fn stop(&mut self) {
        let Some(cancel) = self.cancel.take() else {
            return;
        };

        info!("Stopping scheduler...");
        cancel.cancel();

        while let Some(result) = self.loops.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Target loop terminated abnormally");
            }
        }

        info!("Scheduler stopped");
    }

    /// Whether a run is active
    pub fn is_running(&self) -> bool {
        self.cancel.is_some()
    }

    /// Number of loops that have not exited yet
    pub fn active_loops(&self) -> usize {
        self.loops.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prober::{HttpProber, HttpProberConfig};
    use crate::store::{MockOutcomeSink, MockTargetSource};
    use crate::types::MonitoredTarget;
    use std::time::Duration;

    fn prober() -> Arc<dyn Prober> {
        Arc::new(HttpProber::new(HttpProberConfig::default()).unwrap())
    }

    #[tokio::test]
    async fn test_source_error_is_returned() {
        let mut source = MockTargetSource::new();
        source
            .expect_list_targets()
            .times(1)
            .returning(|| Err(common::Error::source("repository error")));

        let mut sink = MockOutcomeSink::new();
        sink.expect_record().never();

        let mut scheduler = Scheduler::new(Arc::new(source), prober(), Arc::new(sink));
        let err = scheduler
            .start(&CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Target source error: repository error");
        assert!(!scheduler.is_running());
        assert_eq!(scheduler.active_loops(), 0);

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_zero_interval_launches_nothing() {
        let mut source = MockTargetSource::new();
        source.expect_list_targets().times(1).returning(|| {
            Ok(vec![
                MonitoredTarget::new(1, "http://127.0.0.1:1/", Duration::from_secs(5)),
                MonitoredTarget::new(2, "http://127.0.0.1:1/other", Duration::ZERO),
            ])
        });

        let mut sink = MockOutcomeSink::new();
        sink.expect_record().never();

        let mut scheduler = Scheduler::new(Arc::new(source), prober(), Arc::new(sink));
        let err = scheduler
            .start(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, SchedulerError::InvalidInterval { id: 2, .. }));
        assert_eq!(scheduler.active_loops(), 0);
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let mut source = MockTargetSource::new();
        source.expect_list_targets().never();

        let mut scheduler = Scheduler::new(
            Arc::new(source),
            prober(),
            Arc::new(MockOutcomeSink::new()),
        );

        scheduler.stop().await;
        scheduler.stop().await;
        assert!(!scheduler.is_running());
    }
}
