//! Per-target polling loop.

use crate::prober::Prober;
use crate::store::OutcomeSink;
use crate::types::MonitoredTarget;
use std::sync::Arc;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Drives probes for one target until cancelled
pub struct TargetLoop {
    target: MonitoredTarget,
    prober: Arc<dyn Prober>,
    sink: Arc<dyn OutcomeSink>,
    cancel: CancellationToken,
}

impl TargetLoop {
    /// Create a new target loop
    pub fn new(
        target: MonitoredTarget,
        prober: Arc<dyn Prober>,
        sink: Arc<dyn OutcomeSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            target,
            prober,
            sink,
            cancel,
        }
    }

    /// Run until the cancellation token fires.
    ///
    /// The first probe happens immediately; later probes sit on a fixed grid
    /// of `interval` anchored at the first one. A probe that overruns its slot
    /// pushes the next one to the following grid point, so probes for one
    /// target never overlap. Cancellation is observed before every probe and
    /// while waiting for the next tick, never in the middle of a probe.
    ///
    /// `interval` must be non-zero.
    pub async fn run(self) {
        let Self {
            target,
            prober,
            sink,
            cancel,
        } = self;

        info!(
            id = target.id,
            address = %target.address,
            interval = ?target.interval,
            prober = prober.name(),
            "Starting target loop"
        );

        let mut ticker = interval(target.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            debug!(id = target.id, address = %target.address, "Probing");
            let outcome = prober.probe(&target).await;

            if let Err(e) = sink.record(&outcome).await {
                warn!(
                    id = target.id,
                    address = %target.address,
                    error = %e,
                    "Failed to record probe outcome"
                );
            }
        }

        info!(id = target.id, address = %target.address, "Target loop stopped");
    }
}
