//! Storage boundary: where targets come from and where outcomes go.

use crate::types::{MonitoredTarget, ProbeOutcome};
use async_trait::async_trait;
use common::Result;
#[cfg(test)]
use mockall::automock;

/// Supplies the targets for one scheduler run.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TargetSource: Send + Sync {
    /// Return a snapshot of every target to monitor.
    async fn list_targets(&self) -> Result<Vec<MonitoredTarget>>;
}

/// Persists probe outcomes. Called concurrently from every target loop.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OutcomeSink: Send + Sync {
    /// Record a single outcome.
    async fn record(&self, outcome: &ProbeOutcome) -> Result<()>;
}

/// A fixed target list, mostly useful for tests and one-off runs.
#[derive(Debug, Clone, Default)]
pub struct StaticTargets(pub Vec<MonitoredTarget>);

#[async_trait]
impl TargetSource for StaticTargets {
    async fn list_targets(&self) -> Result<Vec<MonitoredTarget>> {
        Ok(self.0.clone())
    }
}
