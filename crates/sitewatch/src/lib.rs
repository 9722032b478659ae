//! Periodic HTTP probing of monitored web endpoints.
//!
//! This crate is the scheduling and execution core of Sitewatch:
//! - [`HttpProber`] performs one bounded HTTP GET per call and optionally
//!   checks the first bytes of the body against a regular expression
//! - [`TargetLoop`] probes one target on a fixed interval until cancelled
//! - [`Scheduler`] fans out one loop per target and stops them all together
//!
//! Targets come from a [`TargetSource`] and outcomes go to an
//! [`OutcomeSink`]; both are traits so any storage can sit behind them.
//!
//! # Example
//!
//! ```no_run
//! use sitewatch::{HttpProber, HttpProberConfig, MonitoredTarget, Scheduler, StaticTargets};
//! # use sitewatch::{OutcomeSink, ProbeOutcome};
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # struct Discard;
//! # #[async_trait::async_trait]
//! # impl OutcomeSink for Discard {
//! #     async fn record(&self, _: &ProbeOutcome) -> common::Result<()> { Ok(()) }
//! # }
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let targets = StaticTargets(vec![
//!     MonitoredTarget::new(1, "https://example.com", Duration::from_secs(30))
//!         .with_pattern("Example Domain"),
//! ]);
//!
//! let prober = HttpProber::new(HttpProberConfig::default())?;
//! let mut scheduler = Scheduler::new(Arc::new(targets), Arc::new(prober), Arc::new(Discard));
//!
//! scheduler.start(&CancellationToken::new()).await?;
//! tokio::time::sleep(Duration::from_secs(60)).await;
//! scheduler.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod prober;
pub mod scheduler;
pub mod store;
pub mod target_loop;
pub mod types;

pub use prober::{HttpProber, HttpProberConfig, PatternError, Prober};
pub use scheduler::{Scheduler, SchedulerError};
pub use store::{OutcomeSink, StaticTargets, TargetSource};
pub use target_loop::TargetLoop;
pub use types::{MonitoredTarget, ProbeOutcome, TargetId};
