//! Sitewatch server
//!
//! Runs the [`sitewatch`] scheduler against PostgreSQL: targets are read
//! from `monitored_urls` once at startup and every probe outcome is
//! inserted into `checks`.
//!
//! # Components
//!
//! - **Config**: YAML file plus `DB_*` environment overrides
//! - **Store**: PostgreSQL target source and outcome sink
//! - **Metrics**: Prometheus counters fed by an instrumented sink, served
//!   over HTTP alongside a health endpoint
//! - **Telemetry**: tracing subscriber with optional OTLP export

pub mod config;
pub mod http_server;
pub mod metrics;
pub mod server;
pub mod store;
pub mod telemetry;

pub use config::{Config, ConfigError};
pub use http_server::MetricsServer;
pub use metrics::{InstrumentedSink, MetricsRegistry};
pub use server::{ServerError, SitewatchServer, wait_for_signal};
pub use store::PgStore;
pub use telemetry::{TelemetryGuard, setup_tracing};
