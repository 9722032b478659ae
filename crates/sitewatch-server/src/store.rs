//! PostgreSQL-backed target source and outcome sink.

use crate::config::DatabaseSettings;
use async_trait::async_trait;
use sitewatch::{MonitoredTarget, OutcomeSink, ProbeOutcome, TargetSource};
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use std::str::FromStr;
use std::time::Duration;

const SELECT_TARGETS: &str = "SELECT id, url, check_interval_sec, COALESCE(regex_pattern, '') \
     FROM monitored_urls ORDER BY id";

const INSERT_CHECK: &str = "INSERT INTO checks \
     (url, check_timestamp, response_time_ms, http_status, regex_match, error) \
     VALUES ($1, $2, $3, $4, $5, $6)";

/// Row shape of `monitored_urls`
type TargetRow = (i32, String, i32, String);

/// Target source and outcome sink over a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect using the database settings
    #[tracing::instrument(
        skip(settings),
        fields(host = %settings.host, database = %settings.name),
        level = "info"
    )]
    pub async fn connect(settings: &DatabaseSettings) -> common::Result<Self> {
        let ssl_mode = PgSslMode::from_str(&settings.ssl_mode).map_err(common::Error::config)?;

        let options = PgConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .username(&settings.user)
            .password(&settings.password)
            .database(&settings.name)
            .ssl_mode(ssl_mode);

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.connect_timeout)
            .connect_with(options)
            .await
            .map_err(|e| common::Error::database(format!("failed to connect: {}", e)))?;

        tracing::info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending schema migrations
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn migrate(&self) -> common::Result<()> {
        let migrator = sqlx::migrate!("./migrations");
        migrator.run(&self.pool).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run database migrations");
            common::Error::database(e)
        })?;

        let version = migrator.iter().map(|m| m.version).max();
        tracing::info!(version = ?version, "Database migrations completed");
        Ok(())
    }

    /// Close the pool, waiting for checked-out connections
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("PostgreSQL pool closed");
    }
}

/// Convert one `monitored_urls` row
fn target_from_row(row: TargetRow) -> common::Result<MonitoredTarget> {
    let (id, url, interval_sec, pattern) = row;
    if interval_sec <= 0 {
        return Err(common::Error::source(format!(
            "target {} ({}) has non-positive check interval {}",
            id, url, interval_sec
        )));
    }

    let interval = Duration::from_secs(interval_sec as u64);
    Ok(MonitoredTarget::new(id.into(), url, interval).with_pattern(pattern))
}

/// Milliseconds as stored in `checks.response_time_ms`
fn elapsed_millis(elapsed: Duration) -> i32 {
    i32::try_from(elapsed.as_millis()).unwrap_or(i32::MAX)
}

#[async_trait]
impl TargetSource for PgStore {
    async fn list_targets(&self) -> common::Result<Vec<MonitoredTarget>> {
        let rows: Vec<TargetRow> = sqlx::query_as(SELECT_TARGETS)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                common::Error::source(format!("failed to query monitored URLs: {}", e))
            })?;

        rows.into_iter().map(target_from_row).collect()
    }
}

#[async_trait]
impl OutcomeSink for PgStore {
    async fn record(&self, outcome: &ProbeOutcome) -> common::Result<()> {
        sqlx::query(INSERT_CHECK)
            .bind(&outcome.address)
            .bind(outcome.observed_at)
            .bind(elapsed_millis(outcome.elapsed))
            .bind(outcome.status.map(i32::from))
            .bind(outcome.pattern_match)
            .bind(outcome.failure.as_deref())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                common::Error::sink(format!(
                    "failed to insert check for {}: {}",
                    outcome.address, e
                ))
            })?;
        Ok(())
    }
}
