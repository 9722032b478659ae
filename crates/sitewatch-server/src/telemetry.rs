//! Tracing subscriber setup with optional OpenTelemetry export

use crate::config::Config;
use opentelemetry::{KeyValue, trace::TracerProvider as _};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource, runtime,
    trace::{RandomIdGenerator, Sampler, TracerProvider},
};
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// OpenTelemetry tracer guard
///
/// When dropped, flushes all pending spans and shuts down the tracer
pub struct TelemetryGuard;

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        opentelemetry::global::shutdown_tracer_provider();
    }
}

/// Build an OTLP (gRPC) tracer provider for `service_name`
fn build_tracer_provider(
    service_name: &str,
    otlp_endpoint: &str,
) -> Result<TracerProvider, Box<dyn std::error::Error>> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(otlp_endpoint)
        .build()?;

    let resource = Resource::new(vec![
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION").to_string()),
    ]);

    Ok(TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_config(
            opentelemetry_sdk::trace::Config::default()
                .with_sampler(Sampler::AlwaysOn)
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(resource),
        )
        .build())
}

/// Install the global tracing subscriber
///
/// Log format and level come from `config.logging`; `RUST_LOG` still wins
/// over the configured level. When `config.telemetry.enabled` is set, spans
/// are also exported over OTLP and the returned guard must be kept alive
/// until shutdown.
pub fn setup_tracing(
    config: &Config,
) -> Result<Option<TelemetryGuard>, Box<dyn std::error::Error>> {
    let filter = common::logging::env_filter(config.logging.level());

    let fmt_layer = if config.logging.is_json() {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    if !config.telemetry.enabled {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()?;
        tracing::info!("Tracing initialized without OpenTelemetry");
        return Ok(None);
    }

    let provider = build_tracer_provider(
        &config.telemetry.service_name,
        &config.telemetry.otlp_endpoint,
    )?;
    let tracer = provider.tracer(config.telemetry.service_name.clone());
    opentelemetry::global::set_tracer_provider(provider);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .try_init()?;

    tracing::info!(
        service_name = %config.telemetry.service_name,
        otlp_endpoint = %config.telemetry.otlp_endpoint,
        "Tracing initialized with OpenTelemetry integration"
    );

    Ok(Some(TelemetryGuard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_tracing_without_telemetry() {
        let config = Config::default();
        assert!(!config.telemetry.enabled);

        // A second install in the same process fails; either way no guard
        if let Ok(guard) = setup_tracing(&config) {
            assert!(guard.is_none());
        }
    }
}
