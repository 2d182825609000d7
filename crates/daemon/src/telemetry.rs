//! Telemetry setup for OpenTelemetry integration
//! Optional production observability
//!
//! Builds a tracing-subscriber layer for the composition root to stack on
//! the shared registry. Nothing here touches the global dispatcher; the
//! registry is installed exactly once in main.

#[cfg(feature = "telemetry")]
pub use enabled::otel_layer;

/// Logs a hint when an OTLP endpoint is configured on a build without the
/// `telemetry` feature. Call after the subscriber is installed.
#[cfg(not(feature = "telemetry"))]
pub fn warn_if_endpoint_configured() {
    if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        tracing::warn!("OpenTelemetry endpoint set but feature 'telemetry' not enabled");
        tracing::warn!("Rebuild with: cargo build --features telemetry");
    }
}

#[cfg(feature = "telemetry")]
mod enabled {
    use anyhow::{Context, Result};
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::Tracer;
    use opentelemetry_sdk::Resource;
    use tracing_opentelemetry::OpenTelemetryLayer;
    use tracing_subscriber::Registry;

    /// Builds the OTLP span-export layer if configured
    ///
    /// # Environment Variables
    ///
    /// - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (e.g., http://localhost:4317)
    /// - `OTEL_SERVICE_NAME`: Service name (default: coderelay)
    ///
    /// Returns `Ok(None)` when no endpoint is configured; the daemon then
    /// runs without span export. A configured but unusable endpoint is a
    /// startup error, not a silent downgrade.
    pub fn otel_layer() -> Result<Option<OpenTelemetryLayer<Registry, Tracer>>> {
        let endpoint = match std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
            Ok(e) if !e.is_empty() => e,
            _ => return Ok(None),
        };

        let service_name =
            std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "coderelay".to_string());

        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(&endpoint)
            .build()
            .context("failed to build OTLP span exporter")?;

        let provider = opentelemetry_sdk::trace::TracerProvider::builder()
            .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
            .with_resource(Resource::new(vec![
                KeyValue::new("service.name", service_name.clone()),
                KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            ]))
            .build();

        let tracer = provider.tracer(service_name);
        opentelemetry::global::set_tracer_provider(provider);

        Ok(Some(tracing_opentelemetry::layer().with_tracer(tracer)))
    }

}
