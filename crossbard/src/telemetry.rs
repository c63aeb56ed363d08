use anyhow::Result;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crossbar_core::config::OtelConfig;

/// Tracing resources that must stay alive for the process lifetime and get
/// flushed on shutdown.
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl TelemetryGuard {
    /// Flush all pending spans. Called during graceful shutdown.
    pub fn flush(&self) {
        if let Some(ref provider) = self.provider {
            let _ = provider.force_flush();
        }
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        self.flush();
        if let Some(provider) = self.provider.take() {
            let _: Result<(), _> = provider.shutdown();
        }
    }
}

/// Install the tracing subscriber: a JSON stdout layer always, plus an OTLP
/// export layer when `otel.otlp_endpoint` is configured. `verbose` lowers the
/// default filter from info to debug; `RUST_LOG` still wins when set.
pub fn init_telemetry(otel: &OtelConfig, verbose: bool) -> Result<TelemetryGuard> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let json_layer = tracing_subscriber::fmt::layer().json().flatten_event(true);

    let Some(endpoint) = otel.otlp_endpoint.as_deref() else {
        tracing_subscriber::registry()
            .with(filter)
            .with(json_layer)
            .init();
        return Ok(TelemetryGuard { provider: None });
    };

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()?;
    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            opentelemetry_sdk::Resource::builder()
                .with_service_name(
                    otel.service_name
                        .clone()
                        .unwrap_or_else(|| "crossbar".to_string()),
                )
                .build(),
        )
        .build();

    let tracer = provider.tracer("crossbard");
    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .init();

    Ok(TelemetryGuard {
        provider: Some(provider),
    })
}
