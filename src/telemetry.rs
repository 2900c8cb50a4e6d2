//! Logging and OpenTelemetry setup
//!
//! Console output is always on (pretty or JSON). When an OTLP endpoint is
//! configured, spans, log records and request counters are also exported
//! over OTLP/HTTP.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use opentelemetry::metrics::Counter;
use opentelemetry::trace::TracerProvider;
use opentelemetry::{KeyValue, global};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_semantic_conventions::resource::SERVICE_VERSION;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

const SERVICE_NAME: &str = "tripplanner";

static OUTBOUND_REQUESTS: LazyLock<Counter<u64>> = LazyLock::new(|| {
    global::meter(SERVICE_NAME)
        .u64_counter("tripplanner.outbound.requests")
        .with_description("Requests sent to external services")
        .build()
});

/// Count one call to an external service
pub fn record_request(service: &'static str, ok: bool) {
    OUTBOUND_REQUESTS.add(
        1,
        &[
            KeyValue::new("service", service),
            KeyValue::new("outcome", if ok { "ok" } else { "error" }),
        ],
    );
}

/// Flushes and shuts the exporters down when dropped
#[derive(Default)]
pub struct TelemetryGuard {
    tracer_provider: Option<SdkTracerProvider>,
    logger_provider: Option<SdkLoggerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("Failed to shut down tracer provider: {e}");
            }
        }
        if let Some(provider) = self.logger_provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("Failed to shut down logger provider: {e}");
            }
        }
        if let Some(provider) = self.meter_provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("Failed to shut down meter provider: {e}");
            }
        }
    }
}

fn resource() -> Resource {
    Resource::builder()
        .with_service_name(SERVICE_NAME)
        .with_attributes([KeyValue::new(SERVICE_VERSION, crate::VERSION)])
        .build()
}

fn signal_url(endpoint: &str, signal: &str) -> String {
    format!("{}/v1/{signal}", endpoint.trim_end_matches('/'))
}

fn tracer_provider(endpoint: &str, resource: Resource) -> Result<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(signal_url(endpoint, "traces"))
        .build()
        .context("Failed to build OTLP span exporter")?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build())
}

fn logger_provider(endpoint: &str, resource: Resource) -> Result<SdkLoggerProvider> {
    let exporter = opentelemetry_otlp::LogExporter::builder()
        .with_http()
        .with_endpoint(signal_url(endpoint, "logs"))
        .build()
        .context("Failed to build OTLP log exporter")?;

    Ok(SdkLoggerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build())
}

fn meter_provider(endpoint: &str, resource: Resource) -> Result<SdkMeterProvider> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_http()
        .with_endpoint(signal_url(endpoint, "metrics"))
        .build()
        .context("Failed to build OTLP metric exporter")?;

    Ok(SdkMeterProvider::builder()
        .with_periodic_exporter(exporter)
        .with_resource(resource)
        .build())
}

/// Install the global subscriber. `verbose` forces the `debug` level.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init(logging: &LoggingConfig, verbose: bool) -> Result<TelemetryGuard> {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (json_layer, pretty_layer) = if logging.format == "json" {
        (Some(fmt::layer().json().with_target(true)), None)
    } else {
        (None, Some(fmt::layer().with_target(true).with_line_number(true)))
    };

    let mut guard = TelemetryGuard::default();

    if let Some(endpoint) = logging.otlp_endpoint.as_deref() {
        let resource = resource();
        guard.tracer_provider = Some(tracer_provider(endpoint, resource.clone())?);
        guard.logger_provider = Some(logger_provider(endpoint, resource.clone())?);

        let meters = meter_provider(endpoint, resource)?;
        global::set_meter_provider(meters.clone());
        guard.meter_provider = Some(meters);
    }

    let trace_layer = guard.tracer_provider.as_ref().map(|provider| {
        global::set_tracer_provider(provider.clone());
        tracing_opentelemetry::layer().with_tracer(provider.tracer(SERVICE_NAME))
    });

    // The exporter's own HTTP stack must not feed back into the log export
    let log_layer = guard.logger_provider.as_ref().map(|provider| {
        OpenTelemetryTracingBridge::new(provider).with_filter(filter_fn(|metadata| {
            let target = metadata.target();
            !(target.starts_with("opentelemetry") || target.starts_with("hyper") || target.starts_with("reqwest"))
        }))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(pretty_layer)
        .with(trace_layer)
        .with(log_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if let Some(endpoint) = logging.otlp_endpoint.as_deref() {
        tracing::info!(otel.endpoint = endpoint, "OpenTelemetry export enabled");
    }

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_url() {
        assert_eq!(signal_url("http://localhost:4318/", "traces"), "http://localhost:4318/v1/traces");
        assert_eq!(signal_url("http://collector:4318", "logs"), "http://collector:4318/v1/logs");
    }

    #[test]
    fn test_record_request_without_provider() {
        // falls back to the no-op meter
        record_request("routing", true);
        record_request("routing", false);
    }
}
