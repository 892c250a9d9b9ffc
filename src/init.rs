//! Provider initialization.
//!
//! Wires the full export path in one sequence: merged resource, one shared
//! gRPC channel to the collector, batched trace pipeline, periodic metric
//! pipeline, global propagator registration, and request-scoped tracer and
//! meter handles. Everything downstream of exporter construction (batching,
//! wire encoding, delivery) belongs to the SDK.

use std::fs;
use std::time::Duration;

use opentelemetry::global;
use opentelemetry::metrics::MeterProvider as _;
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::Context;
use opentelemetry_otlp::{LogExporter, MetricExporter, SpanExporter, WithTonicConfig};
use opentelemetry_sdk::logs::{BatchLogProcessor, LoggerProvider};
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{Sampler, TracerProvider};
use opentelemetry_sdk::{Resource, runtime};
use tonic::transport::{Certificate, Channel, ClientTlsConfig};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::TelemetryConfig;
use crate::context::{with_logger_provider, with_meter, with_tracer};
use crate::error::TelemetryError;
use crate::propagation::XrayPropagator;
use crate::resource::build_resource;
use crate::shutdown::TelemetryGuard;

/// Initialize trace and metric providers and attach a tracer and meter to
/// the context.
///
/// Builds the merged resource, opens one lazily-connecting gRPC channel to
/// `config.endpoint` shared by all exporters, installs a batched tracer
/// provider and a periodic meter provider as the process-wide defaults,
/// registers composite W3C + X-Ray propagation, and derives a tracer and
/// meter scoped to `config.service_name` into the returned context.
///
/// Must be called from within a multi-thread Tokio runtime; the providers'
/// background export tasks are spawned onto it. An unreachable collector
/// does not fail here: the channel connects lazily and delivery failures
/// surface at export time.
///
/// The returned [`TelemetryGuard`] owns the providers' shutdown callbacks;
/// call [`TelemetryGuard::shutdown`] (or drop the guard) exactly once, after
/// the providers are no longer in use. A failure at any step aborts
/// initialization; already-built pieces are abandoned to their background
/// tasks, not shut down.
///
/// # Errors
///
/// Returns the error of the step that failed: resource construction
/// ([`TelemetryError::ResourceEnv`], [`TelemetryError::LambdaResource`]),
/// channel construction ([`TelemetryError::GrpcConnection`]), or exporter
/// construction ([`TelemetryError::TraceExporter`],
/// [`TelemetryError::MetricExporter`]).
pub fn init_providers(
    cx: &Context,
    config: &TelemetryConfig,
) -> Result<(Context, TelemetryGuard), TelemetryError> {
    let resource = build_resource(&config.service_name, config.lambda)?;
    let channel = collector_channel(config)?;
    let mut guard = TelemetryGuard::new();

    let tracer_provider = build_tracer_provider(channel.clone(), resource.clone())?;
    {
        let provider = tracer_provider.clone();
        guard.register(Box::new(move || provider.shutdown().map_err(Into::into)));
    }

    let interval = Duration::from_secs(config.metric_interval_secs);
    let meter_provider = build_meter_provider(channel, resource, interval)?;
    {
        let provider = meter_provider.clone();
        guard.register(Box::new(move || provider.shutdown().map_err(Into::into)));
    }

    let tracer = tracer_provider.tracer(config.service_name.clone());
    let meter = meter_provider.meter(Box::leak(config.service_name.clone().into_boxed_str()) as &'static str);

    let cx = with_tracer(cx, tracer);
    let cx = with_meter(&cx, meter);

    Ok((cx, guard))
}

/// Build the shared gRPC channel to the collector.
///
/// The channel connects lazily: a malformed endpoint or bad TLS material
/// fails here, an unreachable collector surfaces at export time.
///
/// # Errors
///
/// Returns [`TelemetryError::GrpcConnection`] when the endpoint is not a
/// valid URI or the TLS settings cannot be applied.
pub fn collector_channel(config: &TelemetryConfig) -> Result<Channel, TelemetryError> {
    let endpoint = Channel::from_shared(config.endpoint.clone())
        .map_err(|e| TelemetryError::GrpcConnection(e.to_string()))?;

    let endpoint = match &config.tls {
        Some(tls) => {
            let mut tls_config = ClientTlsConfig::new().with_native_roots();
            if let Some(domain) = &tls.domain_name {
                tls_config = tls_config.domain_name(domain.clone());
            }
            if let Some(path) = &tls.ca_certificate {
                let pem = fs::read(path).map_err(|e| {
                    TelemetryError::GrpcConnection(format!(
                        "failed to read CA certificate {}: {e}",
                        path.display()
                    ))
                })?;
                tls_config = tls_config.ca_certificate(Certificate::from_pem(pem));
            }
            endpoint
                .tls_config(tls_config)
                .map_err(|e| TelemetryError::GrpcConnection(e.to_string()))?
        }
        None => endpoint,
    };

    Ok(endpoint.connect_lazy())
}

/// Build the batched tracer provider, install it globally, and register
/// composite W3C + X-Ray propagation.
fn build_tracer_provider(
    channel: Channel,
    resource: Resource,
) -> Result<TracerProvider, TelemetryError> {
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_channel(channel)
        .build()
        .map_err(|e| TelemetryError::TraceExporter(e.to_string()))?;

    let provider = TracerProvider::builder()
        .with_resource(resource)
        .with_sampler(Sampler::AlwaysOn)
        .with_batch_exporter(exporter, runtime::Tokio)
        .build();

    global::set_tracer_provider(provider.clone());
    global::set_text_map_propagator(TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(XrayPropagator::new()),
    ]));

    Ok(provider)
}

/// Build the periodic meter provider and install it globally.
fn build_meter_provider(
    channel: Channel,
    resource: Resource,
    interval: Duration,
) -> Result<SdkMeterProvider, TelemetryError> {
    let exporter = MetricExporter::builder()
        .with_tonic()
        .with_channel(channel)
        .build()
        .map_err(|e| TelemetryError::MetricExporter(e.to_string()))?;

    let reader = PeriodicReader::builder(exporter, runtime::Tokio)
        .with_interval(interval)
        .build();

    let provider = SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader)
        .build();

    global::set_meter_provider(provider.clone());

    Ok(provider)
}

/// Initialize a logger provider over the given channel and attach it to the
/// context.
///
/// Unlike traces and metrics this pipeline is not wired into
/// [`init_providers`] and is not installed as a process-wide default: the
/// provider only travels in the returned context, and its shutdown stays
/// with the caller. Log export support is still settling upstream.
///
/// # Errors
///
/// Returns [`TelemetryError::LogExporter`] when the exporter cannot be
/// constructed.
pub fn init_logger_provider(
    cx: &Context,
    channel: Channel,
    resource: Resource,
) -> Result<Context, TelemetryError> {
    let exporter = LogExporter::builder()
        .with_tonic()
        .with_channel(channel)
        .build()
        .map_err(|e| TelemetryError::LogExporter(e.to_string()))?;

    let provider = LoggerProvider::builder()
        .with_resource(resource)
        .with_log_processor(BatchLogProcessor::builder(exporter, runtime::Tokio).build())
        .build();

    Ok(with_logger_provider(cx, provider))
}

/// Install the global tracing subscriber, bridging `tracing` spans into the
/// derived tracer.
///
/// Composes an `EnvFilter` (from `RUST_LOG`, falling back to
/// `config.log_filter`), a fmt layer in `config.log_format`, and the
/// OpenTelemetry layer over `tracer`.
///
/// # Errors
///
/// Returns [`TelemetryError::Subscriber`] when a global subscriber is
/// already set.
pub fn init_subscriber(
    tracer: opentelemetry_sdk::trace::Tracer,
    config: &TelemetryConfig,
) -> Result<(), TelemetryError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);

    let result = match config.log_format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(otel_layer)
            .with(fmt::layer().json())
            .try_init(),
        _ => tracing_subscriber::registry()
            .with(env_filter)
            .with(otel_layer)
            .with(fmt::layer())
            .try_init(),
    };

    result.map_err(|e| TelemetryError::Subscriber(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{meter_from_context, tracer_from_context};
    use crate::test_support::env_guard;

    #[test]
    fn malformed_endpoint_fails_with_grpc_connection() {
        let config = TelemetryConfig::new("svc").with_endpoint("not a valid endpoint");
        let err = collector_channel(&config).unwrap_err();
        assert!(matches!(err, TelemetryError::GrpcConnection(_)));
    }

    #[test]
    fn init_aborts_on_malformed_endpoint() {
        let _guard = env_guard();
        let config = TelemetryConfig::new("svc").with_endpoint("not a valid endpoint");
        let err = init_providers(&Context::new(), &config).unwrap_err();
        assert!(matches!(err, TelemetryError::GrpcConnection(_)));
    }

    #[test]
    fn missing_ca_certificate_fails_with_grpc_connection() {
        let config = TelemetryConfig::new("svc")
            .with_endpoint("https://collector:4317")
            .with_tls(crate::config::TlsSettings {
                domain_name: None,
                ca_certificate: Some("/nonexistent/ca.pem".into()),
            });
        let err = collector_channel(&config).unwrap_err();
        assert!(matches!(err, TelemetryError::GrpcConnection(_)));
    }

    #[test]
    fn second_subscriber_install_fails() {
        let provider = TracerProvider::builder().build();
        let config = TelemetryConfig::new("subscriber-test");

        init_subscriber(provider.tracer("subscriber-test"), &config).unwrap();
        let err = init_subscriber(provider.tracer("subscriber-test"), &config).unwrap_err();
        assert!(matches!(err, TelemetryError::Subscriber(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn init_attaches_tracer_and_meter() {
        let cx = {
            let _guard = env_guard();
            let config = TelemetryConfig::new("init-test");
            let (cx, mut telemetry) = init_providers(&Context::new(), &config).unwrap();
            telemetry.shutdown();
            cx
        };

        assert!(tracer_from_context(&cx).is_ok());
        assert!(meter_from_context(&cx).is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn logger_provider_lands_in_context_only() {
        let cx = {
            let _guard = env_guard();
            let config = TelemetryConfig::new("log-test");
            let channel = collector_channel(&config).unwrap();
            let resource = build_resource(&config.service_name, false).unwrap();
            init_logger_provider(&Context::new(), channel, resource).unwrap()
        };

        let provider = crate::context::logger_provider_from_context(&cx)
            .unwrap()
            .clone();
        assert!(tracer_from_context(&cx).is_err());
        provider.shutdown().ok();
    }
}
