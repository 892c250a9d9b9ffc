//! Error types for telemetry initialization and context access.

use thiserror::Error;

/// Failures raised while wiring up telemetry providers or retrieving
/// handles from a context.
///
/// Initialization errors are fail-fast: none of them are retried here, and
/// the caller decides whether a failed init aborts the process.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// `OTEL_RESOURCE_ATTRIBUTES` held data that could not be parsed.
    #[error("failed to read resource attributes from environment: {0}")]
    ResourceEnv(String),

    /// Lambda detection was requested but the execution environment is
    /// missing or malformed.
    #[error("failed to detect lambda resource: {0}")]
    LambdaResource(String),

    /// The shared gRPC channel to the collector could not be built.
    #[error("failed to create gRPC channel to collector: {0}")]
    GrpcConnection(String),

    /// The OTLP span exporter could not be constructed.
    #[error("failed to create trace exporter: {0}")]
    TraceExporter(String),

    /// The OTLP metric exporter could not be constructed.
    #[error("failed to create metric exporter: {0}")]
    MetricExporter(String),

    /// The OTLP log exporter could not be constructed.
    #[error("failed to create log exporter: {0}")]
    LogExporter(String),

    /// The global tracing subscriber was already set.
    #[error("failed to set global subscriber: {0}")]
    Subscriber(String),

    /// No tracer is attached to the context.
    #[error("no tracer attached to context")]
    TracerMissing,

    /// No meter is attached to the context.
    #[error("no meter attached to context")]
    MeterMissing,

    /// No logger provider is attached to the context.
    #[error("no logger provider attached to context")]
    LoggerProviderMissing,
}
