//! Request-scoped telemetry handles.
//!
//! Initialized handles travel down a call chain inside an
//! [`opentelemetry::Context`] instead of package-level globals. Values are
//! immutable once attached, so concurrent readers never race. Each handle
//! lives under a private key, so other context users cannot collide with it.

use opentelemetry::Context;
use opentelemetry::metrics::Meter;
use opentelemetry_sdk::logs::LoggerProvider;
use opentelemetry_sdk::trace::Tracer;

use crate::error::TelemetryError;

#[derive(Clone)]
struct TracerSlot(Tracer);

#[derive(Clone)]
struct MeterSlot(Meter);

#[derive(Clone)]
struct LoggerProviderSlot(LoggerProvider);

/// Return a context with the tracer attached.
pub fn with_tracer(cx: &Context, tracer: Tracer) -> Context {
    cx.with_value(TracerSlot(tracer))
}

/// Return a context with the meter attached.
pub fn with_meter(cx: &Context, meter: Meter) -> Context {
    cx.with_value(MeterSlot(meter))
}

/// Return a context with the logger provider attached.
pub fn with_logger_provider(cx: &Context, provider: LoggerProvider) -> Context {
    cx.with_value(LoggerProviderSlot(provider))
}

/// Retrieve the tracer attached to the context.
///
/// # Errors
///
/// Returns [`TelemetryError::TracerMissing`] when no tracer is attached.
pub fn tracer_from_context(cx: &Context) -> Result<&Tracer, TelemetryError> {
    cx.get::<TracerSlot>()
        .map(|slot| &slot.0)
        .ok_or(TelemetryError::TracerMissing)
}

/// Retrieve the meter attached to the context.
///
/// # Errors
///
/// Returns [`TelemetryError::MeterMissing`] when no meter is attached.
pub fn meter_from_context(cx: &Context) -> Result<&Meter, TelemetryError> {
    cx.get::<MeterSlot>()
        .map(|slot| &slot.0)
        .ok_or(TelemetryError::MeterMissing)
}

/// Retrieve the logger provider attached to the context.
///
/// # Errors
///
/// Returns [`TelemetryError::LoggerProviderMissing`] when no logger provider
/// is attached.
pub fn logger_provider_from_context(cx: &Context) -> Result<&LoggerProvider, TelemetryError> {
    cx.get::<LoggerProviderSlot>()
        .map(|slot| &slot.0)
        .ok_or(TelemetryError::LoggerProviderMissing)
}
