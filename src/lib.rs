//! OTLP telemetry bootstrap for services.
//!
//! This crate wires up OpenTelemetry providers for a service in one call:
//! - Resource detection and merging (environment conventions, SDK defaults,
//!   optional AWS Lambda execution environment, explicit service name)
//! - Trace and metric export over a single shared gRPC channel to an OTLP
//!   collector
//! - W3C Trace Context + AWS X-Ray propagation
//! - Request-scoped tracer/meter handles carried in an
//!   [`opentelemetry::Context`]
//! - Aggregated best-effort shutdown of everything it created
//!
//! Batching, sampling, encoding, and delivery are the SDK's business; this
//! crate only sequences the initialization and hands out the resulting
//! handles.
//!
//! ```no_run
//! use opentelemetry::Context;
//! use otel_bootstrap::{TelemetryConfig, init_providers, tracer_from_context};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), otel_bootstrap::TelemetryError> {
//!     let config = TelemetryConfig::new("checkout").with_endpoint("http://collector:4317");
//!     let (cx, mut telemetry) = init_providers(&Context::new(), &config)?;
//!
//!     let tracer = tracer_from_context(&cx)?;
//!     // ... handle requests ...
//!
//!     telemetry.shutdown();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod init;
pub mod propagation;
pub mod resource;
pub mod shutdown;

pub use config::{TelemetryConfig, TlsSettings};
pub use context::{
    logger_provider_from_context, meter_from_context, tracer_from_context, with_logger_provider,
    with_meter, with_tracer,
};
pub use error::TelemetryError;
pub use init::{collector_channel, init_logger_provider, init_providers, init_subscriber};
pub use propagation::{XrayPropagator, extract_context, inject_context};
pub use resource::build_resource;
pub use shutdown::TelemetryGuard;

#[cfg(test)]
pub(crate) mod test_support {
    use std::env;
    use std::sync::{Mutex, MutexGuard};

    // Serializes tests that touch process environment variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    pub(crate) fn env_guard() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn set_env(key: &str, value: &str) {
        unsafe { env::set_var(key, value) }
    }

    pub(crate) fn remove_env(key: &str) {
        unsafe { env::remove_var(key) }
    }
}
