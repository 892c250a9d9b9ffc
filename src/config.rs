//! Telemetry configuration.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for telemetry initialization.
///
/// Immutable once passed to [`init_providers`](crate::init::init_providers).
/// Typically built from the process environment with
/// [`TelemetryConfig::from_env`], or assembled explicitly with the `with_*`
/// setters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Service name, used as the `service.name` resource attribute and as
    /// the instrumentation scope of the derived tracer and meter.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// OTLP collector endpoint (e.g. `http://localhost:4317` for gRPC).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Transport security material for the collector channel. `None` means
    /// plaintext.
    #[serde(default)]
    pub tls: Option<TlsSettings>,

    /// Whether the service runs on AWS Lambda. Enables execution-environment
    /// resource detection.
    #[serde(default)]
    pub lambda: bool,

    /// Interval between periodic metric exports, in seconds.
    #[serde(default = "default_metric_interval_secs")]
    pub metric_interval_secs: u64,

    /// Log level filter used when `RUST_LOG` is unset
    /// (e.g. `"info"`, `"my_service=debug,tower_http=info"`).
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Log output format for the subscriber: `"json"` or `"plain"`.
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

/// Transport security material for the collector channel.
///
/// System roots are always trusted; the optional fields add an override for
/// the TLS server name and an extra CA certificate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsSettings {
    /// Server name to verify against, when it differs from the endpoint
    /// host.
    #[serde(default)]
    pub domain_name: Option<String>,

    /// Path to a PEM-encoded CA certificate to trust in addition to the
    /// system roots.
    #[serde(default)]
    pub ca_certificate: Option<PathBuf>,
}

fn default_service_name() -> String {
    "unknown_service".to_string()
}

fn default_endpoint() -> String {
    "http://localhost:4317".to_string()
}

const fn default_metric_interval_secs() -> u64 {
    1
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "plain".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            endpoint: default_endpoint(),
            tls: None,
            lambda: false,
            metric_interval_secs: default_metric_interval_secs(),
            log_filter: default_log_filter(),
            log_format: default_log_format(),
        }
    }
}

impl TelemetryConfig {
    /// Create a configuration for the given service with default settings.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Read configuration from the process environment.
    ///
    /// Honors `OTEL_SERVICE_NAME` and `OTEL_EXPORTER_OTLP_ENDPOINT`, and
    /// treats the presence of `AWS_LAMBDA_FUNCTION_NAME` as running on
    /// Lambda. Unset variables fall back to the documented defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(name) = env::var("OTEL_SERVICE_NAME")
            && !name.is_empty()
        {
            config.service_name = name;
        }
        if let Ok(endpoint) = env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            && !endpoint.is_empty()
        {
            config.endpoint = endpoint;
        }
        config.lambda = env::var("AWS_LAMBDA_FUNCTION_NAME").is_ok();
        config
    }

    /// Set the collector endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the transport security material.
    pub fn with_tls(mut self, tls: TlsSettings) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Mark the service as running on AWS Lambda.
    pub fn with_lambda(mut self, lambda: bool) -> Self {
        self.lambda = lambda;
        self
    }

    /// Set the periodic metric export interval, in seconds.
    pub fn with_metric_interval_secs(mut self, secs: u64) -> Self {
        self.metric_interval_secs = secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{env_guard, remove_env, set_env};

    #[test]
    fn config_has_sensible_defaults() {
        let config = TelemetryConfig::default();

        assert_eq!(config.service_name, "unknown_service");
        assert_eq!(config.endpoint, "http://localhost:4317");
        assert!(config.tls.is_none());
        assert!(!config.lambda);
        assert_eq!(config.metric_interval_secs, 1);
        assert_eq!(config.log_filter, "info");
        assert_eq!(config.log_format, "plain");
    }

    #[test]
    fn config_serde_round_trip() {
        let config = TelemetryConfig::new("checkout")
            .with_endpoint("https://collector:4317")
            .with_tls(TlsSettings {
                domain_name: Some("collector.internal".to_string()),
                ca_certificate: None,
            })
            .with_lambda(true)
            .with_metric_interval_secs(5);

        let json = serde_json::to_string(&config).unwrap();
        let parsed: TelemetryConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.service_name, "checkout");
        assert_eq!(parsed.endpoint, "https://collector:4317");
        assert_eq!(
            parsed.tls.unwrap().domain_name.as_deref(),
            Some("collector.internal")
        );
        assert!(parsed.lambda);
        assert_eq!(parsed.metric_interval_secs, 5);
    }

    #[test]
    fn config_deserializes_with_missing_fields() {
        let json = r#"{"service_name": "billing"}"#;
        let parsed: TelemetryConfig = serde_json::from_str(json).unwrap();

        assert_eq!(parsed.service_name, "billing");
        assert_eq!(parsed.endpoint, "http://localhost:4317");
        assert!(!parsed.lambda);
        assert_eq!(parsed.metric_interval_secs, 1);
    }

    #[test]
    fn from_env_reads_otel_variables() {
        let _guard = env_guard();
        set_env("OTEL_SERVICE_NAME", "orders");
        set_env("OTEL_EXPORTER_OTLP_ENDPOINT", "http://otel:4317");
        remove_env("AWS_LAMBDA_FUNCTION_NAME");

        let config = TelemetryConfig::from_env();
        assert_eq!(config.service_name, "orders");
        assert_eq!(config.endpoint, "http://otel:4317");
        assert!(!config.lambda);

        remove_env("OTEL_SERVICE_NAME");
        remove_env("OTEL_EXPORTER_OTLP_ENDPOINT");
    }

    #[test]
    fn from_env_detects_lambda() {
        let _guard = env_guard();
        remove_env("OTEL_SERVICE_NAME");
        remove_env("OTEL_EXPORTER_OTLP_ENDPOINT");
        set_env("AWS_LAMBDA_FUNCTION_NAME", "my-function");

        let config = TelemetryConfig::from_env();
        assert!(config.lambda);
        assert_eq!(config.service_name, "unknown_service");

        remove_env("AWS_LAMBDA_FUNCTION_NAME");
    }
}
