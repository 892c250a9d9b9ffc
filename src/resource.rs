//! Resource construction and merging.
//!
//! Builds the immutable attribute set describing the running service from
//! environment conventions, SDK defaults, optional Lambda execution
//! environment detection, and an explicit service name.

use std::env;

use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions::SCHEMA_URL;
use opentelemetry_semantic_conventions::resource::SERVICE_NAME;

use crate::error::TelemetryError;

const RESOURCE_ATTRIBUTES_VAR: &str = "OTEL_RESOURCE_ATTRIBUTES";

/// Build the resource shared by every provider created during init.
///
/// Attributes are layered in order of increasing precedence: SDK defaults,
/// `OTEL_RESOURCE_ATTRIBUTES`, the Lambda execution environment (when
/// `lambda` is set), and finally the explicit `service_name`. Later layers
/// override earlier ones on key collision, so the explicit service name
/// always wins over any environment-sourced value.
///
/// # Errors
///
/// Returns [`TelemetryError::ResourceEnv`] when `OTEL_RESOURCE_ATTRIBUTES`
/// is malformed, and [`TelemetryError::LambdaResource`] when `lambda` is set
/// but the execution environment cannot be detected.
pub fn build_resource(service_name: &str, lambda: bool) -> Result<Resource, TelemetryError> {
    let env_resource = resource_from_env()?;
    let mut resource = Resource::default().merge(&env_resource);

    if lambda {
        resource = resource.merge(&lambda_resource()?);
    }

    let service = Resource::from_schema_url(
        [KeyValue::new(SERVICE_NAME, service_name.to_owned())],
        SCHEMA_URL,
    );
    Ok(resource.merge(&service))
}

/// Parse `OTEL_RESOURCE_ATTRIBUTES` (`key=value` pairs separated by commas)
/// into a resource. Unset or blank yields an empty resource; a pair without
/// `=` or with an empty key is an error.
fn resource_from_env() -> Result<Resource, TelemetryError> {
    let raw = match env::var(RESOURCE_ATTRIBUTES_VAR) {
        Ok(raw) => raw,
        Err(env::VarError::NotPresent) => return Ok(Resource::empty()),
        Err(e) => return Err(TelemetryError::ResourceEnv(e.to_string())),
    };

    let mut attributes = Vec::new();
    for pair in raw.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            TelemetryError::ResourceEnv(format!("attribute `{pair}` is missing `=`"))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(TelemetryError::ResourceEnv(format!(
                "attribute `{pair}` has an empty key"
            )));
        }
        attributes.push(KeyValue::new(key.to_owned(), value.trim().to_owned()));
    }

    Ok(Resource::new(attributes))
}

/// Detect the AWS Lambda execution environment from its reserved variables.
fn lambda_resource() -> Result<Resource, TelemetryError> {
    let function_name = env::var("AWS_LAMBDA_FUNCTION_NAME").map_err(|_| {
        TelemetryError::LambdaResource("AWS_LAMBDA_FUNCTION_NAME is not set".to_string())
    })?;

    let mut attributes = vec![
        KeyValue::new("cloud.provider", "aws"),
        KeyValue::new("cloud.platform", "aws_lambda"),
        KeyValue::new("faas.name", function_name),
    ];

    if let Ok(region) = env::var("AWS_REGION") {
        attributes.push(KeyValue::new("cloud.region", region));
    }
    if let Ok(version) = env::var("AWS_LAMBDA_FUNCTION_VERSION") {
        attributes.push(KeyValue::new("faas.version", version));
    }
    if let Ok(log_stream) = env::var("AWS_LAMBDA_LOG_STREAM_NAME") {
        attributes.push(KeyValue::new("faas.instance", log_stream));
    }
    if let Ok(memory) = env::var("AWS_LAMBDA_FUNCTION_MEMORY_SIZE") {
        let mib: i64 = memory.parse().map_err(|_| {
            TelemetryError::LambdaResource(format!(
                "AWS_LAMBDA_FUNCTION_MEMORY_SIZE `{memory}` is not an integer"
            ))
        })?;
        // Reported in MiB by the platform; the attribute is in bytes.
        attributes.push(KeyValue::new("faas.max_memory", mib * 1024 * 1024));
    }

    Ok(Resource::new(attributes))
}
