//! Cross-process trace context propagation.
//!
//! Provides the AWS X-Ray `X-Amzn-Trace-Id` header format as a
//! [`TextMapPropagator`], plus helpers to carry trace context through gRPC
//! metadata. The propagator is registered globally during init as part of a
//! composite with W3C Trace Context.

use opentelemetry::propagation::text_map_propagator::FieldIter;
use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry::trace::{SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState};
use opentelemetry::{Context, global};
use tonic::metadata::{MetadataKey, MetadataMap, MetadataValue};

const AWS_XRAY_TRACE_HEADER: &str = "x-amzn-trace-id";
const XRAY_VERSION: &str = "1";

/// Propagator for the AWS X-Ray tracing header.
///
/// The header carries the trace id split into an epoch prefix and a unique
/// suffix, the parent span id, and the sampling decision:
///
/// ```text
/// X-Amzn-Trace-Id: Root=1-5759e988-bd862e3fe1be46a994272793;Parent=53995c3f42cd8ad8;Sampled=1
/// ```
///
/// Malformed headers extract to the unchanged context.
#[derive(Debug, Clone)]
pub struct XrayPropagator {
    fields: [String; 1],
}

impl XrayPropagator {
    pub fn new() -> Self {
        Self {
            fields: [AWS_XRAY_TRACE_HEADER.to_string()],
        }
    }
}

impl Default for XrayPropagator {
    fn default() -> Self {
        Self::new()
    }
}

impl TextMapPropagator for XrayPropagator {
    fn inject_context(&self, cx: &Context, injector: &mut dyn Injector) {
        let span = cx.span();
        let span_context = span.span_context();
        if !span_context.is_valid() {
            return;
        }

        let trace_id = format!("{:032x}", span_context.trace_id());
        let (epoch, unique) = trace_id.split_at(8);
        let sampled = if span_context.is_sampled() { "1" } else { "0" };
        let header = format!(
            "Root={XRAY_VERSION}-{epoch}-{unique};Parent={:016x};Sampled={sampled}",
            span_context.span_id()
        );
        injector.set(AWS_XRAY_TRACE_HEADER, header);
    }

    fn extract_with_context(&self, cx: &Context, extractor: &dyn Extractor) -> Context {
        match extract_span_context(extractor) {
            Some(span_context) => cx.with_remote_span_context(span_context),
            None => cx.clone(),
        }
    }

    fn fields(&self) -> FieldIter<'_> {
        FieldIter::new(&self.fields)
    }
}

fn extract_span_context(extractor: &dyn Extractor) -> Option<SpanContext> {
    let header = extractor.get(AWS_XRAY_TRACE_HEADER)?.trim();

    let mut trace_id = None;
    let mut parent = None;
    let mut flags = TraceFlags::default();

    for part in header.split(';') {
        let (key, value) = part.trim().split_once('=')?;
        match key {
            "Root" => {
                let mut sections = value.split('-');
                if sections.next() != Some(XRAY_VERSION) {
                    return None;
                }
                let epoch = sections.next()?;
                let unique = sections.next()?;
                if sections.next().is_some() || epoch.len() != 8 || unique.len() != 24 {
                    return None;
                }
                trace_id = Some(TraceId::from_hex(&format!("{epoch}{unique}")).ok()?);
            }
            "Parent" => parent = Some(SpanId::from_hex(value).ok()?),
            "Sampled" => {
                if value == "1" {
                    flags = TraceFlags::SAMPLED;
                }
            }
            _ => {}
        }
    }

    let span_context = SpanContext::new(trace_id?, parent?, flags, true, TraceState::default());
    span_context.is_valid().then_some(span_context)
}

/// Extract trace context from incoming gRPC request metadata using the
/// globally registered propagator.
pub fn extract_context(metadata: &MetadataMap) -> Context {
    global::get_text_map_propagator(|propagator| propagator.extract(&MetadataExtractor(metadata)))
}

/// Inject the current trace context into outgoing gRPC request metadata
/// using the globally registered propagator.
pub fn inject_context(metadata: &mut MetadataMap) {
    let cx = Context::current();
    global::get_text_map_propagator(|propagator| {
        propagator.inject_context(&cx, &mut MetadataInjector(metadata));
    });
}

struct MetadataExtractor<'a>(&'a MetadataMap);

impl Extractor for MetadataExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0
            .keys()
            .filter_map(|key| match key {
                tonic::metadata::KeyRef::Ascii(k) => Some(k.as_str()),
                tonic::metadata::KeyRef::Binary(_) => None,
            })
            .collect()
    }
}

struct MetadataInjector<'a>(&'a mut MetadataMap);

impl Injector for MetadataInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        let Ok(key) = MetadataKey::from_bytes(key.as_bytes()) else {
            return;
        };
        let Ok(value) = MetadataValue::try_from(&value) else {
            return;
        };
        self.0.insert(key, value);
    }
}
