//! Remote telemetry sink.
//!
//! # Responsibilities
//! - Turn tracing events into [`TelemetryEvent`]s
//! - Merge enrichment, ambient span fields and call-site fields
//! - Hand events to a [`TelemetryClient`] without blocking the caller
//!
//! # Design Decisions
//! - Precedence, lowest first: static enrichment, spans (root → leaf),
//!   call-site fields
//! - Events from the HTTP stack that ships telemetry are skipped so the
//!   sink never feeds itself

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;
use url::Url;

use crate::config::connection_string::parse_segments;
use crate::observability::error::LoggingError;
use crate::observability::event::{FieldCollector, TelemetryEvent};

/// Ingestion endpoint used when the connection string names none.
pub const DEFAULT_INGESTION_ENDPOINT: &str = "https://dc.services.visualstudio.com/";

/// Targets belonging to the transport that ships telemetry.
const TRANSPORT_TARGETS: [&str; 5] = ["hyper", "hyper_util", "reqwest", "h2", "rustls"];

/// Narrow interface to a telemetry backend.
#[async_trait]
pub trait TelemetryClient: Send + Sync {
    /// Queue an event. Must not block and must not log through `tracing`.
    fn emit(&self, event: TelemetryEvent);

    /// Deliver everything queued so far.
    async fn flush(&self);
}

/// Parsed telemetry credential.
#[derive(Clone, PartialEq, Eq)]
pub struct TelemetryConnection {
    pub instrumentation_key: String,
    pub ingestion_endpoint: Url,
}

impl std::fmt::Debug for TelemetryConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryConnection")
            .field("instrumentation_key", &"****")
            .field("ingestion_endpoint", &self.ingestion_endpoint.as_str())
            .finish()
    }
}

impl TelemetryConnection {
    /// Parse `InstrumentationKey=…;IngestionEndpoint=…`.
    pub fn parse(raw: &str) -> Result<Self, LoggingError> {
        let segments = parse_segments(raw);
        let instrumentation_key = segments
            .get("instrumentationkey")
            .filter(|k| !k.is_empty())
            .cloned()
            .ok_or_else(|| {
                LoggingError::InvalidTelemetryCredential("missing 'InstrumentationKey'".into())
            })?;

        let mut endpoint = segments
            .get("ingestionendpoint")
            .filter(|e| !e.is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_INGESTION_ENDPOINT.to_string());
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        let ingestion_endpoint = Url::parse(&endpoint).map_err(|e| {
            LoggingError::InvalidTelemetryCredential(format!("bad IngestionEndpoint: {e}"))
        })?;

        Ok(Self {
            instrumentation_key,
            ingestion_endpoint,
        })
    }

    /// Connection string with the instrumentation key masked, for console output.
    pub fn redacted(&self) -> String {
        format!(
            "InstrumentationKey=****;IngestionEndpoint={}",
            self.ingestion_endpoint
        )
    }

    /// URL events are posted to.
    pub fn track_url(&self) -> Result<Url, LoggingError> {
        self.ingestion_endpoint
            .join("v2/track")
            .map_err(|e| LoggingError::InvalidTelemetryCredential(e.to_string()))
    }
}

/// Creates telemetry clients once the credential is known.
pub trait TelemetryConnector: Send + Sync {
    fn connect(
        &self,
        connection: &TelemetryConnection,
    ) -> Result<Arc<dyn TelemetryClient>, LoggingError>;
}

/// Span fields stored in the registry for ambient context.
#[derive(Debug, Default)]
struct SpanFields(Map<String, Value>);

/// Layer forwarding every event to a [`TelemetryClient`].
pub struct TelemetryLayer {
    client: Arc<dyn TelemetryClient>,
    enrichment: Map<String, Value>,
}

impl TelemetryLayer {
    pub fn new(client: Arc<dyn TelemetryClient>, enrichment: &[(String, String)]) -> Self {
        Self {
            client,
            enrichment: enrichment
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        }
    }
}

fn is_transport_target(target: &str) -> bool {
    TRANSPORT_TARGETS.iter().any(|t| {
        target == *t
            || target
                .strip_prefix(t)
                .is_some_and(|rest| rest.starts_with("::"))
    })
}

impl<S> Layer<S> for TelemetryLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut collector = FieldCollector::default();
        attrs.record(&mut collector);
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(SpanFields(collector.fields));
        }
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut collector = FieldCollector::default();
        values.record(&mut collector);

        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<SpanFields>() {
            Some(fields) => fields.0.extend(collector.fields),
            None => extensions.insert(SpanFields(collector.fields)),
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if is_transport_target(metadata.target()) {
            return;
        }

        let mut properties = self.enrichment.clone();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(fields) = span.extensions().get::<SpanFields>() {
                    properties.extend(fields.0.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
        }

        let mut collector = FieldCollector::default();
        event.record(&mut collector);
        let exception = collector.take_exception();
        properties.extend(collector.fields);

        self.client.emit(TelemetryEvent {
            timestamp: chrono::Utc::now(),
            level: *metadata.level(),
            message_template: collector.message.unwrap_or_default(),
            source_context: metadata.target().to_string(),
            properties,
            exception,
        });
    }
}
