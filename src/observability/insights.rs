//! Application Insights ingestion client.
//!
//! Events are converted with the trace converter (every event becomes a
//! `MessageData` item) and shipped in batches by a background task.
//! Delivery failures are reported on stderr and the batch is dropped.
//! The queue is bounded; events arriving while it is full are dropped and
//! counted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::sync::{mpsc, oneshot};
use url::Url;

use crate::config::schema::APPLICATION_NAME;
use crate::observability::error::LoggingError;
use crate::observability::event::{value_to_string, TelemetryEvent};
use crate::observability::level::severity;
use crate::observability::telemetry::{TelemetryClient, TelemetryConnection, TelemetryConnector};

/// Maximum envelopes per request.
pub const MAX_BATCH: usize = 64;

/// Events held in memory while ingestion is slow.
pub const QUEUE_CAPACITY: usize = 8192;

/// Interval after which a partial batch is shipped.
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(2);

enum Command {
    Event(Box<TelemetryEvent>),
    Flush(oneshot::Sender<()>),
}

/// Client handle; cheap to share, the work happens on a background task.
pub struct ApplicationInsightsClient {
    tx: mpsc::Sender<Command>,
    dropped: AtomicU64,
}

impl ApplicationInsightsClient {
    /// Spawn the shipping task on the current tokio runtime.
    pub fn spawn(connection: &TelemetryConnection, timeout: Duration) -> Result<Self, LoggingError> {
        Self::spawn_with_capacity(connection, timeout, QUEUE_CAPACITY)
    }

    fn spawn_with_capacity(
        connection: &TelemetryConnection,
        timeout: Duration,
        capacity: usize,
    ) -> Result<Self, LoggingError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| LoggingError::NoRuntime)?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LoggingError::InvalidTelemetryCredential(e.to_string()))?;

        let (tx, rx) = mpsc::channel(capacity);
        let shipper = Shipper {
            http,
            track_url: connection.track_url()?,
            instrumentation_key: connection.instrumentation_key.clone(),
        };
        runtime.spawn(shipper.run(rx));
        Ok(Self {
            tx,
            dropped: AtomicU64::new(0),
        })
    }

    /// Events discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TelemetryClient for ApplicationInsightsClient {
    fn emit(&self, event: TelemetryEvent) {
        match self.tx.try_send(Command::Event(Box::new(event))) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            // The runtime is gone; nothing left to deliver to.
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }
}

/// Connector used in production.
#[derive(Debug, Clone)]
pub struct ApplicationInsightsConnector {
    timeout: Duration,
}

impl ApplicationInsightsConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl TelemetryConnector for ApplicationInsightsConnector {
    fn connect(
        &self,
        connection: &TelemetryConnection,
    ) -> Result<Arc<dyn TelemetryClient>, LoggingError> {
        Ok(Arc::new(ApplicationInsightsClient::spawn(
            connection,
            self.timeout,
        )?))
    }
}

struct Shipper {
    http: reqwest::Client,
    track_url: Url,
    instrumentation_key: String,
}

impl Shipper {
    async fn run(self, mut rx: mpsc::Receiver<Command>) {
        let mut batch: Vec<Value> = Vec::with_capacity(MAX_BATCH);
        let mut ticker = tokio::time::interval(FLUSH_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(Command::Event(event)) => {
                        batch.push(envelope(&event, &self.instrumentation_key));
                        if batch.len() >= MAX_BATCH {
                            self.ship(&mut batch).await;
                        }
                    }
                    Some(Command::Flush(done)) => {
                        self.ship(&mut batch).await;
                        let _ = done.send(());
                    }
                    None => {
                        self.ship(&mut batch).await;
                        break;
                    }
                },
                _ = ticker.tick() => {
                    self.ship(&mut batch).await;
                }
            }
        }
    }

    async fn ship(&self, batch: &mut Vec<Value>) {
        if batch.is_empty() {
            return;
        }
        let items = std::mem::take(batch);
        let count = items.len();
        match self.http.post(self.track_url.clone()).json(&items).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                eprintln!(
                    "telemetry: ingestion rejected {count} item(s) with HTTP {}",
                    response.status().as_u16()
                );
            }
            Err(e) => eprintln!("telemetry: failed to deliver {count} item(s): {e}"),
        }
    }
}

/// Trace-converter envelope for one event.
pub fn envelope(event: &TelemetryEvent, instrumentation_key: &str) -> Value {
    let mut properties: Map<String, Value> = event
        .properties
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(value_to_string(v))))
        .collect();
    properties.insert(
        "MessageTemplate".to_string(),
        Value::String(event.message_template.clone()),
    );
    properties.insert(
        "SourceContext".to_string(),
        Value::String(event.source_context.clone()),
    );
    if let Some(exception) = &event.exception {
        properties.insert("Exception".to_string(), Value::String(exception.clone()));
    }

    json!({
        "name": "Microsoft.ApplicationInsights.Message",
        "time": event.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        "iKey": instrumentation_key,
        "tags": { "ai.cloud.role": APPLICATION_NAME },
        "data": {
            "baseType": "MessageData",
            "baseData": {
                "ver": 2,
                "message": event.message_template,
                "severityLevel": severity(&event.level),
                "properties": properties,
            }
        }
    })
}
