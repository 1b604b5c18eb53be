//! Structured logging composition.
//!
//! # Responsibilities
//! - Read level, overrides and enrichment from the configuration namespace
//! - Describe the sink set ([`LoggerSpec`]) before anything is built
//! - Build one subscriber from a [`LoggerSpec`] and install it process-wide
//!
//! # Design Decisions
//! - The telemetry credential is checked first; a missing credential fails
//!   composition before any sink exists
//! - Console and telemetry sinks are always present; the file sink is a
//!   build-time switch
//! - The built [`Logger`] is a handle owned by bootstrap; tests scope it with
//!   `tracing::dispatcher::with_default` instead of installing it

use std::path::PathBuf;
use std::sync::Arc;

use tracing::Dispatch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Layer;

use crate::config::namespace::ConfigurationNamespace;
use crate::config::schema::{keys, StartupOptions, APPLICATION_NAME};
use crate::observability::error::LoggingError;
use crate::observability::file::{rolling_writer, PipeFormat};
use crate::observability::level::{directive_name, parse_level};
use crate::observability::telemetry::{
    TelemetryClient, TelemetryConnection, TelemetryConnector, TelemetryLayer,
};

/// How file names roll over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rollover {
    Daily,
}

/// How events are converted for the telemetry backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventConversion {
    /// Every event becomes a trace/message item.
    Trace,
}

/// Where events go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkDescriptor {
    Console,
    File {
        directory: PathBuf,
        file_prefix: String,
        file_suffix: String,
        rollover: Rollover,
        /// Events below this level are not written to the file.
        restricted_to: LevelFilter,
    },
    RemoteTelemetry {
        connection: TelemetryConnection,
        conversion: EventConversion,
    },
}

/// Complete, immutable description of the process logger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerSpec {
    pub minimum_level: LevelFilter,
    /// Per-target levels, `(module path, level)`.
    pub overrides: Vec<(String, LevelFilter)>,
    /// Static properties attached to every event.
    pub enrichment: Vec<(String, String)>,
    pub sinks: Vec<SinkDescriptor>,
}

impl LoggerSpec {
    /// `EnvFilter` directives for the level and overrides.
    pub fn directives(&self) -> String {
        let mut directives = vec![directive_name(self.minimum_level).to_string()];
        directives.extend(
            self.overrides
                .iter()
                .map(|(target, level)| format!("{target}={}", directive_name(*level))),
        );
        directives.join(",")
    }

    pub fn telemetry_connection(&self) -> Option<&TelemetryConnection> {
        self.sinks.iter().find_map(|sink| match sink {
            SinkDescriptor::RemoteTelemetry { connection, .. } => Some(connection),
            _ => None,
        })
    }
}

/// Builds [`LoggerSpec`]s from configuration.
#[derive(Debug, Clone)]
pub struct LoggerComposer {
    file_sink: bool,
    log_directory: PathBuf,
}

impl LoggerComposer {
    pub const FILE_PREFIX: &'static str = "appLog";
    pub const FILE_SUFFIX: &'static str = "txt";

    /// `log_directory` receives the file sink when it is enabled.
    pub fn new(options: &StartupOptions, log_directory: impl Into<PathBuf>) -> Self {
        Self {
            file_sink: options.file_sink,
            log_directory: log_directory.into(),
        }
    }

    /// Describe the logger for `namespace`.
    pub fn compose(&self, namespace: &ConfigurationNamespace) -> Result<LoggerSpec, LoggingError> {
        let credential = namespace
            .get_non_empty(keys::TELEMETRY_CONNECTION_STRING)
            .ok_or(LoggingError::MissingTelemetryCredential(
                keys::TELEMETRY_CONNECTION_STRING,
            ))?;
        let connection = TelemetryConnection::parse(credential)?;

        let minimum_level = match namespace
            .get_non_empty(keys::MINIMUM_LEVEL_DEFAULT)
            .or_else(|| namespace.get_non_empty(keys::MINIMUM_LEVEL))
        {
            Some(raw) => parse_level(raw)?,
            None => LevelFilter::INFO,
        };

        let overrides = namespace
            .section(keys::MINIMUM_LEVEL_OVERRIDE)
            .map(|(target, raw)| Ok((target.replace('.', "::"), parse_level(raw)?)))
            .collect::<Result<Vec<(String, LevelFilter)>, LoggingError>>()?;

        let mut enrichment = vec![("ApplicationName".to_string(), APPLICATION_NAME.to_string())];
        for (name, value) in namespace.section(keys::ENRICHMENT_PROPERTIES) {
            match enrichment.iter_mut().find(|(existing, _)| existing == name) {
                Some(slot) => slot.1 = value.to_string(),
                None => enrichment.push((name.to_string(), value.to_string())),
            }
        }

        let mut sinks = vec![SinkDescriptor::Console];
        if self.file_sink {
            sinks.push(SinkDescriptor::File {
                directory: self.log_directory.clone(),
                file_prefix: Self::FILE_PREFIX.to_string(),
                file_suffix: Self::FILE_SUFFIX.to_string(),
                rollover: Rollover::Daily,
                restricted_to: LevelFilter::INFO,
            });
        }
        sinks.push(SinkDescriptor::RemoteTelemetry {
            connection,
            conversion: EventConversion::Trace,
        });

        Ok(LoggerSpec {
            minimum_level,
            overrides,
            enrichment,
            sinks,
        })
    }

    /// Build the logger described by `spec` and make it the process-wide default.
    pub fn install(
        spec: &LoggerSpec,
        telemetry: &dyn TelemetryConnector,
    ) -> Result<Logger, LoggingError> {
        let logger = Self::build(spec, telemetry)?;
        logger.install_global()?;
        Ok(logger)
    }

    /// Build the logger described by `spec` without installing it.
    pub fn build(
        spec: &LoggerSpec,
        telemetry: &dyn TelemetryConnector,
    ) -> Result<Logger, LoggingError> {
        let filter = EnvFilter::builder()
            .parse(spec.directives())
            .map_err(|e| LoggingError::InvalidDirectives(e.to_string()))?;

        let mut layers: Vec<Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>> =
            Vec::new();
        let mut guards = Vec::new();
        let mut client: Option<Arc<dyn TelemetryClient>> = None;

        for sink in &spec.sinks {
            match sink {
                SinkDescriptor::Console => {
                    layers.push(tracing_subscriber::fmt::layer().with_target(true).boxed());
                }
                SinkDescriptor::File {
                    directory,
                    file_prefix,
                    file_suffix,
                    rollover: Rollover::Daily,
                    restricted_to,
                } => {
                    let (writer, guard) = rolling_writer(directory, file_prefix, file_suffix)?;
                    guards.push(guard);
                    layers.push(
                        tracing_subscriber::fmt::layer()
                            .event_format(PipeFormat)
                            .with_ansi(false)
                            .with_writer(writer)
                            .with_filter(*restricted_to)
                            .boxed(),
                    );
                }
                SinkDescriptor::RemoteTelemetry {
                    connection,
                    conversion: EventConversion::Trace,
                } => {
                    let connected = telemetry.connect(connection)?;
                    layers.push(TelemetryLayer::new(connected.clone(), &spec.enrichment).boxed());
                    client = Some(connected);
                }
            }
        }

        let subscriber = tracing_subscriber::registry().with(layers).with(filter);
        Ok(Logger {
            dispatch: Dispatch::new(subscriber),
            telemetry: client,
            _guards: guards,
        })
    }
}

/// Built logger. Holds the file writer guards and the telemetry client for
/// as long as it lives.
pub struct Logger {
    dispatch: Dispatch,
    telemetry: Option<Arc<dyn TelemetryClient>>,
    _guards: Vec<WorkerGuard>,
}

impl Logger {
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Make this logger the process-wide default. Succeeds at most once per process.
    pub fn install_global(&self) -> Result<(), LoggingError> {
        tracing::dispatcher::set_global_default(self.dispatch.clone())
            .map_err(|_| LoggingError::AlreadyInstalled)
    }

    /// Deliver everything the telemetry sink has queued.
    pub async fn flush(&self) {
        if let Some(client) = &self.telemetry {
            client.flush().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::event::TelemetryEvent;

    fn namespace(pairs: &[(&str, &str)]) -> ConfigurationNamespace {
        pairs.iter().copied().collect()
    }

    fn composer(file_sink: bool) -> LoggerComposer {
        let options = StartupOptions {
            file_sink,
            ..StartupOptions::from_build()
        };
        LoggerComposer::new(&options, "Logs")
    }

    const CREDENTIAL: (&str, &str) = (keys::TELEMETRY_CONNECTION_STRING, "InstrumentationKey=k");

    #[test]
    fn missing_credential_fails() {
        for ns in [
            namespace(&[]),
            namespace(&[(keys::TELEMETRY_CONNECTION_STRING, "")]),
            namespace(&[(keys::MINIMUM_LEVEL, "Debug")]),
        ] {
            assert!(matches!(
                composer(true).compose(&ns),
                Err(LoggingError::MissingTelemetryCredential(_))
            ));
        }
    }

    #[test]
    fn missing_credential_wins_over_other_errors() {
        let ns = namespace(&[(keys::MINIMUM_LEVEL, "loud")]);
        assert!(matches!(
            composer(false).compose(&ns),
            Err(LoggingError::MissingTelemetryCredential(_))
        ));
    }

    #[test]
    fn default_spec_has_console_and_telemetry() {
        let spec = composer(false).compose(&namespace(&[CREDENTIAL])).unwrap();
        assert_eq!(spec.minimum_level, LevelFilter::INFO);
        assert_eq!(spec.sinks.len(), 2);
        assert_eq!(spec.sinks[0], SinkDescriptor::Console);
        assert!(matches!(
            spec.sinks[1],
            SinkDescriptor::RemoteTelemetry {
                conversion: EventConversion::Trace,
                ..
            }
        ));
        assert_eq!(
            spec.enrichment,
            vec![("ApplicationName".to_string(), APPLICATION_NAME.to_string())]
        );
        assert_eq!(spec.directives(), "info");
    }

    #[test]
    fn file_sink_follows_build_switch() {
        let spec = composer(true).compose(&namespace(&[CREDENTIAL])).unwrap();
        assert_eq!(spec.sinks.len(), 3);
        assert!(matches!(
            &spec.sinks[1],
            SinkDescriptor::File { file_prefix, restricted_to, .. }
                if file_prefix == "appLog" && *restricted_to == LevelFilter::INFO
        ));
    }

    #[test]
    fn levels_overrides_and_properties_from_namespace() {
        let spec = composer(false)
            .compose(&namespace(&[
                CREDENTIAL,
                (keys::MINIMUM_LEVEL_DEFAULT, "Debug"),
                ("Serilog:MinimumLevel:Override:tower_http", "Warning"),
                ("Serilog:MinimumLevel:Override:hyper.proto", "Error"),
                ("Serilog:Properties:Region", "westeurope"),
            ]))
            .unwrap();
        assert_eq!(spec.minimum_level, LevelFilter::DEBUG);
        assert_eq!(spec.directives(), "debug,hyper::proto=error,tower_http=warn");
        assert!(spec
            .enrichment
            .contains(&("Region".to_string(), "westeurope".to_string())));
    }

    #[test]
    fn invalid_level_is_rejected() {
        let err = composer(false)
            .compose(&namespace(&[CREDENTIAL, (keys::MINIMUM_LEVEL, "chatty")]))
            .unwrap_err();
        assert!(matches!(err, LoggingError::InvalidLevel(_)));
    }

    #[derive(Default)]
    struct Capture(std::sync::Mutex<Vec<TelemetryEvent>>);

    #[async_trait::async_trait]
    impl TelemetryClient for Capture {
        fn emit(&self, event: TelemetryEvent) {
            self.0.lock().unwrap().push(event);
        }

        async fn flush(&self) {}
    }

    struct CaptureConnector(Arc<Capture>);

    impl TelemetryConnector for CaptureConnector {
        fn connect(
            &self,
            _: &TelemetryConnection,
        ) -> Result<Arc<dyn TelemetryClient>, LoggingError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn file_sink_keeps_information_and_above() {
        let dir = tempfile::tempdir().unwrap();
        let options = StartupOptions {
            file_sink: true,
            ..StartupOptions::from_build()
        };
        let spec = LoggerComposer::new(&options, dir.path())
            .compose(&namespace(&[
                CREDENTIAL,
                (keys::MINIMUM_LEVEL, "Debug"),
                ("Serilog:Properties:env", "static"),
            ]))
            .unwrap();

        let capture = Arc::new(Capture::default());
        let logger = LoggerComposer::build(&spec, &CaptureConnector(capture.clone())).unwrap();
        tracing::dispatcher::with_default(logger.dispatch(), || {
            tracing::debug!("debug-line");
            tracing::info!(env = "call", "info-line");
        });
        drop(logger);

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        let contents = std::fs::read_to_string(files[0].as_ref().unwrap().path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1, "{contents}");
        assert!(lines[0].contains("|INF|"));
        assert!(lines[0].ends_with("info-line env=call"), "{contents}");

        let events = capture.0.lock().unwrap();
        let seen: Vec<(&str, &serde_json::Value)> = events
            .iter()
            .map(|e| (e.message_template.as_str(), &e.properties["env"]))
            .collect();
        assert_eq!(
            seen,
            vec![
                ("debug-line", &serde_json::json!("static")),
                ("info-line", &serde_json::json!("call")),
            ]
        );
    }

    #[test]
    fn malformed_credential_is_rejected() {
        let err = composer(false)
            .compose(&namespace(&[(keys::TELEMETRY_CONNECTION_STRING, "garbage")]))
            .unwrap_err();
        assert!(matches!(err, LoggingError::InvalidTelemetryCredential(_)));
    }
}
