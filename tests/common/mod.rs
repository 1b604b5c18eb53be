//! Shared fixtures for integration tests: in-memory configuration store,
//! capturing telemetry backend, settings directories.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use weather_telemetry::config::connection_string::StoreConnectionString;
use weather_telemetry::config::error::ConfigResult;
use weather_telemetry::config::remote::{ConfigSetting, ConfigStore, KeySelector, StoreConnector};
use weather_telemetry::config::secrets::{SecretReference, SecretResolver};
use weather_telemetry::config::StartupOptions;
use weather_telemetry::lifecycle::{Collaborators, InstallMode, Startup};
use weather_telemetry::observability::event::TelemetryEvent;
use weather_telemetry::observability::{
    LoggingError, TelemetryClient, TelemetryConnection, TelemetryConnector,
};

/// Connection string accepted by [`MemoryStore`]; never dialled.
pub const STORE_CONNECTION_STRING: &str =
    "Endpoint=https://weather-config.example.io;Id=test-id;Secret=c2VjcmV0";

pub const TELEMETRY_KEY: &str = "InstrumentationKey=00000000-0000-0000-0000-000000000001";

/// In-memory store; counts how often it was opened.
#[derive(Default)]
pub struct MemoryStore {
    settings: Vec<ConfigSetting>,
    connects: AtomicUsize,
}

impl MemoryStore {
    pub fn new(settings: Vec<ConfigSetting>) -> Self {
        Self {
            settings,
            connects: AtomicUsize::new(0),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

struct MemoryConnection(Vec<ConfigSetting>);

#[async_trait]
impl ConfigStore for MemoryConnection {
    async fn list(&self, selector: &KeySelector) -> ConfigResult<Vec<ConfigSetting>> {
        Ok(self
            .0
            .iter()
            .filter(|s| selector.matches(&s.key, s.label.as_deref()))
            .cloned()
            .collect())
    }
}

impl StoreConnector for MemoryStore {
    fn connect(&self, _: &StoreConnectionString) -> ConfigResult<Box<dyn ConfigStore>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection(self.settings.clone())))
    }
}

/// Resolves every secret reference to `secret:<key>`.
pub struct EchoSecrets;

#[async_trait]
impl SecretResolver for EchoSecrets {
    async fn resolve(&self, key: &str, _: &SecretReference) -> ConfigResult<String> {
        Ok(format!("secret:{key}"))
    }
}

/// Telemetry backend keeping every event in memory.
#[derive(Default)]
pub struct CaptureTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
    connects: AtomicUsize,
}

impl CaptureTelemetry {
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn find(&self, message: &str) -> Option<TelemetryEvent> {
        self.events()
            .into_iter()
            .find(|e| e.message_template == message)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

struct CaptureClient(Arc<CaptureTelemetry>);

#[async_trait]
impl TelemetryClient for CaptureClient {
    fn emit(&self, event: TelemetryEvent) {
        self.0.events.lock().unwrap().push(event);
    }

    async fn flush(&self) {}
}

/// Connector handing out clients that record into a shared [`CaptureTelemetry`].
pub struct CaptureConnector(pub Arc<CaptureTelemetry>);

impl TelemetryConnector for CaptureConnector {
    fn connect(&self, _: &TelemetryConnection) -> Result<Arc<dyn TelemetryClient>, LoggingError> {
        self.0.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(CaptureClient(self.0.clone())))
    }
}

/// Collaborators plus handles to inspect them afterwards.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub telemetry: Arc<CaptureTelemetry>,
    pub collaborators: Collaborators,
}

impl Harness {
    pub fn new(settings: Vec<ConfigSetting>) -> Self {
        let store = Arc::new(MemoryStore::new(settings));
        let telemetry = Arc::new(CaptureTelemetry::default());
        let collaborators = Collaborators {
            store: store.clone(),
            secrets: Arc::new(EchoSecrets),
            telemetry: Arc::new(CaptureConnector(telemetry.clone())),
        };
        Self {
            store,
            telemetry,
            collaborators,
        }
    }
}

pub fn setting(key: &str, label: &str, value: &str) -> ConfigSetting {
    ConfigSetting {
        key: key.to_string(),
        label: Some(label.to_string()),
        value: Some(value.to_string()),
        content_type: None,
    }
}

/// Remote settings every successful startup needs.
pub fn common_settings() -> Vec<ConfigSetting> {
    vec![
        setting("ApplicationInsightsConnectionString", "Common", TELEMETRY_KEY),
        setting("appConfig:Theme", "Common", "dark"),
        setting("WeatherTelemetry:Greeting", "WeatherTelemetry", "hello"),
    ]
}

pub fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Content root containing `appsettings.toml` with `content`.
pub fn content_root(content: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("appsettings.toml"), content).unwrap();
    dir
}

/// Settings for a developer machine pointing at the store.
pub fn local_settings() -> String {
    format!(
        "[AppSettings]\nisLocal = true\nAzureAppConfigurationConnectionString = \"{STORE_CONNECTION_STRING}\"\n"
    )
}

/// Startup that keeps its logger scoped to the test.
pub fn scoped_startup(
    env_pairs: &[(&str, &str)],
    root: &TempDir,
) -> Startup<HashMap<String, String>> {
    let options = StartupOptions {
        file_sink: false,
        print_config: false,
        remote_timeout: Duration::from_secs(5),
    };
    Startup::new(env(env_pairs), root.path(), options).install_mode(InstallMode::Scoped)
}
