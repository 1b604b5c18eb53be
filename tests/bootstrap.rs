mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Days, NaiveDate};
use tower::ServiceExt;
use tracing::instrument::WithSubscriber;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use weather_telemetry::config::{ConfigError, EnvironmentMode};
use weather_telemetry::forecast::WeatherForecast;
use weather_telemetry::lifecycle::{Collaborators, StartupError};
use weather_telemetry::observability::insights::ApplicationInsightsConnector;
use weather_telemetry::observability::LoggingError;

use common::*;

#[tokio::test]
async fn local_startup_announces_mode_and_serves_forecast() {
    let root = content_root(&local_settings());
    let harness = Harness::new(common_settings());

    let ready = scoped_startup(&[], &root)
        .prepare_with(&harness.collaborators)
        .await
        .unwrap();

    assert_eq!(ready.mode(), EnvironmentMode::Local);
    assert_eq!(ready.namespace().get("IsLocal"), Some("true"));
    assert_eq!(ready.namespace().get("appConfig:Theme"), Some("dark"));
    assert_eq!(
        ready.namespace().get("WeatherTelemetry:Greeting"),
        Some("hello")
    );
    assert_eq!(harness.store.connects(), 1);

    let started = harness.telemetry.find("Application started").unwrap();
    assert_eq!(started.properties["environment"], "Local");
    assert_eq!(started.properties["ApplicationName"], "weather-telemetry");

    let response = ready
        .router()
        .oneshot(
            Request::builder()
                .uri("/WeatherForecast")
                .header("x-request-id", "req-1")
                .body(Body::empty())
                .unwrap(),
        )
        .with_subscriber(ready.logger().dispatch().clone())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let records: Vec<WeatherForecast> = serde_json::from_slice(&body).unwrap();
    assert_eq!(records.len(), 5);

    let tomorrow = chrono::Local::now()
        .date_naive()
        .checked_add_days(Days::new(1))
        .unwrap();
    let dates: Vec<NaiveDate> = records.iter().map(|r| r.date).collect();
    assert_eq!(dates[0], tomorrow);
    for pair in dates.windows(2) {
        assert_eq!(pair[0].checked_add_days(Days::new(1)), Some(pair[1]));
    }

    let requested = harness.telemetry.find("WeatherForecast requested").unwrap();
    assert_eq!(requested.properties["environment"], "Local");
    assert_eq!(requested.properties["request_id"], "req-1");
    assert_eq!(requested.properties["path"], "/WeatherForecast");

    let completed = harness.telemetry.find("HTTP request completed").unwrap();
    assert_eq!(completed.properties["status"], 200);
    assert_eq!(completed.properties["method"], "GET");
}

#[tokio::test]
async fn remote_mode_without_connection_string_never_starts() {
    let root = content_root(&local_settings());
    let harness = Harness::new(common_settings());

    let err = scoped_startup(&[("isLocal", "false")], &root)
        .prepare_with(&harness.collaborators)
        .await
        .err()
        .unwrap();

    assert!(matches!(
        err,
        StartupError::Config(ConfigError::ConfigurationUnavailable(_))
    ));
    assert_eq!(harness.store.connects(), 0);
    assert_eq!(harness.telemetry.connects(), 0);
    assert!(harness.telemetry.events().is_empty());
}

#[tokio::test]
async fn remote_mode_reads_connection_string_from_environment() {
    let root = content_root("[AppSettings]\nisLocal = true\n");
    let harness = Harness::new(common_settings());

    let ready = scoped_startup(
        &[
            ("isLocal", "False"),
            ("AzureAppConfigurationConnectionString", STORE_CONNECTION_STRING),
        ],
        &root,
    )
    .prepare_with(&harness.collaborators)
    .await
    .unwrap();

    assert_eq!(ready.mode(), EnvironmentMode::Remote);
    assert_eq!(ready.namespace().get("IsLocal"), Some("false"));
    let started = harness.telemetry.find("Application started").unwrap();
    assert_eq!(started.properties["environment"], "Remote");
}

#[tokio::test]
async fn missing_telemetry_credential_aborts_before_any_sink() {
    let root = content_root(&local_settings());
    let harness = Harness::new(vec![setting("appConfig:Theme", "Common", "dark")]);

    let err = scoped_startup(&[], &root)
        .prepare_with(&harness.collaborators)
        .await
        .err()
        .unwrap();

    assert!(matches!(
        err,
        StartupError::Logging(LoggingError::MissingTelemetryCredential(_))
    ));
    assert_eq!(harness.store.connects(), 1);
    assert_eq!(harness.telemetry.connects(), 0);
}

#[tokio::test]
async fn environment_overlay_overrides_base_settings() {
    let root = content_root(&local_settings());
    std::fs::write(
        root.path().join("appsettings.Staging.toml"),
        "[Serilog]\nMinimumLevel = \"Warning\"\n",
    )
    .unwrap();
    let harness = Harness::new(common_settings());

    let ready = scoped_startup(&[("APP_ENVIRONMENT", "Staging")], &root)
        .prepare_with(&harness.collaborators)
        .await
        .unwrap();

    assert_eq!(ready.namespace().get("Serilog:MinimumLevel"), Some("Warning"));
    // Information events are below the configured level.
    assert!(harness.telemetry.find("Application started").is_none());
}

#[tokio::test]
async fn startup_event_reaches_ingestion_endpoint() {
    let ingestion = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/track"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&ingestion)
        .await;

    let root = content_root(&local_settings());
    let harness = Harness::new(vec![setting(
        "ApplicationInsightsConnectionString",
        "Common",
        &format!("InstrumentationKey=ikey;IngestionEndpoint={}", ingestion.uri()),
    )]);
    let collaborators = Collaborators {
        telemetry: std::sync::Arc::new(ApplicationInsightsConnector::new(
            std::time::Duration::from_secs(5),
        )),
        ..harness.collaborators
    };

    let ready = scoped_startup(&[], &root)
        .prepare_with(&collaborators)
        .await
        .unwrap();
    ready.logger().flush().await;

    let received = ingestion.received_requests().await.unwrap();
    let envelopes: Vec<serde_json::Value> = received
        .iter()
        .flat_map(|r| serde_json::from_slice::<Vec<serde_json::Value>>(&r.body).unwrap())
        .collect();
    let started = envelopes
        .iter()
        .find(|e| e["data"]["baseData"]["message"] == "Application started")
        .unwrap();
    assert_eq!(started["iKey"], "ikey");
    assert_eq!(
        started["data"]["baseData"]["properties"]["environment"],
        "Local"
    );
}
