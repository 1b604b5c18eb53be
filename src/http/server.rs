//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, request span, timeout)
//! - Serve on a listener until the shutdown future resolves

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{body::Body, routing::get, Router};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::Dispatch;

use crate::config::namespace::ConfigurationNamespace;
use crate::forecast::get_weather_forecast;
use crate::http::request::{
    log_response, propagate_request_id_layer, request_span, set_request_id_layer, DispatchLayer,
};

/// Upper bound on handling a single request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state injected into handlers. Read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub namespace: Arc<ConfigurationNamespace>,
    pub content_root: Arc<PathBuf>,
}

impl AppState {
    pub fn new(
        namespace: impl Into<Arc<ConfigurationNamespace>>,
        content_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            content_root: Arc::new(content_root.into()),
        }
    }
}

/// HTTP server for the forecast service.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Register all routes against `state`.
    pub fn new(state: AppState) -> Self {
        Self {
            router: Self::build_router(state, REQUEST_TIMEOUT),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState, request_timeout: Duration) -> Router {
        Router::new()
            .route("/WeatherForecast", get(get_weather_forecast))
            .route("/weatherforecast", get(get_weather_forecast))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(
                        TraceLayer::new_for_http()
                            .make_span_with(request_span::<Body>)
                            .on_response(log_response::<Body>),
                    )
                    .layer(propagate_request_id_layer())
                    .layer(TimeoutLayer::new(request_timeout)),
            )
    }

    /// Log every request through `dispatch` instead of the ambient default.
    pub fn with_dispatch(self, dispatch: Dispatch) -> Self {
        Self {
            router: self.router.layer(DispatchLayer::new(dispatch)),
        }
    }

    /// Router with every route and layer applied.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
