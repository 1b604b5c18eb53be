//! Weather forecast service with centrally managed configuration and
//! layered telemetry logging.

pub mod config;
pub mod forecast;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::ConfigurationNamespace;
pub use http::HttpServer;
pub use lifecycle::{Shutdown, Startup, StartupError};
