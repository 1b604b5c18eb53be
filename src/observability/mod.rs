//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! ConfigurationNamespace
//!     → logging.rs (LoggerComposer: level, overrides, enrichment, sinks)
//!     → Logger (one tracing Dispatch)
//!
//! Every event is fanned out to:
//!     → console (tracing-subscriber fmt)
//!     → file.rs (rolling file, optional, Information and above)
//!     → telemetry.rs → insights.rs (batched remote ingestion)
//! ```
//!
//! # Design Decisions
//! - Events carry a constant message plus structured fields
//! - Request ID flows into every event through the request span
//! - The remote sink never logs through `tracing` itself

pub mod error;
pub mod event;
pub mod file;
pub mod insights;
pub mod level;
pub mod logging;
pub mod telemetry;

pub use error::LoggingError;
pub use logging::{Logger, LoggerComposer, LoggerSpec, SinkDescriptor};
pub use telemetry::{TelemetryClient, TelemetryConnection, TelemetryConnector};
