//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, graceful shutdown)
//!     → request.rs (request ID, request span, completion event)
//!     → forecast handler
//!     → Send to client
//! ```

pub mod request;
pub mod server;

pub use request::{DispatchLayer, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
