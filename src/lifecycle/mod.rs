//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Local settings → EnvironmentMode → remote configuration → publish mode
//!     → logger → routes → "Application started" → accept traffic
//!
//! Shutdown (shutdown.rs):
//!     Trigger → stop accepting → drain connections → flush logger → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: each step is a barrier, the first failure is fatal
//! - Listener starts last (traffic only when ready)

pub mod error;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use error::StartupError;
pub use shutdown::Shutdown;
pub use startup::{Collaborators, InstallMode, ReadyService, ResolvedConfiguration, Startup};
