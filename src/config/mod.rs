//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! appsettings.toml (+ appsettings.<env>.toml)
//!     → loader.rs (flatten into ConfigurationNamespace)
//!     → resolver.rs (EnvironmentMode, connection string source)
//!     → remote.rs (partitioned fetch from the remote store)
//!     → secrets.rs (secret references resolved via ambient credential)
//!     → merged ConfigurationNamespace (read-only, shared via Arc)
//! ```
//!
//! # Design Decisions
//! - Merge precedence: local file < remote store < resolved secrets
//! - The namespace is immutable once bootstrap publishes it
//! - Every failure here is fatal to startup; nothing is retried

pub mod connection_string;
pub mod environment;
pub mod error;
pub mod loader;
pub mod namespace;
pub mod remote;
pub mod resolver;
pub mod schema;
pub mod secrets;

pub use environment::{EnvSource, EnvironmentMode, ProcessEnv};
pub use error::ConfigError;
pub use namespace::ConfigurationNamespace;
pub use remote::{KeySelector, StoreConnector};
pub use resolver::RemoteConfigResolver;
pub use schema::StartupOptions;
pub use secrets::SecretResolver;
