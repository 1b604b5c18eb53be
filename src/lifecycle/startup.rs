//! Startup orchestration.
//!
//! # Responsibilities
//! - Load local settings, resolve the environment mode and fetch remote configuration
//! - Publish the resolved mode back into the namespace
//! - Compose and install the logger
//! - Register routes, announce startup, then accept traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Steps run in order, not concurrently; nothing after a failed step runs
//! - Listeners start last (traffic only when ready)
//! - Network collaborators are injected so the sequence runs without a network

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tracing::instrument::WithSubscriber;

use crate::config::loader::{load_local_settings, ENVIRONMENT_NAME_ENV};
use crate::config::remote::HttpStoreConnector;
use crate::config::schema::{bind_address, default_selectors, keys};
use crate::config::secrets::{DefaultCredential, VaultSecretResolver};
use crate::config::{
    ConfigurationNamespace, EnvSource, EnvironmentMode, RemoteConfigResolver, SecretResolver,
    StartupOptions, StoreConnector,
};
use crate::http::{AppState, HttpServer};
use crate::lifecycle::error::StartupError;
use crate::observability::insights::ApplicationInsightsConnector;
use crate::observability::{Logger, LoggerComposer, TelemetryConnector};

/// Directory (under the content root) receiving the rolling log files.
pub const LOG_DIRECTORY: &str = "Logs";

/// Whether the built logger becomes the process-wide default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMode {
    /// Install globally; the binary's choice.
    Global,
    /// Keep the logger on the returned service. The router logs every
    /// request through it; startup and server events are scoped with
    /// `tracing::dispatcher::with_default` and `WithSubscriber`.
    Scoped,
}

/// External systems bootstrap talks to.
pub struct Collaborators {
    pub store: Arc<dyn StoreConnector>,
    pub secrets: Arc<dyn SecretResolver>,
    pub telemetry: Arc<dyn TelemetryConnector>,
}

impl Collaborators {
    /// Remote store over HTTPS, vault secrets through the ambient credential
    /// chain, telemetry to Application Insights.
    pub fn production(env: &dyn EnvSource, timeout: Duration) -> Result<Self, StartupError> {
        let credential = DefaultCredential::from_env(env, timeout)?;
        Ok(Self {
            store: Arc::new(HttpStoreConnector::new(timeout)),
            secrets: Arc::new(VaultSecretResolver::new(credential, timeout)?),
            telemetry: Arc::new(ApplicationInsightsConnector::new(timeout)),
        })
    }
}

/// Outcome of the configuration steps.
#[derive(Debug, Clone)]
pub struct ResolvedConfiguration {
    pub mode: EnvironmentMode,
    pub namespace: ConfigurationNamespace,
}

/// The startup sequence.
pub struct Startup<E> {
    env: E,
    content_root: PathBuf,
    options: StartupOptions,
    install: InstallMode,
}

impl<E: EnvSource> Startup<E> {
    pub fn new(env: E, content_root: impl Into<PathBuf>, options: StartupOptions) -> Self {
        Self {
            env,
            content_root: content_root.into(),
            options,
            install: InstallMode::Global,
        }
    }

    pub fn install_mode(mut self, install: InstallMode) -> Self {
        self.install = install;
        self
    }

    /// `appsettings.toml` plus the `APP_ENVIRONMENT` overlay from the content root.
    pub fn load_local_settings(&self) -> Result<ConfigurationNamespace, StartupError> {
        let environment = self.env.var(ENVIRONMENT_NAME_ENV);
        Ok(load_local_settings(
            &self.content_root,
            environment.as_deref(),
        )?)
    }

    /// Configuration steps only, with production collaborators.
    pub async fn resolve(&self) -> Result<ResolvedConfiguration, StartupError> {
        let local = self.load_local_settings()?;
        let options = self.options.clone().with_local_settings(&local);
        let collaborators = Collaborators::production(&self.env, options.remote_timeout)?;
        self.configure(local, &collaborators).await
    }

    /// Full startup with production collaborators.
    pub async fn prepare(self) -> Result<ReadyService, StartupError> {
        let local = self.load_local_settings()?;
        let options = self.options.clone().with_local_settings(&local);
        let collaborators = Collaborators::production(&self.env, options.remote_timeout)?;
        self.run(local, options, &collaborators).await
    }

    /// Full startup against the given collaborators.
    pub async fn prepare_with(
        self,
        collaborators: &Collaborators,
    ) -> Result<ReadyService, StartupError> {
        let local = self.load_local_settings()?;
        let options = self.options.clone().with_local_settings(&local);
        self.run(local, options, collaborators).await
    }

    /// Resolve mode, fetch and merge remote configuration, publish the mode.
    async fn configure(
        &self,
        local: ConfigurationNamespace,
        collaborators: &Collaborators,
    ) -> Result<ResolvedConfiguration, StartupError> {
        let resolver = RemoteConfigResolver::new(&self.env, local);

        let mode = resolver.resolve_environment_mode()?;

        let connection_string = resolver.resolve_connection_string(mode);
        let mut namespace = resolver
            .connect_remote_store(
                &connection_string,
                &default_selectors(),
                collaborators.store.as_ref(),
                collaborators.secrets.as_ref(),
            )
            .await?;

        namespace.insert(keys::IS_LOCAL, mode.is_local().to_string());

        Ok(ResolvedConfiguration { mode, namespace })
    }

    async fn run(
        self,
        local: ConfigurationNamespace,
        options: StartupOptions,
        collaborators: &Collaborators,
    ) -> Result<ReadyService, StartupError> {
        let ResolvedConfiguration { mode, namespace } =
            self.configure(local, collaborators).await?;
        if options.print_config {
            print!("{}", namespace.render_dump(true));
        }

        let composer = LoggerComposer::new(&options, self.content_root.join(LOG_DIRECTORY));
        let spec = composer.compose(&namespace)?;
        if let Some(connection) = spec.telemetry_connection() {
            println!("---Program Start---");
            println!("applicationInsightsConnectionString: {}", connection.redacted());
            println!();
        }
        let logger = match self.install {
            InstallMode::Global => {
                LoggerComposer::install(&spec, collaborators.telemetry.as_ref())?
            }
            InstallMode::Scoped => LoggerComposer::build(&spec, collaborators.telemetry.as_ref())?,
        };

        let namespace = Arc::new(namespace);
        let mut server = HttpServer::new(AppState::new(namespace.clone(), self.content_root));
        if self.install == InstallMode::Scoped {
            server = server.with_dispatch(logger.dispatch().clone());
        }

        tracing::dispatcher::with_default(logger.dispatch(), || {
            tracing::info!(environment = %mode, "Application started");
        });

        Ok(ReadyService {
            server,
            namespace,
            mode,
            logger,
            install: self.install,
        })
    }
}

/// A fully started service that has not yet accepted traffic.
pub struct ReadyService {
    server: HttpServer,
    namespace: Arc<ConfigurationNamespace>,
    mode: EnvironmentMode,
    logger: Logger,
    install: InstallMode,
}

impl ReadyService {
    pub fn mode(&self) -> EnvironmentMode {
        self.mode
    }

    pub fn namespace(&self) -> &ConfigurationNamespace {
        &self.namespace
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn router(&self) -> Router {
        self.server.router()
    }

    /// Listen address from `Urls`, else the default.
    pub fn bind_address(&self) -> Result<SocketAddr, StartupError> {
        Ok(bind_address(&self.namespace)?)
    }

    /// Accept traffic until `shutdown` resolves, then flush the logger.
    /// The logger is dropped on return, closing the file sink.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), StartupError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Self {
            server,
            logger,
            install,
            ..
        } = self;

        let result = match install {
            InstallMode::Global => server.run(listener, shutdown).await,
            InstallMode::Scoped => {
                server
                    .run(listener, shutdown)
                    .with_subscriber(logger.dispatch().clone())
                    .await
            }
        };
        tracing::dispatcher::with_default(logger.dispatch(), || {
            tracing::info!("Shutdown complete");
        });
        logger.flush().await;
        result.map_err(StartupError::Serve)
    }
}
