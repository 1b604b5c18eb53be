//! Weather forecast service.
//!
//! # Architecture Overview
//!
//! ```text
//!   appsettings.toml ─┐
//!   environment ──────┼─▶ RemoteConfigResolver ─▶ ConfigurationNamespace
//!   remote store ─────┘          │                        │
//!   secret vault ◀───────────────┘                        ▼
//!                                                   LoggerComposer
//!                                                         │
//!                        console ◀── Logger ──▶ Application Insights
//!                                      │
//!                                      ▼ (optional file sink)
//!   Client ──▶ request id ─▶ request span ─▶ /WeatherForecast
//! ```
//!
//! Startup is strictly ordered; any failure aborts with a non-zero exit
//! status before the listener opens.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;

use weather_telemetry::config::{ProcessEnv, StartupOptions};
use weather_telemetry::lifecycle::{signals, Shutdown, Startup, StartupError};

#[derive(Parser)]
#[command(name = "weather-telemetry")]
#[command(about = "Weather forecast service with centrally managed configuration", long_about = None)]
struct Args {
    /// Directory holding appsettings.toml; log files go to <content-root>/Logs
    #[arg(long, default_value = ".")]
    content_root: PathBuf,

    /// Listen address, overriding the `Urls` setting
    #[arg(long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("startup aborted: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), StartupError> {
    let content_root = std::path::absolute(&args.content_root).unwrap_or(args.content_root);

    let ready = Startup::new(ProcessEnv, content_root, StartupOptions::from_build())
        .prepare()
        .await?;

    let address = match args.bind {
        Some(address) => address,
        None => ready.bind_address()?,
    };
    let listener = TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;

    let shutdown = Shutdown::new();
    tokio::spawn(signals::listen(shutdown.clone()));

    ready.serve(listener, shutdown.wait()).await
}
