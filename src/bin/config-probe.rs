//! Resolves configuration the way the service does at startup and prints
//! it, with secret values masked. Nothing is served and no logger is built.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use weather_telemetry::config::{ProcessEnv, StartupOptions};
use weather_telemetry::lifecycle::Startup;

#[derive(Parser)]
#[command(name = "config-probe")]
#[command(about = "Print the merged configuration namespace", long_about = None)]
struct Cli {
    /// Directory holding appsettings.toml
    #[arg(long, default_value = ".")]
    content_root: PathBuf,

    /// Print secret values in clear text
    #[arg(long)]
    reveal: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let startup = Startup::new(ProcessEnv, &cli.content_root, StartupOptions::from_build());

    match startup.resolve().await {
        Ok(resolved) => {
            println!("environment: {}", resolved.mode);
            print!("{}", resolved.namespace.render_dump(!cli.reveal));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("startup aborted: {e}");
            ExitCode::FAILURE
        }
    }
}
