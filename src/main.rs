mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

use strand_core::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    // A missing or unparseable config file is a startup failure; the process
    // exits nonzero through the error return.
    let config = match cli.config.as_deref() {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Serve { host, port } => {
            let mut config = config;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            tracing::info!("Starting strand server");
            strand_server::start(config).await?;
        }
        Commands::CheckConfig => {
            let warnings = config.validate();
            if warnings.is_empty() {
                println!("config ok");
            } else {
                for warning in &warnings {
                    println!("warning: {warning}");
                }
            }
        }
    }

    Ok(())
}
