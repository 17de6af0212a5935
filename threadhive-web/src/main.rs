//! Threadhive Web Server
//!
//! Community membership, roles and listings over HTTP.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use threadhive_core::{init_logging, CoreError, ThreadhiveConfig};
use threadhive_web::{ThreadhiveServerBuilder, WebError};
use tracing::{error, info};

/// Threadhive Web Server - community membership and roles
#[derive(Parser)]
#[command(name = "threadhive-web")]
#[command(about = "HTTP server for Threadhive communities")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Server port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Database URL
    #[arg(long)]
    database_url: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    /// Defaults, then the config file, then the environment, then flags
    fn load_config(&self) -> anyhow::Result<ThreadhiveConfig> {
        let mut config = match &self.config {
            Some(path) => ThreadhiveConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ThreadhiveConfig::default(),
        };
        config.apply_env()?;

        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(url) = &self.database_url {
            config.server.database_url = url.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = args.load_config()?;
    init_logging(&config.logging)?;

    if let Err(e) = config.validate() {
        e.log();
        if matches!(e, CoreError::MissingSecret) {
            std::process::exit(1);
        }
        return Err(e.into());
    }

    info!(address = %config.address(), database = %config.server.database_url, "Building server");

    let server = match ThreadhiveServerBuilder::with_config(config).build().await {
        Ok(server) => server,
        Err(WebError::Config(e)) => {
            e.log();
            std::process::exit(1);
        }
        Err(e) => {
            error!("Failed to build server: {}", e);
            return Err(e.into());
        }
    };

    server.start().await?;
    Ok(())
}
