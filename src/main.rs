use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use bypass::assets::StaticFiles;
use bypass::config::{load_config, ProxyConfig};
use bypass::{HttpServer, Shutdown};

/// Content-rewriting proxy server.
#[derive(Parser, Debug)]
#[command(name = "bypass", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "bypass.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // A missing config file just means defaults; a broken one is fatal.
    let config = if cli.config.exists() {
        load_config(&cli.config)?
    } else {
        ProxyConfig::default()
    };

    bypass::observability::logging::init(&config.observability.log_level);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        external_url = %config.rewrite.external_url,
        public_dir = %config.static_files.public_dir,
        "Configuration loaded"
    );

    let assets = Arc::new(
        StaticFiles::new(
            &config.static_files.public_dir,
            config.static_files.cache_static,
        )
        .await,
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();

    let server = HttpServer::new(Arc::new(config), assets)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
