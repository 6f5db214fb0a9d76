use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use pollroom::config::Config;
use pollroom::server;

/// Real-time classroom polling server.
#[derive(Debug, Parser)]
#[command(name = "pollroom", version, about)]
struct Cli {
    /// Path to a JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the bind address.
    #[arg(long)]
    bind: Option<String>,

    /// Override the listen port.
    #[arg(long)]
    port: Option<u16>,

    /// Log filter when RUST_LOG is unset, e.g. "debug" or "pollroom=debug".
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    if let Err(err) = run(cli).await {
        tracing::error!(%err, "fatal");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    server::serve(config).await?;
    Ok(())
}
