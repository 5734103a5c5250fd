use anyhow::Context;
use clap::Parser;
use moodscape_api::Server;
use moodscape_core::ConfigManager;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "moodscape", version, about = "MoodScape journaling API server")]
struct Cli {
    /// TOML config file (defaults to ./moodscape.toml when present)
    #[arg(short, long, env = "MOODSCAPE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Write a config file with default values to PATH and exit
    #[arg(long, value_name = "PATH")]
    write_default_config: Option<PathBuf>,
}

fn default_filter(level: &str) -> String {
    ["moodscape_api", "moodscape_core", "moodscape_ai", "moodscape_store", "tower_http"]
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(path) = cli.write_default_config {
        ConfigManager::create_default_config(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let mut manager =
        ConfigManager::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(port) = cli.port {
        let mut config = manager.config().clone();
        config.server.port = port;
        manager = ConfigManager::from_config(config).context("applying --port")?;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(&manager.config().logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Some(path) = manager.config_path() {
        tracing::info!(path = %path.display(), "Loaded configuration file");
    }

    let server = Server::new(Arc::new(manager))
        .await
        .context("initialising server")?;
    server.run().await.context("server error")?;
    Ok(())
}
