use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use grout::{
    config::{Config, defaults::DEFAULT_CONFIG_FILE},
    services::Renderer,
    web::{AppState, WebServer},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Plain,
    Json,
}

#[derive(Parser)]
#[command(name = "grout")]
#[command(version)]
#[command(about = "On-demand placeholder and avatar image service")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "plain")]
    log_format: LogFormat,

    /// Write the default configuration to the config path and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.log_level == "trace" {
        format!("grout={},tower_http=trace", cli.log_level)
    } else {
        format!("grout={}", cli.log_level)
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| log_filter.into());
    let registry = tracing_subscriber::registry().with(env_filter);
    match cli.log_format {
        LogFormat::Plain => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }

    if cli.init_config {
        Config::write_default(&cli.config)?;
        return Ok(());
    }

    info!("Starting grout v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(&cli.config)?;

    // Override config with CLI arguments
    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }

    let renderer = Arc::new(Renderer::new(&config.render));
    info!(
        "Renderer ready: max {}x{}, {} font faces",
        config.render.max_width,
        config.render.max_height,
        renderer.font_faces()
    );

    let state = AppState::with_renderer(config.clone(), renderer)?;
    info!(
        "Render cache capacity {} entries, max-age {:?}, compression {}",
        state.cache.capacity(),
        state.max_age,
        if config.compression.enabled { "enabled" } else { "disabled" }
    );

    let server = WebServer::new(&config, state)?;
    info!("Web server starting on http://{}:{}", server.host(), server.port());
    server.serve().await?;

    Ok(())
}
