//! Albumbot CLI - standalone server for the card album bot

use albumbot::config::expand_path;
use albumbot::{Bot, Config};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "albumbot")]
#[command(author = "Albumbot Team")]
#[command(version)]
#[command(about = "Albumbot - card drawing and album browsing bot core", long_about = None)]
struct Args {
    /// Path to configuration file (default: ~/.albumbot/config.toml)
    #[arg(short, long, env = "ALBUMBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Override server port
    #[arg(short, long)]
    port: Option<u16>,

    /// Override server host
    #[arg(long)]
    host: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Initialize a new config file with defaults
    #[arg(long)]
    init: bool,

    /// Keep cards and albums in memory only
    #[arg(long)]
    memory: bool,

    /// Load catalog cards from a TOML file (`[[cards]]` tables) before serving
    #[arg(long, value_name = "FILE")]
    import_cards: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Handle --init flag before logging goes to files
    let config_path = args
        .config
        .as_deref()
        .map(expand_path)
        .unwrap_or_else(Config::default_path);
    if args.init {
        init_logging(args.verbose, None);
        if config_path.exists() {
            tracing::warn!("Config file already exists: {}", config_path.display());
            return Ok(());
        }
        Config::create_default(&config_path)?;
        tracing::info!("Created default config at: {}", config_path.display());
        return Ok(());
    }

    // Load configuration
    let config_missing = !config_path.exists();
    let mut config = if config_missing {
        Config::default()
    } else {
        Config::from_file(&config_path)?
    };
    config.apply_env_overrides();

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }

    let _log_guard = init_logging(args.verbose, config.log_dir());
    if config_missing {
        tracing::warn!(
            "Config file not found at {}, using defaults",
            config_path.display()
        );
    }

    let bot = if args.memory {
        Bot::in_memory(config)
    } else {
        Bot::new(config)?
    };

    if let Some(path) = args.import_cards {
        let path = expand_path(&path);
        bot.store().import_catalog_file(&path).await?;
    }

    // Start API server (blocks until shutdown)
    tracing::info!("Starting HTTP server mode");
    let served = bot.start_api_server().await;

    let retired = bot.shutdown();
    tracing::info!("Albumbot stopped, retired {} album menus", retired);

    served?;
    Ok(())
}

/// Install the tracing subscriber, optionally also writing daily log files.
///
/// The returned guard flushes the file writer and must outlive the server.
fn init_logging(
    verbose: bool,
    log_dir: Option<PathBuf>,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_level = if verbose { "debug" } else { "info" };

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "albumbot.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("albumbot={},tower_http=debug", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}
