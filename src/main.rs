use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ticketwatch::config::Config;

mod commands;

#[derive(Parser)]
#[command(
    name = "ticketwatch",
    version,
    about = "Watches movie booking pages and notifies Telegram when tickets open",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the configured format
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitor loop, bot and admin API until interrupted (default)
    Run,

    /// Run a single monitor cycle and exit
    Check,

    /// Fetch one page and print what the detector sees
    Detect {
        /// Booking page URL
        url: String,
    },

    /// Print the effective configuration with secrets redacted
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.as_deref();

    // Errors surface again when the command loads its configuration
    let logging = Config::load_settings(config_path)
        .map(|config| config.logging)
        .unwrap_or_default();
    let format = cli.log_format.as_deref().unwrap_or(&logging.format);
    setup_tracing(format, &logging.level, cli.verbose)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            tracing::info!("ticketwatch starting");
            commands::run(config_path).await?;
        }
        Commands::Check => {
            tracing::info!("Running single check");
            commands::check(config_path).await?;
        }
        Commands::Detect { url } => {
            tracing::info!(url = %url, "Starting detect command");
            commands::detect(config_path, &url).await?;
        }
        Commands::Config => {
            commands::show_config(config_path)?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let default_filter = if verbose {
        String::from("ticketwatch=debug,info")
    } else {
        format!("ticketwatch={level},warn")
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
