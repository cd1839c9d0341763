use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hotwired_core::{AppConfig, Position};

mod commands;

#[derive(Parser)]
#[command(name = "hotwired")]
#[command(author, version, about = "Drive a roller shutter through a hot-wired RTS remote")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Use this configuration file instead of ~/.config/hotwired/config.toml
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Background daemon that owns the GPIO lines
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
    /// Move the shutter to a position (a multiple of 10 from 0 to 100)
    Set {
        /// Target position in percent
        position: i64,
        /// Skip the debounce window and wait for the button press
        #[arg(long)]
        now: bool,
    },
    /// Fully open the shutter
    Open,
    /// Fully close the shutter
    Close,
    /// Move to the remote's "my" preset position
    Preset,
    /// Show current position, target and movement state
    Status,
    /// Print shutter events as they happen
    Watch,
    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum DaemonAction {
    /// Start the daemon in the foreground
    Start,
    /// Stop the running daemon
    Stop,
    /// Check daemon status
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the default configuration file if none exists
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    let config = Arc::new(config);

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Daemon { action } => match action {
            DaemonAction::Start => commands::daemon::start(config).await,
            DaemonAction::Stop => commands::daemon::stop().await,
            DaemonAction::Status => commands::daemon::status(&config).await,
        },
        Commands::Set { position, now } => commands::control::set(&config, position, now).await,
        Commands::Open => commands::control::set(&config, Position::OPEN.value().into(), false).await,
        Commands::Close => commands::control::set(&config, Position::CLOSED.value().into(), false).await,
        Commands::Preset => commands::control::set(&config, Position::PRESET.value().into(), false).await,
        Commands::Status => commands::status::run(&config).await,
        Commands::Watch => commands::watch::run(&config).await,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(&config),
            ConfigAction::Init => commands::config::init(cli.config.as_deref()),
        },
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_set_accepts_intermediate_position() {
        let cli = Cli::try_parse_from(["hotwired", "set", "40", "--now"]).unwrap();
        assert!(matches!(cli.command, Commands::Set { position: 40, now: true }));

        let command = Cli::command();
        let about = command
            .find_subcommand("set")
            .and_then(|set| set.get_about())
            .map(|about| about.to_string())
            .unwrap();
        assert!(about.contains("multiple of 10"));
    }
}
