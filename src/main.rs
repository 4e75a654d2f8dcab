//! Quizbank CLI entry point.

use anyhow::Result;
use clap::Parser;
use quizbank::cli::commands::{self, SearchArgs};
use quizbank::cli::{Cli, Commands};
use quizbank::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("quizbank={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let config_path = cli
        .config
        .as_ref()
        .map(|p| Settings::expand_path(p))
        .unwrap_or_else(Settings::default_config_path);
    let settings = Settings::load_from(Some(&config_path))?;

    std::fs::create_dir_all(settings.data_dir())?;
    if let Some(parent) = settings.sqlite_path().parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Execute command
    match cli.command {
        Commands::Fetch { source } => {
            commands::run_fetch(source.as_deref(), settings).await?;
        }

        Commands::Index { batch_size } => {
            commands::run_index(batch_size, settings).await?;
        }

        Commands::Search {
            query,
            semantic,
            limit,
            category,
            difficulty,
            min_score,
            json,
        } => {
            let args = SearchArgs {
                query,
                semantic,
                limit,
                category,
                difficulty,
                min_score,
                json,
            };
            commands::run_search(args, settings).await?;
        }

        Commands::Stats => {
            commands::run_stats(settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host.as_deref(), port, settings).await?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings, &config_path).await?;
        }

        Commands::Config { action } => {
            commands::run_config(&action, config_path, settings)?;
        }
    }

    Ok(())
}
