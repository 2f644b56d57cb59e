//! dbchat CLI entry point.

use anyhow::Result;
use clap::Parser;
use dbchat::cli::{commands, Cli, Commands};
use dbchat::config::Settings;
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

    // Logs go to stderr: stdout carries the JSON-RPC stream in `dbchat mcp`.
    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("dbchat={}", log_level)),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Load configuration
    let config_path = cli.config.as_deref().map(Settings::expand_path);
    let settings = Settings::load_from(config_path.as_ref())?;

    // Execute command
    match cli.command {
        Commands::Ask { question, model } => {
            let mut settings = settings;
            model.apply(&mut settings);
            commands::run_ask(&question, settings).await?;
        }

        Commands::Chat { model } => {
            let mut settings = settings;
            model.apply(&mut settings);
            commands::run_chat(settings).await?;
        }

        Commands::Serve { host, port, model } => {
            let mut settings = settings;
            model.apply(&mut settings);
            let host = host.unwrap_or_else(|| settings.server.host.clone());
            let port = port.unwrap_or(settings.server.port);
            commands::run_serve(&host, port, settings).await?;
        }

        Commands::Mcp { database, read_only } => {
            commands::run_mcp(database, read_only, settings).await?;
        }

        Commands::Tools => {
            commands::run_tools(settings).await?;
        }

        Commands::Doctor => {
            let path = config_path.unwrap_or_else(Settings::default_config_path);
            commands::run_doctor(&settings, &path).await?;
        }

        Commands::Config { action } => {
            commands::run_config(&action, config_path, settings)?;
        }
    }

    Ok(())
}
