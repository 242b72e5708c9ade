//! Nimbus CLI — the main entry point.
//!
//! Commands:
//! - `onboard` — Initialize config & workspace
//! - `chat`    — Interactive chat or single-message mode
//! - `status`  — Show configuration and provider health
//! - `usage`   — Show lifetime usage statistics

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "nimbus",
    about = "Nimbus — a tool-using AI agent for your terminal",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and workspace
    Onboard,

    /// Chat with the agent
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Show configuration and provider health
    Status,

    /// Show lifetime usage statistics
    Usage,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Chat { message } => commands::chat::run(message).await?,
        Commands::Status => commands::status::run().await?,
        Commands::Usage => commands::usage::run().await?,
    }

    Ok(())
}
