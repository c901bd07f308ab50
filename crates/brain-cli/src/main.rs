//! brainctl - command-line client for the bare-metal provisioning backend.
//!
//! Logs in once, keeps the session in the cache directory (or the OS
//! keychain) and renews it transparently while commands run.

mod commands;
mod notice;

use std::io;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use brain_core::Config;

#[derive(Parser)]
#[command(name = "brainctl", version, about = "Manage bare-metal servers, images and disks")]
struct Cli {
    /// API base URL (overrides config and BRAIN_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the session
    Login {
        #[arg(short, long)]
        username: Option<String>,
        /// Do not renew the session automatically
        #[arg(long)]
        no_remember: bool,
    },
    /// Drop the stored session
    Logout,
    /// Show the current session
    Status,
    /// Renew the access token now
    Renew,
    /// List resources of one kind
    List {
        #[arg(value_enum)]
        kind: ResourceKind,
    },
    /// GET an arbitrary API path and print the JSON response
    Get { path: String },
    /// Keep the session alive until interrupted
    Watch,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ResourceKind {
    Images,
    MvServers,
    BareMetals,
    SystemDisks,
    Networks,
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(base_url) = cli.base_url.or_else(|| std::env::var("BRAIN_BASE_URL").ok()) {
        config.base_url = base_url;
    }
    info!(base_url = %config.base_url, "brainctl starting");

    let client = commands::build_client(&config)?;

    match cli.command {
        Command::Login { username, no_remember } => {
            commands::login(&client, &mut config, username, !no_remember).await
        }
        Command::Logout => {
            commands::logout(&client);
            Ok(())
        }
        Command::Status => {
            commands::status(&client);
            Ok(())
        }
        Command::Renew => commands::renew(&client).await,
        Command::List { kind } => commands::list(&client, kind).await,
        Command::Get { path } => commands::get(&client, &path).await,
        Command::Watch => commands::watch(&client, &config).await,
    }
}
