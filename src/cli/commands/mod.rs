//! CLI parser and command dispatch.

mod cycle;
mod init;
mod status;
mod track;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "reply-engine")]
#[command(about = "Discover, answer and track replies to our posts")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database tables
    Init,

    /// Start monitoring replies to one of our posts
    Track {
        /// Status URL or numeric post id
        post: String,
        /// When the post went out (RFC 3339, defaults to now)
        #[arg(long)]
        posted_at: Option<DateTime<Utc>>,
        /// Handle the post was made under (defaults to platform.author_handle)
        #[arg(long)]
        handle: Option<String>,
    },

    /// Run a single fetch/answer cycle
    Run,

    /// Run cycles continuously until interrupted
    Daemon {
        /// Seconds to sleep between cycles
        #[arg(short, long, default_value = "300")]
        interval: u64,
    },

    /// Show reply counts
    Status {
        /// Limit counts to one parent post id
        #[arg(long)]
        parent: Option<String>,
    },

    /// Show configured rate-limit windows
    Limits,
}

async fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load_from_path(&path)
            .await
            .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e)),
        None => Ok(Config::load().await),
    }
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config).await?;

    match cli.command {
        Commands::Init => init::cmd_init(&config).await,
        Commands::Track {
            post,
            posted_at,
            handle,
        } => track::cmd_track(&config, &post, posted_at, handle).await,
        Commands::Run => cycle::cmd_run(&config).await,
        Commands::Daemon { interval } => cycle::cmd_daemon(&config, interval).await,
        Commands::Status { parent } => status::cmd_status(&config, parent.as_deref()).await,
        Commands::Limits => status::cmd_limits(&config),
    }
}
