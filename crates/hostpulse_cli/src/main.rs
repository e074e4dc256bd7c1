//! hostpulse CLI
//!
//! The background agent and its operator tools.
//!
//! # Commands
//!
//! - `run` - Run the agent until SIGINT/SIGTERM
//! - `sync` - Flush the backlog and the current window once
//! - `inspect` - Show the current window and pending backlog
//! - `verify` - Check and repair the state documents
//! - `reset` - Discard the current window and the backlog

mod commands;

use clap::{Parser, Subcommand};
use hostpulse_agent::AgentConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Host usage agent with an offline-tolerant local buffer.
#[derive(Parser)]
#[command(name = "hostpulse")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the agent state (overrides the config file)
    #[arg(global = true, short, long)]
    data_dir: Option<PathBuf>,

    /// JSON configuration file
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent until interrupted
    Run,

    /// Flush the backlog and the current window once
    Sync,

    /// Show the current window and pending backlog
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Maximum number of backlog entries to show, newest first
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Check and repair the state documents
    Verify,

    /// Discard the current window and the backlog
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = match &cli.config {
        Some(path) => AgentConfig::from_json_file(path)?,
        None => AgentConfig::default(),
    };
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    match cli.command {
        Commands::Run => commands::run::run(&config)?,
        Commands::Sync => commands::sync::run(&config)?,
        Commands::Inspect { format, limit } => commands::inspect::run(&config, &format, limit)?,
        Commands::Verify => commands::verify::run(&config)?,
        Commands::Reset { yes } => commands::reset::run(&config, yes)?,
        Commands::Version => {
            println!("hostpulse v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
