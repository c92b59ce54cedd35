//! Command Line and Logging
//!
//! Command-line interface, logging setup and build information for the
//! COSMIC Messages daemon.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// COSMIC Messages command-line interface
#[derive(Parser, Debug)]
#[command(name = "cosmic-messages-daemon")]
#[command(about = "Conversation list daemon for COSMIC Messages", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Set log level (error, warn, info, debug, trace)
    #[arg(short, long, value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Enable JSON structured logging
    #[arg(long)]
    pub json_logs: bool,

    /// Show timestamps in logs
    #[arg(long, default_value = "true")]
    pub timestamps: bool,

    /// Use this configuration file instead of the default one
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Use this message database instead of the configured one
    #[arg(long, value_name = "FILE")]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Daemon commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show version and build information
    Version {
        /// Show detailed build information
        #[arg(long)]
        verbose: bool,
    },

    /// List conversations, newest first
    List {
        /// Maximum number of conversations
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Only conversations with unread messages
        #[arg(long)]
        unread: bool,

        /// Print the list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the messages of one conversation
    Show {
        /// Thread ID
        thread_id: i64,
    },

    /// Keep the list up to date and print every change
    Watch {
        /// Refresh interval in seconds (overrides the config file)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Directory polled for incoming SMS packet files
        #[arg(long, value_name = "DIR")]
        inbox: Option<PathBuf>,

        /// Print diff scripts as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Import an SMS messages packet body (JSON file, `-` for stdin)
    Import {
        /// Packet file
        file: PathBuf,
    },

    /// Mark every message of a conversation as read
    MarkRead {
        /// Thread ID
        thread_id: i64,
    },

    /// Delete a conversation and its messages
    Delete {
        /// Thread ID
        thread_id: i64,
    },

    /// Set or clear the contact name shown for a conversation
    SetContact {
        /// Thread ID
        thread_id: i64,

        /// Contact name (omit to clear)
        name: Option<String>,
    },

    /// Show current configuration
    DumpConfig,
}

/// Initialize logging based on CLI configuration
///
/// Logs go to stderr so command output on stdout stays machine readable.
pub fn init_logging(cli: &Cli) -> Result<()> {
    let log_level = cli.log_level.parse::<Level>().with_context(|| {
        format!(
            "Invalid log level '{}'. Valid levels: error, warn, info, debug, trace",
            cli.log_level
        )
    })?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level.as_str()))
        .context("Failed to create log filter")?;

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(true)
        .with_line_number(true);

    match (cli.json_logs, cli.timestamps) {
        (true, true) => subscriber.json().init(),
        (true, false) => subscriber.without_time().json().init(),
        (false, true) => subscriber.init(),
        (false, false) => subscriber.without_time().init(),
    }

    info!(
        "Logging initialized: level={}, json={}, timestamps={}",
        log_level, cli.json_logs, cli.timestamps
    );

    Ok(())
}

/// Build information for diagnostics
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: Option<&'static str>,
    pub build_timestamp: &'static str,
    pub rustc_version: &'static str,
}

impl BuildInfo {
    pub fn get() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            git_hash: option_env!("GIT_HASH"),
            build_timestamp: env!("BUILD_TIMESTAMP"),
            rustc_version: env!("RUSTC_VERSION"),
        }
    }

    pub fn display(&self, verbose: bool) {
        println!("COSMIC Messages Daemon v{}", self.version);

        if verbose {
            if let Some(hash) = self.git_hash {
                println!("Git commit: {}", hash);
            }
            println!("Build time: {}", self.build_timestamp);
            println!("Rust compiler: {}", self.rustc_version);
            println!("Platform: {}", std::env::consts::OS);
            println!("Architecture: {}", std::env::consts::ARCH);
        }
    }
}
