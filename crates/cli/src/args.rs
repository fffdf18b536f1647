//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// post-batcher: generate a daily batch of posts through a fallback chain of LLM providers
#[derive(Parser, Debug)]
#[command(name = "post-batcher")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate today's batch (no-op if it already exists)
    Generate(GenerateArgs),

    /// Publish pending items from the front of the batch
    Publish(PublishArgs),

    /// Inspect the stored batch
    Batch(BatchArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Validate configuration and show status
    Doctor(DoctorArgs),
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Regenerate even if today's batch already exists
    #[arg(long)]
    pub force: bool,

    /// Override the configured target count
    #[arg(long)]
    pub target: Option<usize>,
}

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Maximum number of posts to publish in this run
    #[arg(long)]
    pub count: Option<usize>,

    /// Log what would be published without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Write posts to outbox file for review instead of publishing
    #[arg(long)]
    pub require_approval: bool,

    /// Path to outbox file (used with --require-approval)
    #[arg(long)]
    pub outbox: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    #[command(subcommand)]
    pub command: BatchCommands,
}

#[derive(Subcommand, Debug)]
pub enum BatchCommands {
    /// Show the stored batch
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./config.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
