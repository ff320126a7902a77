//! CLI command implementations.

pub mod classify;
pub mod config;
pub mod partitions;
pub mod replay;

use clap::{Args, Subcommand};

/// Arguments for the classify command.
#[derive(Args)]
pub struct ClassifyArgs {
    /// URLs to classify (absolute or origin-relative).
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Declared request destination (document, script, image, ...).
    #[arg(short, long, default_value = "empty")]
    pub destination: String,
}

/// Arguments for the partitions command.
#[derive(Args)]
pub struct PartitionsArgs {
    /// Show partitions for this version instead of the configured one.
    #[arg(long)]
    pub version: Option<String>,
}

/// Arguments for the replay command.
#[derive(Args)]
pub struct ReplayArgs {
    /// JSON file holding a list of requests.
    pub file: String,

    /// Origin to fetch from (overrides config).
    #[arg(short, long)]
    pub origin: Option<String>,

    /// Wait for background refreshes before printing the summary.
    #[arg(long)]
    pub wait_revalidation: bool,

    /// Start the orphan sweep after activation.
    #[arg(long)]
    pub sweep: bool,
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration.
    Show,
    /// Initialize a new config file.
    Init {
        /// Origin written to the new file.
        #[arg(long, default_value = "http://localhost:3000")]
        origin: String,

        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Validate the config file.
    Validate,
}
