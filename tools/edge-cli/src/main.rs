//! Edge CLI - Host adapter for the storefront offline worker.
//!
//! Commands:
//! - `edge classify` - Show how URLs are classified and where they are cached
//! - `edge partitions` - List the partition whitelist for the configured version
//! - `edge replay` - Drive install, activate and fetch over a request file
//! - `edge config` - Manage configuration

mod commands;
mod config;
mod context;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use edge_observability::{init_logging, LogFormat, LogLevel};

use commands::{ClassifyArgs, ConfigArgs, PartitionsArgs, ReplayArgs};

/// Edge CLI - Inspect and exercise the offline caching worker
#[derive(Parser)]
#[command(name = "edge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify URLs into resource classes
    Classify(ClassifyArgs),

    /// List the partitions the configured version keeps
    Partitions(PartitionsArgs),

    /// Replay a request file through a fresh worker
    Replay(ReplayArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup output formatting
    let output = output::Output::new(cli.verbose, cli.json);

    // Load config
    let config_path = cli.config.as_deref();
    let ctx = context::Context::load(config_path, output)?;

    // Worker logs
    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        ctx.config.logging.level
    };
    let format = if cli.json {
        LogFormat::Json
    } else {
        ctx.config.logging.format
    };
    init_logging(format, level);

    // Execute command
    let result = match cli.command {
        Commands::Classify(args) => commands::classify::run(args, &ctx).await,
        Commands::Partitions(args) => commands::partitions::run(args, &ctx).await,
        Commands::Replay(args) => commands::replay::run(args, &ctx).await,
        Commands::Config(args) => commands::config::run(args, &ctx).await,
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
