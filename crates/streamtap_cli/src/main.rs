//! streamtap CLI
//!
//! Records a pub/sub topic into size- and age-rotated segment files.
//!
//! # Commands
//!
//! - `record` - Subscribe to a publisher and record its payloads
//! - `segments` - List the segments in an output directory
//! - `version` - Show version information

mod commands;
mod zmq;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Pub/sub stream recorder.
#[derive(Parser)]
#[command(name = "streamtap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Subscribe to a publisher and record its payloads
    Record(commands::record::RecordArgs),

    /// List the segments in an output directory
    Segments {
        /// Segment directory
        #[arg(short, long, default_value = "data")]
        output: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG takes precedence over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = match cli.command {
        Commands::Record(args) => commands::record::run(args).await,
        Commands::Segments { output, format } => commands::segments::run(&output, &format),
        Commands::Version => {
            println!("streamtap CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("streamtap core v{}", streamtap_core::VERSION);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
