//! twinsync CLI
//!
//! Command-line tools for exercising the sync engine offline.
//!
//! # Commands
//!
//! - `simulate` - Replay a JSON scenario against an in-memory platform
//! - `translate` - Print the mirror plan for a source/target pair

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// twinsync command-line tools.
#[derive(Parser)]
#[command(name = "twinsync")]
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
    /// Replay a scenario file against an in-memory platform
    Simulate {
        /// Scenario file (JSON)
        #[arg(short, long)]
        scenario: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the actions that would mirror one entity onto another
    Translate {
        /// Source entity state (JSON)
        #[arg(short, long)]
        source: String,

        /// Target entity state (JSON)
        #[arg(short, long)]
        target: String,

        /// Sync mode (perfect, basic)
        #[arg(short, long, default_value = "perfect")]
        mode: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Simulate { scenario, format } => {
            commands::simulate::run(&scenario, &format)?;
        }
        Commands::Translate {
            source,
            target,
            mode,
            format,
        } => {
            commands::translate::run(&source, &target, &mode, &format)?;
        }
        Commands::Version => {
            println!("twinsync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
