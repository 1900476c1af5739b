//! uringsearch CLI - speculative io_uring search over sorted u64 files.
//!
//! Exit status: 0 when the target was found (or the command succeeded),
//! 1 when it was not found, 2 on any error.

#![warn(clippy::all)]

mod commands;
mod output;

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// uringsearch: batched speculative binary search over io_uring
#[derive(Parser)]
#[command(name = "uringsearch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: output::OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search a sorted array file for a value
    Search(commands::SearchArgs),

    /// Write a sorted test array file
    Generate(commands::GenerateArgs),

    /// Time repeated searches for sampled targets
    Bench(commands::BenchArgs),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Search(args) => commands::search(&args, cli.format),
        Commands::Generate(args) => commands::generate(&args, cli.format),
        Commands::Bench(args) => commands::bench(&args, cli.format),
    };

    match result {
        Ok(status) => status.exit_code(),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}
