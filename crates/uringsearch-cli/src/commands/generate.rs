//! Generate command for sorted test files.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use uringsearch_core::{create_test_file, ELEMENT_WIDTH};

use super::Status;
use crate::output::OutputFormat;

/// Arguments for generate command.
#[derive(Args)]
pub struct GenerateArgs {
    /// File to create (overwritten if present).
    pub path: PathBuf,

    /// Number of elements.
    #[arg(short = 'n', long, default_value_t = 1_000_000)]
    pub count: u64,

    /// Difference between consecutive values.
    #[arg(short = 'p', long, default_value_t = 10)]
    pub step: u64,
}

#[derive(Debug, Serialize)]
struct GenerateOutput<'a> {
    path: &'a std::path::Path,
    count: u64,
    step: u64,
    bytes: u64,
}

/// Write `0, step, 2 * step, ...` to the file.
pub fn generate(args: &GenerateArgs, format: OutputFormat) -> anyhow::Result<Status> {
    create_test_file(&args.path, args.count, args.step)
        .with_context(|| format!("creating {}", args.path.display()))?;

    let out = GenerateOutput {
        path: &args.path,
        count: args.count,
        step: args.step,
        bytes: args.count * ELEMENT_WIDTH,
    };
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&out)?),
        OutputFormat::Raw => println!("{}", out.path.display()),
        OutputFormat::Text => println!(
            "Test file created: {} ({} elements, step {}, {} bytes)",
            out.path.display(),
            out.count,
            out.step,
            out.bytes
        ),
    }
    Ok(Status::Success)
}
