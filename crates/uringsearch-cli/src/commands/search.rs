//! Search command.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use uringsearch_core::{mmap_search, parallel_mmap_search, SearchEngine};

use super::{EngineArgs, Implementation, Status};
use crate::output::{self, OutputFormat};

/// Arguments for search command.
#[derive(Args)]
pub struct SearchArgs {
    /// Sorted array file of native-endian u64 values.
    pub path: PathBuf,

    /// Value to search for.
    pub target: u64,

    /// Implementation to use.
    #[arg(short, long = "impl", value_enum, default_value_t)]
    pub implementation: Implementation,

    /// Worker threads (parallel-mmap only).
    #[arg(short, long, default_value_t = 32)]
    pub threads: usize,

    #[command(flatten)]
    pub engine: EngineArgs,
}

/// Search one file for one target.
pub fn search(args: &SearchArgs, format: OutputFormat) -> anyhow::Result<Status> {
    tracing::debug!(
        path = %args.path.display(),
        key = args.target,
        implementation = args.implementation.name(),
        "search"
    );

    match args.implementation {
        Implementation::Uring => {
            let engine = SearchEngine::new(args.engine.to_config()?)?;
            let report = engine
                .search(&args.path, args.target)
                .with_context(|| format!("searching {}", args.path.display()))?;
            output::engine_report(&report, format)?;
            Ok(report.outcome.into())
        }
        Implementation::Mmap => {
            let report = mmap_search(&args.path, args.target)
                .with_context(|| format!("searching {}", args.path.display()))?;
            output::baseline_report(args.target, &report, format)?;
            Ok(report.outcome.into())
        }
        Implementation::ParallelMmap => {
            let report = parallel_mmap_search(&args.path, args.target, args.threads)
                .with_context(|| format!("searching {}", args.path.display()))?;
            output::baseline_report(args.target, &report, format)?;
            Ok(report.outcome.into())
        }
    }
}
