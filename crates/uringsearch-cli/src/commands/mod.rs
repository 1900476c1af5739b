//! CLI command implementations.

mod bench;
mod generate;
mod search;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, ValueEnum};
use uringsearch_core::{EngineConfig, SearchOutcome};

pub use bench::{bench, BenchArgs};
pub use generate::{generate, GenerateArgs};
pub use search::{search, SearchArgs};

/// Result of a command that completed without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command succeeded / target found
    Success,
    /// Target not found
    NotFound,
}

impl Status {
    pub fn exit_code(self) -> ExitCode {
        match self {
            Self::Success => ExitCode::SUCCESS,
            Self::NotFound => ExitCode::from(1),
        }
    }
}

impl From<SearchOutcome> for Status {
    fn from(outcome: SearchOutcome) -> Self {
        if outcome.is_found() {
            Self::Success
        } else {
            Self::NotFound
        }
    }
}

/// Search implementation selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum Implementation {
    /// Speculative batched probes through io_uring.
    #[default]
    Uring,
    /// Single-threaded binary search over mmap.
    Mmap,
    /// One binary search per range, in parallel, over mmap.
    ParallelMmap,
}

impl Implementation {
    pub fn name(self) -> &'static str {
        match self {
            Self::Uring => "io_uring",
            Self::Mmap => "mmap",
            Self::ParallelMmap => "parallel mmap",
        }
    }
}

/// Engine tuning flags shared by `search` and `bench`.
///
/// Flags override values from `--config`, which override the defaults.
#[derive(Args, Debug, Default)]
pub struct EngineArgs {
    /// TOML engine configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Maximum speculative probes per round.
    #[arg(long)]
    pub probes: Option<usize>,

    /// io_uring submission queue depth.
    #[arg(long)]
    pub queue_depth: Option<u32>,

    /// Request kernel submission queue polling (SQPOLL).
    #[arg(long)]
    pub sqpoll: bool,

    /// SQPOLL thread idle timeout in milliseconds.
    #[arg(long)]
    pub sqpoll_idle_ms: Option<u32>,

    /// Register probe buffers with io_uring.
    #[arg(long)]
    pub zero_copy: bool,

    /// Issue readahead hints once the interval is small.
    #[arg(long)]
    pub readahead: bool,

    /// Interval size below which the range is read and scanned (0 disables).
    #[arg(long)]
    pub linear_threshold: Option<u64>,
}

impl EngineArgs {
    /// Resolve the engine configuration.
    pub fn to_config(&self) -> anyhow::Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load(path)
                .with_context(|| format!("loading engine config {}", path.display()))?,
            None => EngineConfig::default(),
        };

        if let Some(probes) = self.probes {
            config.max_probes = probes;
            config.queue_depth = config.queue_depth.max(u32::try_from(probes).unwrap_or(u32::MAX));
        }
        if let Some(depth) = self.queue_depth {
            config.queue_depth = depth;
        }
        if self.sqpoll {
            config.sqpoll.enabled = true;
        }
        if let Some(idle) = self.sqpoll_idle_ms {
            config.sqpoll.idle_timeout_ms = idle;
        }
        config.zero_copy |= self.zero_copy;
        config.readahead |= self.readahead;
        if let Some(threshold) = self.linear_threshold {
            config.linear_scan_threshold = threshold;
        }

        config.validate().context("invalid engine configuration")?;
        Ok(config)
    }
}
