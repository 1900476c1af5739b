//! Bench command: repeated searches for sampled targets.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uringsearch_core::{
    mmap_search, parallel_mmap_search, ElementSource, LatencyRecorder, SearchEngine, SearchInterval,
    SortedArrayFile, ELEMENT_WIDTH,
};

use super::{EngineArgs, Implementation, Status};
use crate::output::{self, BenchSummary, OutputFormat};

/// Arguments for bench command.
#[derive(Args)]
pub struct BenchArgs {
    /// Sorted array file to search.
    pub path: PathBuf,

    /// Number of searches.
    #[arg(short = 'n', long, default_value_t = 100)]
    pub iterations: usize,

    /// Implementation to use.
    #[arg(short, long = "impl", value_enum, default_value_t)]
    pub implementation: Implementation,

    /// Worker threads (parallel-mmap only).
    #[arg(short, long, default_value_t = 32)]
    pub threads: usize,

    /// Fraction of targets that are absent from the file.
    #[arg(long, default_value_t = 0.0)]
    pub miss_ratio: f64,

    /// Seed for target sampling.
    #[arg(long)]
    pub seed: Option<u64>,

    #[command(flatten)]
    pub engine: EngineArgs,
}

/// Sample `count` targets: values at uniformly chosen indices, or with
/// probability `miss_ratio` one past such a value when that is absent.
fn sample_targets(
    file: &SortedArrayFile,
    count: usize,
    miss_ratio: f64,
    rng: &mut StdRng,
) -> anyhow::Result<Vec<u64>> {
    let len = file.len();
    let mut targets = Vec::with_capacity(count);
    for _ in 0..count {
        let index = rng.gen_range(0..len);
        let value = file
            .read_range(SearchInterval::new(index, index))
            .with_context(|| format!("reading element {index}"))?[0];

        let miss = rng.gen_bool(miss_ratio);
        let next = if index + 1 < len {
            Some(file.read_range(SearchInterval::new(index + 1, index + 1))?[0])
        } else {
            None
        };
        // value + 1 is absent when it is below the next element
        let absent = value.checked_add(1).filter(|&v| next.map_or(true, |n| v < n));
        targets.push(match (miss, absent) {
            (true, Some(v)) => v,
            _ => value,
        });
    }
    Ok(targets)
}

/// Time `iterations` searches and summarize their latencies.
pub fn bench(args: &BenchArgs, format: OutputFormat) -> anyhow::Result<Status> {
    if args.iterations == 0 {
        anyhow::bail!("iterations must be at least 1");
    }
    if !(0.0..=1.0).contains(&args.miss_ratio) {
        anyhow::bail!("miss ratio must be within 0.0..=1.0");
    }

    let file = SortedArrayFile::open(&args.path)
        .with_context(|| format!("opening {}", args.path.display()))?;
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let targets = sample_targets(&file, args.iterations, args.miss_ratio, &mut rng)?;
    drop(file);

    let engine = match args.implementation {
        Implementation::Uring => Some(SearchEngine::new(args.engine.to_config()?)?),
        _ => None,
    };

    let mut recorder = LatencyRecorder::new();
    for &target in &targets {
        let (elapsed, bytes, found) = match (&engine, args.implementation) {
            (Some(engine), _) => {
                let report = engine.search(&args.path, target)?;
                (report.stats.elapsed, report.stats.bytes_read, report.outcome.is_found())
            }
            (None, Implementation::ParallelMmap) => {
                let report = parallel_mmap_search(&args.path, target, args.threads)?;
                (report.elapsed, report.comparisons * ELEMENT_WIDTH, report.outcome.is_found())
            }
            (None, _) => {
                let report = mmap_search(&args.path, target)?;
                (report.elapsed, report.comparisons * ELEMENT_WIDTH, report.outcome.is_found())
            }
        };
        recorder.record(elapsed, bytes, found);
    }

    let latency = recorder.summary().context("no searches recorded")?;
    let summary = BenchSummary {
        implementation: args.implementation.name().to_string(),
        iterations: recorder.len(),
        found: recorder.found(),
        bytes_read: recorder.bytes(),
        latency,
    };
    output::bench_summary(&summary, format)?;
    Ok(Status::Success)
}
