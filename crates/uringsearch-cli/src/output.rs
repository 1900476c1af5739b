//! Output formatting for CLI.

use std::time::Duration;

use clap::ValueEnum;
use serde::Serialize;
use uringsearch_core::{BaselineReport, Capability, LatencySummary, SearchOutcome, SearchReport};

/// Output format selection.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON output.
    Json,
    /// Raw values (for scripting).
    Raw,
}

/// Milliseconds with microsecond precision
pub fn ms(d: Duration) -> String {
    format!("{:.3} ms", d.as_secs_f64() * 1e3)
}

fn capability(c: &Capability) -> String {
    match c {
        Capability::NotRequested => "off".into(),
        Capability::Active => "on".into(),
        Capability::Unavailable { reason } => format!("unavailable ({reason})"),
    }
}

fn print_outcome(target: u64, outcome: SearchOutcome) {
    match outcome {
        SearchOutcome::Found { byte_offset } => println!(
            "Found value {target} at offset {byte_offset} (element index {})",
            byte_offset / uringsearch_core::ELEMENT_WIDTH
        ),
        SearchOutcome::NotFound => println!("Value {target} not found"),
    }
}

fn print_raw(outcome: SearchOutcome) {
    match outcome.byte_offset() {
        Some(offset) => println!("{offset}"),
        None => println!("-1"),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print an io_uring engine report.
pub fn engine_report(report: &SearchReport, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => return print_json(report),
        OutputFormat::Raw => print_raw(report.outcome),
        OutputFormat::Text => {
            print_outcome(report.target, report.outcome);
            let s = &report.stats;
            println!("Search statistics (io_uring):");
            println!("  Total time:          {}", ms(s.elapsed));
            println!("  Rounds:              {} ({} stalled)", s.rounds, s.stalled_rounds);
            println!("  Probes issued:       {} ({} failed)", s.probes_issued, s.failed_probes);
            println!("  Linear scan:         {} elements", s.linear_scan_elements);
            println!("  Readahead hints:     {}", s.prefetch_hints);
            println!("  Bytes read:          {}", s.bytes_read);
            println!("  Avg time per read:   {}", ms(s.avg_time_per_read()));
            println!("  SQ polling:          {}", capability(&report.capabilities.polling));
            println!("  Registered buffers:  {}", capability(&report.capabilities.zero_copy));
        }
    }
    Ok(())
}

/// Print a memory-mapped baseline report.
pub fn baseline_report(
    target: u64,
    report: &BaselineReport,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct Tagged<'a> {
                target: u64,
                #[serde(flatten)]
                report: &'a BaselineReport,
            }
            return print_json(&Tagged { target, report });
        }
        OutputFormat::Raw => print_raw(report.outcome),
        OutputFormat::Text => {
            print_outcome(target, report.outcome);
            println!("Search statistics (mmap, {} thread(s)):", report.threads);
            println!("  Total time:          {}", ms(report.elapsed));
            println!("  Comparisons:         {}", report.comparisons);
        }
    }
    Ok(())
}

/// Aggregate results of `uringsearch bench`.
#[derive(Debug, Serialize)]
pub struct BenchSummary {
    pub implementation: String,
    pub iterations: usize,
    pub found: usize,
    pub bytes_read: u64,
    pub latency: LatencySummary,
}

/// Print a benchmark summary.
pub fn bench_summary(summary: &BenchSummary, format: OutputFormat) -> anyhow::Result<()> {
    let l = &summary.latency;
    match format {
        OutputFormat::Json => return print_json(summary),
        OutputFormat::Raw => {
            println!(
                "{} {} {} {} {} {}",
                l.min.as_nanos(),
                l.mean.as_nanos(),
                l.p50.as_nanos(),
                l.p95.as_nanos(),
                l.p99.as_nanos(),
                l.max.as_nanos()
            );
        }
        OutputFormat::Text => {
            println!("uringsearch benchmark ({})", summary.implementation);
            println!("{}", "=".repeat(40));
            println!("Searches:   {} ({} found)", summary.iterations, summary.found);
            println!("Bytes read: {}", summary.bytes_read);
            println!();
            println!("{:<8} {:>14}", "Stat", "Latency");
            println!("{}", "-".repeat(23));
            let rows = [
                ("min", l.min),
                ("mean", l.mean),
                ("p50", l.p50),
                ("p95", l.p95),
                ("p99", l.p99),
                ("max", l.max),
            ];
            for (name, value) in rows {
                println!("{name:<8} {:>14}", ms(value));
            }
        }
    }
    Ok(())
}
