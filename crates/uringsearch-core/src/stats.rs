//! Statistics module - latency aggregation over repeated searches

use std::time::Duration;

use serde::Serialize;

/// Latency distribution of a sample set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LatencySummary {
    /// Number of samples
    pub samples: usize,
    /// Fastest sample
    pub min: Duration,
    /// Slowest sample
    pub max: Duration,
    /// Arithmetic mean
    pub mean: Duration,
    /// Median (nearest rank)
    pub p50: Duration,
    /// 95th percentile (nearest rank)
    pub p95: Duration,
    /// 99th percentile (nearest rank)
    pub p99: Duration,
}

impl LatencySummary {
    /// Summarize `samples`; `None` when empty
    pub fn from_samples(samples: &[Duration]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_unstable();

        let total: Duration = sorted.iter().sum();
        let mean = match u32::try_from(sorted.len()) {
            Ok(n) => total / n,
            Err(_) => Duration::from_secs_f64(total.as_secs_f64() / sorted.len() as f64),
        };

        Some(Self {
            samples: sorted.len(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            mean,
            p50: percentile(&sorted, 50),
            p95: percentile(&sorted, 95),
            p99: percentile(&sorted, 99),
        })
    }
}

/// Nearest-rank percentile of an ascending, non-empty slice
fn percentile(sorted: &[Duration], pct: usize) -> Duration {
    let rank = (pct * sorted.len()).div_ceil(100).max(1);
    sorted[rank.min(sorted.len()) - 1]
}

/// Collects per-search latencies and byte counts
#[derive(Debug, Default)]
pub struct LatencyRecorder {
    samples: Vec<Duration>,
    bytes: u64,
    found: usize,
}

impl LatencyRecorder {
    /// Empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one search
    pub fn record(&mut self, elapsed: Duration, bytes: u64, found: bool) {
        self.samples.push(elapsed);
        self.bytes += bytes;
        self.found += usize::from(found);
    }

    /// Searches recorded
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Total bytes read across all searches
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Searches that located their target
    pub fn found(&self) -> usize {
        self.found
    }

    /// Latency distribution so far; `None` when empty
    pub fn summary(&self) -> Option<LatencySummary> {
        LatencySummary::from_samples(&self.samples)
    }
}
