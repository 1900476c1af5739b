//! Per-round strategy selection.
//!
//! Evaluated before each round is scheduled, from the current interval
//! only. Small intervals stop paying for asynchronous probes: below the
//! linear-scan threshold one bulk read plus an in-memory scan is cheaper
//! than another round trip through the completion queue.

use serde::Serialize;

use crate::config::EngineConfig;
use crate::interval::SearchInterval;

/// What the driver does this round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStrategy {
    /// Read the whole interval synchronously and scan it; terminal.
    LinearScan,
    /// Hint readahead over the interval, then probe.
    PrefetchThenProbe,
    /// Speculative probing only.
    Probe,
}

/// Pick the strategy for a round over `interval`.
pub fn select(interval: SearchInterval, config: &EngineConfig) -> RoundStrategy {
    let span = interval.span();
    if config.linear_scan_enabled() && span < config.linear_scan_threshold {
        RoundStrategy::LinearScan
    } else if config.readahead && span < config.readahead_threshold {
        RoundStrategy::PrefetchThenProbe
    } else {
        RoundStrategy::Probe
    }
}

/// Tracks which interval was last prefetched so a hint is not repeated
/// for the same range on a stalled round.
#[derive(Debug, Default)]
pub struct PrefetchTracker {
    last: Option<SearchInterval>,
}

impl PrefetchTracker {
    /// Record `interval`; false if it was the last one hinted.
    pub fn should_hint(&mut self, interval: SearchInterval) -> bool {
        if self.last == Some(interval) {
            return false;
        }
        self.last = Some(interval);
        true
    }
}

/// Exact-match scan of a buffered interval starting at element `base`.
///
/// Returns the element index of the first match. Stops at the first value
/// above `target` since the input is sorted.
pub fn linear_scan(base: u64, values: &[u64], target: u64) -> Option<u64> {
    for (i, &value) in values.iter().enumerate() {
        if value == target {
            return Some(base + i as u64);
        }
        if value > target {
            break;
        }
    }
    None
}
