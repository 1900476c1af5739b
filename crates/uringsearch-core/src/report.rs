//! Search results and per-search counters.

use std::time::Duration;

use serde::Serialize;

use crate::device::CapabilityReport;
use crate::interval::{SearchInterval, ELEMENT_WIDTH};
use crate::strategy::RoundStrategy;

/// Result of one search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SearchOutcome {
    /// The target is at `byte_offset` (a multiple of the element width).
    Found {
        /// Byte offset of the matching element.
        byte_offset: u64,
    },
    /// The target is not in the array.
    NotFound,
}

impl SearchOutcome {
    /// Outcome for a match at element `index`
    pub fn found_at(index: u64) -> Self {
        Self::Found { byte_offset: index * ELEMENT_WIDTH }
    }

    /// True if the target was located
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    /// Byte offset of the match
    pub fn byte_offset(&self) -> Option<u64> {
        match self {
            Self::Found { byte_offset } => Some(*byte_offset),
            Self::NotFound => None,
        }
    }

    /// Element index of the match
    pub fn index(&self) -> Option<u64> {
        self.byte_offset().map(|offset| offset / ELEMENT_WIDTH)
    }
}

/// Counters gathered while a search runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchStats {
    /// Probes submitted to the device
    pub probes_issued: u64,
    /// Probes that completed with an error or short read
    pub failed_probes: u64,
    /// Probe rounds plus the final linear scan, if any
    pub rounds: u32,
    /// Rounds in which no probe produced a value
    pub stalled_rounds: u32,
    /// Elements read by the linear-scan fallback
    pub linear_scan_elements: u64,
    /// Readahead hints issued
    pub prefetch_hints: u32,
    /// Bytes transferred by probes and range reads
    pub bytes_read: u64,
    /// Wall time from open to result
    pub elapsed: Duration,
}

impl SearchStats {
    /// Probe reads plus the range read, if one happened
    pub fn reads(&self) -> u64 {
        self.probes_issued + u64::from(self.linear_scan_elements > 0)
    }

    /// Mean wall time per read
    pub fn avg_time_per_read(&self) -> Duration {
        match u32::try_from(self.reads()) {
            Ok(0) => Duration::ZERO,
            Ok(n) => self.elapsed / n,
            Err(_) => Duration::from_secs_f64(self.elapsed.as_secs_f64() / self.reads() as f64),
        }
    }

    pub(crate) fn record_probes(&mut self, issued: usize, failed: usize) {
        self.probes_issued += issued as u64;
        self.failed_probes += failed as u64;
        self.bytes_read += (issued - failed) as u64 * ELEMENT_WIDTH;
    }

    pub(crate) fn record_scan(&mut self, interval: SearchInterval) {
        self.linear_scan_elements += interval.len();
        self.bytes_read += interval.byte_len();
    }
}

/// One round of the search, as it was executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoundRecord {
    /// Interval at the start of the round
    pub interval: SearchInterval,
    /// What the round did
    pub strategy: RoundStrategy,
    /// Probes submitted (0 for a linear scan)
    pub probes: usize,
    /// Probes that produced a value
    pub valid: usize,
}

/// Everything a search produced.
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    /// Target that was searched for
    pub target: u64,
    /// Found or not found
    pub outcome: SearchOutcome,
    /// Counters
    pub stats: SearchStats,
    /// Features the device actually ran with
    pub capabilities: CapabilityReport,
    /// Round trace, in order
    pub rounds: Vec<RoundRecord>,
}

impl SearchReport {
    /// True if a requested device feature was refused
    pub fn is_degraded(&self) -> bool {
        self.capabilities.is_degraded()
    }
}
