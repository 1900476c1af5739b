//! Probe scheduling: where to read each round.
//!
//! Wide intervals get the full speculative fan-out; once the interval
//! is within `max_probes * 100` elements a single probe is issued, which
//! degrades the engine to a classic binary search.

use crate::interval::SearchInterval;
use crate::probe::Probe;

/// Interval width multiplier above which all configured probes are used.
pub const FANOUT_FACTOR: u64 = 100;

/// Number of probes to issue for `interval`.
pub fn active_probes(interval: SearchInterval, max_probes: usize) -> usize {
    let max = max_probes.max(1);
    if interval.span() > (max as u64).saturating_mul(FANOUT_FACTOR) {
        max
    } else {
        1
    }
}

/// Plans probe positions for one round.
///
/// Owns the round's probe list so the same allocation is reused every round.
#[derive(Debug)]
pub struct ProbeScheduler {
    max_probes: usize,
    planned: Vec<Probe>,
}

impl ProbeScheduler {
    /// Scheduler issuing at most `max_probes` probes per round.
    pub fn new(max_probes: usize) -> Self {
        let max_probes = max_probes.max(1);
        Self { max_probes, planned: Vec::with_capacity(max_probes) }
    }

    /// Maximum probes per round (also the slot pool size).
    pub fn max_probes(&self) -> usize {
        self.max_probes
    }

    /// Evenly spaced probes inside `interval`, one slot each.
    ///
    /// The i-th probe sits at `lo + step * (i + 1)` clamped to `hi`, with
    /// `step = max(1, span / (active + 1))`.
    pub fn plan(&mut self, interval: SearchInterval) -> &[Probe] {
        let active = active_probes(interval, self.max_probes);
        let step = (interval.span() / (active as u64 + 1)).max(1);

        self.planned.clear();
        for i in 0..active {
            let index = interval.lo.saturating_add(step * (i as u64 + 1)).min(interval.hi);
            self.planned.push(Probe::new(i, index));
        }

        tracing::debug!(%interval, active, step, "planned probes");
        &self.planned
    }
}
