//! Interval narrowing from a batch of completed probes.

use crate::interval::SearchInterval;
use crate::probe::Completion;

/// What one round of completions did to the interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Narrowing {
    /// A probe read the target.
    Hit {
        /// Element index that matched.
        index: u64,
        /// Byte offset of that element.
        byte_offset: u64,
    },
    /// The interval shrank.
    Narrowed(SearchInterval),
    /// Bounds crossed: the target is not in the array.
    Exhausted,
    /// No completion carried a value; the interval is unchanged.
    Stalled,
}

/// Apply all valid completions to `interval` at once.
///
/// The first completion equal to `target` wins, even if later ones would
/// narrow further. Among duplicates of the target, whichever a probe lands
/// on is reported.
pub fn narrow(interval: SearchInterval, target: u64, completions: &[Completion]) -> Narrowing {
    let mut lo = interval.lo;
    // hi is tracked as `hi + 1` so index 0 can empty the interval without underflow
    let mut hi_excl = interval.hi + 1;
    let mut valid = 0usize;

    for completion in completions {
        let Ok(value) = completion.outcome else {
            continue;
        };
        valid += 1;
        let index = completion.probe.index;

        if value == target {
            return Narrowing::Hit { index, byte_offset: completion.probe.byte_offset() };
        }
        if value < target {
            lo = lo.max(index + 1);
        } else {
            hi_excl = hi_excl.min(index);
        }
    }

    if valid == 0 {
        return Narrowing::Stalled;
    }

    match hi_excl.checked_sub(1).and_then(|hi| SearchInterval::checked(lo, hi)) {
        Some(next) => Narrowing::Narrowed(next),
        None => Narrowing::Exhausted,
    }
}
