//! Probes and their completions.

use crate::error::ProbeFault;
use crate::interval::ELEMENT_WIDTH;

/// One speculative read of a single element.
///
/// `slot` is both the identity token carried through the completion queue
/// and the index of the buffer the element is read into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    /// Slot in the bounded probe pool.
    pub slot: usize,
    /// Element index being read.
    pub index: u64,
}

impl Probe {
    /// Create a probe for `index` in `slot`.
    pub fn new(slot: usize, index: u64) -> Self {
        Self { slot, index }
    }

    /// File offset of the element.
    pub fn byte_offset(&self) -> u64 {
        self.index * ELEMENT_WIDTH
    }

    /// Token stored in the SQE `user_data` field.
    pub fn token(&self) -> u64 {
        self.slot as u64
    }
}

/// A finished probe, correlated back to the request that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// The probe this completion answers.
    pub probe: Probe,
    /// Element value, or why none was read.
    pub outcome: Result<u64, ProbeFault>,
}

impl Completion {
    /// A completion that read `value`.
    pub fn value(probe: Probe, value: u64) -> Self {
        Self { probe, outcome: Ok(value) }
    }

    /// A completion that failed with `fault`.
    pub fn fault(probe: Probe, fault: ProbeFault) -> Self {
        Self { probe, outcome: Err(fault) }
    }

    /// True if the read produced a usable value.
    pub fn is_valid(&self) -> bool {
        self.outcome.is_ok()
    }
}
