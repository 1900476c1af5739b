//! Asynchronous probe device.
//!
//! [`ProbeDevice`] is the seam between the search driver and the kernel:
//! submit one batch of probes, block until all of them complete, get the
//! completions back in whatever order the device finished them.
//! [`UringDevice`] is the io_uring implementation; tests drive the engine
//! through in-memory devices.

pub mod buffers;
pub mod sqpoll;
pub mod uring;

use serde::Serialize;

pub use buffers::SlotBufferPool;
pub use sqpoll::{RingMode, SqpollConfig};
pub use uring::UringDevice;

use crate::error::Result;
use crate::probe::{Completion, Probe};

/// Outcome of negotiating one optional device feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Capability {
    /// The caller did not ask for it
    NotRequested,
    /// Requested and in use
    Active,
    /// Requested but refused; the device runs without it
    Unavailable {
        /// What the kernel reported
        reason: String,
    },
}

impl Capability {
    /// True if the feature is in use
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// True if the feature was requested and refused
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// What the device actually runs with, versus what was asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityReport {
    /// Kernel submission queue polling
    pub polling: Capability,
    /// Registered (fixed) probe buffers
    pub zero_copy: Capability,
}

impl CapabilityReport {
    /// Neither feature requested
    pub fn standard() -> Self {
        Self { polling: Capability::NotRequested, zero_copy: Capability::NotRequested }
    }

    /// True if any requested feature was refused
    pub fn is_degraded(&self) -> bool {
        self.polling.is_degraded() || self.zero_copy.is_degraded()
    }
}

impl Default for CapabilityReport {
    fn default() -> Self {
        Self::standard()
    }
}

/// A device that reads batches of probes asynchronously.
pub trait ProbeDevice {
    /// Negotiated features
    fn capabilities(&self) -> &CapabilityReport;

    /// Probe slots available per batch
    fn slots(&self) -> usize;

    /// Submit all `probes` in one transition and wait for every completion.
    ///
    /// Completions may arrive in any order and must be matched to probes by
    /// slot, not by position. Individual read failures come back as faulted
    /// completions; an `Err` aborts the search.
    fn submit_and_wait(&mut self, probes: &[Probe]) -> Result<Vec<Completion>>;
}
