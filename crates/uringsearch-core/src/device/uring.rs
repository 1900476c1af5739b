//! io_uring probe device.
//!
//! One ring per search. Each round pushes one `Read` (or `ReadFixed` when
//! the slot buffers are registered) per probe, enters the kernel once, and
//! reaps exactly as many completions as were submitted.
//!
//! ```text
//! probes ──► SQ [slot0][slot1]..[slotN] ──io_uring_enter──► kernel
//!                                                            │
//! completions ◄── CQ (any order, user_data = slot) ◄─────────┘
//! ```
//!
//! Teardown order on drop: drain in-flight reads, unregister buffers, close
//! the ring, unmap the slot buffers. The array file is borrowed, so it is
//! closed only after the device is gone.

use std::io;
use std::marker::PhantomData;
use std::os::fd::{AsRawFd, RawFd};

use io_uring::{opcode, types, IoUring};

use super::buffers::{SlotBufferPool, SLOT_SIZE};
use super::sqpoll::{self, RingMode};
use super::{Capability, CapabilityReport, ProbeDevice};
use crate::array_file::SortedArrayFile;
use crate::config::EngineConfig;
use crate::error::{ProbeFault, Result, SearchError};
use crate::probe::{Completion, Probe};

/// io_uring-backed [`ProbeDevice`] reading from one array file.
pub struct UringDevice<'f> {
    // field order is drop order: the ring must close before the buffers unmap
    ring: IoUring,
    buffers: SlotBufferPool,
    fd: RawFd,
    buffers_registered: bool,
    capabilities: CapabilityReport,
    /// Probe submitted in each slot, used to correlate completions
    pending: Vec<Option<Probe>>,
    _file: PhantomData<&'f SortedArrayFile>,
}

impl<'f> UringDevice<'f> {
    /// Create the ring and slot buffers for `file`.
    ///
    /// SQPOLL and buffer registration are attempted when configured; if the
    /// kernel refuses either, the device comes up without it and the
    /// refusal is recorded in [`capabilities`](ProbeDevice::capabilities).
    pub fn open(file: &'f SortedArrayFile, config: &EngineConfig) -> Result<Self> {
        Self::open_with(file, config, |ring, iovecs| {
            // SAFETY: the iovecs point into the slot pool, which the device
            // owns and unregisters in Drop before it is unmapped
            unsafe { ring.submitter().register_buffers(iovecs) }
        })
    }

    /// As [`open`](Self::open), with buffer registration done by `register`.
    fn open_with(
        file: &'f SortedArrayFile,
        config: &EngineConfig,
        register: impl FnOnce(&IoUring, &[libc::iovec]) -> io::Result<()>,
    ) -> Result<Self> {
        let entries = config.queue_depth;
        let (ring, polling) = sqpoll::negotiate(&config.sqpoll, |mode| build_ring(mode, entries))?;

        let buffers = SlotBufferPool::new(config.max_probes).map_err(SearchError::BufferAlloc)?;
        let iovecs = buffers.iovecs();
        let (buffers_registered, zero_copy) =
            negotiate_buffers(config.zero_copy, || register(&ring, &iovecs));

        let device = Self {
            ring,
            buffers,
            fd: file.as_raw_fd(),
            buffers_registered,
            capabilities: CapabilityReport { polling, zero_copy },
            pending: vec![None; config.max_probes],
            _file: PhantomData,
        };

        tracing::info!(
            entries,
            slots = config.max_probes,
            polling = ?device.capabilities.polling,
            zero_copy = ?device.capabilities.zero_copy,
            "io_uring probe device ready"
        );
        Ok(device)
    }

    /// True if SQEs reference registered buffers
    pub fn uses_fixed_buffers(&self) -> bool {
        self.buffers_registered
    }

    fn push_probe(&mut self, probe: Probe) -> Result<()> {
        let pending = self.pending.get_mut(probe.slot).ok_or(SearchError::QueueFull)?;
        if pending.is_some() {
            return Err(SearchError::QueueFull);
        }
        let buf = self.buffers.begin(probe.slot).ok_or(SearchError::QueueFull)?;
        *pending = Some(probe);

        let len = SLOT_SIZE as u32;
        let fd = types::Fd(self.fd);
        let sqe = if self.buffers_registered {
            opcode::ReadFixed::new(fd, buf, len, probe.slot as u16)
                .offset(probe.byte_offset())
                .build()
        } else {
            opcode::Read::new(fd, buf, len).offset(probe.byte_offset()).build()
        }
        .user_data(probe.token());

        // SAFETY: buf stays mapped and is not touched by us until this slot's
        // completion is reaped
        let pushed = unsafe { self.ring.submission().push(&sqe) };
        if pushed.is_err() {
            // never reached the kernel, take the slot back
            self.buffers.release(probe.slot);
            self.pending[probe.slot] = None;
            return Err(SearchError::QueueFull);
        }
        Ok(())
    }

    fn enter(&self, want: usize) -> io::Result<usize> {
        loop {
            match self.ring.submit_and_wait(want) {
                Err(e) if e.raw_os_error() == Some(libc::EINTR) => continue,
                other => return other,
            }
        }
    }

    fn reap(&mut self, out: &mut Vec<Completion>) {
        let cqes: Vec<(u64, i32)> =
            self.ring.completion().map(|cqe| (cqe.user_data(), cqe.result())).collect();

        for (token, res) in cqes {
            tracing::trace!(token, res, "probe completion");
            let slot = token as usize;
            let Some(probe) = self.pending.get_mut(slot).and_then(Option::take) else {
                tracing::warn!(token, "completion for unknown probe slot");
                continue;
            };
            let completion = match ProbeFault::from_cqe_result(res, SLOT_SIZE as u32) {
                None => match self.buffers.complete(slot) {
                    Some(value) => Completion::value(probe, value),
                    None => continue,
                },
                Some(fault) => {
                    self.buffers.release(slot);
                    tracing::debug!(index = probe.index, %fault, "probe read failed");
                    Completion::fault(probe, fault)
                }
            };
            out.push(completion);
        }
    }

    /// Wait for every outstanding read so the kernel no longer owns any slot.
    fn drain(&mut self) {
        let mut discarded = Vec::new();
        while self.buffers.in_flight() > 0 {
            if let Err(e) = self.enter(self.buffers.in_flight()) {
                tracing::warn!(error = %e, "failed to drain in-flight probes");
                break;
            }
            self.reap(&mut discarded);
        }
        if !discarded.is_empty() {
            tracing::debug!(count = discarded.len(), "discarded outstanding completions");
        }
    }
}

/// Register slot buffers if `requested`.
///
/// Returns whether SQEs may use `ReadFixed`, and the zero-copy capability.
/// A refusal is not fatal: probes fall back to plain `Read`.
fn negotiate_buffers(
    requested: bool,
    register: impl FnOnce() -> io::Result<()>,
) -> (bool, Capability) {
    if !requested {
        return (false, Capability::NotRequested);
    }
    match register() {
        Ok(()) => {
            tracing::info!("registered probe buffers with io_uring");
            (true, Capability::Active)
        }
        Err(e) => {
            tracing::warn!(error = %e, "buffer registration failed, continuing without zero-copy");
            (false, Capability::Unavailable { reason: e.to_string() })
        }
    }
}

fn build_ring(mode: RingMode<'_>, entries: u32) -> io::Result<IoUring> {
    match mode {
        RingMode::Sqpoll(cfg) => {
            let mut builder = IoUring::builder();
            builder.setup_sqpoll(cfg.idle_timeout_ms);
            if let Some(cpu) = cfg.pinned_cpu() {
                builder.setup_sqpoll_cpu(cpu);
            }
            builder.build(entries)
        }
        RingMode::Standard => IoUring::new(entries),
    }
}

impl ProbeDevice for UringDevice<'_> {
    fn capabilities(&self) -> &CapabilityReport {
        &self.capabilities
    }

    fn slots(&self) -> usize {
        self.buffers.slots()
    }

    fn submit_and_wait(&mut self, probes: &[Probe]) -> Result<Vec<Completion>> {
        for probe in probes {
            self.push_probe(*probe)?;
        }

        let mut completions = Vec::with_capacity(probes.len());
        while self.buffers.in_flight() > 0 {
            self.enter(self.buffers.in_flight()).map_err(SearchError::Submit)?;
            self.reap(&mut completions);
        }
        Ok(completions)
    }
}

impl Drop for UringDevice<'_> {
    fn drop(&mut self) {
        if self.buffers.in_flight() > 0 {
            self.drain();
        }
        if self.buffers_registered {
            if let Err(e) = self.ring.submitter().unregister_buffers() {
                tracing::warn!(error = %e, "failed to unregister probe buffers");
            }
        }
        tracing::debug!("io_uring probe device closed");
    }
}
