//! SQPOLL mode: kernel-side submission queue polling.
//!
//! With `IORING_SETUP_SQPOLL` a kernel thread consumes submissions, so a
//! round's batch reaches the device without a submit syscall. Creating the
//! thread needs privilege on older kernels (`CAP_SYS_NICE` before 5.13);
//! when the kernel refuses, the ring is rebuilt in standard mode and the
//! capability is reported as unavailable.

use std::io;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::Capability;
use crate::error::{Result, SearchError};

/// SQPOLL configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqpollConfig {
    /// Request SQPOLL mode
    pub enabled: bool,

    /// Idle time before the kernel thread sleeps (milliseconds)
    pub idle_timeout_ms: u32,

    /// CPU to pin the kernel polling thread to (-1 for no pinning)
    pub cpu: i32,
}

impl Default for SqpollConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

impl SqpollConfig {
    /// Standard submission mode
    pub fn disabled() -> Self {
        Self { enabled: false, idle_timeout_ms: 2000, cpu: -1 }
    }

    /// Kernel polling with a 2s idle timeout
    pub fn enabled() -> Self {
        Self { enabled: true, ..Self::disabled() }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.idle_timeout_ms == 0 {
            return Err(SearchError::InvalidConfig(
                "sqpoll.idle_timeout_ms cannot be 0 when enabled".into(),
            ));
        }
        Ok(())
    }

    /// Idle timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.idle_timeout_ms))
    }

    /// CPU pin, if any
    pub fn pinned_cpu(&self) -> Option<u32> {
        u32::try_from(self.cpu).ok()
    }
}

/// Ring mode handed to the builder callback during negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingMode<'a> {
    /// Build with `IORING_SETUP_SQPOLL`
    Sqpoll(&'a SqpollConfig),
    /// Build a standard interrupt-driven ring
    Standard,
}

/// Build a ring, preferring SQPOLL when requested.
///
/// `build` is called with [`RingMode::Sqpoll`] first if the config asks for
/// it; an error there is not fatal and the ring is rebuilt with
/// [`RingMode::Standard`]. Only a standard-mode failure is returned.
pub fn negotiate<T>(
    config: &SqpollConfig,
    mut build: impl FnMut(RingMode<'_>) -> io::Result<T>,
) -> Result<(T, Capability)> {
    if !config.enabled {
        let ring = build(RingMode::Standard).map_err(SearchError::DeviceInit)?;
        return Ok((ring, Capability::NotRequested));
    }

    match build(RingMode::Sqpoll(config)) {
        Ok(ring) => {
            tracing::info!(idle = ?config.idle_timeout(), cpu = config.cpu, "SQPOLL mode enabled");
            Ok((ring, Capability::Active))
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "SQPOLL unavailable (needs privilege on older kernels), using standard mode"
            );
            let ring = build(RingMode::Standard).map_err(SearchError::DeviceInit)?;
            Ok((ring, Capability::Unavailable { reason: e.to_string() }))
        }
    }
}
