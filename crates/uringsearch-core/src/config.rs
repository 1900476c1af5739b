//! Engine configuration.
//!
//! Immutable for the lifetime of one search. Can be built in code, taken
//! from a preset, or loaded from TOML:
//!
//! ```toml
//! max_probes = 8
//! queue_depth = 64
//! zero_copy = true
//! readahead = true
//! linear_scan_threshold = 512
//!
//! [sqpoll]
//! enabled = true
//! idle_timeout_ms = 2000
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::device::SqpollConfig;
use crate::error::{Result, SearchError};

/// Default speculative probes per round
pub const DEFAULT_MAX_PROBES: usize = 4;

/// Default io_uring submission queue depth
pub const DEFAULT_QUEUE_DEPTH: u32 = 64;

/// Default interval span (elements) below which readahead hints are issued
pub const DEFAULT_READAHEAD_THRESHOLD: u64 = 1 << 16;

/// Default consecutive all-failed rounds tolerated before giving up
pub const DEFAULT_MAX_STALLED_ROUNDS: u32 = 8;

/// Configuration for one search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum probes issued per round; also the probe slot pool size.
    pub max_probes: usize,

    /// io_uring submission queue entries. Must hold a full round.
    pub queue_depth: u32,

    /// Register probe buffers with io_uring and read with `ReadFixed`.
    pub zero_copy: bool,

    /// Issue `POSIX_FADV_WILLNEED` once the interval is small.
    pub readahead: bool,

    /// Interval span below which readahead hints are issued.
    pub readahead_threshold: u64,

    /// Interval span below which the interval is read in bulk and scanned.
    /// 0 disables the linear scan.
    pub linear_scan_threshold: u64,

    /// `POSIX_FADV_RANDOM` on the whole file at open.
    pub advise_random: bool,

    /// Consecutive rounds with no valid probe before the search aborts.
    pub max_stalled_rounds: u32,

    /// Kernel submission queue polling.
    // tables serialize after plain values in TOML, keep this last
    pub sqpoll: SqpollConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_probes: DEFAULT_MAX_PROBES,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            zero_copy: false,
            readahead: false,
            readahead_threshold: DEFAULT_READAHEAD_THRESHOLD,
            linear_scan_threshold: 0,
            advise_random: true,
            max_stalled_rounds: DEFAULT_MAX_STALLED_ROUNDS,
            sqpoll: SqpollConfig::disabled(),
        }
    }
}

impl EngineConfig {
    /// Wider fan-out with every optional feature requested
    pub fn high_performance() -> Self {
        Self {
            max_probes: 8,
            queue_depth: 128,
            sqpoll: SqpollConfig::enabled(),
            zero_copy: true,
            readahead: true,
            linear_scan_threshold: 512,
            ..Self::default()
        }
    }

    /// Classic single-probe binary search over io_uring
    pub fn conservative() -> Self {
        Self { max_probes: 1, queue_depth: 8, ..Self::default() }
    }

    /// True if the linear-scan fallback is enabled
    pub fn linear_scan_enabled(&self) -> bool {
        self.linear_scan_threshold > 0
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_probes == 0 {
            return Err(SearchError::InvalidConfig("max_probes cannot be 0".into()));
        }
        if self.max_probes > usize::from(u16::MAX) {
            return Err(SearchError::InvalidConfig(format!(
                "max_probes {} exceeds the registered buffer index range",
                self.max_probes
            )));
        }
        if self.queue_depth == 0 {
            return Err(SearchError::InvalidConfig("queue_depth cannot be 0".into()));
        }
        if self.max_probes as u64 > u64::from(self.queue_depth) {
            return Err(SearchError::InvalidConfig(format!(
                "max_probes {} exceeds queue_depth {}",
                self.max_probes, self.queue_depth
            )));
        }
        if self.max_stalled_rounds == 0 {
            return Err(SearchError::InvalidConfig("max_stalled_rounds cannot be 0".into()));
        }
        self.sqpoll.validate()
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| SearchError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| SearchError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }
}
