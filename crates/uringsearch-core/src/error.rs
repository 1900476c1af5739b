//! Error types for uringsearch-core.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::interval::SearchInterval;

/// Errors that abort a search.
///
/// Individual probe read failures are not represented here; they are
/// recoverable and surface as [`ProbeFault`] on the affected completion.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The array file could not be opened.
    #[error("failed to open {path}: {source}")]
    Open {
        /// Path that was opened.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The array file metadata could not be read.
    #[error("failed to stat array file: {0}")]
    Metadata(#[source] io::Error),

    /// File size is not a multiple of the element width.
    #[error("file size {len} is not aligned to {width}-byte elements")]
    Misaligned {
        /// File length in bytes.
        len: u64,
        /// Element width in bytes.
        width: u64,
    },

    /// The array file holds no elements.
    #[error("array file is empty")]
    Empty,

    /// Writing a generated array file failed.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Path being written.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The array file could not be memory-mapped.
    #[error("failed to map array file: {0}")]
    Map(#[source] io::Error),

    /// io_uring could not be created, even in standard mode.
    #[error("io_uring creation failed: {0}")]
    DeviceInit(#[source] io::Error),

    /// Slot buffer memory could not be mapped.
    #[error("probe buffer allocation failed: {0}")]
    BufferAlloc(#[source] io::Error),

    /// No submission queue entry was available for a probe.
    #[error("io_uring submission queue full")]
    QueueFull,

    /// `io_uring_enter` failed.
    #[error("io_uring submission failed: {0}")]
    Submit(#[source] io::Error),

    /// The bulk read backing a linear scan failed.
    #[error("range read failed: {0}")]
    RangeRead(#[source] io::Error),

    /// Every probe failed for too many consecutive rounds.
    #[error("search stalled on {interval} after {rounds} rounds without a valid probe")]
    Stalled {
        /// Interval that could not be narrowed.
        interval: SearchInterval,
        /// Consecutive stalled rounds.
        rounds: u32,
    },

    /// Engine configuration is inconsistent.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read or parsed.
    #[error("config file error: {0}")]
    Config(String),
}

impl SearchError {
    /// True for errors raised while validating the array file shape.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Open { .. } | Self::Metadata(_) | Self::Misaligned { .. } | Self::Empty
        )
    }

    /// True when the asynchronous device could not be brought up at all.
    ///
    /// Callers running on kernels (or sandboxes) without io_uring see this.
    pub fn is_device_unavailable(&self) -> bool {
        matches!(self, Self::DeviceInit(_) | Self::BufferAlloc(_))
    }
}

/// Why a single probe produced no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProbeFault {
    /// The read completed with a negative errno.
    #[error("read failed: errno {0}")]
    Os(i32),

    /// The read returned fewer bytes than one element.
    #[error("short read: {got} of {want} bytes")]
    ShortRead {
        /// Bytes actually read.
        got: u32,
        /// Bytes requested.
        want: u32,
    },
}

impl ProbeFault {
    /// Classify a raw completion result for an element-sized read.
    ///
    /// Returns `None` when the read filled the element.
    pub fn from_cqe_result(res: i32, want: u32) -> Option<Self> {
        if res < 0 {
            Some(Self::Os(-res))
        } else if res as u32 != want {
            Some(Self::ShortRead { got: res as u32, want })
        } else {
            None
        }
    }
}

/// Result type for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;
