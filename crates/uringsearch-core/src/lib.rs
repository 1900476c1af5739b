//! Speculative asynchronous binary search over sorted `u64` array files.
//!
//! Instead of one dependent read per step, each round issues several
//! evenly spaced probe reads through a single io_uring submission, waits
//! for all of them, and narrows the interval with every result at once.
//! Wide intervals get the full fan-out; small ones fall back to a single
//! probe, a readahead hint, or a bulk read and linear scan.
//!
//! # Example
//!
//! ```no_run
//! use uringsearch_core::{EngineConfig, SearchEngine, SearchOutcome};
//!
//! let engine = SearchEngine::new(EngineConfig::default())?;
//! let report = engine.search("/data/sorted.bin", 5_000_000)?;
//!
//! if let SearchOutcome::Found { byte_offset } = report.outcome {
//!     println!("found at byte {byte_offset}");
//! }
//! # Ok::<(), uringsearch_core::SearchError>(())
//! ```
//!
//! The file holds native-endian `u64` values sorted ascending with no
//! header. Its length must be a non-zero multiple of 8 bytes.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod array_file;
pub mod baseline;
pub mod config;
pub mod device;
pub mod engine;
mod error;
pub mod generate;
pub mod interval;
pub mod narrower;
pub mod probe;
pub mod report;
pub mod scheduler;
pub mod stats;
pub mod strategy;

pub use array_file::{ElementSource, SortedArrayFile};
pub use baseline::{mmap_search, parallel_mmap_search, BaselineReport};
pub use config::EngineConfig;
pub use device::{Capability, CapabilityReport, ProbeDevice, SqpollConfig, UringDevice};
pub use engine::{SearchEngine, SearchPhase};
pub use error::{ProbeFault, Result, SearchError};
pub use generate::create_test_file;
pub use interval::{SearchInterval, ELEMENT_WIDTH};
pub use probe::{Completion, Probe};
pub use report::{RoundRecord, SearchOutcome, SearchReport, SearchStats};
pub use stats::{LatencyRecorder, LatencySummary};
pub use strategy::RoundStrategy;
