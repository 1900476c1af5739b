//! # uringsearch
//!
//! Speculative asynchronous binary search over sorted `u64` array files.
//!
//! This is the workspace root crate that re-exports core functionality.
//! For direct usage, depend on individual sub-crates:
//!
//! - [`uringsearch-core`] - io_uring search engine, mmap baselines, test file generation
//! - [`uringsearch-cli`] - CLI tool (`uringsearch` binary)

pub use uringsearch_core::*;
