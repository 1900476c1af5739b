//! Memory-mapped baselines.
//!
//! Classic binary search over a read-only private mapping of the array
//! file, single-threaded or split across a rayon pool. Used to compare
//! against the io_uring engine; page faults stand in for explicit reads.

use std::fs::File;
use std::os::fd::AsRawFd;
use std::path::Path;
use std::ptr::{null_mut, NonNull};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;

use crate::array_file::element_count;
use crate::error::{Result, SearchError};
use crate::report::SearchOutcome;

/// Result of a baseline search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BaselineReport {
    /// Found or not found
    pub outcome: SearchOutcome,
    /// Element comparisons across all workers
    pub comparisons: u64,
    /// Worker threads used (1 for the single-threaded search)
    pub threads: usize,
    /// Wall time from open to result
    pub elapsed: Duration,
}

/// Read-only private mapping of an array file, unmapped on drop.
struct MappedArray {
    ptr: NonNull<u64>,
    len: usize,
    byte_len: usize,
}

impl MappedArray {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|source| SearchError::Open { path: path.to_path_buf(), source })?;
        let byte_len = file.metadata().map_err(SearchError::Metadata)?.len();
        let len = element_count(byte_len)?;

        let byte_len = usize::try_from(byte_len)
            .map_err(|e| SearchError::Map(std::io::Error::other(e)))?;
        let len = len as usize;

        let ptr = map_readonly(&file, byte_len).map_err(SearchError::Map)?;

        // the file can close now, the mapping keeps its pages
        Ok(Self { ptr, len, byte_len })
    }

    fn advise_random(&self) {
        // SAFETY: range is exactly our mapping.
        let rc =
            unsafe { libc::madvise(self.ptr.as_ptr().cast(), self.byte_len, libc::MADV_RANDOM) };
        if rc != 0 {
            tracing::warn!(error = %std::io::Error::last_os_error(), "madvise(MADV_RANDOM) failed");
        }
    }

    fn as_slice(&self) -> &[u64] {
        // SAFETY: mmap returns page-aligned memory, so u64 alignment holds;
        // len elements were validated against the file size.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

fn map_readonly(file: &File, byte_len: usize) -> std::io::Result<NonNull<u64>> {
    let fd = file.as_raw_fd();
    // SAFETY: fresh mapping of a file the caller holds open; checked for MAP_FAILED.
    let ptr =
        unsafe { libc::mmap(null_mut(), byte_len, libc::PROT_READ, libc::MAP_PRIVATE, fd, 0) };
    if ptr == libc::MAP_FAILED {
        return Err(std::io::Error::last_os_error());
    }
    NonNull::new(ptr.cast::<u64>()).ok_or_else(|| std::io::Error::other("mmap returned null"))
}

impl Drop for MappedArray {
    fn drop(&mut self) {
        // SAFETY: unmapping exactly what open mapped.
        unsafe {
            libc::munmap(self.ptr.as_ptr().cast(), self.byte_len);
        }
    }
}

/// Binary search `data` for `target`, counting comparisons.
///
/// Returns the matching index relative to `data`.
pub fn binary_search_counted(data: &[u64], target: u64) -> (Option<usize>, u64) {
    let mut lo = 0usize;
    let mut hi = data.len();
    let mut comparisons = 0u64;

    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        comparisons += 1;
        match data[mid].cmp(&target) {
            std::cmp::Ordering::Equal => return (Some(mid), comparisons),
            std::cmp::Ordering::Less => lo = mid + 1,
            std::cmp::Ordering::Greater => hi = mid,
        }
    }
    (None, comparisons)
}

/// Split `[0, len)` into `threads` contiguous ranges; the last range takes
/// the remainder. `threads` must be in `1..=len`.
pub fn partition(len: usize, threads: usize) -> Vec<std::ops::Range<usize>> {
    let per = len / threads;
    (0..threads)
        .map(|i| {
            let start = i * per;
            let end = if i + 1 == threads { len } else { start + per };
            start..end
        })
        .collect()
}

/// Single-threaded binary search over a mapping of `path`.
pub fn mmap_search(path: impl AsRef<Path>, target: u64) -> Result<BaselineReport> {
    let started = Instant::now();
    let mapped = MappedArray::open(path.as_ref())?;
    let (index, comparisons) = binary_search_counted(mapped.as_slice(), target);
    drop(mapped);

    let report = BaselineReport {
        outcome: index.map_or(SearchOutcome::NotFound, |i| SearchOutcome::found_at(i as u64)),
        comparisons,
        threads: 1,
        elapsed: started.elapsed(),
    };
    tracing::info!(outcome = ?report.outcome, comparisons, "mmap search complete");
    Ok(report)
}

/// Binary search of `threads` disjoint ranges in parallel.
///
/// The thread count is clamped to the element count. With duplicates
/// spanning ranges, the lowest range holding the target wins.
pub fn parallel_mmap_search(
    path: impl AsRef<Path>,
    target: u64,
    threads: usize,
) -> Result<BaselineReport> {
    if threads == 0 {
        return Err(SearchError::InvalidConfig("threads cannot be 0".into()));
    }
    let started = Instant::now();
    let mapped = MappedArray::open(path.as_ref())?;
    mapped.advise_random();

    let data = mapped.as_slice();
    if threads > data.len() {
        tracing::debug!(requested = threads, elements = data.len(), "clamping thread count");
    }
    let threads = threads.min(data.len());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| SearchError::InvalidConfig(format!("thread pool: {e}")))?;

    let ranges = partition(data.len(), threads);
    let results: Vec<(Option<usize>, u64)> = pool.install(|| {
        ranges
            .par_iter()
            .map(|range| {
                let (hit, comparisons) = binary_search_counted(&data[range.clone()], target);
                (hit.map(|i| range.start + i), comparisons)
            })
            .collect()
    });
    drop(mapped);

    let comparisons = results.iter().map(|(_, c)| c).sum();
    let index = results.iter().find_map(|(hit, _)| *hit);

    let report = BaselineReport {
        outcome: index.map_or(SearchOutcome::NotFound, |i| SearchOutcome::found_at(i as u64)),
        comparisons,
        threads,
        elapsed: started.elapsed(),
    };
    tracing::info!(
        outcome = ?report.outcome,
        comparisons,
        threads,
        "parallel mmap search complete"
    );
    Ok(report)
}
