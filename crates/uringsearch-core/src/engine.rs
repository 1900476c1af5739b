//! Search driver.
//!
//! Runs rounds of strategy selection, probe scheduling, one batched device
//! submission and interval narrowing until the target is hit, the interval
//! is exhausted, or a linear scan settles it.
//!
//! ```text
//! Init ─► Opening ─► Searching ─┬─► Found ────┐
//!                               ├─► NotFound ─┼─► Closed
//!            (any failure) ─────┴─► IoError ──┘
//! ```
//!
//! Completions of one round are fully applied before the next round is
//! planned. There is never more than one batch in flight.

use std::path::Path;
use std::time::Instant;

use serde::Serialize;

use crate::array_file::{ElementSource, SortedArrayFile};
use crate::config::EngineConfig;
use crate::device::{ProbeDevice, UringDevice};
use crate::error::{Result, SearchError};
use crate::interval::SearchInterval;
use crate::narrower::{narrow, Narrowing};
use crate::probe::Probe;
use crate::report::{RoundRecord, SearchOutcome, SearchReport, SearchStats};
use crate::scheduler::ProbeScheduler;
use crate::strategy::{self, PrefetchTracker, RoundStrategy};

/// Lifecycle phase of one search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPhase {
    /// Nothing acquired yet
    Init,
    /// Opening the file and the device
    Opening,
    /// Running rounds
    Searching,
    /// Target located
    Found,
    /// Interval exhausted
    NotFound,
    /// Search aborted by an error
    IoError,
    /// All resources released
    Closed,
}

impl SearchPhase {
    /// True once the search has a result (or failed)
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Found | Self::NotFound | Self::IoError | Self::Closed)
    }

    /// True if `next` is an edge of the lifecycle graph. Any phase but
    /// `Closed` may close.
    pub fn can_advance_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Closed, _) => false,
            (_, Self::Closed) => true,
            (Self::Init, Self::Opening) | (Self::Opening, Self::Searching) => true,
            (Self::Opening | Self::Searching, Self::IoError) => true,
            (Self::Searching, Self::Found | Self::NotFound) => true,
            _ => false,
        }
    }
}

/// Logs phase transitions; reaching `Closed` happens on drop, after
/// everything declared later in the same scope has been released.
#[derive(Debug)]
struct PhaseTracker {
    current: SearchPhase,
}

impl PhaseTracker {
    fn new() -> Self {
        Self { current: SearchPhase::Init }
    }

    fn advance(&mut self, next: SearchPhase) {
        debug_assert!(self.current.can_advance_to(next), "{:?} -> {next:?}", self.current);
        tracing::info!(from = ?self.current, to = ?next, "search phase");
        self.current = next;
    }

    fn fail(&mut self, err: SearchError) -> SearchError {
        tracing::warn!(error = %err, "search failed");
        self.advance(SearchPhase::IoError);
        err
    }
}

impl Drop for PhaseTracker {
    fn drop(&mut self) {
        self.advance(SearchPhase::Closed);
    }
}

/// Mutable bookkeeping for one run.
struct RoundState {
    scheduler: ProbeScheduler,
    prefetch: PrefetchTracker,
    stats: SearchStats,
    rounds: Vec<RoundRecord>,
    stalled: u32,
}

/// Speculative io_uring binary search.
#[derive(Debug, Clone)]
pub struct SearchEngine {
    config: EngineConfig,
}

impl SearchEngine {
    /// Create an engine; the configuration is validated here.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration in use
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Search the array file at `path` for `target`.
    ///
    /// Opens and validates the file, brings up an io_uring device with
    /// whatever features the kernel grants, runs the search and releases
    /// everything before returning, on every path.
    pub fn search(&self, path: impl AsRef<Path>, target: u64) -> Result<SearchReport> {
        let started = Instant::now();
        let mut phases = PhaseTracker::new();
        phases.advance(SearchPhase::Opening);

        let file = SortedArrayFile::open(path.as_ref()).map_err(|e| phases.fail(e))?;
        if self.config.advise_random {
            if let Err(e) = file.advise_random() {
                tracing::warn!(error = %e, "POSIX_FADV_RANDOM failed, continuing");
            }
        }

        let mut device = UringDevice::open(&file, &self.config).map_err(|e| phases.fail(e))?;
        tracing::info!(
            polling = ?device.capabilities().polling,
            zero_copy = ?device.capabilities().zero_copy,
            "device ready"
        );

        self.drive(&file, &mut device, target, &mut phases, started)
    }

    /// Search `source` for `target` through an already open `device`.
    ///
    /// The caller owns opening; the run still passes through `Opening`
    /// so both entry points walk the same phases.
    pub fn run<S, D>(&self, source: &S, device: &mut D, target: u64) -> Result<SearchReport>
    where
        S: ElementSource + ?Sized,
        D: ProbeDevice + ?Sized,
    {
        let started = Instant::now();
        let mut phases = PhaseTracker::new();
        phases.advance(SearchPhase::Opening);
        self.drive(source, device, target, &mut phases, started)
    }

    fn drive<S, D>(
        &self,
        source: &S,
        device: &mut D,
        target: u64,
        phases: &mut PhaseTracker,
        started: Instant,
    ) -> Result<SearchReport>
    where
        S: ElementSource + ?Sized,
        D: ProbeDevice + ?Sized,
    {
        let Some(interval) = SearchInterval::full(source.len()) else {
            return Err(phases.fail(SearchError::Empty));
        };

        let capabilities = device.capabilities().clone();
        if capabilities.is_degraded() {
            tracing::warn!(
                polling = ?capabilities.polling,
                zero_copy = ?capabilities.zero_copy,
                "running without requested device features"
            );
        }

        let probes = self.config.max_probes.min(device.slots()).max(1);
        let mut state = RoundState {
            scheduler: ProbeScheduler::new(probes),
            prefetch: PrefetchTracker::default(),
            stats: SearchStats::default(),
            rounds: Vec::new(),
            stalled: 0,
        };

        phases.advance(SearchPhase::Searching);
        let outcome = match self.search_rounds(source, device, target, interval, &mut state) {
            Ok(outcome) => outcome,
            Err(e) => return Err(phases.fail(e)),
        };
        phases.advance(if outcome.is_found() { SearchPhase::Found } else { SearchPhase::NotFound });

        state.stats.elapsed = started.elapsed();
        tracing::info!(
            key = target,
            ?outcome,
            rounds = state.stats.rounds,
            probes = state.stats.probes_issued,
            elapsed_us = state.stats.elapsed.as_micros() as u64,
            "search complete"
        );

        Ok(SearchReport {
            target,
            outcome,
            stats: state.stats,
            capabilities,
            rounds: state.rounds,
        })
    }

    fn search_rounds<S, D>(
        &self,
        source: &S,
        device: &mut D,
        target: u64,
        mut interval: SearchInterval,
        state: &mut RoundState,
    ) -> Result<SearchOutcome>
    where
        S: ElementSource + ?Sized,
        D: ProbeDevice + ?Sized,
    {
        loop {
            let strategy = strategy::select(interval, &self.config);
            state.stats.rounds += 1;

            match strategy {
                RoundStrategy::LinearScan => {
                    let values = source.read_range(interval).map_err(SearchError::RangeRead)?;
                    state.stats.record_scan(interval);
                    let valid = values.len();
                    state.rounds.push(RoundRecord { interval, strategy, probes: 0, valid });
                    tracing::debug!(%interval, "linear scan");

                    return Ok(match strategy::linear_scan(interval.lo, &values, target) {
                        Some(index) => SearchOutcome::found_at(index),
                        None => SearchOutcome::NotFound,
                    });
                }
                RoundStrategy::PrefetchThenProbe => {
                    if state.prefetch.should_hint(interval) {
                        match source.prefetch(interval) {
                            Ok(()) => state.stats.prefetch_hints += 1,
                            Err(e) => {
                                tracing::warn!(%interval, error = %e, "readahead hint failed");
                            }
                        }
                    }
                }
                RoundStrategy::Probe => {}
            }

            let probes = state.scheduler.plan(interval);
            let issued = probes.len();
            let completions = device.submit_and_wait(probes)?;

            let mut valid = 0usize;
            for completion in &completions {
                let Probe { slot, index } = completion.probe;
                match completion.outcome {
                    Ok(value) => {
                        valid += 1;
                        tracing::trace!(slot, index, value);
                    }
                    Err(fault) => tracing::debug!(slot, index, %fault, "probe failed"),
                }
            }
            state.stats.record_probes(issued, issued.saturating_sub(valid));
            state.rounds.push(RoundRecord { interval, strategy, probes: issued, valid });

            match narrow(interval, target, &completions) {
                Narrowing::Hit { index, .. } => {
                    debug_assert!(interval.contains(index));
                    return Ok(SearchOutcome::found_at(index));
                }
                Narrowing::Exhausted => return Ok(SearchOutcome::NotFound),
                Narrowing::Narrowed(next) => {
                    debug_assert!(next.len() < interval.len(), "{next} does not shrink {interval}");
                    state.stalled = 0;
                    interval = next;
                }
                Narrowing::Stalled => {
                    state.stalled += 1;
                    state.stats.stalled_rounds += 1;
                    let stalled = state.stalled;
                    tracing::warn!(%interval, stalled, "round produced no valid probe");
                    if state.stalled >= self.config.max_stalled_rounds {
                        return Err(SearchError::Stalled { interval, rounds: state.stalled });
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::io;

    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    use crate::device::{Capability, CapabilityReport};
    use crate::error::ProbeFault;
    use crate::probe::{Completion, Probe};

    // ========================================================================
    // In-memory fixtures
    // ========================================================================

    /// Elements held in memory, recording readahead hints.
    struct MemorySource {
        data: Vec<u64>,
        hints: RefCell<Vec<SearchInterval>>,
        fail_prefetch: bool,
        fail_range: bool,
    }

    impl MemorySource {
        fn new(data: Vec<u64>) -> Self {
            Self { data, hints: RefCell::new(Vec::new()), fail_prefetch: false, fail_range: false }
        }
    }

    impl ElementSource for MemorySource {
        fn len(&self) -> u64 {
            self.data.len() as u64
        }

        fn read_range(&self, interval: SearchInterval) -> io::Result<Vec<u64>> {
            if self.fail_range {
                return Err(io::Error::from_raw_os_error(libc::EIO));
            }
            self.data
                .get(interval.lo as usize..=interval.hi as usize)
                .map(<[u64]>::to_vec)
                .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))
        }

        fn prefetch(&self, interval: SearchInterval) -> io::Result<()> {
            self.hints.borrow_mut().push(interval);
            if self.fail_prefetch {
                return Err(io::Error::from_raw_os_error(libc::EINVAL));
            }
            Ok(())
        }
    }

    /// Device answering probes from memory, completing them in shuffled
    /// order, with optional injected faults.
    struct MockDevice {
        data: Vec<u64>,
        capabilities: CapabilityReport,
        slots: usize,
        rng: StdRng,
        /// Every probe of the first N batches fails
        failing_batches: u32,
        /// Probes in this slot always fail
        failing_slot: Option<usize>,
        batches: u32,
    }

    impl MockDevice {
        fn new(data: Vec<u64>, slots: usize) -> Self {
            Self {
                data,
                capabilities: CapabilityReport::standard(),
                slots,
                rng: StdRng::seed_from_u64(0x5eed),
                failing_batches: 0,
                failing_slot: None,
                batches: 0,
            }
        }
    }

    impl ProbeDevice for MockDevice {
        fn capabilities(&self) -> &CapabilityReport {
            &self.capabilities
        }

        fn slots(&self) -> usize {
            self.slots
        }

        fn submit_and_wait(&mut self, probes: &[Probe]) -> Result<Vec<Completion>> {
            assert!(probes.len() <= self.slots, "batch larger than slot pool");
            let slots: HashSet<usize> = probes.iter().map(|p| p.slot).collect();
            assert_eq!(slots.len(), probes.len(), "slot aliased within a batch");

            self.batches += 1;
            let batch_fails = self.batches <= self.failing_batches;
            let mut out: Vec<Completion> = probes
                .iter()
                .map(|&probe| {
                    if batch_fails || self.failing_slot == Some(probe.slot) {
                        return Completion::fault(probe, ProbeFault::Os(libc::EIO));
                    }
                    match self.data.get(probe.index as usize) {
                        Some(&value) => Completion::value(probe, value),
                        None => Completion::fault(probe, ProbeFault::ShortRead { got: 0, want: 8 }),
                    }
                })
                .collect();
            out.shuffle(&mut self.rng);
            Ok(out)
        }
    }

    fn spaced(n: u64) -> Vec<u64> {
        (0..n).map(|i| i * 10).collect()
    }

    fn run(config: EngineConfig, data: Vec<u64>, target: u64) -> Result<SearchReport> {
        let engine = SearchEngine::new(config)?;
        let source = MemorySource::new(data.clone());
        let mut device = MockDevice::new(data, engine.config().max_probes);
        engine.run(&source, &mut device, target)
    }

    fn config_matrix() -> Vec<EngineConfig> {
        let mut configs = Vec::new();
        for max_probes in [1, 4, 8] {
            for readahead in [false, true] {
                for linear_scan_threshold in [0, 512] {
                    configs.push(EngineConfig {
                        max_probes,
                        readahead,
                        linear_scan_threshold,
                        ..EngineConfig::default()
                    });
                }
            }
        }
        configs
    }

    fn log2_ceil(n: u64) -> u32 {
        64 - n.saturating_sub(1).leading_zeros()
    }

    // ========================================================================
    // Construction
    // ========================================================================

    #[test]
    fn test_engine_rejects_invalid_config() {
        let config = EngineConfig { max_probes: 0, ..EngineConfig::default() };
        assert!(matches!(SearchEngine::new(config), Err(SearchError::InvalidConfig(_))));
    }

    #[test]
    fn test_search_missing_file_fails_before_device() {
        let engine = SearchEngine::new(EngineConfig::default()).unwrap();
        let err = engine.search("/nonexistent/uringsearch.bin", 1).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_search_empty_file_fails_before_device() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let engine = SearchEngine::new(EngineConfig::default()).unwrap();
        assert!(matches!(engine.search(tmp.path(), 1), Err(SearchError::Empty)));
    }

    #[test]
    fn test_run_empty_source() {
        let err = run(EngineConfig::default(), Vec::new(), 1).unwrap_err();
        assert!(matches!(err, SearchError::Empty));
    }

    // ========================================================================
    // Correctness
    // ========================================================================

    #[test]
    fn test_million_elements_found() {
        let data = spaced(1_000_000);
        for config in config_matrix() {
            let report = run(config.clone(), data.clone(), 5_000_000).unwrap();
            assert_eq!(
                report.outcome,
                SearchOutcome::Found { byte_offset: 4_000_000 },
                "config {config:?}"
            );
        }
    }

    #[test]
    fn test_million_elements_absent() {
        let data = spaced(1_000_000);
        for config in config_matrix() {
            let report = run(config.clone(), data.clone(), 10_000_000).unwrap();
            assert_eq!(report.outcome, SearchOutcome::NotFound, "config {config:?}");
        }
    }

    #[test]
    fn test_every_position_found() {
        let data = spaced(2_000);
        for config in config_matrix() {
            for (i, &value) in data.iter().enumerate() {
                let report = run(config.clone(), data.clone(), value).unwrap();
                assert_eq!(report.outcome.index(), Some(i as u64), "config {config:?}");
            }
        }
    }

    #[test]
    fn test_gaps_and_bounds_not_found() {
        let data = spaced(2_000);
        for config in config_matrix() {
            for target in [5, 15, 9_995, 19_991, 19_999, 1_000_000, u64::MAX] {
                let report = run(config.clone(), data.clone(), target).unwrap();
                assert_eq!(report.outcome, SearchOutcome::NotFound, "target {target}");
            }
        }
    }

    #[test]
    fn test_single_element() {
        for config in config_matrix() {
            let report = run(config.clone(), vec![42], 42).unwrap();
            assert_eq!(report.outcome, SearchOutcome::Found { byte_offset: 0 });
            assert_eq!(run(config.clone(), vec![42], 7).unwrap().outcome, SearchOutcome::NotFound);
            assert_eq!(run(config, vec![42], 100).unwrap().outcome, SearchOutcome::NotFound);
        }
    }

    #[test]
    fn test_first_and_last_of_large_array() {
        let data = spaced(100_000);
        let config = EngineConfig { max_probes: 8, ..EngineConfig::default() };
        assert_eq!(run(config.clone(), data.clone(), 0).unwrap().outcome.index(), Some(0));
        assert_eq!(run(config, data, 999_990).unwrap().outcome.index(), Some(99_999));
    }

    #[test]
    fn test_duplicates_return_matching_offset() {
        let mut data = vec![1, 2, 3];
        data.extend(std::iter::repeat(7).take(5_000));
        data.extend([8, 9, 10]);
        for config in config_matrix() {
            let report = run(config, data.clone(), 7).unwrap();
            let index = report.outcome.index().unwrap();
            assert_eq!(data[index as usize], 7);
        }
    }

    #[test]
    fn test_random_sorted_arrays() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..20 {
            let len = rng.gen_range(1..5_000);
            let mut data: Vec<u64> = (0..len).map(|_| rng.gen_range(0..50_000)).collect();
            data.sort_unstable();
            let config = EngineConfig {
                max_probes: rng.gen_range(1..=8),
                linear_scan_threshold: rng.gen_range(0..64),
                ..EngineConfig::default()
            };
            for _ in 0..20 {
                let target = rng.gen_range(0..50_001);
                let report = run(config.clone(), data.clone(), target).unwrap();
                match report.outcome.index() {
                    Some(i) => assert_eq!(data[i as usize], target),
                    None => assert!(data.binary_search(&target).is_err()),
                }
            }
        }
    }

    // ========================================================================
    // Round structure
    // ========================================================================

    #[test]
    fn test_interval_strictly_shrinks() {
        let data = spaced(1_000_000);
        for config in config_matrix() {
            let report = run(config, data.clone(), 123_457).unwrap();
            for pair in report.rounds.windows(2) {
                assert!(pair[1].interval.len() < pair[0].interval.len());
                assert!(pair[1].interval.lo >= pair[0].interval.lo);
                assert!(pair[1].interval.hi <= pair[0].interval.hi);
            }
        }
    }

    #[test]
    fn test_rounds_logarithmic() {
        let n = 1_000_000u64;
        let data = spaced(n);
        let bound = log2_ceil(n) + 1;
        for config in config_matrix() {
            for target in [10_000_000, 5, 4_999_995] {
                let report = run(config.clone(), data.clone(), target).unwrap();
                let linear = report
                    .rounds
                    .iter()
                    .filter(|r| r.strategy == RoundStrategy::LinearScan)
                    .count();
                assert!(linear <= 1);
                let probing = report.stats.rounds - linear as u32;
                assert!(probing <= bound, "{probing} rounds for {config:?}");
            }
        }
    }

    #[test]
    fn test_single_probe_is_classic_binary_search() {
        let data = spaced(1 << 20);
        let report = run(EngineConfig::conservative(), data, 7).unwrap();
        assert!(report.rounds.iter().all(|r| r.probes == 1));
        assert!(report.stats.rounds <= 21);
    }

    #[test]
    fn test_fanout_then_single_probe() {
        let data = spaced(1_000_000);
        let config = EngineConfig { max_probes: 4, ..EngineConfig::default() };
        let report = run(config, data, 10_000_000).unwrap();
        assert_eq!(report.rounds[0].probes, 4);
        let last = report.rounds.last().unwrap();
        assert_eq!(last.probes, 1);
        assert!(last.interval.span() <= 400);
    }

    #[test]
    fn test_linear_scan_terminates() {
        let data = spaced(1_000_000);
        let config = EngineConfig { linear_scan_threshold: 512, ..EngineConfig::default() };
        let report = run(config, data, 4_321_005).unwrap();
        assert_eq!(report.outcome, SearchOutcome::NotFound);
        let last = report.rounds.last().unwrap();
        assert_eq!(last.strategy, RoundStrategy::LinearScan);
        assert!(last.interval.span() < 512);
        assert_eq!(report.stats.linear_scan_elements, last.interval.len());
    }

    #[test]
    fn test_linear_scan_whole_small_array() {
        let config = EngineConfig { linear_scan_threshold: 512, ..EngineConfig::default() };
        let report = run(config, spaced(100), 550).unwrap();
        assert_eq!(report.outcome.index(), Some(55));
        assert_eq!(report.stats.rounds, 1);
        assert_eq!(report.stats.probes_issued, 0);
        assert_eq!(report.stats.bytes_read, 800);
    }

    #[test]
    fn test_range_read_failure_is_fatal() {
        let data = spaced(100);
        let engine = SearchEngine::new(EngineConfig {
            linear_scan_threshold: 512,
            ..EngineConfig::default()
        })
        .unwrap();
        let mut source = MemorySource::new(data.clone());
        source.fail_range = true;
        let mut device = MockDevice::new(data, 4);
        let err = engine.run(&source, &mut device, 10).unwrap_err();
        assert!(matches!(err, SearchError::RangeRead(_)));
    }

    // ========================================================================
    // Readahead
    // ========================================================================

    #[test]
    fn test_prefetch_once_per_interval() {
        let data = spaced(100_000);
        let engine = SearchEngine::new(EngineConfig {
            readahead: true,
            readahead_threshold: 1 << 20,
            ..EngineConfig::default()
        })
        .unwrap();
        let source = MemorySource::new(data.clone());
        let mut device = MockDevice::new(data, 4);
        device.failing_batches = 2;

        let report = engine.run(&source, &mut device, 500_000).unwrap();
        assert_eq!(report.outcome.index(), Some(50_000));
        assert_eq!(report.stats.stalled_rounds, 2);

        let hints = source.hints.borrow();
        assert_eq!(hints[0], SearchInterval::new(0, 99_999));
        assert!(hints.windows(2).all(|w| w[0] != w[1]));
        assert_eq!(report.stats.prefetch_hints as usize, hints.len());
        assert_eq!(hints.len() + 2, report.rounds.len());
    }

    #[test]
    fn test_prefetch_failure_not_fatal() {
        let data = spaced(10_000);
        let engine = SearchEngine::new(EngineConfig {
            readahead: true,
            readahead_threshold: 1 << 20,
            ..EngineConfig::default()
        })
        .unwrap();
        let mut source = MemorySource::new(data.clone());
        source.fail_prefetch = true;
        let mut device = MockDevice::new(data, 4);

        let report = engine.run(&source, &mut device, 70).unwrap();
        assert_eq!(report.outcome.index(), Some(7));
        assert_eq!(report.stats.prefetch_hints, 0);
        assert!(!source.hints.borrow().is_empty());
    }

    #[test]
    fn test_no_prefetch_above_threshold() {
        let data = spaced(100_000);
        let engine = SearchEngine::new(EngineConfig {
            readahead: true,
            readahead_threshold: 1_000,
            ..EngineConfig::default()
        })
        .unwrap();
        let source = MemorySource::new(data.clone());
        let mut device = MockDevice::new(data, 4);
        engine.run(&source, &mut device, 123_450).unwrap();
        assert!(source.hints.borrow().iter().all(|iv| iv.span() < 1_000));
    }

    // ========================================================================
    // Faults and degraded devices
    // ========================================================================

    #[test]
    fn test_failed_probes_tolerated() {
        let data = spaced(1_000_000);
        let engine = SearchEngine::new(EngineConfig::default()).unwrap();
        let source = MemorySource::new(data.clone());
        let mut device = MockDevice::new(data, 4);
        device.failing_slot = Some(2);

        let report = engine.run(&source, &mut device, 5_000_000).unwrap();
        assert_eq!(report.outcome.byte_offset(), Some(4_000_000));
        assert!(report.stats.failed_probes > 0);
        assert!(report.stats.failed_probes < report.stats.probes_issued);
    }

    #[test]
    fn test_transient_stall_recovers() {
        let data = spaced(10_000);
        let engine = SearchEngine::new(EngineConfig::default()).unwrap();
        let source = MemorySource::new(data.clone());
        let mut device = MockDevice::new(data, 4);
        device.failing_batches = 3;

        let report = engine.run(&source, &mut device, 12_340).unwrap();
        assert_eq!(report.outcome.index(), Some(1_234));
        assert_eq!(report.stats.stalled_rounds, 3);
        assert!(report.rounds[..3].iter().all(|r| r.valid == 0));
        assert_eq!(report.rounds[0].interval, report.rounds[3].interval);
    }

    #[test]
    fn test_persistent_stall_aborts() {
        let data = spaced(10_000);
        let config = EngineConfig { max_stalled_rounds: 5, ..EngineConfig::default() };
        let engine = SearchEngine::new(config).unwrap();
        let source = MemorySource::new(data.clone());
        let mut device = MockDevice::new(data, 4);
        device.failing_batches = u32::MAX;

        let err = engine.run(&source, &mut device, 10).unwrap_err();
        match err {
            SearchError::Stalled { interval, rounds } => {
                assert_eq!(interval, SearchInterval::new(0, 9_999));
                assert_eq!(rounds, 5);
            }
            other => panic!("expected Stalled, got {other:?}"),
        }
        assert_eq!(device.batches, 5);
    }

    #[test]
    fn test_degraded_device_still_correct() {
        let data = spaced(1_000_000);
        let engine = SearchEngine::new(EngineConfig::high_performance()).unwrap();
        let source = MemorySource::new(data.clone());
        let mut device = MockDevice::new(data, 8);
        device.capabilities = CapabilityReport {
            polling: Capability::Unavailable { reason: "EPERM".into() },
            zero_copy: Capability::Unavailable { reason: "ENOMEM".into() },
        };

        let report = engine.run(&source, &mut device, 5_000_000).unwrap();
        assert_eq!(report.outcome.byte_offset(), Some(4_000_000));
        assert!(report.is_degraded());

        device.capabilities.polling = Capability::Active;
        device.capabilities.zero_copy = Capability::Active;
        let report = engine.run(&source, &mut device, 10_000_000).unwrap();
        assert_eq!(report.outcome, SearchOutcome::NotFound);
        assert!(!report.is_degraded());
    }

    #[test]
    fn test_device_with_fewer_slots() {
        let data = spaced(1_000_000);
        let engine = SearchEngine::new(EngineConfig { max_probes: 8, ..EngineConfig::default() })
            .unwrap();
        let source = MemorySource::new(data.clone());
        let mut device = MockDevice::new(data, 2);
        let report = engine.run(&source, &mut device, 5_000_000).unwrap();
        assert!(report.rounds.iter().all(|r| r.probes <= 2));
        assert!(report.outcome.is_found());
    }

    // ========================================================================
    // Stats
    // ========================================================================

    #[test]
    fn test_stats_consistent_with_rounds() {
        let data = spaced(1_000_000);
        let report = run(EngineConfig::default(), data, 10_000_000).unwrap();
        let probes: usize = report.rounds.iter().map(|r| r.probes).sum();
        assert_eq!(report.stats.probes_issued, probes as u64);
        assert_eq!(report.stats.rounds as usize, report.rounds.len());
        assert_eq!(report.stats.bytes_read, probes as u64 * 8);
        assert_eq!(report.stats.failed_probes, 0);
        assert_eq!(report.target, 10_000_000);
    }

    #[test]
    fn test_phase_terminal() {
        assert!(!SearchPhase::Searching.is_terminal());
        assert!(SearchPhase::Found.is_terminal());
        assert!(SearchPhase::IoError.is_terminal());
    }

    #[test]
    fn test_phase_graph() {
        use SearchPhase::*;
        assert!(Init.can_advance_to(Opening));
        assert!(!Init.can_advance_to(Searching));
        assert!(Opening.can_advance_to(Searching));
        assert!(Opening.can_advance_to(IoError));
        assert!(Searching.can_advance_to(Found));
        assert!(Searching.can_advance_to(NotFound));
        assert!(!Found.can_advance_to(Searching));
        assert!(!NotFound.can_advance_to(IoError));
        for phase in [Init, Opening, Searching, Found, NotFound, IoError] {
            assert!(phase.can_advance_to(Closed), "{phase:?}");
        }
        assert!(!Closed.can_advance_to(Closed));
    }

    #[test]
    fn test_run_walks_opening_phase() {
        // advance() asserts every edge, so these runs fail in debug builds
        // if run() skips Opening
        let data = spaced(1_000);
        assert!(run(EngineConfig::default(), data.clone(), 5_000).unwrap().outcome.is_found());
        assert!(!run(EngineConfig::default(), data, 5_001).unwrap().outcome.is_found());
        assert!(matches!(run(EngineConfig::default(), Vec::new(), 1), Err(SearchError::Empty)));

        let mut phases = PhaseTracker::new();
        phases.advance(SearchPhase::Opening);
        phases.advance(SearchPhase::Searching);
        assert_eq!(phases.current, SearchPhase::Searching);
    }
}
