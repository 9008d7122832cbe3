//! One benchmark case: the full lifecycle against a single backend.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info, info_span, warn, Span};

use super::bulk::BulkInsertBenchmark;
use super::concurrent::ConcurrentReadWriteBenchmark;
use crate::backend::{BackendAdapter, BackendKind, ConnectOptions, Connector};
use crate::config::{BenchParams, CaseConfig};
use crate::error::{BenchError, Result};
use crate::record::RecordGenerator;

/// Lifecycle states, in the only order a case may visit them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseState {
    /// Constructed, nothing opened yet.
    Created,
    /// Adapter connected and schema provisioned.
    Connected,
    /// Baseline records inserted.
    Seeded,
    /// Timed bulk insert done.
    InsertBenchmarked,
    /// Timed concurrent read/write phase done.
    ConcurrencyBenchmarked,
    /// Benchmark records removed.
    Cleared,
    /// Pool released.
    Disconnected,
}

impl CaseState {
    fn next(self) -> Option<CaseState> {
        match self {
            CaseState::Created => Some(CaseState::Connected),
            CaseState::Connected => Some(CaseState::Seeded),
            CaseState::Seeded => Some(CaseState::InsertBenchmarked),
            CaseState::InsertBenchmarked => Some(CaseState::ConcurrencyBenchmarked),
            CaseState::ConcurrencyBenchmarked => Some(CaseState::Cleared),
            CaseState::Cleared => Some(CaseState::Disconnected),
            CaseState::Disconnected => None,
        }
    }
}

/// Timed phases of a case.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Bulk insert of `write_test_record_count` records.
    Insert,
    /// Concurrent readers and writers.
    ConcurrentReadWrite,
}

impl Phase {
    /// Result key.
    pub fn name(self) -> &'static str {
        match self {
            Phase::Insert => "insert_time",
            Phase::ConcurrentReadWrite => "concurrent_read_write_time",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Wall-clock duration of one phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseResult {
    /// Which phase.
    pub phase: Phase,
    /// Elapsed wall time.
    pub elapsed: Duration,
}

/// What a case produced, successful or not.
#[derive(Debug)]
pub struct CaseReport {
    /// Case name.
    pub name: String,
    /// Backend variant.
    pub backend: BackendKind,
    /// Last state reached.
    pub reached: CaseState,
    /// Completed phases.
    pub phases: Vec<PhaseResult>,
    /// The failure that ended the case early.
    pub error: Option<BenchError>,
}

impl CaseReport {
    /// Report for a case that never ran its lifecycle.
    pub fn failed(config: &CaseConfig, error: BenchError) -> Self {
        Self {
            name: config.name.clone(),
            backend: config.backend,
            reached: CaseState::Created,
            phases: Vec::new(),
            error: Some(error),
        }
    }

    /// True when the case reached `Disconnected` without error.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.reached == CaseState::Disconnected
    }

    /// Duration of `phase`, if it completed.
    pub fn elapsed(&self, phase: Phase) -> Option<Duration> {
        self.phases
            .iter()
            .find(|result| result.phase == phase)
            .map(|result| result.elapsed)
    }
}

/// Runs one case's lifecycle against the adapter produced by its connector.
pub struct BenchmarkCase<'a> {
    config: &'a CaseConfig,
    params: &'a BenchParams,
    connector: Connector,
    span: Span,
    state: CaseState,
    phases: Vec<PhaseResult>,
    clear_attempted: bool,
}

impl<'a> BenchmarkCase<'a> {
    /// Case for `config`; log events carry the case and backend names.
    pub fn new(config: &'a CaseConfig, params: &'a BenchParams, connector: Connector) -> Self {
        let span = info_span!("case", case = %config.name, backend = %config.backend);
        Self {
            config,
            params,
            connector,
            span,
            state: CaseState::Created,
            phases: Vec::new(),
            clear_attempted: false,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CaseState {
        self.state
    }

    /// Runs every transition in order. On failure, clearing and
    /// disconnecting are still attempted and the original error is kept.
    pub fn run(mut self) -> CaseReport {
        let span = self.span.clone();
        let _entered = span.enter();
        info!(url = %self.config.url, "case.start");

        let mut adapter: Option<Box<dyn BackendAdapter>> = None;
        let error = match self.run_lifecycle(&mut adapter) {
            Ok(()) => {
                info!("case.finish");
                None
            }
            Err(err) => {
                error!(state = ?self.state, error = %err, "case.failed");
                if let Some(adapter) = adapter.as_deref() {
                    self.cleanup(adapter);
                }
                Some(err)
            }
        };

        CaseReport {
            name: self.config.name.clone(),
            backend: self.config.backend,
            reached: self.state,
            phases: self.phases,
            error,
        }
    }

    fn run_lifecycle(&mut self, slot: &mut Option<Box<dyn BackendAdapter>>) -> Result<()> {
        self.params.validate()?;
        let options = ConnectOptions {
            pool_size: self.params.pool_size(),
        };
        info!(pool_size = options.pool_size, "case.connect");
        let adapter = (self.connector)(self.config, &options)?;
        let adapter: &dyn BackendAdapter = &**slot.insert(adapter);
        self.advance(CaseState::Connected);

        let mut generator = RecordGenerator::new(self.params.seed);
        let bulk = BulkInsertBenchmark::new(self.params.insert_batch_size);

        info!(records = self.params.base_record_count, "case.seed.start");
        let (seeded, seed_time) =
            timed(|| bulk.run(adapter, &mut generator, self.params.base_record_count));
        seeded?;
        info!(elapsed = ?seed_time, "case.seed.finish");
        self.advance(CaseState::Seeded);

        info!(records = self.params.write_test_record_count, "case.bulk_insert.start");
        let (written, elapsed) = timed(|| {
            bulk.run(adapter, &mut generator, self.params.write_test_record_count)
        });
        written?;
        self.record(Phase::Insert, elapsed);
        self.advance(CaseState::InsertBenchmarked);

        let concurrent = ConcurrentReadWriteBenchmark::new(
            self.params.concurrency,
            self.params.write_test_record_count,
        );
        info!(
            concurrency = self.params.concurrency,
            writes_per_writer = self.params.write_test_record_count,
            "case.concurrent_read_write.start"
        );
        let (report, elapsed) = timed(|| concurrent.run(adapter, &generator));
        let report = report?;
        debug!(
            reads = report.reads,
            writes = report.writes,
            "case.concurrent_read_write.counts"
        );
        self.record(Phase::ConcurrentReadWrite, elapsed);
        self.advance(CaseState::ConcurrencyBenchmarked);

        self.clear_attempted = true;
        adapter.clear()?;
        self.advance(CaseState::Cleared);

        adapter.disconnect()?;
        self.advance(CaseState::Disconnected);
        Ok(())
    }

    fn advance(&mut self, next: CaseState) {
        debug_assert_eq!(self.state.next(), Some(next), "out-of-order transition");
        debug!(from = ?self.state, to = ?next, "case.transition");
        self.state = next;
    }

    fn record(&mut self, phase: Phase, elapsed: Duration) {
        info!(%phase, ?elapsed, "case.phase.finish");
        self.phases.push(PhaseResult { phase, elapsed });
    }

    fn cleanup(&mut self, adapter: &dyn BackendAdapter) {
        if !self.clear_attempted {
            if let Err(err) = adapter.clear() {
                warn!(error = %err, "case.cleanup.clear_failed");
            }
        }
        if self.state < CaseState::Disconnected {
            if let Err(err) = adapter.disconnect() {
                warn!(error = %err, "case.cleanup.disconnect_failed");
            }
        }
    }
}

fn timed<T>(f: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let value = f();
    (value, start.elapsed())
}
