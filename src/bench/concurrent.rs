//! Mixed read/write load: `concurrency` readers polling "last record by …"
//! queries while `concurrency` writers insert records one at a time.
//!
//! Termination is owned by a supervisor thread. It waits until every worker
//! has started, then until every writer has finished, and only then raises
//! the stop flag the readers check before each query. Workers report progress
//! through a single lock-protected [`WorkerCounters`] and wake the supervisor
//! through a condition variable.
//!
//! A failing or panicking worker marks the phase aborted; the supervisor
//! raises the stop flag early, writers stop before their next insert, and the
//! first error is returned.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, ScopedJoinHandle};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn, Span};

use crate::backend::BackendAdapter;
use crate::error::{BenchError, Result};
use crate::record::RecordGenerator;
use crate::sort::SortRotation;

/// Progress of the concurrent phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerCounters {
    /// Readers that have begun.
    pub readers_started: usize,
    /// Writers that have begun.
    pub writers_started: usize,
    /// Writers that issued every insert.
    pub writers_finished: usize,
    /// A worker failed or panicked.
    pub aborted: bool,
}

/// Why the supervisor raised the stop flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Every writer finished.
    WritersFinished,
    /// A worker failed.
    Aborted,
}

/// Outcome of a successful concurrent phase.
#[derive(Clone, Copy, Debug)]
pub struct ConcurrentReport {
    /// `find_last_by` calls completed across all readers.
    pub reads: u64,
    /// `insert_one` calls completed across all writers.
    pub writes: u64,
    /// Counters as the supervisor saw them when raising the stop flag.
    pub counters_at_stop: WorkerCounters,
    /// When the stop flag was raised.
    pub stopped_at: Instant,
}

struct Coordination {
    concurrency: usize,
    counters: Mutex<WorkerCounters>,
    changed: Condvar,
    stop_reading: AtomicBool,
}

impl Coordination {
    fn new(concurrency: usize) -> Self {
        Self {
            concurrency,
            counters: Mutex::new(WorkerCounters::default()),
            changed: Condvar::new(),
            stop_reading: AtomicBool::new(false),
        }
    }

    fn update(&self, f: impl FnOnce(&mut WorkerCounters)) {
        let mut counters = self.counters.lock();
        f(&mut counters);
        self.changed.notify_all();
    }

    fn abort(&self) {
        self.update(|c| c.aborted = true);
    }

    fn should_stop(&self) -> bool {
        self.stop_reading.load(Ordering::SeqCst)
    }

    /// Two-stage wait, then raise the stop flag while still holding the
    /// counters lock.
    fn supervise(&self) -> (StopReason, WorkerCounters, Instant) {
        let n = self.concurrency;
        let mut counters = self.counters.lock();
        self.changed.wait_while(&mut counters, |c| {
            !c.aborted && (c.readers_started < n || c.writers_started < n)
        });
        debug!(
            readers = counters.readers_started,
            writers = counters.writers_started,
            "concurrent.supervisor.fan_out_complete"
        );
        self.changed
            .wait_while(&mut counters, |c| !c.aborted && c.writers_finished < n);
        let reason = if counters.aborted {
            StopReason::Aborted
        } else {
            StopReason::WritersFinished
        };
        self.stop_reading.store(true, Ordering::SeqCst);
        let stopped_at = Instant::now();
        debug!(
            ?reason,
            writers_finished = counters.writers_finished,
            "concurrent.supervisor.stop"
        );
        (reason, *counters, stopped_at)
    }
}

/// Marks the phase aborted if dropped before [`WorkerGuard::complete`],
/// which covers both error returns and panics.
struct WorkerGuard<'a> {
    coordination: &'a Coordination,
    armed: bool,
}

impl<'a> WorkerGuard<'a> {
    fn new(coordination: &'a Coordination) -> Self {
        Self {
            coordination,
            armed: true,
        }
    }

    fn complete(mut self) {
        self.armed = false;
    }
}

impl Drop for WorkerGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.coordination.abort();
        }
    }
}

/// Runs `concurrency` readers and writers against one backend.
#[derive(Clone, Copy, Debug)]
pub struct ConcurrentReadWriteBenchmark {
    concurrency: usize,
    writes_per_writer: usize,
}

impl ConcurrentReadWriteBenchmark {
    /// `concurrency` reader/writer pairs, each writer inserting
    /// `writes_per_writer` records.
    pub fn new(concurrency: usize, writes_per_writer: usize) -> Self {
        Self {
            concurrency,
            writes_per_writer,
        }
    }

    /// Runs the phase to completion. Writers draw records from independent
    /// streams derived from `generator`.
    pub fn run(
        &self,
        adapter: &dyn BackendAdapter,
        generator: &RecordGenerator,
    ) -> Result<ConcurrentReport> {
        if self.concurrency == 0 {
            return Err(BenchError::Configuration(
                "concurrency must be greater than zero".into(),
            ));
        }
        let coordination = Coordination::new(self.concurrency);
        let reads = AtomicU64::new(0);
        let writes = AtomicU64::new(0);
        let span = Span::current();

        thread::scope(|scope| {
            let coordination = &coordination;
            let supervisor = spawn(scope, "supervisor".to_string(), &span, move || {
                Ok(coordination.supervise())
            })?;

            let mut workers: Vec<(&'static str, ScopedJoinHandle<'_, Result<()>>)> =
                Vec::with_capacity(self.concurrency * 2);
            let mut spawn_error = None;
            for index in 0..self.concurrency {
                let reads = &reads;
                match spawn(scope, format!("reader-{index}"), &span, move || {
                    let count = self.run_reader(adapter, coordination, index)?;
                    reads.fetch_add(count, Ordering::Relaxed);
                    Ok(())
                }) {
                    Ok(handle) => workers.push(("reader", handle)),
                    Err(err) => {
                        spawn_error = Some(err);
                        break;
                    }
                }
            }
            for index in 0..self.concurrency {
                if spawn_error.is_some() {
                    break;
                }
                let writes = &writes;
                let generator = generator.for_worker(index);
                match spawn(scope, format!("writer-{index}"), &span, move || {
                    let count = self.run_writer(adapter, coordination, generator, index)?;
                    writes.fetch_add(count, Ordering::Relaxed);
                    Ok(())
                }) {
                    Ok(handle) => workers.push(("writer", handle)),
                    Err(err) => spawn_error = Some(err),
                }
            }
            if spawn_error.is_some() {
                coordination.abort();
            }

            let mut first_error = spawn_error.map(BenchError::from);
            for (role, handle) in workers {
                let outcome = handle.join().unwrap_or(Err(BenchError::WorkerPanicked(role)));
                if let Err(err) = outcome {
                    warn!(role, error = %err, "concurrent.worker_failed");
                    first_error.get_or_insert(err);
                }
            }
            let supervised = supervisor
                .join()
                .unwrap_or(Err(BenchError::WorkerPanicked("supervisor")));

            if let Some(err) = first_error {
                return Err(err);
            }
            let (reason, counters_at_stop, stopped_at) = supervised?;
            debug_assert_eq!(reason, StopReason::WritersFinished);
            Ok(ConcurrentReport {
                reads: reads.load(Ordering::Relaxed),
                writes: writes.load(Ordering::Relaxed),
                counters_at_stop,
                stopped_at,
            })
        })
    }

    fn run_reader(
        &self,
        adapter: &dyn BackendAdapter,
        coordination: &Coordination,
        index: usize,
    ) -> Result<u64> {
        coordination.update(|c| c.readers_started += 1);
        let guard = WorkerGuard::new(coordination);
        debug!(worker = index, "concurrent.reader.start");
        let mut reads = 0u64;
        adapter.with_connection(&mut |session| {
            for sort in SortRotation::new() {
                if coordination.should_stop() {
                    break;
                }
                trace!(%sort, "concurrent.reader.find_last_by");
                session.find_last_by(&sort)?;
                reads += 1;
            }
            Ok(())
        })?;
        guard.complete();
        debug!(worker = index, reads, "concurrent.reader.stop");
        Ok(reads)
    }

    fn run_writer(
        &self,
        adapter: &dyn BackendAdapter,
        coordination: &Coordination,
        mut generator: RecordGenerator,
        index: usize,
    ) -> Result<u64> {
        coordination.update(|c| c.writers_started += 1);
        let guard = WorkerGuard::new(coordination);
        debug!(worker = index, "concurrent.writer.start");
        let mut writes = 0u64;
        adapter.with_connection(&mut |session| {
            for _ in 0..self.writes_per_writer {
                // Only raised early when another worker aborted the phase.
                if coordination.should_stop() {
                    break;
                }
                let record = generator.next_record();
                trace!(worker = index, record = writes, "concurrent.writer.insert_one");
                session.insert_one(&record)?;
                writes += 1;
            }
            Ok(())
        })?;
        if writes == self.writes_per_writer as u64 {
            coordination.update(|c| c.writers_finished += 1);
            debug!(worker = index, writes, "concurrent.writer.finish");
        }
        guard.complete();
        Ok(writes)
    }
}

fn spawn<'scope, 'env, T, F>(
    scope: &'scope thread::Scope<'scope, 'env>,
    name: String,
    span: &Span,
    f: F,
) -> io::Result<ScopedJoinHandle<'scope, Result<T>>>
where
    T: Send + 'scope,
    F: FnOnce() -> Result<T> + Send + 'scope,
{
    let span = span.clone();
    thread::Builder::new().name(name).spawn_scoped(scope, move || {
        let _entered = span.enter();
        f()
    })
}
