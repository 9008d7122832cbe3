//! Recording in-memory backend for exercising the phases without a database.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use storebench::backend::{
    BackendAdapter, BackendKind, ConnectOptions, Connector, RecordId, Session,
};
use storebench::config::{BenchParams, CaseConfig};
use storebench::error::{BenchError, Result};
use storebench::record::SyntheticRecord;
use storebench::sort::SortSpec;

/// Operation the probe can be told to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Connector returns a connection error.
    Connect,
    /// The n-th `insert_batch` call (1-based) fails.
    Batch(usize),
    /// The n-th `insert_one` call fails.
    InsertOne(usize),
    /// The n-th `insert_one` call panics.
    PanicOnInsertOne(usize),
    /// The n-th `find_last_by` call fails.
    Read(usize),
    /// `clear` fails.
    Clear,
}

/// Backend call as the probe observed it.
#[derive(Clone, Debug)]
pub enum Event {
    Batch(usize),
    InsertOne(Instant),
    Read(Instant),
    Clear,
    Disconnect,
}

/// Shared observation point for every adapter and session a connector hands out.
#[derive(Default)]
pub struct Probe {
    events: Mutex<Vec<Event>>,
    batches: AtomicUsize,
    inserts: AtomicUsize,
    reads: AtomicUsize,
    connects: AtomicUsize,
    pool_sizes: Mutex<Vec<usize>>,
    session_sorts: Mutex<Vec<Vec<SortSpec>>>,
    fault: Option<Fault>,
    insert_delay: Option<Duration>,
}

impl Probe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(fault: Fault) -> Arc<Self> {
        Arc::new(Self {
            fault: Some(fault),
            ..Self::default()
        })
    }

    pub fn with_insert_delay(fault: Option<Fault>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            fault,
            insert_delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Batch(size) => Some(size),
                _ => None,
            })
            .collect()
    }

    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn pool_sizes(&self) -> Vec<usize> {
        self.pool_sizes.lock().clone()
    }

    /// Sort specs each session passed to `find_last_by`, in call order, for
    /// every session that issued at least one read.
    pub fn session_sorts(&self) -> Vec<Vec<SortSpec>> {
        self.session_sorts.lock().clone()
    }

    pub fn count(&self, matches: impl Fn(&Event) -> bool) -> usize {
        self.events.lock().iter().filter(|event| matches(event)).count()
    }

    pub fn adapter(self: &Arc<Self>) -> ProbeBackend {
        ProbeBackend {
            probe: Arc::clone(self),
        }
    }

    pub fn connector(self: &Arc<Self>) -> Connector {
        let probe = Arc::clone(self);
        Arc::new(move |_: &CaseConfig, options: &ConnectOptions| {
            probe.connects.fetch_add(1, Ordering::SeqCst);
            probe.pool_sizes.lock().push(options.pool_size);
            if probe.fault == Some(Fault::Connect) {
                return Err(BenchError::Connection("probe refused".into()));
            }
            Ok(Box::new(probe.adapter()) as Box<dyn BackendAdapter>)
        })
    }

    fn record(&self, event: Event) {
        self.events.lock().push(event);
    }
}

/// Adapter over a [`Probe`].
pub struct ProbeBackend {
    probe: Arc<Probe>,
}

impl BackendAdapter for ProbeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Document
    }

    fn with_connection(&self, f: &mut dyn FnMut(&mut dyn Session) -> Result<()>) -> Result<()> {
        let mut session = ProbeSession {
            probe: Arc::clone(&self.probe),
            sorts: Vec::new(),
        };
        f(&mut session)
    }

    fn disconnect(&self) -> Result<()> {
        self.probe.record(Event::Disconnect);
        Ok(())
    }
}

struct ProbeSession {
    probe: Arc<Probe>,
    sorts: Vec<SortSpec>,
}

impl Drop for ProbeSession {
    fn drop(&mut self) {
        if !self.sorts.is_empty() {
            let sorts = std::mem::take(&mut self.sorts);
            self.probe.session_sorts.lock().push(sorts);
        }
    }
}

impl Session for ProbeSession {
    fn insert_batch(&mut self, records: &[SyntheticRecord]) -> Result<()> {
        let call = self.probe.batches.fetch_add(1, Ordering::SeqCst) + 1;
        if self.probe.fault == Some(Fault::Batch(call)) {
            return Err(BenchError::Write(format!("batch {call} rejected")));
        }
        self.probe.record(Event::Batch(records.len()));
        Ok(())
    }

    fn insert_one(&mut self, _record: &SyntheticRecord) -> Result<()> {
        if let Some(delay) = self.probe.insert_delay {
            thread::sleep(delay);
        }
        let call = self.probe.inserts.fetch_add(1, Ordering::SeqCst) + 1;
        match self.probe.fault {
            Some(Fault::InsertOne(n)) if n == call => {
                return Err(BenchError::Write(format!("insert {call} rejected")))
            }
            Some(Fault::PanicOnInsertOne(n)) if n == call => panic!("insert {call} exploded"),
            _ => {}
        }
        self.probe.record(Event::InsertOne(Instant::now()));
        Ok(())
    }

    fn find_last_by(&mut self, sort: &SortSpec) -> Result<Option<RecordId>> {
        let call = self.probe.reads.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.record(Event::Read(Instant::now()));
        self.sorts.push(sort.clone());
        if self.probe.fault == Some(Fault::Read(call)) {
            return Err(BenchError::Read(format!("read {call} rejected")));
        }
        thread::yield_now();
        Ok(None)
    }

    fn clear(&mut self) -> Result<()> {
        self.probe.record(Event::Clear);
        if self.probe.fault == Some(Fault::Clear) {
            return Err(BenchError::Write("clear rejected".into()));
        }
        Ok(())
    }
}

/// Parameters small enough for a unit-speed run.
pub fn small_params() -> BenchParams {
    BenchParams {
        base_record_count: 250,
        write_test_record_count: 20,
        concurrency: 2,
        insert_batch_size: 100,
        seed: 7,
    }
}

pub fn case(name: &str, backend: BackendKind) -> CaseConfig {
    CaseConfig {
        name: name.to_string(),
        backend,
        url: format!("probe://{name}"),
    }
}
