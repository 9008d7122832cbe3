//! Storage benchmarking harness.
//!
//! Runs an identical synthetic workload (a seeded baseline, a timed bulk
//! insert and a timed concurrent read/write phase) against several storage
//! backends so their wall-clock timings can be compared. Backends plug in
//! through [`backend::BackendAdapter`] and are looked up in a
//! [`backend::Registry`] when cases are resolved.

#![warn(missing_docs)]

pub mod backend;
pub mod bench;
pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod record;
pub mod report;
pub mod sort;

pub use backend::{
    BackendAdapter, BackendKind, ConnectOptions, Connector, RecordId, Registry, Session,
};
pub use bench::{BenchmarkCase, CaseReport, CaseState, Phase};
pub use config::{BenchParams, CaseCatalog, CaseConfig, Execution};
pub use error::{BenchError, Result};
pub use orchestrator::Orchestrator;
pub use record::{RecordGenerator, SyntheticRecord};
pub use sort::{Direction, SortField, SortRotation, SortSpec};
