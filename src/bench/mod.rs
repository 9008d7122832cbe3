//! Benchmark phases and the per-case lifecycle that strings them together.

pub mod bulk;
pub mod case;
pub mod concurrent;

pub use bulk::{BatchPlan, BulkInsertBenchmark};
pub use case::{BenchmarkCase, CaseReport, CaseState, Phase, PhaseResult};
pub use concurrent::{ConcurrentReadWriteBenchmark, ConcurrentReport, StopReason, WorkerCounters};
