//! Runs the selected cases, one after another or side by side.

use std::collections::HashSet;
use std::thread;

use tracing::{error, info};

use crate::backend::Registry;
use crate::bench::{BenchmarkCase, CaseReport};
use crate::config::{BenchParams, CaseConfig, Execution};
use crate::error::{BenchError, Result};

/// Drives every configured case through its lifecycle.
///
/// A failing case never stops the others; its error is carried in its
/// [`CaseReport`].
#[derive(Debug)]
pub struct Orchestrator {
    registry: Registry,
    params: BenchParams,
    cases: Vec<CaseConfig>,
    execution: Execution,
}

impl Orchestrator {
    /// Sequential orchestrator over `cases`.
    pub fn new(registry: Registry, params: BenchParams, cases: Vec<CaseConfig>) -> Self {
        Self {
            registry,
            params,
            cases,
            execution: Execution::Sequential,
        }
    }

    /// Selects sequential or parallel execution.
    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    /// Checks everything that can be checked before any backend is touched.
    pub fn validate(&self) -> Result<()> {
        self.params.validate()?;
        if self.cases.is_empty() {
            return Err(BenchError::Configuration("no cases selected".into()));
        }
        let mut names = HashSet::new();
        for case in &self.cases {
            if !names.insert(case.name.as_str()) {
                return Err(BenchError::Configuration(format!(
                    "duplicate case '{}'",
                    case.name
                )));
            }
            if self.registry.connector(case.backend).is_none() {
                return Err(BenchError::Configuration(format!(
                    "no connector registered for backend '{}'",
                    case.backend
                )));
            }
        }
        Ok(())
    }

    /// Runs every case and returns one report per case, in case order.
    pub fn run(&self) -> Result<Vec<CaseReport>> {
        self.validate()?;
        info!(
            cases = self.cases.len(),
            execution = ?self.execution,
            base_record_count = self.params.base_record_count,
            write_test_record_count = self.params.write_test_record_count,
            concurrency = self.params.concurrency,
            "orchestrator.start"
        );
        let reports: Vec<CaseReport> = match self.execution {
            Execution::Sequential => self.cases.iter().map(|case| self.run_case(case)).collect(),
            Execution::Parallel => self.run_parallel(),
        };
        let failed = reports.iter().filter(|r| !r.is_success()).count();
        info!(cases = reports.len(), failed, "orchestrator.finish");
        Ok(reports)
    }

    fn run_case(&self, case: &CaseConfig) -> CaseReport {
        match self.registry.connector(case.backend) {
            Some(connector) => BenchmarkCase::new(case, &self.params, connector.clone()).run(),
            None => CaseReport::failed(
                case,
                BenchError::Configuration(format!("no connector for '{}'", case.backend)),
            ),
        }
    }

    fn run_parallel(&self) -> Vec<CaseReport> {
        thread::scope(|scope| {
            let handles: Vec<_> = self
                .cases
                .iter()
                .map(|case| {
                    let spawned = thread::Builder::new()
                        .name(format!("case-{}", case.name))
                        .spawn_scoped(scope, move || self.run_case(case));
                    (case, spawned)
                })
                .collect();

            handles
                .into_iter()
                .map(|(case, spawned)| match spawned {
                    Ok(handle) => handle.join().unwrap_or_else(|_| {
                        error!(case = %case.name, "orchestrator.case_panicked");
                        CaseReport::failed(case, BenchError::WorkerPanicked("case"))
                    }),
                    Err(err) => CaseReport::failed(case, BenchError::Io(err)),
                })
                .collect()
        })
    }
}
