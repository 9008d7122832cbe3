#![allow(missing_docs)]

#[path = "../support/mod.rs"]
mod support;

use storebench::backend::{BackendKind, Registry};
use storebench::bench::CaseState;
use storebench::config::Execution;
use storebench::error::BenchError;
use storebench::Orchestrator;
use support::{case, small_params, Fault, Probe};

fn registry(sqlite: &std::sync::Arc<Probe>, document: &std::sync::Arc<Probe>) -> Registry {
    Registry::empty()
        .register(BackendKind::Sqlite, sqlite.connector())
        .register(BackendKind::Document, document.connector())
}

#[test]
fn failing_case_does_not_stop_the_others() {
    for execution in [Execution::Sequential, Execution::Parallel] {
        let broken = Probe::failing(Fault::Connect);
        let healthy = Probe::new();
        let orchestrator = Orchestrator::new(
            registry(&broken, &healthy),
            small_params(),
            vec![
                case("broken", BackendKind::Sqlite),
                case("healthy", BackendKind::Document),
            ],
        )
        .with_execution(execution);

        let reports = orchestrator.run().unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].name, "broken");
        assert!(!reports[0].is_success());
        assert!(matches!(reports[0].error, Some(BenchError::Connection(_))));
        assert_eq!(reports[1].name, "healthy");
        assert!(reports[1].is_success(), "{execution:?}: {:?}", reports[1].error);
        assert_eq!(reports[1].reached, CaseState::Disconnected);
    }
}

#[test]
fn cases_sharing_a_backend_each_connect() {
    let probe = Probe::new();
    let registry = Registry::empty().register(BackendKind::Document, probe.connector());
    let orchestrator = Orchestrator::new(
        registry,
        small_params(),
        vec![
            case("first", BackendKind::Document),
            case("second", BackendKind::Document),
        ],
    );
    let reports = orchestrator.run().unwrap();
    assert!(reports.iter().all(|r| r.is_success()));
    assert_eq!(probe.connect_count(), 2);
}

#[test]
fn unregistered_backend_is_rejected_up_front() {
    let probe = Probe::new();
    let registry = Registry::empty().register(BackendKind::Document, probe.connector());
    let orchestrator = Orchestrator::new(
        registry,
        small_params(),
        vec![
            case("doc", BackendKind::Document),
            case("sql", BackendKind::Sqlite),
        ],
    );
    assert!(matches!(
        orchestrator.run(),
        Err(BenchError::Configuration(_))
    ));
    assert_eq!(probe.connect_count(), 0);
}

#[test]
fn empty_or_duplicate_selection_is_rejected() {
    let probe = Probe::new();
    let registry = Registry::empty().register(BackendKind::Document, probe.connector());
    let empty = Orchestrator::new(registry.clone(), small_params(), Vec::new());
    assert!(matches!(empty.validate(), Err(BenchError::Configuration(_))));

    let duplicate = Orchestrator::new(
        registry,
        small_params(),
        vec![
            case("doc", BackendKind::Document),
            case("doc", BackendKind::Document),
        ],
    );
    assert!(matches!(duplicate.validate(), Err(BenchError::Configuration(_))));
}
