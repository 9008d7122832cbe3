#![allow(missing_docs)]

use storebench::backend::document::DocumentBackend;
use storebench::backend::sqlite::SqliteBackend;
use storebench::backend::{BackendAdapter, BackendKind, RecordId, Registry};
use storebench::bench::{CaseState, Phase};
use storebench::config::{BenchParams, CaseConfig};
use storebench::error::BenchError;
use storebench::record::RecordGenerator;
use storebench::sort::SortRotation;
use storebench::Orchestrator;
use tempfile::TempDir;

#[test]
fn file_database_is_reprovisioned_on_connect() {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("bench.db").display());
    let mut generator = RecordGenerator::new(4);

    let first = SqliteBackend::open(&url, 2).unwrap();
    let records: Vec<_> = generator.generate(10).collect();
    first.insert_batch(&records).unwrap();
    let sort = SortRotation::spec_at(0);
    assert!(first.find_last_by(&sort).unwrap().is_some());
    first.disconnect().unwrap();
    drop(first);

    let second = SqliteBackend::open(&url, 2).unwrap();
    assert_eq!(second.find_last_by(&sort).unwrap(), None);
    second.insert_one(&generator.next_record()).unwrap();
    assert_eq!(second.find_last_by(&sort).unwrap(), Some(RecordId(1)));
}

#[test]
fn sqlite_and_document_agree_on_last_record() {
    let sqlite = SqliteBackend::open("sqlite::temp:", 2).unwrap();
    let document = DocumentBackend::open("memory://agree", 2).unwrap();
    let records: Vec<_> = RecordGenerator::new(21).generate(200).collect();
    sqlite.insert_batch(&records).unwrap();
    document.insert_batch(&records).unwrap();

    for sort in SortRotation::new().take(16) {
        assert_eq!(
            sqlite.find_last_by(&sort).unwrap(),
            document.find_last_by(&sort).unwrap(),
            "{sort}"
        );
    }
}

#[test]
fn clear_keeps_schema_usable() {
    let backend = SqliteBackend::open("sqlite::temp:", 1).unwrap();
    let mut generator = RecordGenerator::new(2);
    backend.insert_one(&generator.next_record()).unwrap();
    backend.clear().unwrap();
    assert_eq!(backend.find_last_by(&SortRotation::spec_at(3)).unwrap(), None);
    backend.insert_one(&generator.next_record()).unwrap();
    assert!(backend.find_last_by(&SortRotation::spec_at(3)).unwrap().is_some());
}

#[test]
fn disconnected_pool_refuses_work() {
    let backend = SqliteBackend::open("sqlite::temp:", 1).unwrap();
    backend.disconnect().unwrap();
    assert!(backend.pool_status().closed);
    assert!(matches!(backend.clear(), Err(BenchError::Connection(_))));
}

#[test]
fn builtin_backends_complete_a_small_run() {
    let params = BenchParams {
        base_record_count: 300,
        write_test_record_count: 25,
        concurrency: 3,
        insert_batch_size: 64,
        seed: 11,
    };
    let cases = vec![
        CaseConfig {
            name: "sqlite".into(),
            backend: BackendKind::Sqlite,
            url: "sqlite::temp:".into(),
        },
        CaseConfig {
            name: "document".into(),
            backend: BackendKind::Document,
            url: "memory://things".into(),
        },
    ];
    let reports = Orchestrator::new(Registry::builtin(), params, cases)
        .run()
        .unwrap();
    for report in &reports {
        assert!(report.is_success(), "{}: {:?}", report.name, report.error);
        assert_eq!(report.reached, CaseState::Disconnected);
        assert!(report.elapsed(Phase::Insert).is_some());
        assert!(report.elapsed(Phase::ConcurrentReadWrite).is_some());
    }
}
