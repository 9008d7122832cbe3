#![allow(missing_docs)]

use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

const SMALL_RUN: [&str; 8] = [
    "--base-records",
    "120",
    "--write-records",
    "10",
    "--concurrency",
    "2",
    "--batch-size",
    "50",
];

#[test]
fn json_report_covers_every_selected_case() {
    let output = cargo_bin_cmd!("storebench")
        .args(SMALL_RUN)
        .args(["--cases", "document,sqlite", "--format", "json"])
        .env_remove("RUST_LOG")
        .output()
        .expect("run storebench");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: Value = serde_json::from_slice(&output.stdout).expect("json output");
    let cases = report["cases"].as_array().expect("cases array");
    let names: Vec<_> = cases.iter().map(|c| c["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["document", "sqlite"]);
    for case in cases {
        assert_eq!(case["reached"], "disconnected");
        assert!(case["insert_time"].as_f64().is_some());
        assert!(case["concurrent_read_write_time"].as_f64().is_some());
    }
    assert_eq!(report["params"]["write_test_record_count"], 10);
}

#[test]
fn text_report_is_a_table() {
    let output = cargo_bin_cmd!("storebench")
        .args(SMALL_RUN)
        .args(["--cases", "document"])
        .output()
        .expect("run storebench");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("CASE"));
    assert!(stdout.contains("insert_time"));
    assert!(stdout.contains("concurrent_read_write_time"));
}

#[test]
fn config_file_adds_cases() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("bench.toml");
    fs::write(
        &config,
        format!(
            r#"
            [params]
            base_record_count = 80
            write_test_record_count = 5
            concurrency = 2

            [[cases]]
            name = "sqlite-file"
            backend = "sqlite"
            url = "sqlite://{}"
            "#,
            dir.path().join("file.db").display()
        ),
    )
    .unwrap();

    let output = cargo_bin_cmd!("storebench")
        .args(["--cases", "sqlite-file", "--format", "json", "--config"])
        .arg(&config)
        .output()
        .expect("run storebench");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["cases"][0]["name"], "sqlite-file");
    assert_eq!(report["params"]["base_record_count"], 80);
    assert!(dir.path().join("file.db").exists());
}

#[test]
fn numeric_and_word_switches_from_environment_are_accepted() {
    for (debug, parallel) in [("1", "yes"), ("0", "no"), ("on", "")] {
        let output = cargo_bin_cmd!("storebench")
            .args(SMALL_RUN)
            .args(["--cases", "document,sqlite", "--format", "json"])
            .env("DEBUG", debug)
            .env("PARALLEL", parallel)
            .env_remove("RUST_LOG")
            .output()
            .expect("run storebench");
        assert!(
            output.status.success(),
            "DEBUG={debug} PARALLEL={parallel}: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        let report: Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(report["cases"].as_array().map(Vec::len), Some(2));
    }
}

#[test]
fn unknown_case_is_a_configuration_failure() {
    cargo_bin_cmd!("storebench")
        .args(SMALL_RUN)
        .args(["--cases", "postgres"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn failing_case_exits_non_zero() {
    let output = cargo_bin_cmd!("storebench")
        .args(SMALL_RUN)
        .args(["--cases", "sqlite", "--sqlite-url", "sqlite:///nonexistent-dir/x/y.db"])
        .args(["--format", "json"])
        .output()
        .expect("run storebench");
    assert_eq!(output.status.code(), Some(1));
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["cases"][0]["error"]["kind"], "connection");
    assert_eq!(report["cases"][0]["reached"], "created");
}
