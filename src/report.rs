//! Rendering of case results as a text table or JSON.

use std::io::Write;
use std::time::Duration;

use clap::ValueEnum;
use serde::Serialize;

use crate::bench::{CaseReport, CaseState, Phase};
use crate::config::BenchParams;
use crate::error::Result;

/// Output format of the results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned table on stdout.
    #[default]
    Text,
    /// One JSON document on stdout.
    Json,
}

/// Writes `reports` in `format`.
pub fn write_report(
    out: &mut impl Write,
    format: OutputFormat,
    params: &BenchParams,
    reports: &[CaseReport],
) -> Result<()> {
    match format {
        OutputFormat::Text => write_text(out, params, reports),
        OutputFormat::Json => write_json(out, params, reports),
    }
}

/// Aligned table: one row per case and timed phase.
pub fn write_text(
    out: &mut impl Write,
    params: &BenchParams,
    reports: &[CaseReport],
) -> Result<()> {
    writeln!(
        out,
        "base_record_count={} write_test_record_count={} concurrency={} insert_batch_size={}",
        params.base_record_count,
        params.write_test_record_count,
        params.concurrency,
        params.insert_batch_size
    )?;
    writeln!(out)?;
    writeln!(
        out,
        "{:<20} {:<10} {:<28} {:>12}",
        "CASE", "BACKEND", "PHASE", "TIME"
    )?;
    writeln!(out, "{}", "-".repeat(73))?;
    for report in reports {
        for phase in [Phase::Insert, Phase::ConcurrentReadWrite] {
            let time = report
                .elapsed(phase)
                .map_or_else(|| "-".to_string(), format_duration);
            writeln!(
                out,
                "{:<20} {:<10} {:<28} {:>12}",
                report.name, report.backend, phase, time
            )?;
        }
        if let Some(err) = &report.error {
            writeln!(
                out,
                "{:<20} FAILED after {:?}: {err}",
                report.name, report.reached
            )?;
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonReport<'a> {
    params: &'a BenchParams,
    cases: Vec<JsonCase<'a>>,
}

#[derive(Serialize)]
struct JsonCase<'a> {
    name: &'a str,
    backend: &'a str,
    reached: CaseState,
    #[serde(skip_serializing_if = "Option::is_none")]
    insert_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    concurrent_read_write_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonError>,
}

#[derive(Serialize)]
struct JsonError {
    kind: &'static str,
    message: String,
}

/// Single JSON document; phase times are in seconds.
pub fn write_json(
    out: &mut impl Write,
    params: &BenchParams,
    reports: &[CaseReport],
) -> Result<()> {
    let cases = reports
        .iter()
        .map(|report| JsonCase {
            name: &report.name,
            backend: report.backend.name(),
            reached: report.reached,
            insert_time: report.elapsed(Phase::Insert).map(|d| d.as_secs_f64()),
            concurrent_read_write_time: report
                .elapsed(Phase::ConcurrentReadWrite)
                .map(|d| d.as_secs_f64()),
            error: report.error.as_ref().map(|err| JsonError {
                kind: err.kind(),
                message: err.to_string(),
            }),
        })
        .collect();
    serde_json::to_writer_pretty(&mut *out, &JsonReport { params, cases })
        .map_err(std::io::Error::from)?;
    writeln!(out)?;
    Ok(())
}

fn format_duration(d: Duration) -> String {
    let micros = d.as_micros();
    if micros < 1_000 {
        format!("{} µs", micros)
    } else if micros < 1_000_000 {
        format!("{:.2} ms", micros as f64 / 1_000.0)
    } else {
        format!("{:.2} s", micros as f64 / 1_000_000.0)
    }
}
