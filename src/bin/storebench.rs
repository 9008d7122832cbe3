//! Command-line entry point: resolves cases and parameters, runs them, and
//! prints the results.

#![forbid(unsafe_code)]

use std::error::Error;
use std::io;
use std::path::PathBuf;

use clap::builder::FalseyValueParser;
use clap::Parser;
use storebench::config::{BackendUrls, FileConfig, DEFAULT_DOCUMENT_URL, DEFAULT_SQLITE_URL};
use storebench::logging::{default_level, init_logging};
use storebench::report::{write_report, OutputFormat};
use storebench::{BenchParams, CaseCatalog, Execution, Orchestrator, Registry};

fn main() {
    match try_main() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("storebench failed: {err}");
            std::process::exit(2);
        }
    }
}

/// Returns whether every case succeeded.
fn try_main() -> Result<bool, Box<dyn Error>> {
    let args = Args::parse();
    init_logging(default_level(args.debug))?;

    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let params = args.params(&file);

    let mut catalog = CaseCatalog::builtin(BackendUrls {
        sqlite: Some(args.sqlite_url.clone()),
        document: Some(args.document_url.clone()),
    });
    catalog.extend(&file.cases)?;
    let cases = catalog.select(&args.cases)?;

    let execution = if args.parallel || file.parallel.unwrap_or(false) {
        Execution::Parallel
    } else {
        Execution::Sequential
    };
    let orchestrator =
        Orchestrator::new(Registry::builtin(), params, cases).with_execution(execution);
    let reports = orchestrator.run()?;

    let mut stdout = io::stdout().lock();
    write_report(&mut stdout, args.format, &params, &reports)?;
    Ok(reports.iter().all(|report| report.is_success()))
}

#[derive(Parser, Debug)]
#[command(name = "storebench", version, about = "Compare storage backends under one workload")]
struct Args {
    /// Cases to run, comma separated. Runs every known case when omitted.
    #[arg(long, env = "CASES", value_delimiter = ',')]
    cases: Vec<String>,

    /// Run cases side by side instead of one after another.
    #[arg(long, env = "PARALLEL", value_parser = FalseyValueParser::new())]
    parallel: bool,

    /// Records seeded before the timed phases. The default of 100 000 000 is
    /// sized for external stores; the in-process `document` backend keeps
    /// every record in memory (roughly 1 KiB each), so lower it for that case.
    #[arg(long, env = "BASE_RECORD_COUNT")]
    base_records: Option<usize>,

    /// Records inserted by the bulk phase and by each concurrent writer.
    #[arg(long, env = "WRITE_TEST_RECORD_COUNT")]
    write_records: Option<usize>,

    /// Reader/writer pairs in the concurrent phase.
    #[arg(long, env = "CONCURRENCY")]
    concurrency: Option<usize>,

    /// Records per bulk insert batch.
    #[arg(long, env = "INSERT_BATCH_SIZE")]
    batch_size: Option<usize>,

    /// Record generator seed.
    #[arg(long, env = "SEED")]
    seed: Option<u64>,

    /// URL for SQLite cases (`sqlite://<path>` or `sqlite::temp:`).
    #[arg(long, env = "SQLITE_URL", default_value = DEFAULT_SQLITE_URL)]
    sqlite_url: String,

    /// URL for document cases (`memory://<name>`).
    #[arg(long, env = "DOCUMENT_URL", default_value = DEFAULT_DOCUMENT_URL)]
    document_url: String,

    /// TOML file with `[params]` overrides and extra `[[cases]]`.
    #[arg(long, env = "STOREBENCH_CONFIG")]
    config: Option<PathBuf>,

    /// Result format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Log at debug level unless `RUST_LOG` says otherwise. Any value other
    /// than an empty string, `0`, `false`, `no`, `off`, `n` or `f` enables it.
    #[arg(long, env = "DEBUG", value_parser = FalseyValueParser::new())]
    debug: bool,
}

impl Args {
    fn params(&self, file: &FileConfig) -> BenchParams {
        let mut params = BenchParams::default().merged_with(&file.params);
        if let Some(value) = self.base_records {
            params.base_record_count = value;
        }
        if let Some(value) = self.write_records {
            params.write_test_record_count = value;
        }
        if let Some(value) = self.concurrency {
            params.concurrency = value;
        }
        if let Some(value) = self.batch_size {
            params.insert_batch_size = value;
        }
        if let Some(value) = self.seed {
            params.seed = value;
        }
        params
    }
}
