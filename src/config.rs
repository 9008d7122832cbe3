//! Benchmark parameters, case catalog, and the optional TOML config file.
//!
//! Precedence when the binary resolves settings: command line / environment,
//! then the config file, then the defaults below.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::backend::BackendKind;
use crate::error::{BenchError, Result};

/// Records seeded before the timed phases.
pub const DEFAULT_BASE_RECORD_COUNT: usize = 100_000_000;
/// Records inserted by the bulk phase and by each concurrent writer.
pub const DEFAULT_WRITE_TEST_RECORD_COUNT: usize = 100_000;
/// Reader/writer pairs in the concurrent phase.
pub const DEFAULT_CONCURRENCY: usize = 50;
/// Records per `insert_batch` call.
pub const DEFAULT_INSERT_BATCH_SIZE: usize = 1_000;
/// Seed of the record generator.
pub const DEFAULT_SEED: u64 = 42;
/// Default URL of the built-in `sqlite` case.
pub const DEFAULT_SQLITE_URL: &str = "sqlite::temp:";
/// Default URL of the built-in `document` case.
pub const DEFAULT_DOCUMENT_URL: &str = "memory://things";

const POOL_CONNECTIONS_PER_PAIR: usize = 4;

/// Workload knobs shared read-only by every case.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BenchParams {
    /// Records seeded (untimed) before the bulk phase.
    pub base_record_count: usize,
    /// Records written by the bulk phase and by each concurrent writer.
    pub write_test_record_count: usize,
    /// Number of reader/writer pairs.
    pub concurrency: usize,
    /// Records per bulk batch.
    pub insert_batch_size: usize,
    /// Record generator seed.
    pub seed: u64,
}

impl Default for BenchParams {
    fn default() -> Self {
        Self {
            base_record_count: DEFAULT_BASE_RECORD_COUNT,
            write_test_record_count: DEFAULT_WRITE_TEST_RECORD_COUNT,
            concurrency: DEFAULT_CONCURRENCY,
            insert_batch_size: DEFAULT_INSERT_BATCH_SIZE,
            seed: DEFAULT_SEED,
        }
    }
}

impl BenchParams {
    /// Rejects parameters no phase can run with.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(BenchError::Configuration(
                "concurrency must be greater than zero".into(),
            ));
        }
        if self.insert_batch_size == 0 {
            return Err(BenchError::Configuration(
                "insert batch size must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Connection pool capacity: every reader and writer holds one
    /// connection for the whole concurrent phase.
    pub fn pool_size(&self) -> usize {
        self.concurrency
            .saturating_mul(POOL_CONNECTIONS_PER_PAIR)
            .max(POOL_CONNECTIONS_PER_PAIR)
    }

    /// Applies file overrides on top of `self`.
    pub fn merged_with(mut self, file: &ParamsFile) -> Self {
        if let Some(value) = file.base_record_count {
            self.base_record_count = value;
        }
        if let Some(value) = file.write_test_record_count {
            self.write_test_record_count = value;
        }
        if let Some(value) = file.concurrency {
            self.concurrency = value;
        }
        if let Some(value) = file.insert_batch_size {
            self.insert_batch_size = value;
        }
        if let Some(value) = file.seed {
            self.seed = value;
        }
        self
    }
}

/// One resolved benchmark case: a named backend binding and its URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CaseConfig {
    /// Case name used for selection and reporting.
    pub name: String,
    /// Backend variant.
    pub backend: BackendKind,
    /// Backend connection URL.
    pub url: String,
}

/// Whether cases run one after another or side by side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Execution {
    /// One case at a time, in catalog order.
    #[default]
    Sequential,
    /// Every case on its own thread.
    Parallel,
}

/// `[params]` table of the config file.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamsFile {
    /// Overrides [`BenchParams::base_record_count`].
    pub base_record_count: Option<usize>,
    /// Overrides [`BenchParams::write_test_record_count`].
    pub write_test_record_count: Option<usize>,
    /// Overrides [`BenchParams::concurrency`].
    pub concurrency: Option<usize>,
    /// Overrides [`BenchParams::insert_batch_size`].
    pub insert_batch_size: Option<usize>,
    /// Overrides [`BenchParams::seed`].
    pub seed: Option<u64>,
}

/// `[[cases]]` entry of the config file.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaseFile {
    /// Case name.
    pub name: String,
    /// Backend name, see [`BackendKind`].
    pub backend: String,
    /// Connection URL; falls back to the backend's URL from the command line.
    pub url: Option<String>,
}

/// Parsed config file.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Parameter overrides.
    #[serde(default)]
    pub params: ParamsFile,
    /// Additional or replacement cases.
    #[serde(default)]
    pub cases: Vec<CaseFile>,
    /// Run cases in parallel.
    pub parallel: Option<bool>,
}

impl FileConfig {
    /// Reads and parses a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
            .map_err(|err| BenchError::Configuration(format!("{}: {err}", path.display())))
    }

    /// Parses TOML text.
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|err| BenchError::Configuration(err.to_string()))
    }
}

/// Per-backend URLs supplied on the command line or environment.
#[derive(Clone, Debug, Default)]
pub struct BackendUrls {
    /// URL for SQLite cases without their own URL.
    pub sqlite: Option<String>,
    /// URL for document cases without their own URL.
    pub document: Option<String>,
}

impl BackendUrls {
    fn for_kind(&self, kind: BackendKind) -> Option<&str> {
        match kind {
            BackendKind::Sqlite => self.sqlite.as_deref(),
            BackendKind::Document => self.document.as_deref(),
        }
    }
}

#[derive(Clone, Debug)]
struct CatalogEntry {
    name: String,
    backend: BackendKind,
    url: Option<String>,
}

/// Known cases, against which a requested selection is resolved.
#[derive(Clone, Debug)]
pub struct CaseCatalog {
    entries: Vec<CatalogEntry>,
    urls: BackendUrls,
}

impl CaseCatalog {
    /// One case per built-in backend, named after the backend.
    pub fn builtin(urls: BackendUrls) -> Self {
        let entries = BackendKind::ALL
            .into_iter()
            .map(|backend| CatalogEntry {
                name: backend.name().to_string(),
                backend,
                url: None,
            })
            .collect();
        Self { entries, urls }
    }

    /// Adds file-defined cases; an entry with an existing name replaces it.
    pub fn extend(&mut self, cases: &[CaseFile]) -> Result<()> {
        for case in cases {
            if case.name.trim().is_empty() {
                return Err(BenchError::Configuration("case name must not be empty".into()));
            }
            let entry = CatalogEntry {
                name: case.name.clone(),
                backend: case.backend.parse()?,
                url: case.url.clone(),
            };
            match self.entries.iter_mut().find(|e| e.name == entry.name) {
                Some(existing) => *existing = entry,
                None => self.entries.push(entry),
            }
        }
        Ok(())
    }

    /// Known case names in catalog order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// Resolves `requested` (every known case when empty) into case configs.
    /// Unknown names and cases without a URL are configuration errors.
    pub fn select(&self, requested: &[String]) -> Result<Vec<CaseConfig>> {
        let chosen: Vec<&CatalogEntry> = if requested.is_empty() {
            self.entries.iter().collect()
        } else {
            let mut seen = HashSet::new();
            let mut chosen = Vec::with_capacity(requested.len());
            for name in requested {
                let entry = self
                    .entries
                    .iter()
                    .find(|e| &e.name == name)
                    .ok_or_else(|| {
                        BenchError::Configuration(format!(
                            "unknown case '{name}' (known: {})",
                            self.names().join(", ")
                        ))
                    })?;
                if seen.insert(name.as_str()) {
                    chosen.push(entry);
                }
            }
            chosen
        };

        chosen
            .into_iter()
            .map(|entry| {
                let url = entry
                    .url
                    .as_deref()
                    .or_else(|| self.urls.for_kind(entry.backend))
                    .filter(|url| !url.trim().is_empty())
                    .ok_or_else(|| {
                        BenchError::Configuration(format!(
                            "case '{}' has no {} url",
                            entry.name, entry.backend
                        ))
                    })?;
                Ok(CaseConfig {
                    name: entry.name.clone(),
                    backend: entry.backend,
                    url: url.to_string(),
                })
            })
            .collect()
    }
}
