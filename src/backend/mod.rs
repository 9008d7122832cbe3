//! Storage backend contract and the static backend registry.
//!
//! A backend is reached through [`BackendAdapter`]: the adapter owns a
//! bounded pool and hands out [`Session`]s for the duration of a closure.
//! Connecting (including schema provisioning) is the job of a [`Connector`]
//! looked up by [`BackendKind`] in a [`Registry`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::CaseConfig;
use crate::error::{BenchError, Result};
use crate::record::SyntheticRecord;
use crate::sort::SortSpec;

pub mod document;
pub mod pool;
pub mod sqlite;

pub use pool::{Pool, PoolStatus, PooledConnection};

/// Backend-assigned identifier of a stored record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Operations available on one checked-out backend connection.
pub trait Session {
    /// Persists every record in a single backend-level operation.
    fn insert_batch(&mut self, records: &[SyntheticRecord]) -> Result<()>;

    /// Persists one record.
    fn insert_one(&mut self, record: &SyntheticRecord) -> Result<()>;

    /// Id of the record that sorts last under `sort`; `None` when empty.
    fn find_last_by(&mut self, sort: &SortSpec) -> Result<Option<RecordId>>;

    /// Removes every benchmark record.
    fn clear(&mut self) -> Result<()>;
}

/// A connected storage backend.
///
/// Implementations must be shareable across the reader and writer threads of
/// the concurrent phase.
pub trait BackendAdapter: Send + Sync {
    /// Backend variant.
    fn kind(&self) -> BackendKind;

    /// Runs `f` with a pooled connection. The connection is returned to the
    /// pool on every exit path of `f`.
    fn with_connection(&self, f: &mut dyn FnMut(&mut dyn Session) -> Result<()>) -> Result<()>;

    /// Releases pooled resources. Calling it more than once is a no-op.
    fn disconnect(&self) -> Result<()>;

    /// [`Session::insert_batch`] on a short-lived connection.
    fn insert_batch(&self, records: &[SyntheticRecord]) -> Result<()> {
        self.with_connection(&mut |session| session.insert_batch(records))
    }

    /// [`Session::insert_one`] on a short-lived connection.
    fn insert_one(&self, record: &SyntheticRecord) -> Result<()> {
        self.with_connection(&mut |session| session.insert_one(record))
    }

    /// [`Session::find_last_by`] on a short-lived connection.
    fn find_last_by(&self, sort: &SortSpec) -> Result<Option<RecordId>> {
        let mut found = None;
        self.with_connection(&mut |session| {
            found = session.find_last_by(sort)?;
            Ok(())
        })?;
        Ok(found)
    }

    /// [`Session::clear`] on a short-lived connection.
    fn clear(&self) -> Result<()> {
        self.with_connection(&mut |session| session.clear())
    }
}

/// Options every connector receives besides the case configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Maximum pooled connections.
    pub pool_size: usize,
}

/// Known backend variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Relational store on SQLite.
    Sqlite,
    /// In-process document collection.
    Document,
}

impl BackendKind {
    /// Every variant, in registry order.
    pub const ALL: [BackendKind; 2] = [BackendKind::Sqlite, BackendKind::Document];

    /// Configuration name.
    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Sqlite => "sqlite",
            BackendKind::Document => "document",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = BenchError;

    fn from_str(value: &str) -> Result<Self> {
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.name() == value)
            .ok_or_else(|| {
                BenchError::Configuration(format!(
                    "unknown backend '{value}' (expected one of: {})",
                    BackendKind::ALL.map(BackendKind::name).join(", ")
                ))
            })
    }
}

/// Opens a connected adapter for a case.
pub type Connector =
    Arc<dyn Fn(&CaseConfig, &ConnectOptions) -> Result<Box<dyn BackendAdapter>> + Send + Sync>;

/// Static mapping from [`BackendKind`] to its connector.
#[derive(Clone, Default)]
pub struct Registry {
    connectors: Vec<(BackendKind, Connector)>,
}

impl Registry {
    /// Registry with no bindings.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with every built-in backend bound.
    pub fn builtin() -> Self {
        Self::empty()
            .register(BackendKind::Sqlite, Arc::new(sqlite::connect))
            .register(BackendKind::Document, Arc::new(document::connect))
    }

    /// Binds (or rebinds) `kind`.
    pub fn register(mut self, kind: BackendKind, connector: Connector) -> Self {
        self.connectors.retain(|(bound, _)| *bound != kind);
        self.connectors.push((kind, connector));
        self
    }

    /// Connector bound to `kind`, if any.
    pub fn connector(&self, kind: BackendKind) -> Option<&Connector> {
        self.connectors
            .iter()
            .find(|(bound, _)| *bound == kind)
            .map(|(_, connector)| connector)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.connectors.iter().map(|(kind, _)| kind))
            .finish()
    }
}
