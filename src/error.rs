//! Error type shared by the harness and every backend adapter.

use std::io;

use thiserror::Error;

/// Result alias used throughout the harness.
pub type Result<T> = std::result::Result<T, BenchError>;

/// Failure taxonomy for benchmark cases and backend adapters.
#[derive(Debug, Error)]
pub enum BenchError {
    /// Backend unreachable, rejected credentials, or schema provisioning failed.
    #[error("connection error: {0}")]
    Connection(String),
    /// A write (bulk, single, or clear) could not be persisted.
    #[error("write error: {0}")]
    Write(String),
    /// A read query failed. An empty result is not a read error.
    #[error("read error: {0}")]
    Read(String),
    /// Unknown case name, missing URL, or out-of-range parameter.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A reader, writer, or supervisor thread panicked.
    #[error("{0} worker panicked")]
    WorkerPanicked(&'static str),
    /// I/O error while loading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl BenchError {
    /// Short machine-friendly label for reports.
    pub fn kind(&self) -> &'static str {
        match self {
            BenchError::Connection(_) => "connection",
            BenchError::Write(_) => "write",
            BenchError::Read(_) => "read",
            BenchError::Configuration(_) => "configuration",
            BenchError::WorkerPanicked(_) => "panic",
            BenchError::Io(_) => "io",
        }
    }

    pub(crate) fn connection(err: impl std::fmt::Display) -> Self {
        BenchError::Connection(err.to_string())
    }

    pub(crate) fn write(err: impl std::fmt::Display) -> Self {
        BenchError::Write(err.to_string())
    }

    pub(crate) fn read(err: impl std::fmt::Display) -> Self {
        BenchError::Read(err.to_string())
    }
}
