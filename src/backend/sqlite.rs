//! Relational backend on SQLite.
//!
//! Accepted URLs:
//! - `sqlite://<path>`: database file at `<path>` (created if missing).
//! - `sqlite::temp:`: fresh database in a temporary directory that lives as
//!   long as the adapter.
//!
//! The `things` table is dropped and recreated on connect, with one index per
//! reference and timestamp column.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tempfile::TempDir;
use tracing::{debug, info};

use super::{BackendAdapter, BackendKind, ConnectOptions, Pool, RecordId, Session};
use crate::config::CaseConfig;
use crate::error::{BenchError, Result};
use crate::record::{epoch_millis, SyntheticRecord};
use crate::sort::SortSpec;

const TEMP_URL: &str = "sqlite::temp:";
const URL_PREFIX: &str = "sqlite://";
const BUSY_TIMEOUT: Duration = Duration::from_secs(60);

const SCHEMA: &str = "
    DROP TABLE IF EXISTS things;
    CREATE TABLE things (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        url TEXT,
        secret TEXT,
        creator_id INTEGER,
        owner_id INTEGER,
        related_to_id INTEGER,
        related_to_type TEXT,
        logged_at INTEGER,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE INDEX idx_things_creator_id ON things (creator_id);
    CREATE INDEX idx_things_owner_id ON things (owner_id);
    CREATE INDEX idx_things_related_to_id ON things (related_to_id);
    CREATE INDEX idx_things_related_to_type ON things (related_to_type);
    CREATE INDEX idx_things_logged_at ON things (logged_at);
    CREATE INDEX idx_things_created_at ON things (created_at);
    CREATE INDEX idx_things_updated_at ON things (updated_at);
";

const INSERT_SQL: &str = "INSERT INTO things (
        url, secret, creator_id, owner_id, related_to_id, related_to_type,
        logged_at, created_at, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";

/// Registry entry point.
pub fn connect(config: &CaseConfig, options: &ConnectOptions) -> Result<Box<dyn BackendAdapter>> {
    Ok(Box::new(SqliteBackend::open(&config.url, options.pool_size)?))
}

/// Pooled SQLite adapter.
pub struct SqliteBackend {
    pool: Pool<SqliteSession>,
    // Dropped after `pool` so no connection outlives the directory.
    _temp: Option<TempDir>,
}

impl SqliteBackend {
    /// Opens the database named by `url`, provisions the schema, and sizes
    /// the pool to `pool_size` connections.
    pub fn open(url: &str, pool_size: usize) -> Result<Self> {
        let (path, temp) = resolve_url(url)?;
        info!(path = %path.display(), pool_size, "sqlite.connect");

        let admin = open_connection(&path)?;
        admin
            .execute_batch(SCHEMA)
            .map_err(|err| BenchError::Connection(format!("provisioning schema: {err}")))?;
        debug!("sqlite.schema_ready");
        drop(admin);

        let pool = Pool::new("sqlite", pool_size, move || {
            open_connection(&path).map(|conn| SqliteSession { conn })
        });
        Ok(Self { pool, _temp: temp })
    }

    /// Pool occupancy.
    pub fn pool_status(&self) -> super::PoolStatus {
        self.pool.status()
    }
}

impl BackendAdapter for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn with_connection(&self, f: &mut dyn FnMut(&mut dyn Session) -> Result<()>) -> Result<()> {
        let mut conn = self.pool.acquire()?;
        f(&mut *conn)
    }

    fn disconnect(&self) -> Result<()> {
        self.pool.close();
        Ok(())
    }
}

fn resolve_url(url: &str) -> Result<(PathBuf, Option<TempDir>)> {
    if url == TEMP_URL {
        let dir = TempDir::new()
            .map_err(|err| BenchError::Connection(format!("creating temp dir: {err}")))?;
        let path = dir.path().join("storebench.db");
        return Ok((path, Some(dir)));
    }
    match url.strip_prefix(URL_PREFIX) {
        Some(path) if !path.is_empty() => Ok((PathBuf::from(path), None)),
        _ => Err(BenchError::Connection(format!(
            "unsupported sqlite url '{url}' (expected {URL_PREFIX}<path> or {TEMP_URL})"
        ))),
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path).map_err(BenchError::connection)?;
    conn.busy_timeout(BUSY_TIMEOUT).map_err(BenchError::connection)?;
    let mode: String = conn
        .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
        .map_err(BenchError::connection)?;
    conn.pragma_update(None, "synchronous", "FULL")
        .map_err(BenchError::connection)?;
    debug!(journal_mode = %mode, "sqlite.open_connection");
    Ok(conn)
}

/// One pooled SQLite connection.
pub struct SqliteSession {
    conn: Connection,
}

impl Session for SqliteSession {
    fn insert_batch(&mut self, records: &[SyntheticRecord]) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(BenchError::write)?;
        {
            let mut stmt = tx.prepare_cached(INSERT_SQL).map_err(BenchError::write)?;
            for record in records {
                execute_insert(&mut stmt, record)?;
            }
        }
        tx.commit().map_err(BenchError::write)
    }

    fn insert_one(&mut self, record: &SyntheticRecord) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare_cached(INSERT_SQL)
            .map_err(BenchError::write)?;
        execute_insert(&mut stmt, record)
    }

    fn find_last_by(&mut self, sort: &SortSpec) -> Result<Option<RecordId>> {
        let sql = last_by_sql(sort);
        let mut stmt = self.conn.prepare_cached(&sql).map_err(BenchError::read)?;
        stmt.query_row([], |row| row.get::<_, i64>(0))
            .optional()
            .map(|id| id.map(RecordId))
            .map_err(BenchError::read)
    }

    fn clear(&mut self) -> Result<()> {
        self.conn
            .execute("DELETE FROM things", [])
            .map(|_| ())
            .map_err(BenchError::write)
    }
}

fn execute_insert(
    stmt: &mut rusqlite::CachedStatement<'_>,
    record: &SyntheticRecord,
) -> Result<()> {
    stmt.execute(params![
        record.url,
        record.secret,
        record.creator_id,
        record.owner_id,
        record.related_to_id,
        record.related_to_type.as_str(),
        epoch_millis(record.logged_at),
        epoch_millis(record.created_at),
        epoch_millis(record.updated_at),
    ])
    .map(|_| ())
    .map_err(BenchError::write)
}

/// "Last row under `sort`" is the first row under the reversed ordering.
/// Ties break on `id`, ascending in the forward ordering.
fn last_by_sql(sort: &SortSpec) -> String {
    let mut sql = String::from("SELECT id FROM things ORDER BY ");
    for (field, direction) in sort.reversed().keys() {
        let _ = write!(sql, "{} {}, ", field.column(), direction.sql());
    }
    sql.push_str("id DESC LIMIT 1");
    sql
}
