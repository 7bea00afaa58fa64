//! Persistent, append-only log of received messages backed by SQLite.
//!
//! Every operation goes through one mutex, so a store can be shared between
//! the listener's consumer and whatever thread runs queries.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::Deserialize;

use crate::message::SyslogMessage;
use crate::severity::Severity;
use crate::{Error, Result};

/// Default number of rows returned by a query.
pub const DEFAULT_QUERY_LIMIT: u32 = 50;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS logs (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    facility  INTEGER NOT NULL,
    severity  INTEGER NOT NULL,
    timestamp TEXT NOT NULL,
    hostname  TEXT NOT NULL,
    app_name  TEXT NOT NULL,
    message   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_logs_timestamp ON logs(timestamp);
";

const INSERT: &str = "INSERT INTO logs (facility, severity, timestamp, hostname, app_name, message) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

/// Query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    /// Substring of the message body; empty matches everything.
    pub search_text: String,
    /// Only rows at least this severe (numerically `<=`).
    pub min_severity: Option<Severity>,
    /// Maximum rows returned. `0` returns no rows.
    pub limit: u32,
}

impl Default for LogFilter {
    fn default() -> Self {
        Self {
            search_text: String::new(),
            min_severity: None,
            limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

/// `[store]` section of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file, created if missing.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("syslogkit.db"),
        }
    }
}

#[derive(Default)]
struct Inner {
    conn: Option<Connection>,
    path: Option<PathBuf>,
}

#[derive(Default)]
pub struct LogStore {
    inner: Mutex<Inner>,
}

impl LogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or create) the database at `path`, closing whatever was open
    /// before. Calling it again with the same path simply reopens it.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut inner = self.lock();
        close_conn(&mut inner);

        let conn = Connection::open(path)
            .and_then(|conn| {
                conn.busy_timeout(BUSY_TIMEOUT)?;
                conn.execute_batch(SCHEMA)?;
                Ok(conn)
            })
            .map_err(|source| Error::StoreOpen {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::info!(path = %path.display(), "log store opened");

        inner.conn = Some(conn);
        inner.path = Some(path.to_path_buf());
        Ok(())
    }

    pub fn close(&self) {
        let mut inner = self.lock();
        close_conn(&mut inner);
    }

    pub fn is_open(&self) -> bool {
        self.lock().conn.is_some()
    }

    /// Path of the currently open database.
    pub fn db_path(&self) -> Option<PathBuf> {
        self.lock().path.clone()
    }

    /// Append `message` and return the id assigned to its row.
    pub fn write(&self, message: &SyslogMessage) -> Result<i64> {
        let inner = self.lock();
        let conn = inner.conn.as_ref().ok_or(Error::StoreNotOpen)?;

        let mut stmt = conn.prepare_cached(INSERT).map_err(Error::StoreWrite)?;
        stmt.execute(params![
            message.facility(),
            message.severity().code(),
            message.timestamp(),
            message.hostname(),
            message.app_name(),
            message.message(),
        ])
        .map_err(Error::StoreWrite)?;

        Ok(conn.last_insert_rowid())
    }

    /// Most recent rows first, filtered by `filter`.
    pub fn query(&self, filter: &LogFilter) -> Result<Vec<SyslogMessage>> {
        let inner = self.lock();
        let conn = inner.conn.as_ref().ok_or(Error::StoreNotOpen)?;

        let mut sql = String::from(
            "SELECT facility, severity, timestamp, hostname, app_name, message FROM logs WHERE 1=1",
        );
        let mut args: Vec<Value> = Vec::with_capacity(3);

        if !filter.search_text.is_empty() {
            sql.push_str(" AND message LIKE ? ESCAPE '\\'");
            args.push(Value::Text(format!(
                "%{}%",
                escape_like(&filter.search_text)
            )));
        }
        if let Some(severity) = filter.min_severity {
            sql.push_str(" AND severity <= ?");
            args.push(Value::Integer(i64::from(severity.code())));
        }
        sql.push_str(" ORDER BY id DESC LIMIT ?");
        args.push(Value::Integer(i64::from(filter.limit)));

        let mut stmt = conn.prepare(&sql).map_err(Error::StoreQuery)?;
        let rows = stmt
            .query_map(params_from_iter(args), row_to_message)
            .map_err(Error::StoreQuery)?;

        let messages = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::StoreQuery)?;
        Ok(messages)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // a panic while holding the lock leaves the connection itself usable
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn close_conn(inner: &mut Inner) {
    if let Some(conn) = inner.conn.take() {
        if let Err((_, err)) = conn.close() {
            tracing::warn!(error = %err, "failed to close log store cleanly");
        }
        if let Some(path) = inner.path.take() {
            tracing::debug!(path = %path.display(), "log store closed");
        }
    }
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<SyslogMessage> {
    let severity: u8 = row.get(1)?;
    let severity = Severity::try_from(severity)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(1, Type::Integer, Box::new(err)))?;

    Ok(
        SyslogMessage::new(row.get::<_, u32>(0)?, severity, row.get::<_, String>(5)?)
            .with_timestamp(row.get::<_, String>(2)?)
            .with_hostname(row.get::<_, String>(3)?)
            .with_app_name(row.get::<_, String>(4)?),
    )
}

/// Make `%`, `_` and the escape character itself match literally.
fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
