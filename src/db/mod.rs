// src/db/mod.rs

//! Database connection boundary.
//!
//! Query-bearing executors open one connection per call through a
//! [`ConnectionFactory`], read rows through a [`RowReader`] cursor and close
//! the connection on every exit path. The wire protocol lives behind these
//! traits; [`sqlite`] provides the implementation used by the CLI.

pub mod sqlite;

use std::fmt;

use anyhow::Result;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

pub use sqlite::SqliteConnectionFactory;

/// Opaque description of where to connect. Its meaning belongs to the
/// factory (for SQLite: a database path).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionDescriptor(String);

impl ConnectionDescriptor {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionDescriptor {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Opens connections.
pub trait ConnectionFactory: Send + Sync {
    fn connect<'a>(
        &'a self,
        descriptor: &'a ConnectionDescriptor,
    ) -> BoxFuture<'a, Result<Box<dyn DbConnection>>>;
}

/// One open connection.
pub trait DbConnection: Send {
    /// Run a statement and return a forward-only cursor over its rows.
    fn query<'a>(&'a mut self, sql: &'a str) -> BoxFuture<'a, Result<Box<dyn RowReader + 'a>>>;

    /// Run a statement with positional parameters and return the number of
    /// rows it changed.
    fn execute<'a>(&'a mut self, sql: &'a str, params: &'a [Value]) -> BoxFuture<'a, Result<u64>>;

    fn close(self: Box<Self>) -> BoxFuture<'static, Result<()>>;
}

/// Forward-only row cursor. Call [`RowReader::read`] before the first row.
pub trait RowReader: Send {
    fn field_count(&self) -> usize;

    fn name(&self, index: usize) -> &str;

    /// Value of column `index` in the current row (`Null` when out of range
    /// or before the first `read`).
    fn value(&self, index: usize) -> Value;

    /// Advance to the next row. Returns `false` once rows are exhausted.
    fn read(&mut self) -> BoxFuture<'_, Result<bool>>;
}

/// A fully materialised result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryRows {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    cursor: Option<usize>,
}

impl MemoryRows {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows,
            cursor: None,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl RowReader for MemoryRows {
    fn field_count(&self) -> usize {
        self.columns.len()
    }

    fn name(&self, index: usize) -> &str {
        self.columns.get(index).map(String::as_str).unwrap_or("")
    }

    fn value(&self, index: usize) -> Value {
        self.cursor
            .and_then(|row| self.rows.get(row))
            .and_then(|row| row.get(index))
            .cloned()
            .unwrap_or(Value::Null)
    }

    fn read(&mut self) -> BoxFuture<'_, Result<bool>> {
        let next = self.cursor.map_or(0, |c| c + 1);
        self.cursor = Some(next.min(self.rows.len()));
        let has_row = next < self.rows.len();
        Box::pin(async move { Ok(has_row) })
    }
}

/// Drain a reader into `{ columns, rows }`, rows as column-keyed objects.
///
/// Returns the JSON value together with the number of rows read.
pub async fn collect_rows(reader: &mut dyn RowReader) -> Result<(Value, u64)> {
    let columns: Vec<String> = (0..reader.field_count())
        .map(|i| reader.name(i).to_string())
        .collect();

    let mut rows = Vec::new();
    while reader.read().await? {
        let row: serde_json::Map<String, Value> = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), reader.value(i)))
            .collect();
        rows.push(Value::Object(row));
    }

    let count = rows.len() as u64;
    Ok((
        serde_json::json!({ "columns": columns, "rows": rows }),
        count,
    ))
}

/// Close a connection, logging instead of failing. Used on every exit path
/// of a task so a close error never masks the task's own outcome.
pub async fn close_quietly(conn: Box<dyn DbConnection>) {
    if let Err(e) = conn.close().await {
        warn!(error = %e, "failed to close database connection");
    }
}

/// Render a cell for text output: strings unquoted, `Null` as empty.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
