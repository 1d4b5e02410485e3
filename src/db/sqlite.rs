// src/db/sqlite.rs

//! SQLite-backed connection factory.
//!
//! rusqlite is synchronous, so every statement runs on the blocking pool and
//! its rows are materialised into a [`MemoryRows`] cursor.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result, anyhow, bail};
use futures::future::BoxFuture;
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::Value;
use tracing::debug;

use super::{ConnectionDescriptor, ConnectionFactory, DbConnection, MemoryRows, RowReader};

/// Opens a SQLite database file named by the descriptor.
///
/// `:memory:` opens a private in-memory database per connection.
#[derive(Debug, Clone, Default)]
pub struct SqliteConnectionFactory;

impl SqliteConnectionFactory {
    pub fn new() -> Self {
        Self
    }
}

impl ConnectionFactory for SqliteConnectionFactory {
    fn connect<'a>(
        &'a self,
        descriptor: &'a ConnectionDescriptor,
    ) -> BoxFuture<'a, Result<Box<dyn DbConnection>>> {
        Box::pin(async move {
            if descriptor.is_empty() {
                bail!("no database connection configured");
            }

            let target = descriptor.as_str().to_string();
            let conn = tokio::task::spawn_blocking(move || {
                if target == ":memory:" {
                    rusqlite::Connection::open_in_memory()
                } else {
                    rusqlite::Connection::open(PathBuf::from(&target))
                }
            })
            .await
            .context("sqlite worker panicked")?
            .with_context(|| format!("opening sqlite database '{descriptor}'"))?;

            debug!(database = %descriptor, "sqlite connection opened");
            Ok(Box::new(SqliteConnection {
                conn: Arc::new(Mutex::new(conn)),
            }) as Box<dyn DbConnection>)
        })
    }
}

struct SqliteConnection {
    conn: Arc<Mutex<rusqlite::Connection>>,
}

impl DbConnection for SqliteConnection {
    fn query<'a>(&'a mut self, sql: &'a str) -> BoxFuture<'a, Result<Box<dyn RowReader + 'a>>> {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();

        Box::pin(async move {
            let rows = tokio::task::spawn_blocking(move || {
                let guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
                run_query(&guard, &sql)
            })
            .await
            .context("sqlite worker panicked")??;

            Ok(Box::new(rows) as Box<dyn RowReader + 'a>)
        })
    }

    fn execute<'a>(&'a mut self, sql: &'a str, params: &'a [Value]) -> BoxFuture<'a, Result<u64>> {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        let params: Vec<SqlValue> = params.iter().map(to_sql_value).collect();

        Box::pin(async move {
            let changed = tokio::task::spawn_blocking(move || {
                let guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
                guard.execute(&sql, rusqlite::params_from_iter(params))
            })
            .await
            .context("sqlite worker panicked")?
            .context("executing statement")?;

            Ok(changed as u64)
        })
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, Result<()>> {
        Box::pin(async move {
            let conn = Arc::try_unwrap(self.conn)
                .map_err(|_| anyhow!("sqlite connection still in use"))?
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner);

            tokio::task::spawn_blocking(move || conn.close().map_err(|(_, e)| e))
                .await
                .context("sqlite worker panicked")?
                .context("closing sqlite connection")?;

            debug!("sqlite connection closed");
            Ok(())
        })
    }
}

fn run_query(conn: &rusqlite::Connection, sql: &str) -> Result<MemoryRows> {
    let mut stmt = conn
        .prepare(sql)
        .with_context(|| format!("preparing query: {sql}"))?;

    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();
    let width = columns.len();

    let mut rows = stmt.query([]).context("running query")?;
    let mut out = Vec::new();

    while let Some(row) = rows.next().context("reading row")? {
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            values.push(to_json(row.get_ref(i)?));
        }
        out.push(values);
    }

    Ok(MemoryRows::new(columns, out))
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(bytes.iter().map(|b| format!("{b:02x}")).collect()),
    }
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::collect_rows;
    use serde_json::json;

    #[tokio::test]
    async fn round_trips_rows_through_a_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let descriptor = ConnectionDescriptor::new(path.to_string_lossy());
        let factory = SqliteConnectionFactory::new();

        let mut conn = factory.connect(&descriptor).await.unwrap();
        conn.execute("CREATE TABLE t (id INTEGER, name TEXT)", &[])
            .await
            .unwrap();
        let changed = conn
            .execute("INSERT INTO t VALUES (?1, ?2)", &[json!(1), json!("one")])
            .await
            .unwrap();
        assert_eq!(changed, 1);
        conn.close().await.unwrap();

        let mut conn = factory.connect(&descriptor).await.unwrap();
        let (value, count) = {
            let mut reader = conn.query("SELECT id, name FROM t").await.unwrap();
            collect_rows(reader.as_mut()).await.unwrap()
        };
        conn.close().await.unwrap();

        assert_eq!(count, 1);
        assert_eq!(value["rows"][0], json!({ "id": 1, "name": "one" }));
    }

    #[tokio::test]
    async fn empty_descriptor_is_rejected() {
        let factory = SqliteConnectionFactory::new();
        let err = factory
            .connect(&ConnectionDescriptor::default())
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("no database connection configured"));
    }
}
