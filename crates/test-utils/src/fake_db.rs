use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow, bail};
use futures::future::BoxFuture;
use serde_json::Value;

use etlflow::db::{ConnectionDescriptor, ConnectionFactory, DbConnection, MemoryRows, RowReader};

#[derive(Default)]
struct State {
    results: Mutex<HashMap<String, MemoryRows>>,
    executed: Mutex<Vec<(String, Vec<Value>)>>,
    refuse_connect: Mutex<Option<String>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

/// In-memory connection factory.
///
/// Queries are answered from canned results keyed by their exact SQL text;
/// unknown SQL fails. Statements run through `execute` are recorded and
/// report one changed row. Opens and closes are counted so tests can check
/// that every connection was released.
#[derive(Clone, Default)]
pub struct MemoryConnectionFactory {
    state: Arc<State>,
}

impl MemoryConnectionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(self, sql: &str, columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        self.state.results.lock().unwrap().insert(
            sql.to_string(),
            MemoryRows::new(columns.iter().map(|c| c.to_string()).collect(), rows),
        );
        self
    }

    /// Make every `connect` fail with `message`.
    pub fn refusing(self, message: &str) -> Self {
        *self.state.refuse_connect.lock().unwrap() = Some(message.to_string());
        self
    }

    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<(String, Vec<Value>)> {
        self.state.executed.lock().unwrap().clone()
    }
}

impl ConnectionFactory for MemoryConnectionFactory {
    fn connect<'a>(
        &'a self,
        _descriptor: &'a ConnectionDescriptor,
    ) -> BoxFuture<'a, Result<Box<dyn DbConnection>>> {
        Box::pin(async move {
            if let Some(message) = self.state.refuse_connect.lock().unwrap().clone() {
                bail!(message);
            }
            self.state.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MemoryConnection {
                state: Arc::clone(&self.state),
            }) as Box<dyn DbConnection>)
        })
    }
}

struct MemoryConnection {
    state: Arc<State>,
}

impl DbConnection for MemoryConnection {
    fn query<'a>(&'a mut self, sql: &'a str) -> BoxFuture<'a, Result<Box<dyn RowReader + 'a>>> {
        Box::pin(async move {
            let rows = self
                .state
                .results
                .lock()
                .unwrap()
                .get(sql)
                .cloned()
                .ok_or_else(|| anyhow!("no such table in query: {sql}"))?;
            Ok(Box::new(rows) as Box<dyn RowReader + 'a>)
        })
    }

    fn execute<'a>(&'a mut self, sql: &'a str, params: &'a [Value]) -> BoxFuture<'a, Result<u64>> {
        Box::pin(async move {
            self.state
                .executed
                .lock()
                .unwrap()
                .push((sql.to_string(), params.to_vec()));
            Ok(1)
        })
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, Result<()>> {
        Box::pin(async move {
            self.state.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}
