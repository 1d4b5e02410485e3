// src/context.rs

//! Per-run shared state handed to every executor.
//!
//! One [`ExecutionContext`] is created by the caller for each run and shared
//! by reference with every task of that run, nested container runs
//! included. The maps are guarded only for memory safety: concurrent
//! writers to the same variable name within one batch still race and the
//! last write wins.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::db::ConnectionDescriptor;
use crate::variables;

/// Fire-and-forget sink for human-readable progress text.
pub type ProgressSink = Arc<dyn Fn(&str) + Send + Sync>;

pub struct ExecutionContext {
    variables: Mutex<HashMap<String, String>>,
    node_outputs: Mutex<HashMap<String, Value>>,
    connection: ConnectionDescriptor,
    cancellation: CancellationToken,
    progress: Option<ProgressSink>,
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("variables", &*lock(&self.variables))
            .field("connection", &self.connection)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(ConnectionDescriptor::default())
    }
}

impl ExecutionContext {
    pub fn new(connection: ConnectionDescriptor) -> Self {
        Self {
            variables: Mutex::new(HashMap::new()),
            node_outputs: Mutex::new(HashMap::new()),
            connection,
            cancellation: CancellationToken::new(),
            progress: None,
        }
    }

    pub fn with_variables<I, K, V>(self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        lock(&self.variables).extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn connection(&self) -> &ConnectionDescriptor {
        &self.connection
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Request cancellation. Takes effect at the next batch boundary.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn progress_sink(&self) -> Option<&ProgressSink> {
        self.progress.as_ref()
    }

    pub fn report_progress(&self, message: &str) {
        if let Some(sink) = &self.progress {
            sink(message);
        }
    }

    pub fn variable(&self, name: &str) -> Option<String> {
        lock(&self.variables).get(name).cloned()
    }

    pub fn set_variable(&self, name: impl Into<String>, value: impl Into<String>) {
        lock(&self.variables).insert(name.into(), value.into());
    }

    pub fn variables(&self) -> HashMap<String, String> {
        lock(&self.variables).clone()
    }

    /// Substitute `${name}` placeholders against the current variables.
    pub fn resolve(&self, template: &str) -> String {
        variables::resolve(template, &*lock(&self.variables))
    }

    pub fn output(&self, key: &str) -> Option<Value> {
        lock(&self.node_outputs).get(key).cloned()
    }

    /// Store a node's output under its (scoped) key.
    pub fn set_output(&self, key: impl Into<String>, value: Value) {
        lock(&self.node_outputs).insert(key.into(), value);
    }

    pub fn outputs(&self) -> HashMap<String, Value> {
        lock(&self.node_outputs).clone()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_uses_current_variables() {
        let ctx = ExecutionContext::default().with_variables([("table", "orders")]);
        assert_eq!(ctx.resolve("SELECT * FROM ${table}"), "SELECT * FROM orders");

        ctx.set_variable("table", "customers");
        assert_eq!(ctx.resolve("${table}"), "customers");
    }

    #[test]
    fn progress_sink_receives_messages() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let ctx = ExecutionContext::default().with_progress(Arc::new(move |msg: &str| {
            sink_seen.lock().unwrap().push(msg.to_string());
        }));

        ctx.report_progress("halfway");
        assert_eq!(*seen.lock().unwrap(), vec!["halfway".to_string()]);
    }

    #[test]
    fn cancel_sets_shared_token() {
        let token = CancellationToken::new();
        let ctx = ExecutionContext::default().with_cancellation(token.clone());
        assert!(!ctx.is_cancelled());
        ctx.cancel();
        assert!(token.is_cancelled());
    }
}
