// src/exec/mod.rs

//! Task execution layer.
//!
//! Every node type is run by a [`TaskExecutor`]. The engine looks the
//! executor up by [`NodeType`] and awaits the returned future; an executor
//! never fails outward, it always settles with a [`NodeResult`].
//!
//! - [`query`] runs a SQL query and returns `{ columns, rows }`.
//! - [`script`] writes/runs a script through an interpreter process.
//! - [`transfer`] holds the export and import executors.
//! - [`variable`] assigns a run variable from a literal, a prompt or SQL.
//! - [`container`] runs a nested sub-graph through the same engine.

pub mod container;
pub mod query;
pub mod script;
pub mod transfer;
pub mod variable;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::context::ExecutionContext;
use crate::db::ConnectionFactory;
use crate::model::Node;
use crate::prompt::Prompter;
use crate::result::NodeResult;
use crate::transfer::TransferStrategy;
use crate::types::NodeType;
use crate::variables::VariableStore;

pub use container::ContainerExecutor;
pub use query::QueryExecutor;
pub use script::{ScriptExecutor, ScriptSettings};
pub use transfer::{ExportExecutor, ImportExecutor};
pub use variable::VariableExecutor;

/// One invocation of an executor.
///
/// `path` is the node's scoped id: equal to `node.id` at the top level and
/// `parent/child` inside containers. Executors use it for anything keyed
/// in shared run state; the [`NodeResult`] carries the local `node.id`.
#[derive(Debug, Clone, Copy)]
pub struct Task<'a> {
    pub node: &'a Node,
    pub path: &'a str,
}

impl<'a> Task<'a> {
    pub fn new(node: &'a Node, path: &'a str) -> Self {
        Self { node, path }
    }

    /// A top-level invocation where the scoped id is the node id.
    pub fn top_level(node: &'a Node) -> Self {
        Self {
            node,
            path: &node.id,
        }
    }
}

/// Uniform executor contract.
pub trait TaskExecutor: Send + Sync {
    fn execute<'a>(
        &'a self,
        task: Task<'a>,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, NodeResult>;
}

/// Why a task body stopped.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The node's configuration is unusable; no I/O was attempted.
    #[error("{0}")]
    Config(String),

    /// The operation ran and failed. `output` keeps whatever diagnostic
    /// output was produced.
    #[error("{message}")]
    Failed {
        message: String,
        output: Option<Value>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskError {
    pub fn failed(message: impl Into<String>) -> Self {
        TaskError::Failed {
            message: message.into(),
            output: None,
        }
    }

    /// Message surfaced on the node result. Wrapped errors include their
    /// context chain.
    pub fn message(&self) -> String {
        match self {
            TaskError::Other(e) => format!("{e:#}"),
            other => other.to_string(),
        }
    }
}

/// Successful task body output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskOutput {
    pub output: Option<Value>,
    pub rows_affected: Option<u64>,
}

impl TaskOutput {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_rows(mut self, rows: u64) -> Self {
        self.rows_affected = Some(rows);
        self
    }
}

pub type TaskOutcome = std::result::Result<TaskOutput, TaskError>;

/// Turn a task body's outcome into the node's terminal result.
pub fn settle(task: Task<'_>, started: DateTime<Utc>, outcome: TaskOutcome) -> NodeResult {
    match outcome {
        Ok(out) => {
            debug!(node = %task.path, rows = ?out.rows_affected, "task succeeded");
            let mut result = NodeResult::success(task.node.id.clone(), started);
            result.output = out.output;
            result.rows_affected = out.rows_affected;
            result
        }
        Err(err) => {
            let message = err.message();
            warn!(node = %task.path, error = %message, "task failed");
            let output = match err {
                TaskError::Failed { output, .. } => output,
                _ => None,
            };
            let mut result = NodeResult::error(task.node.id.clone(), started, message);
            result.output = output;
            result
        }
    }
}

/// Run an async task body under an optional timeout, mapping expiry to a
/// failure with the given message.
pub(crate) async fn within<T>(
    timeout: Option<Duration>,
    on_timeout: impl FnOnce(Duration) -> String,
    body: impl Future<Output = Result<T, TaskError>>,
) -> Result<T, TaskError> {
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, body).await {
            Ok(res) => res,
            Err(_) => Err(TaskError::failed(on_timeout(limit))),
        },
        None => body.await,
    }
}

/// Seconds from node configuration to a `Duration`. Zero means no limit.
pub(crate) fn seconds(value: Option<u64>) -> Option<Duration> {
    value.filter(|s| *s > 0).map(Duration::from_secs)
}

/// Collaborators needed by the built-in executors.
#[derive(Clone)]
pub struct Services {
    pub connections: Arc<dyn ConnectionFactory>,
    pub transfer: Arc<dyn TransferStrategy>,
    pub prompter: Arc<dyn Prompter>,
    pub variables: VariableStore,
    pub script: ScriptSettings,
}

/// The five leaf executors keyed by node type. The container executor needs
/// the engine itself and is registered by the engine builder.
pub fn builtin_executors(services: &Services) -> Vec<(NodeType, Arc<dyn TaskExecutor>)> {
    vec![
        (
            NodeType::Query,
            Arc::new(QueryExecutor::new(Arc::clone(&services.connections))) as Arc<dyn TaskExecutor>,
        ),
        (
            NodeType::Script,
            Arc::new(ScriptExecutor::new(services.script.clone())),
        ),
        (
            NodeType::Export,
            Arc::new(ExportExecutor::new(Arc::clone(&services.transfer))),
        ),
        (
            NodeType::Import,
            Arc::new(ImportExecutor::new(Arc::clone(&services.transfer))),
        ),
        (
            NodeType::Variable,
            Arc::new(VariableExecutor::new(
                Arc::clone(&services.connections),
                Arc::clone(&services.prompter),
                services.variables.clone(),
            )),
        ),
    ]
}
