// src/exec/container.rs

//! Container executor: runs a nested sub-graph through the engine that owns
//! it, with the same execution context.

use std::sync::Weak;

use chrono::Utc;
use futures::future::BoxFuture;
use serde_json::json;
use tracing::{debug, info};

use super::{Task, TaskError, TaskExecutor, TaskOutput, settle};
use crate::context::ExecutionContext;
use crate::engine::ExecutionEngine;
use crate::model::{NodeKind, Project};
use crate::result::{ExecutionResult, NodeResult, NodeStatus, RunStatus};

/// Holds a weak handle so the engine and its container executor do not keep
/// each other alive.
pub struct ContainerExecutor {
    engine: Weak<ExecutionEngine>,
}

enum Nested {
    Finished(TaskOutput),
    Cancelled(String),
}

impl ContainerExecutor {
    pub fn new(engine: Weak<ExecutionEngine>) -> Self {
        Self { engine }
    }

    async fn run(&self, task: Task<'_>, ctx: &ExecutionContext) -> Result<Nested, TaskError> {
        let NodeKind::Container(config) = &task.node.kind else {
            return Err(TaskError::Config(format!(
                "node '{}' is not a container node",
                task.node.id
            )));
        };

        if config.nodes.is_empty() {
            debug!(node = %task.path, "empty container; nothing to run");
            return Ok(Nested::Finished(TaskOutput::empty()));
        }

        let engine = self
            .engine
            .upgrade()
            .ok_or_else(|| TaskError::failed("Execution engine is no longer available"))?;

        let sub = Project::from_subgraph(
            task.node.label(),
            config.nodes.clone(),
            config.connections.clone(),
        );

        info!(node = %task.path, nodes = sub.nodes.len(), "running container");
        let nested = engine
            .execute_scoped(&sub, ctx, Some(task.path))
            .await
            .map_err(|e| TaskError::failed(e.to_string()))?;

        match nested.status {
            RunStatus::Completed => Ok(Nested::Finished(summarize(&nested))),
            RunStatus::Cancelled => Ok(Nested::Cancelled(
                "Container execution was cancelled".to_string(),
            )),
            RunStatus::Failed | RunStatus::Running => {
                Err(TaskError::failed(first_error(&sub, &nested)))
            }
        }
    }
}

impl TaskExecutor for ContainerExecutor {
    fn execute<'a>(
        &'a self,
        task: Task<'a>,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, NodeResult> {
        Box::pin(async move {
            let started = Utc::now();
            match self.run(task, ctx).await {
                Ok(Nested::Finished(out)) => settle(task, started, Ok(out)),
                Ok(Nested::Cancelled(message)) => NodeResult {
                    start_time: started,
                    ..NodeResult::skipped(task.node.id.clone(), message)
                },
                Err(e) => settle(task, started, Err(e)),
            }
        })
    }
}

fn summarize(nested: &ExecutionResult) -> TaskOutput {
    let succeeded: Vec<&NodeResult> = nested
        .node_results
        .values()
        .filter(|r| r.status == NodeStatus::Success)
        .collect();
    let rows: u64 = succeeded.iter().filter_map(|r| r.rows_affected).sum();

    TaskOutput::empty()
        .with_output(json!({
            "tasksExecuted": nested.node_results.len(),
            "tasksSucceeded": succeeded.len(),
            "nestedResults": nested.node_results,
        }))
        .with_rows(rows)
}

/// The first error message in the sub-graph's node order.
fn first_error(sub: &Project, nested: &ExecutionResult) -> String {
    sub.nodes
        .iter()
        .filter_map(|node| nested.result(&node.id))
        .filter(|r| r.status == NodeStatus::Error)
        .find_map(|r| r.error.clone())
        .unwrap_or_else(|| "Container execution failed".to_string())
}
