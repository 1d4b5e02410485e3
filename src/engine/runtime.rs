// src/engine/runtime.rs

use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use tracing::{debug, info, warn};

use crate::context::ExecutionContext;
use crate::errors::Result;
use crate::exec::{Task, TaskExecutor};
use crate::model::{Node, Project};
use crate::result::{ExecutionResult, NodeResult, NodeStatus, RunStatus};
use crate::types::NodeType;

use super::plan::plan_batches;
use super::{StatusCallback, scoped_id};

/// Runs a project batch by batch.
///
/// Nodes of one batch are awaited together on the calling task, so
/// "parallel" means interleaved waits, not separate threads. A batch is
/// always allowed to settle completely; failure and cancellation only take
/// effect between batches.
pub struct ExecutionEngine {
    pub(super) executors: HashMap<NodeType, Arc<dyn TaskExecutor>>,
    pub(super) on_status: Option<StatusCallback>,
}

impl fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut registered: Vec<_> = self.executors.keys().copied().collect();
        registered.sort();
        f.debug_struct("ExecutionEngine")
            .field("executors", &registered)
            .field("has_status_callback", &self.on_status.is_some())
            .finish()
    }
}

impl ExecutionEngine {
    pub fn has_executor(&self, node_type: NodeType) -> bool {
        self.executors.contains_key(&node_type)
    }

    /// Run a top-level project.
    pub fn execute<'a>(
        &'a self,
        project: &'a Project,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<ExecutionResult>> {
        self.execute_scoped(project, ctx, None)
    }

    /// Run a project whose node ids live under `scope`.
    ///
    /// Status callbacks and `ctx` outputs use `scope/id` keys; the returned
    /// result is keyed by the local ids. `Err` is only returned for an
    /// engine-level failure (a cycle found while planning).
    pub fn execute_scoped<'a>(
        &'a self,
        project: &'a Project,
        ctx: &'a ExecutionContext,
        scope: Option<&'a str>,
    ) -> BoxFuture<'a, Result<ExecutionResult>> {
        Box::pin(self.run(project, ctx, scope))
    }

    async fn run(
        &self,
        project: &Project,
        ctx: &ExecutionContext,
        scope: Option<&str>,
    ) -> Result<ExecutionResult> {
        let mut result = ExecutionResult::start(&project.name);
        info!(
            project = %project.name,
            scope = scope.unwrap_or(""),
            nodes = project.nodes.len(),
            "execution started"
        );

        for node in &project.nodes {
            self.emit(&scoped_id(scope, &node.id), NodeStatus::Pending, None);
        }

        let batches = plan_batches(&project.nodes, &project.connections)?;
        debug!(project = %project.name, batches = batches.len(), "execution plan built");

        for (index, batch) in batches.iter().enumerate() {
            if ctx.is_cancelled() {
                info!(
                    project = %project.name,
                    batch = index,
                    "cancellation requested; stopping before batch"
                );
                result.finish(RunStatus::Cancelled);
                return Ok(result);
            }

            debug!(project = %project.name, batch = index, size = batch.len(), "starting batch");
            let settled = join_all(
                batch
                    .iter()
                    .map(|&i| self.run_node(&project.nodes[i], ctx, scope)),
            )
            .await;

            let mut failed = false;
            for node_result in settled {
                if let Some(output) = &node_result.output {
                    ctx.set_output(scoped_id(scope, &node_result.node_id), output.clone());
                }
                failed |= node_result.status == NodeStatus::Error;
                result
                    .node_results
                    .insert(node_result.node_id.clone(), node_result);
            }

            if failed {
                let unresolved = batches[index..]
                    .iter()
                    .flatten()
                    .map(|&i| &project.nodes[i])
                    .filter(|node| !result.node_results.contains_key(&node.id))
                    .collect::<Vec<_>>();
                warn!(
                    project = %project.name,
                    batch = index,
                    skipped = unresolved.len(),
                    "task failed; skipping remaining tasks"
                );
                for node in unresolved {
                    self.skip(node, scope, &mut result);
                }
                result.finish(RunStatus::Failed);
                return Ok(result);
            }
        }

        result.finish(RunStatus::Completed);
        info!(
            project = %project.name,
            succeeded = result.count(NodeStatus::Success),
            "execution completed"
        );
        Ok(result)
    }

    async fn run_node(&self, node: &Node, ctx: &ExecutionContext, scope: Option<&str>) -> NodeResult {
        let path = scoped_id(scope, &node.id);
        self.emit(&path, NodeStatus::Running, None);
        let started = Utc::now();

        let result = match self.executors.get(&node.node_type()) {
            None => NodeResult::error(
                node.id.clone(),
                started,
                format!("No executor registered for node type: {}", node.node_type()),
            ),
            Some(executor) => {
                let call = executor.execute(Task::new(node, &path), ctx);
                match AssertUnwindSafe(call).catch_unwind().await {
                    Ok(result) => result,
                    Err(_) => NodeResult::error(
                        node.id.clone(),
                        started,
                        format!("Executor for node type {} panicked", node.node_type()),
                    ),
                }
            }
        };

        self.emit(&path, result.status, result.error.as_deref());
        result
    }

    fn skip(&self, node: &Node, scope: Option<&str>, result: &mut ExecutionResult) {
        let message = "Skipped because an earlier task failed";
        self.emit(&scoped_id(scope, &node.id), NodeStatus::Skipped, Some(message));
        result
            .node_results
            .insert(node.id.clone(), NodeResult::skipped(node.id.clone(), message));
    }

    fn emit(&self, path: &str, status: NodeStatus, message: Option<&str>) {
        debug!(node = %path, %status, "status change");
        if let Some(callback) = &self.on_status {
            callback(path, status, message);
        }
    }
}
