// src/exec/transfer.rs

//! Export and import executors.
//!
//! Both resolve variables in their paths and query, check their required
//! fields before any I/O, and delegate the file work to a
//! [`TransferStrategy`].

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use serde_json::json;
use tracing::debug;

use super::{Task, TaskError, TaskExecutor, TaskOutcome, TaskOutput, seconds, settle};
use crate::context::ExecutionContext;
use crate::model::NodeKind;
use crate::result::NodeResult;
use crate::transfer::{ExportRequest, ImportRequest, TransferReport, TransferStrategy};

pub struct ExportExecutor {
    strategy: Arc<dyn TransferStrategy>,
}

impl ExportExecutor {
    pub fn new(strategy: Arc<dyn TransferStrategy>) -> Self {
        Self { strategy }
    }

    async fn run(&self, task: Task<'_>, ctx: &ExecutionContext) -> TaskOutcome {
        let NodeKind::Export(config) = &task.node.kind else {
            return Err(TaskError::Config(format!(
                "node '{}' is not an export node",
                task.node.id
            )));
        };

        let output_path = ctx.resolve(&config.output_path);
        if output_path.trim().is_empty() {
            return Err(TaskError::Config("Output path is required".into()));
        }

        if config.use_previous_output {
            return Err(TaskError::Config(
                "Exporting the previous node's output is not implemented; configure a query instead"
                    .into(),
            ));
        }

        let query = config
            .query
            .as_deref()
            .map(|q| ctx.resolve(q))
            .unwrap_or_default();
        if query.trim().is_empty() {
            return Err(TaskError::Config("Export query is required".into()));
        }

        debug!(node = %task.path, path = %output_path, format = %config.format, "exporting");
        let report = self
            .strategy
            .export(ExportRequest {
                connection: ctx.connection(),
                query: &query,
                output_path: Path::new(&output_path),
                format: config.format,
                timeout: seconds(config.timeout),
                on_progress: ctx.progress_sink(),
            })
            .await?;

        into_outcome(report, "Export failed")
    }
}

impl TaskExecutor for ExportExecutor {
    fn execute<'a>(
        &'a self,
        task: Task<'a>,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, NodeResult> {
        Box::pin(async move {
            let started = Utc::now();
            let outcome = self.run(task, ctx).await;
            settle(task, started, outcome)
        })
    }
}

pub struct ImportExecutor {
    strategy: Arc<dyn TransferStrategy>,
}

impl ImportExecutor {
    pub fn new(strategy: Arc<dyn TransferStrategy>) -> Self {
        Self { strategy }
    }

    async fn run(&self, task: Task<'_>, ctx: &ExecutionContext) -> TaskOutcome {
        let NodeKind::Import(config) = &task.node.kind else {
            return Err(TaskError::Config(format!(
                "node '{}' is not an import node",
                task.node.id
            )));
        };

        let source_path = ctx.resolve(&config.source_path);
        if source_path.trim().is_empty() {
            return Err(TaskError::Config("Source path is required".into()));
        }
        let target_table = ctx.resolve(&config.target_table);
        if target_table.trim().is_empty() {
            return Err(TaskError::Config("Target table is required".into()));
        }

        debug!(node = %task.path, source = %source_path, table = %target_table, "importing");
        let report = self
            .strategy
            .import(ImportRequest {
                connection: ctx.connection(),
                source_path: Path::new(&source_path),
                target_table: &target_table,
                format: config.format,
                timeout: seconds(config.timeout),
                on_progress: ctx.progress_sink(),
            })
            .await?;

        into_outcome(report, "Import failed")
    }
}

impl TaskExecutor for ImportExecutor {
    fn execute<'a>(
        &'a self,
        task: Task<'a>,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, NodeResult> {
        Box::pin(async move {
            let started = Utc::now();
            let outcome = self.run(task, ctx).await;
            settle(task, started, outcome)
        })
    }
}

fn into_outcome(report: TransferReport, fallback: &str) -> TaskOutcome {
    if !report.success {
        return Err(TaskError::failed(
            report.message.unwrap_or_else(|| fallback.to_string()),
        ));
    }

    let mut out = TaskOutput::empty().with_output(json!({
        "message": report.message,
        "rows": report.rows,
    }));
    if let Some(rows) = report.rows {
        out = out.with_rows(rows);
    }
    Ok(out)
}
