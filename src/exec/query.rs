// src/exec/query.rs

//! Query executor.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use futures::future::BoxFuture;
use tracing::{debug, info};

use super::{Task, TaskError, TaskExecutor, TaskOutcome, TaskOutput, seconds, settle, within};
use crate::context::ExecutionContext;
use crate::db::{self, ConnectionFactory, collect_rows};
use crate::model::{NodeKind, QueryConfig};
use crate::result::NodeResult;

/// Runs one SQL query on a connection opened for this call only. The
/// connection is closed on every exit path, timeout included.
pub struct QueryExecutor {
    connections: Arc<dyn ConnectionFactory>,
}

impl QueryExecutor {
    pub fn new(connections: Arc<dyn ConnectionFactory>) -> Self {
        Self { connections }
    }

    async fn run(&self, task: Task<'_>, ctx: &ExecutionContext) -> TaskOutcome {
        let NodeKind::Query(config) = &task.node.kind else {
            return Err(TaskError::Config(format!(
                "node '{}' is not a query node",
                task.node.id
            )));
        };
        self.run_query(task, config, ctx).await
    }

    async fn run_query(
        &self,
        task: Task<'_>,
        config: &QueryConfig,
        ctx: &ExecutionContext,
    ) -> TaskOutcome {
        if config.query.trim().is_empty() {
            return Err(TaskError::Config("SQL query is required".into()));
        }

        let sql = ctx.resolve(&config.query);
        debug!(node = %task.path, %sql, "running query");

        let mut conn = self
            .connections
            .connect(ctx.connection())
            .await
            .context("opening database connection")?;

        let limit = seconds(config.timeout);
        let outcome = within(
            limit,
            |d| format!("Query timed out after {} seconds", d.as_secs()),
            async {
                let mut reader = conn.query(&sql).await.context("executing query")?;
                let collected = collect_rows(reader.as_mut())
                    .await
                    .context("reading query results")?;
                Ok::<_, TaskError>(collected)
            },
        )
        .await;
        db::close_quietly(conn).await;

        let (value, rows) = outcome?;
        info!(node = %task.path, rows, "query finished");
        Ok(TaskOutput::empty().with_output(value).with_rows(rows))
    }
}

impl TaskExecutor for QueryExecutor {
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
