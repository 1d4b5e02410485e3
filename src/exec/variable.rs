// src/exec/variable.rs

//! Variable-assignment executor.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use futures::future::BoxFuture;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::{Task, TaskError, TaskExecutor, TaskOutcome, TaskOutput, settle};
use crate::context::ExecutionContext;
use crate::db::{self, ConnectionFactory};
use crate::model::{NodeKind, VariableSource};
use crate::prompt::Prompter;
use crate::result::NodeResult;
use crate::variables::VariableStore;

/// Assigns one variable from a literal, a host prompt, or the first cell of
/// a query. The value is written to the shared [`VariableStore`] and to the
/// run context.
pub struct VariableExecutor {
    connections: Arc<dyn ConnectionFactory>,
    prompter: Arc<dyn Prompter>,
    store: VariableStore,
}

impl VariableExecutor {
    pub fn new(
        connections: Arc<dyn ConnectionFactory>,
        prompter: Arc<dyn Prompter>,
        store: VariableStore,
    ) -> Self {
        Self {
            connections,
            prompter,
            store,
        }
    }

    async fn run(&self, task: Task<'_>, ctx: &ExecutionContext) -> TaskOutcome {
        let NodeKind::Variable(config) = &task.node.kind else {
            return Err(TaskError::Config(format!(
                "node '{}' is not a variable node",
                task.node.id
            )));
        };

        let name = config.variable_name.trim();
        if name.is_empty() {
            return Err(TaskError::Config("Variable name is required".into()));
        }

        let value = match &config.source {
            VariableSource::Static { value } => ctx.resolve(value),
            VariableSource::Prompt { message, default } => {
                let message = message.as_deref().map(|m| ctx.resolve(m)).unwrap_or_default();
                let default = default.as_deref().map(|d| ctx.resolve(d));
                self.prompter
                    .prompt_for_value(name, &message, default.as_deref())
                    .await
                    .ok_or_else(|| {
                        TaskError::failed(format!("No value provided for variable '{name}'"))
                    })?
            }
            VariableSource::Sql { query } => self.query_value(query, ctx).await?,
        };

        self.store.set(name, value.clone());
        ctx.set_variable(name, value.clone());
        info!(node = %task.path, variable = %name, "variable assigned");

        Ok(TaskOutput::empty().with_output(json!({ "name": name, "value": value })))
    }

    async fn query_value(&self, query: &str, ctx: &ExecutionContext) -> Result<String, TaskError> {
        if query.trim().is_empty() {
            return Err(TaskError::Config("SQL query is required".into()));
        }
        let sql = ctx.resolve(query);
        debug!(%sql, "reading variable from query");

        let mut conn = self
            .connections
            .connect(ctx.connection())
            .await
            .context("opening database connection")?;

        let outcome = async {
            let mut reader = conn.query(&sql).await.context("executing query")?;
            if !reader.read().await.context("reading query results")? {
                return Err(TaskError::failed("SQL query returned no rows"));
            }
            match reader.value(0) {
                Value::Null => Err(TaskError::failed("SQL query returned NULL")),
                value => Ok(db::value_to_text(&value)),
            }
        }
        .await;
        db::close_quietly(conn).await;

        outcome
    }
}

impl TaskExecutor for VariableExecutor {
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
