// src/lib.rs

pub mod cli;
pub mod config;
pub mod context;
pub mod db;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod model;
pub mod prompt;
pub mod result;
pub mod store;
pub mod transfer;
pub mod types;
pub mod validate;
pub mod variables;

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cli::CliArgs;
use crate::config::{RunnerConfig, load_runner_config};
use crate::context::ExecutionContext;
use crate::db::SqliteConnectionFactory;
use crate::engine::{ExecutionEngine, build_batches};
use crate::exec::Services;
use crate::fs::RealFileSystem;
use crate::model::Project;
use crate::prompt::{NonInteractivePrompter, Prompter, TerminalPrompter};
use crate::result::{ExecutionResult, NodeStatus, RunStatus};
use crate::store::ProjectStore;
use crate::transfer::DelimitedTextTransfer;
use crate::validate::{topological_order, validate_project};
use crate::variables::VariableStore;

/// High-level entry point used by `main.rs`.
///
/// Loads the runner config and the project, then either prints the plan
/// (`--dry-run`) or runs the project and prints a summary. Returns the
/// overall run status.
pub async fn run(args: CliArgs) -> Result<RunStatus> {
    let config = load_runner_config(args.config.as_deref())?;

    let mut store = ProjectStore::default();
    let project = store.load_project(&args.project)?.clone();
    info!(project = %project.name, path = %args.project.display(), "project loaded");

    if args.dry_run {
        print_dry_run(&project)?;
        return Ok(RunStatus::Completed);
    }

    let engine = build_engine(&config, args.non_interactive);

    let cancel = CancellationToken::new();
    let ctx = ExecutionContext::new(config.connection.clone())
        .with_variables(project.variables.clone())
        .with_variables(config.variables.clone())
        .with_variables(args.vars.clone())
        .with_cancellation(cancel.clone())
        .with_progress(Arc::new(|message: &str| info!(progress = %message)));

    // Ctrl-C → stop before the next batch.
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            warn!("cancellation requested; the current batch will finish first");
            cancel.cancel();
        });
    }

    let result = match engine.execute(&project, &ctx).await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "engine failure");
            let mut failed = ExecutionResult::start(&project.name);
            failed.finish(RunStatus::Failed);
            failed
        }
    };

    print_summary(&project, &result);
    Ok(result.status)
}

/// Engine with every built-in executor wired to the production
/// collaborators.
pub fn build_engine(config: &RunnerConfig, non_interactive: bool) -> Arc<ExecutionEngine> {
    let connections = Arc::new(SqliteConnectionFactory::new());
    let prompter: Arc<dyn Prompter> = if non_interactive {
        Arc::new(NonInteractivePrompter)
    } else {
        Arc::new(TerminalPrompter)
    };

    let services = Services {
        connections: connections.clone(),
        transfer: Arc::new(DelimitedTextTransfer::new(
            connections,
            Arc::new(RealFileSystem),
        )),
        prompter,
        variables: VariableStore::new(),
        script: config.script.clone(),
    };

    ExecutionEngine::builder()
        .with_builtin_executors(&services)
        .on_status_change(|node, status, message| match (status, message) {
            (NodeStatus::Error, Some(msg)) => warn!(%node, %status, error = %msg, "node finished"),
            (NodeStatus::Skipped, msg) => info!(%node, %status, reason = msg.unwrap_or(""), "node skipped"),
            (status, _) if status.is_terminal() => info!(%node, %status, "node finished"),
            (status, _) => debug!(%node, %status, "node status"),
        })
        .build()
}

/// Print validation warnings, the batch plan and the flat order.
fn print_dry_run(project: &Project) -> Result<()> {
    let report = validate_project(project);
    let batches = build_batches(project)?;

    println!("etlflow dry-run");
    println!("  project = {} (version {})", project.name, project.version);
    println!("  nodes = {}", project.nodes.len());
    println!("  connections = {}", project.connections.len());
    if !project.variables.is_empty() {
        println!("  variables = {:?}", project.variables.keys().collect::<Vec<_>>());
    }
    println!();

    if !report.warnings.is_empty() {
        println!("warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  - {warning}");
        }
        println!();
    }

    println!("batches ({}):", batches.len());
    for (index, batch) in batches.iter().enumerate() {
        println!("  {}:", index + 1);
        for id in batch {
            if let Some(node) = project.node(id) {
                println!("      {id} [{}] {}", node.node_type(), node.name);
            }
        }
    }

    if let Some(order) = topological_order(project) {
        println!();
        println!("order: {}", order.join(" -> "));
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}

fn print_summary(project: &Project, result: &ExecutionResult) {
    println!();
    println!("project {}: {}", project.name, result.status);
    for node in &project.nodes {
        let Some(node_result) = result.result(&node.id) else {
            println!("  {:<24} not run", node.id);
            continue;
        };
        let mut line = format!("  {:<24} {}", node.id, node_result.status);
        if let Some(rows) = node_result.rows_affected {
            line.push_str(&format!(" ({rows} rows)"));
        }
        if let Some(duration) = node_result.duration() {
            line.push_str(&format!(" in {}ms", duration.num_milliseconds()));
        }
        if let Some(err) = &node_result.error {
            line.push_str(&format!(": {err}"));
        }
        println!("{line}");
    }
    if let Some(duration) = result.duration() {
        println!("finished in {}ms", duration.num_milliseconds());
    }
}
