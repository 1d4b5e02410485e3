mod common;

use std::sync::Arc;

use etlflow::context::ExecutionContext;
use etlflow::engine::ExecutionEngine;
use etlflow::errors::EtlError;
use etlflow::model::{Connection, Project};
use etlflow::result::{NodeStatus, RunStatus};
use etlflow_test_utils::{
    Behavior, ProjectBuilder, StatusRecorder, StubExecutor, script_node, stub_node,
};
use tokio_util::sync::CancellationToken;

use common::{TestResult, stub_engine};

#[tokio::test]
async fn failure_skips_downstream_and_fails_the_run() -> TestResult {
    let project = ProjectBuilder::new("d")
        .stubs(&["1", "2"])
        .edge("1", "2")
        .build();
    let stub = StubExecutor::new();
    stub.fail("1", "connection refused");
    let (engine, recorder) = stub_engine(&stub);

    let result = engine
        .execute(&project, &ExecutionContext::default())
        .await?;

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.status_of("1"), Some(NodeStatus::Error));
    assert_eq!(
        result.result("1").and_then(|r| r.error.as_deref()),
        Some("connection refused")
    );
    assert_eq!(result.status_of("2"), Some(NodeStatus::Skipped));
    assert!(!stub.was_called("2"));
    assert_eq!(
        recorder.statuses_for("2"),
        vec![NodeStatus::Pending, NodeStatus::Skipped]
    );
    Ok(())
}

#[tokio::test]
async fn running_sibling_finishes_before_the_run_stops() -> TestResult {
    // 1 fails fast, 2 is slow in the same batch; 3 depends on both.
    let project = ProjectBuilder::new("siblings")
        .stubs(&["1", "2", "3", "4"])
        .edge("1", "3")
        .edge("2", "3")
        .edge("3", "4")
        .build();
    let stub = StubExecutor::new();
    stub.fail("1", "boom");
    stub.delay("2", 50);
    let (engine, _) = stub_engine(&stub);

    let result = engine
        .execute(&project, &ExecutionContext::default())
        .await?;

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.status_of("2"), Some(NodeStatus::Success));
    assert_eq!(result.status_of("3"), Some(NodeStatus::Skipped));
    assert_eq!(result.status_of("4"), Some(NodeStatus::Skipped));
    // Every node ends with a terminal result.
    assert_eq!(result.node_results.len(), 4);
    assert!(result.node_results.values().all(|r| r.status.is_terminal()));
    Ok(())
}

#[tokio::test]
async fn unregistered_type_fails_without_calling_anything() -> TestResult {
    let project = ProjectBuilder::new("missing")
        .node(script_node("s", "echo hi"))
        .node(stub_node("after"))
        .edge("s", "after")
        .build();
    let stub = StubExecutor::new();
    let (engine, _) = stub_engine(&stub);

    let result = engine
        .execute(&project, &ExecutionContext::default())
        .await?;

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(
        result.result("s").and_then(|r| r.error.as_deref()),
        Some("No executor registered for node type: script")
    );
    assert!(stub.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn cancelled_token_stops_before_first_batch() -> TestResult {
    let project = ProjectBuilder::new("cancel").stubs(&["a", "b"]).build();
    let stub = StubExecutor::new();
    let (engine, _) = stub_engine(&stub);

    let token = CancellationToken::new();
    token.cancel();
    let ctx = ExecutionContext::default().with_cancellation(token);

    let result = engine.execute(&project, &ctx).await?;

    assert_eq!(result.status, RunStatus::Cancelled);
    assert!(result.node_results.is_empty());
    assert!(result.end_time.is_some());
    assert!(stub.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn cancellation_takes_effect_at_the_next_batch() -> TestResult {
    let project = ProjectBuilder::new("cancel-mid")
        .stubs(&["a", "slow", "b"])
        .edge("a", "b")
        .edge("slow", "b")
        .build();
    let stub = StubExecutor::new();
    stub.set("a", Behavior::CancelRun);
    stub.delay("slow", 30);
    let (engine, _) = stub_engine(&stub);
    let ctx = ExecutionContext::default();

    let result = engine.execute(&project, &ctx).await?;

    assert_eq!(result.status, RunStatus::Cancelled);
    // The in-flight sibling still completed.
    assert_eq!(result.status_of("slow"), Some(NodeStatus::Success));
    // Nodes of batches that never started keep no result.
    assert_eq!(result.result("b"), None);
    assert!(!stub.was_called("b"));
    Ok(())
}

#[tokio::test]
async fn runtime_cycle_is_an_engine_error() -> TestResult {
    let mut project = ProjectBuilder::new("cyclic").stubs(&["x", "y"]).build();
    project.connections = vec![Connection::new("x", "y"), Connection::new("y", "x")];

    let stub = StubExecutor::new();
    let (engine, _) = stub_engine(&stub);

    let err = engine
        .execute(&project, &ExecutionContext::default())
        .await
        .unwrap_err();

    assert!(matches!(err, EtlError::Engine(_)));
    assert!(stub.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn engine_without_executors_still_reports_each_node() -> TestResult {
    let recorder = StatusRecorder::new();
    let engine: Arc<ExecutionEngine> = ExecutionEngine::builder()
        .on_status_change(recorder.callback())
        .build();
    let mut project = Project::new("bare");
    project.nodes.push(stub_node("q"));

    let result = engine
        .execute(&project, &ExecutionContext::default())
        .await?;

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(
        recorder.statuses_for("q"),
        vec![NodeStatus::Pending, NodeStatus::Running, NodeStatus::Error]
    );
    Ok(())
}
