mod common;

use std::sync::Arc;

use etlflow::context::ExecutionContext;
use etlflow::exec::{QueryExecutor, Task, TaskExecutor};
use etlflow::result::NodeStatus;
use etlflow_test_utils::{MemoryConnectionFactory, query_node};
use serde_json::json;

use common::TestResult;

#[tokio::test]
async fn query_returns_columns_rows_and_count() -> TestResult {
    let db = MemoryConnectionFactory::new().with_result(
        "SELECT id, name FROM orders WHERE region = 'eu'",
        &["id", "name"],
        vec![vec![json!(1), json!("a")], vec![json!(2), json!("b")]],
    );
    let executor = QueryExecutor::new(Arc::new(db.clone()));
    let node = query_node("q", "SELECT id, name FROM orders WHERE region = '${region}'");
    let ctx = ExecutionContext::default().with_variables([("region", "eu")]);

    let result = executor.execute(Task::top_level(&node), &ctx).await;

    assert_eq!(result.status, NodeStatus::Success, "{:?}", result.error);
    assert_eq!(result.rows_affected, Some(2));
    let output = result.output.ok_or("no output")?;
    assert_eq!(output["columns"], json!(["id", "name"]));
    assert_eq!(output["rows"][0], json!({ "id": 1, "name": "a" }));
    assert_eq!((db.opened(), db.closed()), (1, 1));
    Ok(())
}

#[tokio::test]
async fn blank_query_fails_without_connecting() {
    let db = MemoryConnectionFactory::new();
    let executor = QueryExecutor::new(Arc::new(db.clone()));
    let node = query_node("q", "   \n ");

    let result = executor
        .execute(Task::top_level(&node), &ExecutionContext::default())
        .await;

    assert_eq!(result.status, NodeStatus::Error);
    assert_eq!(db.opened(), 0);
}

#[tokio::test]
async fn failing_query_still_closes_the_connection() {
    let db = MemoryConnectionFactory::new();
    let executor = QueryExecutor::new(Arc::new(db.clone()));
    let node = query_node("q", "SELECT * FROM missing");

    let result = executor
        .execute(Task::top_level(&node), &ExecutionContext::default())
        .await;

    assert_eq!(result.status, NodeStatus::Error);
    let message = result.error.unwrap_or_default();
    assert!(message.contains("no such table"), "{message}");
    assert_eq!((db.opened(), db.closed()), (1, 1));
}

#[tokio::test]
async fn connection_failure_becomes_an_error_result() {
    let db = MemoryConnectionFactory::new().refusing("server unreachable");
    let executor = QueryExecutor::new(Arc::new(db));
    let node = query_node("q", "SELECT 1");

    let result = executor
        .execute(Task::top_level(&node), &ExecutionContext::default())
        .await;

    assert_eq!(result.status, NodeStatus::Error);
    assert!(result.error.unwrap_or_default().contains("server unreachable"));
}

#[tokio::test]
async fn query_runs_against_sqlite() -> TestResult {
    use etlflow::db::{ConnectionDescriptor, ConnectionFactory, SqliteConnectionFactory};

    let dir = tempfile::tempdir()?;
    let descriptor = ConnectionDescriptor::new(dir.path().join("w.db").to_string_lossy());
    let factory = SqliteConnectionFactory::new();
    let mut conn = factory.connect(&descriptor).await?;
    conn.execute("CREATE TABLE t (v INTEGER)", &[]).await?;
    for v in 0..3 {
        conn.execute("INSERT INTO t VALUES (?1)", &[json!(v)]).await?;
    }
    conn.close().await?;

    let executor = QueryExecutor::new(Arc::new(factory));
    let node = query_node("q", "SELECT v FROM t ORDER BY v");
    let ctx = ExecutionContext::new(descriptor);

    let result = executor.execute(Task::top_level(&node), &ctx).await;

    assert_eq!(result.status, NodeStatus::Success, "{:?}", result.error);
    assert_eq!(result.rows_affected, Some(3));
    Ok(())
}
