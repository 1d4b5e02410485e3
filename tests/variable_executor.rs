mod common;

use std::sync::Arc;

use etlflow::context::ExecutionContext;
use etlflow::exec::{Task, TaskExecutor, VariableExecutor};
use etlflow::model::VariableSource;
use etlflow::prompt::{NonInteractivePrompter, Prompter};
use etlflow::result::NodeStatus;
use etlflow::variables::VariableStore;
use etlflow_test_utils::{MemoryConnectionFactory, variable_node};
use futures::future::BoxFuture;
use serde_json::{Value, json};

use common::TestResult;

struct FixedPrompter(Option<&'static str>);

impl Prompter for FixedPrompter {
    fn prompt_for_value<'a>(
        &'a self,
        _name: &'a str,
        _message: &'a str,
        _default: Option<&'a str>,
    ) -> BoxFuture<'a, Option<String>> {
        let answer = self.0.map(str::to_string);
        Box::pin(async move { answer })
    }
}

fn executor(
    db: &MemoryConnectionFactory,
    prompter: Arc<dyn Prompter>,
) -> (VariableExecutor, VariableStore) {
    let store = VariableStore::new();
    (
        VariableExecutor::new(Arc::new(db.clone()), prompter, store.clone()),
        store,
    )
}

#[tokio::test]
async fn static_value_is_resolved_and_written_twice() -> TestResult {
    let (exec, store) = executor(&MemoryConnectionFactory::new(), Arc::new(NonInteractivePrompter));
    let node = variable_node(
        "v",
        "table",
        VariableSource::Static {
            value: "orders_${year}".into(),
        },
    );
    let ctx = ExecutionContext::default().with_variables([("year", "2024")]);

    let result = exec.execute(Task::top_level(&node), &ctx).await;

    assert_eq!(result.status, NodeStatus::Success, "{:?}", result.error);
    assert_eq!(ctx.variable("table").as_deref(), Some("orders_2024"));
    assert_eq!(store.get("table").as_deref(), Some("orders_2024"));
    Ok(())
}

#[tokio::test]
async fn prompt_uses_host_answer() {
    let (exec, _) = executor(&MemoryConnectionFactory::new(), Arc::new(FixedPrompter(Some("42"))));
    let node = variable_node(
        "v",
        "limit",
        VariableSource::Prompt {
            message: Some("Row limit?".into()),
            default: Some("10".into()),
        },
    );
    let ctx = ExecutionContext::default();

    let result = exec.execute(Task::top_level(&node), &ctx).await;

    assert_eq!(result.status, NodeStatus::Success);
    assert_eq!(ctx.variable("limit").as_deref(), Some("42"));
}

#[tokio::test]
async fn prompt_without_answer_is_an_error() {
    let (exec, store) = executor(&MemoryConnectionFactory::new(), Arc::new(FixedPrompter(None)));
    let node = variable_node(
        "v",
        "limit",
        VariableSource::Prompt {
            message: None,
            default: None,
        },
    );
    let ctx = ExecutionContext::default();

    let result = exec.execute(Task::top_level(&node), &ctx).await;

    assert_eq!(result.status, NodeStatus::Error);
    assert_eq!(ctx.variable("limit"), None);
    assert_eq!(store.get("limit"), None);
}

#[tokio::test]
async fn non_interactive_prompt_falls_back_to_resolved_default() {
    let (exec, _) = executor(&MemoryConnectionFactory::new(), Arc::new(NonInteractivePrompter));
    let node = variable_node(
        "v",
        "day",
        VariableSource::Prompt {
            message: None,
            default: Some("${today}".into()),
        },
    );
    let ctx = ExecutionContext::default().with_variables([("today", "2024-05-01")]);

    let result = exec.execute(Task::top_level(&node), &ctx).await;

    assert_eq!(result.status, NodeStatus::Success);
    assert_eq!(ctx.variable("day").as_deref(), Some("2024-05-01"));
}

#[tokio::test]
async fn sql_takes_first_cell_of_first_row() -> TestResult {
    let db = MemoryConnectionFactory::new().with_result(
        "SELECT max(id) FROM orders",
        &["max"],
        vec![vec![json!(99)], vec![json!(1)]],
    );
    let (exec, _) = executor(&db, Arc::new(NonInteractivePrompter));
    let node = variable_node(
        "v",
        "last_id",
        VariableSource::Sql {
            query: "SELECT max(id) FROM orders".into(),
        },
    );
    let ctx = ExecutionContext::default();

    let result = exec.execute(Task::top_level(&node), &ctx).await;

    assert_eq!(result.status, NodeStatus::Success, "{:?}", result.error);
    assert_eq!(ctx.variable("last_id").as_deref(), Some("99"));
    assert_eq!(
        result.output.ok_or("no output")?,
        json!({ "name": "last_id", "value": "99" })
    );
    assert_eq!((db.opened(), db.closed()), (1, 1));
    Ok(())
}

#[tokio::test]
async fn sql_without_rows_or_with_null_is_an_error() {
    let db = MemoryConnectionFactory::new()
        .with_result("SELECT none", &["v"], vec![])
        .with_result("SELECT null", &["v"], vec![vec![Value::Null]]);
    let (exec, _) = executor(&db, Arc::new(NonInteractivePrompter));
    let ctx = ExecutionContext::default();

    for query in ["SELECT none", "SELECT null"] {
        let node = variable_node(
            "v",
            "x",
            VariableSource::Sql {
                query: query.into(),
            },
        );
        let result = exec.execute(Task::top_level(&node), &ctx).await;
        assert_eq!(result.status, NodeStatus::Error, "{query}");
    }
    assert_eq!(ctx.variable("x"), None);
    assert_eq!((db.opened(), db.closed()), (2, 2));
}
