use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;
use serde_json::Value;

use etlflow::context::ExecutionContext;
use etlflow::exec::{Task, TaskExecutor};
use etlflow::result::{NodeResult, NodeStatus};

/// What the stub does for one node id.
#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed,
    SucceedWith { output: Option<Value>, rows: Option<u64> },
    Fail(String),
    /// Sleep, then apply the inner behavior.
    Delay(Duration, Box<Behavior>),
    /// Cancel the run's token, then succeed.
    CancelRun,
}

/// A fake executor that:
/// - records which nodes were run (by scoped id, in call order)
/// - settles each node according to its scripted `Behavior`
///   (`Succeed` when none was set)
/// - tracks how many calls were in flight at once.
#[derive(Default)]
pub struct StubExecutor {
    behaviors: Mutex<HashMap<String, Behavior>>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, node_id: &str, behavior: Behavior) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(node_id.to_string(), behavior);
    }

    pub fn fail(&self, node_id: &str, message: &str) {
        self.set(node_id, Behavior::Fail(message.to_string()));
    }

    pub fn delay(&self, node_id: &str, millis: u64) {
        self.set(
            node_id,
            Behavior::Delay(Duration::from_millis(millis), Box::new(Behavior::Succeed)),
        );
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn was_called(&self, path: &str) -> bool {
        self.calls.lock().unwrap().iter().any(|c| c == path)
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn behavior_for(&self, node_id: &str) -> Behavior {
        self.behaviors
            .lock()
            .unwrap()
            .get(node_id)
            .cloned()
            .unwrap_or(Behavior::Succeed)
    }
}

impl TaskExecutor for StubExecutor {
    fn execute<'a>(
        &'a self,
        task: Task<'a>,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, NodeResult> {
        Box::pin(async move {
            let started = Utc::now();
            self.calls.lock().unwrap().push(task.path.to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let mut behavior = self.behavior_for(&task.node.id);
            let result = loop {
                match behavior {
                    Behavior::Succeed => break NodeResult::success(task.node.id.clone(), started),
                    Behavior::SucceedWith { output, rows } => {
                        let mut r = NodeResult::success(task.node.id.clone(), started);
                        r.output = output;
                        r.rows_affected = rows;
                        break r;
                    }
                    Behavior::Fail(message) => {
                        break NodeResult::error(task.node.id.clone(), started, message);
                    }
                    Behavior::Delay(wait, next) => {
                        tokio::time::sleep(wait).await;
                        behavior = *next;
                    }
                    Behavior::CancelRun => {
                        ctx.cancel();
                        break NodeResult::success(task.node.id.clone(), started);
                    }
                }
            };

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        })
    }
}

/// One status callback invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub node: String,
    pub status: NodeStatus,
    pub message: Option<String>,
}

/// Collects status callback invocations.
#[derive(Debug, Clone, Default)]
pub struct StatusRecorder {
    events: Arc<Mutex<Vec<StatusEvent>>>,
}

impl StatusRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Callback to hand to `EngineBuilder::on_status_change`.
    pub fn callback(&self) -> impl Fn(&str, NodeStatus, Option<&str>) + Send + Sync + 'static {
        let events = Arc::clone(&self.events);
        move |node: &str, status: NodeStatus, message: Option<&str>| {
            events.lock().unwrap().push(StatusEvent {
                node: node.to_string(),
                status,
                message: message.map(str::to_string),
            });
        }
    }

    pub fn events(&self) -> Vec<StatusEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Statuses reported for one scoped id, in order.
    pub fn statuses_for(&self, node: &str) -> Vec<NodeStatus> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.node == node)
            .map(|e| e.status)
            .collect()
    }
}
