// src/engine/mod.rs

//! Execution engine.
//!
//! - [`plan`] turns a graph into ordered batches (pure, synchronous).
//! - [`runtime`] holds the [`ExecutionEngine`] that runs those batches
//!   against the registered executors.
//!
//! Engines are built through [`EngineBuilder`], which also wires the
//! container executor back to the engine it belongs to.

pub mod plan;
pub mod runtime;

use std::collections::HashMap;
use std::sync::Arc;

use crate::exec::{ContainerExecutor, Services, TaskExecutor, builtin_executors};
use crate::result::NodeStatus;
use crate::types::NodeType;

pub use plan::{build_batches, plan_batches};
pub use runtime::ExecutionEngine;

/// `(scoped node id, new status, optional message)`, called synchronously
/// at every node state transition.
pub type StatusCallback = Arc<dyn Fn(&str, NodeStatus, Option<&str>) + Send + Sync>;

/// Key for a node inside a (possibly nested) run: the bare id at the top
/// level, `scope/id` below.
pub fn scoped_id(scope: Option<&str>, id: &str) -> String {
    match scope {
        Some(scope) if !scope.is_empty() => format!("{scope}/{id}"),
        _ => id.to_string(),
    }
}

#[derive(Default)]
pub struct EngineBuilder {
    executors: HashMap<NodeType, Arc<dyn TaskExecutor>>,
    on_status: Option<StatusCallback>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the executor for one node type.
    pub fn register(mut self, node_type: NodeType, executor: Arc<dyn TaskExecutor>) -> Self {
        self.executors.insert(node_type, executor);
        self
    }

    /// Register the query, script, export, import and variable executors.
    pub fn with_builtin_executors(mut self, services: &Services) -> Self {
        for (node_type, executor) in builtin_executors(services) {
            self.executors.insert(node_type, executor);
        }
        self
    }

    pub fn on_status_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, NodeStatus, Option<&str>) + Send + Sync + 'static,
    {
        self.on_status = Some(Arc::new(callback));
        self
    }

    /// Build the engine. Unless one was registered explicitly, a container
    /// executor pointing back at the new engine is added.
    pub fn build(self) -> Arc<ExecutionEngine> {
        let Self {
            mut executors,
            on_status,
        } = self;

        Arc::new_cyclic(|engine| {
            executors
                .entry(NodeType::Container)
                .or_insert_with(|| {
                    Arc::new(ContainerExecutor::new(engine.clone())) as Arc<dyn TaskExecutor>
                });
            ExecutionEngine {
                executors,
                on_status,
            }
        })
    }
}

impl ExecutionEngine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }
}
