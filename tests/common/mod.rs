#![allow(dead_code)]

use std::error::Error;
use std::sync::Arc;

use etlflow::engine::ExecutionEngine;
use etlflow::exec::TaskExecutor;
use etlflow::types::NodeType;
use etlflow_test_utils::{StatusRecorder, StubExecutor};

pub type TestResult = Result<(), Box<dyn Error>>;

/// Engine whose query nodes (and therefore `stub_node`s) run on `stub`.
pub fn stub_engine(stub: &Arc<StubExecutor>) -> (Arc<ExecutionEngine>, StatusRecorder) {
    etlflow_test_utils::init_tracing();
    let recorder = StatusRecorder::new();
    let engine = ExecutionEngine::builder()
        .register(NodeType::Query, Arc::clone(stub) as Arc<dyn TaskExecutor>)
        .on_status_change(recorder.callback())
        .build();
    (engine, recorder)
}
