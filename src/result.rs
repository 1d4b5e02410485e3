// src/result.rs

//! Per-node and per-run result types.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::NodeId;

/// Lifecycle state of one node in one run.
///
/// `pending -> running -> {success | error}`, or `pending -> skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Pending,
    Running,
    Success,
    Error,
    Skipped,
}

impl NodeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeStatus::Success | NodeStatus::Error | NodeStatus::Skipped)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeStatus::Pending => "pending",
            NodeStatus::Running => "running",
            NodeStatus::Success => "success",
            NodeStatus::Error => "error",
            NodeStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Overall state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Terminal result of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResult {
    pub node_id: NodeId,
    pub status: NodeStatus,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
}

impl NodeResult {
    fn finished(node_id: impl Into<NodeId>, status: NodeStatus, start_time: DateTime<Utc>) -> Self {
        Self {
            node_id: node_id.into(),
            status,
            start_time,
            end_time: Some(Utc::now()),
            error: None,
            output: None,
            rows_affected: None,
        }
    }

    pub fn success(node_id: impl Into<NodeId>, start_time: DateTime<Utc>) -> Self {
        Self::finished(node_id, NodeStatus::Success, start_time)
    }

    pub fn error(
        node_id: impl Into<NodeId>,
        start_time: DateTime<Utc>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::finished(node_id, NodeStatus::Error, start_time)
        }
    }

    /// A node that never entered `running`.
    pub fn skipped(node_id: impl Into<NodeId>, message: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            error: Some(message.into()),
            ..Self::finished(node_id, NodeStatus::Skipped, now)
        }
    }

    pub fn with_output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_rows_affected(mut self, rows: u64) -> Self {
        self.rows_affected = Some(rows);
        self
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.end_time.map(|end| end - self.start_time)
    }
}

/// Aggregate of one `execute()` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub project_name: String,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub node_results: HashMap<NodeId, NodeResult>,
}

impl ExecutionResult {
    pub fn start(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            start_time: Utc::now(),
            end_time: None,
            status: RunStatus::Running,
            node_results: HashMap::new(),
        }
    }

    /// Set the overall status and stamp the end time.
    pub fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.end_time = Some(Utc::now());
    }

    pub fn result(&self, node_id: &str) -> Option<&NodeResult> {
        self.node_results.get(node_id)
    }

    pub fn status_of(&self, node_id: &str) -> Option<NodeStatus> {
        self.node_results.get(node_id).map(|r| r.status)
    }

    pub fn count(&self, status: NodeStatus) -> usize {
        self.node_results
            .values()
            .filter(|r| r.status == status)
            .count()
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.end_time.map(|end| end - self.start_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_result_carries_message_and_end_time() {
        let r = NodeResult::error("n1", Utc::now(), "boom");
        assert_eq!(r.status, NodeStatus::Error);
        assert_eq!(r.error.as_deref(), Some("boom"));
        assert!(r.end_time.is_some());
        assert!(r.duration().is_some());
    }

    #[test]
    fn node_result_serializes_camel_case() {
        let r = NodeResult::success("n1", Utc::now()).with_rows_affected(3);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["nodeId"], "n1");
        assert_eq!(json["status"], "success");
        assert_eq!(json["rowsAffected"], 3);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn finish_stamps_end_time() {
        let mut run = ExecutionResult::start("demo");
        assert_eq!(run.status, RunStatus::Running);
        run.finish(RunStatus::Completed);
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.end_time.is_some());
    }
}
