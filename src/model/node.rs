// src/model/node.rs

//! Nodes and their per-type configuration.

use serde::{Deserialize, Serialize};

use crate::model::project::Connection;
use crate::types::{FileFormat, NodeId, NodeType};

/// Canvas position of a node. Carried for editors; ignored by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// One typed unit of work in the graph.
///
/// On disk the node's `type` tag and its `config` object sit side by side:
///
/// ```json
/// { "id": "load", "type": "query", "name": "Load", "position": {"x": 0, "y": 0},
///   "config": { "query": "SELECT 1" } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique within one graph scope. An empty id means "assign one for me"
    /// when the node is handed to the project store.
    #[serde(default)]
    pub id: NodeId,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub position: Position,

    #[serde(flatten)]
    pub kind: NodeKind,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            position: Position::default(),
            kind,
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    /// Display label used in logs: the name when set, the id otherwise.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Per-type node configuration (the `type` + `config` pair).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "lowercase")]
pub enum NodeKind {
    Query(QueryConfig),
    Script(ScriptConfig),
    Container(ContainerConfig),
    Export(ExportConfig),
    Import(ImportConfig),
    Variable(VariableConfig),
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Query(_) => NodeType::Query,
            NodeKind::Script(_) => NodeType::Script,
            NodeKind::Container(_) => NodeType::Container,
            NodeKind::Export(_) => NodeType::Export,
            NodeKind::Import(_) => NodeType::Import,
            NodeKind::Variable(_) => NodeType::Variable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryConfig {
    #[serde(default)]
    pub query: String,

    /// Timeout in seconds for the query round trip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptConfig {
    /// Inline script body. Ignored when `script_path` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_path: Option<String>,

    /// Interpreter executable, e.g. `python3` or `bash`. Falls back to the
    /// runner's configured default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

/// A nested sub-graph executed recursively by the same engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContainerConfig {
    #[serde(default)]
    pub nodes: Vec<Node>,

    #[serde(default)]
    pub connections: Vec<Connection>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    #[serde(default)]
    pub output_path: String,

    #[serde(default)]
    pub format: FileFormat,

    /// Export the upstream node's in-memory output instead of running a
    /// query. Not supported: such nodes always fail.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub use_previous_output: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportConfig {
    #[serde(default)]
    pub source_path: String,

    #[serde(default)]
    pub target_table: String,

    #[serde(default)]
    pub format: FileFormat,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableConfig {
    /// Name of the variable to assign.
    pub variable_name: String,

    #[serde(flatten)]
    pub source: VariableSource,
}

/// Where a variable node gets its value from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum VariableSource {
    /// A literal, possibly containing `${name}` placeholders.
    Static {
        #[serde(default)]
        value: String,
    },
    /// Ask the host for a value.
    Prompt {
        #[serde(default, rename = "promptMessage")]
        message: Option<String>,
        #[serde(default, rename = "defaultValue", skip_serializing_if = "Option::is_none")]
        default: Option<String>,
    },
    /// First column of the first row of a query.
    Sql {
        #[serde(default)]
        query: String,
    },
}
