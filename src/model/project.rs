// src/model/project.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::node::Node;
use crate::types::NodeId;

/// A directed dependency between two nodes of the same scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    #[serde(default)]
    pub id: String,

    pub from: NodeId,

    pub to: NodeId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Persisted for schema compatibility; never evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl Connection {
    pub fn new(from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Self {
            id: String::new(),
            from: from.into(),
            to: to.into(),
            label: None,
            condition: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// The whole ETL graph: nodes, connections and project-level variables.
///
/// Persisted as a single JSON document, nested container graphs included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,

    pub version: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,

    #[serde(default)]
    pub nodes: Vec<Node>,

    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl Project {
    pub const DEFAULT_VERSION: &'static str = "1.0";

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: Self::DEFAULT_VERSION.to_string(),
            variables: BTreeMap::new(),
            nodes: Vec::new(),
            connections: Vec::new(),
        }
    }

    /// Ephemeral project wrapping a container's nested graph.
    pub fn from_subgraph(name: impl Into<String>, nodes: Vec<Node>, connections: Vec<Connection>) -> Self {
        Self {
            nodes,
            connections,
            ..Self::new(name)
        }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    pub fn has_connection_between(&self, from: &str, to: &str) -> bool {
        self.connections
            .iter()
            .any(|c| c.from == from && c.to == to)
    }
}
