// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical node identifier type used throughout the engine.
pub type NodeId = String;

/// The closed set of task kinds a node can be.
///
/// Used as the dispatch key of the executor registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Query,
    Script,
    Container,
    Export,
    Import,
    Variable,
}

impl NodeType {
    pub const ALL: [NodeType; 6] = [
        NodeType::Query,
        NodeType::Script,
        NodeType::Container,
        NodeType::Export,
        NodeType::Import,
        NodeType::Variable,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Query => "query",
            NodeType::Script => "script",
            NodeType::Container => "container",
            NodeType::Export => "export",
            NodeType::Import => "import",
            NodeType::Variable => "variable",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "query" => Ok(NodeType::Query),
            "script" => Ok(NodeType::Script),
            "container" => Ok(NodeType::Container),
            "export" => Ok(NodeType::Export),
            "import" => Ok(NodeType::Import),
            "variable" => Ok(NodeType::Variable),
            other => Err(format!(
                "invalid node type: {other} (expected one of query, script, container, export, import, variable)"
            )),
        }
    }
}

/// File format handled by import/export strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    #[default]
    Csv,
    Tsv,
    Xlsx,
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileFormat::Csv => "csv",
            FileFormat::Tsv => "tsv",
            FileFormat::Xlsx => "xlsx",
        };
        f.write_str(s)
    }
}
