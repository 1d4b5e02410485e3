// src/model/mod.rs

//! Graph model: plain data describing nodes, connections and project-level
//! variables.
//!
//! - [`node`] holds [`Node`] and the per-type configuration union.
//! - [`project`] holds [`Connection`] and the top-level [`Project`].

pub mod node;
pub mod project;

pub use node::{
    ContainerConfig, ExportConfig, ImportConfig, Node, NodeKind, Position, QueryConfig,
    ScriptConfig, VariableConfig, VariableSource,
};
pub use project::{Connection, Project};
