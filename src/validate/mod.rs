// src/validate/mod.rs

//! Structural validation of projects.
//!
//! - [`validate_project`] runs every check and returns a [`ValidationReport`]
//!   for advisory use.
//! - [`graph`] holds the cycle detector and the flat topological order.
//!
//! Type, position and config presence are enforced when the project is
//! deserialized; this module checks what the types cannot.

pub mod graph;

use std::collections::HashSet;

use tracing::debug;

use crate::errors::{EtlError, Result};
use crate::model::{Connection, Node, NodeKind, Project};

pub use graph::{detect_cycles, detect_cycles_in, topological_order, topological_order_in};

/// Outcome of [`validate_project`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Convert to a `Result`, joining all error messages.
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.errors.is_empty() {
            Ok(self.warnings)
        } else {
            Err(EtlError::InvalidProject(self.errors.join("; ")))
        }
    }
}

pub fn validate_project(project: &Project) -> ValidationReport {
    let mut report = ValidationReport::default();

    if project.name.trim().is_empty() {
        report.errors.push("Project name is required".to_string());
    }
    if project.version.trim().is_empty() {
        report.errors.push("Project version is required".to_string());
    }

    validate_scope(&project.nodes, &project.connections, "", &mut report);

    debug!(
        project = %project.name,
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "project validated"
    );

    report
}

/// Validate one graph scope, recursing into container subgraphs.
///
/// `prefix` is prepended to every message so nested problems name the
/// container they live in.
fn validate_scope(
    nodes: &[Node],
    connections: &[Connection],
    prefix: &str,
    report: &mut ValidationReport,
) {
    let mut ids: HashSet<&str> = HashSet::new();

    for (index, node) in nodes.iter().enumerate() {
        if node.id.trim().is_empty() {
            report
                .errors
                .push(format!("{prefix}Node at index {index} is missing an id"));
            continue;
        }
        if !ids.insert(node.id.as_str()) {
            report
                .errors
                .push(format!("{prefix}Duplicate node id: {}", node.id));
        }
    }

    let mut pairs: HashSet<(&str, &str)> = HashSet::new();

    for conn in connections {
        let label = if conn.id.is_empty() {
            format!("{} -> {}", conn.from, conn.to)
        } else {
            conn.id.clone()
        };

        if !ids.contains(conn.from.as_str()) {
            report.errors.push(format!(
                "{prefix}Connection {label} references unknown source node '{}'",
                conn.from
            ));
        }
        if !ids.contains(conn.to.as_str()) {
            report.errors.push(format!(
                "{prefix}Connection {label} references unknown target node '{}'",
                conn.to
            ));
        }
        if conn.from == conn.to {
            report.errors.push(format!(
                "{prefix}Connection {label} connects node '{}' to itself",
                conn.from
            ));
        }
        if !pairs.insert((conn.from.as_str(), conn.to.as_str())) {
            report.warnings.push(format!(
                "{prefix}Duplicate connection from '{}' to '{}'",
                conn.from, conn.to
            ));
        }
    }

    // Self-loops are already reported above; only look for longer cycles.
    let has_self_loop = connections.iter().any(|c| c.from == c.to);
    if !has_self_loop {
        for msg in detect_cycles_in(nodes, connections) {
            report.errors.push(format!("{prefix}{msg}"));
        }
    }

    for node in nodes {
        if let NodeKind::Container(cfg) = &node.kind {
            let nested_prefix = format!("{prefix}Container '{}': ", node.id);
            validate_scope(&cfg.nodes, &cfg.connections, &nested_prefix, report);
        }
    }
}
