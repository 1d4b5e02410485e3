// src/engine/plan.rs

//! Batch planning.
//!
//! Kahn's algorithm with explicit batching: every round collects all
//! unprocessed nodes whose in-degree is zero, in node order, into one
//! batch; then their successors' in-degrees are decremented. Nodes in the
//! same batch have no dependency among each other.
//!
//! This is pure and synchronous; the async shell lives in
//! [`super::runtime`].

use std::collections::HashMap;

use crate::errors::{EtlError, Result};
use crate::model::{Connection, Node, Project};
use crate::types::NodeId;

/// Batches as indices into `nodes`.
///
/// Connections whose endpoints are not both in `nodes` are ignored.
/// Returns [`EtlError::Engine`] if nodes remain but none is ready, which
/// only happens when the graph has a cycle.
pub fn plan_batches(nodes: &[Node], connections: &[Connection]) -> Result<Vec<Vec<usize>>> {
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect();

    let mut in_degree = vec![0usize; nodes.len()];
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for conn in connections {
        let (Some(&from), Some(&to)) = (index.get(conn.from.as_str()), index.get(conn.to.as_str()))
        else {
            continue;
        };
        successors[from].push(to);
        in_degree[to] += 1;
    }

    let mut processed = vec![false; nodes.len()];
    let mut remaining = nodes.len();
    let mut batches = Vec::new();

    while remaining > 0 {
        let batch: Vec<usize> = (0..nodes.len())
            .filter(|&i| !processed[i] && in_degree[i] == 0)
            .collect();

        if batch.is_empty() {
            let stuck: Vec<&str> = (0..nodes.len())
                .filter(|&i| !processed[i])
                .map(|i| nodes[i].id.as_str())
                .collect();
            return Err(EtlError::Engine(format!(
                "cycle detected among nodes: {}",
                stuck.join(", ")
            )));
        }

        for &i in &batch {
            processed[i] = true;
            for &succ in &successors[i] {
                in_degree[succ] = in_degree[succ].saturating_sub(1);
            }
        }
        remaining -= batch.len();
        batches.push(batch);
    }

    Ok(batches)
}

/// Batches of node ids for a whole project.
pub fn build_batches(project: &Project) -> Result<Vec<Vec<NodeId>>> {
    let batches = plan_batches(&project.nodes, &project.connections)?;
    Ok(batches
        .into_iter()
        .map(|batch| {
            batch
                .into_iter()
                .map(|i| project.nodes[i].id.clone())
                .collect()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeKind, QueryConfig};

    fn project(ids: &[&str], edges: &[(&str, &str)]) -> Project {
        let mut p = Project::new("plan");
        p.nodes = ids
            .iter()
            .map(|id| {
                Node::new(
                    *id,
                    *id,
                    NodeKind::Query(QueryConfig {
                        query: "SELECT 1".into(),
                        timeout: None,
                    }),
                )
            })
            .collect();
        p.connections = edges.iter().map(|(f, t)| Connection::new(*f, *t)).collect();
        p
    }

    #[test]
    fn diamond_batches() {
        let p = project(&["1", "2", "3", "4"], &[("1", "3"), ("2", "3"), ("3", "4")]);
        assert_eq!(
            build_batches(&p).unwrap(),
            vec![vec!["1", "2"], vec!["3"], vec!["4"]]
        );
    }

    #[test]
    fn empty_project_has_no_batches() {
        assert!(build_batches(&Project::new("empty")).unwrap().is_empty());
    }

    #[test]
    fn cycle_is_an_engine_error() {
        let p = project(&["a", "b", "c"], &[("a", "b"), ("b", "a")]);
        let err = build_batches(&p).unwrap_err();
        assert!(matches!(err, EtlError::Engine(_)));
        assert!(err.to_string().contains("cycle detected"));
    }

    #[test]
    fn dangling_edges_are_ignored() {
        let p = project(&["a"], &[("a", "ghost")]);
        assert_eq!(build_batches(&p).unwrap(), vec![vec!["a"]]);
    }
}
