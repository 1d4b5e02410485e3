// src/validate/graph.rs

//! Cycle detection and flat topological ordering.
//!
//! Both functions work on one graph scope (a project or a container's
//! nested list). Connections whose endpoints do not resolve to a node are
//! ignored here; [`super::validate_project`] reports them separately.

use std::collections::{HashMap, VecDeque};

use petgraph::Direction;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::{Control, DfsEvent, depth_first_search};

use crate::model::{Connection, Node, Project};
use crate::types::NodeId;

/// Build the adjacency graph for one scope.
///
/// Edge direction: `from -> to`.
fn build_graph<'a>(nodes: &'a [Node], connections: &'a [Connection]) -> DiGraphMap<&'a str, ()> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for node in nodes {
        graph.add_node(node.id.as_str());
    }

    for conn in connections {
        if graph.contains_node(conn.from.as_str()) && graph.contains_node(conn.to.as_str()) {
            graph.add_edge(conn.from.as_str(), conn.to.as_str(), ());
        }
    }

    graph
}

/// Depth-first search for a back edge into the current recursion stack.
///
/// Returns a single human-readable message when a cycle exists, or an empty
/// vector otherwise.
pub fn detect_cycles(project: &Project) -> Vec<String> {
    detect_cycles_in(&project.nodes, &project.connections)
}

pub fn detect_cycles_in(nodes: &[Node], connections: &[Connection]) -> Vec<String> {
    let graph = build_graph(nodes, connections);
    let mut back_edge: Option<(&str, &str)> = None;

    depth_first_search(&graph, graph.nodes(), |event| {
        if let DfsEvent::BackEdge(u, v) = event {
            back_edge = Some((u, v));
            return Control::<()>::Break(());
        }
        Control::Continue
    });

    match back_edge {
        Some((from, to)) => vec![format!(
            "Cycle detected in graph: connection '{from}' -> '{to}' closes a loop"
        )],
        None => Vec::new(),
    }
}

/// Kahn's algorithm over the flattened graph.
///
/// Returns `None` when the emitted order is shorter than the node count,
/// which means the graph contains a cycle.
pub fn topological_order(project: &Project) -> Option<Vec<NodeId>> {
    topological_order_in(&project.nodes, &project.connections)
}

pub fn topological_order_in(nodes: &[Node], connections: &[Connection]) -> Option<Vec<NodeId>> {
    let graph = build_graph(nodes, connections);

    let mut in_degree: HashMap<&str, usize> = graph
        .nodes()
        .map(|n| (n, graph.neighbors_directed(n, Direction::Incoming).count()))
        .collect();

    let mut queue: VecDeque<&str> = graph
        .nodes()
        .filter(|n| in_degree.get(n).copied() == Some(0))
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());

    while let Some(current) = queue.pop_front() {
        order.push(current.to_string());

        for next in graph.neighbors_directed(current, Direction::Outgoing) {
            if let Some(deg) = in_degree.get_mut(next) {
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(next);
                }
            }
        }
    }

    if order.len() < graph.node_count() {
        None
    } else {
        Some(order)
    }
}
