use std::collections::BTreeMap;

use etlflow::model::{
    Connection, ContainerConfig, Node, NodeKind, Project, QueryConfig, ScriptConfig,
    VariableConfig, VariableSource,
};

/// Builder for `Project` to simplify test setup.
pub struct ProjectBuilder {
    project: Project,
}

impl ProjectBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            project: Project::new(name),
        }
    }

    pub fn node(mut self, node: Node) -> Self {
        self.project.nodes.push(node);
        self
    }

    /// Add one stub node per id.
    pub fn stubs(mut self, ids: &[&str]) -> Self {
        self.project.nodes.extend(ids.iter().map(|id| stub_node(id)));
        self
    }

    pub fn edge(mut self, from: &str, to: &str) -> Self {
        let id = format!("c{}", self.project.connections.len() + 1);
        self.project
            .connections
            .push(Connection::new(from, to).with_id(id));
        self
    }

    pub fn variable(mut self, name: &str, value: &str) -> Self {
        self.project
            .variables
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> Project {
        self.project
    }
}

/// A node the `StubExecutor` runs. Registered under the query type.
pub fn stub_node(id: &str) -> Node {
    query_node(id, "SELECT 'stub'")
}

pub fn query_node(id: &str, query: &str) -> Node {
    Node::new(
        id,
        id,
        NodeKind::Query(QueryConfig {
            query: query.to_string(),
            timeout: None,
        }),
    )
}

pub fn script_node(id: &str, script: &str) -> Node {
    Node::new(
        id,
        id,
        NodeKind::Script(ScriptConfig {
            script: Some(script.to_string()),
            script_path: None,
            interpreter: None,
            args: vec![],
            timeout: None,
        }),
    )
}

pub fn variable_node(id: &str, name: &str, source: VariableSource) -> Node {
    Node::new(
        id,
        id,
        NodeKind::Variable(VariableConfig {
            variable_name: name.to_string(),
            source,
        }),
    )
}

pub fn container_node(id: &str, inner: Project) -> Node {
    Node::new(
        id,
        id,
        NodeKind::Container(ContainerConfig {
            nodes: inner.nodes,
            connections: inner.connections,
        }),
    )
}

/// Project variables as a map, for comparisons.
pub fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
