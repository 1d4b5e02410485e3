// src/store/mod.rs

//! Mutable, transactional CRUD over the graph model.
//!
//! Every connection mutation re-runs cycle detection; a connection that
//! would close a cycle is rolled back before the error is returned, so the
//! store never holds a cyclic graph.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{EtlError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::model::{Connection, Node, NodeKind, Position, Project};
use crate::types::NodeId;
use crate::validate::{detect_cycles, validate_project};

/// Partial update applied by [`ProjectStore::update_node`].
///
/// `None` fields are left untouched. The node id cannot be changed.
#[derive(Debug, Clone, Default)]
pub struct NodePatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub position: Option<Position>,
    pub kind: Option<NodeKind>,
}

impl NodePatch {
    fn apply(self, node: &mut Node) {
        if let Some(name) = self.name {
            node.name = name;
        }
        if let Some(description) = self.description {
            node.description = description;
        }
        if let Some(position) = self.position {
            node.position = position;
        }
        if let Some(kind) = self.kind {
            node.kind = kind;
        }
    }
}

/// Holds the current project, its file path and a dirty flag.
#[derive(Debug)]
pub struct ProjectStore {
    fs: Arc<dyn FileSystem>,
    project: Option<Project>,
    path: Option<PathBuf>,
    dirty: bool,
}

impl Default for ProjectStore {
    fn default() -> Self {
        Self::new(Arc::new(RealFileSystem))
    }
}

impl ProjectStore {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            project: None,
            path: None,
            dirty: false,
        }
    }

    pub fn current_project(&self) -> Option<&Project> {
        self.project.as_ref()
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    /// Replace the current project with a fresh, empty one.
    pub fn create_project(&mut self, name: impl Into<String>) -> &Project {
        let project = Project::new(name);
        info!(project = %project.name, "created new project");
        self.path = None;
        self.dirty = false;
        self.project.insert(project)
    }

    /// Read, deserialize and validate a project file, then make it current.
    ///
    /// Fails with all validation messages joined if the project is invalid;
    /// the previously open project is kept in that case.
    pub fn load_project(&mut self, path: impl AsRef<Path>) -> Result<&Project> {
        let path = path.as_ref();
        let contents = self.fs.read_to_string(path)?;

        let project: Project = serde_json::from_str(&contents).map_err(|e| {
            EtlError::InvalidProject(format!("could not parse {}: {e}", path.display()))
        })?;

        let warnings = validate_project(&project).into_result()?;
        for warning in &warnings {
            warn!(path = %path.display(), "{warning}");
        }

        info!(
            project = %project.name,
            path = %path.display(),
            nodes = project.nodes.len(),
            connections = project.connections.len(),
            "loaded project"
        );

        self.path = Some(path.to_path_buf());
        self.dirty = false;
        Ok(&*self.project.insert(project))
    }

    /// Serialize the current project to `path`, or to the path it was loaded
    /// from / last saved to when `path` is `None`.
    pub fn save_project(&mut self, path: Option<&Path>) -> Result<PathBuf> {
        let project = self.project.as_ref().ok_or(EtlError::NoProject)?;
        let target = path
            .map(Path::to_path_buf)
            .or_else(|| self.path.clone())
            .ok_or(EtlError::NoProjectPath)?;

        let json = serde_json::to_string_pretty(project)?;
        self.fs.write(&target, json.as_bytes())?;

        info!(project = %project.name, path = %target.display(), "saved project");

        self.path = Some(target.clone());
        self.dirty = false;
        Ok(target)
    }

    /// Append a node, assigning an id when it has none. Returns the id.
    ///
    /// An id already used by another node is rejected.
    pub fn add_node(&mut self, mut node: Node) -> Result<NodeId> {
        let project = self.project.as_mut().ok_or(EtlError::NoProject)?;

        if node.id.is_empty() {
            node.id = format!("node_{}", Uuid::new_v4().simple());
        } else if project.contains_node(&node.id) {
            return Err(EtlError::DuplicateNode(node.id));
        }
        let id = node.id.clone();

        debug!(node = %id, node_type = %node.node_type(), "adding node");
        project.nodes.push(node);
        self.dirty = true;
        Ok(id)
    }

    pub fn update_node(&mut self, id: &str, patch: NodePatch) -> Result<()> {
        let project = self.project.as_mut().ok_or(EtlError::NoProject)?;
        let node = project
            .node_mut(id)
            .ok_or_else(|| EtlError::NodeNotFound(id.to_string()))?;

        patch.apply(node);
        debug!(node = %id, "updated node");
        self.dirty = true;
        Ok(())
    }

    /// Remove a node and every connection touching it.
    pub fn remove_node(&mut self, id: &str) -> Result<()> {
        let project = self.project.as_mut().ok_or(EtlError::NoProject)?;

        let before = project.nodes.len();
        project.nodes.retain(|n| n.id != id);
        if project.nodes.len() == before {
            return Err(EtlError::NodeNotFound(id.to_string()));
        }

        let conns_before = project.connections.len();
        project.connections.retain(|c| c.from != id && c.to != id);

        debug!(
            node = %id,
            removed_connections = conns_before - project.connections.len(),
            "removed node"
        );
        self.dirty = true;
        Ok(())
    }

    /// Add a connection, assigning an id when it has none. Returns the id.
    ///
    /// The connection is appended speculatively; if cycle detection then
    /// reports a cycle it is popped again and the call fails.
    pub fn add_connection(&mut self, mut conn: Connection) -> Result<String> {
        let project = self.project.as_mut().ok_or(EtlError::NoProject)?;

        for endpoint in [&conn.from, &conn.to] {
            if !project.contains_node(endpoint) {
                return Err(EtlError::NodeNotFound(endpoint.clone()));
            }
        }

        if project.has_connection_between(&conn.from, &conn.to) {
            return Err(EtlError::DuplicateConnection {
                from: conn.from,
                to: conn.to,
            });
        }

        if conn.id.is_empty() {
            conn.id = format!("conn_{}", Uuid::new_v4().simple());
        }

        project.connections.push(conn);

        if !detect_cycles(project).is_empty() {
            // Just pushed, so the pop always yields it.
            if let Some(rejected) = project.connections.pop() {
                warn!(
                    from = %rejected.from,
                    to = %rejected.to,
                    "rejected connection: would create a cycle"
                );
                return Err(EtlError::CycleDetected {
                    from: rejected.from,
                    to: rejected.to,
                });
            }
        }

        let id = project
            .connections
            .last()
            .map(|c| c.id.clone())
            .unwrap_or_default();
        debug!(connection = %id, "added connection");
        self.dirty = true;
        Ok(id)
    }

    pub fn remove_connection(&mut self, id: &str) -> Result<()> {
        let project = self.project.as_mut().ok_or(EtlError::NoProject)?;
        project.connections.retain(|c| c.id != id);
        debug!(connection = %id, "removed connection");
        self.dirty = true;
        Ok(())
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let project = self.project.as_mut().ok_or(EtlError::NoProject)?;
        project.variables.insert(name.into(), value.into());
        self.dirty = true;
        Ok(())
    }

    pub fn remove_variable(&mut self, name: &str) -> Result<Option<String>> {
        let project = self.project.as_mut().ok_or(EtlError::NoProject)?;
        let removed = project.variables.remove(name);
        self.dirty = true;
        Ok(removed)
    }
}
