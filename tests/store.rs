mod common;

use std::path::Path;
use std::sync::Arc;

use etlflow::errors::EtlError;
use etlflow::fs::{MockFileSystem, RealFileSystem};
use etlflow::model::{Connection, Position};
use etlflow::store::{NodePatch, ProjectStore};
use etlflow_test_utils::{ProjectBuilder, container_node, stub_node};

use common::TestResult;

fn store_with(ids: &[&str]) -> ProjectStore {
    let mut store = ProjectStore::new(Arc::new(MockFileSystem::new()));
    store.create_project("test");
    for id in ids {
        store.add_node(stub_node(id)).unwrap();
    }
    store
}

fn connection_count(store: &ProjectStore) -> usize {
    store.current_project().map_or(0, |p| p.connections.len())
}

#[test]
fn connection_closing_a_cycle_is_rolled_back() -> TestResult {
    let mut store = store_with(&["1", "2"]);
    store.add_connection(Connection::new("1", "2"))?;

    let err = store.add_connection(Connection::new("2", "1")).unwrap_err();

    assert!(matches!(err, EtlError::CycleDetected { .. }));
    assert!(err.to_string().contains("Connection would create a cycle"));
    assert_eq!(connection_count(&store), 1);
    Ok(())
}

#[test]
fn longer_cycle_is_rejected_and_graph_unchanged() -> TestResult {
    let mut store = store_with(&["a", "b", "c"]);
    store.add_connection(Connection::new("a", "b"))?;
    store.add_connection(Connection::new("b", "c"))?;
    let before = store.current_project().ok_or("no project")?.connections.clone();

    assert!(store.add_connection(Connection::new("c", "a")).is_err());
    assert_eq!(store.current_project().ok_or("no project")?.connections, before);
    Ok(())
}

#[test]
fn duplicate_pair_and_unknown_endpoints_are_rejected() -> TestResult {
    let mut store = store_with(&["a", "b"]);
    store.add_connection(Connection::new("a", "b"))?;

    assert!(matches!(
        store.add_connection(Connection::new("a", "b")),
        Err(EtlError::DuplicateConnection { .. })
    ));
    assert!(matches!(
        store.add_connection(Connection::new("a", "ghost")),
        Err(EtlError::NodeNotFound(_))
    ));
    assert_eq!(connection_count(&store), 1);
    Ok(())
}

#[test]
fn node_with_existing_id_is_rejected_and_project_stays_loadable() -> TestResult {
    let fs = MockFileSystem::new();
    let mut store = ProjectStore::new(Arc::new(fs.clone()));
    store.create_project("p");
    store.add_node(stub_node("a"))?;

    let err = store.add_node(stub_node("a")).unwrap_err();
    assert!(matches!(err, EtlError::DuplicateNode(ref id) if id == "a"));
    assert_eq!(store.current_project().ok_or("no project")?.nodes.len(), 1);

    store.save_project(Some(Path::new("/p.json")))?;
    let mut reloaded = ProjectStore::new(Arc::new(fs));
    assert_eq!(reloaded.load_project("/p.json")?.nodes.len(), 1);
    Ok(())
}

#[test]
fn ids_are_assigned_when_missing() -> TestResult {
    let mut store = store_with(&["a", "b"]);
    let node_id = store.add_node(stub_node(""))?;
    assert!(node_id.starts_with("node_"));

    let conn_id = store.add_connection(Connection::new("a", "b"))?;
    assert!(conn_id.starts_with("conn_"));

    let kept = store.add_connection(Connection::new("b", &node_id).with_id("mine"))?;
    assert_eq!(kept, "mine");
    Ok(())
}

#[test]
fn removing_a_node_cascades_to_its_connections() -> TestResult {
    let mut store = store_with(&["a", "b", "c"]);
    store.add_connection(Connection::new("a", "b"))?;
    store.add_connection(Connection::new("b", "c"))?;
    store.add_connection(Connection::new("a", "c"))?;

    store.remove_node("b")?;

    let project = store.current_project().ok_or("no project")?;
    assert!(!project.contains_node("b"));
    assert_eq!(project.connections.len(), 1);
    assert!(project.has_connection_between("a", "c"));

    assert!(matches!(store.remove_node("b"), Err(EtlError::NodeNotFound(_))));
    Ok(())
}

#[test]
fn update_merges_only_given_fields() -> TestResult {
    let mut store = store_with(&["a"]);
    store.update_node(
        "a",
        NodePatch {
            name: Some("Load orders".into()),
            position: Some(Position { x: 10.0, y: 20.0 }),
            ..NodePatch::default()
        },
    )?;

    let node = store
        .current_project()
        .and_then(|p| p.node("a"))
        .ok_or("no node")?;
    assert_eq!(node.name, "Load orders");
    assert_eq!(node.position, Position { x: 10.0, y: 20.0 });
    assert_eq!(node.kind, stub_node("a").kind);

    assert!(matches!(
        store.update_node("zzz", NodePatch::default()),
        Err(EtlError::NodeNotFound(_))
    ));
    Ok(())
}

#[test]
fn dirty_flag_follows_mutations_and_saves() -> TestResult {
    let fs = MockFileSystem::new();
    let mut store = ProjectStore::new(Arc::new(fs.clone()));
    store.create_project("p");
    assert!(!store.has_unsaved_changes());

    store.add_node(stub_node("a"))?;
    assert!(store.has_unsaved_changes());

    store.save_project(Some(Path::new("p.json")))?;
    assert!(!store.has_unsaved_changes());

    store.set_variable("region", "eu")?;
    assert!(store.has_unsaved_changes());

    // Saves back to the remembered path.
    let saved = store.save_project(None)?;
    assert_eq!(saved, Path::new("p.json"));
    assert!(fs.contents("p.json").ok_or("not written")?.contains("\"region\""));
    Ok(())
}

#[test]
fn save_needs_a_project_and_a_path() {
    let mut store = ProjectStore::new(Arc::new(MockFileSystem::new()));
    assert!(matches!(store.save_project(None), Err(EtlError::NoProject)));

    store.create_project("p");
    assert!(matches!(store.save_project(None), Err(EtlError::NoProjectPath)));
}

#[test]
fn load_reads_nested_containers_and_clears_dirty() -> TestResult {
    let inner = ProjectBuilder::new("inner")
        .stubs(&["x", "y"])
        .edge("x", "y")
        .build();
    let project = ProjectBuilder::new("saved")
        .node(container_node("c", inner))
        .node(stub_node("after"))
        .edge("c", "after")
        .variable("region", "eu")
        .build();

    let fs = MockFileSystem::new();
    fs.add_file("saved.json", serde_json::to_vec(&project)?);

    let mut store = ProjectStore::new(Arc::new(fs));
    let loaded = store.load_project("saved.json")?;

    assert_eq!(*loaded, project);
    assert!(!store.has_unsaved_changes());
    assert_eq!(store.current_path(), Some(Path::new("saved.json")));
    Ok(())
}

#[test]
fn load_rejects_invalid_projects_with_joined_messages() {
    let fs = MockFileSystem::new();
    fs.add_file(
        "bad.json",
        r#"{
            "name": "bad",
            "version": "1.0",
            "nodes": [
                { "id": "a", "type": "query", "position": {"x": 0, "y": 0}, "config": {"query": "SELECT 1"} },
                { "id": "a", "type": "query", "position": {"x": 0, "y": 0}, "config": {"query": "SELECT 1"} }
            ],
            "connections": [ { "id": "c1", "from": "a", "to": "ghost" } ]
        }"#,
    );

    let mut store = ProjectStore::new(Arc::new(fs));
    let err = store.load_project("bad.json").unwrap_err();

    let EtlError::InvalidProject(message) = err else {
        panic!("expected InvalidProject, got {err:?}");
    };
    assert!(message.contains("Duplicate node id"), "{message}");
    assert!(message.contains("ghost"), "{message}");
    assert!(store.current_project().is_none());
}

#[test]
fn real_disk_round_trip() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nested").join("project.json");

    let mut store = ProjectStore::new(Arc::new(RealFileSystem));
    store.create_project("disk");
    store.add_node(stub_node("a"))?;
    store.add_node(stub_node("b"))?;
    store.add_connection(Connection::new("a", "b"))?;
    store.save_project(Some(&path))?;

    let mut reloaded = ProjectStore::default();
    let project = reloaded.load_project(&path)?;
    assert_eq!(project.nodes.len(), 2);
    assert!(project.has_connection_between("a", "b"));
    Ok(())
}
