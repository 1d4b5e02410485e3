// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Invalid project: {0}")]
    InvalidProject(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Node already exists: {0}")]
    DuplicateNode(String),

    #[error("Connection already exists: {from} -> {to}")]
    DuplicateConnection { from: String, to: String },

    #[error("Connection would create a cycle: {from} -> {to}")]
    CycleDetected { from: String, to: String },

    #[error("No project is open")]
    NoProject,

    #[error("No file path for the current project")]
    NoProjectPath,

    /// Internal invariant violation raised by the engine itself.
    #[error("Engine error: {0}")]
    Engine(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, EtlError>;
