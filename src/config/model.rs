// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::db::ConnectionDescriptor;
use crate::exec::ScriptSettings;

/// Runner configuration as read from a TOML file.
///
/// ```toml
/// [connection]
/// descriptor = "warehouse.db"
///
/// [variables]
/// region = "eu"
///
/// [script]
/// interpreter = "bash"
/// timeout_secs = 300
/// ```
///
/// All sections are optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawRunnerConfig {
    #[serde(default)]
    pub connection: ConnectionSection,

    /// Global variables seeded into every run.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,

    #[serde(default)]
    pub script: ScriptSection,
}

/// `[connection]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionSection {
    /// Handed as-is to the connection factory.
    #[serde(default)]
    pub descriptor: String,
}

/// `[script]` section: defaults for script nodes.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptSection {
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Unset means no timeout.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_interpreter() -> String {
    crate::exec::script::DEFAULT_INTERPRETER.to_string()
}

impl Default for ScriptSection {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            timeout_secs: None,
        }
    }
}

/// Validated runner configuration.
///
/// Constructed from [`RawRunnerConfig`] via `TryFrom` (see
/// [`crate::config::validate`]).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunnerConfig {
    pub connection: ConnectionDescriptor,
    pub variables: BTreeMap<String, String>,
    pub script: ScriptSettings,
}
