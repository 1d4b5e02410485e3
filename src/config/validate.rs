// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{RawRunnerConfig, RunnerConfig};
use crate::db::ConnectionDescriptor;
use crate::errors::{EtlError, Result};
use crate::exec::ScriptSettings;

impl TryFrom<RawRunnerConfig> for RunnerConfig {
    type Error = EtlError;

    fn try_from(raw: RawRunnerConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(RunnerConfig {
            connection: ConnectionDescriptor::new(raw.connection.descriptor.trim()),
            variables: raw.variables,
            script: ScriptSettings {
                interpreter: raw.script.interpreter.trim().to_string(),
                timeout: raw.script.timeout_secs.map(Duration::from_secs),
            },
        })
    }
}

fn validate_raw_config(cfg: &RawRunnerConfig) -> Result<()> {
    validate_script_section(cfg)?;
    validate_variable_names(cfg)?;
    Ok(())
}

fn validate_script_section(cfg: &RawRunnerConfig) -> Result<()> {
    if cfg.script.interpreter.trim().is_empty() {
        return Err(EtlError::Config(
            "[script].interpreter must not be empty".to_string(),
        ));
    }
    if cfg.script.timeout_secs == Some(0) {
        return Err(EtlError::Config(
            "[script].timeout_secs must be >= 1 (got 0); omit it for no timeout".to_string(),
        ));
    }
    Ok(())
}

fn validate_variable_names(cfg: &RawRunnerConfig) -> Result<()> {
    for name in cfg.variables.keys() {
        if name.trim().is_empty() || name.contains('}') {
            return Err(EtlError::Config(format!(
                "[variables] has an unusable name '{name}'"
            )));
        }
    }
    Ok(())
}
