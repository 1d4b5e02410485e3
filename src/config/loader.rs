// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{RawRunnerConfig, RunnerConfig};
use crate::errors::Result;

/// Read and deserialize a config file without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawRunnerConfig> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: RawRunnerConfig = toml::from_str(&contents)?;
    Ok(config)
}

/// Read, deserialize and validate a config file.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<RunnerConfig> {
    let raw_config = load_from_path(&path)?;
    let config = RunnerConfig::try_from(raw_config)?;
    Ok(config)
}

/// Resolve the runner config for a run.
///
/// An explicitly named file must exist. Without one, `Etlflow.toml` in the
/// working directory is used when present and defaults otherwise.
pub fn load_runner_config(explicit: Option<&Path>) -> Result<RunnerConfig> {
    match explicit {
        Some(path) => load_and_validate(path),
        None => {
            let path = default_config_path();
            if path.exists() {
                load_and_validate(&path)
            } else {
                debug!(path = %path.display(), "no config file; using defaults");
                Ok(RunnerConfig::default())
            }
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("Etlflow.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[connection]\ndescriptor = \"a.db\"").unwrap();
        let cfg = load_runner_config(Some(file.path())).unwrap();
        assert_eq!(cfg.connection.as_str(), "a.db");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_runner_config(Some(&dir.path().join("nope.toml"))).is_err());
    }
}
