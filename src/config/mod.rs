// src/config/mod.rs

//! Runner configuration.
//!
//! - TOML-backed data model (`model.rs`).
//! - Loading from disk (`loader.rs`).
//! - Raw to validated conversion (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_runner_config};
pub use model::{RawRunnerConfig, RunnerConfig};
