// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `etlflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "etlflow",
    version,
    about = "Validate and run ETL projects described as task graphs.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the project file (JSON).
    #[arg(long, value_name = "PATH")]
    pub project: PathBuf,

    /// Path to the runner config (TOML).
    ///
    /// Default: `Etlflow.toml` in the current working directory, if present.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Set a run variable, overriding project and config values.
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,

    /// Validate and print the execution plan without running anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Never prompt; prompt variables fall back to their default value.
    #[arg(long)]
    pub non_interactive: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ETLFLOW_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_var(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{raw}'")),
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vars_split_on_first_equals() {
        assert_eq!(
            parse_var("where=a=b").unwrap(),
            ("where".to_string(), "a=b".to_string())
        );
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=x").is_err());
    }

    #[test]
    fn parses_full_command_line() {
        let args = CliArgs::try_parse_from([
            "etlflow",
            "--project",
            "p.json",
            "--var",
            "region=eu",
            "--var",
            "day=1",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(args.vars.len(), 2);
        assert!(args.dry_run);
        assert!(args.config.is_none());
    }
}
