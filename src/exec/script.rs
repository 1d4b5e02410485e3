// src/exec/script.rs

//! Script executor.
//!
//! Inline script text has `${name}` placeholders resolved and is written to
//! a scratch file that is removed when the run finishes, whatever the
//! outcome. The interpreter is then spawned with `[script, ...args]` and
//! every run variable exported as `ETL_VAR_<NAME>`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use futures::future::BoxFuture;
use serde_json::Value;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, info};

use super::{Task, TaskError, TaskExecutor, TaskOutcome, TaskOutput, seconds, settle, within};
use crate::context::ExecutionContext;
use crate::model::{NodeKind, ScriptConfig};
use crate::result::NodeResult;

pub const DEFAULT_INTERPRETER: &str = "sh";

/// Defaults for script nodes that do not set their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSettings {
    pub interpreter: String,
    pub timeout: Option<Duration>,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            interpreter: DEFAULT_INTERPRETER.to_string(),
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptExecutor {
    settings: ScriptSettings,
}

impl ScriptExecutor {
    pub fn new(settings: ScriptSettings) -> Self {
        Self { settings }
    }

    async fn run(&self, task: Task<'_>, ctx: &ExecutionContext) -> TaskOutcome {
        let NodeKind::Script(config) = &task.node.kind else {
            return Err(TaskError::Config(format!(
                "node '{}' is not a script node",
                task.node.id
            )));
        };

        let interpreter = config
            .interpreter
            .as_deref()
            .filter(|i| !i.trim().is_empty())
            .unwrap_or(&self.settings.interpreter);

        // The scratch file lives until this function returns.
        let (script_path, _scratch) = prepare_script(config, interpreter, ctx)?;

        let args: Vec<String> = config.args.iter().map(|a| ctx.resolve(a)).collect();
        let timeout = seconds(config.timeout).or(self.settings.timeout);

        info!(
            node = %task.path,
            interpreter,
            script = %script_path.display(),
            "starting script process"
        );

        let mut cmd = Command::new(interpreter);
        cmd.arg(&script_path)
            .args(&args)
            .envs(
                ctx.variables()
                    .into_iter()
                    .map(|(name, value)| (env_var_name(&name), value)),
            )
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = within(
            timeout,
            |d| format!("Script execution timed out after {} seconds", d.as_secs()),
            async {
                cmd.output()
                    .await
                    .with_context(|| format!("spawning interpreter '{interpreter}'"))
                    .map_err(TaskError::from)
            },
        )
        .await?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let code = output.status.code().unwrap_or(-1);

        info!(
            node = %task.path,
            exit_code = code,
            success = output.status.success(),
            "script process exited"
        );

        if output.status.success() {
            return Ok(TaskOutput::empty().with_output(Value::String(stdout)));
        }

        let message = if stderr.trim().is_empty() {
            format!("Script exited with code {code}")
        } else {
            stderr.trim_end().to_string()
        };
        Err(TaskError::Failed {
            message,
            output: Some(Value::String(stdout)),
        })
    }
}

impl TaskExecutor for ScriptExecutor {
    fn execute<'a>(
        &'a self,
        task: Task<'a>,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, NodeResult> {
        Box::pin(async move {
            let started = Utc::now();
            let outcome = self.run(task, ctx).await;
            settle(task, started, outcome)
        })
    }
}

/// Pick the script to run: the configured path, or a scratch file holding
/// the resolved inline text.
fn prepare_script(
    config: &ScriptConfig,
    interpreter: &str,
    ctx: &ExecutionContext,
) -> Result<(PathBuf, Option<NamedTempFile>), TaskError> {
    let inline = config.script.as_deref().filter(|s| !s.trim().is_empty());
    let path = config.script_path.as_deref().filter(|p| !p.trim().is_empty());

    match (inline, path) {
        (_, Some(path)) => Ok((PathBuf::from(ctx.resolve(path)), None)),
        (Some(text), None) => {
            let body = ctx.resolve(text);
            let mut file = tempfile::Builder::new()
                .prefix("etlflow-script-")
                .suffix(extension_for(interpreter))
                .tempfile()
                .context("creating scratch script file")?;
            file.write_all(body.as_bytes())?;
            file.flush()?;
            debug!(path = %file.path().display(), "wrote scratch script");
            Ok((file.path().to_path_buf(), Some(file)))
        }
        (None, None) => Err(TaskError::Config(
            "Either script content or script path is required".into(),
        )),
    }
}

fn extension_for(interpreter: &str) -> &'static str {
    let program = Path::new(interpreter)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(interpreter)
        .to_ascii_lowercase();

    match program.as_str() {
        p if p.starts_with("python") => ".py",
        "node" | "nodejs" => ".js",
        "powershell" | "pwsh" => ".ps1",
        "cmd" => ".bat",
        "ruby" => ".rb",
        "perl" => ".pl",
        _ => ".sh",
    }
}

/// `ETL_VAR_` plus the name upper-cased, with anything outside
/// `[A-Z0-9_]` replaced by `_`.
pub fn env_var_name(name: &str) -> String {
    let mangled: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("ETL_VAR_{mangled}")
}
