// src/prompt.rs

//! Host prompt capability used by variable nodes in `prompt` mode.

use futures::future::BoxFuture;
use tracing::{debug, warn};

/// Ask the host for a value. `None` means no value was provided (for
/// example the user cancelled), which variable nodes treat as an error.
pub trait Prompter: Send + Sync {
    fn prompt_for_value<'a>(
        &'a self,
        name: &'a str,
        message: &'a str,
        default: Option<&'a str>,
    ) -> BoxFuture<'a, Option<String>>;
}

/// Interactive terminal prompt built on `dialoguer`.
#[derive(Debug, Clone, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn prompt_for_value<'a>(
        &'a self,
        name: &'a str,
        message: &'a str,
        default: Option<&'a str>,
    ) -> BoxFuture<'a, Option<String>> {
        let prompt = if message.trim().is_empty() {
            format!("Value for {name}")
        } else {
            message.to_string()
        };
        let default = default.map(str::to_string);
        let name = name.to_string();

        Box::pin(async move {
            let answer = tokio::task::spawn_blocking(move || {
                let mut input = dialoguer::Input::<String>::new()
                    .with_prompt(prompt)
                    .allow_empty(true);
                if let Some(default) = default {
                    input = input.default(default);
                }
                input.interact_text()
            })
            .await;

            match answer {
                Ok(Ok(value)) => Some(value),
                Ok(Err(e)) => {
                    warn!(variable = %name, error = %e, "prompt aborted");
                    None
                }
                Err(e) => {
                    warn!(variable = %name, error = %e, "prompt task failed");
                    None
                }
            }
        })
    }
}

/// Prompter for unattended runs: answers with the default, if any.
#[derive(Debug, Clone, Default)]
pub struct NonInteractivePrompter;

impl Prompter for NonInteractivePrompter {
    fn prompt_for_value<'a>(
        &'a self,
        name: &'a str,
        _message: &'a str,
        default: Option<&'a str>,
    ) -> BoxFuture<'a, Option<String>> {
        debug!(variable = %name, has_default = default.is_some(), "non-interactive prompt");
        let answer = default.map(str::to_string);
        Box::pin(async move { answer })
    }
}
