//! Git operations, assembled as CLI invocations.

use super::shell::{ShellCapability, ShellRequest};
use super::CapabilityError;
use async_trait::async_trait;
use std::sync::Arc;

/// Git capability consumed by the engine.
#[async_trait]
pub trait GitCapability: Send + Sync {
    async fn run(
        &self,
        operation: &str,
        target: Option<&str>,
        options: &[(String, String)],
    ) -> Result<(), CapabilityError>;
}

/// Builds `git ...` command lines and runs them through the shell.
pub struct ShellGit {
    shell: Arc<dyn ShellCapability>,
}

impl ShellGit {
    pub fn new(shell: Arc<dyn ShellCapability>) -> Self {
        Self { shell }
    }
}

/// Assemble the command for one git statement.
pub fn build_git_command(
    operation: &str,
    target: Option<&str>,
    options: &[(String, String)],
) -> String {
    let mut parts: Vec<String> = vec!["git".to_string(), operation.to_string()];
    let mut clone_dir = None;
    for (key, value) in options {
        match key.as_str() {
            // `git clone "<url>" to "<dir>"`: positional destination.
            "to" if operation == "clone" => clone_dir = Some(value.clone()),
            "message" => {
                parts.push("-m".to_string());
                parts.push(shell_escape::escape(value.as_str().into()).into_owned());
            }
            _ => {
                parts.push(format!("--{key}"));
                parts.push(shell_escape::escape(value.as_str().into()).into_owned());
            }
        }
    }
    if let Some(target) = target {
        parts.push(shell_escape::escape(target.into()).into_owned());
    }
    if let Some(dir) = clone_dir {
        parts.push(shell_escape::escape(dir.into()).into_owned());
    }
    parts.join(" ")
}

#[async_trait]
impl GitCapability for ShellGit {
    async fn run(
        &self,
        operation: &str,
        target: Option<&str>,
        options: &[(String, String)],
    ) -> Result<(), CapabilityError> {
        let command = build_git_command(operation, target, options);
        self.shell
            .execute(ShellRequest::new(command).streamed())
            .await
            .map_err(|e| CapabilityError::Git(e.to_string()))?;
        Ok(())
    }
}
