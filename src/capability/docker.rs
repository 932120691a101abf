//! Docker operations, assembled as CLI invocations.
//!
//! The engine hands over the parsed statement (`operation`, optional
//! resource, optional name, option pairs); the capability builds the
//! `docker` argv and delegates to the shell capability.

use super::shell::{ShellCapability, ShellRequest};
use super::CapabilityError;
use async_trait::async_trait;
use std::sync::Arc;

/// Docker capability consumed by the engine.
#[async_trait]
pub trait DockerCapability: Send + Sync {
    async fn run(
        &self,
        operation: &str,
        resource: Option<&str>,
        name: Option<&str>,
        options: &[(String, String)],
    ) -> Result<(), CapabilityError>;
}

/// Builds `docker ...` command lines and runs them through the shell.
pub struct ShellDocker {
    shell: Arc<dyn ShellCapability>,
}

impl ShellDocker {
    pub fn new(shell: Arc<dyn ShellCapability>) -> Self {
        Self { shell }
    }
}

/// Assemble the argv for one docker statement. Kept free-standing so the
/// mapping is testable without a docker binary.
pub fn build_docker_command(
    operation: &str,
    resource: Option<&str>,
    name: Option<&str>,
    options: &[(String, String)],
) -> String {
    let mut parts: Vec<String> = vec!["docker".to_string()];
    if resource == Some("compose") {
        parts.push("compose".to_string());
        parts.push(operation.to_string());
    } else {
        parts.push(operation.to_string());
    }

    let mut tag_suffix = None;
    for (key, value) in options {
        match key.as_str() {
            // `tag` merges into the image reference for build/push/pull.
            "tag" if matches!(operation, "build" | "push" | "pull") => {
                tag_suffix = Some(value.clone());
            }
            "context" | "path" => {}
            _ => {
                parts.push(format!("--{key}"));
                parts.push(shell_escape::escape(value.as_str().into()).into_owned());
            }
        }
    }

    if let Some(image) = name {
        let reference = match &tag_suffix {
            Some(tag) => format!("{image}:{tag}"),
            None => image.to_string(),
        };
        if operation == "build" {
            parts.push("-t".to_string());
            parts.push(shell_escape::escape(reference.into()).into_owned());
        } else {
            parts.push(shell_escape::escape(reference.into()).into_owned());
        }
    }

    if operation == "build" {
        let context = options
            .iter()
            .find(|(k, _)| k == "context" || k == "path")
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| ".".to_string());
        parts.push(shell_escape::escape(context.into()).into_owned());
    }

    parts.join(" ")
}

#[async_trait]
impl DockerCapability for ShellDocker {
    async fn run(
        &self,
        operation: &str,
        resource: Option<&str>,
        name: Option<&str>,
        options: &[(String, String)],
    ) -> Result<(), CapabilityError> {
        let command = build_docker_command(operation, resource, name, options);
        self.shell
            .execute(ShellRequest::new(command).streamed())
            .await
            .map_err(|e| CapabilityError::Docker(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_with_tag_and_context() {
        let cmd = build_docker_command(
            "build",
            Some("image"),
            Some("ghcr.io/acme/app"),
            &[("tag".into(), "v1".into())],
        );
        assert_eq!(cmd, "docker build -t ghcr.io/acme/app:v1 .");
    }

    #[test]
    fn test_push_merges_tag() {
        let cmd = build_docker_command(
            "push",
            Some("image"),
            Some("app"),
            &[("tag".into(), "latest".into())],
        );
        assert_eq!(cmd, "docker push app:latest");
    }

    #[test]
    fn test_compose_subcommand() {
        let cmd = build_docker_command("up", Some("compose"), None, &[]);
        assert_eq!(cmd, "docker compose up");
    }

    #[test]
    fn test_generic_options_become_flags() {
        let cmd = build_docker_command(
            "run",
            Some("container"),
            Some("redis"),
            &[("publish".into(), "6379:6379".into())],
        );
        assert_eq!(cmd, "docker run --publish 6379:6379 redis");
    }
}
