//! Shell command execution.
//!
//! Commands run through the platform shell (`sh -c` by default, or the
//! project's `shell config` override) via `tokio::process::Command`.
//! Streamed mode forwards stdout/stderr lines to the output sink as they
//! arrive; captured mode only collects them. Timeouts kill the child.

use super::output::OutputSink;
use super::CapabilityError;
use crate::model::ShellConfig;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

/// A shell invocation.
#[derive(Debug, Clone, Default)]
pub struct ShellRequest {
    pub command: String,
    pub working_dir: Option<PathBuf>,
    pub env: HashMap<String, String>,
    pub timeout: Option<Duration>,
    /// Forward output lines to the sink while running.
    pub stream: bool,
    /// Treat a non-zero exit as success (`try` bodies set this path up
    /// differently; this is for callers that only want the outcome).
    pub ignore_errors: bool,
}

impl ShellRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn streamed(mut self) -> Self {
        self.stream = true;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Outcome of a shell invocation.
#[derive(Debug, Clone)]
pub struct ShellOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
}

impl ShellOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Shell capability consumed by the engine.
#[async_trait]
pub trait ShellCapability: Send + Sync {
    /// Execute a command. Non-zero exit is an error unless
    /// `ignore_errors` is set on the request.
    async fn execute(&self, request: ShellRequest) -> Result<ShellOutcome, CapabilityError>;
}

/// Executes commands on the host through the configured shell.
pub struct HostShell {
    sink: Arc<dyn OutputSink>,
    config: Option<ShellConfig>,
}

impl HostShell {
    pub fn new(sink: Arc<dyn OutputSink>, config: Option<ShellConfig>) -> Self {
        Self { sink, config }
    }

    /// Shell executable and leading args for this platform.
    fn shell_invocation(&self) -> (String, Vec<String>) {
        if let Some(config) = &self.config {
            if let Some(executable) = &config.executable {
                let mut args = config.args.clone();
                if args.is_empty() {
                    args.push("-c".to_string());
                }
                return (executable.clone(), args);
            }
        }
        if cfg!(target_os = "windows") {
            ("cmd".to_string(), vec!["/C".to_string()])
        } else {
            ("sh".to_string(), vec!["-c".to_string()])
        }
    }
}

#[async_trait]
impl ShellCapability for HostShell {
    async fn execute(&self, request: ShellRequest) -> Result<ShellOutcome, CapabilityError> {
        let (shell, shell_args) = self.shell_invocation();
        debug!(command = %request.command, shell = %shell, "executing shell command");

        let mut command = Command::new(&shell);
        command.args(&shell_args).arg(&request.command);
        if let Some(dir) = &request.working_dir {
            command.current_dir(dir);
        }
        if let Some(config) = &self.config {
            for (key, value) in &config.environment {
                command.env(key, value);
            }
        }
        for (key, value) in &request.env {
            command.env(key, value);
        }
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        command.kill_on_drop(true);

        let start = Instant::now();
        let mut child = command
            .spawn()
            .map_err(|e| CapabilityError::Shell(format!("failed to spawn `{shell}`: {e}")))?;

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let sink = Arc::clone(&self.sink);
        let stream = request.stream;

        let stdout_task = tokio::spawn(drain_pipe(stdout_pipe, stream.then(|| Arc::clone(&sink))));
        let stderr_task = tokio::spawn(drain_pipe(stderr_pipe, stream.then(|| sink)));

        let status = if let Some(timeout) = request.timeout {
            match tokio::time::timeout(timeout, child.wait()).await {
                Ok(result) => {
                    result.map_err(|e| CapabilityError::Shell(format!("wait failed: {e}")))?
                }
                Err(_) => {
                    let _ = child.kill().await;
                    return Err(CapabilityError::Timeout {
                        seconds: timeout.as_secs(),
                    });
                }
            }
        } else {
            child
                .wait()
                .await
                .map_err(|e| CapabilityError::Shell(format!("wait failed: {e}")))?
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();
        let exit_code = status.code().unwrap_or(-1);
        let outcome = ShellOutcome {
            stdout,
            stderr,
            exit_code,
            duration: start.elapsed(),
        };

        if !outcome.success() && !request.ignore_errors {
            return Err(CapabilityError::ExitStatus {
                code: outcome.exit_code,
                stderr: outcome.stderr.trim().to_string(),
            });
        }
        Ok(outcome)
    }
}

/// Read a child pipe to completion, optionally forwarding each line to
/// the sink, and return the collected text.
async fn drain_pipe<R>(pipe: Option<R>, sink: Option<Arc<dyn OutputSink>>) -> String
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let Some(pipe) = pipe else {
        return String::new();
    };
    let mut collected = String::new();
    let mut lines = BufReader::new(pipe).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(sink) = &sink {
            sink.line(&line);
        }
        collected.push_str(&line);
        collected.push('\n');
    }
    collected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::output::MemorySink;

    fn host_shell(sink: Arc<MemorySink>) -> HostShell {
        HostShell::new(sink, None)
    }

    #[tokio::test]
    async fn test_capture_simple_command() {
        let sink = Arc::new(MemorySink::new());
        let shell = host_shell(Arc::clone(&sink));
        let outcome = shell
            .execute(ShellRequest::new("echo hello"))
            .await
            .unwrap();
        assert!(outcome.success());
        assert!(outcome.stdout.contains("hello"));
        // Not streamed, nothing reaches the sink.
        assert!(sink.lines().is_empty());
    }

    #[tokio::test]
    async fn test_streamed_output_reaches_sink() {
        let sink = Arc::new(MemorySink::new());
        let shell = host_shell(Arc::clone(&sink));
        let outcome = shell
            .execute(ShellRequest::new("echo streamed-line").streamed())
            .await
            .unwrap();
        assert!(outcome.success());
        assert!(sink.contains("streamed-line"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_error() {
        let sink = Arc::new(MemorySink::new());
        let shell = host_shell(sink);
        let err = shell.execute(ShellRequest::new("exit 3")).await.unwrap_err();
        assert!(matches!(err, CapabilityError::ExitStatus { code: 3, .. }));
        assert_eq!(err.classification(), "shell");
    }

    #[tokio::test]
    async fn test_ignore_errors_returns_outcome() {
        let sink = Arc::new(MemorySink::new());
        let shell = host_shell(sink);
        let mut request = ShellRequest::new("exit 3");
        request.ignore_errors = true;
        let outcome = shell.execute(request).await.unwrap();
        assert_eq!(outcome.exit_code, 3);
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let sink = Arc::new(MemorySink::new());
        let shell = host_shell(sink);
        let err = shell
            .execute(ShellRequest::new("sleep 5").with_timeout(Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::Timeout { .. }));
        assert_eq!(err.classification(), "timeout");
    }

    #[tokio::test]
    async fn test_env_passed_to_command() {
        let sink = Arc::new(MemorySink::new());
        let shell = host_shell(sink);
        let mut request = ShellRequest::new("echo $DROVER_TEST_VAR");
        request.env.insert("DROVER_TEST_VAR".into(), "set-by-test".into());
        let outcome = shell.execute(request).await.unwrap();
        assert!(outcome.stdout.contains("set-by-test"));
    }
}
