//! Scripted capability doubles for tests.
//!
//! Production code never constructs these; unit and integration tests
//! wire them into a [`Capabilities`] bundle so engine behavior can be
//! asserted without spawning processes or touching the network.

use super::detect::{DetectionCapability, ToolProbe};
use super::download::{DownloadCapability, DownloadRequest};
use super::file::LocalFile;
use super::http::{HttpCapability, HttpRequest, HttpResponse};
use super::network::{NetworkCapability, ProbeKind, ProbeResult};
use super::output::{MemorySink, OutputSink};
use super::secret::MemorySecrets;
use super::shell::{ShellCapability, ShellOutcome, ShellRequest};
use super::time::TimeSource;
use super::{Capabilities, CapabilityError, ShellDocker, ShellGit};
use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shell double: records every request, understands `echo`, and fails
/// on configured substrings.
#[derive(Default)]
pub struct ScriptedShell {
    executed: Mutex<Vec<ShellRequest>>,
    responses: Mutex<Vec<(String, String)>>,
    failures: Mutex<Vec<String>>,
    sink: Mutex<Option<Arc<dyn OutputSink>>>,
}

impl ScriptedShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands containing `needle` respond with `stdout`.
    pub fn respond(&self, needle: &str, stdout: &str) {
        self.responses
            .lock()
            .unwrap()
            .push((needle.to_string(), stdout.to_string()));
    }

    /// Commands containing `needle` exit non-zero.
    pub fn fail_on(&self, needle: &str) {
        self.failures.lock().unwrap().push(needle.to_string());
    }

    /// Forward streamed stdout to this sink, like the host shell does.
    pub fn attach_sink(&self, sink: Arc<dyn OutputSink>) {
        *self.sink.lock().unwrap() = Some(sink);
    }

    pub fn commands(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.command.clone())
            .collect()
    }
}

#[async_trait]
impl ShellCapability for ScriptedShell {
    async fn execute(&self, request: ShellRequest) -> Result<ShellOutcome, CapabilityError> {
        self.executed.lock().unwrap().push(request.clone());

        let failing = self
            .failures
            .lock()
            .unwrap()
            .iter()
            .any(|needle| request.command.contains(needle));
        if failing && !request.ignore_errors {
            return Err(CapabilityError::ExitStatus {
                code: 1,
                stderr: format!("scripted failure for `{}`", request.command),
            });
        }

        let stdout = self
            .responses
            .lock()
            .unwrap()
            .iter()
            .find(|(needle, _)| request.command.contains(needle))
            .map(|(_, stdout)| stdout.clone())
            .or_else(|| {
                request
                    .command
                    .strip_prefix("echo ")
                    .map(|rest| rest.to_string())
            })
            .unwrap_or_default();

        if request.stream && !stdout.is_empty() {
            if let Some(sink) = self.sink.lock().unwrap().clone() {
                for line in stdout.lines() {
                    sink.line(line);
                }
            }
        }

        Ok(ShellOutcome {
            stdout,
            stderr: String::new(),
            exit_code: if failing { 1 } else { 0 },
            duration: Duration::from_millis(1),
        })
    }
}

/// Detection double with a fixed tool table and environment.
#[derive(Default)]
pub struct StaticDetector {
    tools: Mutex<HashMap<String, ToolProbe>>,
    environment: Mutex<String>,
}

impl StaticDetector {
    pub fn new() -> Self {
        let detector = Self::default();
        *detector.environment.lock().unwrap() = "local".to_string();
        detector
    }

    pub fn tool(&self, name: &str, version: Option<&str>) {
        self.tools.lock().unwrap().insert(
            name.to_string(),
            ToolProbe {
                available: true,
                version: version.map(str::to_string),
            },
        );
    }

    pub fn set_environment(&self, env: &str) {
        *self.environment.lock().unwrap() = env.to_string();
    }
}

#[async_trait]
impl DetectionCapability for StaticDetector {
    async fn detect(&self, tool: &str) -> Result<ToolProbe, CapabilityError> {
        Ok(self
            .tools
            .lock()
            .unwrap()
            .get(tool)
            .cloned()
            .unwrap_or_default())
    }

    fn environment(&self) -> String {
        self.environment.lock().unwrap().clone()
    }
}

/// HTTP double with per-URL responses; unknown URLs get an empty 200.
#[derive(Default)]
pub struct StaticHttp {
    responses: Mutex<HashMap<String, HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl StaticHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, status: u16, body: &str) {
        self.responses.lock().unwrap().insert(
            url.to_string(),
            HttpResponse {
                status,
                headers: HashMap::new(),
                body: body.to_string(),
            },
        );
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpCapability for StaticHttp {
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, CapabilityError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(&request.url)
            .cloned()
            .unwrap_or(HttpResponse {
                status: 200,
                headers: HashMap::new(),
                body: String::new(),
            }))
    }
}

/// Download double: records requests and creates an empty file at the
/// target path so follow-up statements see it.
#[derive(Default)]
pub struct RecordingDownloader {
    requests: Mutex<Vec<DownloadRequest>>,
}

impl RecordingDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<DownloadRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl DownloadCapability for RecordingDownloader {
    async fn download(&self, request: DownloadRequest) -> Result<(), CapabilityError> {
        if !request.overwrite && std::path::Path::new(&request.path).exists() {
            return Err(CapabilityError::Download(format!(
                "target `{}` already exists (use `allow overwrite`)",
                request.path
            )));
        }
        tokio::fs::write(&request.path, b"")
            .await
            .map_err(|e| CapabilityError::Download(e.to_string()))?;
        self.requests.lock().unwrap().push(request);
        Ok(())
    }
}

/// Network double with a fixed answer.
pub struct StaticNetwork {
    pub reachable: bool,
}

#[async_trait]
impl NetworkCapability for StaticNetwork {
    async fn probe(
        &self,
        _kind: ProbeKind,
        _target: &str,
        _port: Option<u16>,
        _timeout: Option<Duration>,
    ) -> Result<ProbeResult, CapabilityError> {
        Ok(ProbeResult {
            reachable: self.reachable,
            latency: Duration::from_millis(1),
        })
    }
}

/// Pinned clock.
pub struct FixedTime {
    now: DateTime<Local>,
}

impl FixedTime {
    pub fn new(now: DateTime<Local>) -> Self {
        Self { now }
    }
}

impl Default for FixedTime {
    fn default() -> Self {
        Self {
            now: Local.with_ymd_and_hms(2024, 5, 4, 12, 30, 45).unwrap(),
        }
    }
}

impl TimeSource for FixedTime {
    fn now(&self) -> DateTime<Local> {
        self.now
    }
}

/// A fully scripted capability bundle plus handles to the doubles.
pub struct TestHarness {
    pub sink: Arc<MemorySink>,
    pub shell: Arc<ScriptedShell>,
    pub detect: Arc<StaticDetector>,
    pub http: Arc<StaticHttp>,
    pub download: Arc<RecordingDownloader>,
    pub secrets: Arc<MemorySecrets>,
    pub capabilities: Capabilities,
}

/// Build a scripted bundle: in-memory sink, scripted shell (echo-aware),
/// static detector, recording HTTP/download doubles, real local files,
/// pinned clock.
pub fn harness() -> TestHarness {
    let sink: Arc<MemorySink> = Arc::new(MemorySink::new());
    let shell = Arc::new(ScriptedShell::new());
    shell.attach_sink(sink.clone());
    let detect = Arc::new(StaticDetector::new());
    let http = Arc::new(StaticHttp::new());
    let download = Arc::new(RecordingDownloader::new());
    let secrets = Arc::new(MemorySecrets::new());

    let shell_dyn: Arc<dyn ShellCapability> = shell.clone();
    let capabilities = Capabilities {
        docker: Arc::new(ShellDocker::new(Arc::clone(&shell_dyn))),
        git: Arc::new(ShellGit::new(Arc::clone(&shell_dyn))),
        shell: shell_dyn,
        file: Arc::new(LocalFile::new()),
        http: http.clone(),
        download: download.clone(),
        network: Arc::new(StaticNetwork { reachable: true }),
        detect: detect.clone(),
        secrets: secrets.clone(),
        time: Arc::new(FixedTime::default()),
    };

    TestHarness {
        sink,
        shell,
        detect,
        http,
        download,
        secrets,
        capabilities,
    }
}
