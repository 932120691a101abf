//! Capability interfaces.
//!
//! Every side effect the engine performs goes through one of these
//! traits: shell, file, HTTP, download, network probes, docker/git
//! command builders, tool detection, secrets, and time. The engine only
//! sees the trait objects, which keeps statement execution testable and
//! lets dry-run mode skip the side effects uniformly.
//!
//! Default implementations live next to their traits (`HostShell`,
//! `LocalFile`, `HttpClient`, …); scripted test doubles are under
//! [`testing`].

pub mod detect;
pub mod docker;
pub mod download;
pub mod file;
pub mod git;
pub mod http;
pub mod network;
pub mod output;
pub mod secret;
pub mod shell;
pub mod testing;
pub mod time;

pub use detect::{DetectionCapability, ToolDetector, ToolProbe, compare_versions};
pub use docker::{DockerCapability, ShellDocker};
pub use download::{DownloadCapability, DownloadRequest, Downloader, PermissionAssignment};
pub use file::{FileCapability, LocalFile};
pub use git::{GitCapability, ShellGit};
pub use http::{HttpAuth, HttpCapability, HttpClient, HttpRequest, HttpResponse};
pub use network::{NetProbe, NetworkCapability, ProbeKind, ProbeResult};
pub use output::{MemorySink, OutputSink, StdoutSink};
pub use secret::{MemorySecrets, SecretCapability};
pub use shell::{HostShell, ShellCapability, ShellOutcome, ShellRequest};
pub use time::{SystemTimeSource, TimeSource};

use crate::model::ShellConfig;
use std::sync::Arc;
use thiserror::Error;

/// Failures raised by capability implementations.
#[derive(Debug, Clone, Error)]
pub enum CapabilityError {
    #[error("command exited with code {code}: {stderr}")]
    ExitStatus { code: i32, stderr: String },
    #[error("timed out after {seconds}s")]
    Timeout { seconds: u64 },
    #[error("shell error: {0}")]
    Shell(String),
    #[error("file error: {0}")]
    File(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("http request returned status {status}")]
    HttpStatus { status: u16 },
    #[error("network error: {0}")]
    Network(String),
    #[error("download error: {0}")]
    Download(String),
    #[error("detection error: {0}")]
    Detection(String),
    #[error("docker error: {0}")]
    Docker(String),
    #[error("git error: {0}")]
    Git(String),
    #[error("secret error: {0}")]
    Secret(String),
}

impl CapabilityError {
    /// Error classification used by `catch <type>` matching.
    pub fn classification(&self) -> &'static str {
        match self {
            CapabilityError::ExitStatus { .. } | CapabilityError::Shell(_) => "shell",
            CapabilityError::Timeout { .. } => "timeout",
            CapabilityError::File(_) => "file",
            CapabilityError::Http(_) | CapabilityError::HttpStatus { .. } => "http",
            CapabilityError::Network(_) => "network",
            CapabilityError::Download(_) => "download",
            CapabilityError::Detection(_) => "detection",
            CapabilityError::Docker(_) => "docker",
            CapabilityError::Git(_) => "git",
            CapabilityError::Secret(_) => "secret",
        }
    }
}

/// The capability bundle handed to the engine.
#[derive(Clone)]
pub struct Capabilities {
    pub shell: Arc<dyn ShellCapability>,
    pub file: Arc<dyn FileCapability>,
    pub http: Arc<dyn HttpCapability>,
    pub download: Arc<dyn DownloadCapability>,
    pub network: Arc<dyn NetworkCapability>,
    pub docker: Arc<dyn DockerCapability>,
    pub git: Arc<dyn GitCapability>,
    pub detect: Arc<dyn DetectionCapability>,
    pub secrets: Arc<dyn SecretCapability>,
    pub time: Arc<dyn TimeSource>,
}

impl Capabilities {
    /// Production wiring: host shell, local filesystem, reqwest-backed
    /// HTTP/download, in-memory secrets.
    pub fn host(sink: Arc<dyn OutputSink>, shell_config: Option<ShellConfig>) -> Self {
        let shell: Arc<dyn ShellCapability> =
            Arc::new(HostShell::new(Arc::clone(&sink), shell_config));
        Self {
            docker: Arc::new(ShellDocker::new(Arc::clone(&shell))),
            git: Arc::new(ShellGit::new(Arc::clone(&shell))),
            shell,
            file: Arc::new(LocalFile::new()),
            http: Arc::new(HttpClient::new()),
            download: Arc::new(Downloader::new()),
            network: Arc::new(NetProbe::new()),
            detect: Arc::new(ToolDetector::new()),
            secrets: Arc::new(MemorySecrets::new()),
            time: Arc::new(SystemTimeSource),
        }
    }
}
