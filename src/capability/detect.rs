//! Tool and environment detection.

use super::shell::{ShellCapability, ShellRequest};
use super::CapabilityError;
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, LazyLock};

/// Result of probing one tool.
#[derive(Debug, Clone, Default)]
pub struct ToolProbe {
    pub available: bool,
    pub version: Option<String>,
}

/// Detection capability consumed by the engine.
#[async_trait]
pub trait DetectionCapability: Send + Sync {
    /// Probe one tool for availability and, where possible, a version.
    async fn detect(&self, tool: &str) -> Result<ToolProbe, CapabilityError>;
    /// Name of the current execution environment (`ci`, `local`, or an
    /// explicit override).
    fn environment(&self) -> String;
}

static VERSION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(\.\d+)+").expect("version regex"));

/// PATH-based detector with a `--version` probe.
pub struct ToolDetector {
    shell: Option<Arc<dyn ShellCapability>>,
}

impl Default for ToolDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolDetector {
    pub fn new() -> Self {
        Self { shell: None }
    }

    /// Use the given shell for `--version` probes instead of spawning
    /// directly.
    pub fn with_shell(shell: Arc<dyn ShellCapability>) -> Self {
        Self { shell: Some(shell) }
    }

    async fn probe_version(&self, tool: &str) -> Option<String> {
        let output = match &self.shell {
            Some(shell) => {
                let mut request = ShellRequest::new(format!("{tool} --version"));
                request.ignore_errors = true;
                let outcome = shell.execute(request).await.ok()?;
                format!("{}\n{}", outcome.stdout, outcome.stderr)
            }
            None => {
                let output = tokio::process::Command::new(tool)
                    .arg("--version")
                    .output()
                    .await
                    .ok()?;
                format!(
                    "{}\n{}",
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr)
                )
            }
        };
        VERSION_REGEX
            .find(&output)
            .map(|m| m.as_str().to_string())
    }
}

#[async_trait]
impl DetectionCapability for ToolDetector {
    async fn detect(&self, tool: &str) -> Result<ToolProbe, CapabilityError> {
        if which::which(tool).is_err() {
            return Ok(ToolProbe {
                available: false,
                version: None,
            });
        }
        let version = self.probe_version(tool).await;
        Ok(ToolProbe {
            available: true,
            version,
        })
    }

    fn environment(&self) -> String {
        if let Ok(env) = std::env::var("DROVER_ENV") {
            if !env.is_empty() {
                return env;
            }
        }
        if std::env::var("CI").is_ok_and(|v| !v.is_empty() && v != "false") {
            return "ci".to_string();
        }
        "local".to_string()
    }
}

/// Compare two dotted version strings numerically, segment by segment.
pub fn compare_versions(left: &str, right: &str) -> std::cmp::Ordering {
    let parse = |s: &str| -> Vec<u64> {
        s.trim()
            .trim_start_matches('v')
            .split('.')
            .map(|seg| {
                seg.chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect::<String>()
                    .parse()
                    .unwrap_or(0)
            })
            .collect()
    };
    let left = parse(left);
    let right = parse(right);
    let len = left.len().max(right.len());
    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            std::cmp::Ordering::Equal => continue,
            other => return other,
        }
    }
    std::cmp::Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[tokio::test]
    async fn test_missing_tool_is_unavailable() {
        let detector = ToolDetector::new();
        let probe = detector.detect("definitely-not-a-real-tool-xyz").await.unwrap();
        assert!(!probe.available);
        assert!(probe.version.is_none());
    }

    #[tokio::test]
    async fn test_sh_is_available() {
        let detector = ToolDetector::new();
        let probe = detector.detect("sh").await.unwrap();
        assert!(probe.available);
    }

    #[test]
    fn test_version_comparison() {
        assert_eq!(compare_versions("18.2.0", "18"), Ordering::Greater);
        assert_eq!(compare_versions("v1.2.3", "1.2.3"), Ordering::Equal);
        assert_eq!(compare_versions("2.10", "2.9"), Ordering::Greater);
        assert_eq!(compare_versions("1.0", "1.0.1"), Ordering::Less);
    }

    #[test]
    fn test_version_regex_extracts_from_banner() {
        let m = VERSION_REGEX.find("git version 2.39.5 (Apple Git)").unwrap();
        assert_eq!(m.as_str(), "2.39.5");
    }
}
