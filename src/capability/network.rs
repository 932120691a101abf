//! Network probes: reachability, port checks, health endpoints.

use super::CapabilityError;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

/// Probe flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    /// Host reachability (TCP connect to the given or default port).
    Ping,
    /// Specific TCP port check.
    PortCheck,
    /// HTTP health endpoint expecting a 2xx.
    Health,
}

/// Probe outcome. Unreachable targets are a result, not an error;
/// errors are reserved for malformed requests.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub reachable: bool,
    pub latency: Duration,
}

/// Network capability consumed by the engine.
#[async_trait]
pub trait NetworkCapability: Send + Sync {
    async fn probe(
        &self,
        kind: ProbeKind,
        target: &str,
        port: Option<u16>,
        timeout: Option<Duration>,
    ) -> Result<ProbeResult, CapabilityError>;
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_PING_PORT: u16 = 80;

/// TCP/HTTP-based probe implementation. Plain ICMP needs elevated
/// privileges, so `ping` is a TCP connect measured for latency.
pub struct NetProbe {
    client: reqwest::Client,
}

impl Default for NetProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl NetProbe {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn connect(
        &self,
        target: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<ProbeResult, CapabilityError> {
        let address = format!("{target}:{port}");
        let start = Instant::now();
        let connected = tokio::time::timeout(timeout, TcpStream::connect(&address)).await;
        let latency = start.elapsed();
        let reachable = matches!(connected, Ok(Ok(_)));
        Ok(ProbeResult { reachable, latency })
    }
}

#[async_trait]
impl NetworkCapability for NetProbe {
    async fn probe(
        &self,
        kind: ProbeKind,
        target: &str,
        port: Option<u16>,
        timeout: Option<Duration>,
    ) -> Result<ProbeResult, CapabilityError> {
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        match kind {
            ProbeKind::Ping => {
                self.connect(target, port.unwrap_or(DEFAULT_PING_PORT), timeout)
                    .await
            }
            ProbeKind::PortCheck => {
                let port = port.ok_or_else(|| {
                    CapabilityError::Network("port check requires a port".to_string())
                })?;
                self.connect(target, port, timeout).await
            }
            ProbeKind::Health => {
                let start = Instant::now();
                let response = self
                    .client
                    .get(target)
                    .timeout(timeout)
                    .send()
                    .await;
                let latency = start.elapsed();
                let reachable = matches!(response, Ok(r) if r.status().is_success());
                Ok(ProbeResult { reachable, latency })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_port_check_against_local_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let probe = NetProbe::new();
        let result = probe
            .probe(ProbeKind::PortCheck, "127.0.0.1", Some(port), None)
            .await
            .unwrap();
        assert!(result.reachable);
    }

    #[tokio::test]
    async fn test_unreachable_port_is_not_an_error() {
        let probe = NetProbe::new();
        let result = probe
            .probe(
                ProbeKind::PortCheck,
                "127.0.0.1",
                Some(1),
                Some(Duration::from_millis(200)),
            )
            .await
            .unwrap();
        assert!(!result.reachable);
    }

    #[tokio::test]
    async fn test_port_check_requires_port() {
        let probe = NetProbe::new();
        let err = probe
            .probe(ProbeKind::PortCheck, "127.0.0.1", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.classification(), "network");
    }
}
