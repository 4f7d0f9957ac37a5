//! Transports for delivering ESC/POS data to a physical printer
//!
//! Each send opens its own channel, writes the full buffer, flushes and
//! tears down. Transports never retry internally: a failed send surfaces as
//! an error, because silently retrying against a physical printer risks
//! duplicate output.

use crate::error::{PrintError, PrintResult};
use serde::Serialize;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{info, instrument, warn};

/// Result of a reachability probe, consumed by health reporting
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    /// Whether the printer looks reachable
    pub reachable: bool,
    /// Backend-specific diagnostic
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProbeReport {
    pub fn reachable(detail: impl Into<String>) -> Self {
        Self {
            reachable: true,
            detail: Some(detail.into()),
        }
    }

    pub fn unreachable(detail: impl Into<String>) -> Self {
        Self {
            reachable: false,
            detail: Some(detail.into()),
        }
    }
}

/// Trait for printer transports
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Send raw ESC/POS data to the printer
    async fn send(&self, data: &[u8]) -> PrintResult<()>;

    /// Check if the printer is reachable, without sending a job
    async fn probe(&self) -> ProbeReport;
}

/// Network transport (raw TCP, conventionally port 9100)
///
/// Most thermal printers accept raw ESC/POS bytes on port 9100. A socket is
/// opened per send and closed once the buffer is flushed. The host may be a
/// hostname; resolution happens at connect time, under the same timeout, so
/// a DNS-named printer that is down at startup does not block configuration.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    target: String,
    timeout: Duration,
}

impl TcpTransport {
    /// Create a new TCP transport
    pub fn new(host: &str, port: u16) -> PrintResult<Self> {
        if host.is_empty() {
            return Err(PrintError::InvalidConfig("Empty printer host".to_string()));
        }

        Ok(Self {
            target: format!("{}:{}", host, port),
            timeout: Duration::from_secs(5),
        })
    }

    /// Set connection/write timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the printer target as `host:port`
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Transport for TcpTransport {
    #[instrument(skip(data), fields(addr = %self.target, data_len = data.len()))]
    async fn send(&self, data: &[u8]) -> PrintResult<()> {
        info!("Connecting to printer");

        let mut stream =
            tokio::time::timeout(self.timeout, TcpStream::connect(self.target.as_str()))
                .await
                .map_err(|_| PrintError::Timeout(format!("Connection timeout: {}", self.target)))?
                .map_err(|e| PrintError::Connection(format!("{}: {}", self.target, e)))?;

        info!("Connected, sending {} bytes", data.len());

        tokio::time::timeout(self.timeout, stream.write_all(data))
            .await
            .map_err(|_| PrintError::Timeout(format!("Write timeout: {}", self.target)))?
            .map_err(|e| {
                PrintError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Write failed: {}", e),
                ))
            })?;

        stream.flush().await?;
        stream.shutdown().await?;

        info!("Print data sent successfully");
        Ok(())
    }

    #[instrument(fields(addr = %self.target))]
    async fn probe(&self) -> ProbeReport {
        let check_timeout = Duration::from_millis(500);

        match tokio::time::timeout(check_timeout, TcpStream::connect(self.target.as_str())).await {
            Ok(Ok(_)) => {
                info!("Printer online");
                ProbeReport::reachable(format!("tcp {} accepts connections", self.target))
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Printer offline");
                ProbeReport::unreachable(format!("tcp {}: {}", self.target, e))
            }
            Err(_) => {
                warn!("Printer check timeout");
                ProbeReport::unreachable(format!("tcp {}: probe timeout", self.target))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcp_transport_new() {
        let printer = TcpTransport::new("192.168.1.100", 9100).unwrap();
        assert_eq!(printer.target(), "192.168.1.100:9100");

        // Hostnames are accepted; resolution is deferred to connect time
        let printer = TcpTransport::new("printer.lan", 9100).unwrap();
        assert_eq!(printer.target(), "printer.lan:9100");
    }

    #[test]
    fn test_empty_host_rejected() {
        let result = TcpTransport::new("", 9100);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_probe_unreachable() {
        // TEST-NET-1 address, nothing listens there
        let printer =
            TcpTransport::new("192.0.2.1", 9100).unwrap();
        let report = printer.probe().await;
        assert!(!report.reachable);
        assert!(report.detail.is_some());
    }

    #[tokio::test]
    async fn test_probe_resolves_hostnames() {
        // Port 1 is closed; the point is that a name, not just an IP
        // literal, reaches the connect attempt
        let printer = TcpTransport::new("localhost", 1).unwrap();
        let report = printer.probe().await;
        assert!(!report.reachable);
    }
}
