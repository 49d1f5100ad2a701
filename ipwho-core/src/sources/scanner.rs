//! Local port scan adapter
//!
//! Runs `nmap -sV -Pn --top-ports 100 -T4 <ip>` as a child process and parses
//! the `PORT STATE SERVICE VERSION` table of its normal output.
//!
//! The child runs under its own wall-clock budget. When the budget runs out
//! the pending future is dropped and `kill_on_drop` terminates the process.

use super::{join_ports, Source};
use crate::config::Config;
use crate::types::{ErrorKind, Fields, SourceFailure, SourceKind};
use async_trait::async_trait;
use std::io;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Fixed scan profile: version detection, no host discovery, top 100 ports,
/// aggressive timing
pub const SCAN_ARGS: [&str; 5] = ["-sV", "-Pn", "--top-ports", "100", "-T4"];

/// Port scanner
#[derive(Debug, Clone)]
pub struct ScannerSource {
    binary: PathBuf,
    timeout: Duration,
}

/// Open port found by the scanner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenPort {
    /// Port number
    pub port: u16,
    /// `tcp` or `udp`
    pub protocol: String,
    /// Service name, e.g. `ssh`
    pub service: String,
    /// Product and version detected by `-sV`, possibly empty
    pub version: String,
}

/// Parsed scanner output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Open ports in output order
    pub open_ports: Vec<OpenPort>,
    /// `Service Info:` line, if any
    pub service_info: Option<String>,
    /// True when nmap reported the host as down
    pub host_down: bool,
}

impl ScannerSource {
    /// Creates the adapter from configuration
    pub fn new(config: &Config) -> Self {
        Self {
            binary: config.endpoints.scanner_binary.clone(),
            timeout: config.scan_timeout,
        }
    }

    async fn run(&self, ip: IpAddr) -> Result<String, SourceFailure> {
        let mut command = Command::new(&self.binary);
        command
            .args(scan_args(ip))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|e| spawn_failure(&self.binary, e))?;
        debug!(pid = ?child.id(), binary = %self.binary.display(), "scanner started");

        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                SourceFailure::new(
                    ErrorKind::Timeout,
                    format!("scan exceeded {}s and was terminated", self.timeout.as_secs()),
                )
            })?
            .map_err(|e| SourceFailure::new(ErrorKind::ProcessError, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SourceFailure::new(
                ErrorKind::ProcessError,
                format!("{} exited with {}: {}", self.binary.display(), output.status, stderr.trim()),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Full nmap argument list for `ip`; IPv6 targets need `-6`
pub fn scan_args(ip: IpAddr) -> Vec<String> {
    let mut args: Vec<String> = SCAN_ARGS.iter().map(|a| a.to_string()).collect();
    if ip.is_ipv6() {
        args.push("-6".to_string());
    }
    args.push(ip.to_string());
    args
}

fn spawn_failure(binary: &std::path::Path, err: io::Error) -> SourceFailure {
    let kind = match err.kind() {
        io::ErrorKind::NotFound => ErrorKind::ToolNotFound,
        _ => ErrorKind::ProcessError,
    };
    SourceFailure::new(kind, format!("failed to start {}: {}", binary.display(), err))
}

/// Parses nmap normal output
pub fn parse_output(stdout: &str) -> ScanSummary {
    let mut summary = ScanSummary::default();

    for line in stdout.lines() {
        let line = line.trim();
        if let Some(info) = line.strip_prefix("Service Info:") {
            summary.service_info = Some(info.trim().to_string());
            continue;
        }
        if line.contains("Host seems down") || line.contains("(0 hosts up)") {
            summary.host_down = true;
            continue;
        }
        if let Some(port) = parse_port_line(line) {
            summary.open_ports.push(port);
        }
    }

    summary
}

/// Parses one `22/tcp open ssh OpenSSH 8.2p1` row; other rows yield `None`
fn parse_port_line(line: &str) -> Option<OpenPort> {
    let mut tokens = line.split_whitespace();
    let (port, protocol) = tokens.next()?.split_once('/')?;
    let port = port.parse::<u16>().ok()?;
    if tokens.next()? != "open" {
        return None;
    }
    let service = tokens.next().unwrap_or("unknown").to_string();
    let version = tokens.collect::<Vec<_>>().join(" ");

    Some(OpenPort {
        port,
        protocol: protocol.to_string(),
        service,
        version,
    })
}

impl ScanSummary {
    /// Converts the summary into report fields
    pub fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        if self.host_down && self.open_ports.is_empty() {
            fields.insert("Host Status", "down or not responding");
        }

        let ports: Vec<u16> = self.open_ports.iter().map(|p| p.port).collect();
        fields.insert(
            "Open Ports",
            if ports.is_empty() {
                "None".to_string()
            } else {
                join_ports(&ports)
            },
        );
        for port in self.open_ports {
            let label = format!("{}/{}", port.port, port.protocol);
            let value = if port.version.is_empty() {
                port.service
            } else {
                format!("{} {}", port.service, port.version)
            };
            fields.insert(label, value);
        }
        if let Some(info) = self.service_info {
            fields.insert("Service Info", info);
        }
        fields
    }
}

#[async_trait]
impl Source for ScannerSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Scanner
    }

    async fn lookup(&self, ip: IpAddr) -> Result<Fields, SourceFailure> {
        let stdout = self.run(ip).await?;
        Ok(parse_output(&stdout).into_fields())
    }
}
