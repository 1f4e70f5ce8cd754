#[cfg(feature = "cli")]
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::conn::GrabData;
use crate::protocols::ssh::SshScanConfig;
use crate::tls::CipherPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSpec {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct Target {
    pub original: TargetSpec,
    pub resolved: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub target: Option<TargetSpec>,
    pub input: Option<PathBuf>,
    pub concurrency: usize,
    pub rate: u32,
    pub connect_timeout: Duration,
    /// I/O deadline for each connection, carried across the TLS upgrade.
    pub read_timeout: Duration,
    pub overall_timeout: Duration,
    pub protocol: Protocol,
    pub tls: TlsScanConfig,
    pub mail: MailConfig,
    pub ftp_auth_tls: bool,
    pub ssh: SshScanConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone)]
pub struct TlsScanConfig {
    pub max_version: u16,
    /// SNI name; the target host is used when absent.
    pub domain: Option<String>,
    pub no_sni: bool,
    pub extended_random: bool,
    pub policy: CipherPolicy,
    pub heartbleed: bool,
    pub ca_file: Option<PathBuf>,
}

impl Default for TlsScanConfig {
    fn default() -> Self {
        Self {
            max_version: crate::tls::VERSION_TLS12,
            domain: None,
            no_sni: false,
            extended_random: false,
            policy: CipherPolicy::Default,
            heartbleed: false,
            ca_file: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MailConfig {
    pub starttls: bool,
    pub ehlo: Option<String>,
    pub smtp_help: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Banner,
    Ftp,
    Imap,
    Modbus,
    Pop3,
    #[cfg_attr(feature = "cli", value(alias = "submission"))]
    Smtp,
    Ssh,
    #[cfg_attr(feature = "cli", value(alias = "https"))]
    Tls,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(ValueEnum))]
pub enum OutputFormat {
    Jsonl,
    Pretty,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Jsonl => write!(f, "jsonl"),
            OutputFormat::Pretty => write!(f, "pretty"),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Protocol::Banner => "banner",
            Protocol::Ftp => "ftp",
            Protocol::Imap => "imap",
            Protocol::Modbus => "modbus",
            Protocol::Pop3 => "pop3",
            Protocol::Smtp => "smtp",
            Protocol::Ssh => "ssh",
            Protocol::Tls => "tls",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub target: TargetView,
    pub protocol: Protocol,
    pub status: Status,
    pub timestamp: String,
    pub tcp: TcpMeta,
    pub data: GrabData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetView {
    pub host: String,
    pub addr: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TcpMeta {
    pub connect_ms: Option<u128>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostics {
    pub stage: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Timeout,
    Error,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum ReadStopReason {
    #[default]
    ConnectionClosed,
    Delimiter,
    SizeLimit,
}

impl Target {
    pub fn view(&self) -> TargetView {
        TargetView {
            host: self.original.host.clone(),
            addr: self.resolved.ip().to_string(),
            port: self.resolved.port(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_view_formats() {
        let target = Target {
            original: TargetSpec {
                host: "example".into(),
                port: 443,
            },
            resolved: "127.0.0.1:443".parse().unwrap(),
        };
        let view = target.view();
        assert_eq!(view.addr, "127.0.0.1");
        assert_eq!(view.port, 443);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Status::Timeout).unwrap(), "\"timeout\"");
        assert_eq!(Protocol::Pop3.to_string(), "pop3");
    }
}
