use serde::Serialize;

use crate::protocols::ftp::FtpLog;
use crate::protocols::modbus::ModbusEvent;
use crate::protocols::ssh::SshLog;
use crate::tls::{HandshakeLog, HeartbleedLog};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SmtpHelp {
    pub response: String,
}

/// Everything one connection observed, appended to by each operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GrabData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ehlo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smtp_help: Option<SmtpHelp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starttls: Option<String>,
    #[serde(rename = "tls", skip_serializing_if = "Option::is_none")]
    pub tls_handshake: Option<HandshakeLog>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbleed: Option<HeartbleedLog>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh: Option<SshLog>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ftp: Option<FtpLog>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modbus: Option<ModbusEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_component: Option<&'static str>,
}
