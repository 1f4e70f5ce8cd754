use std::io;

use crate::protocols::ftp::FtpError;
use crate::protocols::modbus::ModbusError;
use crate::protocols::ssh::SshError;
use crate::tls::HandshakeError;

#[derive(Debug, thiserror::Error)]
pub enum ConnError {
    #[error("attempted repeat handshake with remote host {peer}")]
    RepeatHandshake { peer: String },

    #[error("attempted STARTTLS after TLS handshake with remote host {peer}")]
    StartTlsAfterTls { peer: String },

    #[error("must perform TLS handshake before sending Heartbleed probe to {peer}")]
    HandshakeRequired { peer: String },

    #[error("server did not indicate support for {protocol} STARTTLS")]
    StartTlsRejected {
        protocol: &'static str,
        response: String,
    },

    #[error("{protocol} response exceeded {limit} bytes")]
    ResponseTooLong { protocol: &'static str, limit: usize },

    #[error("the upgraded session carries no application data")]
    NoApplicationData,

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("TLS handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("FTP: {0}")]
    Ftp(#[from] FtpError),

    #[error("SSH: {0}")]
    Ssh(#[from] SshError),

    #[error("Modbus: {0}")]
    Modbus(#[from] ModbusError),
}

impl ConnError {
    /// Short label for the component that failed, recorded in scan output.
    pub fn component(&self) -> &'static str {
        match self {
            ConnError::RepeatHandshake { .. } | ConnError::Handshake(_) => "tls",
            ConnError::HandshakeRequired { .. } => "heartbleed",
            ConnError::StartTlsAfterTls { .. } | ConnError::StartTlsRejected { .. } => "starttls",
            ConnError::ResponseTooLong { .. } | ConnError::NoApplicationData | ConnError::Io(_) => {
                "connection"
            }
            ConnError::Ftp(_) => "ftp",
            ConnError::Ssh(_) => "ssh",
            ConnError::Modbus(_) => "modbus",
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            ConnError::Io(err) => err.kind() == io::ErrorKind::TimedOut,
            ConnError::Handshake(HandshakeError::Io(err)) => err.kind() == io::ErrorKind::TimedOut,
            ConnError::Ftp(FtpError::Io(err)) | ConnError::Ssh(SshError::Io(err)) => {
                err.kind() == io::ErrorKind::TimedOut
            }
            ConnError::Modbus(ModbusError::Io(err)) => err.kind() == io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}
