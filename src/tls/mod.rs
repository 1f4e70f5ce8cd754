//! Instrumented TLS handshake: wire codecs, the measurement client and the
//! handshake recorder.

pub mod ciphers;
pub mod client;
pub mod kex;
pub mod log;
pub mod messages;
pub mod record;
pub mod x509;

pub use ciphers::{family_of, Browser, CipherFamily, CipherPolicy, CipherSuiteId, PolicyFlags};
pub use client::{HeartbleedLog, TlsConfig, TlsSession, Transcript};
pub use log::{HandshakeLog, HandshakeRecorder};
pub use x509::CaPool;

use serde::{Serialize, Serializer};
use std::fmt;

pub const VERSION_SSL30: u16 = 0x0300;
pub const VERSION_TLS10: u16 = 0x0301;
pub const VERSION_TLS11: u16 = 0x0302;
pub const VERSION_TLS12: u16 = 0x0303;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TlsVersion(pub u16);

impl TlsVersion {
    pub fn name(self) -> &'static str {
        match self.0 {
            VERSION_SSL30 => "SSLv3",
            VERSION_TLS10 => "TLSv1.0",
            VERSION_TLS11 => "TLSv1.1",
            VERSION_TLS12 => "TLSv1.2",
            0x0304 => "TLSv1.3",
            _ => "unknown",
        }
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#06x})", self.name(), self.0)
    }
}

impl Serialize for TlsVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("TlsVersion", 2)?;
        state.serialize_field("name", self.name())?;
        state.serialize_field("value", &self.0)?;
        state.end()
    }
}

/// Why a measurement handshake stopped before the server flight completed.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("i/o error during handshake: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "server sent {} alert: {}",
        record::alert_level_name(*.level),
        record::alert_name(*.description)
    )]
    Alert { level: u8, description: u8 },

    #[error("server accepted none of the offered cipher suites")]
    NoSharedCipher,

    #[error("server selected cipher suite {0:#06x} that was not offered")]
    UnofferedCipher(u16),

    #[error("server negotiated unsupported version {0:#06x}")]
    UnsupportedVersion(u16),

    #[error("unexpected handshake message type {0}")]
    UnexpectedMessage(u8),

    #[error("unexpected record content type {0}")]
    UnexpectedRecord(u8),

    #[error("malformed {0}")]
    Malformed(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_names() {
        assert_eq!(TlsVersion(VERSION_TLS12).name(), "TLSv1.2");
        assert_eq!(TlsVersion(0x7f17).name(), "unknown");
        let json = serde_json::to_value(TlsVersion(VERSION_SSL30)).unwrap();
        assert_eq!(json["name"], "SSLv3");
        assert_eq!(json["value"], 0x0300);
    }

    #[test]
    fn alert_errors_render_names() {
        let err = HandshakeError::Alert {
            level: 2,
            description: 40,
        };
        assert_eq!(err.to_string(), "server sent fatal alert: handshake_failure");
    }
}
