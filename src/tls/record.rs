//! TLS record layer framing for plaintext records.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::HandshakeError;

pub const CONTENT_CHANGE_CIPHER_SPEC: u8 = 20;
pub const CONTENT_ALERT: u8 = 21;
pub const CONTENT_HANDSHAKE: u8 = 22;
pub const CONTENT_APPLICATION_DATA: u8 = 23;
pub const CONTENT_HEARTBEAT: u8 = 24;

pub const MAX_PLAINTEXT: usize = 16384;
// Compressed/encrypted records may exceed the plaintext limit by up to 2048.
const MAX_RECORD: usize = MAX_PLAINTEXT + 2048;
// Largest handshake message a server may declare; certificate chains and
// key exchanges fit well below this.
pub const MAX_HANDSHAKE_MESSAGE: usize = 64 * 1024;

pub const ALERT_LEVEL_WARNING: u8 = 1;
pub const ALERT_LEVEL_FATAL: u8 = 2;
pub const ALERT_CLOSE_NOTIFY: u8 = 0;
pub const ALERT_HANDSHAKE_FAILURE: u8 = 40;
pub const ALERT_INSUFFICIENT_SECURITY: u8 = 71;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub content_type: u8,
    pub version: u16,
    pub payload: Vec<u8>,
}

pub async fn read_record<S>(stream: &mut S) -> io::Result<Record>
where
    S: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; 5];
    stream.read_exact(&mut header).await?;
    let content_type = header[0];
    let version = u16::from_be_bytes([header[1], header[2]]);
    let len = u16::from_be_bytes([header[3], header[4]]) as usize;
    if len > MAX_RECORD {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("record length {len} exceeds maximum"),
        ));
    }
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await?;
    Ok(Record {
        content_type,
        version,
        payload,
    })
}

/// Writes `payload`, splitting it into records no larger than the plaintext
/// limit.
pub async fn write_record<S>(
    stream: &mut S,
    content_type: u8,
    version: u16,
    payload: &[u8],
) -> io::Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    let mut out = Vec::with_capacity(payload.len() + 5);
    let mut chunks = payload.chunks(MAX_PLAINTEXT).peekable();
    if chunks.peek().is_none() {
        encode_record(&mut out, content_type, version, &[]);
    }
    for chunk in chunks {
        encode_record(&mut out, content_type, version, chunk);
    }
    stream.write_all(&out).await?;
    stream.flush().await
}

pub fn encode_record(out: &mut Vec<u8>, content_type: u8, version: u16, payload: &[u8]) {
    out.push(content_type);
    out.extend_from_slice(&version.to_be_bytes());
    out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    out.extend_from_slice(payload);
}

/// Reassembles handshake messages that span or share records.
#[derive(Debug, Default)]
pub struct HandshakeBuffer {
    buf: Vec<u8>,
}

impl HandshakeBuffer {
    pub fn push(&mut self, fragment: &[u8]) {
        self.buf.extend_from_slice(fragment);
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Pops the next complete message as `(type, body)`. A declared length
    /// above [`MAX_HANDSHAKE_MESSAGE`] is rejected before it is buffered.
    pub fn next_message(&mut self) -> Result<Option<(u8, Vec<u8>)>, HandshakeError> {
        if self.buf.len() < 4 {
            return Ok(None);
        }
        let len = u32::from_be_bytes([0, self.buf[1], self.buf[2], self.buf[3]]) as usize;
        if len > MAX_HANDSHAKE_MESSAGE {
            return Err(HandshakeError::Malformed("oversized handshake message"));
        }
        if self.buf.len() < 4 + len {
            return Ok(None);
        }
        let msg_type = self.buf[0];
        let body = self.buf[4..4 + len].to_vec();
        self.buf.drain(..4 + len);
        Ok(Some((msg_type, body)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alert {
    pub level: u8,
    pub description: u8,
}

impl Alert {
    pub fn parse(payload: &[u8]) -> Option<Alert> {
        match payload {
            [level, description, ..] => Some(Alert {
                level: *level,
                description: *description,
            }),
            _ => None,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.level == ALERT_LEVEL_FATAL || self.description == ALERT_CLOSE_NOTIFY
    }
}

pub fn alert_level_name(level: u8) -> &'static str {
    match level {
        ALERT_LEVEL_WARNING => "warning",
        ALERT_LEVEL_FATAL => "fatal",
        _ => "unknown",
    }
}

pub fn alert_name(description: u8) -> &'static str {
    match description {
        0 => "close_notify",
        10 => "unexpected_message",
        20 => "bad_record_mac",
        21 => "decryption_failed",
        22 => "record_overflow",
        30 => "decompression_failure",
        40 => "handshake_failure",
        41 => "no_certificate",
        42 => "bad_certificate",
        43 => "unsupported_certificate",
        44 => "certificate_revoked",
        45 => "certificate_expired",
        46 => "certificate_unknown",
        47 => "illegal_parameter",
        48 => "unknown_ca",
        49 => "access_denied",
        50 => "decode_error",
        51 => "decrypt_error",
        60 => "export_restriction",
        70 => "protocol_version",
        71 => "insufficient_security",
        80 => "internal_error",
        86 => "inappropriate_fallback",
        90 => "user_canceled",
        100 => "no_renegotiation",
        110 => "unsupported_extension",
        112 => "unrecognized_name",
        _ => "unknown",
    }
}
