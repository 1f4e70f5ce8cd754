//! FTP control channel helpers: reply codes and explicit FTPS readiness.

use serde::Serialize;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::engine::reader::{BannerReader, NumericReply};

const RESPONSE_LIMIT: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum FtpError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("incomplete reply to {0}")]
    Incomplete(&'static str),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FtpLog {
    pub banner: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_tls: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_ssl: Option<String>,
}

pub fn status_code(bytes: &[u8]) -> Option<u16> {
    let first_line = bytes.split(|b| *b == b'\n').next()?;
    let trimmed = first_line
        .iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .copied()
        .collect::<Vec<u8>>();
    if trimmed.len() < 3 || !trimmed[..3].iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(&trimmed[..3]).ok()?.parse().ok()
}

async fn read_reply<S>(stream: &mut S, what: &'static str) -> Result<Vec<u8>, FtpError>
where
    S: AsyncRead + Unpin + ?Sized,
{
    let res = BannerReader::new(RESPONSE_LIMIT)
        .read(stream, &NumericReply)
        .await?;
    if res.complete() {
        Ok(res.bytes)
    } else {
        debug!(what, len = res.bytes.len(), "incomplete ftp reply");
        Err(FtpError::Incomplete(what))
    }
}

/// Asks for `AUTH TLS`, then `AUTH SSL`. Returns whether the server is ready
/// for a TLS handshake on the control connection.
pub async fn prepare_ftps<S>(log: &mut FtpLog, stream: &mut S) -> Result<bool, FtpError>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    stream.write_all(b"AUTH TLS\r\n").await?;
    let reply = read_reply(stream, "AUTH TLS").await?;
    log.auth_tls = Some(String::from_utf8_lossy(&reply).into_owned());
    if status_code(&reply) == Some(234) {
        return Ok(true);
    }

    stream.write_all(b"AUTH SSL\r\n").await?;
    let reply = read_reply(stream, "AUTH SSL").await?;
    log.auth_ssl = Some(String::from_utf8_lossy(&reply).into_owned());
    Ok(status_code(&reply) == Some(234))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn parses_status_code_from_first_line() {
        assert_eq!(status_code(b"220-Welcome\n220 continue"), Some(220));
        assert_eq!(status_code(b"   334 ADAT"), Some(334));
        assert_eq!(status_code(b"garbled"), None);
    }

    #[tokio::test]
    async fn falls_back_to_auth_ssl() {
        let (mut client, mut server) = tokio::io::duplex(256);
        tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let n = server.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"AUTH TLS\r\n");
            server.write_all(b"504 not here\r\n").await.unwrap();
            let n = server.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"AUTH SSL\r\n");
            server.write_all(b"234 go ahead\r\n").await.unwrap();
            server
        });
        let mut log = FtpLog::default();
        assert!(prepare_ftps(&mut log, &mut client).await.unwrap());
        assert_eq!(log.auth_tls.as_deref(), Some("504 not here\r\n"));
        assert_eq!(log.auth_ssl.as_deref(), Some("234 go ahead\r\n"));
    }

    #[tokio::test]
    async fn refused_on_both_is_not_ready() {
        let (mut client, mut server) = tokio::io::duplex(256);
        tokio::spawn(async move {
            let mut buf = [0u8; 64];
            for reply in [&b"500 no\r\n"[..], b"502 still no\r\n"] {
                let _ = server.read(&mut buf).await.unwrap();
                server.write_all(reply).await.unwrap();
            }
            server
        });
        let mut log = FtpLog::default();
        assert!(!prepare_ftps(&mut log, &mut client).await.unwrap());
        assert!(log.auth_ssl.is_some());
    }
}
