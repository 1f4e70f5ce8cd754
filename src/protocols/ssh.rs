//! SSH identification exchange and KEXINIT capture.
//!
//! Stops once the server's algorithm offer is recorded; no key exchange is
//! performed.

use rand::RngCore;
use serde::Serialize;
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::debug;

use crate::util::b64;

const MSG_KEXINIT: u8 = 20;
const MAX_IDENT_LINE: u64 = 255;
const MAX_PREAMBLE_LINES: usize = 32;
const MAX_PACKET: u32 = 35_000;

#[derive(Debug, thiserror::Error)]
pub enum SshError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("server sent no SSH identification string")]
    NoIdentification,

    #[error("packet length {0} out of range")]
    BadPacketLength(u32),

    #[error("expected KEXINIT, got message {0}")]
    UnexpectedMessage(u8),

    #[error("malformed KEXINIT")]
    MalformedKexInit,
}

#[derive(Debug, Clone)]
pub struct SshScanConfig {
    pub client_id: String,
    pub kex_algorithms: Vec<String>,
    pub host_key_algorithms: Vec<String>,
    pub ciphers: Vec<String>,
    pub macs: Vec<String>,
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for SshScanConfig {
    fn default() -> Self {
        Self {
            client_id: "SSH-2.0-tls-grabber".into(),
            kex_algorithms: names(&[
                "curve25519-sha256",
                "curve25519-sha256@libssh.org",
                "ecdh-sha2-nistp256",
                "diffie-hellman-group14-sha256",
                "diffie-hellman-group14-sha1",
                "diffie-hellman-group1-sha1",
            ]),
            host_key_algorithms: names(&[
                "ssh-ed25519",
                "ecdsa-sha2-nistp256",
                "rsa-sha2-512",
                "rsa-sha2-256",
                "ssh-rsa",
                "ssh-dss",
            ]),
            ciphers: names(&[
                "aes128-ctr",
                "aes256-ctr",
                "aes128-gcm@openssh.com",
                "chacha20-poly1305@openssh.com",
                "aes128-cbc",
                "3des-cbc",
            ]),
            macs: names(&["hmac-sha2-256", "hmac-sha1", "hmac-md5"]),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SshIdent {
    pub raw: String,
    pub protocol_version: String,
    pub software_version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

impl SshIdent {
    pub fn parse(line: &str) -> Option<SshIdent> {
        let raw = line.trim_end_matches(['\r', '\n']);
        let rest = raw.strip_prefix("SSH-")?;
        let (protocol_version, rest) = rest.split_once('-')?;
        let (software_version, comment) = rest.split_once(' ').unwrap_or((rest, ""));
        Some(SshIdent {
            raw: raw.to_string(),
            protocol_version: protocol_version.to_string(),
            software_version: software_version.to_string(),
            comment: comment.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KexInit {
    #[serde(serialize_with = "b64::serialize")]
    pub cookie: Vec<u8>,
    pub kex_algorithms: Vec<String>,
    pub host_key_algorithms: Vec<String>,
    pub ciphers_client_to_server: Vec<String>,
    pub ciphers_server_to_client: Vec<String>,
    pub macs_client_to_server: Vec<String>,
    pub macs_server_to_client: Vec<String>,
    pub compression_client_to_server: Vec<String>,
    pub compression_server_to_client: Vec<String>,
    pub languages_client_to_server: Vec<String>,
    pub languages_server_to_client: Vec<String>,
    pub first_kex_follows: bool,
}

impl KexInit {
    pub fn parse(payload: &[u8]) -> Option<KexInit> {
        if payload.first() != Some(&MSG_KEXINIT) || payload.len() < 17 {
            return None;
        }
        let mut idx = 17;
        let mut next = || parse_name_list(payload, &mut idx);
        let kex = KexInit {
            cookie: payload[1..17].to_vec(),
            kex_algorithms: next()?,
            host_key_algorithms: next()?,
            ciphers_client_to_server: next()?,
            ciphers_server_to_client: next()?,
            macs_client_to_server: next()?,
            macs_server_to_client: next()?,
            compression_client_to_server: next()?,
            compression_server_to_client: next()?,
            languages_client_to_server: next()?,
            languages_server_to_client: next()?,
            first_kex_follows: false,
        };
        Some(KexInit {
            first_kex_follows: payload.get(idx).is_some_and(|b| *b != 0),
            ..kex
        })
    }

    fn marshal(config: &SshScanConfig) -> Vec<u8> {
        let mut cookie = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut cookie);
        let none = vec!["none".to_string()];
        let mut out = vec![MSG_KEXINIT];
        out.extend_from_slice(&cookie);
        for list in [
            &config.kex_algorithms,
            &config.host_key_algorithms,
            &config.ciphers,
            &config.ciphers,
            &config.macs,
            &config.macs,
            &none,
            &none,
        ] {
            put_name_list(&mut out, list);
        }
        put_name_list(&mut out, &[]);
        put_name_list(&mut out, &[]);
        out.push(0);
        out.extend_from_slice(&0u32.to_be_bytes());
        out
    }
}

fn parse_name_list(payload: &[u8], idx: &mut usize) -> Option<Vec<String>> {
    let len_bytes = payload.get(*idx..*idx + 4)?;
    let len = u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
    *idx += 4;
    let list = payload.get(*idx..*idx + len)?;
    *idx += len;
    if list.is_empty() {
        return Some(Vec::new());
    }
    Some(
        String::from_utf8_lossy(list)
            .split(',')
            .map(str::to_string)
            .collect(),
    )
}

fn put_name_list(out: &mut Vec<u8>, list: &[String]) {
    let joined = list.join(",");
    out.extend_from_slice(&(joined.len() as u32).to_be_bytes());
    out.extend_from_slice(joined.as_bytes());
}

/// Wraps a payload in an unencrypted binary packet (block size 8).
fn packet(payload: &[u8]) -> Vec<u8> {
    let mut padding = 8 - (payload.len() + 5) % 8;
    if padding < 4 {
        padding += 8;
    }
    let mut out = Vec::with_capacity(payload.len() + padding + 5);
    out.extend_from_slice(&((payload.len() + padding + 1) as u32).to_be_bytes());
    out.push(padding as u8);
    out.extend_from_slice(payload);
    out.resize(out.len() + padding, 0);
    out
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SshLog {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<SshIdent>,
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_kex_init: Option<KexInit>,
}

/// Exchanges identification strings and KEXINIT messages, recording what the
/// server sent into `log` as it arrives.
pub async fn handshake<S>(
    stream: &mut S,
    config: &SshScanConfig,
    log: &mut SshLog,
) -> Result<(), SshError>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    let mut io = BufReader::new(stream);
    log.client_id = config.client_id.clone();
    io.write_all(format!("{}\r\n", config.client_id).as_bytes()).await?;

    let mut ident = None;
    for _ in 0..MAX_PREAMBLE_LINES {
        let mut line = Vec::new();
        let n = (&mut io).take(MAX_IDENT_LINE).read_until(b'\n', &mut line).await?;
        if n == 0 {
            break;
        }
        let text = String::from_utf8_lossy(&line);
        if let Some(parsed) = SshIdent::parse(&text) {
            ident = Some(parsed);
            break;
        }
        debug!(line = %text.trim_end(), "skipping pre-identification line");
    }
    let ident = ident.ok_or(SshError::NoIdentification)?;
    log.server_id = Some(ident);

    io.write_all(&packet(&KexInit::marshal(config))).await?;
    io.flush().await?;

    let payload = read_packet(&mut io).await?;
    match payload.first() {
        Some(&MSG_KEXINIT) => {
            let kex = KexInit::parse(&payload).ok_or(SshError::MalformedKexInit)?;
            log.server_kex_init = Some(kex);
            Ok(())
        }
        Some(&other) => Err(SshError::UnexpectedMessage(other)),
        None => Err(SshError::MalformedKexInit),
    }
}

async fn read_packet<R: AsyncRead + Unpin>(io: &mut R) -> Result<Vec<u8>, SshError> {
    let len = io.read_u32().await?;
    if !(5..=MAX_PACKET).contains(&len) {
        return Err(SshError::BadPacketLength(len));
    }
    let mut body = vec![0u8; len as usize];
    io.read_exact(&mut body).await?;
    let padding = body[0] as usize;
    let end = body.len().checked_sub(padding).filter(|end| *end >= 1);
    match end {
        Some(end) => Ok(body[1..end].to_vec()),
        None => Err(SshError::BadPacketLength(len)),
    }
}
