//! Measurement TLS client.
//!
//! Sends a ClientHello shaped by a [`TlsConfig`] and captures the server's
//! first flight up to ServerHelloDone. No key exchange is completed, which
//! keeps export and DHE-export suites offerable; the resulting session can
//! still carry heartbeat records for the Heartbleed probe.

use rand::RngCore;
use serde::Serialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, trace};

use super::ciphers::CipherSuiteId;
use super::messages::{
    CertificateMsg, ClientHello, FinishedMsg, ServerHelloMsg, ServerKeyExchangeMsg,
    TYPE_CERTIFICATE, TYPE_CERTIFICATE_REQUEST, TYPE_CERTIFICATE_STATUS, TYPE_FINISHED,
    TYPE_SERVER_HELLO, TYPE_SERVER_HELLO_DONE, TYPE_SERVER_KEY_EXCHANGE,
};
use super::record::{
    self, Alert, HandshakeBuffer, ALERT_HANDSHAKE_FAILURE, ALERT_INSUFFICIENT_SECURITY,
    CONTENT_ALERT, CONTENT_HANDSHAKE, CONTENT_HEARTBEAT,
};
use super::x509::CaPool;
use super::{HandshakeError, VERSION_SSL30, VERSION_TLS10};

#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub min_version: u16,
    pub max_version: u16,
    pub server_name: Option<String>,
    pub cipher_suites: Vec<CipherSuiteId>,
    pub force_suites: bool,
    pub heartbeat_enabled: bool,
    pub extended_random: bool,
    /// Carried for the recorder; the handshake never verifies certificates.
    pub root_cas: Option<Arc<CaPool>>,
}

/// Raw server messages captured during one handshake attempt.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    pub server_hello: Option<ServerHelloMsg>,
    pub certificate: Option<CertificateMsg>,
    pub server_key_exchange: Option<ServerKeyExchangeMsg>,
    pub finished: Option<FinishedMsg>,
}

impl Transcript {
    pub fn negotiated_cipher(&self) -> Option<CipherSuiteId> {
        self.server_hello.as_ref().map(|hello| hello.cipher_suite)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlsSession {
    pub version: u16,
    pub cipher_suite: CipherSuiteId,
    pub heartbeat: bool,
}

fn client_random() -> [u8; 32] {
    let mut random = [0u8; 32];
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or_default();
    random[..4].copy_from_slice(&now.to_be_bytes());
    rand::thread_rng().fill_bytes(&mut random[4..]);
    random
}

/// Runs the handshake, filling `transcript` as messages arrive so that a
/// failure still leaves whatever the server sent before it.
pub async fn handshake<S>(
    stream: &mut S,
    config: &TlsConfig,
    transcript: &mut Transcript,
) -> Result<TlsSession, HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    let extended_random = config.extended_random.then(|| {
        let mut random = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut random);
        random
    });
    let hello = ClientHello {
        version: config.max_version,
        random: client_random(),
        cipher_suites: config.cipher_suites.clone(),
        server_name: config.server_name.clone(),
        heartbeat: config.heartbeat_enabled,
        extended_random,
    };
    let record_version = if config.max_version <= VERSION_SSL30 {
        VERSION_SSL30
    } else {
        VERSION_TLS10
    };
    debug!(
        suites = config.cipher_suites.len(),
        max_version = config.max_version,
        sni = config.server_name.as_deref().unwrap_or(""),
        "sending client hello"
    );
    record::write_record(stream, CONTENT_HANDSHAKE, record_version, &hello.marshal()).await?;

    let mut messages = HandshakeBuffer::default();
    loop {
        let rec = record::read_record(stream).await?;
        trace!(content_type = rec.content_type, len = rec.payload.len(), "record");
        match rec.content_type {
            CONTENT_HANDSHAKE => {
                messages.push(&rec.payload);
                while let Some((msg_type, body)) = messages.next_message()? {
                    if let Some(session) = on_message(msg_type, &body, config, transcript)? {
                        return Ok(session);
                    }
                }
            }
            CONTENT_ALERT => {
                let alert =
                    Alert::parse(&rec.payload).ok_or(HandshakeError::Malformed("alert record"))?;
                if transcript.server_hello.is_none()
                    && matches!(
                        alert.description,
                        ALERT_HANDSHAKE_FAILURE | ALERT_INSUFFICIENT_SECURITY
                    )
                {
                    return Err(HandshakeError::NoSharedCipher);
                }
                if alert.is_fatal() {
                    return Err(HandshakeError::Alert {
                        level: alert.level,
                        description: alert.description,
                    });
                }
                debug!(alert = record::alert_name(alert.description), "ignoring warning alert");
            }
            other => return Err(HandshakeError::UnexpectedRecord(other)),
        }
    }
}

fn on_message(
    msg_type: u8,
    body: &[u8],
    config: &TlsConfig,
    transcript: &mut Transcript,
) -> Result<Option<TlsSession>, HandshakeError> {
    if transcript.server_hello.is_none() && msg_type != TYPE_SERVER_HELLO {
        return Err(HandshakeError::UnexpectedMessage(msg_type));
    }
    match msg_type {
        TYPE_SERVER_HELLO => {
            if transcript.server_hello.is_some() {
                return Err(HandshakeError::UnexpectedMessage(msg_type));
            }
            let hello = ServerHelloMsg::parse(body)?;
            let (version, suite) = (hello.version, hello.cipher_suite);
            transcript.server_hello = Some(hello);
            if version < config.min_version || version > config.max_version {
                return Err(HandshakeError::UnsupportedVersion(version));
            }
            if !config.cipher_suites.contains(&suite) {
                return Err(HandshakeError::UnofferedCipher(suite));
            }
        }
        TYPE_CERTIFICATE => transcript.certificate = Some(CertificateMsg::parse(body)?),
        TYPE_SERVER_KEY_EXCHANGE => {
            transcript.server_key_exchange = Some(ServerKeyExchangeMsg { key: body.to_vec() })
        }
        TYPE_FINISHED => {
            transcript.finished = Some(FinishedMsg {
                verify_data: body.to_vec(),
            })
        }
        TYPE_CERTIFICATE_STATUS | TYPE_CERTIFICATE_REQUEST => {}
        TYPE_SERVER_HELLO_DONE => {
            let hello = transcript
                .server_hello
                .as_ref()
                .ok_or(HandshakeError::UnexpectedMessage(msg_type))?;
            return Ok(Some(TlsSession {
                version: hello.version,
                cipher_suite: hello.cipher_suite,
                heartbeat: hello.heartbeat_enabled && config.heartbeat_enabled,
            }));
        }
        other => return Err(HandshakeError::UnexpectedMessage(other)),
    }
    Ok(None)
}

/// Heartbeat request claiming a 16 KiB payload while carrying none.
const HEARTBLEED_REQUEST: [u8; 3] = [0x01, 0x40, 0x00];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HeartbleedLog {
    pub heartbeat_enabled: bool,
    pub vulnerable: bool,
}

/// What came back after the malformed heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatReply {
    /// The server echoed more than we sent: memory was disclosed.
    Leaked(usize),
    Echo,
    Alert(Alert),
}

impl HeartbeatReply {
    fn classify(content_type: u8, payload: &[u8]) -> Option<HeartbeatReply> {
        match content_type {
            CONTENT_HEARTBEAT if payload.len() > HEARTBLEED_REQUEST.len() => {
                Some(HeartbeatReply::Leaked(payload.len()))
            }
            CONTENT_HEARTBEAT => Some(HeartbeatReply::Echo),
            CONTENT_ALERT => Alert::parse(payload).map(HeartbeatReply::Alert),
            _ => None,
        }
    }
}

pub async fn check_heartbleed<S>(
    stream: &mut S,
    session: &TlsSession,
) -> Result<HeartbleedLog, HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    if !session.heartbeat {
        return Ok(HeartbleedLog::default());
    }
    record::write_record(
        stream,
        CONTENT_HEARTBEAT,
        session.version,
        &HEARTBLEED_REQUEST,
    )
    .await?;

    loop {
        let rec = record::read_record(stream).await?;
        match HeartbeatReply::classify(rec.content_type, &rec.payload) {
            Some(HeartbeatReply::Leaked(len)) => {
                debug!(len, "heartbeat response exceeded request");
                return Ok(HeartbleedLog {
                    heartbeat_enabled: true,
                    vulnerable: true,
                });
            }
            Some(HeartbeatReply::Echo) | Some(HeartbeatReply::Alert(_)) => {
                return Ok(HeartbleedLog {
                    heartbeat_enabled: true,
                    vulnerable: false,
                });
            }
            None => trace!(content_type = rec.content_type, "skipping record"),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::tls::messages::tests::server_hello_body;
    use crate::tls::record::{encode_record, read_record};
    use crate::tls::VERSION_TLS12;
    use tokio::io::AsyncWriteExt;

    pub(crate) fn handshake_msg(msg_type: u8, body: &[u8]) -> Vec<u8> {
        let mut out = vec![msg_type];
        out.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
        out.extend_from_slice(body);
        out
    }

    /// A complete server flight selecting `suite`: hello, one certificate,
    /// key exchange, done. Hello and certificate share one record.
    pub(crate) fn server_flight(suite: u16, skx: &[u8]) -> Vec<u8> {
        let mut first = handshake_msg(TYPE_SERVER_HELLO, &server_hello_body(suite));
        first.extend(handshake_msg(
            TYPE_CERTIFICATE,
            &[0, 0, 6, 0, 0, 3, 0xde, 0xad, 0x01],
        ));
        let mut second = handshake_msg(TYPE_SERVER_KEY_EXCHANGE, skx);
        second.extend(handshake_msg(TYPE_SERVER_HELLO_DONE, &[]));

        let mut out = Vec::new();
        encode_record(&mut out, CONTENT_HANDSHAKE, VERSION_TLS12, &first);
        encode_record(&mut out, CONTENT_HANDSHAKE, VERSION_TLS12, &second);
        out
    }

    pub(crate) fn config(suites: &[u16]) -> TlsConfig {
        TlsConfig {
            min_version: VERSION_SSL30,
            max_version: VERSION_TLS12,
            server_name: Some("example.com".into()),
            cipher_suites: suites.to_vec(),
            force_suites: false,
            heartbeat_enabled: true,
            extended_random: false,
            root_cas: None,
        }
    }

    #[tokio::test]
    async fn captures_server_flight() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let server_task = tokio::spawn(async move {
            let hello = read_record(&mut server).await.unwrap();
            assert_eq!(hello.content_type, CONTENT_HANDSHAKE);
            assert_eq!(hello.version, VERSION_TLS10);
            server
                .write_all(&server_flight(0x0033, &[0, 1, 0x17, 0, 1, 2, 0, 1, 5]))
                .await
                .unwrap();
            server
        });

        let mut transcript = Transcript::default();
        let session = handshake(&mut client, &config(&[0x0033]), &mut transcript)
            .await
            .unwrap();
        assert_eq!(session.cipher_suite, 0x0033);
        assert!(session.heartbeat);
        assert_eq!(
            transcript.certificate.unwrap().certificates,
            vec![vec![0xde, 0xad, 0x01]]
        );
        assert_eq!(transcript.server_key_exchange.unwrap().key.len(), 9);
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn handshake_failure_alert_means_no_shared_cipher() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            let _ = read_record(&mut server).await.unwrap();
            let mut out = Vec::new();
            encode_record(&mut out, CONTENT_ALERT, VERSION_TLS10, &[2, 40]);
            server.write_all(&out).await.unwrap();
            server
        });
        let mut transcript = Transcript::default();
        let err = handshake(&mut client, &config(&[0x0003]), &mut transcript)
            .await
            .unwrap_err();
        assert!(matches!(err, HandshakeError::NoSharedCipher));
        assert!(transcript.server_hello.is_none());
    }

    #[tokio::test]
    async fn unoffered_suite_fails_but_keeps_hello() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            let _ = read_record(&mut server).await.unwrap();
            server.write_all(&server_flight(0x002f, &[])).await.unwrap();
            server
        });
        let mut transcript = Transcript::default();
        let err = handshake(&mut client, &config(&[0x0033]), &mut transcript)
            .await
            .unwrap_err();
        assert!(matches!(err, HandshakeError::UnofferedCipher(0x002f)));
        assert_eq!(transcript.negotiated_cipher(), Some(0x002f));
    }

    #[tokio::test]
    async fn connection_reset_mid_flight_is_io_error() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            let _ = read_record(&mut server).await.unwrap();
            let flight = server_flight(0x0033, &[]);
            server.write_all(&flight[..flight.len() / 2]).await.unwrap();
        });
        let mut transcript = Transcript::default();
        let err = handshake(&mut client, &config(&[0x0033]), &mut transcript)
            .await
            .unwrap_err();
        assert!(matches!(err, HandshakeError::Io(_)));
    }

    #[tokio::test]
    async fn oversized_certificate_declaration_is_malformed() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            let _ = read_record(&mut server).await.unwrap();
            let mut first = handshake_msg(TYPE_SERVER_HELLO, &server_hello_body(0x0033));
            first.extend_from_slice(&[TYPE_CERTIFICATE, 0xff, 0xff, 0xff, 0, 0]);
            let mut out = Vec::new();
            encode_record(&mut out, CONTENT_HANDSHAKE, VERSION_TLS12, &first);
            server.write_all(&out).await.unwrap();
            server
        });
        let mut transcript = Transcript::default();
        let err = handshake(&mut client, &config(&[0x0033]), &mut transcript)
            .await
            .unwrap_err();
        assert!(matches!(err, HandshakeError::Malformed(_)));
        assert!(transcript.server_hello.is_some());
    }

    #[tokio::test]
    async fn detects_oversized_heartbeat_response() {
        let (mut client, mut server) = tokio::io::duplex(1 << 16);
        tokio::spawn(async move {
            let probe = read_record(&mut server).await.unwrap();
            assert_eq!(probe.content_type, CONTENT_HEARTBEAT);
            assert_eq!(probe.payload, HEARTBLEED_REQUEST.to_vec());
            let mut out = Vec::new();
            let mut leak = vec![0x02, 0x40, 0x00];
            leak.extend(vec![0x41; 0x4000]);
            encode_record(&mut out, CONTENT_HEARTBEAT, VERSION_TLS12, &leak);
            server.write_all(&out).await.unwrap();
            server
        });
        let session = TlsSession {
            version: VERSION_TLS12,
            cipher_suite: 0x0033,
            heartbeat: true,
        };
        let log = check_heartbleed(&mut client, &session).await.unwrap();
        assert!(log.vulnerable);
    }

    #[tokio::test]
    async fn skips_probe_without_heartbeat_extension() {
        let (mut client, _server) = tokio::io::duplex(64);
        let session = TlsSession {
            version: VERSION_TLS12,
            cipher_suite: 0x0033,
            heartbeat: false,
        };
        let log = check_heartbleed(&mut client, &session).await.unwrap();
        assert_eq!(log, HeartbleedLog::default());
    }
}
