//! Connection upgrade state machine.
//!
//! A [`Conn`] wraps one plaintext stream to one target and walks it through
//! `Plain -> Negotiating -> Handshaking -> Established`, recording every
//! exchange into [`GrabData`]. Each TLS upgrade happens at most once.

mod deadline;
mod error;
mod grab;
pub mod starttls;

pub use error::ConnError;
pub use grab::{GrabData, SmtpHelp};

use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::engine::reader::{
    BannerReader, Framing, LineFraming, NumericReply, Pop3Reply, ReadResult,
};
use crate::model::ReadStopReason;
use crate::protocols::ftp;
use crate::protocols::modbus::{self, ModbusEvent, ModbusRequest};
use crate::protocols::ssh::{self, SshLog, SshScanConfig};
use crate::tls::{
    self, CaPool, CipherPolicy, HandshakeError, HandshakeLog, HandshakeRecorder, HeartbleedLog,
    TlsConfig, TlsSession, Transcript,
};
use deadline::Deadlined;
use starttls::StartTls;

const BANNER_LIMIT: usize = 1024;
const REPLY_LIMIT: usize = 512;

/// Scan settings a connection consults when it upgrades.
#[derive(Debug, Clone)]
pub struct ConnConfig {
    /// SNI name; empty means none is sent.
    pub domain: String,
    pub ca_pool: Option<Arc<CaPool>>,
    pub max_version: u16,
    pub policy: CipherPolicy,
    pub no_sni: bool,
    pub extended_random: bool,
    pub ssh: SshScanConfig,
}

impl Default for ConnConfig {
    fn default() -> Self {
        Self {
            domain: String::new(),
            ca_pool: None,
            max_version: tls::VERSION_TLS12,
            policy: CipherPolicy::Default,
            no_sni: false,
            extended_random: false,
            ssh: SshScanConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Plain,
    Negotiating(&'static str),
    Handshaking,
    Established(TlsSession),
    /// The one permitted handshake ran and did not establish a session.
    Aborted,
}

/// How a handshake attempt that did not error ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeOutcome {
    Completed,
    /// Forced-suite probing found no server-acceptable suite.
    NoSharedCipher,
}

struct Transport<S> {
    stream: S,
    read_deadline: Option<Instant>,
    write_deadline: Option<Instant>,
}

impl<S> Transport<S> {
    fn io(&mut self) -> Deadlined<'_, S> {
        Deadlined::new(&mut self.stream, self.read_deadline, self.write_deadline)
    }
}

pub struct Conn<S> {
    transport: Transport<S>,
    peer: String,
    config: ConnConfig,
    recorder: HandshakeRecorder,
    state: ConnState,
    grab: GrabData,
}

impl<S> Conn<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, peer: impl Into<String>, config: ConnConfig) -> Self {
        Self {
            transport: Transport {
                stream,
                read_deadline: None,
                write_deadline: None,
            },
            peer: peer.into(),
            recorder: HandshakeRecorder::new(config.ca_pool.clone()),
            config,
            state: ConnState::Plain,
            grab: GrabData::default(),
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn grab_data(&self) -> &GrabData {
        &self.grab
    }

    pub fn into_grab_data(self) -> GrabData {
        self.grab
    }

    pub fn handshake_log(&self) -> Option<&HandshakeLog> {
        self.grab.tls_handshake.as_ref()
    }

    pub fn set_deadline(&mut self, at: Option<Instant>) {
        self.transport.read_deadline = at;
        self.transport.write_deadline = at;
    }

    pub fn set_read_deadline(&mut self, at: Option<Instant>) {
        self.transport.read_deadline = at;
    }

    pub fn set_write_deadline(&mut self, at: Option<Instant>) {
        self.transport.write_deadline = at;
    }

    fn track<T>(&mut self, result: Result<T, ConnError>) -> Result<T, ConnError> {
        if let Err(err) = &result {
            self.grab.error_component = Some(err.component());
        }
        result
    }

    fn ensure_plain(&self) -> Result<(), ConnError> {
        match self.state {
            ConnState::Plain | ConnState::Negotiating(_) => Ok(()),
            _ => Err(ConnError::NoApplicationData),
        }
    }

    async fn read_framed(
        &mut self,
        framing: &dyn Framing,
        limit: usize,
    ) -> Result<ReadResult, ConnError> {
        let res = BannerReader::new(limit)
            .read(&mut self.transport.io(), framing)
            .await?;
        Ok(res)
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<(), ConnError> {
        let mut io = self.transport.io();
        io.write_all(bytes).await?;
        io.flush().await?;
        Ok(())
    }

    /// Single read of up to 1 KiB.
    pub async fn basic_banner(&mut self) -> Result<String, ConnError> {
        let result = self.basic_banner_inner().await;
        self.track(result)
    }

    async fn basic_banner_inner(&mut self) -> Result<String, ConnError> {
        self.ensure_plain()?;
        let res = BannerReader::new(BANNER_LIMIT)
            .read_once(&mut self.transport.io())
            .await?;
        let banner = res.text();
        self.grab.banner = Some(banner.clone());
        Ok(banner)
    }

    pub async fn smtp_banner(&mut self) -> Result<String, ConnError> {
        let result = self.framed_banner(&NumericReply, "smtp").await;
        self.track(result)
    }

    pub async fn pop3_banner(&mut self) -> Result<String, ConnError> {
        let result = self.framed_banner(&Pop3Reply, "pop3").await;
        self.track(result)
    }

    pub async fn imap_banner(&mut self) -> Result<String, ConnError> {
        let result = self.framed_banner(&LineFraming, "imap").await;
        self.track(result)
    }

    pub async fn ftp_banner(&mut self) -> Result<String, ConnError> {
        let result = self.framed_banner(&NumericReply, "ftp").await;
        if let Ok(banner) = &result {
            self.grab.ftp.get_or_insert_with(Default::default).banner = banner.clone();
        }
        self.track(result)
    }

    async fn framed_banner(
        &mut self,
        framing: &dyn Framing,
        protocol: &'static str,
    ) -> Result<String, ConnError> {
        self.ensure_plain()?;
        let res = self.read_framed(framing, BANNER_LIMIT).await?;
        self.grab.banner = Some(res.text());
        settle(res, protocol, BANNER_LIMIT)
    }

    pub async fn ehlo(&mut self, domain: &str) -> Result<String, ConnError> {
        let result = self.ehlo_inner(domain).await;
        self.track(result)
    }

    async fn ehlo_inner(&mut self, domain: &str) -> Result<String, ConnError> {
        self.ensure_plain()?;
        self.send(format!("EHLO {domain}\r\n").as_bytes()).await?;
        let res = self.read_framed(&NumericReply, REPLY_LIMIT).await?;
        self.grab.ehlo = Some(res.text());
        settle(res, "smtp", REPLY_LIMIT)
    }

    pub async fn smtp_help(&mut self) -> Result<String, ConnError> {
        let result = self.smtp_help_inner().await;
        self.track(result)
    }

    async fn smtp_help_inner(&mut self) -> Result<String, ConnError> {
        self.ensure_plain()?;
        self.grab.smtp_help = Some(SmtpHelp::default());
        self.send(b"HELP\r\n").await?;
        let res = self.read_framed(&NumericReply, REPLY_LIMIT).await?;
        self.grab.smtp_help = Some(SmtpHelp {
            response: res.text(),
        });
        settle(res, "smtp", REPLY_LIMIT)
    }

    pub async fn write(&mut self, bytes: &[u8]) -> Result<usize, ConnError> {
        let result = self.write_inner(bytes).await;
        self.track(result)
    }

    async fn write_inner(&mut self, bytes: &[u8]) -> Result<usize, ConnError> {
        self.ensure_plain()?;
        self.send(bytes).await?;
        self.grab.write = Some(String::from_utf8_lossy(bytes).into_owned());
        Ok(bytes.len())
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ConnError> {
        let result = self.read_inner(buf).await;
        self.track(result)
    }

    async fn read_inner(&mut self, buf: &mut [u8]) -> Result<usize, ConnError> {
        self.ensure_plain()?;
        let n = self.transport.io().read(buf).await?;
        self.grab.read = Some(String::from_utf8_lossy(&buf[..n]).into_owned());
        Ok(n)
    }

    pub async fn close(&mut self) -> Result<(), ConnError> {
        self.transport.io().shutdown().await?;
        Ok(())
    }

    pub async fn smtp_starttls_handshake(&mut self) -> Result<HandshakeOutcome, ConnError> {
        self.starttls_handshake(&starttls::Smtp).await
    }

    pub async fn pop3_starttls_handshake(&mut self) -> Result<HandshakeOutcome, ConnError> {
        self.starttls_handshake(&starttls::Pop3).await
    }

    pub async fn imap_starttls_handshake(&mut self) -> Result<HandshakeOutcome, ConnError> {
        self.starttls_handshake(&starttls::Imap::default()).await
    }

    /// Sends the dialect's upgrade command and, if the server agrees, runs the
    /// TLS handshake. A refused or malformed reply leaves the connection
    /// plain.
    pub async fn starttls_handshake(
        &mut self,
        dialect: &dyn StartTls,
    ) -> Result<HandshakeOutcome, ConnError> {
        if !matches!(self.state, ConnState::Plain | ConnState::Negotiating(_)) {
            let err = ConnError::StartTlsAfterTls {
                peer: self.peer.clone(),
            };
            return self.track(Err(err));
        }
        self.state = ConnState::Negotiating(dialect.protocol());
        let negotiated = self.negotiate(dialect).await;
        if let Err(err) = negotiated {
            debug!(peer = %self.peer, protocol = dialect.protocol(), %err, "STARTTLS refused");
            self.state = ConnState::Plain;
            return self.track(Err(err));
        }
        self.tls_handshake().await
    }

    async fn negotiate(&mut self, dialect: &dyn StartTls) -> Result<(), ConnError> {
        self.send(&dialect.command()).await?;
        let limit = dialect.buffer_size();
        let res = self.read_framed(&*dialect.framing(), limit).await?;
        self.grab.starttls = Some(res.text());
        let bytes = settle_bytes(res, dialect.protocol(), limit)?;
        if dialect.accepts(&bytes) {
            Ok(())
        } else {
            Err(ConnError::StartTlsRejected {
                protocol: dialect.protocol(),
                response: String::from_utf8_lossy(&bytes).into_owned(),
            })
        }
    }

    fn tls_config(&self) -> TlsConfig {
        let server_name = (!self.config.no_sni && !self.config.domain.is_empty())
            .then(|| self.config.domain.clone());
        TlsConfig {
            min_version: tls::VERSION_SSL30,
            max_version: self.config.max_version,
            server_name,
            cipher_suites: self.config.policy.suites().to_vec(),
            force_suites: self.config.policy.force_suites(),
            heartbeat_enabled: true,
            extended_random: self.config.extended_random,
            root_cas: self.config.ca_pool.clone(),
        }
    }

    /// Runs the one TLS handshake this connection may perform. The handshake
    /// log is stored whether or not the handshake succeeds.
    #[instrument(skip_all, fields(peer = %self.peer, policy = %self.config.policy))]
    pub async fn tls_handshake(&mut self) -> Result<HandshakeOutcome, ConnError> {
        if !matches!(self.state, ConnState::Plain | ConnState::Negotiating(_)) {
            let err = ConnError::RepeatHandshake {
                peer: self.peer.clone(),
            };
            return self.track(Err(err));
        }
        let config = self.tls_config();
        self.state = ConnState::Handshaking;

        let mut transcript = Transcript::default();
        let result =
            tls::client::handshake(&mut self.transport.io(), &config, &mut transcript).await;
        self.grab.tls_handshake =
            Some(self.recorder.record(&transcript, transcript.negotiated_cipher()));

        match result {
            Ok(session) => {
                debug!(
                    suite = session.cipher_suite,
                    version = session.version,
                    "handshake complete"
                );
                self.state = ConnState::Established(session);
                Ok(HandshakeOutcome::Completed)
            }
            Err(HandshakeError::NoSharedCipher) if config.force_suites => {
                debug!("no offered suite acceptable to server");
                self.state = ConnState::Aborted;
                Ok(HandshakeOutcome::NoSharedCipher)
            }
            Err(err) => {
                self.state = ConnState::Aborted;
                self.track(Err(err.into()))
            }
        }
    }

    /// Sends one malformed heartbeat over the established session. Detection
    /// is a normal result, reported through [`HeartbleedLog::vulnerable`].
    pub async fn check_heartbleed(&mut self) -> Result<HeartbleedLog, ConnError> {
        let ConnState::Established(session) = self.state else {
            let err = ConnError::HandshakeRequired {
                peer: self.peer.clone(),
            };
            return self.track(Err(err));
        };
        let result = tls::client::check_heartbleed(&mut self.transport.io(), &session).await;
        match result {
            Ok(log) => {
                self.grab.heartbleed = Some(log);
                Ok(log)
            }
            Err(err) => {
                self.grab.heartbleed = Some(HeartbleedLog {
                    heartbeat_enabled: session.heartbeat,
                    vulnerable: false,
                });
                self.track(Err(err.into()))
            }
        }
    }

    /// Requests explicit FTPS on the control channel and, when the server
    /// answers 234, upgrades. `None` means the server declined.
    pub async fn ftps_handshake(&mut self) -> Result<Option<HandshakeOutcome>, ConnError> {
        if !matches!(self.state, ConnState::Plain) {
            let err = ConnError::StartTlsAfterTls {
                peer: self.peer.clone(),
            };
            return self.track(Err(err));
        }
        self.state = ConnState::Negotiating("ftp");
        let mut log = self.grab.ftp.take().unwrap_or_default();
        let ready = ftp::prepare_ftps(&mut log, &mut self.transport.io()).await;
        self.grab.ftp = Some(log);
        match ready {
            Ok(true) => self.tls_handshake().await.map(Some),
            Ok(false) => {
                self.state = ConnState::Plain;
                Ok(None)
            }
            Err(err) => {
                self.state = ConnState::Plain;
                self.track(Err(err.into()))
            }
        }
    }

    pub async fn ssh_handshake(&mut self) -> Result<(), ConnError> {
        let result = self.ssh_handshake_inner().await;
        self.track(result)
    }

    async fn ssh_handshake_inner(&mut self) -> Result<(), ConnError> {
        self.ensure_plain()?;
        let mut log = SshLog::default();
        let result = ssh::handshake(&mut self.transport.io(), &self.config.ssh, &mut log).await;
        self.grab.ssh = Some(log);
        Ok(result?)
    }

    /// Sends a Modbus read-device-identification request and records the
    /// decoded reply.
    pub async fn send_modbus_echo(&mut self) -> Result<ModbusEvent, ConnError> {
        let result = self.send_modbus_echo_inner().await;
        self.track(result)
    }

    async fn send_modbus_echo_inner(&mut self) -> Result<ModbusEvent, ConnError> {
        self.ensure_plain()?;
        self.grab.modbus = Some(ModbusEvent::default());
        let req = ModbusRequest::device_identification();
        let mut io = self.transport.io();
        modbus::write_request(&mut io, &req).await?;
        let res = modbus::read_response(&mut io).await?;
        let event = ModbusEvent::from(res);
        self.grab.modbus = Some(event.clone());
        Ok(event)
    }
}

fn settle(res: ReadResult, protocol: &'static str, limit: usize) -> Result<String, ConnError> {
    settle_bytes(res, protocol, limit).map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

/// A framed read only counts when its terminator arrived.
fn settle_bytes(
    res: ReadResult,
    protocol: &'static str,
    limit: usize,
) -> Result<Vec<u8>, ConnError> {
    match res.reason {
        ReadStopReason::Delimiter => Ok(res.bytes),
        ReadStopReason::SizeLimit => Err(ConnError::ResponseTooLong { protocol, limit }),
        ReadStopReason::ConnectionClosed => Err(ConnError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("{protocol} response ended early"),
        ))),
    }
}
