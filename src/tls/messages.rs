//! Handshake message codecs: ClientHello construction and parsing of the
//! messages a server sends in its first flight.

use bytes::{BufMut, BytesMut};

use super::ciphers::{is_elliptic, CipherSuiteId};
use super::{HandshakeError, VERSION_SSL30, VERSION_TLS12};

pub const TYPE_CLIENT_HELLO: u8 = 1;
pub const TYPE_SERVER_HELLO: u8 = 2;
pub const TYPE_CERTIFICATE: u8 = 11;
pub const TYPE_SERVER_KEY_EXCHANGE: u8 = 12;
pub const TYPE_CERTIFICATE_REQUEST: u8 = 13;
pub const TYPE_SERVER_HELLO_DONE: u8 = 14;
pub const TYPE_FINISHED: u8 = 20;
pub const TYPE_CERTIFICATE_STATUS: u8 = 22;

const EXT_SERVER_NAME: u16 = 0x0000;
const EXT_STATUS_REQUEST: u16 = 0x0005;
const EXT_SUPPORTED_GROUPS: u16 = 0x000a;
const EXT_EC_POINT_FORMATS: u16 = 0x000b;
const EXT_SIGNATURE_ALGORITHMS: u16 = 0x000d;
const EXT_HEARTBEAT: u16 = 0x000f;
const EXT_SESSION_TICKET: u16 = 0x0023;
const EXT_EXTENDED_RANDOM: u16 = 0x0028;
const EXT_RENEGOTIATION_INFO: u16 = 0xff01;

const SUPPORTED_GROUPS: &[u16] = &[0x0017, 0x0018, 0x0019, 0x001d];

const SIGNATURE_ALGORITHMS: &[(u8, u8)] = &[
    (4, 1),
    (5, 1),
    (6, 1),
    (2, 1),
    (4, 3),
    (5, 3),
    (2, 3),
    (4, 2),
    (2, 2),
];

/// Byte cursor over a handshake message body.
struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.buf.len() < n {
            return None;
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Some(head)
    }

    fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    fn u16(&mut self) -> Option<u16> {
        self.take(2).map(|b| u16::from_be_bytes([b[0], b[1]]))
    }

    fn u24(&mut self) -> Option<usize> {
        self.take(3)
            .map(|b| ((b[0] as usize) << 16) | ((b[1] as usize) << 8) | b[2] as usize)
    }

    fn vec8(&mut self) -> Option<&'a [u8]> {
        let len = self.u8()? as usize;
        self.take(len)
    }

    fn vec16(&mut self) -> Option<&'a [u8]> {
        let len = self.u16()? as usize;
        self.take(len)
    }

    fn vec24(&mut self) -> Option<&'a [u8]> {
        let len = self.u24()?;
        self.take(len)
    }
}

#[derive(Debug, Clone)]
pub struct ClientHello {
    pub version: u16,
    pub random: [u8; 32],
    pub cipher_suites: Vec<CipherSuiteId>,
    pub server_name: Option<String>,
    pub heartbeat: bool,
    pub extended_random: Option<Vec<u8>>,
}

impl ClientHello {
    /// Encodes the full handshake message (type, length and body).
    pub fn marshal(&self) -> Vec<u8> {
        let mut body = BytesMut::new();
        body.put_u16(self.version);
        body.put_slice(&self.random);
        body.put_u8(0);
        body.put_u16((self.cipher_suites.len() * 2) as u16);
        for suite in &self.cipher_suites {
            body.put_u16(*suite);
        }
        body.put_u8(1);
        body.put_u8(0);

        if self.version > VERSION_SSL30 {
            let extensions = self.extensions();
            body.put_u16(extensions.len() as u16);
            body.put_slice(&extensions);
        }

        let mut msg = BytesMut::with_capacity(body.len() + 4);
        msg.put_u8(TYPE_CLIENT_HELLO);
        put_u24(&mut msg, body.len());
        msg.put_slice(&body);
        msg.to_vec()
    }

    fn extensions(&self) -> BytesMut {
        let mut out = BytesMut::new();

        if let Some(name) = self.server_name.as_deref().filter(|n| !n.is_empty()) {
            let mut data = BytesMut::new();
            data.put_u16((name.len() + 3) as u16);
            data.put_u8(0);
            data.put_u16(name.len() as u16);
            data.put_slice(name.as_bytes());
            put_extension(&mut out, EXT_SERVER_NAME, &data);
        }

        put_extension(&mut out, EXT_STATUS_REQUEST, &[1, 0, 0, 0, 0]);

        if self.cipher_suites.iter().any(|s| is_elliptic(*s)) {
            let mut groups = BytesMut::new();
            groups.put_u16((SUPPORTED_GROUPS.len() * 2) as u16);
            for group in SUPPORTED_GROUPS {
                groups.put_u16(*group);
            }
            put_extension(&mut out, EXT_SUPPORTED_GROUPS, &groups);
            put_extension(&mut out, EXT_EC_POINT_FORMATS, &[1, 0]);
        }

        if self.version >= VERSION_TLS12 {
            let mut algs = BytesMut::new();
            algs.put_u16((SIGNATURE_ALGORITHMS.len() * 2) as u16);
            for (hash, sig) in SIGNATURE_ALGORITHMS {
                algs.put_u8(*hash);
                algs.put_u8(*sig);
            }
            put_extension(&mut out, EXT_SIGNATURE_ALGORITHMS, &algs);
        }

        put_extension(&mut out, EXT_SESSION_TICKET, &[]);

        if self.heartbeat {
            // peer_allowed_to_send
            put_extension(&mut out, EXT_HEARTBEAT, &[1]);
        }

        if let Some(random) = &self.extended_random {
            let mut data = BytesMut::new();
            data.put_u16(random.len() as u16);
            data.put_slice(random);
            put_extension(&mut out, EXT_EXTENDED_RANDOM, &data);
        }

        put_extension(&mut out, EXT_RENEGOTIATION_INFO, &[0]);
        out
    }
}

fn put_u24(buf: &mut BytesMut, len: usize) {
    buf.put_u8((len >> 16) as u8);
    buf.put_u8((len >> 8) as u8);
    buf.put_u8(len as u8);
}

fn put_extension(buf: &mut BytesMut, ext_type: u16, data: &[u8]) {
    buf.put_u16(ext_type);
    buf.put_u16(data.len() as u16);
    buf.put_slice(data);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHelloMsg {
    pub version: u16,
    pub random: Vec<u8>,
    pub session_id: Vec<u8>,
    pub cipher_suite: CipherSuiteId,
    pub compression_method: u8,
    pub ocsp_stapling: bool,
    pub ticket_supported: bool,
    pub secure_renegotiation: bool,
    pub heartbeat_enabled: bool,
    pub extended_random: Option<Vec<u8>>,
}

impl ServerHelloMsg {
    pub fn parse(body: &[u8]) -> Result<Self, HandshakeError> {
        const WHAT: &str = "server hello";
        let mut r = Reader::new(body);
        let version = r.u16().ok_or(HandshakeError::Malformed(WHAT))?;
        let random = r.take(32).ok_or(HandshakeError::Malformed(WHAT))?.to_vec();
        let session_id = r.vec8().ok_or(HandshakeError::Malformed(WHAT))?.to_vec();
        let cipher_suite = r.u16().ok_or(HandshakeError::Malformed(WHAT))?;
        let compression_method = r.u8().ok_or(HandshakeError::Malformed(WHAT))?;

        let mut hello = ServerHelloMsg {
            version,
            random,
            session_id,
            cipher_suite,
            compression_method,
            ocsp_stapling: false,
            ticket_supported: false,
            secure_renegotiation: false,
            heartbeat_enabled: false,
            extended_random: None,
        };

        if r.is_empty() {
            return Ok(hello);
        }

        let mut exts = Reader::new(r.vec16().ok_or(HandshakeError::Malformed(WHAT))?);
        while !exts.is_empty() {
            let ext_type = exts.u16().ok_or(HandshakeError::Malformed(WHAT))?;
            let data = exts.vec16().ok_or(HandshakeError::Malformed(WHAT))?;
            match ext_type {
                EXT_STATUS_REQUEST => hello.ocsp_stapling = true,
                EXT_SESSION_TICKET => hello.ticket_supported = true,
                EXT_RENEGOTIATION_INFO => hello.secure_renegotiation = true,
                EXT_HEARTBEAT => hello.heartbeat_enabled = true,
                EXT_EXTENDED_RANDOM => {
                    let random = Reader::new(data)
                        .vec16()
                        .ok_or(HandshakeError::Malformed(WHAT))?;
                    hello.extended_random = Some(random.to_vec());
                }
                _ => {}
            }
        }
        Ok(hello)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CertificateMsg {
    pub certificates: Vec<Vec<u8>>,
}

impl CertificateMsg {
    pub fn parse(body: &[u8]) -> Result<Self, HandshakeError> {
        const WHAT: &str = "certificate message";
        let mut r = Reader::new(body);
        let mut list = Reader::new(r.vec24().ok_or(HandshakeError::Malformed(WHAT))?);
        let mut certificates = Vec::new();
        while !list.is_empty() {
            let cert = list.vec24().ok_or(HandshakeError::Malformed(WHAT))?;
            certificates.push(cert.to_vec());
        }
        Ok(CertificateMsg { certificates })
    }
}

/// The key exchange body is kept opaque; its layout depends on the
/// negotiated suite and is decoded by the recorder.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerKeyExchangeMsg {
    pub key: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FinishedMsg {
    pub verify_data: Vec<u8>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::util::hex::from_hex;

    /// ServerHello body for TLS 1.2 selecting `suite`, with heartbeat and
    /// renegotiation_info extensions.
    pub(crate) fn server_hello_body(suite: u16) -> Vec<u8> {
        let mut body = vec![0x03, 0x03];
        body.extend_from_slice(&[0x11; 32]);
        body.push(4);
        body.extend_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd]);
        body.extend_from_slice(&suite.to_be_bytes());
        body.push(0);
        body.extend_from_slice(&from_hex("000a ff01 0001 00 000f 0001 01").unwrap());
        body
    }

    #[test]
    fn parses_server_hello_extensions() {
        let hello = ServerHelloMsg::parse(&server_hello_body(0x0033)).unwrap();
        assert_eq!(hello.version, 0x0303);
        assert_eq!(hello.random, vec![0x11; 32]);
        assert_eq!(hello.session_id, vec![0xaa, 0xbb, 0xcc, 0xdd]);
        assert_eq!(hello.cipher_suite, 0x0033);
        assert!(hello.secure_renegotiation);
        assert!(hello.heartbeat_enabled);
        assert!(!hello.ocsp_stapling);
        assert!(!hello.ticket_supported);
    }

    #[test]
    fn server_hello_without_extensions() {
        let mut body = server_hello_body(0x002f);
        body.truncate(2 + 32 + 1 + 4 + 2 + 1);
        let hello = ServerHelloMsg::parse(&body).unwrap();
        assert!(!hello.heartbeat_enabled);
    }

    #[test]
    fn truncated_server_hello_is_malformed() {
        let body = server_hello_body(0x002f);
        assert!(matches!(
            ServerHelloMsg::parse(&body[..20]),
            Err(HandshakeError::Malformed(_))
        ));
    }

    #[test]
    fn parses_certificate_chain_in_order() {
        let body = from_hex("00000c 000003 010203 000003 040506").unwrap();
        let msg = CertificateMsg::parse(&body).unwrap();
        assert_eq!(msg.certificates, vec![vec![1, 2, 3], vec![4, 5, 6]]);
        assert!(CertificateMsg::parse(&body[..8]).is_err());
    }

    #[test]
    fn client_hello_carries_policy_and_sni() {
        let hello = ClientHello {
            version: VERSION_TLS12,
            random: [7; 32],
            cipher_suites: vec![0x0003, 0x0006],
            server_name: Some("mail.example".into()),
            heartbeat: true,
            extended_random: None,
        };
        let msg = hello.marshal();
        assert_eq!(msg[0], TYPE_CLIENT_HELLO);
        let len = ((msg[1] as usize) << 16) | ((msg[2] as usize) << 8) | msg[3] as usize;
        assert_eq!(len, msg.len() - 4);
        assert_eq!(&msg[4..6], &[0x03, 0x03]);
        // version + random + empty session id
        let suites = &msg[4 + 2 + 32 + 1..];
        assert_eq!(&suites[..6], &[0x00, 0x04, 0x00, 0x03, 0x00, 0x06]);
        assert!(msg.windows(12).any(|w| w == b"mail.example"));
        assert!(msg.windows(5).any(|w| w == [0x00, 0x0f, 0x00, 0x01, 0x01]));
        // no elliptic suites offered, so no supported_groups
        assert!(!msg.windows(2).any(|w| w == [0x00, 0x0a]));
    }

    #[test]
    fn ssl3_hello_has_no_extensions() {
        let hello = ClientHello {
            version: VERSION_SSL30,
            random: [0; 32],
            cipher_suites: vec![0x000a],
            server_name: Some("example.org".into()),
            heartbeat: true,
            extended_random: None,
        };
        let msg = hello.marshal();
        assert_eq!(msg.len(), 4 + 2 + 32 + 1 + 2 + 2 + 2);
    }
}
