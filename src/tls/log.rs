//! Handshake recorder: turns a captured [`Transcript`] into the structured
//! [`HandshakeLog`] that ends up in scan output.

use serde::Serialize;
use std::sync::Arc;
use tracing::trace;

use super::ciphers::{family_of, CipherFamily, CipherSuiteId};
use super::client::Transcript;
use super::kex::{read_vec16, DhParams, ExportSignatureAlgorithm, RsaExportParams};
use super::messages::{CertificateMsg, ServerHelloMsg, ServerKeyExchangeMsg};
use super::x509::{parse_certificate, CaPool, ParsedCertificate};
use super::{TlsVersion, VERSION_TLS12};
use crate::util::b64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerHello {
    pub version: TlsVersion,
    #[serde(serialize_with = "b64::serialize")]
    pub random: Vec<u8>,
    #[serde(serialize_with = "b64::serialize")]
    pub session_id: Vec<u8>,
    pub cipher_suite: CipherSuiteId,
    pub compression_method: u8,
    pub ocsp_stapling: bool,
    pub ticket: bool,
    pub secure_renegotiation: bool,
    pub heartbeat: bool,
}

impl From<&ServerHelloMsg> for ServerHello {
    fn from(msg: &ServerHelloMsg) -> Self {
        ServerHello {
            version: TlsVersion(msg.version),
            random: msg.random.clone(),
            session_id: msg.session_id.clone(),
            cipher_suite: msg.cipher_suite,
            compression_method: msg.compression_method,
            ocsp_stapling: msg.ocsp_stapling,
            ticket: msg.ticket_supported,
            secure_renegotiation: msg.secure_renegotiation,
            heartbeat: msg.heartbeat_enabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Certificates {
    /// Raw DER in the order the server sent it.
    #[serde(serialize_with = "b64::list::serialize")]
    pub certificates: Vec<Vec<u8>>,
    /// Index-aligned with `certificates`; `None` where decoding failed.
    pub parsed_certificates: Vec<Option<ParsedCertificate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchored: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerKeyExchange {
    #[serde(serialize_with = "b64::serialize")]
    pub key: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_algorithm: Option<ExportSignatureAlgorithm>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finished {
    #[serde(serialize_with = "b64::serialize")]
    pub verify_data: Vec<u8>,
}

/// Decoded key-exchange parameters. Only one family can apply to a
/// negotiated suite, so at most one of these is ever recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum KeyExchangeParams {
    #[serde(rename = "rsa_export_params")]
    RsaExport(RsaExportParams),
    #[serde(rename = "dh_export_params")]
    DhExport(DhParams),
    #[serde(rename = "dh_params")]
    Dh(DhParams),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HandshakeLog {
    pub server_hello: Option<ServerHello>,
    pub server_certificates: Option<Certificates>,
    pub server_key_exchange: Option<ServerKeyExchange>,
    #[serde(flatten)]
    pub key_exchange_params: Option<KeyExchangeParams>,
    pub server_finished: Option<Finished>,
}

impl HandshakeLog {
    pub fn rsa_export_params(&self) -> Option<&RsaExportParams> {
        match &self.key_exchange_params {
            Some(KeyExchangeParams::RsaExport(params)) => Some(params),
            _ => None,
        }
    }

    pub fn dh_export_params(&self) -> Option<&DhParams> {
        match &self.key_exchange_params {
            Some(KeyExchangeParams::DhExport(params)) => Some(params),
            _ => None,
        }
    }

    pub fn dh_params(&self) -> Option<&DhParams> {
        match &self.key_exchange_params {
            Some(KeyExchangeParams::Dh(params)) => Some(params),
            _ => None,
        }
    }

    pub fn negotiated_cipher(&self) -> Option<CipherSuiteId> {
        self.server_hello.as_ref().map(|hello| hello.cipher_suite)
    }
}

/// Builds handshake logs. Pure: performs no I/O and tolerates any subset of
/// messages being absent.
#[derive(Debug, Clone, Default)]
pub struct HandshakeRecorder {
    ca_pool: Option<Arc<CaPool>>,
}

impl HandshakeRecorder {
    pub fn new(ca_pool: Option<Arc<CaPool>>) -> Self {
        Self { ca_pool }
    }

    /// `negotiated` is the suite the engine settled on; when absent the
    /// ServerHello's choice is used.
    pub fn record(
        &self,
        transcript: &Transcript,
        negotiated: Option<CipherSuiteId>,
    ) -> HandshakeLog {
        let hello = transcript.server_hello.as_ref();
        let suite = negotiated.or_else(|| hello.map(|h| h.cipher_suite));
        let version = hello.map(|h| h.version).unwrap_or_default();

        let mut log = HandshakeLog {
            server_hello: hello.map(ServerHello::from),
            server_certificates: transcript
                .certificate
                .as_ref()
                .map(|msg| self.certificates(msg)),
            server_finished: transcript.finished.as_ref().map(|msg| Finished {
                verify_data: msg.verify_data.clone(),
            }),
            ..HandshakeLog::default()
        };

        if let Some(skx) = &transcript.server_key_exchange {
            let family = suite.map(family_of).unwrap_or(CipherFamily::None);
            let (params, signature_algorithm) = decode_key_exchange(skx, family, version);
            log.server_key_exchange = Some(ServerKeyExchange {
                key: skx.key.clone(),
                signature_algorithm,
            });
            log.key_exchange_params = params;
        }
        log
    }

    fn certificates(&self, msg: &CertificateMsg) -> Certificates {
        let parsed_certificates = msg
            .certificates
            .iter()
            .map(|der| match parse_certificate(der) {
                Ok(cert) => Some(cert),
                Err(err) => {
                    trace!(%err, "certificate not decoded");
                    None
                }
            })
            .collect();
        Certificates {
            certificates: msg.certificates.clone(),
            parsed_certificates,
            anchored: self
                .ca_pool
                .as_ref()
                .map(|pool| pool.anchors(&msg.certificates)),
        }
    }
}

fn decode_key_exchange(
    skx: &ServerKeyExchangeMsg,
    family: CipherFamily,
    version: u16,
) -> (Option<KeyExchangeParams>, Option<ExportSignatureAlgorithm>) {
    let decoded = match family {
        CipherFamily::None => None,
        CipherFamily::RsaExport => read_vec16(&skx.key).and_then(|(modulus, rest)| {
            let (exponent, rest) = read_vec16(rest)?;
            Some((
                KeyExchangeParams::RsaExport(RsaExportParams::decode(modulus, exponent)),
                rest,
            ))
        }),
        CipherFamily::DheExport => DhParams::decode_prefix(&skx.key)
            .map(|(params, rest)| (KeyExchangeParams::DhExport(params), rest)),
        CipherFamily::Dhe => DhParams::decode_prefix(&skx.key)
            .map(|(params, rest)| (KeyExchangeParams::Dh(params), rest)),
    };
    match decoded {
        Some((params, rest)) => (Some(params), signature_algorithm(rest, version)),
        None => (None, None),
    }
}

/// TLS 1.2 signed parameters lead with a SignatureAndHashAlgorithm.
fn signature_algorithm(rest: &[u8], version: u16) -> Option<ExportSignatureAlgorithm> {
    match rest {
        [hash, alg, ..] if version >= VERSION_TLS12 => {
            Some(ExportSignatureAlgorithm(u16::from_be_bytes([*hash, *alg])))
        }
        _ => None,
    }
}
