//! Certificate decoding and the CA pool shared by all connections.
//!
//! Decoding is delegated to OpenSSL when the `x509` feature is enabled;
//! without it certificates are logged raw only.

use std::io::BufReader;

use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum CertificateError {
    #[error("certificate decoding is not compiled in (enable the `x509` feature)")]
    Unsupported,

    #[error("failed to decode certificate: {0}")]
    Decode(String),

    #[error("no certificates found in PEM input")]
    EmptyPem,

    #[error("invalid PEM bundle: {0}")]
    Pem(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedCertificate {
    pub subject: String,
    pub issuer: String,
    pub serial_number: String,
    pub not_before: String,
    pub not_after: String,
    pub signature_algorithm: String,
    pub public_key_bits: Option<u32>,
}

#[cfg(feature = "x509")]
pub fn parse_certificate(der: &[u8]) -> Result<ParsedCertificate, CertificateError> {
    use openssl::x509::{X509NameRef, X509};

    fn format_name(name: &X509NameRef) -> String {
        let mut parts = Vec::new();
        for entry in name.entries() {
            let key = entry.object().nid().short_name().unwrap_or("UNKNOWN");
            let value = entry
                .data()
                .as_utf8()
                .map(|val| val.to_string())
                .unwrap_or_default();
            if !value.is_empty() {
                parts.push(format!("{key}={value}"));
            }
        }
        parts.join(", ")
    }

    let cert = X509::from_der(der).map_err(|err| CertificateError::Decode(err.to_string()))?;
    let serial_number = cert
        .serial_number()
        .to_bn()
        .and_then(|bn| bn.to_hex_str().map(|hex| hex.to_string()))
        .unwrap_or_default();
    Ok(ParsedCertificate {
        subject: format_name(cert.subject_name()),
        issuer: format_name(cert.issuer_name()),
        serial_number,
        not_before: cert.not_before().to_string(),
        not_after: cert.not_after().to_string(),
        signature_algorithm: cert
            .signature_algorithm()
            .object()
            .nid()
            .short_name()
            .unwrap_or("UNKNOWN")
            .to_string(),
        public_key_bits: cert.public_key().ok().map(|key| key.bits()),
    })
}

#[cfg(not(feature = "x509"))]
pub fn parse_certificate(_der: &[u8]) -> Result<ParsedCertificate, CertificateError> {
    Err(CertificateError::Unsupported)
}

/// Trusted roots, read-only once loaded and shared across scans.
#[derive(Debug, Clone, Default)]
pub struct CaPool {
    roots: Vec<Vec<u8>>,
}

impl CaPool {
    pub fn from_der(roots: Vec<Vec<u8>>) -> Self {
        Self { roots }
    }

    /// Loads every `CERTIFICATE` block from a PEM bundle. A malformed or
    /// truncated block fails the whole load.
    pub fn from_pem(text: &str) -> Result<Self, CertificateError> {
        let mut rd = BufReader::new(text.as_bytes());
        let roots = rustls_pemfile::certs(&mut rd)
            .map(|der| der.map(|der| der.to_vec()))
            .collect::<Result<Vec<_>, _>>()?;
        if roots.is_empty() {
            return Err(CertificateError::EmptyPem);
        }
        Ok(Self { roots })
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn contains(&self, der: &[u8]) -> bool {
        self.roots.iter().any(|root| root.as_slice() == der)
    }

    /// Whether any certificate of a presented chain is one of the pool's
    /// roots. Recorded only; it never fails a handshake.
    pub fn anchors(&self, chain: &[Vec<u8>]) -> bool {
        chain.iter().any(|cert| self.contains(cert))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUNDLE: &str = "# comment
-----BEGIN CERTIFICATE-----
AQID
-----END CERTIFICATE-----
-----BEGIN CERTIFICATE-----
BAUG
Bwg=
-----END CERTIFICATE-----
";

    #[test]
    fn loads_pem_bundle() {
        let pool = CaPool::from_pem(BUNDLE).unwrap();
        assert_eq!(pool.len(), 2);
        assert!(pool.contains(&[1, 2, 3]));
        assert!(pool.contains(&[4, 5, 6, 7, 8]));
        assert!(pool.anchors(&[vec![9], vec![1, 2, 3]]));
        assert!(!pool.anchors(&[vec![9]]));
    }

    #[test]
    fn rejects_empty_bundle() {
        assert!(matches!(
            CaPool::from_pem("nothing here"),
            Err(CertificateError::EmptyPem)
        ));
    }

    #[test]
    fn truncated_bundle_is_rejected() {
        let text = "-----BEGIN CERTIFICATE-----
AQID
-----END CERTIFICATE-----
-----BEGIN CERTIFICATE-----
BAUG
";
        assert!(matches!(
            CaPool::from_pem(text),
            Err(CertificateError::Pem(_))
        ));
    }

    #[cfg(feature = "x509")]
    #[test]
    fn decodes_self_signed_certificate() {
        use openssl::asn1::Asn1Time;
        use openssl::bn::BigNum;
        use openssl::hash::MessageDigest;
        use openssl::pkey::PKey;
        use openssl::rsa::Rsa;
        use openssl::x509::{X509NameBuilder, X509};

        let key = PKey::from_rsa(Rsa::generate(1024).unwrap()).unwrap();
        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("CN", "mail.example.com").unwrap();
        let name = name.build();
        let serial = BigNum::from_u32(42).unwrap().to_asn1_integer().unwrap();
        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        builder.set_serial_number(&serial).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&key).unwrap();
        builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
        builder.set_not_after(&Asn1Time::days_from_now(30).unwrap()).unwrap();
        builder.sign(&key, MessageDigest::sha256()).unwrap();
        let der = builder.build().to_der().unwrap();

        let parsed = parse_certificate(&der).unwrap();
        assert_eq!(parsed.subject, "CN=mail.example.com");
        assert_eq!(parsed.issuer, parsed.subject);
        assert_eq!(parsed.serial_number, "2A");
        assert_eq!(parsed.public_key_bits, Some(1024));
    }

    #[test]
    fn garbage_certificate_is_an_error_not_a_panic() {
        assert!(parse_certificate(&[0x30, 0x03, 0x01]).is_err());
    }
}
