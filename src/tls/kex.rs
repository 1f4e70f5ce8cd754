//! Decoders for the parameters carried in a ServerKeyExchange message.
//!
//! Targets routinely send truncated or garbage key-exchange blobs, so every
//! decoder here reports failure as `None` and never panics.

use num_bigint::BigUint;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::util::b64;

/// Splits a `opaque field<0..2^16-1>` off the front of `buf`.
///
/// Returns the field body and the remaining bytes, or `None` when fewer than
/// two bytes remain for the length or the declared length overruns `buf`.
pub fn read_vec16(buf: &[u8]) -> Option<(&[u8], &[u8])> {
    if buf.len() < 2 {
        return None;
    }
    let len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
    let rest = &buf[2..];
    if rest.len() < len {
        return None;
    }
    Some(rest.split_at(len))
}

/// Finite-field Diffie-Hellman parameters (`ServerDHParams`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhParams {
    pub prime: BigUint,
    pub generator: BigUint,
    pub public_value: BigUint,
}

impl DhParams {
    pub fn decode(buf: &[u8]) -> Option<DhParams> {
        Self::decode_prefix(buf).map(|(params, _)| params)
    }

    /// Decodes the three length-prefixed integers and hands back whatever
    /// follows them (the signature, for signed key exchanges).
    pub fn decode_prefix(buf: &[u8]) -> Option<(DhParams, &[u8])> {
        let (p, rest) = read_vec16(buf)?;
        let (g, rest) = read_vec16(rest)?;
        let (ys, rest) = read_vec16(rest)?;
        let params = DhParams {
            prime: BigUint::from_bytes_be(p),
            generator: BigUint::from_bytes_be(g),
            public_value: BigUint::from_bytes_be(ys),
        };
        Some((params, rest))
    }

    pub fn prime_bits(&self) -> u64 {
        self.prime.bits()
    }
}

impl Serialize for DhParams {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("DhParams", 4)?;
        state.serialize_field("prime", &b64::Base64(&magnitude(&self.prime)))?;
        state.serialize_field("prime_length", &self.prime_bits())?;
        state.serialize_field("generator", &b64::Base64(&magnitude(&self.generator)))?;
        state.serialize_field(
            "public_exponent",
            &b64::Base64(&magnitude(&self.public_value)),
        )?;
        state.end()
    }
}

/// Ephemeral RSA key sent with RSA_EXPORT cipher suites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RsaExportParams {
    #[serde(serialize_with = "b64::serialize")]
    pub modulus: Vec<u8>,
    pub exponent: u32,
    pub length: u64,
}

impl RsaExportParams {
    /// Builds the log form from the already separated modulus and exponent.
    pub fn decode(modulus: &[u8], exponent: &[u8]) -> RsaExportParams {
        let exponent = exponent
            .iter()
            .fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
        let modulus = BigUint::from_bytes_be(modulus);
        RsaExportParams {
            modulus: magnitude(&modulus),
            exponent,
            length: modulus.bits(),
        }
    }
}

/// Big-endian magnitude with no leading zero bytes; zero encodes as empty.
pub fn magnitude(value: &BigUint) -> Vec<u8> {
    if value.bits() == 0 {
        Vec::new()
    } else {
        value.to_bytes_be()
    }
}

const EXPORT_HASHES: &[&str] = &["MD5", "SHA-1", "SHA-224", "SHA-256", "SHA-384", "SHA-512"];

const EXPORT_ALGORITHMS: &[&str] = &["anon", "RSA", "DSA", "ECDSA"];

/// TLS 1.2 `SignatureAndHashAlgorithm`: hash id in the high byte, signature
/// algorithm id in the low byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSignatureAlgorithm(pub u16);

impl ExportSignatureAlgorithm {
    pub fn hash_id(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn algorithm_id(self) -> u8 {
        self.0 as u8
    }

    pub fn hash_name(self) -> &'static str {
        EXPORT_HASHES
            .get(self.hash_id() as usize)
            .copied()
            .unwrap_or("")
    }

    pub fn algorithm_name(self) -> &'static str {
        EXPORT_ALGORITHMS
            .get(self.algorithm_id() as usize)
            .copied()
            .unwrap_or("")
    }
}

impl Serialize for ExportSignatureAlgorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ExportSignatureAlgorithm", 5)?;
        state.serialize_field("value", &self.0)?;
        state.serialize_field("hash_name", self.hash_name())?;
        state.serialize_field("hash_id", &self.hash_id())?;
        state.serialize_field("algorithm_name", self.algorithm_name())?;
        state.serialize_field("algorithm_id", &self.algorithm_id())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vec16(body: &[u8]) -> Vec<u8> {
        let mut out = (body.len() as u16).to_be_bytes().to_vec();
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn decodes_well_formed_dh_params() {
        let prime = vec![0xff; 256];
        let mut buf = vec16(&prime);
        buf.extend(vec16(&[0x02]));
        buf.extend(vec16(&[0x01, 0x00, 0x01]));

        let params = DhParams::decode(&buf).unwrap();
        assert_eq!(params.prime, BigUint::from_bytes_be(&prime));
        assert_eq!(params.prime_bits(), 2048);
        assert_eq!(params.generator, BigUint::from(2u32));
        assert_eq!(params.public_value, BigUint::from(65537u32));
    }

    #[test]
    fn returns_trailing_signature_bytes() {
        let mut buf = vec16(&[0x17]);
        buf.extend(vec16(&[0x05]));
        buf.extend(vec16(&[0x03]));
        buf.extend_from_slice(&[0x04, 0x01, 0xaa]);
        let (_, rest) = DhParams::decode_prefix(&buf).unwrap();
        assert_eq!(rest, &[0x04, 0x01, 0xaa]);
    }

    #[test]
    fn truncated_dh_buffers_fail_without_panicking() {
        let mut full = vec16(&[0xab; 64]);
        full.extend(vec16(&[0x02]));
        full.extend(vec16(&[0xcd; 64]));
        assert!(DhParams::decode(&full).is_some());
        for cut in 0..full.len() {
            assert!(DhParams::decode(&full[..cut]).is_none(), "cut at {cut}");
        }
    }

    #[test]
    fn rejects_length_beyond_buffer() {
        assert!(DhParams::decode(&[0x00]).is_none());
        assert!(DhParams::decode(&[0xff, 0xff, 0x01]).is_none());
    }

    #[test]
    fn folds_rsa_export_exponent_big_endian() {
        let params = RsaExportParams::decode(&[0x00, 0xc3, 0x51], &[0x01, 0x00, 0x01]);
        assert_eq!(params.exponent, 65537);
        assert_eq!(params.modulus, vec![0xc3, 0x51]);
        assert_eq!(params.length, 16);
    }

    #[test]
    fn dh_params_serialize_magnitudes_and_prime_length() {
        let params = DhParams {
            prime: BigUint::from(0x0100u32),
            generator: BigUint::from(2u32),
            public_value: BigUint::from(0u32),
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["prime"], "AQA=");
        assert_eq!(json["prime_length"], 9);
        assert_eq!(json["generator"], "Ag==");
        assert_eq!(json["public_exponent"], "");
    }

    #[test]
    fn signature_algorithm_names_are_bounds_checked() {
        let sha384_rsa = ExportSignatureAlgorithm(0x0401);
        assert_eq!(sha384_rsa.hash_name(), "SHA-384");
        assert_eq!(sha384_rsa.algorithm_name(), "RSA");
        assert_eq!(ExportSignatureAlgorithm(0x0001).hash_name(), "MD5");
        assert_eq!(ExportSignatureAlgorithm(0x0601).hash_name(), "");

        let unknown = ExportSignatureAlgorithm(0x0907);
        let json = serde_json::to_value(unknown).unwrap();
        assert_eq!(json["value"], 0x0907);
        assert_eq!(json["hash_name"], "");
        assert_eq!(json["hash_id"], 9);
        assert_eq!(json["algorithm_name"], "");
        assert_eq!(json["algorithm_id"], 7);
    }
}
