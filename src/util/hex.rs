use std::fmt::Write;

pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{:02x}", b);
    }
    out
}

/// Parses a hex dump, ignoring any whitespace between digit pairs.
pub fn from_hex(hex: &str) -> Result<Vec<u8>, String> {
    let cleaned: Vec<u8> = hex.bytes().filter(|c| !c.is_ascii_whitespace()).collect();
    if cleaned.len() % 2 != 0 {
        return Err("hex string has an odd length".into());
    }
    cleaned
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).map_err(|_| "non-ascii hex input".to_string())?;
            u8::from_str_radix(pair, 16).map_err(|_| format!("invalid hex pair: {pair}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_hex() {
        assert_eq!(to_hex(&[0xde, 0xad, 0x01]), "dead01");
    }

    #[test]
    fn parses_hex_with_spacing() {
        let bytes = from_hex("de ad\n 01").unwrap();
        assert_eq!(bytes, vec![0xde, 0xad, 0x01]);
        assert!(from_hex("abc").is_err());
        assert!(from_hex("zz").is_err());
    }
}
