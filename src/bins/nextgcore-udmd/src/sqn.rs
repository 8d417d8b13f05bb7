//! SQN codec and arithmetic
//!
//! SQN and AMF travel as hex strings in the subscription data. The UDM works
//! on fixed-width forms: 12 hex characters (48 bits) for SQN and 4 hex
//! characters (16 bits) for AMF.

use ogs_crypt::milenage::{OGS_AMF_LEN, OGS_SQN_LEN};
use thiserror::Error;

/// Width of the SQN in hex characters
pub const SQN_HEX_LEN: usize = OGS_SQN_LEN * 2;
/// Width of the AMF in hex characters
pub const AMF_HEX_LEN: usize = OGS_AMF_LEN * 2;

/// SQN arithmetic is modulo 2^48
pub const SQN_MODULUS: u64 = 1 << 48;
pub const OGS_MAX_SQN: u64 = SQN_MODULUS - 1;

/// Index bits of the SQN array scheme (TS 33.102 Annex C.3.2)
pub const SQN_IND: u64 = 32;
/// Advance applied to SQNms after an accepted resynchronization
pub const RESYNC_SQN_DELTA: u64 = (SQN_IND + 1) * 2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SqnError {
    #[error("Invalid hex value '{0}'")]
    InvalidHex(String),
    #[error("Hex value '{value}' does not fit in {width} characters")]
    Oversized { value: String, width: usize },
    #[error("Modulus must be non-zero")]
    ZeroModulus,
}

/// Right-justify `value` in `width` characters.
///
/// Shorter values are left-padded with `'0'`, longer values keep their
/// rightmost `width` characters.
pub fn normalize_hex(value: &str, width: usize) -> String {
    let len = value.chars().count();
    if len < width {
        format!("{:0>width$}", value, width = width)
    } else {
        value.chars().skip(len - width).collect()
    }
}

/// Like [`normalize_hex`], but only truncates leading zeros.
///
/// A value whose dropped prefix holds any non-zero digit is rejected, as
/// are non-hex characters. The result is lower case.
pub fn normalize_hex_checked(value: &str, width: usize) -> Result<String, SqnError> {
    if !value.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(SqnError::InvalidHex(value.to_string()));
    }
    if value.len() > width && value[..value.len() - width].chars().any(|c| c != '0') {
        return Err(SqnError::Oversized {
            value: value.to_string(),
            width,
        });
    }
    Ok(normalize_hex(value, width).to_ascii_lowercase())
}

/// Parse a hex SQN into its integer value.
pub fn sqn_to_u64(sqn_hex: &str) -> Result<u64, SqnError> {
    let normalized = normalize_hex_checked(sqn_hex, SQN_HEX_LEN)?;
    u64::from_str_radix(&normalized, 16).map_err(|_| SqnError::InvalidHex(sqn_hex.to_string()))
}

/// Format an SQN value as 12 lower-case hex characters.
pub fn sqn_to_hex(sqn: u64) -> String {
    format!("{:012x}", sqn & OGS_MAX_SQN)
}

/// Decode a hex SQN into its 6-byte form.
pub fn sqn_to_bytes(sqn_hex: &str) -> Result<[u8; OGS_SQN_LEN], SqnError> {
    let value = sqn_to_u64(sqn_hex)?;
    let mut out = [0u8; OGS_SQN_LEN];
    out.copy_from_slice(&value.to_be_bytes()[2..]);
    Ok(out)
}

/// Encode a 6-byte SQN as hex.
pub fn sqn_from_bytes(sqn: &[u8; OGS_SQN_LEN]) -> String {
    hex::encode(sqn)
}

/// Decode a hex AMF into its 2-byte form.
pub fn amf_to_bytes(amf_hex: &str) -> Result<[u8; OGS_AMF_LEN], SqnError> {
    let normalized = normalize_hex_checked(amf_hex, AMF_HEX_LEN)?;
    let mut out = [0u8; OGS_AMF_LEN];
    hex::decode_to_slice(&normalized, &mut out)
        .map_err(|_| SqnError::InvalidHex(amf_hex.to_string()))?;
    Ok(out)
}

/// `(sqn + delta) mod modulus`, rendered as a 12 character SQN.
pub fn increment_modulo(sqn_hex: &str, delta: u64, modulus: u64) -> Result<String, SqnError> {
    if modulus == 0 {
        return Err(SqnError::ZeroModulus);
    }
    let sqn = sqn_to_u64(sqn_hex)? as u128;
    let next = (sqn + delta as u128) % modulus as u128;
    Ok(sqn_to_hex(next as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_hex() {
        assert_eq!(normalize_hex("23", SQN_HEX_LEN), "000000000023");
        assert_eq!(normalize_hex("000000000023", SQN_HEX_LEN), "000000000023");
        assert_eq!(normalize_hex("1000000000023", SQN_HEX_LEN), "000000000023");
        assert_eq!(normalize_hex("", AMF_HEX_LEN), "0000");
        assert_eq!(normalize_hex("18000", AMF_HEX_LEN), "8000");
    }

    #[test]
    fn test_normalize_hex_checked() {
        assert_eq!(normalize_hex_checked("0000000000000023", SQN_HEX_LEN).unwrap(), "000000000023");
        assert_eq!(normalize_hex_checked("ABCD", AMF_HEX_LEN).unwrap(), "abcd");
        assert_eq!(
            normalize_hex_checked("1000000000023", SQN_HEX_LEN),
            Err(SqnError::Oversized {
                value: "1000000000023".to_string(),
                width: SQN_HEX_LEN
            })
        );
        assert!(matches!(
            normalize_hex_checked("00zz", AMF_HEX_LEN),
            Err(SqnError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_increment_modulo_boundaries() {
        assert_eq!(increment_modulo("ffffffffffff", 1, SQN_MODULUS).unwrap(), "000000000000");
        assert_eq!(increment_modulo("0", 1, SQN_MODULUS).unwrap(), "000000000001");
        assert_eq!(increment_modulo("fffffffffffe", 1, SQN_MODULUS).unwrap(), "ffffffffffff");
        assert_eq!(
            increment_modulo("ffffffffffe0", RESYNC_SQN_DELTA, SQN_MODULUS).unwrap(),
            "000000000022"
        );
        assert_eq!(increment_modulo("000000000023", SQN_MODULUS, SQN_MODULUS).unwrap(), "000000000023");
        assert_eq!(increment_modulo("1", 1, 0), Err(SqnError::ZeroModulus));
    }

    #[test]
    fn test_sqn_bytes() {
        let bytes = sqn_to_bytes("ff9bb4d0b607").unwrap();
        assert_eq!(bytes, [0xff, 0x9b, 0xb4, 0xd0, 0xb6, 0x07]);
        assert_eq!(sqn_from_bytes(&bytes), "ff9bb4d0b607");
        assert_eq!(sqn_to_bytes("21").unwrap(), [0, 0, 0, 0, 0, 0x21]);
    }

    #[test]
    fn test_amf_bytes() {
        assert_eq!(amf_to_bytes("8000").unwrap(), [0x80, 0x00]);
        assert_eq!(amf_to_bytes("1").unwrap(), [0x00, 0x01]);
        assert!(amf_to_bytes("18000").is_err());
    }

    #[test]
    fn test_resync_delta() {
        assert_eq!(RESYNC_SQN_DELTA, 66);
    }

    mod props {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            /// Incrementing by one always yields the successor modulo 2^48
            #[test]
            fn prop_increment_is_successor(sqn in 0u64..SQN_MODULUS) {
                let next = increment_modulo(&sqn_to_hex(sqn), 1, SQN_MODULUS).unwrap();
                prop_assert_eq!(next.len(), SQN_HEX_LEN);
                prop_assert_eq!(sqn_to_u64(&next).unwrap(), (sqn + 1) % SQN_MODULUS);
            }

            /// Zero-padding never changes the value
            #[test]
            fn prop_padding_preserves_value(sqn in 0u64..SQN_MODULUS, pad in 0usize..6) {
                let hex = format!("{}{:x}", "0".repeat(pad), sqn);
                prop_assert_eq!(sqn_to_u64(&hex).unwrap(), sqn);
            }
        }
    }
}
