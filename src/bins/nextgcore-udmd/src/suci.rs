//! SUCI parsing and de-concealment (TS 23.003 clause 2.2B, TS 33.501 Annex C)
//!
//! A SUCI is `suci-<supiType>-<routingIndicator>-<protectionScheme>-<keyId>-<schemeOutput>`
//! where `<supiType>` is `0-<mcc>-<mnc>` for IMSI and `1-<homeNetworkId>` for
//! NAI. Null scheme outputs are the plaintext MSIN; Profile A and B outputs
//! are ECIES ciphertexts opened with the home network private key selected
//! by the 1-based key id.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use ogs_crypt::ecies::{self, EciesError, PROFILE_A_KEY_LEN, PROFILE_B_PRIVATE_KEY_LEN};
use regex::Regex;
use thiserror::Error;

use crate::error::{ErrorKind, Rejected};

const SUCI_PREFIX: &str = "suci-";

/// SUCI parse and de-concealment errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SuciError {
    #[error("unknown suciPrefix")]
    Malformed,
    #[error("unsupported suciType NAI")]
    UnsupportedSuciType,
    #[error("keyIndex out of range: key id {key_id}, {profiles} profiles")]
    KeyIndexOutOfRange { key_id: u8, profiles: usize },
    #[error("scheme mismatch: SUCI scheme {suci}, profile scheme {profile}")]
    SchemeMismatch { suci: u8, profile: u8 },
    #[error("scheme output is not hex")]
    InvalidSchemeOutput,
    #[error("{0}")]
    Ecies(#[from] EciesError),
    #[error("invalid home network key: {0}")]
    InvalidProfile(String),
}

impl SuciError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SuciError::Malformed => ErrorKind::MalformedSuci,
            SuciError::UnsupportedSuciType => ErrorKind::UnsupportedSuciType,
            SuciError::KeyIndexOutOfRange { .. } => ErrorKind::KeyIndexOutOfRange,
            SuciError::SchemeMismatch { .. } => ErrorKind::SchemeMismatch,
            SuciError::Ecies(EciesError::MacVerificationFailed) => ErrorKind::MacVerificationFailed,
            SuciError::Ecies(EciesError::InvalidPoint)
            | SuciError::Ecies(EciesError::InvalidPointEncoding(_)) => ErrorKind::InvalidPoint,
            SuciError::InvalidSchemeOutput
            | SuciError::Ecies(_)
            | SuciError::InvalidProfile(_) => ErrorKind::DecodeError,
        }
    }
}

impl From<SuciError> for Rejected {
    fn from(e: SuciError) -> Self {
        Rejected::authentication(e.kind(), e.to_string())
    }
}

/// SUCI protection scheme identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionScheme {
    Null,
    ProfileA,
    ProfileB,
}

impl ProtectionScheme {
    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            0 => Some(ProtectionScheme::Null),
            1 => Some(ProtectionScheme::ProfileA),
            2 => Some(ProtectionScheme::ProfileB),
            _ => None,
        }
    }

    pub fn digit(&self) -> u8 {
        match self {
            ProtectionScheme::Null => 0,
            ProtectionScheme::ProfileA => 1,
            ProtectionScheme::ProfileB => 2,
        }
    }
}

/// Home network part of a SUCI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuciHomeNetwork {
    Imsi { mcc: String, mnc: String },
    Nai { home_network_id: String },
}

/// Parsed SUCI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suci {
    pub home_network: SuciHomeNetwork,
    pub routing_indicator: String,
    pub protection_scheme: ProtectionScheme,
    pub public_key_id: u8,
    pub scheme_output: String,
}

fn imsi_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^suci-0-([0-9]{3})-([0-9]{2,3})-([0-9]{1,4})-([0-2])-([0-9]{1,3})-([0-9a-fA-F]+)$")
            .expect("static SUCI regex")
    })
}

fn nai_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^suci-1-(.+)-([0-9]{1,4})-([0-2])-([0-9]{1,3})-(.+)$")
            .expect("static SUCI regex")
    })
}

fn parse_scheme(digit: &str) -> Result<ProtectionScheme, SuciError> {
    digit
        .parse::<u8>()
        .ok()
        .and_then(ProtectionScheme::from_digit)
        .ok_or(SuciError::Malformed)
}

fn parse_key_id(id: &str) -> Result<u8, SuciError> {
    id.parse::<u8>().map_err(|_| SuciError::Malformed)
}

impl Suci {
    /// Parse a SUCI string. Fails without partial result on any field violation.
    pub fn parse(s: &str) -> Result<Self, SuciError> {
        if let Some(caps) = imsi_regex().captures(s) {
            return Ok(Suci {
                home_network: SuciHomeNetwork::Imsi {
                    mcc: caps[1].to_string(),
                    mnc: caps[2].to_string(),
                },
                routing_indicator: caps[3].to_string(),
                protection_scheme: parse_scheme(&caps[4])?,
                public_key_id: parse_key_id(&caps[5])?,
                scheme_output: caps[6].to_string(),
            });
        }
        if let Some(caps) = nai_regex().captures(s) {
            return Ok(Suci {
                home_network: SuciHomeNetwork::Nai {
                    home_network_id: caps[1].to_string(),
                },
                routing_indicator: caps[2].to_string(),
                protection_scheme: parse_scheme(&caps[3])?,
                public_key_id: parse_key_id(&caps[4])?,
                scheme_output: caps[5].to_string(),
            });
        }
        Err(SuciError::Malformed)
    }

    /// SUPI type digit: 0 for IMSI, 1 for NAI
    pub fn supi_type(&self) -> u8 {
        match self.home_network {
            SuciHomeNetwork::Imsi { .. } => 0,
            SuciHomeNetwork::Nai { .. } => 1,
        }
    }
}

impl FromStr for Suci {
    type Err = SuciError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Suci::parse(s)
    }
}

impl fmt::Display for Suci {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.home_network {
            SuciHomeNetwork::Imsi { mcc, mnc } => write!(f, "{}0-{}-{}", SUCI_PREFIX, mcc, mnc)?,
            SuciHomeNetwork::Nai { home_network_id } => {
                write!(f, "{}1-{}", SUCI_PREFIX, home_network_id)?
            }
        }
        write!(
            f,
            "-{}-{}-{}-{}",
            self.routing_indicator,
            self.protection_scheme.digit(),
            self.public_key_id,
            self.scheme_output
        )
    }
}

/// Home network key pair used to open SUCIs of one protection scheme
#[derive(Clone)]
pub struct SuciProfile {
    scheme: ProtectionScheme,
    private_key: [u8; 32],
    public_key: Vec<u8>,
}

impl SuciProfile {
    /// Build a profile from configured hex key material.
    ///
    /// The scheme must be 1 (Profile A) or 2 (Profile B) and the private
    /// key 32 bytes. When a public key is given it must match the private
    /// key: 32 bytes for Profile A, 33 or 65 bytes for Profile B.
    pub fn from_hex(
        scheme: u8,
        private_key: &str,
        public_key: Option<&str>,
    ) -> Result<Self, SuciError> {
        let scheme = match ProtectionScheme::from_digit(scheme) {
            Some(s @ (ProtectionScheme::ProfileA | ProtectionScheme::ProfileB)) => s,
            _ => {
                return Err(SuciError::InvalidProfile(format!(
                    "protection scheme {} has no key",
                    scheme
                )))
            }
        };

        let mut key = [0u8; 32];
        hex::decode_to_slice(private_key, &mut key).map_err(|_| {
            SuciError::InvalidProfile("private key must be 32 bytes of hex".to_string())
        })?;

        let derived = match scheme {
            ProtectionScheme::ProfileA => ecies::profile_a_public_key(&key).to_vec(),
            _ => ecies::profile_b_public_key(&key)?.to_vec(),
        };

        if let Some(public_key) = public_key {
            let configured = hex::decode(public_key).map_err(|_| {
                SuciError::InvalidProfile("public key is not hex".to_string())
            })?;
            if !public_key_matches(scheme, &configured, &derived) {
                return Err(SuciError::InvalidProfile(
                    "public key does not match private key".to_string(),
                ));
            }
        }

        Ok(Self {
            scheme,
            private_key: key,
            public_key: derived,
        })
    }

    pub fn scheme(&self) -> ProtectionScheme {
        self.scheme
    }

    /// Public key derived from the private key (compressed for Profile B)
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    fn deconceal(&self, scheme_output: &[u8]) -> Result<Vec<u8>, EciesError> {
        match self.scheme {
            ProtectionScheme::ProfileA => {
                let mut key = [0u8; PROFILE_A_KEY_LEN];
                key.copy_from_slice(&self.private_key);
                ecies::profile_a_deconceal(&key, scheme_output)
            }
            _ => {
                let mut key = [0u8; PROFILE_B_PRIVATE_KEY_LEN];
                key.copy_from_slice(&self.private_key);
                ecies::profile_b_deconceal(&key, scheme_output)
            }
        }
    }
}

fn public_key_matches(scheme: ProtectionScheme, configured: &[u8], derived: &[u8]) -> bool {
    match (scheme, configured.len()) {
        (ProtectionScheme::ProfileA, 32) | (ProtectionScheme::ProfileB, 33) => configured == derived,
        (ProtectionScheme::ProfileB, 65) if configured[0] == 0x04 => {
            // 04 || X || Y against 02/03 || X, the prefix carries the parity of Y
            let prefix = 0x02 | (configured[64] & 0x01);
            derived[0] == prefix && configured[1..33] == derived[1..]
        }
        _ => false,
    }
}

impl fmt::Debug for SuciProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuciProfile")
            .field("scheme", &self.scheme)
            .field("public_key", &hex::encode(&self.public_key))
            .finish_non_exhaustive()
    }
}

/// Render a de-concealed IMSI MSIN.
///
/// The plaintext is BCD with swapped nibbles; a trailing `f` filler is dropped.
pub fn scheme_result(plaintext: &[u8]) -> String {
    let swapped: Vec<u8> = plaintext.iter().map(|b| b.rotate_left(4)).collect();
    let mut result = hex::encode(swapped);
    if result.ends_with('f') {
        result.pop();
    }
    result
}

/// De-conceal a SUCI into its SUPI (`imsi-<mcc><mnc><msin>`).
pub fn to_supi(suci: &str, profiles: &[SuciProfile]) -> Result<String, SuciError> {
    let parsed = Suci::parse(suci)?;

    let (mcc, mnc) = match &parsed.home_network {
        SuciHomeNetwork::Imsi { mcc, mnc } => (mcc, mnc),
        SuciHomeNetwork::Nai { .. } => return Err(SuciError::UnsupportedSuciType),
    };

    if parsed.protection_scheme == ProtectionScheme::Null {
        log::debug!("[{}] Null protection scheme", suci);
        return Ok(format!("imsi-{}{}{}", mcc, mnc, parsed.scheme_output));
    }

    let key_index = (parsed.public_key_id as usize).checked_sub(1);
    let profile = match key_index.and_then(|i| profiles.get(i)) {
        Some(profile) => profile,
        None => {
            return Err(SuciError::KeyIndexOutOfRange {
                key_id: parsed.public_key_id,
                profiles: profiles.len(),
            })
        }
    };
    if profile.scheme != parsed.protection_scheme {
        return Err(SuciError::SchemeMismatch {
            suci: parsed.protection_scheme.digit(),
            profile: profile.scheme.digit(),
        });
    }

    let scheme_output =
        hex::decode(&parsed.scheme_output).map_err(|_| SuciError::InvalidSchemeOutput)?;
    let plaintext = profile.deconceal(&scheme_output).map_err(|e| {
        log::warn!(
            "[{}] De-concealment failed with key id {} ({})",
            suci,
            parsed.public_key_id,
            e
        );
        e
    })?;

    Ok(format!("imsi-{}{}{}", mcc, mnc, scheme_result(&plaintext)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE_A_PRIV: &str = "c53c22208b61860b06c62e5406a7b330c2b577aa5558981510d128247d38bd1d";
    const PROFILE_A_PUB: &str = "5a8d38864820197c3394b92613b20b91633cbd897119273bf8e4a6f4eec0a650";
    const PROFILE_B_PRIV: &str = "f1ab1074477ebcc7f554ea1c5fc368b1616730155e0041ac447d6301975fecda";
    const PROFILE_B_PUB: &str = "0272da71976234ce833a6907425867b82e074d44ef907dfb4b3e21c1c2256ebcd1";
    const PROFILE_B_PUB_UNCOMPRESSED: &str = "0472da71976234ce833a6907425867b82e074d44ef907dfb4b3e21c1c2256ebcd15a7ded52fcbb097a4ed250e036c7b9c8c7004c4eedc4f068cd7bf8d3f900e3b4";

    const SUCI_NULL: &str = "suci-0-208-93-0-0-0-00007487";
    const SUCI_PROFILE_A: &str = "suci-0-208-93-0-1-1-b2e92f836055a255837debf850b528997ce0201cb82adfe4be1f587d07d8457dcb02352410cddd9e730ef3fa87";
    const SUCI_PROFILE_B: &str = "suci-0-208-93-0-2-2-039aab8376597021e855679a9778ea0b67396e68c66df32c0f41e9acca2da9b9d146a33fc2716ac7dae96aa30a4d";

    fn profiles() -> Vec<SuciProfile> {
        vec![
            SuciProfile::from_hex(1, PROFILE_A_PRIV, Some(PROFILE_A_PUB)).unwrap(),
            SuciProfile::from_hex(2, PROFILE_B_PRIV, Some(PROFILE_B_PUB)).unwrap(),
        ]
    }

    #[test]
    fn test_parse_imsi_suci() {
        let suci = Suci::parse(SUCI_NULL).unwrap();
        assert_eq!(
            suci.home_network,
            SuciHomeNetwork::Imsi {
                mcc: "208".to_string(),
                mnc: "93".to_string()
            }
        );
        assert_eq!(suci.routing_indicator, "0");
        assert_eq!(suci.protection_scheme, ProtectionScheme::Null);
        assert_eq!(suci.public_key_id, 0);
        assert_eq!(suci.scheme_output, "00007487");
        assert_eq!(suci.supi_type(), 0);
        assert_eq!(suci.to_string(), SUCI_NULL);
    }

    #[test]
    fn test_parse_nai_suci() {
        let suci: Suci = "suci-1-example.com-0123-1-3-abcdef".parse().unwrap();
        assert_eq!(
            suci.home_network,
            SuciHomeNetwork::Nai {
                home_network_id: "example.com".to_string()
            }
        );
        assert_eq!(suci.routing_indicator, "0123");
        assert_eq!(suci.public_key_id, 3);
        assert_eq!(suci.supi_type(), 1);
    }

    #[test]
    fn test_parse_rejects_invalid_fields() {
        let invalid = [
            "",
            "imsi-208930000000001",
            "suci-0-20-93-0-0-0-00007487",      // mcc too short
            "suci-0-2081-93-0-0-0-00007487",    // mcc too long
            "suci-0-208-9-0-0-0-00007487",      // mnc too short
            "suci-0-208-9312-0-0-0-00007487",   // mnc too long
            "suci-0-208-93-01234-0-0-00007487", // routing indicator too long
            "suci-0-208-93-0-3-1-00007487",     // scheme out of range
            "suci-0-208-93-0-1-256-00007487",   // key id out of range
            "suci-0-208-93-0-1-1-",             // empty output
            "suci-0-208-93-0-1-1-xyz",          // output not hex
            "suci-2-208-93-0-1-1-0000",         // unknown supi type
            "SUCI-0-208-93-0-0-0-00007487",
        ];
        for s in invalid {
            assert_eq!(Suci::parse(s), Err(SuciError::Malformed), "{}", s);
        }
    }

    #[test]
    fn test_parse_is_deterministic() {
        assert_eq!(Suci::parse(SUCI_PROFILE_A), Suci::parse(SUCI_PROFILE_A));
        assert_eq!(Suci::parse(SUCI_PROFILE_B).unwrap().to_string(), SUCI_PROFILE_B);
    }

    #[test]
    fn test_scheme_result() {
        assert_eq!(scheme_result(&[0x00, 0x01, 0x20, 0x80, 0xf6]), "001002086");
        assert_eq!(scheme_result(&[0x21, 0x43]), "1234");
    }

    #[test]
    fn test_to_supi_null_scheme() {
        assert_eq!(to_supi(SUCI_NULL, &[]).unwrap(), "imsi-2089300007487");
    }

    #[test]
    fn test_to_supi_profile_a() {
        assert_eq!(to_supi(SUCI_PROFILE_A, &profiles()).unwrap(), "imsi-20893001002086");
    }

    #[test]
    fn test_to_supi_profile_b() {
        assert_eq!(to_supi(SUCI_PROFILE_B, &profiles()).unwrap(), "imsi-20893001002086");
    }

    #[test]
    fn test_to_supi_nai_unsupported() {
        let err = to_supi("suci-1-example.com-0-1-1-abcdef", &profiles()).unwrap_err();
        assert_eq!(err, SuciError::UnsupportedSuciType);
        assert_eq!(err.kind(), ErrorKind::UnsupportedSuciType);
    }

    #[test]
    fn test_to_supi_key_index_boundaries() {
        let profiles = profiles();
        let key_id_0 = SUCI_PROFILE_A.replace("-1-1-", "-1-0-");
        let key_id_3 = SUCI_PROFILE_A.replace("-1-1-", "-1-3-");
        assert_eq!(to_supi(&key_id_0, &profiles).unwrap_err().kind(), ErrorKind::KeyIndexOutOfRange);
        assert_eq!(to_supi(&key_id_3, &profiles).unwrap_err().kind(), ErrorKind::KeyIndexOutOfRange);
        // key id 1 and key id len(profiles) both resolve
        assert!(to_supi(SUCI_PROFILE_A, &profiles).is_ok());
        assert!(to_supi(SUCI_PROFILE_B, &profiles).is_ok());
    }

    #[test]
    fn test_to_supi_scheme_mismatch() {
        let wrong_key = SUCI_PROFILE_A.replace("-1-1-", "-1-2-");
        assert_eq!(
            to_supi(&wrong_key, &profiles()),
            Err(SuciError::SchemeMismatch { suci: 1, profile: 2 })
        );
    }

    #[test]
    fn test_to_supi_mac_failure() {
        let mut tampered = SUCI_PROFILE_A.to_string();
        let last = tampered.pop().unwrap();
        tampered.push(if last == '0' { '1' } else { '0' });
        let err = to_supi(&tampered, &profiles()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MacVerificationFailed);
        assert_eq!(Rejected::from(err).cause, crate::error::CAUSE_AUTHENTICATION_REJECTED);
    }

    #[test]
    fn test_to_supi_invalid_point_encoding() {
        let bad_prefix = SUCI_PROFILE_B.replace("-2-2-039a", "-2-2-059a");
        assert_eq!(to_supi(&bad_prefix, &profiles()).unwrap_err().kind(), ErrorKind::InvalidPoint);
    }

    #[test]
    fn test_to_supi_low_order_profile_a_key() {
        // all-zero X25519 ephemeral key, then 5 bytes of ciphertext and the tag
        let suci = format!("suci-0-208-93-0-1-1-{}{}", "00".repeat(32), "5a".repeat(13));
        assert_eq!(to_supi(&suci, &profiles()).unwrap_err().kind(), ErrorKind::InvalidPoint);
    }

    #[test]
    fn test_to_supi_odd_length_output() {
        let odd = format!("{}0", SUCI_PROFILE_A);
        assert_eq!(to_supi(&odd, &profiles()).unwrap_err().kind(), ErrorKind::DecodeError);
    }

    #[test]
    fn test_profile_validation() {
        assert!(SuciProfile::from_hex(2, PROFILE_B_PRIV, Some(PROFILE_B_PUB_UNCOMPRESSED)).is_ok());
        assert!(SuciProfile::from_hex(2, PROFILE_B_PRIV, None).is_ok());
        assert!(SuciProfile::from_hex(0, PROFILE_A_PRIV, None).is_err());
        assert!(SuciProfile::from_hex(3, PROFILE_A_PRIV, None).is_err());
        assert!(SuciProfile::from_hex(1, "c53c22", None).is_err());
        assert!(SuciProfile::from_hex(1, PROFILE_A_PRIV, Some(PROFILE_B_PUB)).is_err());
        assert!(SuciProfile::from_hex(2, PROFILE_B_PRIV, Some(PROFILE_A_PUB)).is_err());

        let profile = SuciProfile::from_hex(2, PROFILE_B_PRIV, None).unwrap();
        assert_eq!(hex::encode(profile.public_key()), PROFILE_B_PUB);
        assert!(!format!("{:?}", profile).contains(PROFILE_B_PRIV));
    }
}
