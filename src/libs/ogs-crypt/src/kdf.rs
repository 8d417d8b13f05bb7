//! Key Derivation Functions
//!
//! Implements the key derivation functions used by the home network during
//! 5G authentication:
//! - 3GPP TS 33.220 Annex B.2 generic KDF (HMAC-SHA-256 over FC || P0 || L0 ...)
//! - 3GPP TS 33.501 Annex A.2 / A.4 (Kausf, XRES*)
//! - 3GPP TS 33.402 Annex A.2 (CK', IK' for EAP-AKA')
//! - SECG SEC 1 / ANSI X9.63 KDF used by the SUCI ECIES profiles (TS 33.501 C.3.4)

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::milenage::{OGS_KEY_LEN, OGS_RAND_LEN};

pub const SHA256_DIGEST_SIZE: usize = 32;
pub const OGS_SQN_XOR_AK_LEN: usize = 6;

// FC (Function Code) values for KDF
pub const FC_FOR_CK_PRIME_IK_PRIME_DERIVATION: u8 = 0x20;
pub const FC_FOR_KAUSF_DERIVATION: u8 = 0x6A;
pub const FC_FOR_RES_STAR_XRES_STAR_DERIVATION: u8 = 0x6B;

type HmacSha256 = Hmac<Sha256>;

/// Common KDF function as defined in TS 33.220 clause B.2.0
///
/// S = FC || P0 || L0 || P1 || L1 ..., where Ln is the two byte big endian
/// length of Pn, and the output is HMAC-SHA-256(key, S).
pub fn ogs_kdf_common(key: &[u8], fc: u8, params: &[&[u8]]) -> [u8; SHA256_DIGEST_SIZE] {
    let mut s = Vec::with_capacity(1 + params.iter().map(|p| p.len() + 2).sum::<usize>());
    s.push(fc);
    for param in params {
        s.extend_from_slice(param);
        s.extend_from_slice(&(param.len() as u16).to_be_bytes());
    }

    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(&s);

    let mut output = [0u8; SHA256_DIGEST_SIZE];
    output.copy_from_slice(&mac.finalize().into_bytes());
    output
}

fn ck_ik_key(ck: &[u8; OGS_KEY_LEN], ik: &[u8; OGS_KEY_LEN]) -> [u8; OGS_KEY_LEN * 2] {
    let mut key = [0u8; OGS_KEY_LEN * 2];
    key[..OGS_KEY_LEN].copy_from_slice(ck);
    key[OGS_KEY_LEN..].copy_from_slice(ik);
    key
}

/// TS33.501 Annex A.2: Kausf derivation function
///
/// Kausf = KDF(CK || IK, 0x6A, serving network name, SQN XOR AK)
pub fn ogs_kdf_kausf(
    ck: &[u8; OGS_KEY_LEN],
    ik: &[u8; OGS_KEY_LEN],
    serving_network_name: &str,
    sqn_xor_ak: &[u8; OGS_SQN_XOR_AK_LEN],
) -> [u8; SHA256_DIGEST_SIZE] {
    ogs_kdf_common(
        &ck_ik_key(ck, ik),
        FC_FOR_KAUSF_DERIVATION,
        &[serving_network_name.as_bytes(), sqn_xor_ak],
    )
}

/// TS33.501 Annex A.4: RES* and XRES* derivation function
///
/// Returns the 16-byte XRES*, the lower half of the 32-byte KDF output.
pub fn ogs_kdf_xres_star(
    ck: &[u8; OGS_KEY_LEN],
    ik: &[u8; OGS_KEY_LEN],
    serving_network_name: &str,
    rand: &[u8; OGS_RAND_LEN],
    xres: &[u8],
) -> [u8; OGS_KEY_LEN] {
    let output = ogs_kdf_common(
        &ck_ik_key(ck, ik),
        FC_FOR_RES_STAR_XRES_STAR_DERIVATION,
        &[serving_network_name.as_bytes(), rand, xres],
    );

    let mut xres_star = [0u8; OGS_KEY_LEN];
    xres_star.copy_from_slice(&output[OGS_KEY_LEN..]);
    xres_star
}

/// TS33.402 Annex A.2: CK' and IK' derivation for EAP-AKA'
///
/// CK' || IK' = KDF(CK || IK, 0x20, serving network name, SQN XOR AK)
pub fn ogs_kdf_ck_ik_prime(
    ck: &[u8; OGS_KEY_LEN],
    ik: &[u8; OGS_KEY_LEN],
    serving_network_name: &str,
    sqn_xor_ak: &[u8; OGS_SQN_XOR_AK_LEN],
) -> ([u8; OGS_KEY_LEN], [u8; OGS_KEY_LEN]) {
    let output = ogs_kdf_common(
        &ck_ik_key(ck, ik),
        FC_FOR_CK_PRIME_IK_PRIME_DERIVATION,
        &[serving_network_name.as_bytes(), sqn_xor_ak],
    );

    let mut ck_prime = [0u8; OGS_KEY_LEN];
    let mut ik_prime = [0u8; OGS_KEY_LEN];
    ck_prime.copy_from_slice(&output[..OGS_KEY_LEN]);
    ik_prime.copy_from_slice(&output[OGS_KEY_LEN..]);
    (ck_prime, ik_prime)
}

/// ANSI-X9.63-KDF with SHA-256 (SEC 1 clause 3.6.1)
///
/// Concatenates SHA-256(Z || counter || SharedInfo) for counter = 1, 2, ...
/// until at least `enc_key_len + mac_key_len` bytes are available. The whole
/// concatenation is returned; callers take the encryption key and ICB from
/// the front and the MAC key from the back.
pub fn ogs_kdf_ansi_x963(
    z: &[u8],
    shared_info: &[u8],
    enc_key_len: usize,
    mac_key_len: usize,
) -> Vec<u8> {
    let key_data_len = enc_key_len + mac_key_len;
    let rounds = key_data_len.div_ceil(SHA256_DIGEST_SIZE);

    let mut output = Vec::with_capacity(rounds * SHA256_DIGEST_SIZE);
    for counter in 1..=rounds as u32 {
        let mut hasher = Sha256::new();
        hasher.update(z);
        hasher.update(counter.to_be_bytes());
        hasher.update(shared_info);
        output.extend_from_slice(&hasher.finalize());
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    const CK: [u8; 16] = [
        0xb4, 0x0b, 0xa9, 0xa3, 0xc5, 0x8b, 0x2a, 0x05,
        0xbb, 0xf0, 0xd9, 0x87, 0xb2, 0x1b, 0xf8, 0xcb,
    ];
    const IK: [u8; 16] = [
        0xf7, 0x69, 0xbc, 0xd7, 0x51, 0x04, 0x46, 0x04,
        0x12, 0x76, 0x72, 0x71, 0x1c, 0x6d, 0x34, 0x41,
    ];
    const SNN: &str = "5G:mnc093.mcc208.3gppnetwork.org";

    fn manual_hmac(key: &[u8], s: &[u8]) -> [u8; 32] {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(key).unwrap();
        mac.update(s);
        let mut out = [0u8; 32];
        out.copy_from_slice(&mac.finalize().into_bytes());
        out
    }

    #[test]
    fn test_kdf_common_s_encoding() {
        let key = [0x11u8; 32];
        let p0 = b"abc";
        let p1 = [0xde, 0xad];
        let s = [0x6a, b'a', b'b', b'c', 0x00, 0x03, 0xde, 0xad, 0x00, 0x02];
        assert_eq!(ogs_kdf_common(&key, 0x6a, &[&p0[..], &p1[..]]), manual_hmac(&key, &s));
    }

    #[test]
    fn test_kdf_kausf() {
        let sqn_xor_ak = [0x55, 0xf3, 0x28, 0xb4, 0x35, 0x77];
        let kausf = ogs_kdf_kausf(&CK, &IK, SNN, &sqn_xor_ak);

        let mut s = vec![FC_FOR_KAUSF_DERIVATION];
        s.extend_from_slice(SNN.as_bytes());
        s.extend_from_slice(&(SNN.len() as u16).to_be_bytes());
        s.extend_from_slice(&sqn_xor_ak);
        s.extend_from_slice(&[0x00, 0x06]);
        assert_eq!(kausf, manual_hmac(&ck_ik_key(&CK, &IK), &s));
    }

    #[test]
    fn test_kdf_xres_star_is_lower_half() {
        let rand = [0x23u8; 16];
        let res = [0xa5, 0x42, 0x11, 0xd5, 0xe3, 0xba, 0x50, 0xbf];
        let full = ogs_kdf_common(
            &ck_ik_key(&CK, &IK),
            FC_FOR_RES_STAR_XRES_STAR_DERIVATION,
            &[SNN.as_bytes(), &rand, &res],
        );
        let xres_star = ogs_kdf_xres_star(&CK, &IK, SNN, &rand, &res);
        assert_eq!(&xres_star[..], &full[16..]);
    }

    #[test]
    fn test_kdf_ck_ik_prime_split() {
        let sqn_xor_ak = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
        let full = ogs_kdf_common(
            &ck_ik_key(&CK, &IK),
            FC_FOR_CK_PRIME_IK_PRIME_DERIVATION,
            &[SNN.as_bytes(), &sqn_xor_ak],
        );
        let (ck_prime, ik_prime) = ogs_kdf_ck_ik_prime(&CK, &IK, SNN, &sqn_xor_ak);
        assert_eq!(&ck_prime[..], &full[..16]);
        assert_eq!(&ik_prime[..], &full[16..]);
        assert_ne!(ck_prime, CK);
    }

    #[test]
    fn test_kdf_ansi_x963_rounds() {
        let z = [0x42u8; 32];
        let info = [0x02u8; 33];

        let out = ogs_kdf_ansi_x963(&z, &info, 16, 32);
        assert_eq!(out.len(), 64);

        let mut first = Sha256::new();
        first.update(z);
        first.update(1u32.to_be_bytes());
        first.update(info);
        assert_eq!(&out[..32], &first.finalize()[..]);

        let mut second = Sha256::new();
        second.update(z);
        second.update(2u32.to_be_bytes());
        second.update(info);
        assert_eq!(&out[32..], &second.finalize()[..]);

        assert_eq!(ogs_kdf_ansi_x963(&z, &info, 16, 16).len(), 32);
    }
}
