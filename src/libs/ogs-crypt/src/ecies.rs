//! ECIES for SUCI de-concealment
//!
//! Implements the home network side of the ECIES protection schemes of
//! 3GPP TS 33.501 Annex C.3:
//! - Profile A: X25519 key agreement
//! - Profile B: NIST P-256 key agreement (compressed or uncompressed
//!   ephemeral key)
//!
//! Both profiles derive keys with the ANSI-X9.63-KDF over SHA-256, encrypt
//! with AES-128-CTR and authenticate the ciphertext with HMAC-SHA-256
//! truncated to 8 bytes. The scheme output is laid out as
//! `ephemeral public key || ciphertext || MAC tag`.
//!
//! The `*_conceal` functions implement the UE side with a caller supplied
//! ephemeral key and are used to build test SUCIs.

use aes::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use p256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use sha2::Sha256;
use thiserror::Error;

use crate::kdf::ogs_kdf_ansi_x963;

/// AES-128 key size in bytes
pub const ECIES_ENC_KEY_LEN: usize = 16;
/// Initial counter block size in bytes
pub const ECIES_ICB_LEN: usize = 16;
/// HMAC-SHA-256 key size in bytes
pub const ECIES_MAC_KEY_LEN: usize = 32;
/// Truncated MAC tag size in bytes
pub const ECIES_MAC_LEN: usize = 8;

/// Profile A (X25519) key size in bytes
pub const PROFILE_A_KEY_LEN: usize = 32;
/// Profile B private key size in bytes
pub const PROFILE_B_PRIVATE_KEY_LEN: usize = 32;
/// Profile B compressed public key size in bytes
pub const PROFILE_B_COMPRESSED_KEY_LEN: usize = 33;
/// Profile B uncompressed public key size in bytes
pub const PROFILE_B_UNCOMPRESSED_KEY_LEN: usize = 65;

type HmacSha256 = Hmac<Sha256>;
type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;

/// ECIES error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EciesError {
    #[error("Scheme output too short: {len} bytes, need at least {min}")]
    SchemeOutputTooShort { len: usize, min: usize },
    #[error("Invalid point encoding prefix 0x{0:02x}")]
    InvalidPointEncoding(u8),
    #[error("Invalid point")]
    InvalidPoint,
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("MAC verification failed")]
    MacVerificationFailed,
    #[error("Key derivation failed")]
    KeyDerivation,
}

/// Result type for ECIES operations
pub type EciesResult<T> = Result<T, EciesError>;

/// Split the X9.63 output into (encryption key, ICB, MAC key).
///
/// The MAC key is taken from the end of the key data.
fn split_key_data(key_data: &[u8]) -> (&[u8], &[u8], &[u8]) {
    let enc_key = &key_data[..ECIES_ENC_KEY_LEN];
    let icb = &key_data[ECIES_ENC_KEY_LEN..ECIES_ENC_KEY_LEN + ECIES_ICB_LEN];
    let mac_key = &key_data[key_data.len() - ECIES_MAC_KEY_LEN..];
    (enc_key, icb, mac_key)
}

fn derive_key_data(shared_key: &[u8], ephemeral_public_key: &[u8]) -> Vec<u8> {
    ogs_kdf_ansi_x963(
        shared_key,
        ephemeral_public_key,
        ECIES_ENC_KEY_LEN,
        ECIES_MAC_KEY_LEN,
    )
}

fn apply_keystream(enc_key: &[u8], icb: &[u8], data: &mut [u8]) -> EciesResult<()> {
    let mut cipher =
        Aes128Ctr::new_from_slices(enc_key, icb).map_err(|_| EciesError::KeyDerivation)?;
    cipher.apply_keystream(data);
    Ok(())
}

fn mac_for(mac_key: &[u8], ciphertext: &[u8]) -> EciesResult<HmacSha256> {
    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(mac_key).map_err(|_| EciesError::KeyDerivation)?;
    mac.update(ciphertext);
    Ok(mac)
}

/// Verify the truncated MAC over the ciphertext, then decrypt it.
fn open(key_data: &[u8], ciphertext: &[u8], tag: &[u8]) -> EciesResult<Vec<u8>> {
    let (enc_key, icb, mac_key) = split_key_data(key_data);

    // Constant time comparison of the leftmost 8 bytes
    mac_for(mac_key, ciphertext)?
        .verify_truncated_left(tag)
        .map_err(|_| EciesError::MacVerificationFailed)?;

    let mut plaintext = ciphertext.to_vec();
    apply_keystream(enc_key, icb, &mut plaintext)?;
    Ok(plaintext)
}

/// Encrypt the plaintext and append the truncated MAC.
fn seal(key_data: &[u8], plaintext: &[u8]) -> EciesResult<Vec<u8>> {
    let (enc_key, icb, mac_key) = split_key_data(key_data);

    let mut ciphertext = plaintext.to_vec();
    apply_keystream(enc_key, icb, &mut ciphertext)?;

    let tag = mac_for(mac_key, &ciphertext)?.finalize().into_bytes();
    ciphertext.extend_from_slice(&tag[..ECIES_MAC_LEN]);
    Ok(ciphertext)
}

fn check_len(scheme_output: &[u8], key_len: usize) -> EciesResult<()> {
    let min = key_len + ECIES_MAC_LEN;
    if scheme_output.len() < min {
        return Err(EciesError::SchemeOutputTooShort {
            len: scheme_output.len(),
            min,
        });
    }
    Ok(())
}

/// Profile A de-concealment (X25519).
///
/// `scheme_output` is `ephemeral public key (32) || ciphertext || MAC (8)`.
/// A low-order ephemeral key yields an all-zero shared secret and is
/// rejected as [`EciesError::InvalidPoint`].
pub fn profile_a_deconceal(
    private_key: &[u8; PROFILE_A_KEY_LEN],
    scheme_output: &[u8],
) -> EciesResult<Vec<u8>> {
    check_len(scheme_output, PROFILE_A_KEY_LEN)?;
    let (ephemeral, rest) = scheme_output.split_at(PROFILE_A_KEY_LEN);
    let (ciphertext, tag) = rest.split_at(rest.len() - ECIES_MAC_LEN);

    let mut ephemeral_bytes = [0u8; PROFILE_A_KEY_LEN];
    ephemeral_bytes.copy_from_slice(ephemeral);

    let secret = x25519_dalek::StaticSecret::from(*private_key);
    let shared = secret.diffie_hellman(&x25519_dalek::PublicKey::from(ephemeral_bytes));
    if !shared.was_contributory() {
        return Err(EciesError::InvalidPoint);
    }

    open(&derive_key_data(shared.as_bytes(), ephemeral), ciphertext, tag)
}

/// Profile A concealment (UE side) with a given ephemeral private key.
pub fn profile_a_conceal(
    home_network_public_key: &[u8; PROFILE_A_KEY_LEN],
    ephemeral_private_key: &[u8; PROFILE_A_KEY_LEN],
    plaintext: &[u8],
) -> EciesResult<Vec<u8>> {
    let ephemeral = x25519_dalek::StaticSecret::from(*ephemeral_private_key);
    let ephemeral_public = x25519_dalek::PublicKey::from(&ephemeral);
    let shared =
        ephemeral.diffie_hellman(&x25519_dalek::PublicKey::from(*home_network_public_key));

    let sealed = seal(
        &derive_key_data(shared.as_bytes(), ephemeral_public.as_bytes()),
        plaintext,
    )?;

    let mut output = ephemeral_public.as_bytes().to_vec();
    output.extend_from_slice(&sealed);
    Ok(output)
}

/// Derive the X25519 public key for a Profile A private key.
pub fn profile_a_public_key(private_key: &[u8; PROFILE_A_KEY_LEN]) -> [u8; PROFILE_A_KEY_LEN] {
    let secret = x25519_dalek::StaticSecret::from(*private_key);
    x25519_dalek::PublicKey::from(&secret).to_bytes()
}

/// Length of the Profile B ephemeral key, selected by its SEC1 prefix.
pub fn profile_b_key_len(prefix: u8) -> EciesResult<usize> {
    match prefix {
        0x02 | 0x03 => Ok(PROFILE_B_COMPRESSED_KEY_LEN),
        0x04 => Ok(PROFILE_B_UNCOMPRESSED_KEY_LEN),
        other => Err(EciesError::InvalidPointEncoding(other)),
    }
}

/// Parse a SEC1 encoded P-256 point.
///
/// The identity and encodings that are not on the curve (including the
/// all-zero coordinates) are rejected as [`EciesError::InvalidPoint`].
pub fn profile_b_parse_public_key(encoded: &[u8]) -> EciesResult<p256::PublicKey> {
    let point = p256::EncodedPoint::from_bytes(encoded).map_err(|_| EciesError::InvalidPoint)?;
    if point.is_identity() {
        return Err(EciesError::InvalidPoint);
    }
    Option::from(p256::PublicKey::from_encoded_point(&point)).ok_or(EciesError::InvalidPoint)
}

fn profile_b_secret_key(private_key: &[u8; PROFILE_B_PRIVATE_KEY_LEN]) -> EciesResult<p256::SecretKey> {
    p256::SecretKey::from_slice(private_key).map_err(|_| EciesError::InvalidPrivateKey)
}

/// Profile B de-concealment (P-256).
///
/// The first byte of `scheme_output` selects the ephemeral key length: 33
/// bytes for 0x02/0x03, 65 bytes for 0x04. The KDF shared info is always
/// the compressed form of the ephemeral key.
pub fn profile_b_deconceal(
    private_key: &[u8; PROFILE_B_PRIVATE_KEY_LEN],
    scheme_output: &[u8],
) -> EciesResult<Vec<u8>> {
    let prefix = *scheme_output.first().ok_or(EciesError::SchemeOutputTooShort {
        len: 0,
        min: PROFILE_B_COMPRESSED_KEY_LEN + ECIES_MAC_LEN,
    })?;
    let key_len = profile_b_key_len(prefix)?;
    check_len(scheme_output, key_len)?;

    let (ephemeral, rest) = scheme_output.split_at(key_len);
    let (ciphertext, tag) = rest.split_at(rest.len() - ECIES_MAC_LEN);

    let ephemeral_public = profile_b_parse_public_key(ephemeral)?;
    let secret = profile_b_secret_key(private_key)?;
    let shared =
        p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), ephemeral_public.as_affine());

    let compressed = ephemeral_public.to_encoded_point(true);
    open(
        &derive_key_data(shared.raw_secret_bytes().as_slice(), compressed.as_bytes()),
        ciphertext,
        tag,
    )
}

/// Profile B concealment (UE side) with a given ephemeral private key.
pub fn profile_b_conceal(
    home_network_public_key: &[u8],
    ephemeral_private_key: &[u8; PROFILE_B_PRIVATE_KEY_LEN],
    plaintext: &[u8],
    compress: bool,
) -> EciesResult<Vec<u8>> {
    let home_public = profile_b_parse_public_key(home_network_public_key)?;
    let ephemeral = profile_b_secret_key(ephemeral_private_key)?;
    let shared = p256::ecdh::diffie_hellman(ephemeral.to_nonzero_scalar(), home_public.as_affine());

    let ephemeral_public = ephemeral.public_key();
    let compressed = ephemeral_public.to_encoded_point(true);
    let sealed = seal(
        &derive_key_data(shared.raw_secret_bytes().as_slice(), compressed.as_bytes()),
        plaintext,
    )?;

    let mut output = ephemeral_public.to_encoded_point(compress).as_bytes().to_vec();
    output.extend_from_slice(&sealed);
    Ok(output)
}

/// Derive the compressed P-256 public key for a Profile B private key.
pub fn profile_b_public_key(
    private_key: &[u8; PROFILE_B_PRIVATE_KEY_LEN],
) -> EciesResult<[u8; PROFILE_B_COMPRESSED_KEY_LEN]> {
    let public = profile_b_secret_key(private_key)?.public_key();
    let mut out = [0u8; PROFILE_B_COMPRESSED_KEY_LEN];
    out.copy_from_slice(public.to_encoded_point(true).as_bytes());
    Ok(out)
}
