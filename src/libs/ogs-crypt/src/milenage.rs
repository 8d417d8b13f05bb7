//! 3GPP Milenage Algorithm
//!
//! Implements the Milenage algorithm set as defined in 3GPP TS 35.205/35.206
//! (f1, f1*, f2, f3, f4, f5, f5*) together with the OPc derivation and the
//! AUTS handling of TS 33.102 6.3.3 used for SQN re-synchronization.

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;
use subtle::ConstantTimeEq;
use thiserror::Error;

// Length constants
pub const OGS_KEY_LEN: usize = 16;
pub const OGS_RAND_LEN: usize = 16;
pub const OGS_AUTN_LEN: usize = 16;
pub const OGS_AUTS_LEN: usize = 14;
pub const OGS_RES_LEN: usize = 8;
pub const OGS_AK_LEN: usize = 6;
pub const OGS_SQN_LEN: usize = 6;
pub const OGS_AMF_LEN: usize = 2;
pub const OGS_MAC_LEN: usize = 8;

/// AMF used for MAC-S in re-synchronization tokens (TS 33.102 6.3.3)
pub const OGS_RESYNC_AMF: [u8; OGS_AMF_LEN] = [0x00, 0x00];

/// Milenage error types
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MilenageError {
    #[error("MAC verification failed")]
    MacMismatch,
}

/// Result type for Milenage operations
pub type MilenageResult<T> = Result<T, MilenageError>;

/// Output of f2, f3, f4, f5 and f5* for one RAND
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct F2345 {
    pub res: [u8; OGS_RES_LEN],
    pub ck: [u8; OGS_KEY_LEN],
    pub ik: [u8; OGS_KEY_LEN],
    pub ak: [u8; OGS_AK_LEN],
    pub akstar: [u8; OGS_AK_LEN],
}

/// Authentication vector material produced by [`milenage_generate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MilenageVector {
    pub autn: [u8; OGS_AUTN_LEN],
    pub res: [u8; OGS_RES_LEN],
    pub ck: [u8; OGS_KEY_LEN],
    pub ik: [u8; OGS_KEY_LEN],
    pub ak: [u8; OGS_AK_LEN],
}

/// Result of the UE side AUTN check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MilenageCheck {
    /// AUTN was fresh and authentic
    Accepted {
        res: [u8; OGS_RES_LEN],
        ck: [u8; OGS_KEY_LEN],
        ik: [u8; OGS_KEY_LEN],
        sqn: [u8; OGS_SQN_LEN],
    },
    /// The network SQN was not ahead of the UE, AUTS must be returned
    SyncFailure { auts: [u8; OGS_AUTS_LEN] },
}

fn aes_128_encrypt_block(k: &[u8; 16], input: &[u8; 16]) -> [u8; 16] {
    let cipher = Aes128::new(GenericArray::from_slice(k));
    let mut block = GenericArray::clone_from_slice(input);
    cipher.encrypt_block(&mut block);
    let mut out = [0u8; 16];
    out.copy_from_slice(&block);
    out
}

/// rot(TEMP XOR OPc, r) for the byte aligned rotation constants r1..r5
fn rotate_xor(r: usize, temp: &[u8; 16], opc: &[u8; 16]) -> [u8; 16] {
    let shift = 16 - r / 8;
    let mut out = [0u8; 16];
    for i in 0..16 {
        out[(i + shift) % 16] = temp[i] ^ opc[i];
    }
    out
}

fn xor_in_place(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}

/// TEMP = E_K(RAND XOR OPc)
fn milenage_temp(opc: &[u8; 16], k: &[u8; 16], rand: &[u8; 16]) -> [u8; 16] {
    let mut input = *rand;
    xor_in_place(&mut input, opc);
    aes_128_encrypt_block(k, &input)
}

/// Milenage f1 and f1* algorithms
///
/// Returns `(MAC-A, MAC-S)`.
pub fn milenage_f1(
    opc: &[u8; 16],
    k: &[u8; 16],
    rand: &[u8; 16],
    sqn: &[u8; 6],
    amf: &[u8; 2],
) -> ([u8; 8], [u8; 8]) {
    let temp = milenage_temp(opc, k, rand);

    // IN1 = SQN || AMF || SQN || AMF
    let mut in1 = [0u8; 16];
    in1[..6].copy_from_slice(sqn);
    in1[6..8].copy_from_slice(amf);
    in1[8..14].copy_from_slice(sqn);
    in1[14..16].copy_from_slice(amf);

    // OUT1 = E_K(TEMP XOR rot(IN1 XOR OPc, r1) XOR c1) XOR OPc, r1 = 64, c1 = 0
    let mut input = rotate_xor(64, &in1, opc);
    xor_in_place(&mut input, &temp);
    let mut out = aes_128_encrypt_block(k, &input);
    xor_in_place(&mut out, opc);

    let mut mac_a = [0u8; 8];
    let mut mac_s = [0u8; 8];
    mac_a.copy_from_slice(&out[..8]);
    mac_s.copy_from_slice(&out[8..]);
    (mac_a, mac_s)
}

/// Milenage f2, f3, f4, f5 and f5* algorithms
pub fn milenage_f2345(opc: &[u8; 16], k: &[u8; 16], rand: &[u8; 16]) -> F2345 {
    let temp = milenage_temp(opc, k, rand);

    // OUTn = E_K(rot(TEMP XOR OPc, rn) XOR cn) XOR OPc
    let out = |r: usize, c: u8| {
        let mut input = rotate_xor(r, &temp, opc);
        input[15] ^= c;
        let mut out = aes_128_encrypt_block(k, &input);
        xor_in_place(&mut out, opc);
        out
    };

    let out2 = out(0, 1);
    let out3 = out(32, 2);
    let out4 = out(64, 4);
    let out5 = out(96, 8);

    let mut res = [0u8; OGS_RES_LEN];
    let mut ak = [0u8; OGS_AK_LEN];
    let mut akstar = [0u8; OGS_AK_LEN];
    res.copy_from_slice(&out2[8..]);
    ak.copy_from_slice(&out2[..6]);
    akstar.copy_from_slice(&out5[..6]);

    F2345 {
        res,
        ck: out3,
        ik: out4,
        ak,
        akstar,
    }
}

/// OPc = E_K(OP) XOR OP
pub fn milenage_opc(k: &[u8; 16], op: &[u8; 16]) -> [u8; 16] {
    let mut opc = aes_128_encrypt_block(k, op);
    xor_in_place(&mut opc, op);
    opc
}

/// Generate the AKA material for one challenge.
///
/// AUTN = (SQN XOR AK) || AMF || MAC-A
pub fn milenage_generate(
    opc: &[u8; 16],
    amf: &[u8; 2],
    k: &[u8; 16],
    sqn: &[u8; 6],
    rand: &[u8; 16],
) -> MilenageVector {
    let (mac_a, _) = milenage_f1(opc, k, rand, sqn, amf);
    let f = milenage_f2345(opc, k, rand);

    let mut autn = [0u8; OGS_AUTN_LEN];
    autn[..6].copy_from_slice(sqn);
    xor_in_place(&mut autn[..6], &f.ak);
    autn[6..8].copy_from_slice(amf);
    autn[8..].copy_from_slice(&mac_a);

    MilenageVector {
        autn,
        res: f.res,
        ck: f.ck,
        ik: f.ik,
        ak: f.ak,
    }
}

/// Recover SQNms from an AUTS token and verify its MAC-S.
///
/// SQNms = AUTS[0..6] XOR AK*, MAC-S = f1*(SQNms, AMF = 0000). The MAC
/// comparison runs in constant time.
pub fn milenage_auts(
    opc: &[u8; 16],
    k: &[u8; 16],
    rand: &[u8; 16],
    auts: &[u8; OGS_AUTS_LEN],
) -> MilenageResult<[u8; OGS_SQN_LEN]> {
    let f = milenage_f2345(opc, k, rand);

    let mut sqn_ms = [0u8; OGS_SQN_LEN];
    sqn_ms.copy_from_slice(&auts[..6]);
    xor_in_place(&mut sqn_ms, &f.akstar);

    let (_, mac_s) = milenage_f1(opc, k, rand, &sqn_ms, &OGS_RESYNC_AMF);
    if !bool::from(mac_s[..].ct_eq(&auts[6..])) {
        return Err(MilenageError::MacMismatch);
    }

    Ok(sqn_ms)
}

/// Build the AUTS token a UE returns on synchronization failure.
pub fn milenage_resync_token(
    opc: &[u8; 16],
    k: &[u8; 16],
    rand: &[u8; 16],
    sqn_ms: &[u8; OGS_SQN_LEN],
) -> [u8; OGS_AUTS_LEN] {
    let f = milenage_f2345(opc, k, rand);
    let (_, mac_s) = milenage_f1(opc, k, rand, sqn_ms, &OGS_RESYNC_AMF);

    let mut auts = [0u8; OGS_AUTS_LEN];
    auts[..6].copy_from_slice(sqn_ms);
    xor_in_place(&mut auts[..6], &f.akstar);
    auts[6..].copy_from_slice(&mac_s);
    auts
}

/// Check AKA authentication (UE side)
///
/// `sqn_ms` is the highest SQN the UE has accepted. A received SQN that is
/// not strictly greater yields [`MilenageCheck::SyncFailure`].
pub fn milenage_check(
    opc: &[u8; 16],
    k: &[u8; 16],
    sqn_ms: &[u8; OGS_SQN_LEN],
    rand: &[u8; 16],
    autn: &[u8; OGS_AUTN_LEN],
) -> MilenageResult<MilenageCheck> {
    let f = milenage_f2345(opc, k, rand);

    let mut rx_sqn = [0u8; OGS_SQN_LEN];
    rx_sqn.copy_from_slice(&autn[..6]);
    xor_in_place(&mut rx_sqn, &f.ak);

    let amf = [autn[6], autn[7]];
    let (mac_a, _) = milenage_f1(opc, k, rand, &rx_sqn, &amf);
    if !bool::from(mac_a[..].ct_eq(&autn[8..])) {
        return Err(MilenageError::MacMismatch);
    }

    if rx_sqn <= *sqn_ms {
        return Ok(MilenageCheck::SyncFailure {
            auts: milenage_resync_token(opc, k, rand, sqn_ms),
        });
    }

    Ok(MilenageCheck::Accepted {
        res: f.res,
        ck: f.ck,
        ik: f.ik,
        sqn: rx_sqn,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test vectors from 3GPP TS 35.207

    // Test Set 1
    const K1: [u8; 16] = [
        0x46, 0x5b, 0x5c, 0xe8, 0xb1, 0x99, 0xb4, 0x9f,
        0xaa, 0x5f, 0x0a, 0x2e, 0xe2, 0x38, 0xa6, 0xbc,
    ];
    const RAND1: [u8; 16] = [
        0x23, 0x55, 0x3c, 0xbe, 0x96, 0x37, 0xa8, 0x9d,
        0x21, 0x8a, 0xe6, 0x4d, 0xae, 0x47, 0xbf, 0x35,
    ];
    const SQN1: [u8; 6] = [0xff, 0x9b, 0xb4, 0xd0, 0xb6, 0x07];
    const AMF1: [u8; 2] = [0xb9, 0xb9];
    const OP1: [u8; 16] = [
        0xcd, 0xc2, 0x02, 0xd5, 0x12, 0x3e, 0x20, 0xf6,
        0x2b, 0x6d, 0x67, 0x6a, 0xc7, 0x2c, 0xb3, 0x18,
    ];
    const OPC1: [u8; 16] = [
        0xcd, 0x63, 0xcb, 0x71, 0x95, 0x4a, 0x9f, 0x4e,
        0x48, 0xa5, 0x99, 0x4e, 0x37, 0xa0, 0x2b, 0xaf,
    ];

    const F1_1: [u8; 8] = [0x4a, 0x9f, 0xfa, 0xc3, 0x54, 0xdf, 0xaf, 0xb3];
    const F1STAR_1: [u8; 8] = [0x01, 0xcf, 0xaf, 0x9e, 0xc4, 0xe8, 0x71, 0xe9];
    const F2_1: [u8; 8] = [0xa5, 0x42, 0x11, 0xd5, 0xe3, 0xba, 0x50, 0xbf];
    const F3_1: [u8; 16] = [
        0xb4, 0x0b, 0xa9, 0xa3, 0xc5, 0x8b, 0x2a, 0x05,
        0xbb, 0xf0, 0xd9, 0x87, 0xb2, 0x1b, 0xf8, 0xcb,
    ];
    const F4_1: [u8; 16] = [
        0xf7, 0x69, 0xbc, 0xd7, 0x51, 0x04, 0x46, 0x04,
        0x12, 0x76, 0x72, 0x71, 0x1c, 0x6d, 0x34, 0x41,
    ];
    const F5_1: [u8; 6] = [0xaa, 0x68, 0x9c, 0x64, 0x83, 0x70];
    const F5STAR_1: [u8; 6] = [0x45, 0x1e, 0x8b, 0xec, 0xa4, 0x3b];

    // Test Set 2
    const K2: [u8; 16] = [
        0x03, 0x96, 0xeb, 0x31, 0x7b, 0x6d, 0x1c, 0x36,
        0xf1, 0x9c, 0x1c, 0x84, 0xcd, 0x6f, 0xfd, 0x16,
    ];
    const RAND2: [u8; 16] = [
        0xc0, 0x0d, 0x60, 0x31, 0x03, 0xdc, 0xee, 0x52,
        0xc4, 0x47, 0x81, 0x19, 0x49, 0x42, 0x02, 0xe8,
    ];
    const SQN2: [u8; 6] = [0xfd, 0x8e, 0xef, 0x40, 0xdf, 0x7d];
    const AMF2: [u8; 2] = [0xaf, 0x17];
    const OP2: [u8; 16] = [
        0xff, 0x53, 0xba, 0xde, 0x17, 0xdf, 0x5d, 0x4e,
        0x79, 0x30, 0x73, 0xce, 0x9d, 0x75, 0x79, 0xfa,
    ];
    const OPC2: [u8; 16] = [
        0x53, 0xc1, 0x56, 0x71, 0xc6, 0x0a, 0x4b, 0x73,
        0x1c, 0x55, 0xb4, 0xa4, 0x41, 0xc0, 0xbd, 0xe2,
    ];
    const F1_2: [u8; 8] = [0x5d, 0xf5, 0xb3, 0x18, 0x07, 0xe2, 0x58, 0xb0];
    const F2_2: [u8; 8] = [0xd3, 0xa6, 0x28, 0xed, 0x98, 0x86, 0x20, 0xf0];
    const F3_2: [u8; 16] = [
        0x58, 0xc4, 0x33, 0xff, 0x7a, 0x70, 0x82, 0xac,
        0xd4, 0x24, 0x22, 0x0f, 0x2b, 0x67, 0xc5, 0x56,
    ];
    const F4_2: [u8; 16] = [
        0x21, 0xa8, 0xc1, 0xf9, 0x29, 0x70, 0x2a, 0xdb,
        0x3e, 0x73, 0x84, 0x88, 0xb9, 0xf5, 0xc5, 0xda,
    ];
    const F5_2: [u8; 6] = [0xc4, 0x77, 0x83, 0x99, 0x5f, 0x72];

    #[test]
    fn test_milenage_opc() {
        assert_eq!(milenage_opc(&K1, &OP1), OPC1);
        assert_eq!(milenage_opc(&K2, &OP2), OPC2);
    }

    #[test]
    fn test_milenage_f1() {
        let (mac_a, mac_s) = milenage_f1(&OPC1, &K1, &RAND1, &SQN1, &AMF1);
        assert_eq!(mac_a, F1_1);
        assert_eq!(mac_s, F1STAR_1);

        let (mac_a, _) = milenage_f1(&OPC2, &K2, &RAND2, &SQN2, &AMF2);
        assert_eq!(mac_a, F1_2);
    }

    #[test]
    fn test_milenage_f2345() {
        let f = milenage_f2345(&OPC1, &K1, &RAND1);
        assert_eq!(f.res, F2_1);
        assert_eq!(f.ck, F3_1);
        assert_eq!(f.ik, F4_1);
        assert_eq!(f.ak, F5_1);
        assert_eq!(f.akstar, F5STAR_1);

        let f = milenage_f2345(&OPC2, &K2, &RAND2);
        assert_eq!(f.res, F2_2);
        assert_eq!(f.ck, F3_2);
        assert_eq!(f.ik, F4_2);
        assert_eq!(f.ak, F5_2);
    }

    #[test]
    fn test_milenage_generate() {
        let v = milenage_generate(&OPC1, &AMF1, &K1, &SQN1, &RAND1);
        assert_eq!(v.res, F2_1);
        assert_eq!(v.ck, F3_1);
        assert_eq!(v.ik, F4_1);
        assert_eq!(v.ak, F5_1);

        let mut expected_autn = [0u8; 16];
        for i in 0..6 {
            expected_autn[i] = SQN1[i] ^ F5_1[i];
        }
        expected_autn[6..8].copy_from_slice(&AMF1);
        expected_autn[8..16].copy_from_slice(&F1_1);
        assert_eq!(v.autn, expected_autn);
    }

    #[test]
    fn test_milenage_auts_roundtrip() {
        let auts = milenage_resync_token(&OPC1, &K1, &RAND1, &SQN1);
        for i in 0..6 {
            assert_eq!(auts[i], SQN1[i] ^ F5STAR_1[i]);
        }
        assert_eq!(milenage_auts(&OPC1, &K1, &RAND1, &auts), Ok(SQN1));
    }

    #[test]
    fn test_milenage_auts_rejects_bad_mac() {
        let mut auts = milenage_resync_token(&OPC1, &K1, &RAND1, &SQN1);
        auts[13] ^= 0x01;
        assert_eq!(
            milenage_auts(&OPC1, &K1, &RAND1, &auts),
            Err(MilenageError::MacMismatch)
        );
    }

    #[test]
    fn test_milenage_check_accepts_fresh_sqn() {
        let v = milenage_generate(&OPC1, &AMF1, &K1, &SQN1, &RAND1);
        let ue_sqn = [0xff, 0x9b, 0xb4, 0xd0, 0xb6, 0x06];
        match milenage_check(&OPC1, &K1, &ue_sqn, &RAND1, &v.autn).unwrap() {
            MilenageCheck::Accepted { res, ck, ik, sqn } => {
                assert_eq!(res, F2_1);
                assert_eq!(ck, F3_1);
                assert_eq!(ik, F4_1);
                assert_eq!(sqn, SQN1);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_milenage_check_sync_failure() {
        let v = milenage_generate(&OPC1, &AMF1, &K1, &SQN1, &RAND1);
        match milenage_check(&OPC1, &K1, &SQN1, &RAND1, &v.autn).unwrap() {
            MilenageCheck::SyncFailure { auts } => {
                assert_eq!(milenage_auts(&OPC1, &K1, &RAND1, &auts), Ok(SQN1));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_milenage_check_bad_mac() {
        let mut v = milenage_generate(&OPC1, &AMF1, &K1, &SQN1, &RAND1);
        v.autn[15] ^= 0x80;
        assert_eq!(
            milenage_check(&OPC1, &K1, &[0u8; 6], &RAND1, &v.autn),
            Err(MilenageError::MacMismatch)
        );
    }
}
