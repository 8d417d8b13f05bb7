//! Random number generation
//!
//! Thin wrappers over the thread-local CSPRNG of the `rand` crate, used to
//! draw authentication challenges.

use rand::RngCore;

use crate::milenage::OGS_RAND_LEN;

/// Fill buffer with random bytes
pub fn ogs_random(buf: &mut [u8]) {
    rand::rng().fill_bytes(buf);
}

/// Draw a fresh 128-bit RAND challenge
pub fn ogs_random_rand() -> [u8; OGS_RAND_LEN] {
    let mut rand = [0u8; OGS_RAND_LEN];
    ogs_random(&mut rand);
    rand
}
