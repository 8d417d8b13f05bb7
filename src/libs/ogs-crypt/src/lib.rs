//! NextGCore Cryptographic Library
//!
//! Cryptographic primitives used by the home network to authenticate 5G
//! subscribers: the Milenage algorithm set, the 3GPP key derivation
//! functions and the ECIES profiles protecting SUCIs.

pub mod milenage;   // 3GPP Milenage algorithm
pub mod kdf;        // Key Derivation Functions
pub mod ecies;      // ECIES Profile A (X25519) and Profile B (P-256)
pub mod random;     // CSPRNG helpers
