//! UDM authentication rejections
//!
//! Every failure of SUCI resolution or vector generation ends the current
//! authentication attempt with a [`Rejected`]. The HTTP layer maps it to a
//! problem-details response.

use thiserror::Error;

/// Problem cause for identity, key material and repository failures
pub const CAUSE_AUTHENTICATION_REJECTED: &str = "AUTHENTICATION_REJECTED";
/// Problem cause for a rejected SQN resynchronization
pub const CAUSE_MODIFICATION_REJECTED: &str = "MODIFICATION_REJECTED";

/// Detail used for resync and persist failures
pub const DETAIL_MODIFICATION_REJECTED: &str = "modification is rejected";

/// Rejection kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedSuci,
    UnsupportedSuciType,
    KeyIndexOutOfRange,
    SchemeMismatch,
    MacVerificationFailed,
    InvalidPoint,
    DecodeError,
    SubscriptionNotFound,
    OpcDerivationFailure,
    ResyncMacMismatch,
    PersistFailure,
}

/// Rejection of one authentication attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{cause}: {detail}")]
pub struct Rejected {
    pub kind: ErrorKind,
    pub cause: &'static str,
    pub detail: String,
}

impl Rejected {
    pub fn new(kind: ErrorKind, cause: &'static str, detail: impl Into<String>) -> Self {
        Self {
            kind,
            cause,
            detail: detail.into(),
        }
    }

    /// Rejection carrying `AUTHENTICATION_REJECTED`
    pub fn authentication(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self::new(kind, CAUSE_AUTHENTICATION_REJECTED, detail)
    }

    /// Rejected resynchronization (AUTS MAC-S mismatch)
    pub fn resync_mismatch() -> Self {
        Self::new(
            ErrorKind::ResyncMacMismatch,
            CAUSE_MODIFICATION_REJECTED,
            DETAIL_MODIFICATION_REJECTED,
        )
    }

    /// SQN update could not be stored
    pub fn persist_failure() -> Self {
        Self::authentication(ErrorKind::PersistFailure, DETAIL_MODIFICATION_REJECTED)
    }

    /// HTTP status the rejection is reported with
    pub fn http_status(&self) -> u16 {
        match self.kind {
            ErrorKind::SubscriptionNotFound => 404,
            _ => 403,
        }
    }
}
