//! NextGCore UDM (Unified Data Management) Library
//!
//! The UE authentication part of the UDM: SUCI de-concealment, 5G-AKA and
//! EAP-AKA' authentication vector generation with SQN management, and the
//! Nudm-UEAU service on top of them.

pub mod config;
pub mod error;
pub mod lock;
pub mod nudm_handler;
pub mod sqn;
pub mod suci;
pub mod types;
pub mod udr;
pub mod ueau;

// Re-export commonly used types
pub use config::{ConfigError, UdmConfig};
pub use error::{ErrorKind, Rejected};
pub use lock::SupiLockTable;
pub use nudm_handler::udm_sbi_request_handler;
pub use suci::{to_supi, Suci, SuciError, SuciProfile};
pub use types::{
    AuthEvent, AuthType, AuthenticationInfoRequest, AuthenticationInfoResult,
    AuthenticationSubscription, AuthenticationVector,
};
pub use udr::{MemoryUdr, SbiUdrClient, UdrClient, UdrError};
pub use ueau::{compute_auth_vector, UeauService, VectorOutcome};
