//! NextGCore SBI (Service Based Interface) Library
//!
//! This crate provides HTTP/2 SBI operations for 5G core network functions.
//! It implements the 3GPP Service Based Interface using hyper.
//!
//! # Example
//!
//! ```rust,no_run
//! use ogs_sbi::SbiClient;
//!
//! async fn example() {
//!     let client = SbiClient::with_host_port("127.0.0.20", 7777);
//!     let response = client
//!         .get("/nudr-dr/v1/subscription-data/imsi-001010000000001/authentication-data/authentication-subscription")
//!         .await;
//! }
//! ```
//!
//! # Modules
//!
//! - [`message`] - SBI message structures (request, response, problem details)
//! - [`client`] - HTTP/2 client implementation
//! - [`server`] - HTTP/2 server implementation
//! - [`error`] - Error types

pub mod error;
pub mod message;

pub mod client;
pub mod server;

// Re-export commonly used types
pub use client::{SbiClient, SbiClientConfig};
pub use error::{SbiError, SbiResult};
pub use message::{ProblemDetails, SbiHeader, SbiHttpMessage, SbiRequest, SbiResponse};
pub use server::{
    send_bad_request, send_error, send_internal_error, send_method_not_allowed,
    send_not_found, SbiRequestHandler, SbiServer, SbiServerConfig,
};
